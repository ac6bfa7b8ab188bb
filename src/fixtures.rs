#[cfg(test)]
pub mod test {
    use confique::Config;
    use serde::{Deserialize, Serialize};
    use validator::Validate;

    #[derive(Config, Validate, Serialize, Deserialize, Debug, PartialEq)]
    pub struct CharacterConfig {
        /// How many characters one player may own.
        #[config(default = 3)]
        #[validate(range(min = 1, message = "must be a positive integer"))]
        pub max_characters_per_player: i64,

        /// Realm new characters are created in.
        #[config(default = "default")]
        #[validate(length(min = 1))]
        pub realm: String,

        /// Per-character limits.
        #[config(nested)]
        #[validate(nested)]
        pub limits: LimitsConfig,
    }

    #[derive(Config, Validate, Serialize, Deserialize, Debug, PartialEq)]
    pub struct LimitsConfig {
        /// Name changes allowed per character.
        #[config(default = 1)]
        pub names: u32,

        /// Inventory slots.
        #[config(default = 20)]
        #[validate(range(min = 1))]
        pub slots: u32,
    }

    /// A schema with a required field and no defaults.
    #[derive(Config, Validate, Serialize, Deserialize, Debug, PartialEq)]
    pub struct StrictConfig {
        pub upstream: String,

        #[config(default = 30)]
        pub timeout_secs: u64,
    }

    #[test]
    fn character_config_loads_defaults() {
        let config = CharacterConfig::builder().load().unwrap();
        assert_eq!(config.max_characters_per_player, 3);
        assert_eq!(config.realm, "default");
        assert_eq!(config.limits.names, 1);
        assert_eq!(config.limits.slots, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn strict_config_requires_upstream() {
        assert!(StrictConfig::builder().load().is_err());
    }
}
