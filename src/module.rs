//! Module scoping: project `modules.<name>` into a typed, validated value.
//!
//! Steps, all on data already held in memory:
//!
//! 1. Take `modules.<name>` from the composed tree (absent → `{}`)
//! 2. Deep-merge it over the caller's defaults (resolved data wins)
//! 3. Deserialize into `C::Layer`, recording keys the schema ignores
//! 4. Let confique fill `#[config(default)]` values and check required fields
//! 5. Run the schema's `validator` constraints
//!
//! Any failure becomes [`ConfigError::Validation`] with one [`FieldError`]
//! per problem, named by its dotted field path. Unknown keys are only errors
//! in strict mode.

use confique::Config;
use serde::Deserialize;
use serde_json::Value;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{ConfigError, FieldError};
use crate::merge::merge_value;
use crate::types::{MODULES_KEY, Tree};

/// Field name used for diagnostics that concern the module as a whole.
pub const MODULE_ROOT: &str = "<module>";

/// A type usable as a module schema: confique supplies typed defaults and
/// required-field checks, `validator` supplies value constraints.
pub trait ModuleSchema: Config + Validate {}

impl<T: Config + Validate> ModuleSchema for T {}

/// Resolve the typed configuration of `module` from a composed tree.
pub fn scope<C>(
    composed: &Tree,
    module: &str,
    defaults: Option<Value>,
    strict: bool,
) -> Result<C, ConfigError>
where
    C: ModuleSchema,
    C::Layer: for<'de> Deserialize<'de>,
{
    let resolved = composed
        .get(MODULES_KEY)
        .and_then(|modules| modules.get(module))
        .cloned()
        .unwrap_or_else(|| Value::Object(Tree::new()));
    let raw = match defaults {
        Some(defaults) => merge_value(defaults, resolved),
        None => resolved,
    };

    let invalid = |errors: Vec<FieldError>| ConfigError::Validation {
        module: module.to_string(),
        errors,
    };

    let mut unknown: Vec<String> = Vec::new();
    let mut record = |path: serde_ignored::Path<'_>| unknown.push(path.to_string());
    let ignored = serde_ignored::Deserializer::new(raw, &mut record);
    let layer: C::Layer = serde_path_to_error::deserialize(ignored).map_err(|e| {
        let field = match e.path().to_string() {
            path if path == "." || path.is_empty() => MODULE_ROOT.to_string(),
            path => path,
        };
        invalid(vec![FieldError::new(field, e.inner().to_string())])
    })?;

    if strict && !unknown.is_empty() {
        return Err(invalid(
            unknown
                .into_iter()
                .map(|key| FieldError::new(key, "unknown key"))
                .collect(),
        ));
    }

    let config = C::builder()
        .preloaded(layer)
        .load()
        .map_err(|e| {
            let message = e.to_string();
            invalid(vec![FieldError::new(missing_field(&message), message.clone())])
        })?;

    config.validate().map_err(|errors| {
        let mut fields = Vec::new();
        collect_field_errors(&errors, "", &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        invalid(fields)
    })?;

    Ok(config)
}

/// The field named by confique's missing-value error, or [`MODULE_ROOT`].
fn missing_field(message: &str) -> &str {
    message
        .strip_prefix("required configuration value is missing: '")
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(MODULE_ROOT)
}

fn collect_field_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("failed '{}' constraint", error.code),
                    };
                    out.push(FieldError::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}
