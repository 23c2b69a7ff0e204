//! Validation helpers for DTOs.

use indexmap::IndexMap;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Longest identifier accepted for matches, organisations and tournaments.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Validates an opaque identifier: non-empty, at most [`MAX_IDENTIFIER_LEN`]
/// characters, ASCII letters, digits, `-` and `_` only.
///
/// # Examples
///
/// ```ignore
/// validate_identifier("m-001")   // Ok
/// validate_identifier("")        // Err - empty
/// validate_identifier("m 001")   // Err - space
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_IDENTIFIER_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("identifier_format");
        err.message =
            Some("Identifier may only contain ASCII letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Flatten nested validation errors into `path -> messages`, e.g.
/// `matches[2].id -> ["Identifier must be ..."]`. Paths are sorted.
pub fn flatten_validation_errors(errors: &ValidationErrors) -> IndexMap<String, Vec<String>> {
    let mut fields = IndexMap::new();
    collect(errors, "", &mut fields);
    fields.sort_keys();
    fields
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut IndexMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = list
                    .iter()
                    .map(|err| {
                        err.message
                            .as_ref()
                            .map(|message| message.to_string())
                            .unwrap_or_else(|| err.code.to_string())
                    })
                    .collect();
                out.insert(path, messages);
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}
