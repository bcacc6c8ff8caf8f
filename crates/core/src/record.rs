use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CoreError;
use crate::ids::RecordId;

/// A row type owned by one table.
///
/// `Draft` is what a create form submits, `Patch` what an edit form submits,
/// `Filter` the equality predicates a list screen applies.
pub trait Record: Clone + Sized {
    const TABLE: &'static str;

    type Id: RecordId;
    type Draft: Validate + Serialize + DeserializeOwned;
    type Patch: Validate + Serialize + DeserializeOwned + Default;
    type Filter: Default + Clone;

    fn id(&self) -> Self::Id;
}

/// Checks a submitted draft or patch before it reaches storage.
pub trait Validate {
    fn validate(&self) -> Result<(), CoreError>;
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn optional_text(field: &'static str, value: Option<&str>) -> Result<(), CoreError> {
    match value {
        Some(v) => require_text(field, v),
        None => Ok(()),
    }
}

/// Phone numbers are digits with an optional leading `+`, spaces and dashes allowed.
pub(crate) fn validate_phone(field: &'static str, value: &str) -> Result<(), CoreError> {
    let trimmed = value.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    let only_allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    if !only_allowed || !(7..=15).contains(&digits) {
        return Err(CoreError::validation(field, format!("not a phone number: {value}")));
    }
    Ok(())
}

pub(crate) fn validate_optional_phone(
    field: &'static str,
    value: Option<&str>,
) -> Result<(), CoreError> {
    match value {
        Some(v) => validate_phone(field, v),
        None => Ok(()),
    }
}

pub(crate) fn validate_amount(field: &'static str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::validation(field, format!("must be a non-negative number, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers() {
        assert!(validate_phone("phone", "+91 98765-43210").is_ok());
        assert!(validate_phone("phone", "9876543210").is_ok());
        assert!(validate_phone("phone", "12345").is_err());
        assert!(validate_phone("phone", "98765x3210").is_err());
    }

    #[test]
    fn amounts() {
        assert!(validate_amount("total", 0.0).is_ok());
        assert!(validate_amount("total", -1.0).is_err());
        assert!(validate_amount("total", f64::NAN).is_err());
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text("name", "   ").is_err());
        assert!(optional_text("name", None).is_ok());
    }
}
