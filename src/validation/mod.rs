use bigdecimal::BigDecimal;
use std::fmt;

pub const CURRENCY_CODE_LEN: usize = 3;
pub const SIGNED_TICKET_MAX_LEN: usize = 4096;
pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control() || ch.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// ISO-4217 shaped: three uppercase ASCII letters.
pub fn validate_currency(currency: &str) -> ValidationResult {
    let currency = sanitize_string(currency);
    validate_required("currency", &currency)?;

    if currency.len() != CURRENCY_CODE_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            "must be three uppercase letters",
        ));
    }

    Ok(())
}

pub fn validate_non_negative_amount(amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must not be negative"));
    }

    Ok(())
}

pub fn validate_signed_ticket(token: &str) -> ValidationResult {
    validate_required("signed_ticket", token)?;
    validate_max_len("signed_ticket", token, SIGNED_TICKET_MAX_LEN)
}

pub fn validate_threshold(threshold: f64) -> ValidationResult {
    if !threshold.is_finite() {
        return Err(ValidationError::new("threshold", "must be a finite number"));
    }

    Ok(())
}

pub fn validate_contamination(contamination: f64) -> ValidationResult {
    if !(contamination > 0.0 && contamination <= 0.5) {
        return Err(ValidationError::new(
            "contamination",
            "must be in the range (0, 0.5]",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
        assert_eq!(sanitize_string("line\r\nbreak"), "line break");
    }

    #[test]
    fn validates_currency() {
        assert!(validate_currency("INR").is_ok());
        assert!(validate_currency(" USD ").is_ok());
        assert!(validate_currency("inr").is_err());
        assert!(validate_currency("RUPEE").is_err());
        assert!(validate_currency("").is_err());
    }

    #[test]
    fn validates_amount_sign() {
        assert!(validate_non_negative_amount(&BigDecimal::from_str("12.50").unwrap()).is_ok());
        assert!(validate_non_negative_amount(&BigDecimal::from(0)).is_ok());
        assert!(validate_non_negative_amount(&BigDecimal::from(-1)).is_err());
    }

    #[test]
    fn validates_scan_parameters() {
        assert!(validate_threshold(-0.1).is_ok());
        assert!(validate_threshold(f64::NAN).is_err());
        assert!(validate_threshold(f64::NEG_INFINITY).is_err());
        assert!(validate_contamination(0.02).is_ok());
        assert!(validate_contamination(0.0).is_err());
        assert!(validate_contamination(0.75).is_err());
    }
}
