//! Field validation for order records.
//!
//! Pure, side-effect-free checks shared by the single-order and bulk-import
//! paths. Every failure names the offending field, and batch callers attach
//! the 1-based row index so the error message points at the exact row to
//! fix. Nothing in this crate touches persistence.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

// Egyptian mobile numbers: optional +20/20 country code or a leading zero,
// then a 1, an operator digit (0/1/2/5) and eight more digits.
static MOBILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((\+?20)|0)?1[0125][0-9]{8}$").unwrap());

/// Optional 1-based row position carried inside validation error messages.
///
/// `Row::none()` renders as nothing (single-order paths); `Row::at(2)`
/// renders as `" in row 2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Row(Option<usize>);

impl Row {
    pub fn none() -> Self {
        Row(None)
    }

    pub fn at(index: usize) -> Self {
        Row(Some(index))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(index) => write!(f, " in row {index}"),
            None => Ok(()),
        }
    }
}

/// A field-level validation failure, with the row position (if any) baked
/// into the rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Incorrect email format{0}")]
    Email(Row),
    #[error("Invalid phone number format{0}")]
    Phone(Row),
    #[error("Invalid quantity{0}. Quantity must be a positive integer.")]
    Quantity(Row),
    #[error("Invalid total amount{0}. Total amount must be a positive number.")]
    TotalAmount(Row),
    #[error("Invalid payment method{0}. Allowed values: COD, Card")]
    PaymentMethod(Row),
    #[error("Missing required fields{0}")]
    MissingFields(Row),
}

pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Checks the national mobile format for the target locale (Egypt).
pub fn is_valid_mobile(phone: &str) -> bool {
    MOBILE_REGEX.is_match(phone)
}

/// Positive integer check for numbers arriving from JSON or spreadsheet
/// cells. Fractional, zero, negative and out-of-range values all fail.
pub fn is_positive_integer(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value.fract() == 0.0 && value <= i32::MAX as f64
}

pub fn is_positive_amount(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Password policy for sign-up: at least 10 characters with at least one
/// lowercase letter, one uppercase letter, one digit and one symbol.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 10
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

/// Neutralizes characters meaningful to downstream HTML renderers and trims
/// surrounding whitespace. Applied exactly once per inbound value: escaping
/// is not idempotent, so callers must not re-sanitize stored text.
pub fn sanitize_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.trim().chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// Composite per-record check used by both the single-order and bulk paths.
///
/// Fields are checked in a fixed order (email, phone, quantity, amount,
/// payment method) so a multi-error record reports the same field every
/// time. The first failure wins.
pub fn validate_order_fields(
    recipient_email: &str,
    recipient_phone: &str,
    quantity: f64,
    total_amount: f64,
    payment_method: &str,
    row: Row,
) -> Result<(), ValidationError> {
    if !is_valid_email(recipient_email) {
        return Err(ValidationError::Email(row));
    }
    if !is_valid_mobile(recipient_phone) {
        return Err(ValidationError::Phone(row));
    }
    if !is_positive_integer(quantity) {
        return Err(ValidationError::Quantity(row));
    }
    if !is_positive_amount(total_amount) {
        return Err(ValidationError::TotalAmount(row));
    }
    if payment_method != "COD" && payment_method != "Card" {
        return Err(ValidationError::PaymentMethod(row));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("mona@example.com"));
        assert!(is_valid_email("a.b+tag@sub.domain.org"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("user@no-tld"));
        assert!(!is_valid_email("user@domain.c"));
    }

    #[test]
    fn test_mobile_validation() {
        assert!(is_valid_mobile("01012345678"));
        assert!(is_valid_mobile("01112345678"));
        assert!(is_valid_mobile("01212345678"));
        assert!(is_valid_mobile("01512345678"));
        assert!(is_valid_mobile("+201012345678"));
        assert!(is_valid_mobile("201012345678"));
        // Wrong operator digit, wrong length, landline
        assert!(!is_valid_mobile("01312345678"));
        assert!(!is_valid_mobile("0101234567"));
        assert!(!is_valid_mobile("0223456789"));
        assert!(!is_valid_mobile(""));
    }

    #[test]
    fn test_quantity_rules() {
        assert!(is_positive_integer(1.0));
        assert!(is_positive_integer(250.0));
        assert!(!is_positive_integer(0.0));
        assert!(!is_positive_integer(-1.0));
        assert!(!is_positive_integer(2.5));
        assert!(!is_positive_integer(f64::NAN));
        assert!(!is_positive_integer(f64::INFINITY));
    }

    #[test]
    fn test_amount_rules() {
        assert!(is_positive_amount(0.5));
        assert!(is_positive_amount(149.99));
        assert!(!is_positive_amount(0.0));
        assert!(!is_positive_amount(-3.0));
        assert!(!is_positive_amount(f64::NAN));
    }

    #[test]
    fn test_password_strength() {
        assert!(is_strong_password("Str0ng!Pass1"));
        assert!(!is_strong_password("abc"));
        assert!(!is_strong_password("alllowercase1!"));
        assert!(!is_strong_password("ALLUPPERCASE1!"));
        assert!(!is_strong_password("NoDigits!!aa"));
        assert!(!is_strong_password("NoSymbol12aa"));
        // Long enough but missing a symbol
        assert!(!is_strong_password("Abcdefgh123"));
    }

    #[test]
    fn test_sanitize_escapes_and_trims() {
        assert_eq!(
            sanitize_text("  <script>alert('x')</script> "),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;&#x2F;script&gt;"
        );
        assert_eq!(sanitize_text("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(sanitize_text("plain text"), "plain text");
    }

    #[test]
    fn test_composite_reports_first_failing_field() {
        // Bad email and bad phone: email wins.
        let err = validate_order_fields("nope", "123", 1.0, 10.0, "COD", Row::at(3)).unwrap_err();
        assert_eq!(err, ValidationError::Email(Row::at(3)));

        let err = validate_order_fields(
            "mona@example.com",
            "01012345678",
            -1.0,
            10.0,
            "COD",
            Row::at(2),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid quantity in row 2. Quantity must be a positive integer.");
    }

    #[test]
    fn test_composite_accepts_valid_record() {
        assert!(
            validate_order_fields(
                "mona@example.com",
                "01012345678",
                2.0,
                99.5,
                "Card",
                Row::none()
            )
            .is_ok()
        );
    }

    #[test]
    fn test_row_suffix_rendering() {
        assert_eq!(ValidationError::Phone(Row::none()).to_string(), "Invalid phone number format");
        assert_eq!(
            ValidationError::Phone(Row::at(7)).to_string(),
            "Invalid phone number format in row 7"
        );
        assert_eq!(
            ValidationError::MissingFields(Row::at(1)).to_string(),
            "Missing required fields in row 1"
        );
    }
}
