//! Phone number normalization at the call-initiation boundary.
//!
//! Numbers must arrive in international form. Separators people commonly
//! paste in (spaces, dashes, dots, parentheses) are stripped; everything
//! else is rejected before a session is ever created.

/// Why a phone number was rejected.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number is missing")]
    Empty,
    #[error("phone number must start with '+' and a country code")]
    MissingCountryCode,
    #[error("phone number contains invalid characters")]
    InvalidCharacters,
    #[error("phone number must contain between 8 and 15 digits")]
    BadLength,
}

/// Normalizes `raw` to `+<digits>` form.
pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if compact.is_empty() {
        return Err(PhoneError::Empty);
    }
    let Some(digits) = compact.strip_prefix('+') else {
        return Err(PhoneError::MissingCountryCode);
    };
    if digits.chars().any(|c| !c.is_ascii_digit()) {
        return Err(PhoneError::InvalidCharacters);
    }
    if !(8..=15).contains(&digits.len()) {
        return Err(PhoneError::BadLength);
    }
    Ok(format!("+{}", digits))
}
