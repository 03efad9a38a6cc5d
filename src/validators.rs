/// Input validators for principal fields.
///
/// Emails are normalized (trimmed, lowercased) here so that uniqueness is
/// case-insensitive everywhere downstream.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_NAME_LENGTH: usize = 256;
pub const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_PASSWORD_LENGTH: usize = 128;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Returns the trimmed value if present and non-blank.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validates and normalizes an email address
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let normalized = email.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidationError::MissingFields("Email is required".to_string()));
    }

    if normalized.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("Email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(&normalized) || normalized.contains('\0') {
        return Err(ValidationError::InvalidFormat("Email".to_string()));
    }

    Ok(normalized)
}

/// Validates a display name
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::MissingFields("Name is required".to_string()));
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("Name".to_string(), MAX_NAME_LENGTH));
    }

    // Null bytes and control characters
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("Name".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Checks a new password against its confirmation and the length policy.
///
/// The mismatch check runs first so the caller sees the same message order
/// as the signup form.
pub fn validate_new_password(
    password: &str,
    confirmation: &str,
    mismatch_message: &str,
) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch(mismatch_message.to_string()));
    }

    // Counted in UTF-16 units, matching what browser forms report
    let length = password.encode_utf16().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("Password".to_string(), MIN_PASSWORD_LENGTH));
    }

    // Upper bound on bcrypt input
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("Password".to_string(), MAX_PASSWORD_LENGTH));
    }

    Ok(())
}
