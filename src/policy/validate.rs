use lazy_static::lazy_static;
use regex::Regex;

use super::PolicyError;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const PASSWORD_SYMBOLS: &str = "@$!%*?&";

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Canonical form used for storage and uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn email(raw: &str) -> Result<String, PolicyError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(PolicyError::Invalid("Invalid email".into()));
    }
    Ok(email)
}

pub fn name(raw: &str) -> Result<String, PolicyError> {
    let name = raw.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(PolicyError::Invalid(format!(
            "Name must be at least {MIN_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Strength rules applied to every password that reaches the server or leaves the form.
pub fn password(raw: &str) -> Result<(), PolicyError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(PolicyError::Invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !raw.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PolicyError::Invalid(
            "Password must contain at least one uppercase letter".into(),
        ));
    }
    if !raw.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(PolicyError::Invalid(format!(
            "Password must contain at least one special character ({PASSWORD_SYMBOLS})"
        )));
    }
    Ok(())
}
