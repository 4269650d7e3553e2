//! Local input validation, applied before any provider or backend call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AuthFlowError, AuthResult};
use crate::identity::ProfileFields;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

// Letters (any script), spaces, hyphens and apostrophes.
static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}][\p{L} '\-]*$").unwrap());

/// Minimum length for every profile form field, after trimming.
pub const MIN_PROFILE_FIELD_LEN: usize = 2;

/// Normalizes and validates an email address. Returns the trimmed,
/// lowercased form the provider receives.
pub fn validate_email(raw: &str) -> AuthResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthFlowError::Validation(
            "Email address is required".to_string(),
        ));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(AuthFlowError::Validation(
            "Enter a valid email address".to_string(),
        ));
    }
    Ok(email)
}

/// Validates a one-time code. Only length is checked locally; whether the
/// code is right is the provider's call.
pub fn validate_otp_code(raw: &str, min_len: usize) -> AuthResult<String> {
    let code = raw.trim().to_string();
    if code.len() < min_len {
        return Err(AuthFlowError::Validation(format!(
            "Code must be at least {min_len} characters"
        )));
    }
    Ok(code)
}

fn require_min_len(value: &str, field: &str) -> AuthResult<()> {
    if value.trim().len() < MIN_PROFILE_FIELD_LEN {
        return Err(AuthFlowError::Validation(format!(
            "{field} must be at least {MIN_PROFILE_FIELD_LEN} characters"
        )));
    }
    Ok(())
}

fn require_name_charset(value: &str, field: &str) -> AuthResult<()> {
    if !NAME_RE.is_match(value.trim()) {
        return Err(AuthFlowError::Validation(format!(
            "{field} may only contain letters, spaces, hyphens and apostrophes"
        )));
    }
    Ok(())
}

/// Validates the profile form and returns the trimmed fields that get
/// persisted.
pub fn validate_profile_fields(fields: &ProfileFields) -> AuthResult<ProfileFields> {
    require_min_len(&fields.first_name, "First name")?;
    require_name_charset(&fields.first_name, "First name")?;
    require_min_len(&fields.last_name, "Last name")?;
    require_name_charset(&fields.last_name, "Last name")?;
    require_min_len(&fields.company, "Company")?;
    require_min_len(&fields.job_title, "Job title")?;

    Ok(ProfileFields {
        first_name: fields.first_name.trim().to_string(),
        last_name: fields.last_name.trim().to_string(),
        company: fields.company.trim().to_string(),
        job_title: fields.job_title.trim().to_string(),
    })
}
