//! Common validation and normalization utilities.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Country calling code prefixed to domestic WhatsApp numbers.
pub const COUNTRY_CODE: &str = "55";

/// Free-mail domains whose local part ignores dots and plus-aliases.
const DOT_INSENSITIVE_DOMAINS: &[&str] = &["gmail.com", "googlemail.com"];

lazy_static! {
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex");
}

/// Trims and lower-cases an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Syntactic `local@domain.tld` check.
///
/// Typo'd top-level domains such as `.con` pass; only the shape is checked.
pub fn is_plausible_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email.trim())
}

/// Validator hook for email fields.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if is_plausible_email(email) {
        Ok(())
    } else {
        let mut err = ValidationError::new("email_format");
        err.message = Some("Email must look like name@domain.tld".into());
        Err(err)
    }
}

/// Canonical identity used for primary-admin matching.
///
/// Lower-cases the address; for Gmail addresses also strips dots and any
/// `+alias` from the local part and folds `googlemail.com` into `gmail.com`.
pub fn canonicalize_identity(email: &str) -> String {
    let normalized = normalize_email(email);
    let Some((local, domain)) = normalized.rsplit_once('@') else {
        return normalized;
    };

    if !DOT_INSENSITIVE_DOMAINS.contains(&domain) {
        return normalized;
    }

    let base = local.split('+').next().unwrap_or(local);
    format!("{}@gmail.com", base.replace('.', ""))
}

/// Normalizes a phone number to the international digit string WhatsApp expects.
///
/// Returns `None` when the digits cannot form a valid number.
pub fn normalize_whatsapp_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with(COUNTRY_CODE) && (digits.len() == 12 || digits.len() == 13) {
        return Some(digits);
    }

    if digits.len() == 10 || digits.len() == 11 {
        return Some(format!("{COUNTRY_CODE}{digits}"));
    }

    None
}

/// Validates that an optional end date is not before the start date.
pub fn validate_date_range(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), ValidationError> {
    match end {
        Some(end) if end < start => {
            let mut err = ValidationError::new("date_range");
            err.message = Some("End date must be on or after the start date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Validates that a string is not blank after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
