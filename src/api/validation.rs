//! Input validation for API requests.
//!
//! Each validator returns `Err(message)` for the first problem found. Collect
//! several with `ValidationErrorBuilder::check` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email check: local part, `@`, dotted domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)+$"
    ).unwrap();

    /// Lowercase words joined by single dashes
    static ref SLUG_REGEX: Regex = Regex::new(
        r"^[a-z0-9]+(-[a-z0-9]+)*$"
    ).unwrap();

    static ref VERIFICATION_CODE_REGEX: Regex = Regex::new(
        r"^\d{6}$"
    ).unwrap();

    static ref DATE_ONLY_REGEX: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}$"
    ).unwrap();
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 || !EMAIL_REGEX.is_match(email.trim()) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len < 2 {
        return Err("Name must be at least 2 characters".to_string());
    }
    if len > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("Slug is required".to_string());
    }
    if slug.len() > 200 {
        return Err("Slug is too long (max 200 characters)".to_string());
    }
    if !SLUG_REGEX.is_match(slug) {
        return Err("Slug must be lowercase letters and digits separated by dashes".to_string());
    }
    Ok(())
}

/// Validate a required free-text field such as a product name or SKU
pub fn validate_required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

pub fn validate_verification_code(code: &str) -> Result<(), String> {
    if !VERIFICATION_CODE_REGEX.is_match(code.trim()) {
        return Err("Verification code must be 6 digits".to_string());
    }
    Ok(())
}

pub fn validate_quantity(quantity: i64) -> Result<(), String> {
    if quantity < 1 {
        return Err("Quantity must be at least 1".to_string());
    }
    if quantity > 9999 {
        return Err("Quantity is too large (max 9999)".to_string());
    }
    Ok(())
}

pub fn validate_stock(stock: i64) -> Result<(), String> {
    if stock < 0 {
        return Err("Stock cannot be negative".to_string());
    }
    Ok(())
}

/// Accept an RFC 3339 timestamp or a bare `YYYY-MM-DD` date
pub fn validate_date(date: &str) -> Result<(), String> {
    if chrono::DateTime::parse_from_rfc3339(date).is_ok() {
        return Ok(());
    }
    if DATE_ONLY_REGEX.is_match(date)
        && chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
    {
        return Ok(());
    }
    Err("Date must be YYYY-MM-DD or an RFC 3339 timestamp".to_string())
}
