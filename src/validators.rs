/// Input validators for request bodies
///
/// Each validator returns the normalised value (trimmed, emails lower-cased)
/// or a field-level [`ValidationError`] that is reported back to the client.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MIN_EMAIL_LENGTH: usize = 5;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_NAME_LENGTH: usize = 100;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 72; // bcrypt input limit, in bytes
const MAX_TITLE_LENGTH: usize = 255;
const MAX_EXCERPT_LENGTH: usize = 500;
const MAX_BIO_LENGTH: usize = 1000;
const MAX_URL_LENGTH: usize = 2048;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("email regex is valid");

    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 ()-]{6,20}$").expect("phone regex is valid");
}

/// Validates and normalises an email address
/// - Checks length constraints and format
/// - Returns the trimmed, lower-cased address
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }
    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a required person name (`first_name`, `last_name`)
pub fn validate_name(field: &str, name: &str) -> Result<String, ValidationError> {
    let trimmed = required_text(field, name, MAX_NAME_LENGTH)?;
    if has_control_characters(&trimmed) {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }
    Ok(trimmed)
}

/// Validates password strength
///
/// Requirements:
/// - 8 to 72 bytes
/// - At least one uppercase and one lowercase letter
/// - At least one digit
/// - At least one punctuation or symbol character
pub fn validate_password(field: &str, password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(field.to_string(), MIN_PASSWORD_LENGTH));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_PASSWORD_LENGTH));
    }

    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(ValidationError::rule(
            field,
            "password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        ));
    }

    Ok(())
}

pub fn validate_post_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = required_text("title", title, MAX_TITLE_LENGTH)?;
    if has_control_characters(&trimmed) {
        return Err(ValidationError::SuspiciousContent("title".to_string()));
    }
    Ok(trimmed)
}

pub fn validate_post_content(content: &str) -> Result<String, ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyField("content".to_string()));
    }
    if content.contains('\0') {
        return Err(ValidationError::SuspiciousContent("content".to_string()));
    }
    Ok(content.to_string())
}

pub fn validate_excerpt(excerpt: &str) -> Result<String, ValidationError> {
    optional_text("excerpt", excerpt, MAX_EXCERPT_LENGTH)
}

pub fn validate_bio(bio: &str) -> Result<String, ValidationError> {
    optional_text("bio", bio, MAX_BIO_LENGTH)
}

pub fn validate_avatar(avatar: &str) -> Result<String, ValidationError> {
    let trimmed = optional_text("avatar", avatar, MAX_URL_LENGTH)?;
    if !trimmed.is_empty() && !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
        return Err(ValidationError::InvalidFormat("avatar".to_string()));
    }
    Ok(trimmed)
}

pub fn validate_phone_number(phone: &str) -> Result<String, ValidationError> {
    let trimmed = phone.trim();
    if !trimmed.is_empty() && !PHONE_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("phone_number".to_string()));
    }
    Ok(trimmed.to_string())
}

fn required_text(field: &str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong(field.to_string(), max));
    }
    Ok(trimmed.to_string())
}

fn optional_text(field: &str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong(field.to_string(), max));
    }
    if trimmed.contains('\0') {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Detects suspicious patterns in email addresses
fn has_suspicious_email_patterns(email: &str) -> bool {
    // Local part longer than RFC 5321 allows
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    email.matches('@').count() != 1 || email.contains('\0')
}

fn has_control_characters(value: &str) -> bool {
    value.chars().any(|c| c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("test.email@domain.co.uk").is_ok());
        assert!(validate_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_normalised() {
        assert_eq!(validate_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@@example.com").is_err());
        assert!(validate_email("user@localhost").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(validate_email(&too_long).is_err());
        assert_eq!(
            validate_email("").unwrap_err(),
            ValidationError::EmptyField("email".to_string())
        );
    }

    #[test]
    fn test_valid_name() {
        assert_eq!(validate_name("first_name", " Jean-Pierre ").unwrap(), "Jean-Pierre");
        assert!(validate_name("last_name", "O'Brien").is_ok());
    }

    #[test]
    fn test_name_limits() {
        assert_eq!(validate_name("first_name", "").unwrap_err().field(), "first_name");
        assert!(validate_name("first_name", &"a".repeat(101)).is_err());
        assert!(validate_name("first_name", "Name\0with\0null").is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password("password", "ValidPass123!").is_ok());
        assert!(validate_password("password", "Sh0rt!").is_err());
        assert!(validate_password("password", "NoDigitsHere!").is_err());
        assert!(validate_password("password", "nouppercase1!").is_err());
        assert!(validate_password("password", "NOLOWERCASE1!").is_err());
        assert!(validate_password("password", "NoSpecial123").is_err());
    }

    #[test]
    fn test_password_byte_limit() {
        let long = format!("Aa1!{}", "x".repeat(69));
        assert_eq!(long.len(), 73);
        assert!(validate_password("password", &long).is_err());
        assert!(validate_password("password", &long[..72]).is_ok());
    }

    #[test]
    fn test_password_error_names_field() {
        let err = validate_password("new_password", "weak").unwrap_err();
        assert_eq!(err.field(), "new_password");
    }

    #[test]
    fn test_post_fields() {
        assert_eq!(validate_post_title("  Hello ").unwrap(), "Hello");
        assert!(validate_post_title("").is_err());
        assert!(validate_post_title(&"t".repeat(256)).is_err());
        assert!(validate_post_content("   ").is_err());
        assert!(validate_excerpt(&"e".repeat(501)).is_err());
    }

    #[test]
    fn test_profile_fields() {
        assert!(validate_avatar("https://cdn.example.com/a.png").is_ok());
        assert!(validate_avatar("javascript:alert(1)").is_err());
        assert!(validate_phone_number("+1 (555) 010-9999").is_ok());
        assert!(validate_phone_number("call me").is_err());
        assert!(validate_bio("").is_ok());
    }
}
