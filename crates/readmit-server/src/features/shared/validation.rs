//! Shared validation utilities

use regex::Regex;
use thiserror::Error;

use crate::error::AppError;

/// Longest address accepted by common mail servers
const MAX_EMAIL_LENGTH: usize = 254;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmailValidationError {
    #[error("Recipient email is required")]
    Required,

    #[error("Recipient email must be at most {max_length} characters")]
    TooLong { max_length: usize },

    #[error("'{0}' is not a valid email address")]
    InvalidFormat(String),
}

impl From<EmailValidationError> for AppError {
    fn from(err: EmailValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Validate a recipient address
///
/// Checks shape only; deliverability is up to the mail service.
pub fn validate_email(email: &str) -> Result<(), EmailValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(EmailValidationError::Required);
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(EmailValidationError::TooLong {
            max_length: MAX_EMAIL_LENGTH,
        });
    }

    let pattern = Regex::new(EMAIL_PATTERN)
        .map_err(|_| EmailValidationError::InvalidFormat(email.to_string()))?;
    if !pattern.is_match(email) {
        return Err(EmailValidationError::InvalidFormat(email.to_string()));
    }

    Ok(())
}

/// Subject ids are positive warehouse keys
pub fn validate_subject_id(subject_id: i64) -> Result<(), AppError> {
    if subject_id <= 0 {
        return Err(AppError::Validation(format!(
            "subject_id must be positive, got {}",
            subject_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("patient@example.com").is_ok());
        assert!(validate_email("first.last+care@mail.hospital.org").is_ok());
        assert!(validate_email("  padded@example.com ").is_ok());
    }

    #[test]
    fn test_validate_email_invalid() {
        assert_eq!(validate_email("  "), Err(EmailValidationError::Required));
        assert!(matches!(
            validate_email("no-at-sign.example.com"),
            Err(EmailValidationError::InvalidFormat(_))
        ));
        assert!(matches!(validate_email("a@b"), Err(EmailValidationError::InvalidFormat(_))));

        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            validate_email(&long),
            Err(EmailValidationError::TooLong { max_length: 254 })
        );
    }

    #[test]
    fn test_validate_subject_id() {
        assert!(validate_subject_id(1).is_ok());
        assert!(validate_subject_id(0).is_err());
        assert!(validate_subject_id(-4).is_err());
    }
}
