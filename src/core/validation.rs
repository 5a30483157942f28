//! Request body validation
//!
//! Field-level checks applied to incoming DTOs before they reach a service.
//! Each DTO implements [`Validate`] and reports every failing field at once.

/// A single failed field check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is empty or whitespace only
    Empty { field: &'static str },
    /// Field is not a syntactically valid email address
    InvalidEmail { field: &'static str },
    /// Field contains characters other than ASCII letters and digits
    NotAlphanumeric { field: &'static str },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Empty { field } => write!(f, "{field} should not be empty"),
            ValidationError::InvalidEmail { field } => write!(f, "{field} must be an email"),
            ValidationError::NotAlphanumeric { field } => {
                write!(f, "{field} must contain only letters and numbers")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Accumulated outcome of validating one request body
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the outcome of a check, keeping only failures
    pub fn check(&mut self, outcome: Result<(), ValidationError>) -> &mut Self {
        if let Err(error) = outcome {
            self.add_error(error);
        }
        self
    }

    /// Joined message of every failure, or `Ok` if nothing failed
    pub fn into_result(self) -> Result<(), String> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.all_messages().join(", "))
        }
    }

    pub fn all_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Implemented by request bodies that carry field constraints
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

/// Structural email check: one `@`, non-empty local part, dotted domain
/// with no empty labels and no whitespace anywhere
pub fn validate_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require_non_empty(field, value)?;

    let invalid = ValidationError::InvalidEmail { field };

    if value.chars().any(char::is_whitespace) {
        return Err(invalid);
    }

    let Some((local, domain)) = value.split_once('@') else {
        return Err(invalid);
    };

    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid);
    }

    if domain.split('.').any(str::is_empty) {
        return Err(invalid);
    }

    Ok(())
}

/// Usernames are non-empty and ASCII alphanumeric only
pub fn validate_username(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require_non_empty(field, value)?;

    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::NotAlphanumeric { field });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        for email in ["alice@x.com", "a.b+tag@mail.example.org", "X@y.io"] {
            assert!(validate_email("email", email).is_ok(), "{email}");
        }
    }

    #[test]
    fn test_invalid_emails() {
        let cases = [
            "plainaddress",
            "@example.com",
            "user@",
            "user@domain",
            "user@domain.",
            "user@.com",
            "user@@domain.com",
            "us er@domain.com",
        ];

        for email in cases {
            assert_eq!(
                validate_email("email", email),
                Err(ValidationError::InvalidEmail { field: "email" }),
                "{email}"
            );
        }
    }

    #[test]
    fn test_empty_email_reports_empty() {
        assert_eq!(
            validate_email("email", "  "),
            Err(ValidationError::Empty { field: "email" })
        );
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("username", "alice").is_ok());
        assert!(validate_username("username", "Alice42").is_ok());
        assert!(validate_username("username", "123").is_ok());

        assert_eq!(
            validate_username("username", ""),
            Err(ValidationError::Empty { field: "username" })
        );
        for name in ["al ice", "alice_1", "alice-1", "ålice", "alice!"] {
            assert_eq!(
                validate_username("username", name),
                Err(ValidationError::NotAlphanumeric { field: "username" }),
                "{name}"
            );
        }
    }

    #[test]
    fn test_result_collects_all_failures() {
        let mut result = ValidationResult::new();
        result
            .check(validate_email("email", "nope"))
            .check(require_non_empty("firstName", ""))
            .check(validate_username("username", "fine"));

        assert!(!result.is_valid());
        assert_eq!(
            result.into_result(),
            Err("email must be an email, firstName should not be empty".to_string())
        );
    }

    #[test]
    fn test_empty_result_is_ok() {
        assert_eq!(ValidationResult::new().into_result(), Ok(()));
    }
}
