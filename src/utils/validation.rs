use crate::error::{AppError, AppResult, FieldErrors};

/// Accumulates field-level validation messages at the request boundary.
/// Business logic never sees a request that failed validation.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Minimal shape check; full verification is left to the mail provider.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_multiple_errors_per_field() {
        let mut v = Validator::new();
        v.add("password", "The password must be at least 8 characters");
        v.add("password", "The password confirmation does not match");
        v.add("email", "The email field is required");

        let err = v.finish().unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert_eq!(errors["password"].len(), 2);
                assert_eq!(errors["email"].len(), 1);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn empty_validator_passes() {
        assert!(Validator::new().finish().is_ok());
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("climber@example.com"));
        assert!(!is_valid_email("climber"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("climber@com"));
        assert!(!is_valid_email("climber@.com"));
    }
}
