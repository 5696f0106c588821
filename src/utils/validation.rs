use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

/// Lowercase letters, digits and underscores only.
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{3,50}$").expect("username regex is valid"));

static PERMISSION_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]{1,99}$").expect("code regex is valid"));

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        let mut err = ValidationError::new("username");
        err.message = Some(
            "Username must be 3-50 lowercase letters, digits or underscores".into(),
        );
        Err(err)
    }
}

/// Role, permission and status codes: upper snake case.
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    if PERMISSION_CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("code");
        err.message = Some("Code must be UPPER_SNAKE_CASE".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("budi_santoso").is_ok());
        assert!(validate_username("user42").is_ok());
        assert!(validate_username("Budi").is_err());
        assert!(validate_username("budi santoso").is_err());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("budi-s").is_err());
    }

    #[test]
    fn codes() {
        assert!(validate_code("VIEW_ATTENDANCE").is_ok());
        assert!(validate_code("WFH").is_ok());
        assert!(validate_code("view_attendance").is_err());
        assert!(validate_code("_X").is_err());
        assert!(validate_code("A").is_err());
    }
}
