//! Field checks shared by the services.
//!
//! `validator` derives handle lengths and emails on the request DTOs; the
//! rules here need more than an attribute can express.

use crate::error::AppError;

/// Lowercase ASCII words joined by single hyphens.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    let well_formed = !slug.is_empty()
        && slug.split('-').all(|word| {
            !word.is_empty()
                && word
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        });
    if well_formed {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Invalid slug '{}': use lowercase letters, digits and single hyphens",
            slug
        )))
    }
}

/// Titles are a sort key and travel inside pagination cursors, so control
/// characters (which include the cursor delimiter) are rejected.
pub fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::InvalidInput("Title cannot be blank".to_string()));
    }
    if title.chars().any(char::is_control) {
        return Err(AppError::InvalidInput(
            "Title cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("hello-world-2").is_ok());
        assert!(validate_slug("Hello").is_err());
        assert!(validate_slug("double--hyphen").is_err());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn test_validate_title_rejects_control_characters() {
        assert!(validate_title("Ownership: a primer").is_ok());
        assert!(validate_title("tab\there").is_err());
        assert!(validate_title("unit\u{1f}separator").is_err());
        assert!(validate_title("   ").is_err());
    }
}
