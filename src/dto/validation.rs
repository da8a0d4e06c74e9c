//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that an id looks like a Discord snowflake: 1 to 20 ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_snowflake("123456789012345678") // Ok
/// validate_snowflake("abc")                // Err - not numeric
/// validate_snowflake("")                   // Err - empty
/// ```
pub fn validate_snowflake(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > 20 {
        let mut err = ValidationError::new("snowflake_length");
        err.message = Some(format!("Snowflake must be 1-20 digits (got {})", id.len()).into());
        return Err(err);
    }

    if !id.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("snowflake_format");
        err.message = Some("Snowflake must contain only ASCII digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a text field is not empty once trimmed.
pub fn validate_non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Field must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_snowflake_valid() {
        assert!(validate_snowflake("1").is_ok());
        assert!(validate_snowflake("123456789012345678").is_ok());
    }

    #[test]
    fn test_validate_snowflake_invalid() {
        assert!(validate_snowflake("").is_err()); // empty
        assert!(validate_snowflake("123456789012345678901").is_err()); // too long
        assert!(validate_snowflake("12a4").is_err()); // non-digit
        assert!(validate_snowflake("-123").is_err()); // sign
    }

    #[test]
    fn test_validate_non_blank() {
        assert!(validate_non_blank("Maple Hill").is_ok());
        assert!(validate_non_blank("").is_err());
        assert!(validate_non_blank("   ").is_err());
    }
}
