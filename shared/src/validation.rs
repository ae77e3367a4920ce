//! Validation utilities for the Meadery inventory system
//!
//! Rules are pure functions returning a static English message on failure so
//! that services can wrap them into their own error type.

use rust_decimal::Decimal;

// ============================================================================
// Account Validations
// ============================================================================

pub const MIN_LOGIN_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Validate login length (at least 3 characters)
pub fn validate_login(login: &str) -> Result<(), &'static str> {
    if login.trim().chars().count() < MIN_LOGIN_LEN {
        return Err("Login must be at least 3 characters");
    }
    Ok(())
}

/// Validate password length (at least 6 characters)
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

// ============================================================================
// Quantity and Price Validations
// ============================================================================

/// Validate that a required text field is not blank
pub fn validate_not_blank(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value must not be empty");
    }
    Ok(())
}

/// Validate a volume or quantity that must be strictly positive
pub fn validate_positive(value: Decimal) -> Result<(), &'static str> {
    if value <= Decimal::ZERO {
        return Err("Value must be greater than zero");
    }
    Ok(())
}

/// Validate a price, cost or stock level that may be zero
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value must not be negative");
    }
    Ok(())
}

// ============================================================================
// Russian Taxpayer Number (ИНН)
// ============================================================================

const INN10_WEIGHTS: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
const INN12_FIRST_WEIGHTS: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
const INN12_SECOND_WEIGHTS: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];

fn inn_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    (sum % 11) % 10
}

/// Validate the shape of a taxpayer number: 10 digits for organisations,
/// 12 for individuals and sole proprietors
pub fn validate_tax_id_format(tax_id: &str) -> Result<(), &'static str> {
    if !tax_id.chars().all(|c| c.is_ascii_digit()) {
        return Err("Tax ID must contain digits only");
    }
    match tax_id.len() {
        10 | 12 => Ok(()),
        _ => Err("Tax ID must be 10 or 12 digits"),
    }
}

/// Validate a taxpayer number including the standard check digits
pub fn validate_tax_id(tax_id: &str) -> Result<(), &'static str> {
    validate_tax_id_format(tax_id)?;
    let digits: Vec<u32> = tax_id.chars().filter_map(|c| c.to_digit(10)).collect();

    match digits.len() {
        10 => {
            if inn_check_digit(&digits[..9], &INN10_WEIGHTS) != digits[9] {
                return Err("Invalid tax ID checksum");
            }
        }
        12 => {
            if inn_check_digit(&digits[..10], &INN12_FIRST_WEIGHTS) != digits[10]
                || inn_check_digit(&digits[..11], &INN12_SECOND_WEIGHTS) != digits[11]
            {
                return Err("Invalid tax ID checksum");
            }
        }
        _ => return Err("Tax ID must be 10 or 12 digits"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_login() {
        assert!(validate_login("bob").is_ok());
        assert!(validate_login("ab").is_err());
        assert!(validate_login("  ab  ").is_err());
        assert!(validate_login("мед").is_ok());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_validate_positive_and_non_negative() {
        assert!(validate_positive(Decimal::ONE).is_ok());
        assert!(validate_positive(Decimal::ZERO).is_err());
        assert!(validate_non_negative(Decimal::ZERO).is_ok());
        assert!(validate_non_negative(Decimal::NEGATIVE_ONE).is_err());
    }

    #[test]
    fn test_validate_tax_id_valid() {
        assert!(validate_tax_id("7707083893").is_ok());
        assert!(validate_tax_id("500100732259").is_ok());
    }

    #[test]
    fn test_tax_id_format_ignores_checksum() {
        assert!(validate_tax_id_format("7707083894").is_ok());
        assert!(validate_tax_id_format("123456789").is_err());
        assert!(validate_tax_id_format("77070838a4").is_err());
    }

    #[test]
    fn test_validate_tax_id_invalid() {
        assert!(validate_tax_id("7707083894").is_err());
        assert!(validate_tax_id("500100732250").is_err());
        assert!(validate_tax_id("12345").is_err());
        assert!(validate_tax_id("77070838 3").is_err());
    }

    proptest! {
        #[test]
        fn prop_short_passwords_rejected(password in "[a-z0-9]{0,5}") {
            prop_assert!(validate_password(&password).is_err());
        }

        #[test]
        fn prop_long_passwords_accepted(password in "[a-zA-Z0-9!@#]{6,32}") {
            prop_assert!(validate_password(&password).is_ok());
        }
    }
}
