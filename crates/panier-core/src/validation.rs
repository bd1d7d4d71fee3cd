//! # Validation Module
//!
//! Input validation for names, prices, quantities and barcodes.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Trimmed, non-empty names                                          │
//! │  ├── Price / quantity ranges                                           │
//! │  └── Barcode shape (before any network lookup)                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Backend (remote REST / offline SQLite)                       │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use panier_core::validation::{validate_product_name, validate_quantity};
//!
//! assert_eq!(validate_product_name("  Lait  ").unwrap(), "Lait");
//! assert!(validate_quantity(0).is_ok());
//! assert!(validate_quantity(1000).is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_NAME_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Highest accepted price: 100 000,00 €.
pub const MAX_PRICE_CENTS: i64 = 10_000_000;

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(value.to_string())
}

/// Validates a store name and returns it trimmed.
pub fn validate_store_name(name: &str) -> ValidationResult<String> {
    validate_name("store name", name)
}

/// Validates a product name and returns it trimmed.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    validate_name("name", name)
}

/// Validates a barcode and returns it trimmed.
///
/// ## Rules
/// - Digits only
/// - 8 to 14 characters (EAN-8, UPC-A, EAN-13, GTIN-14)
///
/// ## Example
/// ```rust
/// use panier_core::validation::validate_barcode;
///
/// assert!(validate_barcode("3017620422003").is_ok());
/// assert!(validate_barcode("30176204220AB").is_err());
/// assert!(validate_barcode("123").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<String> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    if !(8..=14).contains(&barcode.len()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must be 8 to 14 digits long".to_string(),
        });
    }

    Ok(barcode.to_string())
}

/// Turns blank optional text (an emptied form field) into `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a list quantity.
///
/// ## Rules
/// - 0 is allowed and means "not in the list"
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  User edits the quantity field: 5                                      │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty < 0 or qty > 999? → Error, view untouched                │
/// │       │                                                                 │
/// │       └── OK → ListView::apply(ChangeQuantity)                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// Zero is allowed (free samples); negative prices are not.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
