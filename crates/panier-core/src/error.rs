//! # Error Types
//!
//! Domain-specific error types for panier-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  panier-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  panier-db      └── DbError      - Offline store failures              │
//! │  panier-export  └── ExportError  - PDF rendering / writing             │
//! │  panier-sync    └── SyncError    - Everything above + HTTP, auth       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → notification          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::{ProductId, StoreId};

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product is not part of the local view.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Store cannot be found.
    #[error("Store not found: {0}")]
    StoreNotFound(StoreId),

    /// Finalizing a list with no product in it.
    ///
    /// ## User Workflow
    /// ```text
    /// "Sauvegarder la liste" with nothing in the list
    ///      │
    ///      ▼
    /// FinalizationPlan::new → EmptyList
    ///      │
    ///      ▼
    /// UI shows: "La liste est vide"
    /// ```
    #[error("La liste est vide")]
    EmptyList,

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// The typed answer did not match the confirmation prompt.
    #[error("Confirmation refused for {action}")]
    NotConfirmed { action: String },

    /// A confirmation was presented for a different action than the one
    /// being executed.
    #[error("Confirmation for {confirmed} cannot authorize {requested}")]
    ConfirmationMismatch { confirmed: String, requested: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. a barcode with letters in it).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(CoreError::ProductNotFound(42).to_string(), "Product not found: 42");
        assert_eq!(CoreError::EmptyList.to_string(), "La liste est vide");

        let err = CoreError::QuantityTooLarge {
            requested: 1000,
            max: 999,
        };
        assert_eq!(err.to_string(), "Quantity 1000 exceeds maximum allowed (999)");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: 999,
        };
        assert_eq!(err.to_string(), "quantity must be between 0 and 999");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
