//! # Destructive Action Confirmation
//!
//! Deleting a store, a product or a saved list, and wiping every row of the
//! user, must be confirmed before any backend call is issued.
//!
//! ```text
//! DestructiveAction::prompt() ──► user types an answer
//!        │
//!        ▼
//! DestructiveAction::confirm(answer)
//!        ├── wrong answer ──► Err(NotConfirmed), nothing happens
//!        └── Confirmation ──► passed to the service call, which checks
//!                             it authorizes exactly this action
//! ```
//!
//! A `Confirmation` can only be built through `confirm`, so a service
//! method taking one cannot be reached without the user's answer.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{ListId, ProductId, StoreId};

/// Word the user must type to wipe the database.
pub const RESET_CONFIRMATION_WORD: &str = "Confirmer";

const YES_ANSWERS: [&str; 4] = ["oui", "o", "yes", "y"];

/// An action that deletes data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum DestructiveAction {
    DeleteStore { store_id: StoreId },
    DeleteProduct { product_id: ProductId },
    DeleteShoppingList { list_id: ListId },
    ResetDatabase,
}

impl DestructiveAction {
    /// Question shown to the user.
    pub fn prompt(&self) -> String {
        match self {
            DestructiveAction::DeleteStore { .. } => {
                "Supprimer ce magasin et tous ses produits ? (oui/non)".to_string()
            }
            DestructiveAction::DeleteProduct { .. } => {
                "Supprimer ce produit ? (oui/non)".to_string()
            }
            DestructiveAction::DeleteShoppingList { .. } => {
                "Supprimer cette liste de courses ? (oui/non)".to_string()
            }
            DestructiveAction::ResetDatabase => format!(
                "Toutes vos données seront supprimées. Tapez \"{}\" pour continuer :",
                RESET_CONFIRMATION_WORD
            ),
        }
    }

    /// Checks the user's answer.
    ///
    /// Reset requires the exact confirmation word (surrounding whitespace is
    /// ignored); other deletions accept a yes in French or English.
    pub fn confirm(self, answer: &str) -> CoreResult<Confirmation> {
        let answer = answer.trim();

        let accepted = match self {
            DestructiveAction::ResetDatabase => answer == RESET_CONFIRMATION_WORD,
            _ => YES_ANSWERS.contains(&answer.to_lowercase().as_str()),
        };

        if accepted {
            Ok(Confirmation { action: self })
        } else {
            Err(CoreError::NotConfirmed {
                action: self.to_string(),
            })
        }
    }
}

impl fmt::Display for DestructiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestructiveAction::DeleteStore { store_id } => write!(f, "delete store {}", store_id),
            DestructiveAction::DeleteProduct { product_id } => {
                write!(f, "delete product {}", product_id)
            }
            DestructiveAction::DeleteShoppingList { list_id } => {
                write!(f, "delete shopping list {}", list_id)
            }
            DestructiveAction::ResetDatabase => write!(f, "reset database"),
        }
    }
}

/// Proof that the user confirmed one destructive action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    action: DestructiveAction,
}

impl Confirmation {
    pub fn action(&self) -> DestructiveAction {
        self.action
    }

    /// Fails unless this confirmation was given for `requested`.
    pub fn authorize(&self, requested: DestructiveAction) -> CoreResult<()> {
        if self.action == requested {
            Ok(())
        } else {
            Err(CoreError::ConfirmationMismatch {
                confirmed: self.action.to_string(),
                requested: requested.to_string(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_requires_exact_word() {
        let action = DestructiveAction::ResetDatabase;

        assert!(action.confirm("Confirmer").is_ok());
        assert!(action.confirm("  Confirmer\n").is_ok());
        assert!(action.confirm("confirmer").is_err());
        assert!(action.confirm("oui").is_err());
        assert!(action.confirm("").is_err());
    }

    #[test]
    fn test_deletions_accept_yes() {
        let action = DestructiveAction::DeleteProduct { product_id: 3 };

        for answer in ["oui", "OUI", "o", "yes", "Y"] {
            assert!(action.confirm(answer).is_ok(), "{} should confirm", answer);
        }
        for answer in ["non", "n", "", "Confirmer"] {
            assert!(action.confirm(answer).is_err(), "{} should refuse", answer);
        }
    }

    #[test]
    fn test_confirmation_only_authorizes_its_action() {
        let confirmation = DestructiveAction::DeleteStore { store_id: 1 }
            .confirm("oui")
            .unwrap();

        assert!(confirmation
            .authorize(DestructiveAction::DeleteStore { store_id: 1 })
            .is_ok());

        let err = confirmation
            .authorize(DestructiveAction::DeleteStore { store_id: 2 })
            .unwrap_err();
        assert!(matches!(err, CoreError::ConfirmationMismatch { .. }));
        assert!(confirmation
            .authorize(DestructiveAction::ResetDatabase)
            .is_err());
    }

    #[test]
    fn test_reset_prompt_names_the_word() {
        assert!(DestructiveAction::ResetDatabase.prompt().contains("\"Confirmer\""));
    }
}
