//! # panier-core: Pure Shopping Logic for Panier
//!
//! This crate holds the domain of the shopping-list application as pure
//! functions and plain data. Every network call, file and database access
//! lives in the crates above it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Panier Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/cli (commands)                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   panier-sync: gateway, session, barcode, auth, realtime        │   │
//! │  └──────────┬──────────────────┬──────────────────┬────────────────┘   │
//! │             │                  │                  │                     │
//! │  ┌──────────▼───────┐  ┌───────▼────────┐  ┌──────▼────────┐          │
//! │  │ panier-db        │  │ panier-export  │  │  remote REST  │          │
//! │  │ offline SQLite   │  │ PDF            │  │  backend      │          │
//! │  └──────────┬───────┘  └───────┬────────┘  └───────────────┘          │
//! │             │                  │                                        │
//! │  ┌──────────▼──────────────────▼───────────────────────────────────┐   │
//! │  │               ★ panier-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │   │  types  │ │  money  │ │   list   │ │ finalize │ │confirm │ │   │
//! │  │   │ Product │ │  Money  │ │ ListView │ │  Plan    │ │ prompt │ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Store, Product, PriceHistoryEntry, ShoppingList)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`list`] - The in-memory list view and its optimistic transitions
//! - [`finalize`] - Turning the current list into a saved shopping list
//! - [`confirm`] - Confirmation gate for destructive actions
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use panier_core::money::Money;
//!
//! let price = Money::from_cents(249);
//! let line = price * 3;
//! assert_eq!(line.cents(), 747);
//! assert_eq!(line.to_string(), "7,47 €");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod confirm;
pub mod error;
pub mod finalize;
pub mod list;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use confirm::{Confirmation, DestructiveAction};
pub use error::{CoreError, CoreResult, ValidationError};
pub use finalize::{decremented_purchase_count, FinalizationPlan, PurchaseUpdate};
pub use list::{AppliedMutation, ListView, Mutation, RemoteWrite, Snapshot};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Owner id used for every row of the offline store.
///
/// The offline store has no accounts, but the schema keeps the `user_id`
/// column so rows look the same whichever backend produced them.
pub const OFFLINE_USER_ID: &str = "local";

/// Maximum quantity of a single product in the current list.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length for store and product names.
pub const MAX_NAME_LENGTH: usize = 200;
