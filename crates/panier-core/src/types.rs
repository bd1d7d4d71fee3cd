//! # Domain Types
//!
//! Core domain types shared by the offline store, the remote gateway and
//! the session.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────┐ 1     * ┌─────────────────┐ 1     * ┌──────────────┐  │
//! │  │   Store     │────────►│    Product      │────────►│ PriceHistory │  │
//! │  │ id, name    │         │ price_cents     │         │ price_cents  │  │
//! │  │ user_id     │         │ in_list, qty    │         │ created_at   │  │
//! │  └──────┬──────┘         │ purchase_count  │         └──────────────┘  │
//! │         │ 1              └────────▲────────┘                            │
//! │         │                         │ product_id                          │
//! │         │ *              ┌────────┴────────┐                            │
//! │  ┌──────▼──────┐ 1     * │ShoppingListItem │                            │
//! │  │ShoppingList │────────►│ quantity        │                            │
//! │  │ total_cents │         │ price_cents     │  (price at purchase)       │
//! │  │ week_number │         └─────────────────┘                            │
//! │  └─────────────┘                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Rows are keyed by backend-assigned integer ids. Owners are user-id
//! strings (`OFFLINE_USER_ID` for the offline store).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// Store identifier.
pub type StoreId = i64;

/// Product identifier.
pub type ProductId = i64;

/// Shopping list identifier.
pub type ListId = i64;

// =============================================================================
// Store
// =============================================================================

/// A shopping venue owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A purchasable item tied to one store.
///
/// ## List State
/// `in_list` and `quantity` always move together:
/// ```text
///   quantity > 0  ⇔  in_list = true
///   quantity = 0  ⇔  in_list = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub user_id: String,
    pub name: String,

    /// Current price in cents.
    pub price_cents: i64,

    pub barcode: Option<String>,
    pub image_url: Option<String>,

    /// Whether the product is part of the current list.
    pub in_list: bool,

    /// Quantity in the current list (0 when not listed).
    pub quantity: i64,

    /// Cumulative quantity bought across saved lists.
    pub purchase_count: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Price history, oldest first. Filled by reads that join it.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub price_history: Vec<PriceHistoryEntry>,
}

impl Product {
    /// Returns the current price as Money.
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns price × quantity for the current list.
    pub fn line_total(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }
}

/// Fields for a product about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub store_id: StoreId,
    pub name: String,
    pub price_cents: i64,
    pub barcode: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update of a product row.
///
/// `None` leaves the column untouched. For the nullable columns,
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_count: Option<i64>,
}

impl ProductPatch {
    /// Patch that sets the list state for a quantity.
    pub fn list_state(quantity: i64) -> Self {
        ProductPatch {
            in_list: Some(quantity > 0),
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    /// Applies the patch to a product in place.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = self.price_cents {
            product.price_cents = price;
        }
        if let Some(barcode) = &self.barcode {
            product.barcode = barcode.clone();
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = image_url.clone();
        }
        if let Some(in_list) = self.in_list {
            product.in_list = in_list;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = quantity;
        }
        if let Some(count) = self.purchase_count {
            product.purchase_count = count;
        }
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == ProductPatch::default()
    }
}

// =============================================================================
// Price History
// =============================================================================

/// One append-only price observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub product_id: ProductId,
    pub price_cents: i64,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Shopping List
// =============================================================================

/// A finalized, priced snapshot of purchased products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShoppingList {
    pub id: ListId,
    pub store_id: StoreId,
    pub user_id: String,
    pub total_cents: i64,

    /// ISO-8601 week of the day the list was saved.
    pub week_number: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One line of a saved shopping list.
///
/// `product_name` and `image_url` are read through the product join, so
/// they show the product as it is now; `price_cents` is frozen at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShoppingListItem {
    pub id: i64,
    pub list_id: ListId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: i64,
    pub price_cents: i64,
}

impl ShoppingListItem {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.price_cents).multiply_quantity(self.quantity)
    }
}

/// A shopping list about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewShoppingList {
    pub store_id: StoreId,
    pub total_cents: i64,
    pub week_number: i64,
    pub items: Vec<NewListItem>,
}

/// A list line about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewListItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
