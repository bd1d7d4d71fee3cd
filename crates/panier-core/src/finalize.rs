//! # List Finalization
//!
//! Turns the current list into the rows that make up a saved shopping list.
//!
//! ## Save Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  in-list products                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FinalizationPlan::new ← THIS MODULE (pure)                             │
//! │       ├── total        = Σ price × quantity                            │
//! │       ├── week_number  = ISO week of the save date                     │
//! │       ├── items        = (product, quantity, price now)                │
//! │       └── updates      = purchase_count += quantity,                   │
//! │                          in_list = false, quantity = 0                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  panier-sync persists list + items, then each update, then the PDF     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{NewListItem, NewShoppingList, Product, ProductId, ProductPatch, StoreId};

// =============================================================================
// Purchase Update
// =============================================================================

/// New purchase count for a product once its list is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseUpdate {
    pub product_id: ProductId,
    pub purchase_count: i64,
}

impl PurchaseUpdate {
    /// Backend patch: bump the count and clear the list state.
    pub fn patch(&self) -> ProductPatch {
        ProductPatch {
            purchase_count: Some(self.purchase_count),
            ..ProductPatch::list_state(0)
        }
    }
}

// =============================================================================
// Finalization Plan
// =============================================================================

/// Everything needed to save the current list, computed up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationPlan {
    pub store_id: StoreId,
    pub total: Money,
    pub week_number: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<NewListItem>,
    pub updates: Vec<PurchaseUpdate>,
}

impl FinalizationPlan {
    /// Builds the plan from the products of a store.
    ///
    /// Products not in the list (or with a zero quantity) are ignored.
    ///
    /// ## Returns
    /// * `Err(EmptyList)` - nothing to save
    pub fn new(store_id: StoreId, products: &[Product], now: DateTime<Utc>) -> CoreResult<Self> {
        let listed: Vec<&Product> = products
            .iter()
            .filter(|p| p.in_list && p.quantity > 0)
            .collect();

        if listed.is_empty() {
            return Err(CoreError::EmptyList);
        }

        let total: Money = listed.iter().map(|p| p.line_total()).sum();

        let items = listed
            .iter()
            .map(|p| NewListItem {
                product_id: p.id,
                quantity: p.quantity,
                price_cents: p.price_cents,
            })
            .collect();

        let updates = listed
            .iter()
            .map(|p| PurchaseUpdate {
                product_id: p.id,
                purchase_count: p.purchase_count + p.quantity,
            })
            .collect();

        Ok(FinalizationPlan {
            store_id,
            total,
            week_number: iso_week_number(now),
            created_at: now,
            items,
            updates,
        })
    }

    /// The list row (with its items) to persist.
    pub fn new_list(&self) -> NewShoppingList {
        NewShoppingList {
            store_id: self.store_id,
            total_cents: self.total.cents(),
            week_number: self.week_number,
            items: self.items.clone(),
        }
    }
}

/// ISO-8601 week number (1-53) of a date.
pub fn iso_week_number(date: DateTime<Utc>) -> i64 {
    i64::from(date.iso_week().week())
}

/// Purchase count after a saved list containing `quantity` of the product
/// is deleted. Never goes below zero.
///
/// ## Example
/// ```rust
/// use panier_core::decremented_purchase_count;
///
/// assert_eq!(decremented_purchase_count(5, 2), 3);
/// assert_eq!(decremented_purchase_count(1, 4), 0);
/// ```
pub fn decremented_purchase_count(current: i64, quantity: i64) -> i64 {
    (current - quantity).max(0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(id: ProductId, price_cents: i64, quantity: i64, purchase_count: i64) -> Product {
        Product {
            id,
            store_id: 7,
            user_id: "user-1".to_string(),
            name: format!("P{}", id),
            price_cents,
            barcode: None,
            image_url: None,
            in_list: quantity > 0,
            quantity,
            purchase_count,
            created_at: Utc::now(),
            price_history: vec![],
        }
    }

    #[test]
    fn test_plan_totals_and_updates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 10, 0, 0).unwrap();
        let products = vec![product(1, 249, 2, 5), product(2, 1000, 0, 3), product(3, 75, 3, 0)];

        let plan = FinalizationPlan::new(7, &products, now).unwrap();

        assert_eq!(plan.total.cents(), 249 * 2 + 75 * 3);
        assert_eq!(plan.week_number, 11);
        assert_eq!(plan.items.len(), 2);
        assert_eq!(
            plan.updates,
            vec![
                PurchaseUpdate {
                    product_id: 1,
                    purchase_count: 7
                },
                PurchaseUpdate {
                    product_id: 3,
                    purchase_count: 3
                },
            ]
        );

        let list = plan.new_list();
        let items_total: i64 = list.items.iter().map(|i| i.price_cents * i.quantity).sum();
        assert_eq!(list.total_cents, items_total);
    }

    #[test]
    fn test_empty_list_cannot_be_finalized() {
        let products = vec![product(1, 249, 0, 0)];
        let err = FinalizationPlan::new(7, &products, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyList));
    }

    #[test]
    fn test_purchase_update_patch_clears_list_state() {
        let patch = PurchaseUpdate {
            product_id: 1,
            purchase_count: 4,
        }
        .patch();

        assert_eq!(patch.purchase_count, Some(4));
        assert_eq!(patch.in_list, Some(false));
        assert_eq!(patch.quantity, Some(0));
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2021-01-01 belongs to ISO week 53 of 2020
        let date = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(iso_week_number(date), 53);

        let date = Utc.with_ymd_and_hms(2024, 12, 30, 12, 0, 0).unwrap();
        assert_eq!(iso_week_number(date), 1);
    }

    #[test]
    fn test_decremented_purchase_count_floors_at_zero() {
        assert_eq!(decremented_purchase_count(5, 2), 3);
        assert_eq!(decremented_purchase_count(2, 2), 0);
        assert_eq!(decremented_purchase_count(1, 4), 0);
        assert_eq!(decremented_purchase_count(0, 1), 0);
    }
}
