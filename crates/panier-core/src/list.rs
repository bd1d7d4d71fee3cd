//! # List View
//!
//! The in-memory mirror of one store's products, split into the products
//! still available and the products in the current list.
//!
//! ## Optimistic Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Mutation ──► ListView::apply ──► AppliedMutation                     │
//! │                     │                  ├── snapshot (prior product     │
//! │                     │                  │   and where it sat)           │
//! │                     │                  └── remote (patch or delete)    │
//! │                     ▼                                                   │
//! │              view updated, rendered immediately                        │
//! │                     │                                                   │
//! │          remote write fails?                                           │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │   ListView::revert(snapshot) ──► that product is back exactly as it    │
//! │                                   was, other products untouched        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshots are per product. Rolling back one failed write never undoes a
//! later, successful mutation of another product.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::finalize::PurchaseUpdate;
use crate::money::Money;
use crate::types::{Product, ProductId, ProductPatch};
use crate::validation::validate_quantity;

// =============================================================================
// Mutations
// =============================================================================

/// A user intent against the current list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum Mutation {
    AddToList { product_id: ProductId },
    RemoveFromList { product_id: ProductId },
    ChangeQuantity { product_id: ProductId, quantity: i64 },
    DeleteProduct { product_id: ProductId },
}

impl Mutation {
    pub fn product_id(&self) -> ProductId {
        match *self {
            Mutation::AddToList { product_id }
            | Mutation::RemoveFromList { product_id }
            | Mutation::ChangeQuantity { product_id, .. }
            | Mutation::DeleteProduct { product_id } => product_id,
        }
    }

    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::AddToList { .. } => "add_to_list",
            Mutation::RemoveFromList { .. } => "remove_from_list",
            Mutation::ChangeQuantity { .. } => "change_quantity",
            Mutation::DeleteProduct { .. } => "delete_product",
        }
    }
}

/// The backend write that makes a mutation durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    Patch {
        product_id: ProductId,
        patch: ProductPatch,
    },
    Delete {
        product_id: ProductId,
    },
}

/// Which collection of the view a product sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Available,
    InList,
}

/// A product as it was before a mutation, and where it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    product: Product,
    side: Side,
    index: usize,
}

impl Snapshot {
    pub fn product(&self) -> &Product {
        &self.product
    }
}

/// Result of applying a mutation locally.
#[derive(Debug, Clone)]
pub struct AppliedMutation {
    pub snapshot: Snapshot,
    pub remote: RemoteWrite,
}

// =============================================================================
// List View
// =============================================================================

/// One store's products, partitioned by `in_list`.
///
/// Both collections keep the order products arrived in (the backends sort
/// by name); products that change side are appended to the other side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListView {
    available: Vec<Product>,
    in_list: Vec<Product>,
}

impl ListView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a view from a full product reload.
    pub fn from_products(products: Vec<Product>) -> Self {
        let (in_list, available): (Vec<Product>, Vec<Product>) =
            products.into_iter().partition(|p| p.in_list);
        ListView { available, in_list }
    }

    /// Replaces the whole view (full reload).
    pub fn replace(&mut self, products: Vec<Product>) {
        *self = Self::from_products(products);
    }

    pub fn available(&self) -> &[Product] {
        &self.available
    }

    pub fn in_list(&self) -> &[Product] {
        &self.in_list
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty() && self.in_list.is_empty()
    }

    /// Looks a product up on either side.
    pub fn get(&self, product_id: ProductId) -> Option<&Product> {
        self.locate(product_id).map(|(side, index)| &self.side(side)[index])
    }

    /// Sum of price × quantity over the current list.
    pub fn total(&self) -> Money {
        self.in_list.iter().map(Product::line_total).sum()
    }

    /// Applies a mutation locally and returns what is needed to persist or
    /// undo it.
    ///
    /// ## Returns
    /// * `Ok(AppliedMutation)` - view updated
    /// * `Err(ProductNotFound)` - unknown product, view untouched
    /// * `Err(Validation)` - quantity out of range, view untouched
    pub fn apply(&mut self, mutation: &Mutation) -> CoreResult<AppliedMutation> {
        if let Mutation::ChangeQuantity { quantity, .. } = mutation {
            validate_quantity(*quantity)?;
        }

        let product_id = mutation.product_id();
        let (side, index) = self
            .locate(product_id)
            .ok_or(CoreError::ProductNotFound(product_id))?;

        let snapshot = Snapshot {
            product: self.side(side)[index].clone(),
            side,
            index,
        };

        let remote = match *mutation {
            Mutation::AddToList { .. } => self.set_quantity(side, index, 1),
            Mutation::RemoveFromList { .. } => self.set_quantity(side, index, 0),
            Mutation::ChangeQuantity { quantity, .. } => self.set_quantity(side, index, quantity),
            Mutation::DeleteProduct { .. } => {
                self.side_mut(side).remove(index);
                RemoteWrite::Delete { product_id }
            }
        };

        Ok(AppliedMutation { snapshot, remote })
    }

    /// Restores the product captured in `snapshot`.
    ///
    /// Whatever the product looks like now (or whether it still exists), it
    /// ends up with its prior field values on its prior side.
    pub fn revert(&mut self, snapshot: Snapshot) {
        self.remove(snapshot.product.id);

        let side = self.side_mut(snapshot.side);
        let index = snapshot.index.min(side.len());
        side.insert(index, snapshot.product);
    }

    /// Removes a product from the view.
    pub fn remove(&mut self, product_id: ProductId) -> Option<Product> {
        let (side, index) = self.locate(product_id)?;
        Some(self.side_mut(side).remove(index))
    }

    /// Moves finalized products back to `available` with their new
    /// purchase counts and a cleared list state.
    pub fn apply_finalization(&mut self, updates: &[PurchaseUpdate]) {
        for update in updates {
            if let Some(mut product) = self.remove(update.product_id) {
                update.patch().apply_to(&mut product);
                self.available.push(product);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn locate(&self, product_id: ProductId) -> Option<(Side, usize)> {
        if let Some(i) = self.in_list.iter().position(|p| p.id == product_id) {
            return Some((Side::InList, i));
        }
        self.available
            .iter()
            .position(|p| p.id == product_id)
            .map(|i| (Side::Available, i))
    }

    fn side(&self, side: Side) -> &Vec<Product> {
        match side {
            Side::Available => &self.available,
            Side::InList => &self.in_list,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<Product> {
        match side {
            Side::Available => &mut self.available,
            Side::InList => &mut self.in_list,
        }
    }

    /// Sets the list state of the product at (side, index), moving it to
    /// the end of the other side when `in_list` flips.
    fn set_quantity(&mut self, side: Side, index: usize, quantity: i64) -> RemoteWrite {
        let patch = ProductPatch::list_state(quantity);
        let target = if quantity > 0 { Side::InList } else { Side::Available };

        let product_id = if side == target {
            let product = &mut self.side_mut(side)[index];
            patch.apply_to(product);
            product.id
        } else {
            let mut product = self.side_mut(side).remove(index);
            patch.apply_to(&mut product);
            let id = product.id;
            self.side_mut(target).push(product);
            id
        };

        RemoteWrite::Patch { product_id, patch }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: ProductId, name: &str, price_cents: i64) -> Product {
        Product {
            id,
            store_id: 1,
            user_id: "user-1".to_string(),
            name: name.to_string(),
            price_cents,
            barcode: None,
            image_url: None,
            in_list: false,
            quantity: 0,
            purchase_count: 0,
            created_at: Utc::now(),
            price_history: vec![],
        }
    }

    fn listed(id: ProductId, name: &str, price_cents: i64, quantity: i64) -> Product {
        Product {
            in_list: true,
            quantity,
            ..product(id, name, price_cents)
        }
    }

    fn view() -> ListView {
        ListView::from_products(vec![
            product(1, "Beurre", 250),
            listed(2, "Café", 499, 2),
            product(3, "Pain", 120),
        ])
    }

    #[test]
    fn test_from_products_partitions_by_in_list() {
        let v = view();
        assert_eq!(v.available().iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(v.in_list().iter().map(|p| p.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_add_to_list_sets_quantity_one() {
        let mut v = view();
        let applied = v.apply(&Mutation::AddToList { product_id: 1 }).unwrap();

        let p = v.get(1).unwrap();
        assert!(p.in_list);
        assert_eq!(p.quantity, 1);
        assert_eq!(v.in_list().last().unwrap().id, 1);
        assert_eq!(
            applied.remote,
            RemoteWrite::Patch {
                product_id: 1,
                patch: ProductPatch::list_state(1)
            }
        );
    }

    #[test]
    fn test_remove_from_list_resets_both_fields() {
        let mut v = view();
        v.apply(&Mutation::RemoveFromList { product_id: 2 }).unwrap();

        let p = v.get(2).unwrap();
        assert!(!p.in_list);
        assert_eq!(p.quantity, 0);
        assert!(v.in_list().is_empty());
        assert_eq!(v.available().last().unwrap().id, 2);
    }

    #[test]
    fn test_change_quantity_zero_leaves_list() {
        let mut v = view();
        v.apply(&Mutation::ChangeQuantity {
            product_id: 2,
            quantity: 0,
        })
        .unwrap();

        let p = v.get(2).unwrap();
        assert!(!p.in_list);
        assert_eq!(p.quantity, 0);
    }

    #[test]
    fn test_change_quantity_on_available_product_lists_it() {
        let mut v = view();
        v.apply(&Mutation::ChangeQuantity {
            product_id: 3,
            quantity: 4,
        })
        .unwrap();

        let p = v.get(3).unwrap();
        assert!(p.in_list);
        assert_eq!(p.quantity, 4);
    }

    #[test]
    fn test_change_quantity_in_place() {
        let mut v = ListView::from_products(vec![listed(1, "A", 100, 1), listed(2, "B", 100, 1)]);
        v.apply(&Mutation::ChangeQuantity {
            product_id: 1,
            quantity: 5,
        })
        .unwrap();

        assert_eq!(v.in_list()[0].id, 1);
        assert_eq!(v.in_list()[0].quantity, 5);
    }

    #[test]
    fn test_invalid_quantity_leaves_view_untouched() {
        let mut v = view();
        let before = v.clone();

        assert!(v
            .apply(&Mutation::ChangeQuantity {
                product_id: 2,
                quantity: -1
            })
            .is_err());
        assert!(v
            .apply(&Mutation::ChangeQuantity {
                product_id: 2,
                quantity: 1000
            })
            .is_err());
        assert_eq!(v, before);
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let mut v = view();
        let err = v.apply(&Mutation::AddToList { product_id: 99 }).unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(99)));
    }

    #[test]
    fn test_delete_product_removes_it() {
        let mut v = view();
        let applied = v.apply(&Mutation::DeleteProduct { product_id: 3 }).unwrap();

        assert!(v.get(3).is_none());
        assert_eq!(applied.remote, RemoteWrite::Delete { product_id: 3 });
    }

    #[test]
    fn test_total_is_sum_of_price_times_quantity() {
        let v = ListView::from_products(vec![
            listed(1, "A", 199, 3),
            listed(2, "B", 1, 999),
            listed(3, "C", 10, 7),
            product(4, "D", 5000),
        ]);
        let expected: i64 = v.in_list().iter().map(|p| p.price_cents * p.quantity).sum();

        assert_eq!(v.total().cents(), expected);
        assert_eq!(v.total().cents(), 597 + 999 + 70);
    }

    #[test]
    fn test_revert_restores_exact_prior_value() {
        let mut v = view();
        let before = v.clone();

        for mutation in [
            Mutation::AddToList { product_id: 1 },
            Mutation::RemoveFromList { product_id: 2 },
            Mutation::ChangeQuantity {
                product_id: 2,
                quantity: 9,
            },
            Mutation::DeleteProduct { product_id: 3 },
        ] {
            let applied = v.apply(&mutation).unwrap();
            v.revert(applied.snapshot);
            assert_eq!(v, before, "revert of {} must restore the view", mutation.label());
        }
    }

    #[test]
    fn test_revert_only_touches_its_product() {
        let mut v = view();

        let failed = v.apply(&Mutation::AddToList { product_id: 1 }).unwrap();
        v.apply(&Mutation::AddToList { product_id: 3 }).unwrap();

        v.revert(failed.snapshot);

        let reverted = v.get(1).unwrap();
        assert!(!reverted.in_list);
        assert_eq!(reverted.quantity, 0);

        let kept = v.get(3).unwrap();
        assert!(kept.in_list);
        assert_eq!(kept.quantity, 1);
    }

    #[test]
    fn test_apply_finalization_resets_listed_products() {
        let mut v = view();
        v.apply_finalization(&[PurchaseUpdate {
            product_id: 2,
            purchase_count: 2,
        }]);

        let p = v.get(2).unwrap();
        assert!(!p.in_list);
        assert_eq!(p.quantity, 0);
        assert_eq!(p.purchase_count, 2);
        assert!(v.in_list().is_empty());
    }
}
