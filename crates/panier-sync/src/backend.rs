//! # Backend Seam
//!
//! The one trait both data sources implement. The session, the service
//! layer and list finalization only ever see a `ShoppingBackend`.
//!
//! ```text
//!                 ┌───────────────────────────┐
//!                 │  dyn ShoppingBackend      │
//!                 └─────────────┬─────────────┘
//!                   ┌───────────┴───────────┐
//!                   ▼                       ▼
//!        ┌────────────────────┐   ┌────────────────────┐
//!        │ RemoteGateway      │   │ LocalBackend       │
//!        │ REST, per-user     │   │ SQLite, fixed      │
//!        │ bearer token       │   │ local owner        │
//!        └────────────────────┘   └────────────────────┘
//! ```
//!
//! Implementations return raw errors; notifying the user is the service
//! layer's job.

use async_trait::async_trait;

use panier_core::{
    ListId, NewProduct, NewShoppingList, PriceHistoryEntry, Product, ProductId, ProductPatch,
    ShoppingList, Store, StoreId,
};

use crate::error::SyncResult;

/// CRUD over stores, products, price history and saved lists for the
/// current user.
#[async_trait]
pub trait ShoppingBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    // -------------------------------------------------------------------------
    // Stores
    // -------------------------------------------------------------------------

    /// Stores ordered by name.
    async fn list_stores(&self) -> SyncResult<Vec<Store>>;

    async fn get_store(&self, id: StoreId) -> SyncResult<Store>;

    async fn create_store(&self, name: &str) -> SyncResult<Store>;

    async fn rename_store(&self, id: StoreId, name: &str) -> SyncResult<Store>;

    /// Deletes a store with its products, their history and its lists.
    async fn delete_store(&self, id: StoreId) -> SyncResult<()>;

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Products ordered by name, each with its price history.
    async fn list_products(&self, store_id: Option<StoreId>) -> SyncResult<Vec<Product>>;

    /// Creates a product outside the list and records its first price.
    async fn create_product(&self, new: &NewProduct) -> SyncResult<Product>;

    /// Writes the fields set in `patch`.
    async fn update_product(&self, id: ProductId, patch: &ProductPatch) -> SyncResult<Product>;

    /// Deletes a product, its price history and the list items naming it.
    async fn delete_product(&self, id: ProductId) -> SyncResult<()>;

    // -------------------------------------------------------------------------
    // Price history
    // -------------------------------------------------------------------------

    /// A product's prices, oldest first.
    async fn price_history(&self, product_id: ProductId) -> SyncResult<Vec<PriceHistoryEntry>>;

    async fn record_price(
        &self,
        product_id: ProductId,
        price_cents: i64,
    ) -> SyncResult<PriceHistoryEntry>;

    // -------------------------------------------------------------------------
    // Shopping lists
    // -------------------------------------------------------------------------

    /// Saved lists, newest first, with their items.
    async fn list_shopping_lists(&self, store_id: Option<StoreId>)
        -> SyncResult<Vec<ShoppingList>>;

    /// Saves a list with its items. Product rows are not touched.
    async fn create_shopping_list(&self, new: &NewShoppingList) -> SyncResult<ShoppingList>;

    /// Deletes a saved list and gives its quantities back: each product's
    /// `purchase_count` drops by the item quantity, floored at zero.
    async fn delete_shopping_list(&self, id: ListId) -> SyncResult<()>;

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Deletes every row the current user owns.
    async fn reset(&self) -> SyncResult<()>;
}
