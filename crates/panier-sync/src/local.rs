//! # Local Backend
//!
//! `ShoppingBackend` over the offline SQLite store. Every row belongs to
//! the fixed local owner; there is no sign-in.

use async_trait::async_trait;
use tracing::debug;

use panier_core::{
    ListId, NewProduct, NewShoppingList, PriceHistoryEntry, Product, ProductId, ProductPatch,
    ShoppingList, Store, StoreId, OFFLINE_USER_ID,
};
use panier_db::{Database, DbConfig};

use crate::backend::ShoppingBackend;
use crate::error::{SyncError, SyncResult};

/// Offline store backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    db: Database,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        LocalBackend { db }
    }

    /// Opens (and migrates) the store file.
    pub async fn open(config: DbConfig) -> SyncResult<Self> {
        Ok(LocalBackend::new(Database::new(config).await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ShoppingBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_stores(&self) -> SyncResult<Vec<Store>> {
        Ok(self.db.stores().list(OFFLINE_USER_ID).await?)
    }

    async fn get_store(&self, id: StoreId) -> SyncResult<Store> {
        self.db
            .stores()
            .get_by_id(id)
            .await?
            .ok_or_else(|| SyncError::not_found("Store", id))
    }

    async fn create_store(&self, name: &str) -> SyncResult<Store> {
        Ok(self.db.stores().insert(OFFLINE_USER_ID, name).await?)
    }

    async fn rename_store(&self, id: StoreId, name: &str) -> SyncResult<Store> {
        Ok(self.db.stores().rename(id, name).await?)
    }

    async fn delete_store(&self, id: StoreId) -> SyncResult<()> {
        Ok(self.db.stores().delete(id).await?)
    }

    async fn list_products(&self, store_id: Option<StoreId>) -> SyncResult<Vec<Product>> {
        Ok(self.db.products().list(OFFLINE_USER_ID, store_id).await?)
    }

    async fn create_product(&self, new: &NewProduct) -> SyncResult<Product> {
        Ok(self.db.products().insert(OFFLINE_USER_ID, new).await?)
    }

    async fn update_product(&self, id: ProductId, patch: &ProductPatch) -> SyncResult<Product> {
        Ok(self.db.products().update(id, patch).await?)
    }

    async fn delete_product(&self, id: ProductId) -> SyncResult<()> {
        // price_history and shopping_list_items cascade
        Ok(self.db.products().delete(id).await?)
    }

    async fn price_history(&self, product_id: ProductId) -> SyncResult<Vec<PriceHistoryEntry>> {
        Ok(self.db.price_history().list_for_product(product_id).await?)
    }

    async fn record_price(
        &self,
        product_id: ProductId,
        price_cents: i64,
    ) -> SyncResult<PriceHistoryEntry> {
        Ok(self
            .db
            .price_history()
            .insert(OFFLINE_USER_ID, product_id, price_cents)
            .await?)
    }

    async fn list_shopping_lists(
        &self,
        store_id: Option<StoreId>,
    ) -> SyncResult<Vec<ShoppingList>> {
        Ok(self.db.shopping_lists().list(OFFLINE_USER_ID, store_id).await?)
    }

    async fn create_shopping_list(&self, new: &NewShoppingList) -> SyncResult<ShoppingList> {
        Ok(self.db.shopping_lists().insert(OFFLINE_USER_ID, new).await?)
    }

    async fn delete_shopping_list(&self, id: ListId) -> SyncResult<()> {
        Ok(self.db.shopping_lists().delete(id).await?)
    }

    async fn reset(&self) -> SyncResult<()> {
        debug!("Resetting local backend");
        Ok(self.db.reset(OFFLINE_USER_ID).await?)
    }
}
