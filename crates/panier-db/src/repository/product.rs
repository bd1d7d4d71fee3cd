//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Listing a store's products with their price history
//! - Creating a product together with its first price observation
//! - Partial updates (`ProductPatch`) for edits and list state
//!
//! ## Reads Join the History
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SELECT products ... ORDER BY name          (1 query)                  │
//! │  SELECT price_history ... ORDER BY created  (1 query, same filter)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  group history by product_id ──► Product.price_history (oldest first)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::price_history::PriceHistoryRepository;
use panier_core::{NewProduct, PriceHistoryEntry, Product, ProductId, ProductPatch, StoreId};

const PRODUCT_COLUMNS: &str = "id, store_id, user_id, name, price_cents, barcode, image_url, \
                               in_list, quantity, purchase_count, created_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let products = repo.list(OFFLINE_USER_ID, Some(store_id)).await?;
/// let updated = repo.update(id, &ProductPatch::list_state(2)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists the user's products ordered by name, optionally for one store.
    pub async fn list(&self, user_id: &str, store_id: Option<StoreId>) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products
             WHERE user_id = ?1 AND (?2 IS NULL OR store_id = ?2)
             ORDER BY name, id",
            PRODUCT_COLUMNS
        );
        let mut products = sqlx::query_as::<_, Product>(&sql)
            .bind(user_id)
            .bind(store_id)
            .fetch_all(&self.pool)
            .await?;

        let history = sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            SELECT ph.id, ph.product_id, ph.price_cents, ph.user_id, ph.created_at
            FROM price_history ph
            INNER JOIN products p ON p.id = ph.product_id
            WHERE p.user_id = ?1 AND (?2 IS NULL OR p.store_id = ?2)
            ORDER BY ph.created_at, ph.id
            "#,
        )
        .bind(user_id)
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_product: HashMap<ProductId, Vec<PriceHistoryEntry>> = HashMap::new();
        for entry in history {
            by_product.entry(entry.product_id).or_default().push(entry);
        }
        for product in &mut products {
            product.price_history = by_product.remove(&product.id).unwrap_or_default();
        }

        debug!(count = products.len(), store_id = ?store_id, "Listed products");
        Ok(products)
    }

    /// Gets a product by its ID, with its price history.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: ProductId) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match product {
            Some(mut product) => {
                product.price_history = self.history(id).await?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    /// Creates a product and records its initial price, in one transaction.
    ///
    /// New products start outside the list (`in_list = false`, `quantity = 0`).
    pub async fn insert(&self, user_id: &str, new: &NewProduct) -> DbResult<Product> {
        debug!(name = %new.name, store_id = %new.store_id, "Inserting product");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO products
                 (store_id, user_id, name, price_cents, barcode, image_url,
                  in_list, quantity, purchase_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, 0, ?7)
             RETURNING {}",
            PRODUCT_COLUMNS
        );
        let mut product = sqlx::query_as::<_, Product>(&sql)
            .bind(new.store_id)
            .bind(user_id)
            .bind(&new.name)
            .bind(new.price_cents)
            .bind(&new.barcode)
            .bind(&new.image_url)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let entry = sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            INSERT INTO price_history (product_id, price_cents, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, product_id, price_cents, user_id, created_at
            "#,
        )
        .bind(product.id)
        .bind(product.price_cents)
        .bind(user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        product.price_history = vec![entry];
        Ok(product)
    }

    /// Applies a partial update and returns the updated product.
    ///
    /// Only the fields set in `patch` are written. Price history is not
    /// touched here; the caller records a new price explicitly.
    pub async fn update(&self, id: ProductId, patch: &ProductPatch) -> DbResult<Product> {
        if patch.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", id));
        }

        debug!(id = %id, patch = ?patch, "Updating product");

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE products SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(name) = &patch.name {
                set.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(price) = patch.price_cents {
                set.push("price_cents = ").push_bind_unseparated(price);
            }
            if let Some(barcode) = &patch.barcode {
                set.push("barcode = ").push_bind_unseparated(barcode.clone());
            }
            if let Some(image_url) = &patch.image_url {
                set.push("image_url = ").push_bind_unseparated(image_url.clone());
            }
            if let Some(in_list) = patch.in_list {
                set.push("in_list = ").push_bind_unseparated(in_list);
            }
            if let Some(quantity) = patch.quantity {
                set.push("quantity = ").push_bind_unseparated(quantity);
            }
            if let Some(count) = patch.purchase_count {
                set.push("purchase_count = ").push_bind_unseparated(count);
            }
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(PRODUCT_COLUMNS);

        let mut product = qb
            .build_query_as::<Product>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        product.price_history = self.history(id).await?;
        Ok(product)
    }

    /// Deletes a product. Its price history and list items go with it.
    pub async fn delete(&self, id: ProductId) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    async fn history(&self, id: ProductId) -> DbResult<Vec<PriceHistoryEntry>> {
        PriceHistoryRepository::new(self.pool.clone())
            .list_for_product(id)
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
