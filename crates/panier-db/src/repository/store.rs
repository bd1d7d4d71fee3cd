//! # Store Repository
//!
//! Database operations for stores. Deleting a store cascades to its
//! products, their price history and list items, and its shopping lists.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use panier_core::{Store, StoreId};

/// Repository for store database operations.
#[derive(Debug, Clone)]
pub struct StoreRepository {
    pool: SqlitePool,
}

impl StoreRepository {
    /// Creates a new StoreRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StoreRepository { pool }
    }

    /// Lists the user's stores ordered by name.
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<Store>> {
        let stores = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, name, user_id, created_at
            FROM stores
            WHERE user_id = ?1
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = stores.len(), "Listed stores");
        Ok(stores)
    }

    /// Gets a store by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Store))` - Store found
    /// * `Ok(None)` - Store not found
    pub async fn get_by_id(&self, id: StoreId) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            "SELECT id, name, user_id, created_at FROM stores WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    /// Creates a store and returns the stored row.
    pub async fn insert(&self, user_id: &str, name: &str) -> DbResult<Store> {
        debug!(name = %name, "Inserting store");

        let store = sqlx::query_as::<_, Store>(
            r#"
            INSERT INTO stores (name, user_id, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, user_id, created_at
            "#,
        )
        .bind(name)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(store)
    }

    /// Renames a store.
    pub async fn rename(&self, id: StoreId, name: &str) -> DbResult<Store> {
        debug!(id = %id, name = %name, "Renaming store");

        sqlx::query_as::<_, Store>(
            r#"
            UPDATE stores SET name = ?1
            WHERE id = ?2
            RETURNING id, name, user_id, created_at
            "#,
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Store", id))
    }

    /// Deletes a store and everything hanging off it.
    pub async fn delete(&self, id: StoreId) -> DbResult<()> {
        debug!(id = %id, "Deleting store");

        let result = sqlx::query("DELETE FROM stores WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Store", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
