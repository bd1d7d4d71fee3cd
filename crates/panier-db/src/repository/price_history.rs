//! # Price History Repository
//!
//! Append-only price observations. A row is written when a product is
//! created and each time its price changes.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use panier_core::{PriceHistoryEntry, ProductId};

/// Repository for price history rows.
#[derive(Debug, Clone)]
pub struct PriceHistoryRepository {
    pool: SqlitePool,
}

impl PriceHistoryRepository {
    /// Creates a new PriceHistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PriceHistoryRepository { pool }
    }

    /// Lists a product's prices, oldest first.
    pub async fn list_for_product(&self, product_id: ProductId) -> DbResult<Vec<PriceHistoryEntry>> {
        let entries = sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            SELECT id, product_id, price_cents, user_id, created_at
            FROM price_history
            WHERE product_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Appends a price observation.
    pub async fn insert(
        &self,
        user_id: &str,
        product_id: ProductId,
        price_cents: i64,
    ) -> DbResult<PriceHistoryEntry> {
        debug!(product_id = %product_id, price_cents, "Recording price");

        let entry = sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            INSERT INTO price_history (product_id, price_cents, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, product_id, price_cents, user_id, created_at
            "#,
        )
        .bind(product_id)
        .bind(price_cents)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::{database, product, store};
    use panier_core::OFFLINE_USER_ID;

    #[tokio::test]
    async fn test_history_is_append_only_and_ordered() {
        let db = database().await;
        let s = store(&db, "Lidl").await;
        let p = product(&db, &s, "Café", 499).await;

        db.price_history().insert(OFFLINE_USER_ID, p.id, 529).await.unwrap();
        db.price_history().insert(OFFLINE_USER_ID, p.id, 549).await.unwrap();

        let prices: Vec<i64> = db
            .price_history()
            .list_for_product(p.id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.price_cents)
            .collect();
        assert_eq!(prices, vec![499, 529, 549]);
    }
}
