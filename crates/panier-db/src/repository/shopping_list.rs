//! # Shopping List Repository
//!
//! Saved shopping lists and their items.
//!
//! ## List Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. SAVE                                                                │
//! │     └── insert() → list row + item rows (one transaction)              │
//! │                                                                         │
//! │  2. READ                                                                │
//! │     └── list() / get_by_id() → items joined with their product         │
//! │                                                                         │
//! │  3. DELETE                                                              │
//! │     └── delete() → purchase_count -= item quantity (floored at 0)      │
//! │                    for every item, then the list and its items         │
//! │                    (one transaction)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lists are never updated after they are saved.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use panier_core::{
    decremented_purchase_count, ListId, NewShoppingList, ProductId, ShoppingList,
    ShoppingListItem, StoreId,
};

const LIST_COLUMNS: &str = "id, store_id, user_id, total_cents, week_number, created_at";

const ITEM_SELECT: &str = "SELECT i.id, i.list_id, i.product_id, p.name AS product_name, \
                           p.image_url, i.quantity, i.price_cents \
                           FROM shopping_list_items i \
                           INNER JOIN products p ON p.id = i.product_id";

/// Repository for saved shopping lists.
#[derive(Debug, Clone)]
pub struct ShoppingListRepository {
    pool: SqlitePool,
}

impl ShoppingListRepository {
    /// Creates a new ShoppingListRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShoppingListRepository { pool }
    }

    /// Lists the user's saved lists, newest first, with their items.
    pub async fn list(&self, user_id: &str, store_id: Option<StoreId>) -> DbResult<Vec<ShoppingList>> {
        let sql = format!(
            "SELECT {} FROM shopping_lists
             WHERE user_id = ?1 AND (?2 IS NULL OR store_id = ?2)
             ORDER BY created_at DESC, id DESC",
            LIST_COLUMNS
        );
        let mut lists = sqlx::query_as::<_, ShoppingList>(&sql)
            .bind(user_id)
            .bind(store_id)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "{} INNER JOIN shopping_lists l ON l.id = i.list_id
             WHERE l.user_id = ?1 AND (?2 IS NULL OR l.store_id = ?2)
             ORDER BY i.id",
            ITEM_SELECT
        );
        let items = sqlx::query_as::<_, ShoppingListItem>(&sql)
            .bind(user_id)
            .bind(store_id)
            .fetch_all(&self.pool)
            .await?;

        let mut by_list: HashMap<ListId, Vec<ShoppingListItem>> = HashMap::new();
        for item in items {
            by_list.entry(item.list_id).or_default().push(item);
        }
        for list in &mut lists {
            list.items = by_list.remove(&list.id).unwrap_or_default();
        }

        debug!(count = lists.len(), "Listed shopping lists");
        Ok(lists)
    }

    /// Gets a saved list with its items.
    pub async fn get_by_id(&self, id: ListId) -> DbResult<Option<ShoppingList>> {
        let mut conn = self.pool.acquire().await?;
        fetch_list(&mut conn, id).await
    }

    /// Saves a list and its items in one transaction.
    pub async fn insert(&self, user_id: &str, new: &NewShoppingList) -> DbResult<ShoppingList> {
        debug!(
            store_id = %new.store_id,
            items = new.items.len(),
            total_cents = new.total_cents,
            "Saving shopping list"
        );

        let mut tx = self.pool.begin().await?;

        let list_id: ListId = sqlx::query_scalar(
            r#"
            INSERT INTO shopping_lists (store_id, user_id, total_cents, week_number, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(new.store_id)
        .bind(user_id)
        .bind(new.total_cents)
        .bind(new.week_number)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for item in &new.items {
            sqlx::query(
                r#"
                INSERT INTO shopping_list_items (list_id, product_id, quantity, price_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(list_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price_cents)
            .execute(&mut *tx)
            .await?;
        }

        let list = fetch_list(&mut tx, list_id)
            .await?
            .ok_or_else(|| DbError::not_found("ShoppingList", list_id))?;

        tx.commit().await?;
        Ok(list)
    }

    /// Deletes a saved list, giving back its quantities.
    ///
    /// Each item's product has its `purchase_count` decremented by the
    /// item quantity, never below zero.
    pub async fn delete(&self, id: ListId) -> DbResult<()> {
        debug!(id = %id, "Deleting shopping list");

        let mut tx = self.pool.begin().await?;

        let exists: Option<ListId> = sqlx::query_scalar("SELECT id FROM shopping_lists WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("ShoppingList", id));
        }

        let counts: Vec<(ProductId, i64, i64)> = sqlx::query_as(
            r#"
            SELECT i.product_id, i.quantity, p.purchase_count
            FROM shopping_list_items i
            INNER JOIN products p ON p.id = i.product_id
            WHERE i.list_id = ?1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (product_id, quantity, purchase_count) in counts {
            sqlx::query("UPDATE products SET purchase_count = ?1 WHERE id = ?2")
                .bind(decremented_purchase_count(purchase_count, quantity))
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM shopping_list_items WHERE list_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM shopping_lists WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn fetch_list(conn: &mut SqliteConnection, id: ListId) -> DbResult<Option<ShoppingList>> {
    let sql = format!("SELECT {} FROM shopping_lists WHERE id = ?1", LIST_COLUMNS);
    let list = sqlx::query_as::<_, ShoppingList>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(mut list) = list else {
        return Ok(None);
    };

    let sql = format!("{} WHERE i.list_id = ?1 ORDER BY i.id", ITEM_SELECT);
    list.items = sqlx::query_as::<_, ShoppingListItem>(&sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Some(list))
}

// =============================================================================
// Unit Tests
// =============================================================================
