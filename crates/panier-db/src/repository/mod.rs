//! # Repository Module
//!
//! One repository per table family of the offline store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LocalBackend (panier-sync)                                            │
//! │       │                                                                 │
//! │       │  db.products().list(user_id, Some(store_id))                   │
//! │       ▼                                                                 │
//! │  ProductRepository ──► SQL ──► SQLite                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`StoreRepository`](store::StoreRepository) - Store CRUD
//! - [`ProductRepository`](product::ProductRepository) - Products with their price history
//! - [`PriceHistoryRepository`](price_history::PriceHistoryRepository) - Append-only prices
//! - [`ShoppingListRepository`](shopping_list::ShoppingListRepository) - Saved lists and items

pub mod price_history;
pub mod product;
pub mod shopping_list;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support {
    use panier_core::{NewProduct, Product, Store, OFFLINE_USER_ID};

    use crate::{Database, DbConfig};

    pub async fn database() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn store(db: &Database, name: &str) -> Store {
        db.stores().insert(OFFLINE_USER_ID, name).await.unwrap()
    }

    pub async fn product(db: &Database, store: &Store, name: &str, price_cents: i64) -> Product {
        db.products()
            .insert(
                OFFLINE_USER_ID,
                &NewProduct {
                    store_id: store.id,
                    name: name.to_string(),
                    price_cents,
                    barcode: None,
                    image_url: None,
                },
            )
            .await
            .unwrap()
    }
}
