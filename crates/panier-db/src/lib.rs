//! # panier-db: Offline Store for Panier
//!
//! Local SQLite storage mirroring the remote tables, used when the user
//! runs in offline mode.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Panier Offline Data Flow                         │
//! │                                                                         │
//! │  ShoppingSession / ShoppingService (panier-sync)                       │
//! │       │                                                                 │
//! │       ▼  LocalBackend                                                  │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     panier-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐  ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories    │  │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  stores          │  │  (embedded)  │  │   │
//! │  │   │               │◄───│  products        │  │              │  │   │
//! │  │   │  SqlitePool   │    │  price_history   │  │ 001_initial  │  │   │
//! │  │   │               │    │  shopping_lists  │  │              │  │   │
//! │  │   └───────────────┘    └──────────────────┘  └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ~/.local/share/panier/panier.db (platform data dir)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use panier_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("panier.db")).await?;
//! let stores = db.stores().list(OFFLINE_USER_ID).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::price_history::PriceHistoryRepository;
pub use repository::product::ProductRepository;
pub use repository::shopping_list::ShoppingListRepository;
pub use repository::store::StoreRepository;
