//! # Database Pool Management
//!
//! Connection pool creation and configuration for the offline store.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CLI startup (offline mode)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.stores() / db.products() / db.price_history() / db.shopping_lists()│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SQLite Settings
//! - WAL journal: readers don't block the writer
//! - NORMAL synchronous
//! - Foreign keys ON (cascading deletes rely on it)

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::price_history::PriceHistoryRepository;
use crate::repository::product::ProductRepository;
use crate::repository::shopping_list::ShoppingListRepository;
use crate::repository::store::StoreRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/panier.db").max_connections(2);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 4 (a single user, a handful of concurrent calls)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    pub min_connections: u32,

    /// Connection timeout duration.
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// In-memory SQLite lives in a single connection, so the pool is
    /// capped at one and every repository method runs its statements on
    /// that one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(3600),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Offline store handle providing repository access.
///
/// Cheap to clone: clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Creates the connection pool and, if enabled, runs migrations.
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing offline store"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite ships with foreign keys off; cascades need them on
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the store repository.
    pub fn stores(&self) -> StoreRepository {
        StoreRepository::new(self.pool.clone())
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the price history repository.
    pub fn price_history(&self) -> PriceHistoryRepository {
        PriceHistoryRepository::new(self.pool.clone())
    }

    /// Returns the shopping list repository.
    pub fn shopping_lists(&self) -> ShoppingListRepository {
        ShoppingListRepository::new(self.pool.clone())
    }

    /// Deletes every row owned by `user_id`.
    ///
    /// ## Order
    /// ```text
    /// shopping_list_items → shopping_lists → price_history → products → stores
    /// ```
    /// Children go first so the wipe doesn't depend on cascades, and the
    /// whole wipe is one transaction.
    pub async fn reset(&self, user_id: &str) -> DbResult<()> {
        info!(user_id = %user_id, "Resetting offline store");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM shopping_list_items
             WHERE list_id IN (SELECT id FROM shopping_lists WHERE user_id = ?1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        for table in ["shopping_lists", "price_history", "products", "stores"] {
            let sql = format!("DELETE FROM {} WHERE user_id = ?1", table);
            let result = sqlx::query(&sql).bind(user_id).execute(&mut *tx).await?;
            debug!(table, rows = result.rows_affected(), "Table cleared");
        }

        tx.commit().await?;

        info!("Offline store reset");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use panier_core::{NewProduct, OFFLINE_USER_ID};

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panier.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();

        assert!(path.exists());
        assert_eq!(total, applied);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert!(!config.run_migrations);
    }

    #[tokio::test]
    async fn test_reset_only_removes_the_users_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mine = db.stores().insert(OFFLINE_USER_ID, "Carrefour").await.unwrap();
        let theirs = db.stores().insert("someone-else", "Lidl").await.unwrap();
        db.products()
            .insert(
                OFFLINE_USER_ID,
                &NewProduct {
                    store_id: mine.id,
                    name: "Lait".to_string(),
                    price_cents: 115,
                    barcode: None,
                    image_url: None,
                },
            )
            .await
            .unwrap();

        db.reset(OFFLINE_USER_ID).await.unwrap();

        assert!(db.stores().list(OFFLINE_USER_ID).await.unwrap().is_empty());
        assert!(db.products().list(OFFLINE_USER_ID, None).await.unwrap().is_empty());
        assert_eq!(db.stores().list("someone-else").await.unwrap(), vec![theirs]);
    }
}
