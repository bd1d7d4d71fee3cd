//! # panier-sync: Backends, Session and Network Clients for Panier
//!
//! Everything that leaves the process, plus the optimistic session that
//! keeps a store's list in step with a backend.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          panier-sync                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌──────────────────────┐                   │
//! │  │ ShoppingSession      │   │ ShoppingService      │                   │
//! │  │ optimistic apply,    │   │ CRUD + notification  │                   │
//! │  │ revert, save, PDF    │   │ per operation        │                   │
//! │  └──────────┬───────────┘   └──────────┬───────────┘                   │
//! │             └─────────────┬────────────┘                               │
//! │                           ▼                                             │
//! │              ┌────────────────────────┐                                 │
//! │              │ Arc<dyn ShoppingBackend>│                                │
//! │              └─────┬────────────┬─────┘                                 │
//! │                    ▼            ▼                                       │
//! │       ┌──────────────────┐ ┌──────────────────┐                        │
//! │       │ RemoteGateway    │ │ LocalBackend     │                        │
//! │       │ REST + AuthClient│ │ panier-db SQLite │                        │
//! │       └──────────────────┘ └──────────────────┘                        │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌──────────────────────┐                   │
//! │  │ ChangeFeed           │   │ BarcodeClient        │                   │
//! │  │ realtime websocket   │   │ OpenFoodFacts lookup │                   │
//! │  │ → session.refresh()  │   │ → draft enrichment   │                   │
//! │  └──────────────────────┘   └──────────────────────┘                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`backend`] - The `ShoppingBackend` trait
//! - [`remote`] - REST gateway to the hosted backend
//! - [`local`] - Offline backend over `panier-db`
//! - [`auth`] - OAuth session, token refresh, sign-out
//! - [`session`] - Optimistic synchronizer and list finalization
//! - [`service`] - Notifying CRUD operations
//! - [`barcode`] - Barcode lookups
//! - [`realtime`] - Product change feed
//! - [`notify`] - User notifications
//! - [`config`] - `panier.toml` loading and validation
//! - [`error`] - Error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use panier_sync::{open_backend, AuthClient, PanierConfig, ShoppingSession, TracingNotifier};
//!
//! let config = PanierConfig::read(None)?;
//! config.validate()?;
//! let auth = AuthClient::from_config(&config)?;
//! auth.restore().await?;
//!
//! let backend = open_backend(&config, Some(&auth)).await?;
//! let store = backend.get_store(3).await?;
//! let session = ShoppingSession::open(store, backend, Arc::new(TracingNotifier)).await?;
//!
//! session.add_to_list(12).await?;
//! session.save_list(&config.export_dir()).await?;
//! ```

use std::sync::Arc;

use tracing::info;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod backend;
pub mod barcode;
pub mod config;
pub mod error;
mod http;
pub mod local;
pub mod notify;
pub mod realtime;
pub mod remote;
pub mod service;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{AuthClient, Credentials, Session};
pub use backend::ShoppingBackend;
pub use barcode::{enrich, BarcodeClient, BarcodeProduct};
pub use config::{BackendMode, PanierConfig};
pub use error::{SyncError, SyncResult};
pub use local::LocalBackend;
pub use notify::{Level, Notification, Notifier, RecordingNotifier, TracingNotifier};
pub use realtime::{ChangeFeed, ChangeKind, ChangeNotice, ConnectionState, FeedConfig, FeedHandle};
pub use remote::RemoteGateway;
pub use service::{ProductEdit, ShoppingService};
pub use session::{SavedList, ShoppingSession, ViewObserver};

/// Opens the backend selected by `config.backend.mode`.
///
/// Remote mode needs an `auth` client (its session may arrive later);
/// offline mode ignores it and opens, migrating if needed, the local store
/// file.
pub async fn open_backend(
    config: &PanierConfig,
    auth: Option<&AuthClient>,
) -> SyncResult<Arc<dyn ShoppingBackend>> {
    match config.mode() {
        BackendMode::Remote => {
            let auth = auth.ok_or(SyncError::NotAuthenticated)?;
            info!("Using remote backend");
            Ok(Arc::new(RemoteGateway::from_config(config, auth.clone())?))
        }
        BackendMode::Offline => {
            let path = config.database_path()?;
            info!(path = %path.display(), "Using offline store");
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let backend = LocalBackend::open(panier_db::DbConfig::new(path)).await?;
            Ok(Arc::new(backend))
        }
    }
}
