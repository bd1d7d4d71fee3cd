//! Application state shared by all commands.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use panier_core::{Store, StoreId};
use panier_sync::{
    open_backend, AuthClient, BarcodeClient, Level, Notification, Notifier, PanierConfig,
    ShoppingService, ShoppingSession,
};

/// Prints notifications the way a toast would show them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Success => println!("✔ {}", notification.message),
            Level::Error => eprintln!("✘ {}", notification.message),
        }
    }
}

pub struct AppState {
    pub config: PanierConfig,
    /// Present in remote mode only.
    pub auth: Option<AuthClient>,
    pub service: ShoppingService,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Restores the session (remote mode) and opens the backend.
    pub async fn init(config: PanierConfig) -> anyhow::Result<Self> {
        let auth = if config.mode().requires_auth() {
            let auth = AuthClient::from_config(&config)?;
            if let Some(session) = auth.restore().await? {
                info!(user_id = %session.user_id, "Session restored");
            }
            Some(auth)
        } else {
            None
        };

        let backend = open_backend(&config, auth.as_ref())
            .await
            .context("Failed to open backend")?;
        let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

        Ok(AppState {
            service: ShoppingService::new(backend, notifier.clone()),
            config,
            auth,
            notifier,
        })
    }

    /// The auth client, or an error in offline mode.
    pub fn auth(&self) -> anyhow::Result<&AuthClient> {
        self.auth
            .as_ref()
            .context("Not available in offline mode (see `panier mode`)")
    }

    pub async fn store(&self, id: StoreId) -> anyhow::Result<Store> {
        self.service
            .backend()
            .get_store(id)
            .await
            .with_context(|| format!("Magasin {} introuvable", id))
    }

    /// Opens a list session on a store.
    pub async fn session(&self, store_id: StoreId) -> anyhow::Result<ShoppingSession> {
        let store = self.store(store_id).await?;
        Ok(ShoppingSession::open(store, self.service.backend().clone(), self.notifier.clone()).await?)
    }

    pub fn barcode_client(&self) -> anyhow::Result<BarcodeClient> {
        Ok(BarcodeClient::from_config(&self.config)?)
    }
}
