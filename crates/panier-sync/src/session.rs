//! # Shopping Session
//!
//! The optimistic synchronizer for one store's list.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  session.add_to_list(id)                                                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  lock view ─► ListView::apply ─► (snapshot, remote write) ─► unlock     │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  observer.render(view)          ← the user sees the change now          │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  backend.update_product / delete_product   (awaited, no lock held)      │
//! │     │                                                                   │
//! │     ├── Ok  ─► done                                                     │
//! │     └── Err ─► lock view ─► revert(snapshot) ─► unlock                  │
//! │                 ─► render ─► notify error ─► Err to caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The view lock is never held across an `.await`. Mutations on different
//! products run independently; a rollback restores only the product it
//! snapshotted. Nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use panier_core::{
    Confirmation, CoreError, DestructiveAction, FinalizationPlan, ListView, Money, Mutation,
    ProductId, RemoteWrite, ShoppingList, Store,
};
use panier_export::{write_to_dir, ListSnapshot};

use crate::backend::ShoppingBackend;
use crate::error::{SyncError, SyncResult};
use crate::notify::Notifier;
use crate::realtime::ChangeNotice;

// =============================================================================
// Observer
// =============================================================================

/// Receives the view after every change (optimistic apply, rollback,
/// refresh, save).
pub trait ViewObserver: Send + Sync {
    fn render(&self, view: &ListView);
}

/// Outcome of saving the current list.
#[derive(Debug, Clone)]
pub struct SavedList {
    pub list: ShoppingList,
    /// Written PDF, `None` when generation failed.
    pub pdf_path: Option<PathBuf>,
    /// Products whose purchase count could not be updated.
    pub failed_updates: Vec<ProductId>,
}

fn mutation_messages(mutation: &Mutation) -> (Option<&'static str>, &'static str) {
    match mutation {
        Mutation::AddToList { .. } => (
            Some("Produit ajouté à la liste"),
            "Erreur lors de l'ajout à la liste",
        ),
        Mutation::RemoveFromList { .. } => (None, "Erreur lors du retrait de la liste"),
        Mutation::ChangeQuantity { .. } => (None, "Erreur lors de la mise à jour de la quantité"),
        Mutation::DeleteProduct { .. } => (
            Some("Produit supprimé avec succès"),
            "Erreur lors de la suppression du produit",
        ),
    }
}

// =============================================================================
// Session
// =============================================================================

/// One store's current list, kept in step with a backend.
///
/// Cheap to clone; clones share the same view.
#[derive(Clone)]
pub struct ShoppingSession {
    store: Store,
    backend: Arc<dyn ShoppingBackend>,
    notifier: Arc<dyn Notifier>,
    view: Arc<Mutex<ListView>>,
    observer: Option<Arc<dyn ViewObserver>>,
}

impl ShoppingSession {
    /// Creates a session with an empty view. Call `refresh` to load it.
    pub fn new(store: Store, backend: Arc<dyn ShoppingBackend>, notifier: Arc<dyn Notifier>) -> Self {
        ShoppingSession {
            store,
            backend,
            notifier,
            view: Arc::new(Mutex::new(ListView::new())),
            observer: None,
        }
    }

    /// Creates a session and loads the store's products.
    pub async fn open(
        store: Store,
        backend: Arc<dyn ShoppingBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> SyncResult<Self> {
        let session = ShoppingSession::new(store, backend, notifier);
        session.refresh().await?;
        Ok(session)
    }

    pub fn with_observer(mut self, observer: Arc<dyn ViewObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Copy of the current view.
    pub fn view(&self) -> ListView {
        self.lock().clone()
    }

    pub fn total(&self) -> Money {
        self.lock().total()
    }

    fn lock(&self) -> MutexGuard<'_, ListView> {
        // The view stays consistent between statements, so a panic
        // elsewhere does not invalidate it
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Renders a copy so the observer may call back into the session.
    fn render(&self) {
        if let Some(observer) = &self.observer {
            let view = self.view();
            observer.render(&view);
        }
    }

    // =========================================================================
    // Reload
    // =========================================================================

    /// Reloads the store's products and re-partitions the view.
    pub async fn refresh(&self) -> SyncResult<()> {
        match self.backend.list_products(Some(self.store.id)).await {
            Ok(products) => {
                debug!(store_id = %self.store.id, count = products.len(), "View refreshed");
                self.lock().replace(products);
                self.render();
                Ok(())
            }
            Err(e) => {
                error!(store_id = %self.store.id, error = %e, "Refresh failed");
                self.notifier.error("Erreur lors du chargement des produits");
                Err(e)
            }
        }
    }

    /// Refreshes on every change notice for this store until the feed
    /// closes.
    pub fn follow(&self, mut notices: mpsc::Receiver<ChangeNotice>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                if notice.store_id != session.store.id {
                    continue;
                }
                debug!(kind = ?notice.kind, product_id = ?notice.product_id, "Remote change");
                // Failures are already notified by refresh
                let _ = session.refresh().await;
            }
            debug!(store_id = %session.store.id, "Change notices closed");
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub async fn add_to_list(&self, product_id: ProductId) -> SyncResult<()> {
        self.apply(Mutation::AddToList { product_id }).await
    }

    pub async fn remove_from_list(&self, product_id: ProductId) -> SyncResult<()> {
        self.apply(Mutation::RemoveFromList { product_id }).await
    }

    /// Takes every product off the current list without saving it.
    ///
    /// Each removal is its own optimistic mutation, so a failed write
    /// reverts only that product. Returns the products left on the list.
    pub async fn clear_list(&self) -> Vec<ProductId> {
        let ids: Vec<ProductId> = self.lock().in_list().iter().map(|p| p.id).collect();

        let mut failed = Vec::new();
        for product_id in ids {
            // Failures are already reverted and notified by apply
            if self.remove_from_list(product_id).await.is_err() {
                failed.push(product_id);
            }
        }

        if failed.is_empty() {
            info!(store_id = %self.store.id, "List cleared");
        } else {
            warn!(store_id = %self.store.id, kept = failed.len(), "List partially cleared");
        }
        failed
    }

    /// Sets a quantity; zero takes the product off the list.
    pub async fn change_quantity(&self, product_id: ProductId, quantity: i64) -> SyncResult<()> {
        self.apply(Mutation::ChangeQuantity {
            product_id,
            quantity,
        })
        .await
    }

    pub async fn delete_product(
        &self,
        product_id: ProductId,
        confirmation: &Confirmation,
    ) -> SyncResult<()> {
        if let Err(e) = confirmation.authorize(DestructiveAction::DeleteProduct { product_id }) {
            let e = SyncError::from(e);
            warn!(product_id = %product_id, error = %e, "Delete not authorized");
            self.notifier.error("Erreur lors de la suppression du produit");
            return Err(e);
        }
        self.apply(Mutation::DeleteProduct { product_id }).await
    }

    /// Applies a mutation optimistically, then persists it.
    ///
    /// ## Flow
    /// 1. Compute and show the new view (rejects unknown products and bad
    ///    quantities before anything changes)
    /// 2. Issue the backend write
    /// 3. On failure restore the snapshot, show it, notify
    pub async fn apply(&self, mutation: Mutation) -> SyncResult<()> {
        let (success, failure) = mutation_messages(&mutation);

        let applied = match self.lock().apply(&mutation) {
            Ok(applied) => applied,
            Err(e) => {
                let e = SyncError::from(e);
                warn!(mutation = mutation.label(), error = %e, "Mutation rejected");
                let message = match e {
                    SyncError::Core(CoreError::ProductNotFound(_)) => "Produit non trouvé",
                    _ => failure,
                };
                self.notifier.error(message);
                return Err(e);
            }
        };
        self.render();

        let result = match &applied.remote {
            RemoteWrite::Patch { product_id, patch } => self
                .backend
                .update_product(*product_id, patch)
                .await
                .map(|_| ()),
            RemoteWrite::Delete { product_id } => self.backend.delete_product(*product_id).await,
        };

        match result {
            Ok(()) => {
                debug!(mutation = mutation.label(), product_id = %mutation.product_id(), "Mutation persisted");
                if let Some(message) = success {
                    self.notifier.success(message);
                }
                Ok(())
            }
            Err(e) => {
                error!(
                    mutation = mutation.label(),
                    product_id = %mutation.product_id(),
                    error = %e,
                    "Mutation failed, reverting"
                );
                self.lock().revert(applied.snapshot);
                self.render();
                self.notifier.error(failure);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Saves the current list, updates purchase counts and writes the PDF
    /// into `export_dir`.
    ///
    /// ## Flow
    /// 1. Plan from the in-list products (fails on an empty list)
    /// 2. Persist the list and its items (fails the whole save)
    /// 3. Update each product's purchase count (failures are reported, not
    ///    undone)
    /// 4. Move the saved products back to `available`
    /// 5. Write the PDF (failure is reported, the list stays saved)
    pub async fn save_list(&self, export_dir: &Path) -> SyncResult<SavedList> {
        let products = self.lock().in_list().to_vec();

        let plan = match FinalizationPlan::new(self.store.id, &products, Utc::now()) {
            Ok(plan) => plan,
            Err(e) => {
                self.notifier.error(&e.to_string());
                return Err(e.into());
            }
        };

        let list = match self.backend.create_shopping_list(&plan.new_list()).await {
            Ok(list) => list,
            Err(e) => {
                error!(store_id = %self.store.id, error = %e, "Saving list failed");
                self.notifier.error("Erreur lors de la sauvegarde de la liste");
                return Err(e);
            }
        };

        let mut failed_updates = Vec::new();
        for update in &plan.updates {
            if let Err(e) = self
                .backend
                .update_product(update.product_id, &update.patch())
                .await
            {
                error!(product_id = %update.product_id, error = %e, "Purchase count update failed");
                failed_updates.push(update.product_id);
            }
        }
        if !failed_updates.is_empty() {
            self.notifier.error("Erreur lors de la mise à jour du produit");
        }

        self.lock().apply_finalization(&plan.updates);
        self.render();

        let snapshot = ListSnapshot::from_products(&self.store.name, &products, plan.created_at);
        let pdf_path = match write_to_dir(&snapshot, export_dir) {
            Ok(path) => {
                self.notifier.success("PDF téléchargé");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "PDF generation failed");
                self.notifier.error("Erreur lors de la génération du PDF");
                None
            }
        };

        info!(
            list_id = %list.id,
            total = %plan.total,
            items = list.items.len(),
            "List saved"
        );
        self.notifier.success("Liste sauvegardée avec succès");

        Ok(SavedList {
            list,
            pdf_path,
            failed_updates,
        })
    }
}
