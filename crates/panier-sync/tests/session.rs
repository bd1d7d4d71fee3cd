//! End-to-end synchronizer behaviour over the offline store, and over a
//! backend whose writes fail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use panier_core::{
    DestructiveAction, ListId, ListView, NewProduct, NewShoppingList, PriceHistoryEntry, Product, ProductId,
    ProductPatch, ShoppingList, Store, StoreId,
};
use panier_db::DbConfig;
use panier_sync::{
    LocalBackend, RecordingNotifier, ShoppingBackend, ShoppingService, ShoppingSession, SyncError,
    SyncResult, ViewObserver,
};

/// Local backend whose product writes can be switched to fail, for every
/// product or for a single one.
struct FlakyBackend {
    inner: LocalBackend,
    fail_writes: AtomicBool,
    fail_product: Mutex<Option<ProductId>>,
}

impl FlakyBackend {
    fn failing(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn failing_for(&self, product_id: ProductId) {
        *self.fail_product.lock().unwrap() = Some(product_id);
    }

    fn check(&self, product_id: ProductId) -> SyncResult<()> {
        let targeted = *self.fail_product.lock().unwrap() == Some(product_id);
        if targeted || self.fail_writes.load(Ordering::SeqCst) {
            Err(SyncError::Http {
                status: 503,
                message: "unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ShoppingBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn list_stores(&self) -> SyncResult<Vec<Store>> {
        self.inner.list_stores().await
    }

    async fn get_store(&self, id: StoreId) -> SyncResult<Store> {
        self.inner.get_store(id).await
    }

    async fn create_store(&self, name: &str) -> SyncResult<Store> {
        self.inner.create_store(name).await
    }

    async fn rename_store(&self, id: StoreId, name: &str) -> SyncResult<Store> {
        self.inner.rename_store(id, name).await
    }

    async fn delete_store(&self, id: StoreId) -> SyncResult<()> {
        self.inner.delete_store(id).await
    }

    async fn list_products(&self, store_id: Option<StoreId>) -> SyncResult<Vec<Product>> {
        self.inner.list_products(store_id).await
    }

    async fn create_product(&self, new: &NewProduct) -> SyncResult<Product> {
        self.inner.create_product(new).await
    }

    async fn update_product(&self, id: ProductId, patch: &ProductPatch) -> SyncResult<Product> {
        self.check(id)?;
        self.inner.update_product(id, patch).await
    }

    async fn delete_product(&self, id: ProductId) -> SyncResult<()> {
        self.check(id)?;
        self.inner.delete_product(id).await
    }

    async fn price_history(&self, product_id: ProductId) -> SyncResult<Vec<PriceHistoryEntry>> {
        self.inner.price_history(product_id).await
    }

    async fn record_price(
        &self,
        product_id: ProductId,
        price_cents: i64,
    ) -> SyncResult<PriceHistoryEntry> {
        self.inner.record_price(product_id, price_cents).await
    }

    async fn list_shopping_lists(
        &self,
        store_id: Option<StoreId>,
    ) -> SyncResult<Vec<ShoppingList>> {
        self.inner.list_shopping_lists(store_id).await
    }

    async fn create_shopping_list(&self, new: &NewShoppingList) -> SyncResult<ShoppingList> {
        self.inner.create_shopping_list(new).await
    }

    async fn delete_shopping_list(&self, id: ListId) -> SyncResult<()> {
        self.inner.delete_shopping_list(id).await
    }

    async fn reset(&self) -> SyncResult<()> {
        self.inner.reset().await
    }
}

async fn seeded() -> (Arc<FlakyBackend>, Store, RecordingNotifier) {
    let inner = LocalBackend::open(DbConfig::in_memory()).await.unwrap();
    let store = inner.create_store("Carrefour").await.unwrap();
    for (name, price) in [("Beurre", 259), ("Lait", 115), ("Pommes", 349)] {
        inner
            .create_product(&NewProduct {
                store_id: store.id,
                name: name.to_string(),
                price_cents: price,
                barcode: None,
                image_url: None,
            })
            .await
            .unwrap();
    }

    let backend = Arc::new(FlakyBackend {
        inner,
        fail_writes: AtomicBool::new(false),
        fail_product: Mutex::new(None),
    });
    (backend, store, RecordingNotifier::new())
}

async fn session_for(
    backend: &Arc<FlakyBackend>,
    store: &Store,
    notifier: &RecordingNotifier,
) -> ShoppingSession {
    ShoppingSession::open(
        store.clone(),
        backend.clone(),
        Arc::new(notifier.clone()),
    )
    .await
    .unwrap()
}

/// Keeps every rendered view.
#[derive(Default)]
struct RecordingObserver {
    views: Mutex<Vec<ListView>>,
}

impl RecordingObserver {
    fn count(&self) -> usize {
        self.views.lock().unwrap().len()
    }

    fn last(&self) -> Option<ListView> {
        self.views.lock().unwrap().last().cloned()
    }
}

impl ViewObserver for RecordingObserver {
    fn render(&self, view: &ListView) {
        self.views.lock().unwrap().push(view.clone());
    }
}

fn product_id(session: &ShoppingSession, name: &str) -> ProductId {
    let view = session.view();
    view.available()
        .iter()
        .chain(view.in_list())
        .find(|p| p.name == name)
        .map(|p| p.id)
        .unwrap()
}

#[tokio::test]
async fn add_then_remove_round_trips_list_state() {
    let (backend, store, notifier) = seeded().await;
    let session = session_for(&backend, &store, &notifier).await;
    let lait = product_id(&session, "Lait");

    session.add_to_list(lait).await.unwrap();
    let product = session.view().get(lait).cloned().unwrap();
    assert!(product.in_list);
    assert_eq!(product.quantity, 1);

    session.remove_from_list(lait).await.unwrap();
    let product = session.view().get(lait).cloned().unwrap();
    assert!(!product.in_list);
    assert_eq!(product.quantity, 0);

    // A fresh reload agrees with the optimistic view
    let before = session.view();
    session.refresh().await.unwrap();
    assert_eq!(session.view().get(lait), before.get(lait));
}

#[tokio::test]
async fn failed_write_reverts_exactly() {
    let (backend, store, notifier) = seeded().await;
    let observer = Arc::new(RecordingObserver::default());
    let session = session_for(&backend, &store, &notifier)
        .await
        .with_observer(observer.clone());
    let beurre = product_id(&session, "Beurre");
    let lait = product_id(&session, "Lait");

    session.change_quantity(beurre, 4).await.unwrap();
    let before = session.view();

    backend.failing(true);
    let rendered = observer.count();
    let err = session.change_quantity(beurre, 7).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(session.view(), before);
    // Optimistic apply, then the rollback
    assert_eq!(observer.count(), rendered + 2);
    assert_eq!(observer.last(), Some(before.clone()));

    let err = session.add_to_list(lait).await.unwrap_err();
    assert!(matches!(err, SyncError::Http { status: 503, .. }));
    assert_eq!(session.view(), before);
    assert_eq!(observer.last(), Some(before.clone()));

    let rendered = observer.count();
    session.refresh().await.unwrap();
    assert_eq!(observer.count(), rendered + 1);
    assert_eq!(observer.last(), Some(session.view()));

    assert_eq!(
        notifier.errors(),
        vec![
            "Erreur lors de la mise à jour de la quantité",
            "Erreur lors de l'ajout à la liste",
        ]
    );
}

#[tokio::test]
async fn failed_delete_restores_product_in_place() {
    let (backend, store, notifier) = seeded().await;
    let session = session_for(&backend, &store, &notifier).await;
    let lait = product_id(&session, "Lait");
    let before = session.view();

    backend.failing(true);
    let confirmation = DestructiveAction::DeleteProduct { product_id: lait }
        .confirm("oui")
        .unwrap();
    session.delete_product(lait, &confirmation).await.unwrap_err();

    assert_eq!(session.view(), before);
    assert_eq!(session.view().available()[1].name, "Lait");
}

#[tokio::test]
async fn rollback_leaves_other_products_alone() {
    let (backend, store, notifier) = seeded().await;
    let session = session_for(&backend, &store, &notifier).await;
    let beurre = product_id(&session, "Beurre");
    let pommes = product_id(&session, "Pommes");

    session.add_to_list(pommes).await.unwrap();
    backend.failing(true);
    session.add_to_list(beurre).await.unwrap_err();

    let view = session.view();
    assert_eq!(view.in_list().len(), 1);
    assert_eq!(view.in_list()[0].id, pommes);
    assert!(!view.get(beurre).unwrap().in_list);
}

#[tokio::test]
async fn saved_total_matches_items_and_deletion_gives_counts_back() {
    let (backend, store, notifier) = seeded().await;
    let session = session_for(&backend, &store, &notifier).await;
    let beurre = product_id(&session, "Beurre");
    let pommes = product_id(&session, "Pommes");
    let dir = tempfile::tempdir().unwrap();

    session.change_quantity(beurre, 2).await.unwrap();
    session.change_quantity(pommes, 3).await.unwrap();
    let expected_total = session.total();

    let saved = session.save_list(dir.path()).await.unwrap();
    let items_total: i64 = saved
        .list
        .items
        .iter()
        .map(|item| item.line_total().cents())
        .sum();
    assert_eq!(saved.list.total_cents, expected_total.cents());
    assert_eq!(items_total, saved.list.total_cents);

    // Second purchase of beurre only
    session.add_to_list(beurre).await.unwrap();
    session.save_list(dir.path()).await.unwrap();

    let service = ShoppingService::new(backend.clone(), Arc::new(notifier.clone()));
    let confirmation = DestructiveAction::DeleteShoppingList {
        list_id: saved.list.id,
    }
    .confirm("o")
    .unwrap();
    service
        .delete_shopping_list(saved.list.id, &confirmation)
        .await
        .unwrap();

    let products = service.products(Some(store.id)).await;
    let count = |id: ProductId| {
        products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.purchase_count)
            .unwrap()
    };
    assert_eq!(count(beurre), 1);
    assert_eq!(count(pommes), 0);
    assert_eq!(service.shopping_lists(Some(store.id)).await.len(), 1);
}

#[tokio::test]
async fn failed_purchase_updates_do_not_undo_the_list() {
    let (backend, store, notifier) = seeded().await;
    let session = session_for(&backend, &store, &notifier).await;
    let lait = product_id(&session, "Lait");
    let dir = tempfile::tempdir().unwrap();

    session.add_to_list(lait).await.unwrap();
    backend.failing(true);

    let saved = session.save_list(dir.path()).await.unwrap();

    assert_eq!(saved.failed_updates, vec![lait]);
    assert!(saved.pdf_path.is_some());
    assert_eq!(backend.list_shopping_lists(None).await.unwrap().len(), 1);
    assert!(notifier
        .errors()
        .contains(&"Erreur lors de la mise à jour du produit".to_string()));
}

#[tokio::test]
async fn clear_list_reverts_only_the_failed_product() {
    let (backend, store, notifier) = seeded().await;
    let session = session_for(&backend, &store, &notifier).await;
    let beurre = product_id(&session, "Beurre");
    let lait = product_id(&session, "Lait");
    let pommes = product_id(&session, "Pommes");

    session.change_quantity(beurre, 2).await.unwrap();
    session.add_to_list(lait).await.unwrap();
    session.change_quantity(pommes, 5).await.unwrap();

    backend.failing_for(lait);
    let kept = session.clear_list().await;

    assert_eq!(kept, vec![lait]);
    let view = session.view();
    assert_eq!(view.in_list().len(), 1);
    assert_eq!(view.in_list()[0].id, lait);
    assert_eq!(view.get(lait).unwrap().quantity, 1);
    for id in [beurre, pommes] {
        let product = view.get(id).unwrap();
        assert!(!product.in_list);
        assert_eq!(product.quantity, 0);
    }
    assert_eq!(notifier.errors(), vec!["Erreur lors du retrait de la liste"]);

    // The backend agrees: only the failed product is still listed
    let stored = backend.list_products(Some(store.id)).await.unwrap();
    let listed: Vec<ProductId> = stored.iter().filter(|p| p.in_list).map(|p| p.id).collect();
    assert_eq!(listed, vec![lait]);
}

#[tokio::test]
async fn clear_list_empties_the_list_without_saving() {
    let (backend, store, notifier) = seeded().await;
    let session = session_for(&backend, &store, &notifier).await;
    let beurre = product_id(&session, "Beurre");

    session.change_quantity(beurre, 3).await.unwrap();
    assert!(session.clear_list().await.is_empty());

    assert!(session.view().in_list().is_empty());
    assert_eq!(session.view().get(beurre).unwrap().purchase_count, 0);
    assert!(backend.list_shopping_lists(None).await.unwrap().is_empty());
}
