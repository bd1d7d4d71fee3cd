//! # Shopping Service
//!
//! Every user-facing data operation, with its notification.
//!
//! ## Failure Contract
//! ```text
//! ┌───────────────────────┬───────────────────────────┬─────────────────────┐
//! │ Operation kind        │ On success                │ On failure          │
//! ├───────────────────────┼───────────────────────────┼─────────────────────┤
//! │ query (stores, ...)   │ rows                      │ notify, empty Vec   │
//! │ create                │ notify, Some(row)         │ notify, None        │
//! │ update / delete       │ notify, Ok                │ notify, Err         │
//! │ destructive           │ Confirmation checked      │ first, no call made │
//! └───────────────────────┴───────────────────────────┴─────────────────────┘
//! ```
//!
//! Every failure is also logged with its cause; the notification carries
//! only the user-facing message.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use panier_core::validation::{
    normalize_optional, validate_barcode, validate_price_cents, validate_product_name,
    validate_store_name,
};
use panier_core::{
    Confirmation, CoreError, DestructiveAction, ListId, NewProduct, PriceHistoryEntry, Product,
    ProductId, ProductPatch, ShoppingList, Store, StoreId,
};
use panier_export::{write_to_dir, ListSnapshot};

use crate::backend::ShoppingBackend;
use crate::barcode::{enrich, BarcodeClient};
use crate::error::{SyncError, SyncResult};
use crate::notify::Notifier;

/// Fields a user can edit on an existing product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductEdit {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    /// `Some(None)` clears the barcode.
    pub barcode: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
}

impl ProductEdit {
    /// Validates and normalizes the edit into a backend patch.
    fn into_patch(self) -> SyncResult<ProductPatch> {
        let name = self
            .name
            .as_deref()
            .map(validate_product_name)
            .transpose()
            .map_err(CoreError::from)?;
        if let Some(price) = self.price_cents {
            validate_price_cents(price).map_err(CoreError::from)?;
        }
        let barcode = match self.barcode {
            Some(value) => Some(normalized_barcode(value.as_deref())?),
            None => None,
        };

        Ok(ProductPatch {
            name,
            price_cents: self.price_cents,
            barcode,
            image_url: self.image_url.map(|v| normalize_optional(v.as_deref())),
            ..Default::default()
        })
    }
}

/// Blank barcodes become `None`; others must be valid.
fn normalized_barcode(value: Option<&str>) -> SyncResult<Option<String>> {
    match normalize_optional(value) {
        Some(barcode) => Ok(Some(validate_barcode(&barcode).map_err(CoreError::from)?)),
        None => Ok(None),
    }
}

/// Notifying front of a `ShoppingBackend`.
#[derive(Clone)]
pub struct ShoppingService {
    backend: Arc<dyn ShoppingBackend>,
    notifier: Arc<dyn Notifier>,
}

impl ShoppingService {
    pub fn new(backend: Arc<dyn ShoppingBackend>, notifier: Arc<dyn Notifier>) -> Self {
        ShoppingService { backend, notifier }
    }

    pub fn backend(&self) -> &Arc<dyn ShoppingBackend> {
        &self.backend
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Logs and notifies a failure.
    fn failed(&self, message: &str, err: &SyncError) {
        error!(backend = self.backend.name(), error = %err, "{}", message);
        self.notifier.error(message);
    }

    /// Notifies the outcome of a write and passes the result through.
    fn report<T>(&self, result: SyncResult<T>, success: &str, failure: &str) -> SyncResult<T> {
        match &result {
            Ok(_) => self.notifier.success(success),
            Err(e) => self.failed(failure, e),
        }
        result
    }

    /// Empty result on failure.
    fn query<T>(&self, result: SyncResult<Vec<T>>, failure: &str) -> Vec<T> {
        result.unwrap_or_else(|e| {
            self.failed(failure, &e);
            Vec::new()
        })
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Stores ordered by name.
    pub async fn stores(&self) -> Vec<Store> {
        let result = self.backend.list_stores().await;
        self.query(result, "Erreur lors du chargement des magasins")
    }

    pub async fn create_store(&self, name: &str) -> Option<Store> {
        let result = async {
            let name = validate_store_name(name).map_err(CoreError::from)?;
            self.backend.create_store(&name).await
        }
        .await;

        self.report(
            result,
            "Magasin créé avec succès",
            "Erreur lors de la création du magasin",
        )
        .ok()
    }

    pub async fn rename_store(&self, id: StoreId, name: &str) -> SyncResult<Store> {
        let result = async {
            let name = validate_store_name(name).map_err(CoreError::from)?;
            self.backend.rename_store(id, &name).await
        }
        .await;

        self.report(
            result,
            "Magasin mis à jour avec succès",
            "Erreur lors de la mise à jour du magasin",
        )
    }

    /// Deletes a store with everything in it.
    pub async fn delete_store(&self, id: StoreId, confirmation: &Confirmation) -> SyncResult<()> {
        let result = async {
            confirmation.authorize(DestructiveAction::DeleteStore { store_id: id })?;
            self.backend.delete_store(id).await
        }
        .await;

        self.report(
            result,
            "Magasin supprimé avec succès",
            "Erreur lors de la suppression du magasin",
        )
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Products ordered by name, with their price history.
    pub async fn products(&self, store_id: Option<StoreId>) -> Vec<Product> {
        let result = self.backend.list_products(store_id).await;
        self.query(result, "Erreur lors du chargement des produits")
    }

    /// Creates a product (outside the list) and its first price entry.
    pub async fn create_product(&self, draft: NewProduct) -> Option<Product> {
        let result = async {
            let new = NewProduct {
                store_id: draft.store_id,
                name: validate_product_name(&draft.name).map_err(CoreError::from)?,
                price_cents: draft.price_cents,
                barcode: normalized_barcode(draft.barcode.as_deref())?,
                image_url: normalize_optional(draft.image_url.as_deref()),
            };
            validate_price_cents(new.price_cents).map_err(CoreError::from)?;
            self.backend.create_product(&new).await
        }
        .await;

        self.report(
            result,
            "Produit créé avec succès",
            "Erreur lors de la création du produit",
        )
        .ok()
    }

    /// Applies an edit to `current`. A new price is also appended to the
    /// product's price history.
    ///
    /// ## Returns
    /// The updated product. If the history entry cannot be written the
    /// product update stands and the failure is only notified.
    pub async fn edit_product(&self, current: &Product, edit: ProductEdit) -> SyncResult<Product> {
        let price_changed = edit
            .price_cents
            .is_some_and(|price| price != current.price_cents);

        let result = async {
            let patch = edit.into_patch()?;
            self.backend.update_product(current.id, &patch).await
        }
        .await;
        let mut product = self.report(
            result,
            "Produit mis à jour avec succès",
            "Erreur lors de la mise à jour du produit",
        )?;

        if price_changed {
            match self
                .backend
                .record_price(product.id, product.price_cents)
                .await
            {
                Ok(entry) => {
                    info!(id = %product.id, price = %entry.price(), "Price recorded");
                    product.price_history.push(entry);
                }
                Err(e) => self.failed("Erreur lors de l'ajout de l'historique des prix", &e),
            }
        }

        Ok(product)
    }

    /// Deletes a product outside of a list session.
    pub async fn delete_product(
        &self,
        id: ProductId,
        confirmation: &Confirmation,
    ) -> SyncResult<()> {
        let result = async {
            confirmation.authorize(DestructiveAction::DeleteProduct { product_id: id })?;
            self.backend.delete_product(id).await
        }
        .await;

        self.report(
            result,
            "Produit supprimé avec succès",
            "Erreur lors de la suppression du produit",
        )
    }

    /// A product's prices, oldest first.
    pub async fn price_history(&self, product_id: ProductId) -> Vec<PriceHistoryEntry> {
        let result = self.backend.price_history(product_id).await;
        self.query(result, "Erreur lors du chargement de l'historique")
    }

    // =========================================================================
    // Shopping lists
    // =========================================================================

    /// Saved lists, newest first.
    pub async fn shopping_lists(&self, store_id: Option<StoreId>) -> Vec<ShoppingList> {
        let result = self.backend.list_shopping_lists(store_id).await;
        self.query(result, "Erreur lors du chargement des listes")
    }

    /// Deletes a saved list and gives its quantities back to the products'
    /// purchase counts.
    pub async fn delete_shopping_list(
        &self,
        id: ListId,
        confirmation: &Confirmation,
    ) -> SyncResult<()> {
        let result = async {
            confirmation.authorize(DestructiveAction::DeleteShoppingList { list_id: id })?;
            self.backend.delete_shopping_list(id).await
        }
        .await;

        self.report(
            result,
            "Liste supprimée avec succès",
            "Erreur lors de la suppression de la liste",
        )
    }

    /// Writes a saved list to a PDF again, dated and priced as it was
    /// saved.
    pub async fn export_saved_list(
        &self,
        store: &Store,
        list: &ShoppingList,
        dir: &Path,
    ) -> SyncResult<PathBuf> {
        let snapshot = ListSnapshot::from_saved_list(&store.name, list);
        let result = write_to_dir(&snapshot, dir).map_err(SyncError::from);

        self.report(
            result,
            "PDF téléchargé",
            "Erreur lors de la génération du PDF",
        )
    }

    /// Deletes every row of the current user.
    pub async fn reset(&self, confirmation: &Confirmation) -> SyncResult<()> {
        let result = async {
            confirmation.authorize(DestructiveAction::ResetDatabase)?;
            warn!(backend = self.backend.name(), "Resetting all user data");
            self.backend.reset().await
        }
        .await;

        self.report(
            result,
            "Base de données réinitialisée",
            "Erreur lors de la réinitialisation",
        )
    }

    // =========================================================================
    // Barcode
    // =========================================================================

    /// Looks `barcode` up and fills `draft` from the result.
    ///
    /// On a miss or a failure the draft keeps the typed barcode. Returns
    /// whether the lookup found the product.
    pub async fn lookup_barcode(
        &self,
        client: &BarcodeClient,
        draft: &mut NewProduct,
        barcode: &str,
    ) -> bool {
        match client.lookup(barcode).await {
            Ok(found) => {
                enrich(draft, &found);
                self.notifier.success("Informations du produit récupérées");
                true
            }
            Err(e) => {
                draft.barcode = normalize_optional(Some(barcode));
                if matches!(e, SyncError::BarcodeNotFound { .. }) {
                    info!(barcode = %barcode, error = %e, "Barcode not in database");
                    self.notifier
                        .error("Produit non trouvé dans la base OpenFoodFacts");
                } else {
                    self.failed("Erreur lors de la recherche du produit", &e);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalBackend;
    use crate::notify::RecordingNotifier;
    use panier_core::money::Money;
    use panier_db::DbConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service() -> (ShoppingService, RecordingNotifier) {
        let backend = LocalBackend::open(DbConfig::in_memory()).await.unwrap();
        let notifier = RecordingNotifier::new();
        (
            ShoppingService::new(Arc::new(backend), Arc::new(notifier.clone())),
            notifier,
        )
    }

    fn draft(store_id: StoreId, name: &str, price_cents: i64) -> NewProduct {
        NewProduct {
            store_id,
            name: name.to_string(),
            price_cents,
            barcode: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_store_validates_name() {
        let (service, notifier) = service().await;

        assert!(service.create_store("   ").await.is_none());
        assert_eq!(notifier.errors(), vec!["Erreur lors de la création du magasin"]);

        let store = service.create_store("  Lidl ").await.unwrap();
        assert_eq!(store.name, "Lidl");
        assert!(notifier
            .messages()
            .contains(&"Magasin créé avec succès".to_string()));
    }

    #[tokio::test]
    async fn test_create_product_normalizes_optional_fields() {
        let (service, _) = service().await;
        let store = service.create_store("Lidl").await.unwrap();

        let mut new = draft(store.id, "Pain", 120);
        new.barcode = Some("  ".to_string());
        new.image_url = Some(String::new());
        let product = service.create_product(new).await.unwrap();

        assert_eq!(product.barcode, None);
        assert_eq!(product.image_url, None);
        assert_eq!(product.price_history.len(), 1);
    }

    #[tokio::test]
    async fn test_create_product_rejects_bad_barcode() {
        let (service, notifier) = service().await;
        let store = service.create_store("Lidl").await.unwrap();

        let mut new = draft(store.id, "Pain", 120);
        new.barcode = Some("12AB".to_string());

        assert!(service.create_product(new).await.is_none());
        assert_eq!(notifier.errors(), vec!["Erreur lors de la création du produit"]);
        assert!(service.products(Some(store.id)).await.is_empty());
    }

    #[tokio::test]
    async fn test_edit_price_appends_history() {
        let (service, _) = service().await;
        let store = service.create_store("Lidl").await.unwrap();
        let product = service.create_product(draft(store.id, "Café", 499)).await.unwrap();

        let edited = service
            .edit_product(
                &product,
                ProductEdit {
                    price_cents: Some(529),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.price(), Money::from_cents(529));

        let history: Vec<i64> = service
            .price_history(product.id)
            .await
            .iter()
            .map(|e| e.price_cents)
            .collect();
        assert_eq!(history, vec![499, 529]);
    }

    #[tokio::test]
    async fn test_edit_without_price_change_keeps_history() {
        let (service, _) = service().await;
        let store = service.create_store("Lidl").await.unwrap();
        let product = service.create_product(draft(store.id, "Café", 499)).await.unwrap();

        service
            .edit_product(
                &product,
                ProductEdit {
                    name: Some("Café moulu".to_string()),
                    price_cents: Some(499),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(service.price_history(product.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_must_match_target() {
        let (service, notifier) = service().await;
        let store = service.create_store("Lidl").await.unwrap();
        let other = service.create_store("Aldi").await.unwrap();

        let confirmation = DestructiveAction::DeleteStore { store_id: other.id }
            .confirm("oui")
            .unwrap();
        let err = service.delete_store(store.id, &confirmation).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Core(CoreError::ConfirmationMismatch { .. })
        ));
        assert_eq!(service.stores().await.len(), 2);
        assert_eq!(notifier.errors(), vec!["Erreur lors de la suppression du magasin"]);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (service, notifier) = service().await;
        let store = service.create_store("Lidl").await.unwrap();
        service.create_product(draft(store.id, "Pain", 120)).await.unwrap();

        let confirmation = DestructiveAction::ResetDatabase.confirm("Confirmer").unwrap();
        service.reset(&confirmation).await.unwrap();

        assert!(service.stores().await.is_empty());
        assert!(service.products(None).await.is_empty());
        assert!(notifier
            .messages()
            .contains(&"Base de données réinitialisée".to_string()));
    }

    #[tokio::test]
    async fn test_export_saved_list_uses_saved_date() {
        let (service, _) = service().await;
        let store = service.create_store("Lidl").await.unwrap();
        let product = service.create_product(draft(store.id, "Pain", 120)).await.unwrap();
        let list = service
            .backend()
            .create_shopping_list(&panier_core::NewShoppingList {
                store_id: store.id,
                total_cents: 240,
                week_number: 11,
                items: vec![panier_core::NewListItem {
                    product_id: product.id,
                    quantity: 2,
                    price_cents: 120,
                }],
            })
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = service
            .export_saved_list(&store, &list, dir.path())
            .await
            .unwrap();

        let expected = format!(
            "liste-courses-Lidl-{}.pdf",
            list.created_at.format("%Y-%m-%d")
        );
        assert_eq!(path.file_name().unwrap().to_string_lossy(), expected);
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_lookup_miss_keeps_typed_barcode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/product/12345678.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": 0, "status_verbose": "product not found" })),
            )
            .mount(&server)
            .await;

        let (service, notifier) = service().await;
        let client = BarcodeClient::new(&server.uri()).unwrap();
        let mut new = draft(1, "Biscuits", 199);

        assert!(!service.lookup_barcode(&client, &mut new, "12345678").await);
        assert_eq!(new.barcode.as_deref(), Some("12345678"));
        assert_eq!(new.name, "Biscuits");
        assert_eq!(
            notifier.errors(),
            vec!["Produit non trouvé dans la base OpenFoodFacts"]
        );
    }
}
