//! # Remote Gateway
//!
//! `ShoppingBackend` over the hosted backend's REST interface
//! (PostgREST dialect under `{url}/rest/v1/`).
//!
//! ## Request Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /rest/v1/products?select=*,price_history(*)&order=name            │
//! │      &store_id=eq.3                                                    │
//! │  apikey: <anon key>                                                    │
//! │  Authorization: Bearer <access token>      (AuthClient::credentials)   │
//! │  Prefer: return=representation             (writes only)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Rows travel with prices as JSON numbers in euros (`"price": 2.49`).
//! Conversion to and from cents happens in this module only; everything
//! above it works in `Money` cents.
//!
//! Multi-step operations (product creation with its first price, list
//! deletion with its purchase-count give-back) are separate requests and
//! are not rolled back if a later step fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use panier_core::validation::{validate_price_cents, MAX_PRICE_CENTS};
use panier_core::{
    decremented_purchase_count, CoreError, ListId, NewProduct, NewShoppingList, PriceHistoryEntry, Product,
    ProductId, ProductPatch, ShoppingList, ShoppingListItem, Store, StoreId, MAX_ITEM_QUANTITY,
};

use crate::auth::{AuthClient, Credentials};
use crate::backend::ShoppingBackend;
use crate::config::PanierConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{base_url, check_status, client};

const PRODUCTS_SELECT: &str = "*,price_history(*)";
const LISTS_SELECT: &str = "*,shopping_list_items!inner(*,product:products!inner(*))";
const ITEMS_SELECT: &str = "*,product:products(*)";

/// Tables in the order a full wipe must delete them.
const RESET_ORDER: [&str; 5] = [
    "shopping_list_items",
    "shopping_lists",
    "price_history",
    "products",
    "stores",
];

// =============================================================================
// Wire Rows
// =============================================================================

/// Upper bound accepted for a stored list total.
const MAX_TOTAL_CENTS: i64 = MAX_PRICE_CENTS * MAX_ITEM_QUANTITY * 10_000;

/// Euros on the wire → cents, rounded to the nearest cent.
///
/// Non-finite, negative and oversized amounts are rejected before the
/// cast, which would otherwise saturate.
fn to_cents(euros: f64) -> SyncResult<i64> {
    let cents = (euros * 100.0).round();
    if !cents.is_finite() || cents < 0.0 || cents > MAX_TOTAL_CENTS as f64 {
        return Err(SyncError::UnexpectedResponse(format!(
            "amount out of range: {}",
            euros
        )));
    }
    Ok(cents as i64)
}

/// A unit price from the wire, held to the same range as user input.
fn price_to_cents(euros: f64) -> SyncResult<i64> {
    let cents = to_cents(euros)?;
    validate_price_cents(cents).map_err(CoreError::from)?;
    Ok(cents)
}

/// Cents → euros on the wire.
fn to_euros(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    id: i64,
    product_id: ProductId,
    price: f64,
    user_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PriceRow> for PriceHistoryEntry {
    type Error = SyncError;

    fn try_from(row: PriceRow) -> SyncResult<Self> {
        Ok(PriceHistoryEntry {
            id: row.id,
            product_id: row.product_id,
            price_cents: price_to_cents(row.price)?,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    id: ProductId,
    store_id: StoreId,
    user_id: String,
    name: String,
    price: f64,
    #[serde(default)]
    barcode: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    in_list: bool,
    #[serde(default)]
    quantity: i64,
    #[serde(default)]
    purchase_count: i64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    price_history: Vec<PriceRow>,
}

impl TryFrom<ProductRow> for Product {
    type Error = SyncError;

    fn try_from(row: ProductRow) -> SyncResult<Self> {
        let mut price_history = row
            .price_history
            .into_iter()
            .map(PriceHistoryEntry::try_from)
            .collect::<SyncResult<Vec<_>>>()?;
        price_history.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        Ok(Product {
            id: row.id,
            store_id: row.store_id,
            user_id: row.user_id,
            name: row.name,
            price_cents: price_to_cents(row.price)?,
            barcode: row.barcode,
            image_url: row.image_url,
            in_list: row.in_list,
            quantity: row.quantity,
            purchase_count: row.purchase_count,
            created_at: row.created_at,
            price_history,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ItemProductRow {
    name: String,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemRow {
    id: i64,
    shopping_list_id: ListId,
    product_id: ProductId,
    quantity: i64,
    price: f64,
    #[serde(default)]
    product: Option<ItemProductRow>,
}

impl TryFrom<ItemRow> for ShoppingListItem {
    type Error = SyncError;

    fn try_from(row: ItemRow) -> SyncResult<Self> {
        let (product_name, image_url) = match row.product {
            Some(p) => (p.name, p.image_url),
            None => (String::new(), None),
        };
        Ok(ShoppingListItem {
            id: row.id,
            list_id: row.shopping_list_id,
            product_id: row.product_id,
            product_name,
            image_url,
            quantity: row.quantity,
            price_cents: price_to_cents(row.price)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListRow {
    id: ListId,
    store_id: StoreId,
    user_id: String,
    total: f64,
    week_number: i64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    shopping_list_items: Vec<ItemRow>,
}

impl TryFrom<ListRow> for ShoppingList {
    type Error = SyncError;

    fn try_from(row: ListRow) -> SyncResult<Self> {
        let mut items = row
            .shopping_list_items
            .into_iter()
            .map(ShoppingListItem::try_from)
            .collect::<SyncResult<Vec<_>>>()?;
        items.sort_by_key(|item| item.id);

        Ok(ShoppingList {
            id: row.id,
            store_id: row.store_id,
            user_id: row.user_id,
            total_cents: to_cents(row.total)?,
            week_number: row.week_number,
            created_at: row.created_at,
            items,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ItemQuantityRow {
    product_id: ProductId,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
struct PurchaseCountRow {
    #[serde(default)]
    purchase_count: i64,
}

/// Wire body of a product patch: only set fields, price in euros.
fn patch_body(patch: &ProductPatch) -> Value {
    let mut body = Map::new();
    if let Some(name) = &patch.name {
        body.insert("name".into(), json!(name));
    }
    if let Some(price) = patch.price_cents {
        body.insert("price".into(), json!(to_euros(price)));
    }
    if let Some(barcode) = &patch.barcode {
        body.insert("barcode".into(), json!(barcode));
    }
    if let Some(image_url) = &patch.image_url {
        body.insert("image_url".into(), json!(image_url));
    }
    if let Some(in_list) = patch.in_list {
        body.insert("in_list".into(), json!(in_list));
    }
    if let Some(quantity) = patch.quantity {
        body.insert("quantity".into(), json!(quantity));
    }
    if let Some(count) = patch.purchase_count {
        body.insert("purchase_count".into(), json!(count));
    }
    Value::Object(body)
}

// =============================================================================
// Remote Gateway
// =============================================================================

/// REST gateway to the hosted backend.
///
/// Every call acts as the signed-in user of `auth`; without a session it
/// fails with `NotAuthenticated` before any request is made.
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    http: Client,
    rest_url: Url,
    anon_key: String,
    auth: AuthClient,
}

impl RemoteGateway {
    pub fn new(url: &str, anon_key: &str, auth: AuthClient) -> SyncResult<Self> {
        Ok(RemoteGateway {
            http: client()?,
            rest_url: base_url(url)?.join("rest/v1/")?,
            anon_key: anon_key.to_string(),
            auth,
        })
    }

    /// Creates a gateway from the `[backend]` section.
    pub fn from_config(config: &PanierConfig, auth: AuthClient) -> SyncResult<Self> {
        let url = config
            .backend
            .url
            .as_deref()
            .ok_or_else(|| SyncError::InvalidConfig("backend.url is not set".into()))?;
        RemoteGateway::new(url, config.backend.anon_key.as_deref().unwrap_or_default(), auth)
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Sends one request to `table` and decodes the JSON answer.
    ///
    /// Writes ask for the affected rows back (`Prefer: return=representation`).
    async fn send<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        method: Method,
        table: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> SyncResult<T> {
        let mut url = self.rest_url.join(table)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        debug!(method = %method, table, "REST request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&credentials.access_token);
        if method != Method::GET {
            request = request.header("Prefer", "return=representation");
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = check_status(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    /// Like `send`, for writes addressed to exactly one row.
    #[allow(clippy::too_many_arguments)]
    async fn send_one<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        method: Method,
        table: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        entity: &str,
        id: impl ToString,
    ) -> SyncResult<T> {
        let rows: Vec<T> = self.send(credentials, method, table, query, body).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::not_found(entity, id))
    }
}

#[async_trait]
impl ShoppingBackend for RemoteGateway {
    fn name(&self) -> &'static str {
        "remote"
    }

    // -------------------------------------------------------------------------
    // Stores
    // -------------------------------------------------------------------------

    async fn list_stores(&self) -> SyncResult<Vec<Store>> {
        let creds = self.auth.credentials().await?;
        self.send(
            &creds,
            Method::GET,
            "stores",
            &[("select", "*".into()), ("order", "name".into())],
            None,
        )
        .await
    }

    async fn get_store(&self, id: StoreId) -> SyncResult<Store> {
        let creds = self.auth.credentials().await?;
        self.send_one(
            &creds,
            Method::GET,
            "stores",
            &[("select", "*".into()), ("id", eq(id))],
            None,
            "Store",
            id,
        )
        .await
    }

    async fn create_store(&self, name: &str) -> SyncResult<Store> {
        let creds = self.auth.credentials().await?;
        let body = json!({ "name": name, "user_id": creds.user_id });
        let store: Store = self
            .send_one(&creds, Method::POST, "stores", &[], Some(&body), "Store", "new")
            .await?;

        info!(id = %store.id, name = %store.name, "Store created");
        Ok(store)
    }

    async fn rename_store(&self, id: StoreId, name: &str) -> SyncResult<Store> {
        let creds = self.auth.credentials().await?;
        let body = json!({ "name": name });
        self.send_one(
            &creds,
            Method::PATCH,
            "stores",
            &[("id", eq(id))],
            Some(&body),
            "Store",
            id,
        )
        .await
    }

    async fn delete_store(&self, id: StoreId) -> SyncResult<()> {
        let creds = self.auth.credentials().await?;
        let _: Value = self
            .send_one(&creds, Method::DELETE, "stores", &[("id", eq(id))], None, "Store", id)
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn list_products(&self, store_id: Option<StoreId>) -> SyncResult<Vec<Product>> {
        let creds = self.auth.credentials().await?;
        let mut query = vec![("select", PRODUCTS_SELECT.to_string()), ("order", "name".into())];
        if let Some(store_id) = store_id {
            query.push(("store_id", eq(store_id)));
        }

        let rows: Vec<ProductRow> = self
            .send(&creds, Method::GET, "products", &query, None)
            .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn create_product(&self, new: &NewProduct) -> SyncResult<Product> {
        let creds = self.auth.credentials().await?;
        let body = json!({
            "store_id": new.store_id,
            "name": new.name,
            "price": to_euros(new.price_cents),
            "barcode": new.barcode,
            "image_url": new.image_url,
            "user_id": creds.user_id,
            "in_list": false,
            "quantity": 0,
            "purchase_count": 0,
        });
        let row: ProductRow = self
            .send_one(&creds, Method::POST, "products", &[], Some(&body), "Product", "new")
            .await?;
        let mut product = Product::try_from(row)?;

        let body = json!({
            "product_id": product.id,
            "price": to_euros(product.price_cents),
            "user_id": creds.user_id,
        });
        let entry: PriceRow = self
            .send_one(
                &creds,
                Method::POST,
                "price_history",
                &[],
                Some(&body),
                "PriceHistory",
                product.id,
            )
            .await?;
        product.price_history = vec![entry.try_into()?];

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, patch: &ProductPatch) -> SyncResult<Product> {
        let creds = self.auth.credentials().await?;
        let query = [("id", eq(id)), ("select", PRODUCTS_SELECT.to_string())];

        let row: ProductRow = if patch.is_empty() {
            self.send_one(&creds, Method::GET, "products", &query, None, "Product", id)
                .await?
        } else {
            debug!(id = %id, patch = ?patch, "Patching product");
            let body = patch_body(patch);
            self.send_one(&creds, Method::PATCH, "products", &query, Some(&body), "Product", id)
                .await?
        };
        row.try_into()
    }

    async fn delete_product(&self, id: ProductId) -> SyncResult<()> {
        let creds = self.auth.credentials().await?;

        // History and list items first, then the product itself
        let _: Vec<Value> = self
            .send(&creds, Method::DELETE, "price_history", &[("product_id", eq(id))], None)
            .await?;
        let _: Vec<Value> = self
            .send(
                &creds,
                Method::DELETE,
                "shopping_list_items",
                &[("product_id", eq(id))],
                None,
            )
            .await?;
        let _: Value = self
            .send_one(&creds, Method::DELETE, "products", &[("id", eq(id))], None, "Product", id)
            .await?;

        info!(id = %id, "Product deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Price history
    // -------------------------------------------------------------------------

    async fn price_history(&self, product_id: ProductId) -> SyncResult<Vec<PriceHistoryEntry>> {
        let creds = self.auth.credentials().await?;
        let rows: Vec<PriceRow> = self
            .send(
                &creds,
                Method::GET,
                "price_history",
                &[
                    ("select", "*".into()),
                    ("product_id", eq(product_id)),
                    ("order", "created_at.asc,id.asc".into()),
                ],
                None,
            )
            .await?;
        rows.into_iter().map(PriceHistoryEntry::try_from).collect()
    }

    async fn record_price(
        &self,
        product_id: ProductId,
        price_cents: i64,
    ) -> SyncResult<PriceHistoryEntry> {
        let creds = self.auth.credentials().await?;
        let body = json!({
            "product_id": product_id,
            "price": to_euros(price_cents),
            "user_id": creds.user_id,
        });
        let row: PriceRow = self
            .send_one(
                &creds,
                Method::POST,
                "price_history",
                &[],
                Some(&body),
                "PriceHistory",
                product_id,
            )
            .await?;
        row.try_into()
    }

    // -------------------------------------------------------------------------
    // Shopping lists
    // -------------------------------------------------------------------------

    async fn list_shopping_lists(
        &self,
        store_id: Option<StoreId>,
    ) -> SyncResult<Vec<ShoppingList>> {
        let creds = self.auth.credentials().await?;
        let mut query = vec![
            ("select", LISTS_SELECT.to_string()),
            ("order", "created_at.desc".into()),
        ];
        if let Some(store_id) = store_id {
            query.push(("store_id", eq(store_id)));
        }

        let rows: Vec<ListRow> = self
            .send(&creds, Method::GET, "shopping_lists", &query, None)
            .await?;
        rows.into_iter().map(ShoppingList::try_from).collect()
    }

    async fn create_shopping_list(&self, new: &NewShoppingList) -> SyncResult<ShoppingList> {
        let creds = self.auth.credentials().await?;
        let body = json!({
            "store_id": new.store_id,
            "total": to_euros(new.total_cents),
            "week_number": new.week_number,
            "user_id": creds.user_id,
        });
        let row: ListRow = self
            .send_one(&creds, Method::POST, "shopping_lists", &[], Some(&body), "ShoppingList", "new")
            .await?;
        let mut list = ShoppingList::try_from(row)?;

        let items: Vec<Value> = new
            .items
            .iter()
            .map(|item| {
                json!({
                    "shopping_list_id": list.id,
                    "product_id": item.product_id,
                    "quantity": item.quantity,
                    "price": to_euros(item.price_cents),
                    "user_id": creds.user_id,
                })
            })
            .collect();
        let rows: Vec<ItemRow> = self
            .send(
                &creds,
                Method::POST,
                "shopping_list_items",
                &[("select", ITEMS_SELECT.to_string())],
                Some(&Value::Array(items)),
            )
            .await?;

        list.items = rows
            .into_iter()
            .map(ShoppingListItem::try_from)
            .collect::<SyncResult<Vec<_>>>()?;
        list.items.sort_by_key(|item| item.id);

        info!(id = %list.id, items = list.items.len(), "Shopping list saved");
        Ok(list)
    }

    async fn delete_shopping_list(&self, id: ListId) -> SyncResult<()> {
        let creds = self.auth.credentials().await?;

        let items: Vec<ItemQuantityRow> = self
            .send(
                &creds,
                Method::GET,
                "shopping_list_items",
                &[
                    ("select", "product_id,quantity".into()),
                    ("shopping_list_id", eq(id)),
                ],
                None,
            )
            .await?;

        for item in &items {
            let counts: Vec<PurchaseCountRow> = self
                .send(
                    &creds,
                    Method::GET,
                    "products",
                    &[("select", "purchase_count".into()), ("id", eq(item.product_id))],
                    None,
                )
                .await?;
            let Some(current) = counts.first() else {
                warn!(product_id = %item.product_id, "List item names a missing product");
                continue;
            };

            let body = json!({
                "purchase_count": decremented_purchase_count(current.purchase_count, item.quantity)
            });
            let _: Vec<Value> = self
                .send(
                    &creds,
                    Method::PATCH,
                    "products",
                    &[("id", eq(item.product_id))],
                    Some(&body),
                )
                .await?;
        }

        let owner = eq(&creds.user_id);
        let _: Vec<Value> = self
            .send(
                &creds,
                Method::DELETE,
                "shopping_list_items",
                &[("shopping_list_id", eq(id)), ("user_id", owner.clone())],
                None,
            )
            .await?;
        let _: Value = self
            .send_one(
                &creds,
                Method::DELETE,
                "shopping_lists",
                &[("id", eq(id)), ("user_id", owner)],
                None,
                "ShoppingList",
                id,
            )
            .await?;

        info!(id = %id, items = items.len(), "Shopping list deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    async fn reset(&self) -> SyncResult<()> {
        let creds = self.auth.credentials().await?;
        info!(user_id = %creds.user_id, "Resetting remote data");

        for table in RESET_ORDER {
            let rows: Vec<Value> = self
                .send(
                    &creds,
                    Method::DELETE,
                    table,
                    &[("user_id", eq(&creds.user_id))],
                    None,
                )
                .await?;
            debug!(table, rows = rows.len(), "Table cleared");
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
