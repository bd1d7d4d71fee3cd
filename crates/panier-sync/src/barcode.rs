//! # Barcode Enrichment
//!
//! One lookup against the OpenFoodFacts product API per scan:
//!
//! ```text
//! GET {base}/api/v0/product/3017620422003.json
//!
//! { "status": 1, "product": { "product_name": "Nutella", "brands": "Ferrero",
//!                             "image_url": "https://..." } }      → hit
//! { "status": 0, "status_verbose": "product not found" }          → miss
//! ```
//!
//! No caching and no retry. On a miss or a network failure the caller keeps
//! the barcode the user typed.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use panier_core::validation::validate_barcode;
use panier_core::{CoreError, NewProduct};

use crate::config::PanierConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{base_url, check_status, client};

/// What a successful lookup yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeProduct {
    pub barcode: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    status_verbose: Option<String>,
    #[serde(default)]
    product: Option<ProductBody>,
}

#[derive(Debug, Deserialize)]
struct ProductBody {
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    brands: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// OpenFoodFacts client.
#[derive(Debug, Clone)]
pub struct BarcodeClient {
    http: Client,
    base_url: Url,
}

impl BarcodeClient {
    pub fn new(base: &str) -> SyncResult<Self> {
        Ok(BarcodeClient {
            http: client()?,
            base_url: base_url(base)?,
        })
    }

    pub fn from_config(config: &PanierConfig) -> SyncResult<Self> {
        BarcodeClient::new(&config.barcode.base_url)
    }

    /// Looks a barcode up.
    ///
    /// ## Returns
    /// * `Ok(BarcodeProduct)` - product known to the database
    /// * `Err(Core(Validation))` - malformed barcode, no request made
    /// * `Err(BarcodeNotFound)` - the database does not know it
    /// * `Err(..)` - network or HTTP failure
    pub async fn lookup(&self, barcode: &str) -> SyncResult<BarcodeProduct> {
        let barcode = validate_barcode(barcode).map_err(CoreError::from)?;
        let url = self
            .base_url
            .join(&format!("api/v0/product/{}.json", barcode))?;

        debug!(barcode = %barcode, "Barcode lookup");

        let response = check_status(self.http.get(url).send().await?).await?;
        let body: LookupResponse = response.json().await?;

        match body {
            LookupResponse {
                status: 1,
                product: Some(product),
                ..
            } => {
                let found = BarcodeProduct {
                    barcode: barcode.clone(),
                    name: non_empty(product.product_name),
                    brand: non_empty(product.brands),
                    image_url: non_empty(product.image_url),
                };
                info!(barcode = %barcode, name = ?found.name, "Barcode found");
                Ok(found)
            }
            other => Err(SyncError::BarcodeNotFound {
                barcode,
                status: other
                    .status_verbose
                    .unwrap_or_else(|| "product not found".to_string()),
            }),
        }
    }
}

/// Fills a product draft from a lookup.
///
/// The barcode is always kept; name and image are only overwritten by
/// non-empty looked-up values.
pub fn enrich(draft: &mut NewProduct, found: &BarcodeProduct) {
    draft.barcode = Some(found.barcode.clone());
    if let Some(name) = &found.name {
        draft.name = name.clone();
    }
    if let Some(image_url) = &found.image_url {
        draft.image_url = Some(image_url.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn draft() -> NewProduct {
        NewProduct {
            store_id: 1,
            name: "Pâte à tartiner".to_string(),
            price_cents: 399,
            barcode: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/product/3017620422003.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 1,
                "status_verbose": "product found",
                "product": {
                    "product_name": "Nutella",
                    "brands": "Ferrero",
                    "image_url": "https://images.example/nutella.jpg"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BarcodeClient::new(&server.uri()).unwrap();
        let found = client.lookup(" 3017620422003 ").await.unwrap();

        assert_eq!(found.barcode, "3017620422003");
        assert_eq!(found.name.as_deref(), Some("Nutella"));
        assert_eq!(found.brand.as_deref(), Some("Ferrero"));
    }

    #[tokio::test]
    async fn test_lookup_miss_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/product/12345678.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 0,
                "status_verbose": "product not found",
                "code": "12345678"
            })))
            .mount(&server)
            .await;

        let client = BarcodeClient::new(&server.uri()).unwrap();
        let err = client.lookup("12345678").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(
            err,
            SyncError::BarcodeNotFound { ref status, .. } if status == "product not found"
        ));
    }

    #[tokio::test]
    async fn test_invalid_barcode_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = BarcodeClient::new(&server.uri()).unwrap();
        let err = client.lookup("abc").await.unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_not_a_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = BarcodeClient::new(&server.uri()).unwrap();
        let err = client.lookup("12345678").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_enrich_keeps_user_values_when_lookup_is_blank() {
        let mut draft = draft();
        enrich(
            &mut draft,
            &BarcodeProduct {
                barcode: "3017620422003".to_string(),
                name: None,
                brand: Some("Ferrero".to_string()),
                image_url: Some("https://images.example/n.jpg".to_string()),
            },
        );

        assert_eq!(draft.name, "Pâte à tartiner");
        assert_eq!(draft.barcode.as_deref(), Some("3017620422003"));
        assert_eq!(draft.image_url.as_deref(), Some("https://images.example/n.jpg"));
    }

    #[test]
    fn test_enrich_overwrites_name() {
        let mut draft = draft();
        enrich(
            &mut draft,
            &BarcodeProduct {
                barcode: "3017620422003".to_string(),
                name: Some("Nutella".to_string()),
                brand: None,
                image_url: None,
            },
        );
        assert_eq!(draft.name, "Nutella");
        assert_eq!(draft.image_url, None);
    }
}
