//! Shared HTTP plumbing for the REST gateway, auth and barcode clients.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Request timeout for every HTTP client of this crate.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the HTTP client shared by one API client.
pub(crate) fn client() -> SyncResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("panier/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SyncError::Internal(format!("HTTP client: {}", e)))
}

/// Parses a base URL so that `join("a/b")` appends instead of replacing
/// the last path segment.
pub(crate) fn base_url(raw: &str) -> SyncResult<Url> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(SyncError::InvalidUrl(raw.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Error bodies of the hosted backend: REST uses `message`, auth uses
/// `msg` or `error_description`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

/// Passes 2xx responses through and turns anything else into
/// `SyncError::Http` carrying the server's message.
pub(crate) async fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|e| e.message.or(e.msg).or(e.error_description))
        .unwrap_or(body);

    Err(SyncError::Http {
        status: status.as_u16(),
        message,
    })
}
