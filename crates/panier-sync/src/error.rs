//! # Sync Error Types
//!
//! Error types for everything above the pure domain: backends, network
//! clients, configuration and the optimistic session.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Auth                │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  ConnectionFailed│ │  NotAuthenticated       │ │
//! │  │  InvalidUrl     │  │  Http           │  │  SessionExpired         │ │
//! │  │  ConfigLoad/Save│  │  Timeout        │  │  InvalidToken           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Domain       │  │    Storage      │  │      Barcode            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(..)       │  │  Database       │  │  BarcodeNotFound        │ │
//! │  │  NotFound       │  │  Export(..)     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use panier_core::CoreError;
use panier_db::DbError;
use panier_export::ExportError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error type for backends, clients and the session.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config or session file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config or session file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Auth Errors
    // =========================================================================
    /// No signed-in user.
    #[error("Non authentifié")]
    NotAuthenticated,

    /// The session expired and could not be refreshed.
    #[error("Session expired")]
    SessionExpired,

    /// The access token could not be decoded.
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    /// The auth endpoint rejected the request.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to reach the server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timeout.
    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// WebSocket disconnected unexpectedly.
    #[error("Disconnected from realtime server")]
    Disconnected,

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Failed to serialize a request or file.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to decode a response.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// The response had the right shape but unusable content.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // =========================================================================
    // Domain & Storage Errors
    // =========================================================================
    /// Domain rule or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Entity not found on the backend.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Offline store failure.
    #[error("Database error: {0}")]
    Database(String),

    /// PDF export failure.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// The barcode API has no product for this barcode.
    #[error("No product for barcode {barcode}: {status}")]
    BarcodeNotFound { barcode: String, status: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        SyncError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SyncError::NotFound { entity, id },
            other => SyncError::Database(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(30)
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::DeserializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for SyncError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        SyncError::InvalidToken(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed => SyncError::Disconnected,
            WsError::AlreadyClosed => SyncError::Disconnected,
            WsError::Protocol(p) => SyncError::WebSocketError(p.to_string()),
            WsError::Io(io) => SyncError::ConnectionFailed(io.to_string()),
            WsError::Tls(tls) => SyncError::TlsError(tls.to_string()),
            other => SyncError::WebSocketError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the failure is transient.
    ///
    /// Nothing in this crate retries a data call on its own; callers decide.
    /// The realtime feed uses this to keep reconnecting.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_)
            | SyncError::Timeout(_)
            | SyncError::Disconnected
            | SyncError::WebSocketError(_) => true,
            SyncError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the user has to sign in (again).
    pub fn is_auth_error(&self) -> bool {
        match self {
            SyncError::NotAuthenticated
            | SyncError::SessionExpired
            | SyncError::InvalidToken(_)
            | SyncError::AuthFailed(_) => true,
            SyncError::Http { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Returns true if the target entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::NotFound { .. }
                | SyncError::BarcodeNotFound { .. }
                | SyncError::Core(CoreError::ProductNotFound(_))
                | SyncError::Core(CoreError::StoreNotFound(_))
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
