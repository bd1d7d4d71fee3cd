//! # Configuration
//!
//! Application configuration: which backend to use and where things live.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PANIER_MODE=offline                                                │
//! │     PANIER_BACKEND_URL=https://xyz.supabase.co                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/panier/panier.toml (Linux)                               │
//! │     ~/Library/Application Support/com.panier.panier/panier.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     remote mode, OpenFoodFacts world database                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # panier.toml
//! [backend]
//! mode = "remote"  # remote | offline
//! url = "https://xyz.supabase.co"
//! anon_key = "eyJhbGciOi..."
//!
//! [auth]
//! provider = "google"
//! redirect_url = "http://localhost:5173/auth/callback"
//!
//! [barcode]
//! base_url = "https://world.openfoodfacts.org"
//!
//! [local]
//! database_path = "/home/me/.local/share/panier/panier.db"
//!
//! [export]
//! output_dir = "/home/me/Téléchargements"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

const CONFIG_FILE: &str = "panier.toml";
const SESSION_FILE: &str = "session.json";
const DATABASE_FILE: &str = "panier.db";

// =============================================================================
// Backend Mode
// =============================================================================

/// Where the data lives.
///
/// ```text
/// REMOTE (default)                    OFFLINE
/// ────────────────                    ───────
/// • Hosted REST backend               • Local SQLite file
/// • Requires sign-in                  • No account
/// • Realtime change feed              • Single device
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Hosted backend with authentication.
    #[default]
    Remote,

    /// Local offline store, authentication bypassed.
    Offline,
}

impl BackendMode {
    pub fn requires_auth(&self) -> bool {
        matches!(self, BackendMode::Remote)
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Remote => write!(f, "remote"),
            BackendMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for BackendMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" | "online" | "cloud" => Ok(BackendMode::Remote),
            "offline" | "local" => Ok(BackendMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown backend mode: '{}'. Valid options: remote, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[backend]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub mode: BackendMode,

    /// Project URL of the hosted backend (REST, auth and realtime live
    /// under it).
    #[serde(default)]
    pub url: Option<String>,

    /// Public (anonymous) API key sent as `apikey` on every request.
    #[serde(default)]
    pub anon_key: Option<String>,
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// OAuth provider name.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Where the provider sends the user back after sign-in.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

fn default_provider() -> String {
    "google".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            provider: default_provider(),
            redirect_url: None,
        }
    }
}

/// `[barcode]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodeSettings {
    #[serde(default = "default_barcode_url")]
    pub base_url: String,
}

fn default_barcode_url() -> String {
    "https://world.openfoodfacts.org".to_string()
}

impl Default for BarcodeSettings {
    fn default() -> Self {
        BarcodeSettings {
            base_url: default_barcode_url(),
        }
    }
}

/// `[realtime]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Subscribe to product changes in remote mode.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Phoenix heartbeat interval (seconds).
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// Initial reconnection backoff (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum reconnection backoff (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_heartbeat() -> u64 {
    30
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        RealtimeSettings {
            enabled: true,
            heartbeat_secs: default_heartbeat(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl RealtimeSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// `[local]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalSettings {
    /// SQLite file of the offline store. Defaults to the platform data dir.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// `[export]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Where PDFs are written. Defaults to the user's download directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanierConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub barcode: BarcodeSettings,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub local: LocalSettings,

    #[serde(default)]
    pub export: ExportSettings,
}

impl PanierConfig {
    /// Reads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (panier.toml)
    /// 3. Environment variables
    ///
    /// Not validated, so a config that is not complete yet can still be
    /// edited (switching to offline mode before any backend is set). Call
    /// `validate` before using it.
    pub fn read(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates the configuration.
    ///
    /// Remote mode needs a backend URL and key; offline mode needs neither.
    pub fn validate(&self) -> SyncResult<()> {
        if self.backend.mode == BackendMode::Remote {
            let url = self.backend.url.as_deref().unwrap_or_default();
            if url.is_empty() {
                return Err(SyncError::InvalidConfig(
                    "backend.url is required in remote mode".into(),
                ));
            }
            require_http(url, "backend.url")?;

            if self.backend.anon_key.as_deref().unwrap_or_default().is_empty() {
                return Err(SyncError::InvalidConfig(
                    "backend.anon_key is required in remote mode".into(),
                ));
            }
        }

        require_http(&self.barcode.base_url, "barcode.base_url")?;

        if self.realtime.heartbeat_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "realtime.heartbeat_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `PANIER_*` overrides, reading values through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(mode) = lookup("PANIER_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding backend mode from environment");
                    self.backend.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown backend mode in environment"),
            }
        }

        if let Some(url) = lookup("PANIER_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.url = Some(url);
        }

        if let Some(key) = lookup("PANIER_ANON_KEY") {
            self.backend.anon_key = Some(key);
        }

        if let Some(url) = lookup("PANIER_REDIRECT_URL") {
            self.auth.redirect_url = Some(url);
        }

        if let Some(url) = lookup("PANIER_BARCODE_URL") {
            self.barcode.base_url = url;
        }

        if let Some(path) = lookup("PANIER_DATABASE_PATH") {
            self.local.database_path = Some(PathBuf::from(path));
        }

        if let Some(dir) = lookup("PANIER_EXPORT_DIR") {
            self.export.output_dir = Some(PathBuf::from(dir));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "panier", "panier")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn mode(&self) -> BackendMode {
        self.backend.mode
    }

    /// Where the signed-in session is persisted.
    pub fn session_path(&self) -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(SESSION_FILE))
    }

    /// Offline store file, configured or in the platform data dir.
    pub fn database_path(&self) -> SyncResult<PathBuf> {
        if let Some(path) = &self.local.database_path {
            return Ok(path.clone());
        }
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
            .ok_or_else(|| SyncError::InvalidConfig("No data directory available".into()))
    }

    /// PDF output directory: configured, else downloads, else current dir.
    pub fn export_dir(&self) -> PathBuf {
        if let Some(dir) = &self.export.output_dir {
            return dir.clone();
        }
        directories::UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn require_http(url: &str, field: &str) -> SyncResult<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(SyncError::InvalidUrl(format!(
            "{} must start with http:// or https://, got: {}",
            field, url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn remote_config() -> PanierConfig {
        PanierConfig {
            backend: BackendSettings {
                mode: BackendMode::Remote,
                url: Some("https://xyz.supabase.co".to_string()),
                anon_key: Some("anon".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("remote".parse::<BackendMode>().unwrap(), BackendMode::Remote);
        assert_eq!("Offline".parse::<BackendMode>().unwrap(), BackendMode::Offline);
        assert_eq!("local".parse::<BackendMode>().unwrap(), BackendMode::Offline);
        assert!("sometimes".parse::<BackendMode>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = PanierConfig::default();
        assert_eq!(config.mode(), BackendMode::Remote);
        assert_eq!(config.auth.provider, "google");
        assert_eq!(config.barcode.base_url, "https://world.openfoodfacts.org");
        assert_eq!(config.realtime.heartbeat_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_validation() {
        // Remote without URL fails
        assert!(PanierConfig::default().validate().is_err());

        let mut config = remote_config();
        assert!(config.validate().is_ok());

        config.backend.anon_key = None;
        assert!(config.validate().is_err());

        config = remote_config();
        config.backend.url = Some("ftp://nope".to_string());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        // Offline needs no backend at all
        let mut offline = PanierConfig::default();
        offline.backend.mode = BackendMode::Offline;
        assert!(offline.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PANIER_MODE", "offline"),
            ("PANIER_DATABASE_PATH", "/tmp/courses.db"),
            ("PANIER_EXPORT_DIR", "/tmp/pdf"),
        ]
        .into_iter()
        .collect();

        let mut config = remote_config();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.mode(), BackendMode::Offline);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/courses.db")
        );
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/pdf"));
        // Untouched keys keep their values
        assert_eq!(config.backend.anon_key.as_deref(), Some("anon"));
    }

    #[test]
    fn test_unknown_mode_override_is_ignored() {
        let mut config = remote_config();
        config.apply_overrides(|key| (key == "PANIER_MODE").then(|| "bogus".to_string()));
        assert_eq!(config.mode(), BackendMode::Remote);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("panier.toml");

        let mut config = remote_config();
        config.export.output_dir = Some(PathBuf::from("/tmp/exports"));
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[backend]"));
        assert!(contents.contains("mode = \"remote\""));

        let loaded: PanierConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.backend.url, config.backend.url);
        assert_eq!(loaded.export.output_dir, config.export.output_dir);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: PanierConfig = toml::from_str(
            r#"
            [backend]
            mode = "offline"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode(), BackendMode::Offline);
        assert!(config.realtime.enabled);
        assert_eq!(config.auth.provider, "google");
    }
}
