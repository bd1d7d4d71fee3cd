//! # Authentication
//!
//! OAuth sign-in against the hosted backend's auth service, session
//! persistence and token refresh.
//!
//! ## Sign-in Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. authorize_url("google", redirect)                                  │
//! │     └── {url}/auth/v1/authorize?provider=google&redirect_to=...        │
//! │                                                                         │
//! │  2. Provider redirects to the callback URL                             │
//! │     └── ...#access_token=..&refresh_token=..&expires_in=3600&...       │
//! │                                                                         │
//! │  3. complete_sign_in(callback_url)                                     │
//! │     ├── parse fragment, decode JWT claims (sub = user id, exp)         │
//! │     ├── GET {url}/auth/v1/user  (confirms the token)                   │
//! │     └── write session.json                                             │
//! │                                                                         │
//! │  4. credentials() before each request                                  │
//! │     └── within 5 minutes of expiry?                                    │
//! │         POST {url}/auth/v1/token?grant_type=refresh_token              │
//! │                                                                         │
//! │  5. sign_out()                                                          │
//! │     └── POST {url}/auth/v1/logout, delete session.json                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Claims are read without verifying the signature: the backend verifies
//! every token it receives, the client only needs the user id and expiry.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PanierConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{base_url, check_status, client};

/// Refresh this long before the access token expires.
const REFRESH_MARGIN_SECS: i64 = 300;

// =============================================================================
// Session
// =============================================================================

/// A signed-in user's tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// What a request needs to act as the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    #[serde(default)]
    email: Option<String>,
}

impl Session {
    /// Builds a session from tokens; user id and expiry come from the
    /// access token's claims.
    pub fn from_tokens(
        access_token: &str,
        refresh_token: &str,
        token_type: &str,
    ) -> SyncResult<Self> {
        let claims = decode_claims(access_token)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| SyncError::InvalidToken(format!("bad exp claim: {}", claims.exp)))?;

        Ok(Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: token_type.to_string(),
            expires_at,
            user_id: claims.sub,
            email: claims.email,
        })
    }

    /// Parses the OAuth callback URL.
    ///
    /// The tokens travel in the fragment:
    /// `#access_token=..&refresh_token=..&expires_in=..&token_type=bearer`.
    /// A fragment carrying `error_description` is a refused sign-in.
    pub fn from_callback_url(callback_url: &str) -> SyncResult<Self> {
        let url = Url::parse(callback_url)?;
        let fragment = url
            .fragment()
            .ok_or_else(|| SyncError::AuthFailed("callback URL has no fragment".into()))?;

        let mut access_token = None;
        let mut refresh_token = None;
        let mut token_type = None;
        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            match key.as_ref() {
                "access_token" => access_token = Some(value.into_owned()),
                "refresh_token" => refresh_token = Some(value.into_owned()),
                "token_type" => token_type = Some(value.into_owned()),
                "expires_in" => debug!(expires_in = %value, "Callback token lifetime"),
                "error_description" => return Err(SyncError::AuthFailed(value.into_owned())),
                _ => {}
            }
        }

        let access_token = access_token
            .ok_or_else(|| SyncError::AuthFailed("callback carries no access_token".into()))?;

        Session::from_tokens(
            &access_token,
            refresh_token.as_deref().unwrap_or_default(),
            token_type.as_deref().unwrap_or("bearer"),
        )
    }

    /// True when the token expires within the refresh margin of `now`.
    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            user_id: self.user_id.clone(),
            access_token: self.access_token.clone(),
        }
    }
}

/// Reads a JWT's claims without checking its signature or expiry.
fn decode_claims(token: &str) -> SyncResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

// =============================================================================
// Auth Client
// =============================================================================

/// Client for the hosted auth service; owns the current session.
///
/// Cheap to clone: clones share the session.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    base_url: Url,
    anon_key: String,
    session: Arc<RwLock<Option<Session>>>,
    session_path: Option<PathBuf>,
}

impl AuthClient {
    /// Creates a client for the backend at `url`. No session is loaded.
    pub fn new(url: &str, anon_key: &str) -> SyncResult<Self> {
        Ok(AuthClient {
            http: client()?,
            base_url: base_url(url)?,
            anon_key: anon_key.to_string(),
            session: Arc::new(RwLock::new(None)),
            session_path: None,
        })
    }

    /// Creates a client from the `[backend]` section, persisting the
    /// session next to the config file.
    pub fn from_config(config: &PanierConfig) -> SyncResult<Self> {
        let url = config
            .backend
            .url
            .as_deref()
            .ok_or_else(|| SyncError::InvalidConfig("backend.url is not set".into()))?;
        let anon_key = config.backend.anon_key.as_deref().unwrap_or_default();

        let mut auth = AuthClient::new(url, anon_key)?;
        auth.session_path = config.session_path();
        Ok(auth)
    }

    /// Persists the session in `path` instead of the config directory.
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = Some(path.into());
        self
    }

    /// URL the user opens to sign in with `provider`.
    pub fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> SyncResult<Url> {
        let mut url = self.base_url.join("auth/v1/authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", provider);
            if let Some(redirect) = redirect_to {
                query.append_pair("redirect_to", redirect);
            }
        }
        Ok(url)
    }

    /// Finishes sign-in from the provider's callback URL.
    ///
    /// ## Returns
    /// * `Ok(Session)` - user confirmed by the auth service, session saved
    /// * `Err(AuthFailed)` - refused sign-in, or the token names another user
    pub async fn complete_sign_in(&self, callback_url: &str) -> SyncResult<Session> {
        let mut session = Session::from_callback_url(callback_url)?;

        let user = self.fetch_user(&session.access_token).await?;
        if user.id != session.user_id {
            return Err(SyncError::AuthFailed(format!(
                "token subject {} does not match user {}",
                session.user_id, user.id
            )));
        }
        if session.email.is_none() {
            session.email = user.email;
        }

        self.persist(&session)?;
        *self.session.write().await = Some(session.clone());

        info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    /// Loads the persisted session, if any.
    pub async fn restore(&self) -> SyncResult<Option<Session>> {
        let Some(path) = &self.session_path else {
            return Ok(None);
        };
        if !path.exists() {
            debug!(?path, "No saved session");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)?;
        let session: Session = serde_json::from_str(&contents)?;
        debug!(
            user_id = %session.user_id,
            remaining_secs = session.remaining_secs(),
            "Session restored"
        );

        *self.session.write().await = Some(session.clone());
        Ok(Some(session))
    }

    /// Replaces the in-memory session without persisting it.
    pub async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    pub async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| !s.is_expired())
            .unwrap_or(false)
    }

    /// Returns valid credentials, refreshing the token when it is close to
    /// expiry.
    ///
    /// ## Flow
    /// 1. No session → `NotAuthenticated`
    /// 2. Token fresh → use it
    /// 3. Token close to expiry → refresh; if refresh fails, keep using
    ///    the old token until it actually expires (then `SessionExpired`)
    pub async fn credentials(&self) -> SyncResult<Credentials> {
        {
            let guard = self.session.read().await;
            match guard.as_ref() {
                None => return Err(SyncError::NotAuthenticated),
                Some(session) if !session.needs_refresh() => return Ok(session.credentials()),
                Some(_) => {}
            }
        }

        let mut guard = self.session.write().await;

        // Double-check after acquiring write lock
        let current = match guard.as_ref() {
            None => return Err(SyncError::NotAuthenticated),
            Some(session) if !session.needs_refresh() => return Ok(session.credentials()),
            Some(session) => session.clone(),
        };

        match self.refresh(&current.refresh_token).await {
            Ok(fresh) => {
                info!(
                    user_id = %fresh.user_id,
                    expires_in_secs = fresh.remaining_secs(),
                    "Token refreshed"
                );
                if let Err(e) = self.persist(&fresh) {
                    warn!(?e, "Failed to save refreshed session");
                }
                let credentials = fresh.credentials();
                *guard = Some(fresh);
                Ok(credentials)
            }
            Err(e) if current.is_expired() => {
                warn!(?e, "Token refresh failed and session expired");
                *guard = None;
                self.forget();
                Err(SyncError::SessionExpired)
            }
            Err(e) => {
                warn!(?e, "Token refresh failed, using current token");
                Ok(current.credentials())
            }
        }
    }

    /// Signs out on the server (best effort) and forgets the session.
    pub async fn sign_out(&self) -> SyncResult<()> {
        let session = self.session.write().await.take();

        if let Some(session) = session {
            if let Err(e) = self.logout(&session.access_token).await {
                warn!(?e, "Failed to revoke session on server");
            }
        }

        self.forget();
        info!("Signed out");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    async fn fetch_user(&self, access_token: &str) -> SyncResult<UserInfo> {
        let response = self
            .http
            .get(self.base_url.join("auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let user = check_status(response).await?.json::<UserInfo>().await?;
        Ok(user)
    }

    async fn refresh(&self, refresh_token: &str) -> SyncResult<Session> {
        if refresh_token.is_empty() {
            return Err(SyncError::AuthFailed("no refresh token".into()));
        }
        debug!("Refreshing access token");

        let mut url = self.base_url.join("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let tokens = check_status(response)
            .await?
            .json::<TokenResponse>()
            .await?;

        Session::from_tokens(&tokens.access_token, &tokens.refresh_token, &tokens.token_type)
    }

    async fn logout(&self, access_token: &str) -> SyncResult<()> {
        let response = self
            .http
            .post(self.base_url.join("auth/v1/logout")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    fn persist(&self, session: &Session) -> SyncResult<()> {
        let Some(path) = &self.session_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| SyncError::SerializationFailed(e.to_string()))?;
        std::fs::write(path, contents)
            .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        debug!(?path, "Session saved");
        Ok(())
    }

    fn forget(&self) {
        if let Some(path) = &self.session_path {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(?e, ?path, "Failed to delete saved session");
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// An HS256 token for `sub` expiring `expires_in` seconds from now.
    pub(crate) fn token(sub: &str, expires_in: i64) -> String {
        let exp = Utc::now().timestamp() + expires_in;
        encode(
            &Header::default(),
            &serde_json::json!({ "sub": sub, "exp": exp, "email": "marie@example.com" }),
            &EncodingKey::from_secret(b"not-the-server-secret"),
        )
        .unwrap()
    }

    pub(crate) fn session(sub: &str, expires_in: i64) -> Session {
        Session::from_tokens(&token(sub, expires_in), "refresh-1", "bearer").unwrap()
    }

    fn callback(access_token: &str) -> String {
        format!(
            "http://localhost:5173/auth/callback#access_token={}&expires_in=3600\
             &refresh_token=refresh-1&token_type=bearer",
            access_token
        )
    }

    #[test]
    fn test_session_from_callback_url() {
        let session = Session::from_callback_url(&callback(&token("user-42", 3600))).unwrap();

        assert_eq!(session.user_id, "user-42");
        assert_eq!(session.refresh_token, "refresh-1");
        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.email.as_deref(), Some("marie@example.com"));
        assert!(!session.needs_refresh());
        assert!(session.remaining_secs() > 3500);
    }

    #[test]
    fn test_refused_or_empty_callback() {
        let err = Session::from_callback_url(
            "http://localhost/auth/callback#error=access_denied&error_description=Refus",
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::AuthFailed(ref m) if m == "Refus"));

        assert!(Session::from_callback_url("http://localhost/auth/callback").is_err());
        assert!(matches!(
            Session::from_callback_url("http://localhost/cb#access_token=garbage").unwrap_err(),
            SyncError::InvalidToken(_)
        ));
    }

    #[test]
    fn test_refresh_margin() {
        let s = session("u", 3600);
        assert!(!s.needs_refresh());
        assert!(s.needs_refresh_at(s.expires_at - Duration::seconds(299)));
        assert!(!s.needs_refresh_at(s.expires_at - Duration::seconds(301)));

        assert!(session("u", 120).needs_refresh());
        assert!(session("u", -10).is_expired());
    }

    #[test]
    fn test_authorize_url() {
        let auth = AuthClient::new("https://xyz.supabase.co", "anon").unwrap();
        let url = auth
            .authorize_url("google", Some("http://localhost:5173/auth/callback"))
            .unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("provider".to_string(), "google".to_string()),
                (
                    "redirect_to".to_string(),
                    "http://localhost:5173/auth/callback".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_sign_in_confirms_and_persists() {
        let server = MockServer::start().await;
        let access = token("user-42", 3600);

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", "anon"))
            .and(header("authorization", format!("Bearer {}", access).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-42",
                "email": "marie@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("session.json");
        let auth = AuthClient::new(&server.uri(), "anon")
            .unwrap()
            .with_session_file(&file);

        let session = auth.complete_sign_in(&callback(&access)).await.unwrap();
        assert_eq!(session.user_id, "user-42");
        assert!(auth.is_authenticated().await);
        assert!(file.exists());

        // A fresh client picks the session up from disk
        let other = AuthClient::new(&server.uri(), "anon")
            .unwrap()
            .with_session_file(&file);
        assert_eq!(other.restore().await.unwrap(), Some(session.clone()));
        assert_eq!(other.credentials().await.unwrap(), session.credentials());
    }

    #[tokio::test]
    async fn test_sign_in_rejected_by_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "msg": "invalid JWT" })),
            )
            .mount(&server)
            .await;

        let auth = AuthClient::new(&server.uri(), "anon").unwrap();
        let err = auth
            .complete_sign_in(&callback(&token("user-42", 3600)))
            .await
            .unwrap_err();

        assert!(err.is_auth_error());
        assert!(matches!(err, SyncError::Http { status: 401, ref message } if message == "invalid JWT"));
        assert!(auth.current().await.is_none());
    }

    #[tokio::test]
    async fn test_credentials_without_session() {
        let auth = AuthClient::new("http://localhost:1", "anon").unwrap();
        assert!(matches!(
            auth.credentials().await.unwrap_err(),
            SyncError::NotAuthenticated
        ));
    }

    #[tokio::test]
    async fn test_credentials_refresh_near_expiry() {
        let server = MockServer::start().await;
        let fresh = token("user-42", 3600);

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(serde_json::json!({ "refresh_token": "refresh-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": fresh.clone(),
                "refresh_token": "refresh-2",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = AuthClient::new(&server.uri(), "anon").unwrap();
        auth.set_session(Some(session("user-42", 60))).await;

        let credentials = auth.credentials().await.unwrap();
        assert_eq!(credentials.access_token, fresh);
        assert_eq!(auth.current().await.unwrap().refresh_token, "refresh-2");

        // Second call uses the refreshed token without another request
        assert_eq!(auth.credentials().await.unwrap().access_token, fresh);
    }

    #[tokio::test]
    async fn test_failed_refresh_of_expired_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error_description": "Invalid Refresh Token"
            })))
            .mount(&server)
            .await;

        let auth = AuthClient::new(&server.uri(), "anon").unwrap();

        // Close to expiry but still valid: keep going with the old token
        let almost = session("user-42", 60);
        auth.set_session(Some(almost.clone())).await;
        assert_eq!(auth.credentials().await.unwrap(), almost.credentials());

        // Already expired: the session is dropped
        auth.set_session(Some(session("user-42", -60))).await;
        assert!(matches!(
            auth.credentials().await.unwrap_err(),
            SyncError::SessionExpired
        ));
        assert!(auth.current().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_and_forgets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("session.json");
        std::fs::write(&file, "{}").unwrap();

        let auth = AuthClient::new(&server.uri(), "anon")
            .unwrap()
            .with_session_file(&file);
        auth.set_session(Some(session("user-42", 3600))).await;

        auth.sign_out().await.unwrap();

        assert!(auth.current().await.is_none());
        assert!(!file.exists());
    }
}
