//! # Realtime Change Feed
//!
//! Follows product changes of one store over the backend's realtime
//! websocket (Phoenix channel protocol) and forwards a `ChangeNotice` per
//! change. The consumer answers each notice with a full `refresh()`.
//!
//! ## Channel Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  connect ws(s)://{host}/realtime/v1/websocket?apikey=..&vsn=1.0.0      │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  phx_join  realtime:products_changes                                   │
//! │            postgres_changes: public.products, store_id=eq.<id>         │
//! │     │                                                                   │
//! │     ├──► every 30s: heartbeat on topic "phoenix"                       │
//! │     │                                                                   │
//! │     ├──◄ postgres_changes {type: INSERT|UPDATE|DELETE, record, ..}     │
//! │     │        └──► ChangeNotice ──► mpsc ──► session.refresh()          │
//! │     │                                                                   │
//! │     └── close / error ──► Backoff (500ms, 1s, 2s, ... max 60s)         │
//! │                              └──► reconnect + rejoin                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reconnection is a transport concern only; no data write is ever retried
//! here.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use panier_core::{ProductId, StoreId};

use crate::auth::AuthClient;
use crate::config::PanierConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::base_url;

/// Channel topic used for product changes.
pub const PRODUCTS_TOPIC: &str = "realtime:products_changes";

const HEARTBEAT_TOPIC: &str = "phoenix";

// =============================================================================
// Phoenix Messages
// =============================================================================

/// One Phoenix channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
}

impl PhoenixMessage {
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Join request for a store's product changes.
pub fn join_message(store_id: StoreId, access_token: &str, msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: PRODUCTS_TOPIC.to_string(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": "products",
                    "filter": format!("store_id=eq.{}", store_id),
                }]
            },
            "access_token": access_token,
        }),
        msg_ref: Some(msg_ref.to_string()),
    }
}

pub fn heartbeat_message(msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: HEARTBEAT_TOPIC.to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref.to_string()),
    }
}

/// Builds the websocket URL from the backend's HTTP URL.
///
/// `https` becomes `wss`, `http` becomes `ws`.
pub fn realtime_url(backend_url: &str, anon_key: &str) -> SyncResult<Url> {
    let mut url = base_url(backend_url)?.join("realtime/v1/websocket")?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(SyncError::InvalidUrl(format!("{}: {}", other, backend_url))),
    };
    url.set_scheme(scheme)
        .map_err(|_| SyncError::InvalidUrl(backend_url.to_string()))?;
    url.query_pairs_mut()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

// =============================================================================
// Change Notices
// =============================================================================

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// A product of the followed store changed remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub store_id: StoreId,
    pub kind: ChangeKind,
    pub product_id: Option<ProductId>,
}

/// Extracts a change notice from a `postgres_changes` frame; any other
/// frame yields `None`.
pub fn parse_change(message: &PhoenixMessage, store_id: StoreId) -> Option<ChangeNotice> {
    if message.topic != PRODUCTS_TOPIC || message.event != "postgres_changes" {
        return None;
    }

    let data = &message.payload["data"];
    let kind = ChangeKind::parse(data["type"].as_str()?)?;
    let product_id = data["record"]["id"]
        .as_i64()
        .or_else(|| data["old_record"]["id"].as_i64());

    Some(ChangeNotice {
        store_id,
        kind,
        product_id,
    })
}

// =============================================================================
// Feed Configuration
// =============================================================================

/// Connection state of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Backoff,
    Stopped,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Backoff => write!(f, "backoff"),
            ConnectionState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Websocket URL (see `realtime_url`).
    pub url: Url,

    /// Store whose products are followed.
    pub store_id: StoreId,

    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl FeedConfig {
    pub fn new(url: Url, store_id: StoreId) -> Self {
        FeedConfig {
            url,
            store_id,
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Feed settings from the `[backend]` and `[realtime]` sections.
    pub fn from_config(config: &PanierConfig, store_id: StoreId) -> SyncResult<Self> {
        let backend_url = config
            .backend
            .url
            .as_deref()
            .ok_or_else(|| SyncError::InvalidConfig("backend.url is not set".into()))?;
        let anon_key = config.backend.anon_key.as_deref().unwrap_or_default();

        Ok(FeedConfig {
            heartbeat_interval: config.realtime.heartbeat_interval(),
            initial_backoff: config.realtime.initial_backoff(),
            max_backoff: config.realtime.max_backoff(),
            ..FeedConfig::new(realtime_url(backend_url, anon_key)?, store_id)
        })
    }
}

// =============================================================================
// Feed Handle
// =============================================================================

/// Handle to a running feed.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    state: Arc<RwLock<ConnectionState>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl FeedHandle {
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// Stops the feed and closes the socket.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Failed to send shutdown signal".into()))
    }
}

// =============================================================================
// Change Feed
// =============================================================================

/// Why a connection loop ended.
enum LoopEnd {
    /// Socket closed or failed; reconnect.
    Lost,
    /// Shutdown requested or nobody listens any more.
    Stop,
}

/// Background task following one store.
///
/// ## Usage
/// ```rust,ignore
/// let config = FeedConfig::from_config(&config, store.id)?;
/// let (handle, mut notices) = ChangeFeed::spawn(config, auth.clone());
///
/// while let Some(notice) = notices.recv().await {
///     session.refresh().await?;
/// }
/// ```
pub struct ChangeFeed {
    config: FeedConfig,
    auth: AuthClient,
    state: Arc<RwLock<ConnectionState>>,
    notice_tx: mpsc::Sender<ChangeNotice>,
    shutdown_rx: mpsc::Receiver<()>,
    next_ref: u64,
}

impl ChangeFeed {
    /// Spawns the feed task. Returns its handle and the notice receiver.
    pub fn spawn(
        config: FeedConfig,
        auth: AuthClient,
    ) -> (FeedHandle, mpsc::Receiver<ChangeNotice>) {
        let (notice_tx, notice_rx) = mpsc::channel::<ChangeNotice>(32);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));

        let feed = ChangeFeed {
            config,
            auth,
            state: state.clone(),
            notice_tx,
            shutdown_rx,
            next_ref: 0,
        };

        tokio::spawn(feed.run());

        (FeedHandle { state, shutdown_tx }, notice_rx)
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    fn next_ref(&mut self) -> u64 {
        self.next_ref += 1;
        self.next_ref
    }

    async fn run(mut self) {
        info!(store_id = %self.config.store_id, "Change feed starting");

        let mut backoff = self.create_backoff();

        loop {
            if self.shutdown_rx.try_recv().is_ok() {
                break;
            }

            // A fresh token per connection; the join carries it
            let credentials = match self.auth.credentials().await {
                Ok(credentials) => credentials,
                Err(e) if e.is_auth_error() => {
                    error!(error = %e, "Change feed needs a signed-in user");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Could not get credentials for change feed");
                    if !self.wait_backoff(&mut backoff).await {
                        break;
                    }
                    continue;
                }
            };

            self.set_state(ConnectionState::Connecting).await;

            match self.connect_with_timeout().await {
                Ok(ws_stream) => {
                    info!("Change feed connected");
                    self.set_state(ConnectionState::Connected).await;
                    backoff.reset();

                    match self
                        .connection_loop(ws_stream, &credentials.access_token)
                        .await
                    {
                        Ok(LoopEnd::Stop) => break,
                        Ok(LoopEnd::Lost) => info!("Change feed connection closed"),
                        Err(e) => warn!(error = %e, "Change feed connection lost"),
                    }
                }
                Err(e) => {
                    error!(error = %e, "Change feed failed to connect");
                }
            }

            if !self.wait_backoff(&mut backoff).await {
                break;
            }
        }

        self.set_state(ConnectionState::Stopped).await;
        info!("Change feed stopped");
    }

    /// Sleeps for the next backoff interval. False when shutdown arrived
    /// meanwhile.
    async fn wait_backoff(&mut self, backoff: &mut ExponentialBackoff) -> bool {
        self.set_state(ConnectionState::Backoff).await;

        let Some(duration) = backoff.next_backoff() else {
            error!("Backoff exhausted");
            return false;
        };
        debug!(?duration, "Waiting before reconnect");

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown_rx.recv() => {
                info!("Shutdown during backoff");
                false
            }
        }
    }

    async fn connect_with_timeout(
        &self,
    ) -> SyncResult<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let connect_future = connect_async(self.config.url.as_str());

        match timeout(self.config.connect_timeout, connect_future).await {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                Ok(ws_stream)
            }
            Ok(Err(e)) => Err(SyncError::from(e)),
            Err(_) => Err(SyncError::Timeout(self.config.connect_timeout.as_secs())),
        }
    }

    async fn connection_loop(
        &mut self,
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        access_token: &str,
    ) -> SyncResult<LoopEnd> {
        let (mut write, mut read) = ws_stream.split();

        let join = join_message(self.config.store_id, access_token, self.next_ref());
        write.send(WsMessage::Text(join.to_json()?.into())).await?;
        debug!(topic = PRODUCTS_TOPIC, "Channel join sent");

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                incoming = read.next() => {
                    let Some(result) = incoming else {
                        return Ok(LoopEnd::Lost);
                    };
                    match result? {
                        WsMessage::Text(text) => {
                            let message = match PhoenixMessage::from_json(&text) {
                                Ok(message) => message,
                                Err(e) => {
                                    warn!(error = %e, "Unparseable channel frame");
                                    continue;
                                }
                            };
                            if let Some(notice) = parse_change(&message, self.config.store_id) {
                                debug!(kind = ?notice.kind, product_id = ?notice.product_id, "Product change");
                                if self.notice_tx.send(notice).await.is_err() {
                                    info!("Change notice receiver dropped");
                                    let _ = write.send(WsMessage::Close(None)).await;
                                    return Ok(LoopEnd::Stop);
                                }
                            } else if message.event == "phx_reply"
                                && message.payload["status"] != "ok"
                            {
                                warn!(topic = %message.topic, payload = %message.payload, "Channel request refused");
                            }
                        }
                        WsMessage::Ping(data) => {
                            write.send(WsMessage::Pong(data)).await?;
                        }
                        WsMessage::Close(frame) => {
                            info!(?frame, "Received close frame");
                            return Ok(LoopEnd::Lost);
                        }
                        _ => {}
                    }
                }

                _ = heartbeat.tick() => {
                    let beat = heartbeat_message(self.next_ref());
                    write.send(WsMessage::Text(beat.to_json()?.into())).await?;
                    debug!("Heartbeat sent");
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing channel");
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok(LoopEnd::Stop);
                }
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::session;
    use tokio::net::TcpListener;

    fn change_frame(kind: &str, record: Value, old_record: Value) -> PhoenixMessage {
        PhoenixMessage {
            topic: PRODUCTS_TOPIC.to_string(),
            event: "postgres_changes".to_string(),
            payload: json!({
                "data": {
                    "type": kind,
                    "schema": "public",
                    "table": "products",
                    "record": record,
                    "old_record": old_record,
                },
                "ids": [1]
            }),
            msg_ref: None,
        }
    }

    #[test]
    fn test_realtime_url_schemes() {
        let url = realtime_url("https://xyz.supabase.co", "anon").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://xyz.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let url = realtime_url("http://localhost:54321", "k").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert!(realtime_url("ftp://example.com", "k").is_err());
    }

    #[test]
    fn test_join_message_filters_by_store() {
        let join = join_message(3, "token", 1);
        assert_eq!(join.event, "phx_join");
        assert_eq!(join.msg_ref.as_deref(), Some("1"));
        let change = &join.payload["config"]["postgres_changes"][0];
        assert_eq!(change["table"], "products");
        assert_eq!(change["filter"], "store_id=eq.3");
        assert_eq!(join.payload["access_token"], "token");
    }

    #[test]
    fn test_heartbeat_uses_phoenix_topic() {
        let json = heartbeat_message(7).to_json().unwrap();
        let back = PhoenixMessage::from_json(&json).unwrap();
        assert_eq!(back.topic, "phoenix");
        assert_eq!(back.event, "heartbeat");
        assert!(json.contains("\"ref\":\"7\""));
    }

    #[test]
    fn test_parse_change() {
        let insert = change_frame("INSERT", json!({ "id": 12, "store_id": 3 }), Value::Null);
        assert_eq!(
            parse_change(&insert, 3),
            Some(ChangeNotice {
                store_id: 3,
                kind: ChangeKind::Insert,
                product_id: Some(12)
            })
        );

        let delete = change_frame("DELETE", json!({}), json!({ "id": 9 }));
        let notice = parse_change(&delete, 3).unwrap();
        assert_eq!(notice.kind, ChangeKind::Delete);
        assert_eq!(notice.product_id, Some(9));
    }

    #[test]
    fn test_other_frames_are_ignored() {
        assert_eq!(parse_change(&heartbeat_message(1), 3), None);

        let reply = PhoenixMessage {
            topic: PRODUCTS_TOPIC.to_string(),
            event: "phx_reply".to_string(),
            payload: json!({ "status": "ok", "response": {} }),
            msg_ref: Some("1".to_string()),
        };
        assert_eq!(parse_change(&reply, 3), None);

        let unknown = change_frame("TRUNCATE", json!({}), json!({}));
        assert_eq!(parse_change(&unknown, 3), None);
    }

    #[tokio::test]
    async fn test_feed_joins_and_forwards_changes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let join = match ws.next().await.unwrap().unwrap() {
                WsMessage::Text(text) => PhoenixMessage::from_json(&text).unwrap(),
                other => panic!("unexpected frame {:?}", other),
            };

            let frame = change_frame("UPDATE", json!({ "id": 5, "store_id": 3 }), json!({}));
            ws.send(WsMessage::Text(frame.to_json().unwrap().into()))
                .await
                .unwrap();
            // Keep the socket open until the client closes it
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
            }
            join
        });

        let auth = AuthClient::new("http://127.0.0.1:1", "anon").unwrap();
        auth.set_session(Some(session("user-42", 3600))).await;
        let url = realtime_url(&format!("http://{}", addr), "anon").unwrap();

        let (handle, mut notices) = ChangeFeed::spawn(FeedConfig::new(url, 3), auth);

        let notice = timeout(Duration::from_secs(5), notices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notice.kind, ChangeKind::Update);
        assert_eq!(notice.product_id, Some(5));
        assert!(handle.is_connected().await);

        handle.shutdown().await.unwrap();
        let join = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert_eq!(join.event, "phx_join");
        assert_eq!(
            join.payload["config"]["postgres_changes"][0]["filter"],
            "store_id=eq.3"
        );
    }

    #[tokio::test]
    async fn test_feed_stops_without_session() {
        let auth = AuthClient::new("http://127.0.0.1:1", "anon").unwrap();
        let url = realtime_url("http://127.0.0.1:1", "anon").unwrap();

        let (handle, mut notices) = ChangeFeed::spawn(FeedConfig::new(url, 3), auth);

        // The sender is dropped once the task gives up
        let closed = timeout(Duration::from_secs(5), notices.recv()).await.unwrap();
        assert!(closed.is_none());
        assert_eq!(handle.state().await, ConnectionState::Stopped);
    }
}
