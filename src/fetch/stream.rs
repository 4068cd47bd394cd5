use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::is_trusted_endpoint;
use super::transport::{FeedRequest, RawResponse, Transport, TransportError};

/// Status reported for every value the stream yields.
pub const STREAM_SUCCESS_STATUS: u16 = 200;

/// Routing metadata sent when none is configured.
pub const DEFAULT_ROUTE: &str = "feed-requests.fetch";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = Result<serde_json::Value, String>;
type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

#[derive(Serialize)]
struct CallFrame<'a> {
    id: u64,
    metadata: CallMetadata<'a>,
    payload: FeedRequest<'a>,
}

#[derive(Serialize)]
struct CallMetadata<'a> {
    route: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization: Option<String>,
}

#[derive(Deserialize)]
struct ReplyFrame {
    id: u64,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

struct Connection {
    sink: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    pending: PendingCalls,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        // The reader owns the other half of the socket.
        self.reader.abort();
    }
}

/// Streaming channel: calls share one persistent WebSocket connection.
///
/// Each call is a JSON text frame `{id, metadata: {route, authorization?}, payload}`.
/// The service answers with exactly one `{id, result}` or `{id, error}` frame, which
/// is matched back to its caller by `id`, so concurrent calls do not wait on each
/// other. A dropped connection fails its in-flight calls and is reopened on the next
/// call.
pub struct StreamTransport {
    endpoint: String,
    route: String,
    api_key: Option<SecretString>,
    timeout: Duration,
    next_id: AtomicU64,
    connection: tokio::sync::Mutex<Option<Arc<Connection>>>,
}

impl StreamTransport {
    /// `endpoint` is a `ws://` or `wss://` URL.
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            route: DEFAULT_ROUTE.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            next_id: AtomicU64::new(1),
            connection: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Credential attached to each call. Only sent over `wss` or to localhost.
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Deadline for one call, including connection setup.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn connection(&self) -> Result<Arc<Connection>, TransportError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            if conn.open.load(Ordering::SeqCst) {
                return Ok(Arc::clone(conn));
            }
        }

        tracing::debug!(endpoint = %self.endpoint, "Opening feed service stream");
        let (ws, _) = connect_async(self.endpoint.as_str()).await?;
        let (sink, stream) = ws.split();

        let pending: PendingCalls = Arc::default();
        let open = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_replies(stream, Arc::clone(&pending), Arc::clone(&open)));

        let conn = Arc::new(Connection {
            sink: tokio::sync::Mutex::new(sink),
            pending,
            open,
            reader,
        });
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    fn authorization(&self) -> Option<String> {
        let key = self.api_key.as_ref()?;
        if !is_trusted_endpoint(&self.endpoint) {
            tracing::warn!(endpoint = %self.endpoint, "Not sending API key over an insecure channel");
            return None;
        }
        Some(format!("Bearer {}", key.expose_secret()))
    }

    async fn call(&self, url: &str, execute_if_not_cached: bool) -> Result<RawResponse, TransportError> {
        let conn = self.connection().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let frame = serde_json::to_string(&CallFrame {
            id,
            metadata: CallMetadata {
                route: &self.route,
                authorization: self.authorization(),
            },
            payload: FeedRequest {
                url,
                execute_fetch_if_not_exists: execute_if_not_cached,
            },
        })?;

        let (tx, rx) = oneshot::channel();
        lock(&conn.pending).insert(id, tx);
        let _guard = PendingGuard {
            pending: &conn.pending,
            id,
        };

        // The reader marks the connection closed before clearing pending calls, so a
        // call registered after the clear is caught here.
        if !conn.open.load(Ordering::SeqCst) {
            return Err(TransportError::StreamClosed);
        }

        if let Err(e) = conn.sink.lock().await.send(Message::Text(frame.into())).await {
            conn.open.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        let reply = rx.await.map_err(|_| TransportError::StreamClosed)?;
        let envelope = reply.map_err(TransportError::Rejected)?;
        Ok(RawResponse::new(
            STREAM_SUCCESS_STATUS,
            serde_json::to_vec(&envelope)?,
        ))
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(
        &self,
        url: &str,
        execute_if_not_cached: bool,
    ) -> Result<RawResponse, TransportError> {
        tokio::time::timeout(self.timeout, self.call(url, execute_if_not_cached))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

/// Removes a call's reply slot when the call finishes or is cancelled.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

fn lock(pending: &PendingCalls) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn read_replies(mut stream: SplitStream<WsStream>, pending: PendingCalls, open: Arc<AtomicBool>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => dispatch(&pending, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Feed service stream failed");
                break;
            }
        }
    }

    tracing::debug!("Feed service stream closed");
    open.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiting call with StreamClosed.
    lock(&pending).clear();
}

fn dispatch(pending: &PendingCalls, text: &str) {
    let frame: ReplyFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring undecodable stream frame");
            return;
        }
    };

    let Some(tx) = lock(pending).remove(&frame.id) else {
        tracing::debug!(id = frame.id, "Reply for unknown or abandoned call");
        return;
    };

    let reply = match (frame.result, frame.error) {
        (_, Some(error)) => Err(error),
        (Some(result), None) => Ok(result),
        (None, None) => Err("reply carried neither result nor error".to_string()),
    };
    let _ = tx.send(reply);
}
