//! Request/response correlation over the server's stdio streams.
//!
//! One writer, one reader pump, one dispatch task:
//! - `call` allocates a monotonic id, registers a pending slot, writes the
//!   request line, and waits on a oneshot with a timeout.
//! - the reader pump turns stdout bytes into framed events on an mpsc.
//! - the dispatch task is the single consumer of that channel, so response
//!   completion and notification delivery never race each other.
//!
//! Any number of calls may be outstanding at once; responses are routed by
//! `id` alone, never by arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};
use tokio::task::JoinHandle;

use super::errors::McpError;
use super::framing::{self, FrameEvent, LineFramer};
use super::types::{Inbound, Notification, Request};

/// Read buffer size for the stdout pump.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Capacity of the decoded-event channel between pump and dispatch.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ─── Events & Handler Types ──────────────────────────────────────────────────

/// Events flowing from the reader pump into the dispatch task.
#[derive(Debug)]
pub enum SessionEvent {
    Frame(FrameEvent),
    /// The output stream ended — the process is gone or dying.
    Closed { reason: String },
}

/// An inbound message with a `method` and no `id`.
#[derive(Debug, Clone)]
pub struct ServerNotification {
    pub method: String,
    pub params: Option<Value>,
}

type NotificationHandler = Arc<dyn Fn(ServerNotification) + Send + Sync>;
type PendingSlot = oneshot::Sender<Result<Value, McpError>>;

// ─── Session ─────────────────────────────────────────────────────────────────

struct SessionInner {
    /// Outgoing stream. `None` once the session is closed — taking the
    /// writer out is what actually closes the server's stdin.
    writer: TokioMutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>,
    /// Outstanding requests by id. Lock is never held across an await.
    pending: Mutex<HashMap<u64, PendingSlot>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    handler: Mutex<Option<NotificationHandler>>,
}

/// The request/response correlation engine.
pub struct Session {
    inner: Arc<SessionInner>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Build a session from an outgoing stream and a channel of decoded
    /// inbound events (see [`spawn_reader_pump`]).
    pub fn new(
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        events: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        let inner = Arc::new(SessionInner {
            writer: TokioMutex::new(Some(writer)),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            handler: Mutex::new(None),
        });

        let dispatch = tokio::spawn(dispatch_loop(Arc::clone(&inner), events));

        Self {
            inner,
            dispatch: Mutex::new(Some(dispatch)),
            pump: Mutex::new(None),
        }
    }

    /// Attach the reader pump's join handle so `close` can stop it.
    pub fn attach_pump(&self, handle: JoinHandle<()>) {
        *self.pump.lock().unwrap() = Some(handle);
    }

    /// Send a request and wait for its response.
    ///
    /// Resolves with the response's `result`, or fails with:
    /// - [`McpError::Remote`] when the response carries an `error` object,
    /// - [`McpError::Timeout`] when nothing arrives within `timeout` (the
    ///   pending entry is evicted, so a late response is dropped silently),
    /// - [`McpError::SessionClosed`] when the process has exited or the
    ///   session was shut down.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(McpError::SessionClosed {
                reason: "session is closed".into(),
            });
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let line = framing::encode(&Request::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(id, tx);

        // Close may have raced the insert above; the drain would have missed
        // this entry, so take it back out rather than leaving a slot that can
        // only ever time out.
        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(McpError::SessionClosed {
                reason: "session is closed".into(),
            });
        }

        if let Err(e) = self.write_line(&line).await {
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(e);
        }
        tracing::debug!(method, id, "sent request");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Slot dropped without completion — session torn down mid-flight.
            Ok(Err(_)) => Err(McpError::SessionClosed {
                reason: "session closed while awaiting response".into(),
            }),
            Err(_) => {
                self.inner.pending.lock().unwrap().remove(&id);
                tracing::warn!(method, id, timeout_ms = timeout.as_millis() as u64, "request timed out");
                Err(McpError::Timeout {
                    method: method.to_string(),
                    id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Send a notification — fire and forget, no correlation.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let line = framing::encode(&Notification::new(method, params))?;
        self.write_line(&line).await?;
        tracing::debug!(method, "sent notification");
        Ok(())
    }

    /// Register the handler invoked for every inbound notification.
    ///
    /// A single handler; registering again replaces the previous one.
    /// Delivery order matches stream arrival order.
    pub fn on_notification(&self, handler: impl Fn(ServerNotification) + Send + Sync + 'static) {
        *self.inner.handler.lock().unwrap() = Some(Arc::new(handler));
    }

    /// Whether the session has been closed (shutdown or process exit).
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the session: fail all pending requests with `SessionClosed`,
    /// drop the writer (closing the server's stdin), and stop the tasks.
    /// Idempotent.
    pub async fn close(&self, reason: &str) {
        fail_all_pending(&self.inner, reason);
        self.inner.writer.lock().await.take();

        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.dispatch.lock().unwrap().take() {
            handle.abort();
        }
    }

    async fn write_line(&self, line: &str) -> Result<(), McpError> {
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(McpError::WriteFailed {
            reason: "stream closed".into(),
        })?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::WriteFailed {
                reason: format!("failed to write: {e}"),
            })?;
        writer.flush().await.map_err(|e| McpError::WriteFailed {
            reason: format!("failed to flush: {e}"),
        })
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }
}

// ─── Dispatch Loop ───────────────────────────────────────────────────────────

/// Single ordered consumer of decoded inbound events.
///
/// Per-message failures are isolated: nothing in here terminates the loop
/// except the channel closing or an explicit `Closed` event.
async fn dispatch_loop(inner: Arc<SessionInner>, mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Frame(FrameEvent::Message(message)) => {
                dispatch_message(&inner, message);
            }
            SessionEvent::Frame(FrameEvent::Malformed { raw, reason }) => {
                tracing::warn!(%reason, raw, "malformed line from server");
            }
            SessionEvent::Closed { reason } => {
                tracing::info!(%reason, "server output stream closed");
                fail_all_pending(&inner, &reason);
                break;
            }
        }
    }
    // Reader pump gone without a Closed event (e.g. aborted mid-shutdown).
    fail_all_pending(&inner, "dispatch ended");
}

fn dispatch_message(inner: &Arc<SessionInner>, message: Inbound) {
    match message {
        Inbound::Response { id, result, error } => {
            let slot = inner.pending.lock().unwrap().remove(&id);
            match slot {
                Some(tx) => {
                    let outcome = match error {
                        Some(err) => Err(McpError::Remote {
                            code: err.code,
                            message: err.message,
                            data: err.data,
                        }),
                        None => Ok(result.unwrap_or(Value::Null)),
                    };
                    // The caller may have timed out between eviction and
                    // here; a failed send is the late-response drop.
                    let _ = tx.send(outcome);
                }
                None => {
                    tracing::debug!(id, "response for unknown id (timed out or never issued)");
                }
            }
        }
        Inbound::Notification { method, params } => {
            let handler = inner.handler.lock().unwrap().clone();
            match handler {
                Some(handler) => (*handler)(ServerNotification { method, params }),
                None => tracing::debug!(%method, "notification with no handler registered"),
            }
        }
        Inbound::ServerRequest { id, method, .. } => {
            // This client never answers server-initiated requests, but they
            // must not be misrouted into the pending map.
            tracing::debug!(%method, ?id, "ignoring request from server");
        }
    }
}

/// Mark the session closed and reject every outstanding request.
fn fail_all_pending(inner: &Arc<SessionInner>, reason: &str) {
    inner.closed.store(true, Ordering::Release);
    // Idempotent: a second close just drains an empty map.
    let drained: Vec<(u64, PendingSlot)> = inner.pending.lock().unwrap().drain().collect();
    for (id, tx) in drained {
        tracing::debug!(id, %reason, "failing pending request: session closed");
        let _ = tx.send(Err(McpError::SessionClosed {
            reason: reason.to_string(),
        }));
    }
}

// ─── Reader Pump ─────────────────────────────────────────────────────────────

/// Read raw chunks from the server's output stream, frame them, and forward
/// decoded events to the dispatch task.
///
/// Sends a final `Closed` event on EOF or read error.
pub fn spawn_reader_pump<R>(reader: R) -> (mpsc::Receiver<SessionEvent>, JoinHandle<()>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut reader = reader;
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    let _ = tx
                        .send(SessionEvent::Closed {
                            reason: "server stdout closed (process exited)".into(),
                        })
                        .await;
                    break;
                }
                Ok(n) => {
                    for event in framer.feed(&buf[..n]) {
                        if tx.send(SessionEvent::Frame(event)).await.is_err() {
                            return; // dispatch gone; nothing left to feed
                        }
                    }
                }
                Err(e) => {
                    let _ = tx
                        .send(SessionEvent::Closed {
                            reason: format!("read error on server stdout: {e}"),
                        })
                        .await;
                    break;
                }
            }
        }
    });
    (rx, handle)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
