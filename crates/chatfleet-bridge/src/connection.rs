// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared WebSocket connection to the sidecar.
//!
//! A single socket carries every tenant. Requests are correlated with
//! responses by frame id through a map of oneshot senders; events are fanned
//! out to per-tenant broadcast channels. The socket is opened lazily on the
//! first request and again after it drops.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use chatfleet_config::model::BridgeConfig;
use chatfleet_core::{ChallengeCallback, FleetError, LoginChallenge, RawEvent, RawEventKind};

use crate::frame::{
    CODE_AUTH, CODE_NOT_FOUND, EVENT_QR, EventFrame, Incoming, RequestFrame, ResponseFrame,
    event_kind,
};

/// Buffer of each tenant's event stream.
const EVENT_CAPACITY: usize = 256;

pub(crate) struct Connection {
    url: String,
    timeout: Duration,
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: DashMap<String, oneshot::Sender<ResponseFrame>>,
    streams: DashMap<String, broadcast::Sender<RawEvent>>,
    challenges: DashMap<String, ChallengeCallback>,
}

impl Connection {
    pub(crate) fn new(config: &BridgeConfig) -> Self {
        Self {
            url: config.url.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            writer: Mutex::new(None),
            pending: DashMap::new(),
            streams: DashMap::new(),
            challenges: DashMap::new(),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) async fn is_connected(&self) -> bool {
        self.writer
            .lock()
            .await
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Sends a request and waits for its response using the configured timeout.
    ///
    /// `Ok(None)` when the sidecar answers `not_found`.
    pub(crate) async fn request(
        self: &Arc<Self>,
        tenant: &str,
        method: &str,
        params: Value,
    ) -> Result<Option<Value>, FleetError> {
        self.request_with(tenant, method, params, Some(self.timeout))
            .await
    }

    /// Like [`Connection::request`] with an explicit timeout; `None` waits
    /// until the sidecar answers or the socket drops.
    pub(crate) async fn request_with(
        self: &Arc<Self>,
        tenant: &str,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, FleetError> {
        let frame = RequestFrame::new(tenant, method, params);
        let id = frame.id.clone();
        let text = serde_json::to_string(&frame)
            .map_err(|e| FleetError::Internal(format!("encoding {method} request: {e}")))?;

        let writer = self.ensure_connected().await?;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        if writer.send(text).is_err() {
            self.pending.remove(&id);
            return Err(FleetError::transport("bridge connection closed"));
        }
        debug!(%tenant, %method, request_id = %id, "bridge request sent");

        let received = match timeout {
            Some(duration) => match tokio::time::timeout(duration, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.remove(&id);
                    warn!(%tenant, %method, "bridge request timed out");
                    return Err(FleetError::Timeout { duration });
                }
            },
            None => rx.await,
        };
        let response =
            received.map_err(|_| FleetError::transport("bridge connection lost mid-request"))?;
        into_result(tenant, method, response)
    }

    /// The per-tenant event stream, created on first use.
    pub(crate) fn stream(&self, tenant: &str) -> broadcast::Sender<RawEvent> {
        self.streams
            .entry(tenant.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CAPACITY).0)
            .clone()
    }

    pub(crate) fn set_challenge_callback(&self, tenant: &str, callback: ChallengeCallback) {
        self.challenges.insert(tenant.to_string(), callback);
    }

    pub(crate) fn clear_challenge_callback(&self, tenant: &str) {
        self.challenges.remove(tenant);
    }

    async fn ensure_connected(
        self: &Arc<Self>,
    ) -> Result<mpsc::UnboundedSender<String>, FleetError> {
        let mut writer = self.writer.lock().await;
        if let Some(tx) = writer.as_ref() {
            if !tx.is_closed() {
                return Ok(tx.clone());
            }
        }

        info!(url = %self.url, "connecting to bridge sidecar");
        let (socket, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            FleetError::Transport {
                message: format!("connecting to {}", self.url),
                source: Some(Box::new(e)),
            }
        })?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(Arc::clone(self), socket, rx));
        *writer = Some(tx.clone());
        info!(url = %self.url, "bridge connected");
        Ok(tx)
    }

    fn dispatch(&self, text: &str) {
        let incoming: Incoming = match serde_json::from_str(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(error = %e, "unparseable bridge frame");
                return;
            }
        };
        match incoming {
            Incoming::Res(response) => match self.pending.remove(&response.id) {
                Some((_, tx)) => {
                    let _ = tx.send(response);
                }
                None => debug!(request_id = %response.id, "response for unknown request"),
            },
            Incoming::Event(event) => self.route_event(event),
        }
    }

    fn route_event(&self, event: EventFrame) {
        if event.event == EVENT_QR {
            let callback = self
                .challenges
                .get(&event.tenant)
                .map(|entry| entry.value().clone());
            match callback {
                Some(callback) => callback(LoginChallenge {
                    tenant_id: event.tenant,
                    code: string_field(&event.payload, "code"),
                    image: event
                        .payload
                        .get("image")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }),
                None => debug!(tenant_id = %event.tenant, "qr event without pending login"),
            }
            return;
        }

        let Some(kind) = event_kind(&event.event) else {
            debug!(tenant_id = %event.tenant, event = %event.event, "unknown bridge event");
            return;
        };
        let stream = self.streams.get(&event.tenant).map(|s| s.value().clone());
        if let Some(stream) = stream {
            // No receivers just means nobody is listening yet.
            let _ = stream.send(RawEvent::new(kind, event.payload));
        }
    }

    /// Fails every pending request and tells each tenant stream the session is gone.
    fn on_disconnect(&self) {
        let failed = self.pending.len();
        self.pending.clear();
        for entry in self.streams.iter() {
            let _ = entry
                .value()
                .send(RawEvent::new(RawEventKind::Closed, json!({"reason": "bridge disconnected"})));
        }
        warn!(url = %self.url, failed_requests = failed, "bridge connection lost");
    }
}

async fn run_socket(
    conn: Arc<Connection>,
    socket: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) {
    let (mut sink, mut reader) = socket.split();
    loop {
        tokio::select! {
            msg = reader.next() => match msg {
                Some(Ok(Message::Text(text))) => conn.dispatch(text.as_str()),
                Some(Ok(Message::Ping(data))) => {
                    if sink.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("bridge socket closed by peer");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "bridge socket error");
                    break;
                }
            },
            text = outgoing.recv() => match text {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        warn!(error = %e, "bridge write failed");
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
    // Closing the receiver marks the writer stale so the next request reconnects.
    outgoing.close();
    conn.on_disconnect();
}

fn into_result(
    tenant: &str,
    method: &str,
    response: ResponseFrame,
) -> Result<Option<Value>, FleetError> {
    if response.ok {
        return Ok(Some(response.result));
    }
    let error = response.error.unwrap_or_else(|| crate::frame::ErrorBody {
        code: String::new(),
        message: "request failed".into(),
    });
    match error.code.as_str() {
        CODE_NOT_FOUND => Ok(None),
        CODE_AUTH => Err(FleetError::Auth {
            tenant_id: tenant.to_string(),
            message: error.message,
        }),
        _ => Err(FleetError::Remote {
            method: method.to_string(),
            message: if error.code.is_empty() {
                error.message
            } else {
                format!("{}: {}", error.code, error.message)
            },
        }),
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ErrorBody;

    fn failed(code: &str) -> ResponseFrame {
        ResponseFrame {
            id: "1".into(),
            ok: false,
            result: Value::Null,
            error: Some(ErrorBody {
                code: code.into(),
                message: "nope".into(),
            }),
        }
    }

    #[test]
    fn error_codes_map_to_fleet_errors() {
        assert!(matches!(into_result("t1", "get_profile", failed("not_found")), Ok(None)));
        assert!(
            into_result("t1", "login", failed("auth"))
                .unwrap_err()
                .is_auth()
        );
        match into_result("t1", "list_groups", failed("rate_limited")) {
            Err(FleetError::Remote { method, message }) => {
                assert_eq!(method, "list_groups");
                assert_eq!(message, "rate_limited: nope");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn events_route_to_tenant_stream() {
        let conn = Connection::new(&BridgeConfig::default());
        let mut events = conn.stream("t1").subscribe();
        conn.dispatch(r#"{"type":"event","tenant":"t1","event":"typing","payload":{"x":1}}"#);
        conn.dispatch(r#"{"type":"event","tenant":"t2","event":"message","payload":{}}"#);
        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, RawEventKind::Typing);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn disconnect_closes_streams_and_pending() {
        let conn = Connection::new(&BridgeConfig::default());
        let mut events = conn.stream("t1").subscribe();
        let (tx, mut rx) = oneshot::channel();
        conn.pending.insert("r1".into(), tx);

        conn.on_disconnect();
        assert_eq!(events.try_recv().unwrap().kind, RawEventKind::Closed);
        assert!(rx.try_recv().is_err());
        assert!(conn.pending.is_empty());
    }
}
