//! WebSocket session: a listener task owns the socket and feeds a bounded
//! inbound queue; a single dispatch task drains the queue and invokes the
//! caller's message handler. Outbound sends are correlated so a
//! `STATUS_RESPONSE` (or a send failure) can be matched back to the send
//! that produced it.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};
use crate::message::{parse_inbound, InboundMessage, OutboundMessage};

/// Depth of the inbound queue the listener task feeds and the dispatch task
/// drains. Overflow is a runtime error, not silent drop.
pub const INBOUND_QUEUE_DEPTH: usize = 32;

struct OutgoingTracker {
    in_flight: HashSet<String>,
}

impl OutgoingTracker {
    fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
        }
    }

    /// Rejects a send sharing a correlation id (or, for correlation-less
    /// sends, the same recipient) with one already in flight.
    fn begin(&mut self, correlation_id: Option<&str>, recipient: &str) -> Result<String> {
        let key = correlation_id
            .map(|c| c.to_owned())
            .unwrap_or_else(|| format!("empty-correlation:{recipient}"));
        if !self.in_flight.insert(key.clone()) {
            return Err(Error::DuplicateCorrelation);
        }
        Ok(key)
    }

    fn end(&mut self, key: &str) {
        self.in_flight.remove(key);
    }
}

pub struct SignalingSession {
    outbound: mpsc::UnboundedSender<Message>,
    tracker: Arc<Mutex<OutgoingTracker>>,
}

impl SignalingSession {
    /// Connects, completes the WebSocket handshake, and spawns the listener
    /// and dispatch tasks. `on_message` is invoked by the dispatch task for
    /// every parsed inbound message, including the synthetic `CtrlClose`.
    pub async fn connect<F>(url: &str, on_message: F) -> Result<Self>
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(Error::WebSocket)?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_QUEUE_DEPTH);

        // Sender half: drains outgoing frames onto the socket.
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if ws_sender.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // Listener task: parses inbound WS frames and posts to the bounded
        // queue. On overflow it logs and drops rather than blocking forever
        // on a stalled dispatch task.
        let inbound_tx_for_listener = inbound_tx.clone();
        tokio::spawn(async move {
            loop {
                match ws_receiver.next().await {
                    Some(Ok(Message::Text(text))) => match parse_inbound(&text) {
                        Ok(message) => {
                            if inbound_tx_for_listener.try_send(message).is_err() {
                                log::warn!("signaling inbound queue overflowed, dropping message");
                            }
                        }
                        Err(e) => log::warn!("failed to parse signaling message: {e}"),
                    },
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = inbound_tx_for_listener.send(InboundMessage::CtrlClose).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("signaling websocket read error: {e}");
                        let _ = inbound_tx_for_listener.send(InboundMessage::CtrlClose).await;
                        break;
                    }
                }
            }
        });

        let tracker = Arc::new(Mutex::new(OutgoingTracker::new()));

        // Dispatch task: the single consumer of the inbound queue.
        tokio::spawn(async move {
            while let Some(message) = inbound_rx.recv().await {
                on_message(message);
            }
        });

        Ok(Self {
            outbound: outbound_tx,
            tracker,
        })
    }

    /// Sends one signaling message, tracking its correlation id until the
    /// caller observes a matching `STATUS_RESPONSE` via `complete`.
    pub async fn send(&self, message: OutboundMessage) -> Result<String> {
        let key = {
            let mut tracker = self.tracker.lock().await;
            tracker.begin(message.correlation_id.as_deref(), &message.recipient_client_id)?
        };

        let text = serde_json::to_string(&message)?;
        if self.outbound.send(Message::Text(text)).is_err() {
            self.tracker.lock().await.end(&key);
            return Err(Error::Other("signaling socket sender task has exited".to_owned()));
        }
        Ok(key)
    }

    /// Call when a `STATUS_RESPONSE` (or a known send failure) resolves the
    /// send that produced `key` (the value `send` returned).
    pub async fn complete(&self, key: &str) {
        self.tracker.lock().await.end(key);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tracker_rejects_duplicate_correlation_id() {
        let mut tracker = OutgoingTracker::new();
        tracker.begin(Some("abc"), "peer-1").unwrap();
        assert!(tracker.begin(Some("abc"), "peer-1").is_err());
    }

    #[test]
    fn test_tracker_rejects_duplicate_empty_correlation_same_peer() {
        let mut tracker = OutgoingTracker::new();
        tracker.begin(None, "peer-1").unwrap();
        assert!(tracker.begin(None, "peer-1").is_err());
        assert!(tracker.begin(None, "peer-2").is_ok());
    }

    #[test]
    fn test_tracker_allows_resend_after_completion() {
        let mut tracker = OutgoingTracker::new();
        let key = tracker.begin(Some("abc"), "peer-1").unwrap();
        tracker.end(&key);
        assert!(tracker.begin(Some("abc"), "peer-1").is_ok());
    }
}
