//! Outbound side of a session: the single connected peer and the
//! best-effort notification path to it.

use std::sync::Arc;

use agentlink_protocol::{ServerMessage, ServerNotification};
use arc_swap::ArcSwapOption;
use bytes::Bytes;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, warn};

use crate::debug_log::{DebugLog, Direction};

/// Frames queued for a connection's writer task.
#[derive(Debug)]
pub enum OutboundMessage {
    /// Pre-serialized JSON frame
    Text(String),
    /// Raw pong response
    Pong(Bytes),
    /// Send a close frame and stop writing
    Close,
}

/// The live connection attached to a session.
#[derive(Debug)]
pub struct Peer {
    pub connection_id: u64,
    outbound: mpsc::Sender<OutboundMessage>,
    closed: Notify,
}

impl Peer {
    pub fn new(connection_id: u64, outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            connection_id,
            outbound,
            closed: Notify::new(),
        }
    }

    /// Ask the connection to shut down. Safe to call before its read loop waits.
    pub fn close(&self) {
        self.closed.notify_one();
    }

    pub async fn closed(&self) {
        self.closed.notified().await;
    }

    fn try_send(&self, message: OutboundMessage) -> bool {
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    component = "notify",
                    event = "notify.outbound_full",
                    connection_id = self.connection_id,
                    "Outbound queue full, notification dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Pushes notifications to whichever peer currently holds the session's
/// connection slot. Cheap to clone; all clones share the slot.
#[derive(Clone)]
pub struct NotificationSender {
    project_root: Arc<str>,
    slot: Arc<ArcSwapOption<Peer>>,
    debug_log: Arc<DebugLog>,
}

impl NotificationSender {
    pub fn new(project_root: Arc<str>, debug_log: Arc<DebugLog>) -> Self {
        Self {
            project_root,
            slot: Arc::new(ArcSwapOption::empty()),
            debug_log,
        }
    }

    /// Install `peer` as the connection, returning the one it replaced.
    pub fn attach(&self, peer: Arc<Peer>) -> Option<Arc<Peer>> {
        self.slot.swap(Some(peer))
    }

    /// Clear the slot if it still holds `connection_id`.
    ///
    /// A connection that was replaced must not evict its successor.
    pub fn detach(&self, connection_id: u64) -> bool {
        let previous = self.slot.rcu(|current| match current {
            Some(peer) if peer.connection_id == connection_id => None,
            other => other.clone(),
        });
        previous.is_some_and(|peer| peer.connection_id == connection_id)
    }

    /// Detach and close the current peer, if any.
    pub fn close_peer(&self) {
        if let Some(peer) = self.slot.swap(None) {
            peer.close();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot.load_full().is_some()
    }

    #[cfg(test)]
    pub fn connection_id(&self) -> Option<u64> {
        self.slot.load_full().map(|peer| peer.connection_id)
    }

    /// Send a notification to the connected peer. The frame is mirrored to
    /// the debug log either way; without a peer it is then dropped. Returns
    /// whether the frame was queued.
    pub fn send(&self, notification: ServerNotification) -> bool {
        let peer = self.slot.load_full();
        let event_name = notification.event_name();
        let Some(json) = self.encode(notification) else {
            return false;
        };

        let Some(peer) = peer else {
            self.debug_log.record_undelivered(&self.project_root, &json);
            debug!(
                component = "notify",
                event = "notify.no_peer",
                project = %self.project_root,
                notification = event_name,
                "No connection, notification dropped"
            );
            return false;
        };

        self.debug_log
            .record(Direction::Outbound, &self.project_root, &json);
        peer.try_send(OutboundMessage::Text(json))
    }

    /// Send a notification to `peer` whether or not it still holds the slot.
    /// Used for frames that belong to one connection, like its greeting.
    pub fn send_to(&self, peer: &Peer, notification: ServerNotification) -> bool {
        let Some(json) = self.encode(notification) else {
            return false;
        };
        self.debug_log
            .record(Direction::Outbound, &self.project_root, &json);
        peer.try_send(OutboundMessage::Text(json))
    }

    fn encode(&self, notification: ServerNotification) -> Option<String> {
        match ServerMessage::from(notification).encode() {
            Ok(json) => Some(json),
            Err(e) => {
                error!(
                    component = "notify",
                    event = "notify.serialize_failed",
                    project = %self.project_root,
                    error = %e,
                    "Failed to serialize notification"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> NotificationSender {
        NotificationSender::new(Arc::from("/p"), Arc::new(DebugLog::new()))
    }

    fn metadata() -> ServerNotification {
        ServerNotification::PluginMetadata {
            version: "0.3.0".into(),
        }
    }

    #[test]
    fn send_without_peer_is_mirrored_then_dropped() {
        let notifier = sender();
        assert!(!notifier.send(metadata()));

        let lines = notifier.debug_log.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("<-- /p (no peer) {\"serverNotification\""));
    }

    #[tokio::test]
    async fn send_to_targets_the_given_peer_not_the_slot() {
        let notifier = sender();
        let (old_tx, mut old_rx) = mpsc::channel(8);
        let (new_tx, mut new_rx) = mpsc::channel(8);
        let old = Arc::new(Peer::new(1, old_tx));
        notifier.attach(old.clone());
        notifier.attach(Arc::new(Peer::new(2, new_tx)));

        assert!(notifier.send_to(&old, metadata()));
        assert!(matches!(old_rx.recv().await, Some(OutboundMessage::Text(_))));
        assert!(new_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_queues_frame_and_mirrors_to_debug_log() {
        let notifier = sender();
        let (tx, mut rx) = mpsc::channel(8);
        notifier.attach(Arc::new(Peer::new(1, tx)));

        assert!(notifier.send(metadata()));
        match rx.recv().await.unwrap() {
            OutboundMessage::Text(json) => {
                assert_eq!(json, r#"{"serverNotification":{"pluginMetadata":{"version":"0.3.0"}}}"#);
            }
            other => panic!("expected text frame, got {other:?}"),
        }
        assert_eq!(notifier.debug_log.len(), 1);
    }

    #[tokio::test]
    async fn notifications_keep_send_order() {
        let notifier = sender();
        let (tx, mut rx) = mpsc::channel(8);
        notifier.attach(Arc::new(Peer::new(1, tx)));

        for i in 0..3 {
            notifier.send(ServerNotification::VisibleFilesDidChange {
                uris: vec![format!("file:///p/{i}.rs")],
            });
        }
        for i in 0..3 {
            let OutboundMessage::Text(json) = rx.recv().await.unwrap() else {
                panic!("expected text frame");
            };
            assert!(json.contains(&format!("{i}.rs")));
        }
    }

    #[test]
    fn attach_returns_replaced_peer_and_detach_respects_ownership() {
        let notifier = sender();
        let (tx, _rx) = mpsc::channel(8);

        assert!(notifier.attach(Arc::new(Peer::new(1, tx.clone()))).is_none());
        let replaced = notifier.attach(Arc::new(Peer::new(2, tx))).unwrap();
        assert_eq!(replaced.connection_id, 1);

        assert!(!notifier.detach(1));
        assert_eq!(notifier.connection_id(), Some(2));
        assert!(notifier.detach(2));
        assert!(!notifier.is_connected());
    }

    #[tokio::test]
    async fn close_peer_wakes_the_connection() {
        let notifier = sender();
        let (tx, _rx) = mpsc::channel(8);
        let peer = Arc::new(Peer::new(7, tx));
        notifier.attach(peer.clone());

        notifier.close_peer();
        assert!(!notifier.is_connected());
        tokio::time::timeout(std::time::Duration::from_secs(1), peer.closed())
            .await
            .expect("close should be observed");
    }
}
