// src/transports/loopback.rs
// In-process transport: encoded packets travel over a tokio channel to the
// peer manager's receive task.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::game::{Channel, NetworkSender, PositionUpdate, ResourceEvent, ResourceManager};

#[derive(Debug, Clone)]
pub struct Packet {
    pub channel: Channel,
    pub payload: Bytes,
}

/// Sending half; implements the manager's network capability
pub struct LoopbackSender {
    tx: mpsc::UnboundedSender<Packet>,
    ready: AtomicBool,
}

pub fn channel() -> (Arc<LoopbackSender>, mpsc::UnboundedReceiver<Packet>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = Arc::new(LoopbackSender {
        tx,
        ready: AtomicBool::new(true),
    });
    (sender, rx)
}

impl LoopbackSender {
    /// Gate outbound traffic, e.g. until the peer has its initial snapshot
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn push(&self, channel: Channel, payload: Bytes) {
        if self.tx.send(Packet { channel, payload }).is_err() {
            debug!(channel = ?channel, "Loopback peer gone, packet dropped");
        }
    }
}

impl NetworkSender for LoopbackSender {
    fn ready_for_updates(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn send_event(&self, event: ResourceEvent) {
        match event.encode() {
            Ok(payload) => self.push(Channel::Reliable, payload),
            Err(e) => warn!(error = %e, "Failed to encode resource event"),
        }
    }

    fn send_position(&self, update: PositionUpdate) {
        match update.encode() {
            Ok(payload) => self.push(Channel::BestEffort, payload),
            Err(e) => warn!(resource_id = %update.resource_id, error = %e, "Failed to encode position update"),
        }
    }
}

/// Apply inbound packets to `manager` until every sender is dropped
pub async fn run_receiver(manager: Arc<ResourceManager>, mut rx: mpsc::UnboundedReceiver<Packet>) {
    info!(role = ?manager.role(), "Starting loopback receive task");

    while let Some(packet) = rx.recv().await {
        if let Err(e) = manager.handle_packet(packet.channel, &packet.payload) {
            warn!(
                channel = ?packet.channel,
                bytes = packet.payload.len(),
                error = %e,
                "Dropping undecodable packet"
            );
        }
    }

    info!(role = ?manager.role(), "Loopback receive task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::{harness, STONE_ONLY};
    use crate::game::{ResourceAction, Role};

    #[tokio::test]
    async fn test_events_arrive_encoded_on_their_channel() {
        let (sender, mut rx) = channel();
        sender.send_event(ResourceEvent::destroy("stone_1"));
        sender.send_position(PositionUpdate {
            resource_id: "stone_1".into(),
            map_x: 3,
            map_y: 4,
            gather: None,
        });

        let reliable = rx.recv().await.unwrap();
        assert_eq!(reliable.channel, Channel::Reliable);
        match ResourceEvent::decode(&reliable.payload).unwrap() {
            ResourceEvent::Update { resource_id, action } => {
                assert_eq!(resource_id, "stone_1");
                assert_eq!(action, ResourceAction::Destroy);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let best_effort = rx.recv().await.unwrap();
        assert_eq!(best_effort.channel, Channel::BestEffort);
        assert_eq!(PositionUpdate::decode(&best_effort.payload).unwrap().map_x, 3);
    }

    #[tokio::test]
    async fn test_not_ready_once_receiver_dropped() {
        let (sender, rx) = channel();
        assert!(sender.ready_for_updates());
        sender.set_ready(false);
        assert!(!sender.ready_for_updates());
        sender.set_ready(true);
        drop(rx);
        assert!(!sender.ready_for_updates());
        sender.send_event(ResourceEvent::destroy("gone"));
    }

    #[tokio::test]
    async fn test_receiver_applies_snapshot_and_skips_garbage() {
        let server = harness(Role::Server, STONE_ONLY);
        let client = harness(Role::Client, STONE_ONLY);
        let (sender, rx) = channel();

        let task = tokio::spawn(run_receiver(client.manager.clone(), rx));
        sender.push(Channel::Reliable, Bytes::from_static(b"not json"));
        sender.send_event(ResourceEvent::Snapshot {
            resources: server.manager.snapshot(),
        });
        drop(sender);
        task.await.unwrap();

        assert_eq!(client.manager.resource_count(), 5);
        for snapshot in server.manager.snapshot() {
            assert!(client.manager.get_resource(&snapshot.resource_id).is_some());
        }
    }
}
