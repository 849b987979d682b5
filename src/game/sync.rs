// src/game/sync.rs
// Role-aware synchronisation of resource state across the network.
//
// Outbound: only the server publishes spawns, destroys and lock status, and
// only when the channel reports itself ready. Clients publish nothing but
// gather-completion requests.
// Inbound: clients mirror what the server says; the server only accepts
// gather-completion requests. Single-player ignores the network entirely.

use std::sync::Arc;
use tracing::{debug, warn};

use super::error::ResourceError;
use super::manager::{ResourceManager, Role};
use super::protocol::{Channel, GatherStatus, PositionUpdate, ResourceAction, ResourceEvent};
use super::resource::{GatherState, Resource, ResourceSnapshot};
use super::world::NetworkSender;

impl ResourceManager {
    fn ready_network(&self) -> Option<&Arc<dyn NetworkSender>> {
        self.network.as_ref().filter(|network| network.ready_for_updates())
    }

    fn server_network(&self) -> Option<&Arc<dyn NetworkSender>> {
        if self.role != Role::Server {
            return None;
        }
        self.ready_network()
    }

    pub(super) fn broadcast_spawn(&self, resource: ResourceSnapshot) {
        if let Some(network) = self.server_network() {
            network.send_event(ResourceEvent::Spawn { resource });
        }
    }

    pub(super) fn broadcast_destroy(&self, resource_id: &str) {
        if let Some(network) = self.server_network() {
            network.send_event(ResourceEvent::destroy(resource_id));
        }
    }

    pub(super) fn broadcast_status(&self, resource: &Resource) {
        if resource.is_dirty() {
            return;
        }
        if let Some(network) = self.server_network() {
            network.send_position(position_update(resource));
        }
    }

    pub(super) fn send_gather_completed(&self, player_id: &str, resource_id: &str) {
        if self.role != Role::Client {
            return;
        }
        match self.ready_network() {
            Some(network) => network.send_event(ResourceEvent::GatherCompleted {
                player_id: player_id.to_string(),
                resource_id: resource_id.to_string(),
            }),
            None => warn!(
                player_id = %player_id,
                resource_id = %resource_id,
                "Network not ready, gather completion not sent"
            ),
        }
    }

    /// Decode and apply one inbound packet
    pub fn handle_packet(&self, channel: Channel, payload: &[u8]) -> Result<(), ResourceError> {
        match channel {
            Channel::Reliable => self.handle_event(ResourceEvent::decode(payload)?),
            Channel::BestEffort => self.handle_position(PositionUpdate::decode(payload)?),
        }
        Ok(())
    }

    /// Apply a reliable event. Unknown resource ids are ignored.
    pub fn handle_event(&self, event: ResourceEvent) {
        match (self.role, event) {
            (Role::SinglePlayer, event) => {
                debug!(?event, "Single-player ignores network events");
            }

            (Role::Client, ResourceEvent::Update { resource_id, action: ResourceAction::Destroy }) => {
                if !self.destroy_resource(&resource_id) {
                    debug!(resource_id = %resource_id, "Destroy for unknown or already destroyed resource");
                }
            }

            (Role::Client, ResourceEvent::Spawn { resource }) => {
                self.register_snapshot(resource);
            }

            (Role::Client, ResourceEvent::Snapshot { resources }) => {
                self.replace_with_snapshot(resources);
            }

            (Role::Server, ResourceEvent::GatherCompleted { player_id, resource_id }) => {
                let outcome = self.complete_gather(&player_id, &resource_id);
                debug!(player_id = %player_id, resource_id = %resource_id, ?outcome, "Client gather completion");
            }

            (role, event) => {
                warn!(?role, ?event, "Ignoring resource event not meant for this role");
            }
        }
    }

    /// Apply a best-effort position/status delta to a known resource.
    /// Unknown ids are ignored; spawns only arrive on the reliable channel.
    pub fn handle_position(&self, update: PositionUpdate) {
        if self.role != Role::Client {
            return;
        }

        let Some(mut resource) = self.resources.get_mut(&update.resource_id) else {
            return;
        };
        if resource.is_dirty() {
            return;
        }

        resource.map_x = update.map_x;
        resource.map_y = update.map_y;

        match update.gather {
            None => {}
            Some(GatherStatus::Idle) => {
                self.unlock_entry(&mut resource);
            }
            Some(GatherStatus::Collecting { player_id, npc }) => {
                if !resource.is_held_by(&player_id, npc) {
                    self.unlock_entry(&mut resource);
                    // mirrored: only the server finishes this gather
                    self.lock_entry(&mut resource, &player_id, npc, None);
                }
            }
        }
    }

    fn register_snapshot(&self, snapshot: ResourceSnapshot) -> bool {
        let Some(resource_type) = self.types.by_name(&snapshot.type_name) else {
            warn!(
                resource_id = %snapshot.resource_id,
                resource_type = %snapshot.type_name,
                "Spawn for unknown resource type"
            );
            return false;
        };
        let mut resource = Resource::with_id(
            snapshot.resource_id,
            resource_type,
            snapshot.map_x,
            snapshot.map_y,
            snapshot.xp_payload,
        );
        resource.spawned_at = snapshot.spawned_at;
        self.register_resource(resource)
    }

    fn replace_with_snapshot(&self, resources: Vec<ResourceSnapshot>) {
        self.resources.clear();
        self.clear_locks();
        let count = resources.len();
        let registered = resources
            .into_iter()
            .map(|snapshot| self.register_snapshot(snapshot))
            .filter(|added| *added)
            .count();
        debug!(count, registered, "Applied resource snapshot");
    }
}

fn position_update(resource: &Resource) -> PositionUpdate {
    let gather = match resource.state() {
        GatherState::Collecting { player_id, npc, .. } => GatherStatus::Collecting {
            player_id: player_id.clone(),
            npc: *npc,
        },
        _ => GatherStatus::Idle,
    };
    PositionUpdate {
        resource_id: resource.id.clone(),
        map_x: resource.map_x,
        map_y: resource.map_y,
        gather: Some(gather),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::{harness, STONE_ONLY};
    use crate::game::world::Point;
    use std::time::Instant;

    fn spawn_on(client: &ResourceManager, id: &str, x: i32) {
        client.handle_event(ResourceEvent::Spawn {
            resource: ResourceSnapshot {
                resource_id: id.into(),
                type_name: "Stone".into(),
                map_x: x,
                map_y: 176,
                xp_payload: 0,
                spawned_at: 0,
            },
        });
    }

    #[test]
    fn test_client_mirrors_server_spawns() {
        let server = harness(Role::Server, STONE_ONLY);
        let client = harness(Role::Client, STONE_ONLY);
        for event in server.network.events() {
            client.manager.handle_event(event);
        }
        let mut mirrored: Vec<_> = client.manager.snapshot().into_iter().map(|s| s.resource_id).collect();
        let mut authoritative: Vec<_> = server.manager.snapshot().into_iter().map(|s| s.resource_id).collect();
        mirrored.sort();
        authoritative.sort();
        assert_eq!(mirrored, authoritative);
    }

    #[test]
    fn test_destroy_for_unknown_id_is_noop_and_repeat_is_idempotent() {
        let client = harness(Role::Client, STONE_ONLY);
        spawn_on(&client.manager, "stone_a", 100);

        client.manager.handle_event(ResourceEvent::destroy("ghost"));
        assert_eq!(client.manager.resource_count(), 1);

        client.manager.handle_event(ResourceEvent::destroy("stone_a"));
        client.manager.handle_event(ResourceEvent::destroy("stone_a"));
        assert!(client.manager.get_resource("stone_a").is_none());

        let report = client.manager.tick(Instant::now());
        assert_eq!(report.removed, 1);
        // clients never backfill
        assert_eq!(report.spawned, 0);
        client.manager.handle_event(ResourceEvent::destroy("stone_a"));
        assert_eq!(client.manager.resource_count(), 0);
    }

    #[test]
    fn test_server_ignores_client_destroys() {
        let server = harness(Role::Server, STONE_ONLY);
        let id = server.manager.live_ids()[0].clone();
        server.manager.handle_event(ResourceEvent::destroy(id.clone()));
        assert!(server.manager.get_resource(&id).is_some());
    }

    #[test]
    fn test_single_player_ignores_network() {
        let single = harness(Role::SinglePlayer, STONE_ONLY);
        let id = single.manager.live_ids()[0].clone();
        single.manager.handle_event(ResourceEvent::destroy(id.clone()));
        single.manager.handle_event(ResourceEvent::GatherCompleted { player_id: "alice".into(), resource_id: id.clone() });
        assert!(single.manager.get_resource(&id).is_some());
        assert!(single.effects.items().is_empty());
    }

    #[test]
    fn test_client_gather_round_trip_through_server() {
        let server = harness(Role::Server, STONE_ONLY);
        let client = harness(Role::Client, STONE_ONLY);
        client.manager.handle_event(ResourceEvent::Snapshot { resources: server.manager.snapshot() });
        assert_eq!(client.manager.resource_count(), 5);

        let target = client.manager.snapshot()[0].clone();
        let origin = Point::new(target.map_x + 16, target.map_y + 12);
        let id = client.manager.start_gather("alice", origin, 1.0, false).unwrap();

        client.manager.complete_gather("alice", &id);
        // nothing granted or destroyed on the client yet
        assert!(client.manager.get_resource(&id).is_some());
        assert!(client.effects.items().is_empty());

        for event in client.network.events() {
            server.manager.handle_event(event);
        }
        assert_eq!(server.effects.item_total("alice", "Stone"), 2);
        assert!(server.manager.get_resource(&id).is_none());

        for event in server.network.events() {
            client.manager.handle_event(event);
        }
        assert!(client.manager.get_resource(&id).is_none());
    }

    #[test]
    fn test_position_updates_only_touch_known_resources() {
        let client = harness(Role::Client, STONE_ONLY);
        spawn_on(&client.manager, "stone_a", 100);

        client.manager.handle_position(PositionUpdate {
            resource_id: "ghost".into(),
            map_x: 1,
            map_y: 1,
            gather: None,
        });
        assert_eq!(client.manager.resource_count(), 1);

        client.manager.handle_position(PositionUpdate {
            resource_id: "stone_a".into(),
            map_x: 140,
            map_y: 176,
            gather: Some(GatherStatus::Collecting { player_id: "bob".into(), npc: false }),
        });
        let r = client.manager.get_resource("stone_a").unwrap();
        assert_eq!(r.map_x, 140);
        assert_eq!(r.collecting_player(), Some("bob"));
        assert!(client.manager.collecting_index_violations().is_empty());

        client.manager.handle_position(PositionUpdate {
            resource_id: "stone_a".into(),
            map_x: 140,
            map_y: 176,
            gather: Some(GatherStatus::Idle),
        });
        assert!(!client.manager.get_resource("stone_a").unwrap().is_collecting());
        assert!(client.manager.collecting_index_violations().is_empty());
    }

    #[test]
    fn test_mirrored_lock_is_not_completed_by_client_tick() {
        let client = harness(Role::Client, STONE_ONLY);
        spawn_on(&client.manager, "stone_a", 100);
        client.manager.handle_position(PositionUpdate {
            resource_id: "stone_a".into(),
            map_x: 100,
            map_y: 176,
            gather: Some(GatherStatus::Collecting { player_id: "bob".into(), npc: false }),
        });

        let report = client.manager.tick(Instant::now() + std::time::Duration::from_secs(60));
        assert_eq!(report.gathers_completed, 0);
        assert!(client.network.events().is_empty());
        let r = client.manager.get_resource("stone_a").unwrap();
        assert_eq!(r.collecting_player(), Some("bob"));
        assert!(client.manager.collecting_index_violations().is_empty());
    }

    #[test]
    fn test_position_update_cannot_revive_destroyed() {
        let client = harness(Role::Client, STONE_ONLY);
        spawn_on(&client.manager, "stone_a", 100);
        client.manager.handle_event(ResourceEvent::destroy("stone_a"));
        client.manager.handle_position(PositionUpdate {
            resource_id: "stone_a".into(),
            map_x: 0,
            map_y: 0,
            gather: Some(GatherStatus::Collecting { player_id: "bob".into(), npc: false }),
        });
        assert!(client.manager.get_resource("stone_a").is_none());
        assert_eq!(client.manager.stats().collecting_resources, 0);
    }

    #[test]
    fn test_server_publishes_lock_status() {
        let server = harness(Role::Server, STONE_ONLY);
        let target = server.manager.snapshot()[0].clone();
        let origin = Point::new(target.map_x + 16, target.map_y + 12);
        server.manager.start_gather("alice", origin, 1.0, false).unwrap();
        server.manager.stop_gather("alice");

        let statuses: Vec<_> = server.network.positions().into_iter().map(|p| p.gather).collect();
        assert_eq!(
            statuses,
            vec![
                Some(GatherStatus::Collecting { player_id: "alice".into(), npc: false }),
                Some(GatherStatus::Idle),
            ]
        );
    }

    #[test]
    fn test_bad_packets_are_errors() {
        let client = harness(Role::Client, STONE_ONLY);
        assert!(client.manager.handle_packet(Channel::Reliable, b"not json").is_err());
        assert!(client.manager.handle_packet(Channel::BestEffort, &[]).is_err());

        let spawn = ResourceEvent::Spawn {
            resource: ResourceSnapshot {
                resource_id: "stone_z".into(),
                type_name: "Stone".into(),
                map_x: 10,
                map_y: 176,
                xp_payload: 0,
                spawned_at: 0,
            },
        };
        client.manager.handle_packet(Channel::Reliable, &spawn.encode().unwrap()).unwrap();
        assert!(client.manager.get_resource("stone_z").is_some());
    }

    #[test]
    fn test_spawn_with_unknown_type_is_ignored() {
        let client = harness(Role::Client, STONE_ONLY);
        client.manager.handle_event(ResourceEvent::Spawn {
            resource: ResourceSnapshot {
                resource_id: "gold_1".into(),
                type_name: "Gold".into(),
                map_x: 10,
                map_y: 10,
                xp_payload: 0,
                spawned_at: 0,
            },
        });
        assert_eq!(client.manager.resource_count(), 0);
    }

    #[test]
    fn test_sweep_survives_concurrent_network_mutation() {
        let client = harness(Role::Client, STONE_ONLY);
        let manager = &client.manager;

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2_000 {
                    let id = format!("stone_{i}");
                    spawn_on(manager, &id, 10 + (i % 500));
                    if i % 3 == 0 {
                        manager.handle_event(ResourceEvent::destroy(id));
                    }
                }
            });
            s.spawn(|| {
                for _ in 0..200 {
                    manager.tick(Instant::now());
                    manager.start_gather("alice", Point::new(200, 180), 100.0, false);
                    manager.stop_gather("alice");
                }
            });
        });

        manager.tick(Instant::now());
        assert!(manager.collecting_index_violations().is_empty());
        assert!(manager.snapshot().iter().all(|s| s.resource_id.starts_with("stone_")));
    }
}
