// src/game/manager.rs
// Authoritative manager for world-placed resources.
//
// Population control lives in population.rs, gather locking in gather.rs and
// network synchronisation in sync.rs; all of them are `impl ResourceManager`
// blocks over the state defined here.
//
// The live set is read by the simulation tick while the network receive path
// inserts and removes entries. Sweeps walk a snapshot of the key set and skip
// keys that vanished in the meantime; those are picked up on the next tick.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info};

use super::resource::{Resource, ResourceSnapshot};
use super::resource_type::{ResourceType, ResourceTypeRegistry, LEVEL_COUNT};
use super::world::{NetworkSender, PlayerEffects, Point, ViewQuery, WorldQuery};

/// Which side of the network this process is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SinglePlayer,
    Server,
    Client,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" | "single_player" | "singleplayer" => Some(Self::SinglePlayer),
            "server" => Some(Self::Server),
            "client" => Some(Self::Client),
            _ => None,
        }
    }

    /// Server and single-player decide spawns, destroys and rewards
    pub fn is_authoritative(self) -> bool {
        !matches!(self, Self::Client)
    }
}

/// Capabilities the manager consumes from the rest of the game
#[derive(Clone)]
pub struct Collaborators {
    pub world: Arc<dyn WorldQuery>,
    pub view: Arc<dyn ViewQuery>,
    pub effects: Arc<dyn PlayerEffects>,
    pub network: Option<Arc<dyn NetworkSender>>,
}

pub struct ResourceManager {
    /// All live resources (resource_id -> resource)
    pub(super) resources: Arc<DashMap<String, Resource>>,

    /// Resources currently being gathered (resource_id -> player_id).
    /// Derived from the resources' gather state; only the lock helpers in
    /// gather.rs write to it.
    pub(super) collecting: Arc<DashMap<String, String>>,

    pub(super) types: ResourceTypeRegistry,
    pub(super) role: Role,
    pub(super) world: Arc<dyn WorldQuery>,
    pub(super) view: Arc<dyn ViewQuery>,
    pub(super) effects: Arc<dyn PlayerEffects>,
    pub(super) network: Option<Arc<dyn NetworkSender>>,
    rng: Mutex<ChaCha8Rng>,
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub gathers_completed: usize,
    pub removed: usize,
    pub spawned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceStats {
    pub total_resources: usize,
    pub collecting_resources: usize,
    pub destroyed_pending_removal: usize,
    pub by_level: [usize; LEVEL_COUNT],
    pub resource_types: usize,
}

impl ResourceManager {
    /// Build the manager and, when authoritative, fill every level up to its
    /// configured population.
    pub fn new(types: ResourceTypeRegistry, role: Role, collaborators: Collaborators, seed: u64) -> Self {
        let manager = Self {
            resources: Arc::new(DashMap::new()),
            collecting: Arc::new(DashMap::new()),
            types,
            role,
            world: collaborators.world,
            view: collaborators.view,
            effects: collaborators.effects,
            network: collaborators.network,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        };

        info!(
            role = ?role,
            resource_types = manager.types.len(),
            "Resource manager initialized"
        );

        if role.is_authoritative() {
            manager.check_population();
        }
        manager
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub(super) fn rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Key set at this instant; entries may disappear before they are visited
    pub(super) fn live_ids(&self) -> Vec<String> {
        self.resources.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Insert a resource unless its id is already known
    pub fn register_resource(&self, resource: Resource) -> bool {
        match self.resources.entry(resource.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(
                    resource_id = %resource.id,
                    resource_type = %resource.resource_type.name,
                    x = resource.map_x,
                    y = resource.map_y,
                    "Resource registered"
                );
                slot.insert(resource);
                true
            }
        }
    }

    /// Live (not destroyed) resource by id
    pub fn get_resource(&self, resource_id: &str) -> Option<Resource> {
        self.resources
            .get(resource_id)
            .filter(|r| !r.is_dirty())
            .map(|r| r.clone())
    }

    pub fn resource_type_by_name(&self, name: &str) -> Option<Arc<ResourceType>> {
        self.types.by_name(name)
    }

    pub fn resource_type_of(&self, resource_id: &str) -> Option<Arc<ResourceType>> {
        self.resources.get(resource_id).map(|r| r.resource_type.clone())
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Nearest live resource to `point`, locked or not
    pub fn closest(&self, point: Point) -> Option<ResourceSnapshot> {
        let mut best: Option<(f64, ResourceSnapshot)> = None;
        for entry in self.resources.iter() {
            let resource = entry.value();
            if resource.is_dirty() {
                continue;
            }
            let distance = point.distance_to(&resource.center());
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((distance, resource.to_network_data()));
            }
        }
        best.map(|(_, snapshot)| snapshot)
    }

    /// Positions of live resources of one type; an empty name matches all
    pub fn resources_of_type(&self, type_name: &str) -> Vec<Point> {
        self.resources
            .iter()
            .filter(|entry| {
                let r = entry.value();
                !r.is_dirty() && (type_name.is_empty() || r.resource_type.name == type_name)
            })
            .map(|entry| Point::new(entry.map_x, entry.map_y))
            .collect()
    }

    /// Full live set as network data, for a client that just joined
    pub fn snapshot(&self) -> Vec<ResourceSnapshot> {
        self.resources
            .iter()
            .filter(|entry| !entry.is_dirty())
            .map(|entry| entry.to_network_data())
            .collect()
    }

    /// Advance every resource one step: finish timed gathers, drop destroyed
    /// resources and, when authoritative, backfill what was removed.
    pub fn tick(&self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let mut finished = Vec::new();
        let mut dirty = Vec::new();

        for resource_id in self.live_ids() {
            // Removed by the network path since the key snapshot was taken
            let Some(resource) = self.resources.get(&resource_id) else {
                continue;
            };
            if resource.is_dirty() {
                dirty.push(resource_id);
            } else if let Some(player_id) = resource.update(now) {
                finished.push((player_id.to_string(), resource_id));
            }
        }

        for (player_id, resource_id) in finished {
            let outcome = self.complete_gather(&player_id, &resource_id);
            if outcome.is_applied() {
                report.gathers_completed += 1;
                dirty.push(resource_id);
            }
        }

        let dirty: HashSet<String> = dirty.into_iter().collect();
        for resource_id in &dirty {
            if self.resources.remove_if(resource_id, |_, r| r.is_dirty()).is_some() {
                report.removed += 1;
            }
        }

        if report.removed > 0 {
            debug!(removed = report.removed, remaining = self.resources.len(), "Removed destroyed resources");
            if self.role.is_authoritative() {
                report.spawned = self.check_population();
            }
        }

        report
    }

    /// Run `tick` on a fixed interval until the task is dropped
    pub async fn run_tick_task(self: Arc<Self>, tick_interval: std::time::Duration) {
        use tokio::time;

        info!(
            tick_ms = tick_interval.as_millis() as u64,
            role = ?self.role,
            "Starting resource tick task"
        );

        let mut interval = time::interval(tick_interval);
        loop {
            interval.tick().await;
            let report = self.tick(Instant::now());
            if report.removed > 0 || report.spawned > 0 {
                debug!(
                    gathers_completed = report.gathers_completed,
                    removed = report.removed,
                    spawned = report.spawned,
                    total = self.resources.len(),
                    "Resource tick"
                );
            }
        }
    }

    pub fn stats(&self) -> ResourceStats {
        let mut by_level = [0usize; LEVEL_COUNT];
        let mut destroyed = 0;
        for entry in self.resources.iter() {
            if entry.is_dirty() {
                destroyed += 1;
                continue;
            }
            if let Some(level) = self.world.level_by_y(entry.map_y) {
                if let Some(slot) = by_level.get_mut(level) {
                    *slot += 1;
                }
            }
        }

        ResourceStats {
            total_resources: self.resources.len(),
            collecting_resources: self.collecting.len(),
            destroyed_pending_removal: destroyed,
            by_level,
            resource_types: self.types.len(),
        }
    }
}
