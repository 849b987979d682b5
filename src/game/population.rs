// src/game/population.rs
// Density-based spawning: keep every (type, level) pair at its target count

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::ResourceError;
use super::manager::{ResourceManager, Role};
use super::resource::Resource;
use super::resource_type::{ResourceType, LEVEL_COUNT};
use super::world::LevelBand;

const XP_CRYSTAL_TYPE: &str = "XPCrystal";

impl ResourceManager {
    /// Count live resources per type and level and spawn the deficit.
    /// Clients never populate; this returns 0 there.
    /// Candidates that fail placement are skipped, not retried; the
    /// remaining deficit is picked up by a later check. Returns how many
    /// resources were spawned.
    pub fn check_population(&self) -> usize {
        if !self.role.is_authoritative() {
            return 0;
        }

        let counts = self.count_by_type_and_level();
        let mut spawned = 0;

        for resource_type in self.types.iter() {
            let current = counts.get(resource_type.name.as_str()).copied().unwrap_or([0; LEVEL_COUNT]);
            for (level, live) in current.iter().enumerate() {
                let needed = resource_type.target_for_level(level).saturating_sub(*live);
                if needed > 0 {
                    spawned += self.spawn_resources(resource_type, needed, level);
                }
            }
        }

        if spawned > 0 {
            info!(spawned, total = self.resources.len(), "Resource population replenished");
        }
        spawned
    }

    fn count_by_type_and_level(&self) -> HashMap<String, [u32; LEVEL_COUNT]> {
        let mut counts: HashMap<String, [u32; LEVEL_COUNT]> = HashMap::new();
        for resource_id in self.live_ids() {
            let Some(resource) = self.resources.get(&resource_id) else {
                continue;
            };
            if resource.is_dirty() {
                continue;
            }
            if let Some(level) = self.world.level_by_y(resource.map_y).filter(|l| *l < LEVEL_COUNT) {
                counts.entry(resource.resource_type.name.clone()).or_insert([0; LEVEL_COUNT])[level] += 1;
            }
        }
        counts
    }

    fn spawn_resources(&self, resource_type: &Arc<ResourceType>, count: u32, level: usize) -> usize {
        let Some(band) = self.world.level_band(level) else {
            warn!(level, resource_type = %resource_type.name, "No band for level, skipping spawn");
            return 0;
        };

        let mut spawned = 0;
        for _ in 0..count {
            let Some(resource) = self.place_candidate(resource_type, band) else {
                continue;
            };
            let network_data = resource.to_network_data();
            if self.register_resource(resource) {
                spawned += 1;
                self.broadcast_spawn(network_data);
            }
        }

        if spawned < count as usize {
            debug!(
                resource_type = %resource_type.name,
                level,
                wanted = count,
                spawned,
                "Some spawn candidates were rejected"
            );
        }
        spawned
    }

    /// Pick a spot inside the level band. Rejected when floating, visible to
    /// the local player or in front of a building.
    fn place_candidate(&self, resource_type: &Arc<ResourceType>, band: LevelBand) -> Option<Resource> {
        let x = resource_type.candidate_x(&mut *self.rng(), self.world.map_width())?;
        let (width, height) = resource_type.category.footprint();
        let y = self.world.surface_in_band(x, band, height)?;
        if x <= 0 || y <= 0 {
            return None;
        }

        if self.world.find_next_floor(x + width, y, height) != y {
            return None;
        }

        let resource = Resource::new(resource_type.clone(), x, y, 0);
        let perimeter = resource.perimeter();
        if self.view.is_in_player_view(perimeter) || self.view.is_in_front_of_building(perimeter) {
            return None;
        }
        Some(resource)
    }

    /// Drop an XP crystal worth `xp` at (x, y), settled onto the floor below.
    /// Clients only learn about crystals from the server, so this is a no-op
    /// there and returns `Ok(None)`.
    pub fn spawn_xp_crystal(&self, x: i32, y: i32, xp: u32) -> Result<Option<String>, ResourceError> {
        if self.role == Role::Client {
            debug!(x, y, xp, "Ignoring XP crystal spawn on client");
            return Ok(None);
        }

        let resource_type = self
            .types
            .by_name(XP_CRYSTAL_TYPE)
            .ok_or_else(|| ResourceError::UnknownType(XP_CRYSTAL_TYPE.to_string()))?;

        let mut crystal = Resource::new(resource_type, x, y, xp);
        crystal.map_y = self.world.find_next_floor(x + crystal.width, y, crystal.height);

        let resource_id = crystal.id.clone();
        let network_data = crystal.to_network_data();
        if self.register_resource(crystal) {
            self.broadcast_spawn(network_data);
        }
        Ok(Some(resource_id))
    }
}
