// src/game/gather.rs
// Gather locking and completion.
//
// The lock helpers at the bottom are the only writers of the collecting
// index, so it always mirrors the resources' gather state. Lock order is
// resources -> collecting; never hold a collecting guard while touching
// resources.

use rand::Rng;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::manager::{ResourceManager, Role};
use super::resource::Resource;
use super::world::{ItemDrop, Point};

/// Result of finishing a gather
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatherOutcome {
    /// Rewards granted and the resource destroyed here
    AppliedLocally { xp: u32, drops: Vec<ItemDrop> },
    /// Client: completion sent to the server, waiting for its Destroy
    AwaitingServerConfirmation,
    /// Primary item did not fit; the resource stays in the world
    InventoryFull,
    /// Someone else holds the gather lock
    LockedByOther,
    /// Resource unknown or already destroyed
    Stale,
}

impl GatherOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::AppliedLocally { .. })
    }
}

impl ResourceManager {
    /// Lock the nearest free resource within `max_distance` of `origin` for
    /// `player_id`. `None` means nothing in range (or the player already
    /// holds a lock); callers treat it as a normal outcome.
    pub fn start_gather(&self, player_id: &str, origin: Point, max_distance: f64, npc: bool) -> Option<String> {
        if self.holds_lock(player_id) {
            debug!(player_id = %player_id, "Player already gathering");
            return None;
        }

        let mut closest: Option<(f64, String)> = None;
        for resource_id in self.live_ids() {
            let Some(resource) = self.resources.get(&resource_id) else {
                continue;
            };
            if resource.is_collecting() || resource.is_dirty() {
                continue;
            }
            let distance = origin.distance_to(&resource.center());
            let closer = match &closest {
                None => true,
                Some((best, best_id)) => distance < *best || (distance == *best && resource_id < *best_id),
            };
            if closer {
                closest = Some((distance, resource_id));
            }
        }

        let (distance, resource_id) = closest?;
        if distance > max_distance {
            return None;
        }

        let mut resource = self.resources.get_mut(&resource_id)?;
        if !self.lock_entry(&mut resource, player_id, npc, Some(Instant::now())) {
            // taken between the scan and now
            return None;
        }
        debug!(
            player_id = %player_id,
            resource_id = %resource_id,
            npc,
            distance,
            "Gather started"
        );
        let status = resource.clone();
        drop(resource);
        self.broadcast_status(&status);
        Some(resource_id)
    }

    /// Release the lock `player_id` holds as a human gatherer. No-op if none.
    pub fn stop_gather(&self, player_id: &str) {
        self.release_player(player_id, false);
    }

    /// Release the lock `player_id`'s NPC holds. No-op if none.
    pub fn stop_npc_gather(&self, player_id: &str) {
        self.release_player(player_id, true);
    }

    fn release_player(&self, player_id: &str, npc: bool) {
        let held: Vec<String> = self
            .collecting
            .iter()
            .filter(|entry| entry.value() == player_id)
            .map(|entry| entry.key().clone())
            .collect();

        for resource_id in held {
            let Some(mut resource) = self.resources.get_mut(&resource_id) else {
                continue;
            };
            if !resource.is_held_by(player_id, npc) || !self.unlock_entry(&mut resource) {
                continue;
            }
            debug!(player_id = %player_id, resource_id = %resource_id, npc, "Gather stopped");
            let status = resource.clone();
            drop(resource);
            self.broadcast_status(&status);
        }
    }

    fn holds_lock(&self, player_id: &str) -> bool {
        self.collecting.iter().any(|entry| entry.value() == player_id)
    }

    /// Finish a gather. Clients only notify the server; server and
    /// single-player grant rewards and destroy the resource exactly once.
    pub fn complete_gather(&self, player_id: &str, resource_id: &str) -> GatherOutcome {
        match self.role {
            Role::Client => self.request_completion(player_id, resource_id),
            Role::Server | Role::SinglePlayer => self.apply_completion(player_id, resource_id),
        }
    }

    fn request_completion(&self, player_id: &str, resource_id: &str) -> GatherOutcome {
        {
            let Some(mut resource) = self.resources.get_mut(resource_id) else {
                return GatherOutcome::Stale;
            };
            if resource.is_dirty() {
                return GatherOutcome::Stale;
            }
            if resource.is_collecting() && resource.collecting_player() != Some(player_id) {
                return GatherOutcome::LockedByOther;
            }
            self.unlock_entry(&mut resource);
        }

        self.send_gather_completed(player_id, resource_id);
        GatherOutcome::AwaitingServerConfirmation
    }

    fn apply_completion(&self, player_id: &str, resource_id: &str) -> GatherOutcome {
        // Hold the entry for the whole grant so two completions of the same
        // resource cannot both pay out. Collaborators must not call back into
        // the manager from here.
        let Some(mut resource) = self.resources.get_mut(resource_id) else {
            return GatherOutcome::Stale;
        };
        if resource.is_dirty() {
            return GatherOutcome::Stale;
        }
        if resource.is_collecting() && resource.collecting_player() != Some(player_id) {
            return GatherOutcome::LockedByOther;
        }
        self.unlock_entry(&mut resource);

        let outcome = if resource.xp_payload > 0 {
            self.effects.add_xp(player_id, resource.xp_payload);
            GatherOutcome::AppliedLocally { xp: resource.xp_payload, drops: Vec::new() }
        } else {
            match self.grant_items(player_id, &resource) {
                Some(drops) => GatherOutcome::AppliedLocally { xp: 0, drops },
                None => {
                    warn!(player_id = %player_id, resource_id = %resource_id, "Inventory full, gather not applied");
                    // lock was released above; tell clients it is free again
                    let status = resource.clone();
                    drop(resource);
                    self.broadcast_status(&status);
                    return GatherOutcome::InventoryFull;
                }
            }
        };

        self.destroy_entry(&mut resource);
        drop(resource);

        info!(player_id = %player_id, resource_id = %resource_id, "Resource gathered");
        self.broadcast_destroy(resource_id);
        outcome
    }

    /// Primary item plus category bonus rolls. `None` if the primary item
    /// did not fit.
    fn grant_items(&self, player_id: &str, resource: &Resource) -> Option<Vec<ItemDrop>> {
        let resource_type = &resource.resource_type;
        let mut rng = self.rng();
        let quantity = resource_type.roll_quantity(&mut *rng);
        let item = resource_type.category.item_name();

        let granted = resource_type.has_degenerate_yield() || self.effects.add_item(player_id, item, quantity);
        if !granted {
            return None;
        }

        let mut drops = Vec::new();
        if quantity > 0 {
            drops.push(ItemDrop::new(item, quantity));
        }

        for rule in resource_type.category.bonus_rules() {
            if rng.gen_range(1..=100) <= rule.chance_percent {
                let bonus = rng.gen_range(rule.min..=rule.max);
                self.effects.add_item(player_id, rule.item, bonus);
                drops.push(ItemDrop::new(rule.item, bonus));
            }
        }
        drop(rng);

        if !drops.is_empty() {
            self.effects.show_drops(player_id, &drops);
        }
        Some(drops)
    }

    /// Mark a resource destroyed; it is removed on the next tick.
    /// Returns false if it was unknown or already destroyed.
    pub fn destroy_resource(&self, resource_id: &str) -> bool {
        let Some(mut resource) = self.resources.get_mut(resource_id) else {
            return false;
        };
        let destroyed = self.destroy_entry(&mut resource);
        if destroyed {
            debug!(resource_id = %resource_id, "Resource destroyed");
        }
        destroyed
    }

    /// Every indexed resource must be live and collecting by the indexed
    /// player, and every collecting resource must be indexed.
    pub fn collecting_index_violations(&self) -> Vec<String> {
        let indexed: Vec<(String, String)> = self
            .collecting
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut violations = Vec::new();
        for (resource_id, player_id) in &indexed {
            match self.resources.get(resource_id) {
                Some(r) if r.collecting_player() == Some(player_id.as_str()) => {}
                Some(_) => violations.push(format!("{resource_id}: indexed for {player_id} but not held by them")),
                None => violations.push(format!("{resource_id}: indexed but not live")),
            }
        }

        for resource_id in self.live_ids() {
            let collecting = self.resources.get(&resource_id).map(|r| r.is_collecting()).unwrap_or(false);
            if collecting && !indexed.iter().any(|(id, _)| *id == resource_id) {
                violations.push(format!("{resource_id}: collecting but not indexed"));
            }
        }
        violations
    }

    pub(super) fn lock_entry(
        &self,
        resource: &mut Resource,
        player_id: &str,
        npc: bool,
        started_at: Option<Instant>,
    ) -> bool {
        if !resource.begin_gather(player_id, npc, started_at) {
            return false;
        }
        self.collecting.insert(resource.id.clone(), player_id.to_string());
        true
    }

    pub(super) fn unlock_entry(&self, resource: &mut Resource) -> bool {
        if !resource.release_gather() {
            return false;
        }
        self.collecting.remove(&resource.id);
        true
    }

    pub(super) fn destroy_entry(&self, resource: &mut Resource) -> bool {
        let was_collecting = resource.is_collecting();
        if !resource.destroy() {
            return false;
        }
        if was_collecting {
            self.collecting.remove(&resource.id);
        }
        true
    }

    pub(super) fn clear_locks(&self) {
        self.collecting.clear();
    }
}
