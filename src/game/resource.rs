// src/game/resource.rs
// A single gatherable resource placed in the world and its gather lock

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::resource_type::ResourceType;
use super::world::{Point, Rect};

/// Gather lock state: Spawned -> Collecting -> Destroyed, Collecting -> Spawned
/// on release, Spawned -> Destroyed on an authoritative destroy.
/// Nothing leaves Destroyed.
///
/// `started_at` is `None` for a lock mirrored from the server; those never
/// finish locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatherState {
    Spawned,
    Collecting {
        player_id: String,
        npc: bool,
        started_at: Option<Instant>,
    },
    Destroyed,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub id: String,
    pub resource_type: Arc<ResourceType>,
    pub map_x: i32,
    pub map_y: i32,
    pub width: i32,
    pub height: i32,
    /// Non-zero marks an XP crystal: grants experience, never items
    pub xp_payload: u32,
    pub spawned_at: i64,
    state: GatherState,
}

impl Resource {
    pub fn new(resource_type: Arc<ResourceType>, map_x: i32, map_y: i32, xp_payload: u32) -> Self {
        let id = format!("{}_{}", resource_type.name.to_lowercase(), ulid::Ulid::new());
        Self::with_id(id, resource_type, map_x, map_y, xp_payload)
    }

    pub fn with_id(
        id: String,
        resource_type: Arc<ResourceType>,
        map_x: i32,
        map_y: i32,
        xp_payload: u32,
    ) -> Self {
        let (width, height) = resource_type.category.footprint();
        Self {
            id,
            resource_type,
            map_x,
            map_y,
            width,
            height,
            xp_payload,
            spawned_at: chrono::Utc::now().timestamp(),
            state: GatherState::Spawned,
        }
    }

    pub fn state(&self) -> &GatherState {
        &self.state
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, GatherState::Collecting { .. })
    }

    pub fn is_dirty(&self) -> bool {
        self.state == GatherState::Destroyed
    }

    pub fn collecting_player(&self) -> Option<&str> {
        match &self.state {
            GatherState::Collecting { player_id, .. } => Some(player_id),
            _ => None,
        }
    }

    pub fn is_npc_collecting(&self) -> bool {
        matches!(self.state, GatherState::Collecting { npc: true, .. })
    }

    /// Is `player_id` holding the lock with the given gatherer kind?
    pub fn is_held_by(&self, player_id: &str, npc: bool) -> bool {
        matches!(
            &self.state,
            GatherState::Collecting { player_id: holder, npc: kind, .. } if holder == player_id && *kind == npc
        )
    }

    pub fn center(&self) -> Point {
        Point::new(self.map_x + self.width / 2, self.map_y + self.height / 2)
    }

    pub fn perimeter(&self) -> Rect {
        Rect {
            x: self.map_x,
            y: self.map_y,
            width: self.width,
            height: self.height,
        }
    }

    /// Spawned -> Collecting. Returns false if the lock is taken or the
    /// resource is gone. Pass `None` to mirror a lock held elsewhere.
    pub fn begin_gather(&mut self, player_id: &str, npc: bool, started_at: Option<Instant>) -> bool {
        if self.state != GatherState::Spawned {
            return false;
        }
        self.state = GatherState::Collecting {
            player_id: player_id.to_string(),
            npc,
            started_at,
        };
        true
    }

    /// Collecting -> Spawned
    pub fn release_gather(&mut self) -> bool {
        if !self.is_collecting() {
            return false;
        }
        self.state = GatherState::Spawned;
        true
    }

    /// Any live state -> Destroyed. Returns false if already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.is_dirty() {
            return false;
        }
        self.state = GatherState::Destroyed;
        true
    }

    /// Per-tick update. Returns the gatherer whose timed gather has run for
    /// the type's gather duration. Mirrored locks are never reported.
    pub fn update(&self, now: Instant) -> Option<&str> {
        match &self.state {
            GatherState::Collecting { player_id, started_at: Some(started_at), .. } => {
                let needed = Duration::from_secs(u64::from(self.resource_type.gather_duration_secs));
                (now.saturating_duration_since(*started_at) >= needed).then_some(player_id.as_str())
            }
            _ => None,
        }
    }

    pub fn to_network_data(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            resource_id: self.id.clone(),
            type_name: self.resource_type.name.clone(),
            map_x: self.map_x,
            map_y: self.map_y,
            xp_payload: self.xp_payload,
            spawned_at: self.spawned_at,
        }
    }
}

/// Network data for a resource (full state carried by spawn events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub resource_id: String,
    pub type_name: String,
    pub map_x: i32,
    pub map_y: i32,
    pub xp_payload: u32,
    pub spawned_at: i64,
}
