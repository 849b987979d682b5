// src/game/world.rs
// Capabilities the resource manager borrows from the rest of the game:
// terrain queries, camera/building occlusion, player rewards and the network.
// The manager receives these at construction instead of reaching for globals.

use serde::{Deserialize, Serialize};

use super::protocol::{PositionUpdate, ResourceEvent};
use super::resource_type::LEVEL_COUNT;

/// Integer point in world coordinates (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }
}

/// Vertical band `[top, bottom)` of one depth level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelBand {
    pub top: i32,
    pub bottom: i32,
}

/// One line of a drop indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub item: String,
    pub quantity: u32,
}

impl ItemDrop {
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        Self { item: item.into(), quantity }
    }
}

/// Terrain queries
pub trait WorldQuery: Send + Sync {
    fn map_width(&self) -> i32;

    fn level_band(&self, level: usize) -> Option<LevelBand>;

    fn level_by_y(&self, y: i32) -> Option<usize>;

    /// Row where something `height` tall standing at column `x` inside `band`
    /// would rest, if there is ground there.
    fn surface_in_band(&self, x: i32, band: LevelBand, height: i32) -> Option<i32>;

    /// Row at or below `y` where a footprint `height` tall would rest on solid
    /// ground when probed at column `x`.
    fn find_next_floor(&self, x: i32, y: i32, height: i32) -> i32;
}

/// Camera and building occlusion
pub trait ViewQuery: Send + Sync {
    /// True if any part of `rect` is inside the local player's camera
    fn is_in_player_view(&self, rect: Rect) -> bool;

    fn is_in_front_of_building(&self, rect: Rect) -> bool;
}

/// Rewards handed to whoever finished a gather
pub trait PlayerEffects: Send + Sync {
    /// Returns false if the item could not be stored (inventory full)
    fn add_item(&self, player_id: &str, item: &str, quantity: u32) -> bool;

    fn add_xp(&self, player_id: &str, xp: u32);

    fn show_drops(&self, player_id: &str, drops: &[ItemDrop]);
}

/// Outbound side of the transport. Sends are fire-and-forget.
pub trait NetworkSender: Send + Sync {
    fn ready_for_updates(&self) -> bool;

    /// Reliable channel
    fn send_event(&self, event: ResourceEvent);

    /// Best-effort channel
    fn send_position(&self, update: PositionUpdate);
}

/// Flat terrain: every level is `level_height` tall and its floor is the
/// band's bottom edge. Nothing ever blocks the view.
#[derive(Debug, Clone, Copy)]
pub struct FlatWorld {
    pub map_width: i32,
    pub level_height: i32,
}

impl FlatWorld {
    pub fn new(map_width: i32, level_height: i32) -> Self {
        Self { map_width, level_height }
    }
}

impl WorldQuery for FlatWorld {
    fn map_width(&self) -> i32 {
        self.map_width
    }

    fn level_band(&self, level: usize) -> Option<LevelBand> {
        if level >= LEVEL_COUNT {
            return None;
        }
        let top = level as i32 * self.level_height;
        Some(LevelBand { top, bottom: top + self.level_height })
    }

    fn level_by_y(&self, y: i32) -> Option<usize> {
        if y < 0 || self.level_height <= 0 {
            return None;
        }
        let level = (y / self.level_height) as usize;
        (level < LEVEL_COUNT).then_some(level)
    }

    fn surface_in_band(&self, x: i32, band: LevelBand, height: i32) -> Option<i32> {
        if x < 0 || x >= self.map_width || height > band.bottom - band.top {
            return None;
        }
        Some(band.bottom - height)
    }

    fn find_next_floor(&self, _x: i32, y: i32, height: i32) -> i32 {
        if self.level_height <= 0 {
            return y;
        }
        let feet = (y + height).max(0);
        let floor = ((feet + self.level_height - 1) / self.level_height) * self.level_height;
        floor - height
    }
}

impl ViewQuery for FlatWorld {
    fn is_in_player_view(&self, _rect: Rect) -> bool {
        false
    }

    fn is_in_front_of_building(&self, _rect: Rect) -> bool {
        false
    }
}
