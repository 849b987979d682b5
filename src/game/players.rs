// src/game/players.rs
// Server-side player rewards: inventories and experience, keyed by player id

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::world::{ItemDrop, PlayerEffects};

/// Inventory item
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InventoryItem {
    pub item_id: String,
    pub quantity: u32,
}

/// Player inventory (stacks keyed by item_id)
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub items: Vec<InventoryItem>,
    pub max_slots: u32, // 0 = unlimited
}

impl Inventory {
    pub fn new(max_slots: u32) -> Self {
        Self {
            items: Vec::new(),
            max_slots,
        }
    }

    pub fn add_item(&mut self, item_id: &str, quantity: u32) -> bool {
        if let Some(existing) = self.items.iter_mut().find(|i| i.item_id == item_id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return true;
        }

        if self.max_slots > 0 && self.items.len() >= self.max_slots as usize {
            return false;
        }

        self.items.push(InventoryItem {
            item_id: item_id.to_string(),
            quantity,
        });
        true
    }

    pub fn get_item_quantity(&self, item_id: &str) -> u32 {
        self.items
            .iter()
            .find(|i| i.item_id == item_id)
            .map(|i| i.quantity)
            .unwrap_or(0)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(20)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerRewards {
    pub inventory: Inventory,
    pub xp: u64,
}

/// Rewards for every player the process has seen
#[derive(Clone)]
pub struct PlayerLedger {
    players: Arc<DashMap<String, PlayerRewards>>,
    max_slots: u32,
}

impl PlayerLedger {
    pub fn new(max_slots: u32) -> Self {
        Self {
            players: Arc::new(DashMap::new()),
            max_slots,
        }
    }

    pub fn get(&self, player_id: &str) -> Option<PlayerRewards> {
        self.players.get(player_id).map(|p| p.clone())
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl Default for PlayerLedger {
    fn default() -> Self {
        Self::new(20)
    }
}

impl PlayerEffects for PlayerLedger {
    fn add_item(&self, player_id: &str, item: &str, quantity: u32) -> bool {
        let mut player = self.players.entry(player_id.to_string()).or_insert_with(|| PlayerRewards {
            inventory: Inventory::new(self.max_slots),
            xp: 0,
        });
        let success = player.inventory.add_item(item, quantity);
        if success {
            debug!(player_id = %player_id, item_id = %item, quantity, "Item added to player inventory");
        } else {
            warn!(player_id = %player_id, item_id = %item, quantity, "Failed to add item (inventory full)");
        }
        success
    }

    fn add_xp(&self, player_id: &str, xp: u32) {
        let mut player = self.players.entry(player_id.to_string()).or_insert_with(|| PlayerRewards {
            inventory: Inventory::new(self.max_slots),
            xp: 0,
        });
        player.xp = player.xp.saturating_add(u64::from(xp));
        info!(player_id = %player_id, xp, total_xp = player.xp, "Player gained experience");
    }

    fn show_drops(&self, player_id: &str, drops: &[ItemDrop]) {
        let summary: Vec<String> = drops.iter().map(|d| format!("{}x {}", d.quantity, d.item)).collect();
        info!(player_id = %player_id, drops = %summary.join(", "), "Gathered");
    }
}
