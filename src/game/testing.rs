// src/game/testing.rs
// Recording fakes for the manager's collaborators (tests only)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::manager::{Collaborators, ResourceManager, Role};
use super::protocol::{PositionUpdate, ResourceEvent};
use super::resource_type::{parse_resource_types, ResourceTypeRegistry};
use super::world::{FlatWorld, ItemDrop, LevelBand, NetworkSender, PlayerEffects, Rect, ViewQuery, WorldQuery};

pub const STONE_ONLY: &str = "\
Stone Stone 2 2 1
5
0
0
0
0
";

pub const WITH_XP_CRYSTAL: &str = "\
Stone Stone 2 2 1
5
0
0
0
0
XPCrystal XP 0 0 1
0
0
0
0
0
";

pub const WOOD_AND_PLANT: &str = "\
Wood Wood 1 3 2
0
0
0
0
0
Plant Plant 0 0 1
0
0
0
0
0
";

#[derive(Default)]
pub struct RecordingEffects {
    items: Mutex<Vec<(String, String, u32)>>,
    xp: Mutex<HashMap<String, u32>>,
    drops: Mutex<Vec<(String, Vec<ItemDrop>)>>,
    full: AtomicBool,
}

impl RecordingEffects {
    pub fn set_full(&self, full: bool) {
        self.full.store(full, Ordering::SeqCst);
    }

    pub fn items(&self) -> Vec<(String, String, u32)> {
        self.items.lock().unwrap().clone()
    }

    pub fn item_total(&self, player_id: &str, item: &str) -> u32 {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, i, _)| p == player_id && i == item)
            .map(|(_, _, q)| q)
            .sum()
    }

    pub fn shown_drops(&self) -> Vec<(String, Vec<ItemDrop>)> {
        self.drops.lock().unwrap().clone()
    }

    pub fn xp_of(&self, player_id: &str) -> u32 {
        self.xp.lock().unwrap().get(player_id).copied().unwrap_or(0)
    }
}

impl PlayerEffects for RecordingEffects {
    fn add_item(&self, player_id: &str, item: &str, quantity: u32) -> bool {
        if self.full.load(Ordering::SeqCst) {
            return false;
        }
        self.items.lock().unwrap().push((player_id.to_string(), item.to_string(), quantity));
        true
    }

    fn add_xp(&self, player_id: &str, xp: u32) {
        *self.xp.lock().unwrap().entry(player_id.to_string()).or_insert(0) += xp;
    }

    fn show_drops(&self, player_id: &str, drops: &[ItemDrop]) {
        self.drops.lock().unwrap().push((player_id.to_string(), drops.to_vec()));
    }
}

pub struct RecordingNetwork {
    ready: AtomicBool,
    events: Mutex<Vec<ResourceEvent>>,
    positions: Mutex<Vec<PositionUpdate>>,
}

impl RecordingNetwork {
    pub fn new(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            events: Mutex::new(Vec::new()),
            positions: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<ResourceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn positions(&self) -> Vec<PositionUpdate> {
        self.positions.lock().unwrap().clone()
    }
}

impl NetworkSender for RecordingNetwork {
    fn ready_for_updates(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn send_event(&self, event: ResourceEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn send_position(&self, update: PositionUpdate) {
        self.positions.lock().unwrap().push(update);
    }
}

pub struct FakeView {
    in_view: bool,
    building: bool,
}

impl FakeView {
    pub fn clear() -> Arc<Self> {
        Arc::new(Self { in_view: false, building: false })
    }

    pub fn in_view() -> Arc<Self> {
        Arc::new(Self { in_view: true, building: false })
    }

    pub fn building() -> Arc<Self> {
        Arc::new(Self { in_view: false, building: true })
    }
}

impl ViewQuery for FakeView {
    fn is_in_player_view(&self, _rect: Rect) -> bool {
        self.in_view
    }

    fn is_in_front_of_building(&self, _rect: Rect) -> bool {
        self.building
    }
}

/// Flat world whose floor falls away at `step_x`: any probe at or right of
/// it lands lower than the candidate row.
pub struct SteppedWorld {
    pub inner: FlatWorld,
    pub step_x: i32,
}

impl WorldQuery for SteppedWorld {
    fn map_width(&self) -> i32 {
        self.inner.map_width()
    }

    fn level_band(&self, level: usize) -> Option<LevelBand> {
        self.inner.level_band(level)
    }

    fn level_by_y(&self, y: i32) -> Option<usize> {
        self.inner.level_by_y(y)
    }

    fn surface_in_band(&self, x: i32, band: LevelBand, height: i32) -> Option<i32> {
        self.inner.surface_in_band(x, band, height)
    }

    fn find_next_floor(&self, x: i32, y: i32, height: i32) -> i32 {
        let floor = self.inner.find_next_floor(x, y, height);
        if x >= self.step_x {
            floor + 40
        } else {
            floor
        }
    }
}

pub struct Harness {
    pub manager: Arc<ResourceManager>,
    pub effects: Arc<RecordingEffects>,
    pub network: Arc<RecordingNetwork>,
}

pub fn harness(role: Role, config: &str) -> Harness {
    harness_with(role, config, Arc::new(FlatWorld::new(2000, 200)), FakeView::clear(), true)
}

pub fn harness_with(
    role: Role,
    config: &str,
    world: Arc<dyn WorldQuery>,
    view: Arc<FakeView>,
    network_ready: bool,
) -> Harness {
    let parsed = parse_resource_types(config);
    assert!(parsed.issues.is_empty(), "test config issues: {:?}", parsed.issues);

    let effects = Arc::new(RecordingEffects::default());
    let network = Arc::new(RecordingNetwork::new(network_ready));
    let collaborators = Collaborators {
        world,
        view,
        effects: effects.clone(),
        network: Some(network.clone() as Arc<dyn NetworkSender>),
    };

    let manager = Arc::new(ResourceManager::new(
        ResourceTypeRegistry::new(parsed.types),
        role,
        collaborators,
        12345,
    ));
    Harness { manager, effects, network }
}
