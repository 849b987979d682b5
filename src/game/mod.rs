// src/game/mod.rs
// Resource management: population, gather locking and network sync

pub mod error;
pub mod gather;
pub mod manager;
pub mod players;
pub mod population;
pub mod protocol;
pub mod resource;
pub mod resource_type;
pub mod sync;
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ConfigError, ResourceError};
pub use gather::GatherOutcome;
pub use manager::{Collaborators, ResourceManager, ResourceStats, Role, TickReport};
pub use players::PlayerLedger;
pub use protocol::{Channel, GatherStatus, PositionUpdate, ResourceAction, ResourceEvent};
pub use resource::{GatherState, Resource, ResourceSnapshot};
pub use resource_type::{load_resource_types, ResourceCategory, ResourceType, ResourceTypeRegistry, LEVEL_COUNT};
pub use world::{FlatWorld, ItemDrop, NetworkSender, PlayerEffects, Point, Rect, ViewQuery, WorldQuery};
