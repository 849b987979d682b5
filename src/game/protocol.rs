// src/game/protocol.rs
// Resource messages exchanged between server and clients.
// Discrete events travel on the reliable channel as JSON, position/status
// updates on the best-effort channel as FlexBuffers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::ResourceError;
use super::resource::ResourceSnapshot;

/// Transport channel a packet arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Ordered, reliable: `ResourceEvent`
    Reliable,
    /// Unordered, may drop: `PositionUpdate`
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResourceAction {
    Destroy,
}

/// Reliable, semantically significant messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceEvent {
    /// Server created a resource
    Spawn { resource: ResourceSnapshot },
    /// Full live set, sent to a client when it joins
    Snapshot { resources: Vec<ResourceSnapshot> },
    /// Server changed an existing resource
    Update {
        resource_id: String,
        action: ResourceAction,
    },
    /// Client finished a gather and asks the server to apply it
    GatherCompleted {
        player_id: String,
        resource_id: String,
    },
}

impl ResourceEvent {
    pub fn destroy(resource_id: impl Into<String>) -> Self {
        Self::Update {
            resource_id: resource_id.into(),
            action: ResourceAction::Destroy,
        }
    }

    pub fn encode(&self) -> Result<Bytes, ResourceError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ResourceError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatherStatus {
    Idle,
    Collecting { player_id: String, npc: bool },
}

/// High-frequency position/status delta. Only applied to resources the
/// receiver already knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub resource_id: String,
    pub map_x: i32,
    pub map_y: i32,
    pub gather: Option<GatherStatus>,
}

impl PositionUpdate {
    pub fn encode(&self) -> Result<Bytes, ResourceError> {
        Ok(Bytes::from(flexbuffers::to_vec(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ResourceError> {
        Ok(flexbuffers::from_slice(payload)?)
    }
}
