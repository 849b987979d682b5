// src/game/resource_type.rs
// Static resource definitions loaded from the resource config file
//
// File format (one record per type):
//   <name> <category> <yieldMin> <yieldMax> <gatherSeconds>
//   <target count for level 0>
//   ... (5 level lines in total)
// Blank lines and lines starting with "//" are ignored.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ConfigError;

/// Number of depth levels the world is split into
pub const LEVEL_COUNT: usize = 5;

/// Item kind a resource grants. Drives bonus drops and the sprite footprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    Stone,
    Wood,
    Plant,
    Experience,
    Other(String),
}

/// One independent bonus roll: `chance_percent` out of 100, quantity in `min..=max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusRule {
    pub item: &'static str,
    pub chance_percent: u32,
    pub min: u32,
    pub max: u32,
}

const STONE_BONUS: &[BonusRule] = &[BonusRule { item: "Pebble", chance_percent: 30, min: 1, max: 2 }];

const WOOD_BONUS: &[BonusRule] = &[
    BonusRule { item: "Thorn", chance_percent: 20, min: 1, max: 1 },
    BonusRule { item: "Flower", chance_percent: 15, min: 1, max: 1 },
];

const PLANT_BONUS: &[BonusRule] = &[
    BonusRule { item: "Thorn", chance_percent: 40, min: 1, max: 2 },
    BonusRule { item: "Web", chance_percent: 25, min: 1, max: 1 },
    BonusRule { item: "Flower", chance_percent: 30, min: 1, max: 1 },
    BonusRule { item: "PumpkinSeed", chance_percent: 2, min: 1, max: 2 },
    BonusRule { item: "WheatSeed", chance_percent: 5, min: 1, max: 2 },
];

impl ResourceCategory {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Stone" => Self::Stone,
            "Wood" => Self::Wood,
            "Plant" => Self::Plant,
            "XP" | "Experience" => Self::Experience,
            other => Self::Other(other.to_string()),
        }
    }

    /// Name of the item handed to the player on a successful gather
    pub fn item_name(&self) -> &str {
        match self {
            Self::Stone => "Stone",
            Self::Wood => "Wood",
            Self::Plant => "Plant",
            Self::Experience => "XP",
            Self::Other(name) => name,
        }
    }

    pub fn bonus_rules(&self) -> &'static [BonusRule] {
        match self {
            Self::Stone => STONE_BONUS,
            Self::Wood => WOOD_BONUS,
            Self::Plant => PLANT_BONUS,
            Self::Experience | Self::Other(_) => &[],
        }
    }

    /// Width and height of the placed sprite in world units
    pub fn footprint(&self) -> (i32, i32) {
        match self {
            Self::Stone => (32, 24),
            Self::Wood => (48, 64),
            Self::Plant => (24, 24),
            Self::Experience => (16, 16),
            Self::Other(_) => (32, 32),
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.item_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    pub name: String,
    pub category: ResourceCategory,
    pub yield_min: u32,
    pub yield_max: u32,
    pub gather_duration_secs: u32,
    pub target_count_by_level: [u32; LEVEL_COUNT],
}

impl ResourceType {
    /// 0..0 yield: nothing to put in the inventory, the gather always succeeds
    pub fn has_degenerate_yield(&self) -> bool {
        self.yield_min == 0 && self.yield_max == 0
    }

    pub fn roll_quantity<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.yield_max <= self.yield_min {
            return self.yield_min;
        }
        rng.gen_range(self.yield_min..=self.yield_max)
    }

    pub fn target_for_level(&self, level: usize) -> u32 {
        self.target_count_by_level.get(level).copied().unwrap_or(0)
    }

    /// Candidate column for a new instance; the world decides the row.
    /// `None` when the map is too narrow for the footprint.
    pub fn candidate_x<R: Rng + ?Sized>(&self, rng: &mut R, map_width: i32) -> Option<i32> {
        let (width, _) = self.category.footprint();
        let max_x = map_width - width;
        if max_x <= 1 {
            return None;
        }
        Some(rng.gen_range(1..max_x))
    }
}

/// All resource types known to the process, shared by every instance
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeRegistry {
    types: Vec<Arc<ResourceType>>,
}

impl ResourceTypeRegistry {
    pub fn new(types: Vec<ResourceType>) -> Self {
        Self {
            types: types.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<ResourceType>> {
        self.types.iter().find(|t| t.name == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceType>> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Result of a best-effort parse: every complete record plus what went wrong
#[derive(Debug, Default)]
pub struct ParsedTypes {
    pub types: Vec<ResourceType>,
    pub issues: Vec<ConfigError>,
}

struct PendingRecord {
    header: Option<ResourceType>,
    name: String,
    levels: [u32; LEVEL_COUNT],
    filled: usize,
}

/// Parse resource type definitions. Never fails; malformed records are
/// logged, recorded in `issues` and dropped.
pub fn parse_resource_types(source: &str) -> ParsedTypes {
    let mut parsed = ParsedTypes::default();
    let mut pending: Option<PendingRecord> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        let Some(mut record) = pending.take() else {
            pending = Some(parse_header(line, line_no, &mut parsed.issues));
            continue;
        };

        let level = match line.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                report(&mut parsed.issues, ConfigError::InvalidNumber { line: line_no, value: line.to_string() });
                0
            }
        };
        record.levels[record.filled] = level;
        record.filled += 1;

        if record.filled < LEVEL_COUNT {
            pending = Some(record);
        } else if let Some(mut rt) = record.header {
            rt.target_count_by_level = record.levels;
            parsed.types.push(rt);
        }
    }

    if let Some(record) = pending {
        report(
            &mut parsed.issues,
            ConfigError::TruncatedRecord { name: record.name, levels: record.filled },
        );
    }

    parsed
}

fn parse_header(line: &str, line_no: usize, issues: &mut Vec<ConfigError>) -> PendingRecord {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let name = parts.first().copied().unwrap_or_default().to_string();
    let mut record = PendingRecord {
        header: None,
        name: name.clone(),
        levels: [0; LEVEL_COUNT],
        filled: 0,
    };

    if parts.len() != 5 {
        report(issues, ConfigError::MalformedHeader { line: line_no, fields: parts.len() });
        if parts.len() < 5 {
            return record;
        }
    }

    let mut numbers = [0u32; 3];
    for (slot, raw) in numbers.iter_mut().zip(&parts[2..5]) {
        match raw.parse::<u32>() {
            Ok(v) => *slot = v,
            Err(_) => {
                report(issues, ConfigError::InvalidNumber { line: line_no, value: raw.to_string() });
                return record;
            }
        }
    }

    record.header = Some(ResourceType {
        name,
        category: ResourceCategory::parse(parts[1]),
        yield_min: numbers[0],
        yield_max: numbers[1],
        gather_duration_secs: numbers[2],
        target_count_by_level: [0; LEVEL_COUNT],
    });
    record
}

fn report(issues: &mut Vec<ConfigError>, issue: ConfigError) {
    warn!(error = %issue, "Resource config issue");
    issues.push(issue);
}

/// Read and parse the resource config file
pub fn load_resource_types(path: impl AsRef<Path>) -> Result<ParsedTypes, ConfigError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let parsed = parse_resource_types(&source);
    info!(
        path = %path.display(),
        types = parsed.types.len(),
        issues = parsed.issues.len(),
        "Loaded resource types"
    );
    Ok(parsed)
}
