use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Type-name fragments that mark a blob as belonging to the player rather
/// than the world. Order matters only for reporting; membership is by
/// substring.
pub const DEFAULT_PLAYER_MARKERS: &[&str] = &[
    "InventoryItemView",
    "DecayingInventoryItemView",
    "MapInventoryItemView",
    "WaterSkinInventoryItemView",
    "RobotInventoryItemView",
    "DrawingsInventoryItemView",
    "UpgradeViewReceiver",
    "SurvivalBookBestiary",
    "SurvivalBookTodo",
    "ItemStorage",
    "ActiveAreaInfo",
    "HeldItemsData",
    "TickOffSystem",
    "PassengerManifest",
    "PlayerClothing",
    "PlayerStats",
    "CaveMapDrawer",
    "WalkmanControler",
    "LogControler",
    "AchievementsManager",
];

pub const DEFAULT_WORLD_MARKERS: &[&str] =
    &["BuildingHealth", "Architect", "TreeStructure", "Fire2", "Cook"];

static DEFAULT_TABLE: LazyLock<ClassificationTable> = LazyLock::new(ClassificationTable::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Player,
    World,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Player => "player",
            Self::World => "world",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring membership lists consulted by [`ClassificationTable::classify`].
///
/// Deserializes from `{"player": [...], "world": [...]}`; a missing list
/// falls back to the built-in one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationTable {
    pub player: Vec<String>,
    pub world: Vec<String>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self {
            player: DEFAULT_PLAYER_MARKERS.iter().map(|s| s.to_string()).collect(),
            world: DEFAULT_WORLD_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassificationTable {
    /// First match wins; the player list is checked before the world list.
    pub fn classify(&self, primary_type: &str) -> Category {
        if self.player.iter().any(|m| primary_type.contains(m.as_str())) {
            Category::Player
        } else if self.world.iter().any(|m| primary_type.contains(m.as_str())) {
            Category::World
        } else {
            Category::Unknown
        }
    }

    pub fn is_player(&self, primary_type: &str) -> bool {
        self.classify(primary_type) == Category::Player
    }

    pub fn with_player_marker(mut self, marker: impl Into<String>) -> Self {
        self.player.push(marker.into());
        self
    }

    pub fn with_world_marker(mut self, marker: impl Into<String>) -> Self {
        self.world.push(marker.into());
        self
    }
}

/// Classifies against the built-in table.
pub fn classify(primary_type: &str) -> Category {
    DEFAULT_TABLE.classify(primary_type)
}
