use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::header::HeaderInfo;
use crate::patch::BatchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveKind {
    /// Enveloped `__RESUME__` save.
    Resume,
    /// Bare inner payload with no envelope.
    Client,
}

impl SaveKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Resume => "resume",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for SaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Summary {
    pub kind: SaveKind,
    pub raw_size: usize,
    pub inner_size: usize,
    pub payload_offset: usize,
    pub prefix_size: usize,
    pub blob_count: usize,
    pub player_blobs: usize,
    pub world_blobs: usize,
    pub unknown_blobs: usize,
    pub parse_error_blobs: usize,
    /// Blob count per short type name.
    pub type_counts: BTreeMap<String, usize>,
    pub header: HeaderInfo,
}

/// Outcome of a heal-all pass: the value written plus the batch counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealOutcome {
    pub target_hp: f32,
    pub report: BatchReport,
}
