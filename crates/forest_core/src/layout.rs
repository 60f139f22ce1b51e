use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionId {
    Header,
    Prefix,
    Blob(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionLayout {
    pub id: RegionId,
    pub range: ByteRange,
}

/// How a decoded payload splits into header, prefix and blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadLayout {
    pub payload_len: usize,
    pub regions: Vec<RegionLayout>,
}

impl PayloadLayout {
    /// Checks that the regions tile `[0, payload_len)` with no gap or
    /// overlap.
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.regions.first() else {
            return Err(invalid(0, "payload layout must contain at least one region"));
        };

        if first.range.start != 0 {
            return Err(invalid(first.range.start, "layout does not start at byte 0"));
        }

        let mut expected = 0usize;
        for region in &self.regions {
            if region.range.start != expected {
                return Err(invalid(
                    region.range.start,
                    format!(
                        "layout gap/overlap around region {:?}: expected start {}, got {}",
                        region.id, expected, region.range.start
                    ),
                ));
            }
            if region.range.end < region.range.start {
                return Err(invalid(
                    region.range.start,
                    format!(
                        "invalid region range {:?}: {}..{}",
                        region.id, region.range.start, region.range.end
                    ),
                ));
            }
            expected = region.range.end;
        }

        if expected != self.payload_len {
            return Err(invalid(
                expected,
                format!(
                    "layout does not cover payload: ended at {}, payload length {}",
                    expected, self.payload_len
                ),
            ));
        }

        Ok(())
    }
}

fn invalid(offset: usize, message: impl Into<String>) -> Error {
    Error::Malformed {
        offset,
        context: "payload layout",
        message: message.into(),
    }
}
