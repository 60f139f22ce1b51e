//! Length-preserving scalar patches, currently building hit points.
//!
//! The object graph inside a blob is never decoded. Instead
//! [`HpFieldLocator`] runs a best-effort local signature search: find the
//! type token, find the field-name token shortly after it, then find the
//! value-marker signature shortly after that. The four bytes after the
//! signature are the field, accepted only if they decode to a plausible
//! value. Everything here is approximate by construction and reports what
//! it could not find instead of guessing.

use std::sync::LazyLock;

use regex::bytes::Regex;
use serde::Serialize;

use crate::blob::Blob;
use crate::error::{Error, Result};
use crate::reader::LittleEndianReader;
use crate::scan;

pub const F32_WIDTH: usize = 4;
pub const HP_VALUE_SIGNATURE: [u8; 6] = [0x4F, 0x04, 0x00, 0x00, 0xFF, 0xFF];
/// Used by [`heal_target`] when there is nothing to take a maximum from.
pub const DEFAULT_MAX_HP: f32 = 200.0;
const COMMON_MAX_HP: [f32; 5] = [50.0, 100.0, 200.0, 400.0, 500.0];
const GUID_WINDOW: usize = 300;

static GUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("GUID pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingHealthEntry {
    pub blob_offset: usize,
    /// Absolute offset into the payload. Stale after any edit that changes
    /// blob topology; scalar patches keep it valid.
    pub hp_field_offset: usize,
    pub hp_value: f32,
    pub guid: Option<String>,
}

/// Building entries found in a payload, plus the candidate blobs whose
/// field could not be located.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildingScan {
    pub entries: Vec<BuildingHealthEntry>,
    pub unlocated: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub modified: usize,
    /// Fields that could not be located or written.
    pub skipped: usize,
    /// Located fields the operation chose not to touch.
    pub unchanged: usize,
}

/// Best-effort local signature search for a scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct HpFieldLocator {
    pub type_token: Vec<u8>,
    pub field_token: Vec<u8>,
    pub signature: Vec<u8>,
    /// How far after a type-token occurrence the field token may start.
    pub type_window: usize,
    /// How far after the end of the field token the signature may start.
    pub field_window: usize,
    pub min_exclusive: f32,
    pub max_exclusive: f32,
}

impl Default for HpFieldLocator {
    fn default() -> Self {
        Self {
            type_token: b"BuildingHealth".to_vec(),
            field_token: b"_hp".to_vec(),
            signature: HP_VALUE_SIGNATURE.to_vec(),
            type_window: 200,
            field_window: 30,
            min_exclusive: 0.0,
            max_exclusive: 100_000.0,
        }
    }
}

impl HpFieldLocator {
    pub fn is_plausible(&self, value: f32) -> bool {
        value > self.min_exclusive && value < self.max_exclusive
    }

    /// True if any declared type of the blob contains the type token. A
    /// building is often declared after its `GameObject`, so the primary
    /// type alone is not enough.
    pub fn matches_blob(&self, blob: &Blob<'_>) -> bool {
        blob.declared_types
            .iter()
            .any(|t| scan::find(t.as_bytes(), &self.type_token, 0).is_some())
    }

    pub fn locate(&self, payload: &[u8], blob: &Blob<'_>) -> Option<usize> {
        self.locate_with_anchor(payload, blob).map(|(_, offset)| offset)
    }

    /// Like [`locate`](Self::locate), but a miss is an error.
    pub fn require(&self, payload: &[u8], blob: &Blob<'_>) -> Result<usize> {
        self.locate(payload, blob).ok_or(Error::FieldNotFound {
            blob_offset: blob.start_offset,
            field: "_hp",
        })
    }

    /// Returns the absolute offset of the type-token occurrence the field
    /// was found from, and the absolute offset of the field value.
    fn locate_with_anchor(&self, payload: &[u8], blob: &Blob<'_>) -> Option<(usize, usize)> {
        let bytes = payload.get(blob.start_offset..blob.end_offset)?;
        let base = blob.start_offset;

        for anchor in scan::find_all(bytes, &self.type_token, 0) {
            let field_limit = (anchor + self.type_window).min(bytes.len());
            let mut field_from = anchor;

            while let Some(field_at) = scan::find(&bytes[..field_limit], &self.field_token, field_from)
            {
                let sig_from = field_at + self.field_token.len();
                let sig_limit =
                    (sig_from + self.field_window + self.signature.len()).min(bytes.len());
                let mut sig_search = sig_from;

                while let Some(sig_at) = scan::find(&bytes[..sig_limit], &self.signature, sig_search)
                {
                    let value_at = sig_at + self.signature.len();
                    if let Ok(value) = read_scalar_f32(bytes, value_at)
                        && self.is_plausible(value)
                    {
                        return Some((base + anchor, base + value_at));
                    }
                    sig_search = sig_at + 1;
                }
                field_from = field_at + 1;
            }
        }
        None
    }
}

/// Locates the hit-point field of a building blob with the default
/// locator.
pub fn locate_hp_field(payload: &[u8], blob: &Blob<'_>) -> Option<usize> {
    HpFieldLocator::default().locate(payload, blob)
}

pub fn read_scalar_f32(buffer: &[u8], offset: usize) -> Result<f32> {
    checked_end(buffer.len(), offset, "f32 read")?;
    LittleEndianReader::at(buffer, offset).read_f32("f32 read")
}

/// Overwrites exactly four bytes at `offset`. Never clamps.
pub fn patch_scalar_f32(buffer: &mut [u8], offset: usize, value: f32) -> Result<()> {
    let end = checked_end(buffer.len(), offset, "f32 patch")?;
    buffer[offset..end].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub fn scan_building_health(
    payload: &[u8],
    blobs: &[Blob<'_>],
    locator: &HpFieldLocator,
) -> BuildingScan {
    let mut scan = BuildingScan::default();

    for blob in blobs.iter().filter(|b| locator.matches_blob(b)) {
        let Some((anchor, hp_field_offset)) = locator.locate_with_anchor(payload, blob) else {
            tracing::debug!(blob_offset = blob.start_offset, "hp field not located");
            scan.unlocated.push(blob.start_offset);
            continue;
        };
        let Ok(hp_value) = read_scalar_f32(payload, hp_field_offset) else {
            scan.unlocated.push(blob.start_offset);
            continue;
        };

        let guid_end = (anchor + GUID_WINDOW).min(blob.end_offset);
        let guid = GUID_PATTERN
            .find(&payload[anchor..guid_end])
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned());

        scan.entries.push(BuildingHealthEntry {
            blob_offset: blob.start_offset,
            hp_field_offset,
            hp_value,
            guid,
        });
    }

    scan
}

pub fn set_one(
    payload: &mut [u8],
    entries: &mut [BuildingHealthEntry],
    index: usize,
    value: f32,
) -> Result<()> {
    let count = entries.len();
    let entry = entries.get_mut(index).ok_or_else(|| Error::InvalidArgument {
        context: "building index",
        message: format!("index {index} out of range for {count} building(s)"),
    })?;
    patch_scalar_f32(payload, entry.hp_field_offset, value)?;
    entry.hp_value = value;
    Ok(())
}

pub fn set_all(payload: &mut [u8], scan: &mut BuildingScan, value: f32) -> BatchReport {
    apply_batch(payload, scan, |_| Some(value))
}

pub fn repair_below_threshold(
    payload: &mut [u8],
    scan: &mut BuildingScan,
    threshold: f32,
    new_value: f32,
) -> BatchReport {
    apply_batch(payload, scan, |current| (current < threshold).then_some(new_value))
}

/// Highest current hit points rounded up to the nearest common building
/// maximum.
pub fn heal_target(entries: &[BuildingHealthEntry]) -> f32 {
    let Some(max_hp) = max_hp(entries) else {
        return DEFAULT_MAX_HP;
    };
    COMMON_MAX_HP
        .iter()
        .copied()
        .find(|&common| max_hp <= common)
        .unwrap_or(max_hp)
}

pub fn max_hp(entries: &[BuildingHealthEntry]) -> Option<f32> {
    entries.iter().map(|e| e.hp_value).reduce(f32::max)
}

fn apply_batch(
    payload: &mut [u8],
    scan: &mut BuildingScan,
    mut target: impl FnMut(f32) -> Option<f32>,
) -> BatchReport {
    let mut report = BatchReport {
        skipped: scan.unlocated.len(),
        ..BatchReport::default()
    };

    for entry in &mut scan.entries {
        let Some(value) = target(entry.hp_value) else {
            report.unchanged += 1;
            continue;
        };
        match patch_scalar_f32(payload, entry.hp_field_offset, value) {
            Ok(()) => {
                entry.hp_value = value;
                report.modified += 1;
            }
            Err(e) => {
                tracing::debug!(blob_offset = entry.blob_offset, error = %e, "hp patch skipped");
                report.skipped += 1;
            }
        }
    }

    report
}

fn checked_end(len: usize, offset: usize, context: &'static str) -> Result<usize> {
    offset
        .checked_add(F32_WIDTH)
        .filter(|&end| end <= len)
        .ok_or(Error::OutOfBounds {
            offset,
            width: F32_WIDTH,
            len,
            context,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::segment_blobs;

    const GUID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    fn blob_with_types(types: &[&str], body: &[u8]) -> Vec<u8> {
        let mut out = b"\x06SerV10\x00".to_vec();
        out.extend_from_slice(&(types.len() as u32).to_le_bytes());
        for t in types {
            out.push(t.len() as u8);
            out.extend_from_slice(t.as_bytes());
        }
        out.extend_from_slice(body);
        out
    }

    fn building_blob(hp: f32, guid: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(guid) = guid {
            body.extend_from_slice(guid.as_bytes());
        }
        body.extend_from_slice(b"\x03_hp\x00\x00");
        body.extend_from_slice(&HP_VALUE_SIGNATURE);
        body.extend_from_slice(&hp.to_le_bytes());
        body.extend_from_slice(b"\x00tail");
        blob_with_types(&["TheForest.Buildings.BuildingHealth"], &body)
    }

    fn payload_of(blobs: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = b"\x00prefix".to_vec();
        for blob in blobs {
            payload.extend_from_slice(blob);
        }
        payload
    }

    #[test]
    fn locates_and_patches_hp_without_touching_other_bytes() {
        let payload = payload_of(&[building_blob(150.0, None)]);
        let segmentation = segment_blobs(&payload, 0);
        let blob = &segmentation.blobs[0];

        let offset = locate_hp_field(&payload, blob).expect("hp field should be found");
        assert_eq!(read_scalar_f32(&payload, offset).expect("read"), 150.0);
        assert_eq!(&payload[offset - HP_VALUE_SIGNATURE.len()..offset], &HP_VALUE_SIGNATURE);

        let mut patched = payload.clone();
        patch_scalar_f32(&mut patched, offset, 400.0).expect("patch");
        assert_eq!(patched.len(), payload.len());
        let changed: Vec<usize> = (0..payload.len())
            .filter(|&i| payload[i] != patched[i])
            .collect();
        assert!(!changed.is_empty());
        assert!(changed.iter().all(|&i| (offset..offset + 4).contains(&i)));
        assert_eq!(read_scalar_f32(&patched, offset).expect("read"), 400.0);
    }

    #[test]
    fn implausible_values_are_skipped() {
        let payload = payload_of(&[building_blob(250_000.0, None)]);
        let segmentation = segment_blobs(&payload, 0);
        assert_eq!(locate_hp_field(&payload, &segmentation.blobs[0]), None);

        let payload = payload_of(&[building_blob(0.0, None)]);
        let segmentation = segment_blobs(&payload, 0);
        assert_eq!(locate_hp_field(&payload, &segmentation.blobs[0]), None);

        let err = HpFieldLocator::default()
            .require(&payload, &segmentation.blobs[0])
            .expect_err("no plausible value");
        assert_eq!(
            err,
            Error::FieldNotFound {
                blob_offset: 7,
                field: "_hp",
            }
        );
    }

    #[test]
    fn signature_too_far_from_field_token_is_not_used() {
        let mut body = b"_hp".to_vec();
        body.extend_from_slice(&[0u8; 31]);
        body.extend_from_slice(&HP_VALUE_SIGNATURE);
        body.extend_from_slice(&10.0f32.to_le_bytes());
        let payload = payload_of(&[blob_with_types(&["BuildingHealth"], &body)]);
        let segmentation = segment_blobs(&payload, 0);
        assert_eq!(locate_hp_field(&payload, &segmentation.blobs[0]), None);

        let locator = HpFieldLocator {
            field_window: 31,
            ..HpFieldLocator::default()
        };
        assert!(locator.locate(&payload, &segmentation.blobs[0]).is_some());
    }

    #[test]
    fn search_is_clipped_to_the_blob() {
        let first = blob_with_types(&["BuildingHealth"], b"_hp");
        let mut second = HP_VALUE_SIGNATURE.to_vec();
        second.extend_from_slice(&10.0f32.to_le_bytes());
        let mut payload = payload_of(&[first]);
        payload.extend_from_slice(&second);

        let segmentation = segment_blobs(&payload, 0);
        assert_eq!(segmentation.blobs.len(), 1);
        let clipped = Blob {
            end_offset: segmentation.blobs[0].end_offset - second.len(),
            ..segmentation.blobs[0].clone()
        };
        assert!(locate_hp_field(&payload, &segmentation.blobs[0]).is_some());
        assert_eq!(locate_hp_field(&payload, &clipped), None);
    }

    #[test]
    fn patch_past_the_end_is_out_of_bounds() {
        let mut buffer = vec![0u8; 8];
        let err = patch_scalar_f32(&mut buffer, 5, 1.0).expect_err("should fail");
        assert_eq!(
            err,
            Error::OutOfBounds {
                offset: 5,
                width: 4,
                len: 8,
                context: "f32 patch",
            }
        );
        assert_eq!(buffer, vec![0u8; 8]);
        assert!(matches!(
            read_scalar_f32(&buffer, 5),
            Err(Error::OutOfBounds { context: "f32 read", .. })
        ));
        assert!(patch_scalar_f32(&mut buffer, usize::MAX, 1.0).is_err());
        patch_scalar_f32(&mut buffer, 4, 1.0).expect("last four bytes");
    }

    #[test]
    fn scan_reports_entries_guids_and_unlocated_blobs() {
        let payload = payload_of(&[
            building_blob(150.0, Some(GUID)),
            blob_with_types(&["TheForest.Player.PlayerStats"], b"_hp"),
            blob_with_types(&["TheForest.Buildings.BuildingHealth"], b"no field here"),
            building_blob(40.0, None),
        ]);
        let segmentation = segment_blobs(&payload, 0);
        let scan = scan_building_health(&payload, &segmentation.blobs, &HpFieldLocator::default());

        assert_eq!(scan.entries.len(), 2);
        assert_eq!(scan.entries[0].hp_value, 150.0);
        assert_eq!(scan.entries[0].guid.as_deref(), Some(GUID));
        assert_eq!(scan.entries[0].blob_offset, segmentation.blobs[0].start_offset);
        assert_eq!(scan.entries[1].hp_value, 40.0);
        assert_eq!(scan.entries[1].guid, None);
        assert_eq!(scan.unlocated, vec![segmentation.blobs[2].start_offset]);
    }

    #[test]
    fn scan_finds_buildings_declared_as_a_secondary_type() {
        let mut body = b"\x03_hp".to_vec();
        body.extend_from_slice(&HP_VALUE_SIGNATURE);
        body.extend_from_slice(&150.0f32.to_le_bytes());
        let payload = payload_of(&[
            blob_with_types(
                &["UnityEngine.GameObject", "TheForest.Buildings.BuildingHealth"],
                &body,
            ),
            blob_with_types(
                &["UnityEngine.GameObject", "TheForest.Buildings.BuildingHealth"],
                b"no field here",
            ),
        ]);
        let segmentation = segment_blobs(&payload, 0);
        let locator = HpFieldLocator::default();
        assert!(locator.matches_blob(&segmentation.blobs[0]));

        let scan = scan_building_health(&payload, &segmentation.blobs, &locator);
        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.entries[0].hp_value, 150.0);
        assert_eq!(
            Some(scan.entries[0].hp_field_offset),
            locator.locate(&payload, &segmentation.blobs[0])
        );
        assert_eq!(scan.unlocated, vec![segmentation.blobs[1].start_offset]);
    }

    #[test]
    fn batch_edits_count_modified_skipped_and_unchanged() {
        let mut payload = payload_of(&[
            building_blob(150.0, None),
            blob_with_types(&["BuildingHealth"], b"nothing"),
            building_blob(20.0, None),
        ]);
        let segmentation = segment_blobs(&payload, 0);
        let mut scan =
            scan_building_health(&payload, &segmentation.blobs, &HpFieldLocator::default());

        let report = repair_below_threshold(&mut payload, &mut scan, 100.0, 200.0);
        assert_eq!(
            report,
            BatchReport {
                modified: 1,
                skipped: 1,
                unchanged: 1,
            }
        );
        assert_eq!(scan.entries[1].hp_value, 200.0);
        let offset = scan.entries[1].hp_field_offset;
        assert_eq!(read_scalar_f32(&payload, offset).expect("read"), 200.0);

        let report = set_all(&mut payload, &mut scan, 75.0);
        assert_eq!(report.modified, 2);
        assert_eq!(report.skipped, 1);
        assert!(scan.entries.iter().all(|e| e.hp_value == 75.0));
    }

    #[test]
    fn single_edits_reject_bad_indices() {
        let mut payload = payload_of(&[building_blob(150.0, None)]);
        let segmentation = segment_blobs(&payload, 0);
        let mut scan =
            scan_building_health(&payload, &segmentation.blobs, &HpFieldLocator::default());

        set_one(&mut payload, &mut scan.entries, 0, 90.0).expect("index 0 exists");
        assert_eq!(scan.entries[0].hp_value, 90.0);
        let err = set_one(&mut payload, &mut scan.entries, 3, 90.0).expect_err("no index 3");
        assert!(matches!(err, Error::InvalidArgument { context: "building index", .. }));
    }

    #[test]
    fn heal_target_rounds_up_to_common_maximums() {
        let entry = |hp_value| BuildingHealthEntry {
            blob_offset: 0,
            hp_field_offset: 0,
            hp_value,
            guid: None,
        };
        assert_eq!(heal_target(&[]), DEFAULT_MAX_HP);
        assert_eq!(heal_target(&[entry(30.0), entry(45.0)]), 50.0);
        assert_eq!(heal_target(&[entry(100.0)]), 100.0);
        assert_eq!(heal_target(&[entry(10.0), entry(320.0)]), 400.0);
        assert_eq!(heal_target(&[entry(900.0)]), 900.0);
    }
}
