//! Whole-blob substitution between two payloads of the same format.
//!
//! Player blobs in the target are replaced, in order, by unused source
//! player blobs of the same short type. Everything else in the target is
//! copied through byte for byte, so the output length only changes by the
//! size difference of the substituted blobs.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::blob::{Blob, Segmentation, segment_blobs};
use crate::classify::ClassificationTable;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionReport {
    pub substituted: usize,
    /// Target player blobs with no same-type source blob left.
    pub kept_unmatched: usize,
    pub substituted_by_type: BTreeMap<String, usize>,
    /// Source player blobs that found no target slot.
    pub unused_source_by_type: BTreeMap<String, usize>,
}

/// Segments both payloads from their object-region offsets and
/// substitutes.
pub fn substitute_player_blobs(
    target_payload: &[u8],
    target_start: usize,
    source_payload: &[u8],
    source_start: usize,
    table: &ClassificationTable,
) -> (Vec<u8>, SubstitutionReport) {
    let target = segment_blobs(target_payload, target_start);
    let source = segment_blobs(source_payload, source_start);
    substitute_segmented(target_payload, &target, &source.blobs, table)
}

pub fn substitute_segmented(
    target_payload: &[u8],
    target: &Segmentation<'_>,
    source_blobs: &[Blob<'_>],
    table: &ClassificationTable,
) -> (Vec<u8>, SubstitutionReport) {
    let mut pool: BTreeMap<&str, VecDeque<&[u8]>> = BTreeMap::new();
    for blob in source_blobs.iter().filter(|b| table.is_player(b.primary_type())) {
        pool.entry(blob.short_type())
            .or_default()
            .push_back(blob.raw_bytes);
    }

    let mut report = SubstitutionReport::default();
    let mut out = Vec::with_capacity(target_payload.len());
    out.extend_from_slice(&target_payload[..target.prefix.end]);

    for blob in &target.blobs {
        if !table.is_player(blob.primary_type()) {
            out.extend_from_slice(blob.raw_bytes);
            continue;
        }

        let short_type = blob.short_type();
        match pool.get_mut(short_type).and_then(VecDeque::pop_front) {
            Some(replacement) => {
                out.extend_from_slice(replacement);
                report.substituted += 1;
                *report
                    .substituted_by_type
                    .entry(short_type.to_string())
                    .or_default() += 1;
            }
            None => {
                out.extend_from_slice(blob.raw_bytes);
                report.kept_unmatched += 1;
            }
        }
    }

    report.unused_source_by_type = pool
        .into_iter()
        .filter(|(_, left)| !left.is_empty())
        .map(|(short_type, left)| (short_type.to_string(), left.len()))
        .collect();

    tracing::info!(
        substituted = report.substituted,
        kept_unmatched = report.kept_unmatched,
        unused_types = report.unused_source_by_type.len(),
        old_len = target_payload.len(),
        new_len = out.len(),
        "player blobs substituted"
    );

    (out, report)
}

/// Builds a standalone client payload: everything before the first player
/// blob, then every player blob in order. `None` when there is no player
/// blob to extract.
pub fn extract_player_blobs(
    payload: &[u8],
    segmentation: &Segmentation<'_>,
    table: &ClassificationTable,
) -> Option<Vec<u8>> {
    let players: Vec<&Blob<'_>> = segmentation
        .blobs
        .iter()
        .filter(|b| table.is_player(b.primary_type()))
        .collect();
    let first = players.first()?;

    let mut out = payload[..first.start_offset].to_vec();
    for blob in &players {
        out.extend_from_slice(blob.raw_bytes);
    }
    tracing::info!(
        player_blobs = players.len(),
        len = out.len(),
        "extracted player blobs"
    );
    Some(out)
}
