use std::collections::BTreeMap;

use crate::blob::{Blob, Segmentation, segment_blobs};
use crate::classify::{Category, ClassificationTable};
use crate::envelope::{self, NestedDecoder, RawEnvelope};
use crate::header::{HeaderInfo, parse_header};
use crate::layout::PayloadLayout;
use crate::patch::{self, BatchReport, BuildingHealthEntry, BuildingScan, HpFieldLocator};
use crate::substitute::{self, SubstitutionReport};

use super::error::{CoreError, CoreErrorCode};
use super::types::{HealOutcome, SaveKind, Summary};

#[derive(Debug, Default, Clone)]
pub struct Engine {
    classification: ClassificationTable,
    locator: HpFieldLocator,
    decoder: NestedDecoder,
}

#[derive(Debug)]
struct LoadedSave {
    envelope: Option<RawEnvelope>,
    payload: Vec<u8>,
    header: HeaderInfo,
}

#[derive(Debug)]
pub struct Session {
    kind: SaveKind,
    original: Vec<u8>,
    envelope: Option<RawEnvelope>,
    payload: Vec<u8>,
    header: HeaderInfo,
    buildings: BuildingScan,
    classification: ClassificationTable,
    locator: HpFieldLocator,
    decoder: NestedDecoder,
    modified: bool,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classification(mut self, classification: ClassificationTable) -> Self {
        self.classification = classification;
        self
    }

    pub fn with_locator(mut self, locator: HpFieldLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_decoder(mut self, decoder: NestedDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn classification(&self) -> &ClassificationTable {
        &self.classification
    }

    pub fn open_bytes<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        hint: Option<SaveKind>,
    ) -> Result<Session, CoreError> {
        let bytes = bytes.as_ref();

        match hint {
            Some(SaveKind::Resume) => parse_resume(bytes)
                .map(|save| self.session(SaveKind::Resume, bytes, save))
                .map_err(|e| {
                    CoreError::new(
                        CoreErrorCode::Parse,
                        format!("failed to parse as resume save: {e}"),
                    )
                }),
            Some(SaveKind::Client) => parse_client(bytes)
                .map(|save| self.session(SaveKind::Client, bytes, save))
                .map_err(|e| {
                    CoreError::new(
                        CoreErrorCode::Parse,
                        format!("failed to parse as client save: {e}"),
                    )
                }),
            None => {
                let resume = parse_resume(bytes);
                let client = parse_client(bytes);

                match (resume, client) {
                    (Ok(save), Err(_)) => Ok(self.session(SaveKind::Resume, bytes, save)),
                    (Err(_), Ok(save)) => Ok(self.session(SaveKind::Client, bytes, save)),
                    (Ok(_), Ok(_)) => Err(CoreError::new(
                        CoreErrorCode::KindDetectionAmbiguous,
                        "input parsed as both a resume save and a client save; supply a kind hint",
                    )),
                    (Err(e1), Err(e2)) => Err(CoreError::new(
                        CoreErrorCode::Parse,
                        format!("failed to parse input: resume: {e1}; client: {e2}"),
                    )),
                }
            }
        }
    }

    fn session(&self, kind: SaveKind, original: &[u8], save: LoadedSave) -> Session {
        let buildings = scan_buildings(&save.payload, save.header.payload_offset, &self.locator);
        tracing::debug!(
            kind = %kind,
            inner_len = save.payload.len(),
            payload_offset = save.header.payload_offset,
            buildings = buildings.entries.len(),
            "opened save"
        );

        Session {
            kind,
            original: original.to_vec(),
            envelope: save.envelope,
            payload: save.payload,
            header: save.header,
            buildings,
            classification: self.classification.clone(),
            locator: self.locator.clone(),
            decoder: self.decoder,
            modified: false,
        }
    }
}

impl Session {
    pub fn kind(&self) -> SaveKind {
        self.kind
    }

    pub fn header(&self) -> &HeaderInfo {
        &self.header
    }

    /// The decoded inner payload, including any edits made so far.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The envelope as it was read. `None` for client saves.
    pub fn envelope(&self) -> Option<&RawEnvelope> {
        self.envelope.as_ref()
    }

    pub fn classification(&self) -> &ClassificationTable {
        &self.classification
    }

    pub fn segmentation(&self) -> Segmentation<'_> {
        segment_blobs(&self.payload, self.header.payload_offset)
    }

    pub fn blobs(&self) -> Vec<Blob<'_>> {
        self.segmentation().blobs
    }

    pub fn layout(&self) -> PayloadLayout {
        self.segmentation().layout(self.payload.len())
    }

    pub fn summary(&self) -> Summary {
        let segmentation = self.segmentation();
        let mut summary = Summary {
            kind: self.kind,
            raw_size: self.original.len(),
            inner_size: self.payload.len(),
            payload_offset: self.header.payload_offset,
            prefix_size: segmentation.prefix.len(),
            blob_count: segmentation.blobs.len(),
            player_blobs: 0,
            world_blobs: 0,
            unknown_blobs: 0,
            parse_error_blobs: 0,
            type_counts: BTreeMap::new(),
            header: self.header.clone(),
        };

        for blob in &segmentation.blobs {
            match self.classification.classify(blob.primary_type()) {
                Category::Player => summary.player_blobs += 1,
                Category::World => summary.world_blobs += 1,
                Category::Unknown => summary.unknown_blobs += 1,
            }
            if blob.is_parse_error() {
                summary.parse_error_blobs += 1;
            }
            *summary
                .type_counts
                .entry(blob.short_type().to_string())
                .or_default() += 1;
        }

        summary
    }

    pub fn buildings(&self) -> &[BuildingHealthEntry] {
        &self.buildings.entries
    }

    /// Offsets of building blobs whose hit-point field could not be found.
    pub fn unlocated_buildings(&self) -> &[usize] {
        &self.buildings.unlocated
    }

    pub fn set_building_hp(&mut self, index: usize, hp: f32) -> Result<(), CoreError> {
        validate_hp(hp)?;
        patch::set_one(&mut self.payload, &mut self.buildings.entries, index, hp)?;
        self.modified = true;
        Ok(())
    }

    pub fn set_all_building_hp(&mut self, hp: f32) -> Result<BatchReport, CoreError> {
        validate_hp(hp)?;
        let report = patch::set_all(&mut self.payload, &mut self.buildings, hp);
        self.record_batch("set all", &report);
        Ok(report)
    }

    /// Raises every building below `threshold` to `new_hp`, or to the
    /// current maximum when no value is given.
    pub fn repair_buildings(
        &mut self,
        threshold: f32,
        new_hp: Option<f32>,
    ) -> Result<BatchReport, CoreError> {
        validate_hp(threshold)?;
        let new_hp = match new_hp {
            Some(hp) => hp,
            None => patch::max_hp(&self.buildings.entries).unwrap_or(patch::DEFAULT_MAX_HP),
        };
        validate_hp(new_hp)?;

        let report =
            patch::repair_below_threshold(&mut self.payload, &mut self.buildings, threshold, new_hp);
        self.record_batch("repair", &report);
        Ok(report)
    }

    pub fn heal_all_buildings(&mut self) -> HealOutcome {
        let target_hp = patch::heal_target(&self.buildings.entries);
        let report = patch::set_all(&mut self.payload, &mut self.buildings, target_hp);
        self.record_batch("heal all", &report);
        HealOutcome { target_hp, report }
    }

    /// Replaces this save's player blobs with same-type player blobs from
    /// `source`. Building entries are rescanned afterwards since blob
    /// offsets may have moved.
    pub fn substitute_player_blobs(&mut self, source: &Session) -> SubstitutionReport {
        let (payload, report) = substitute::substitute_player_blobs(
            &self.payload,
            self.header.payload_offset,
            &source.payload,
            source.header.payload_offset,
            &self.classification,
        );

        if report.substituted > 0 {
            self.payload = payload;
            self.buildings =
                scan_buildings(&self.payload, self.header.payload_offset, &self.locator);
            self.modified = true;
        }
        report
    }

    /// Standalone client payload holding this save's player blobs.
    pub fn extract_player_blobs(&self) -> Result<Vec<u8>, CoreError> {
        let segmentation = self.segmentation();
        substitute::extract_player_blobs(&self.payload, &segmentation, &self.classification)
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorCode::UnsupportedOperation,
                    "save contains no player blobs to extract",
                )
            })
    }

    pub fn to_bytes_unmodified(&self) -> Vec<u8> {
        self.original.clone()
    }

    /// Re-wraps the current payload the way the input was wrapped.
    pub fn to_bytes_modified(&self) -> Vec<u8> {
        match &self.envelope {
            Some(envelope) => envelope.clone().with_payload(self.payload.clone()).encode(),
            None => self.payload.clone(),
        }
    }

    /// The input bytes with every nested base64 layer expanded.
    pub fn fully_decoded(&self) -> Vec<u8> {
        self.decoder.decode(&self.original)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn record_batch(&mut self, operation: &'static str, report: &BatchReport) {
        if report.modified > 0 {
            self.modified = true;
        }
        tracing::info!(
            operation,
            modified = report.modified,
            skipped = report.skipped,
            unchanged = report.unchanged,
            "building hp batch applied"
        );
    }
}

fn parse_resume(bytes: &[u8]) -> crate::Result<LoadedSave> {
    let envelope = envelope::decode_envelope(bytes)?;
    let header = parse_header(&envelope.inner_payload)?;
    Ok(LoadedSave {
        payload: envelope.inner_payload.clone(),
        envelope: Some(envelope),
        header,
    })
}

fn parse_client(bytes: &[u8]) -> crate::Result<LoadedSave> {
    let header = parse_header(bytes)?;
    Ok(LoadedSave {
        envelope: None,
        payload: bytes.to_vec(),
        header,
    })
}

fn scan_buildings(payload: &[u8], start: usize, locator: &HpFieldLocator) -> BuildingScan {
    let segmentation = segment_blobs(payload, start);
    patch::scan_building_health(payload, &segmentation.blobs, locator)
}

fn validate_hp(hp: f32) -> Result<(), CoreError> {
    if hp.is_finite() && hp >= 0.0 {
        Ok(())
    } else {
        Err(CoreError::new(
            CoreErrorCode::InvalidInput,
            format!("hit points must be a finite non-negative number, got {hp}"),
        ))
    }
}
