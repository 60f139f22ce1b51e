//! The `__RESUME__` envelope: an optional outer base64 layer around
//! `header_prefix "NOCOMPRESSION" base64(inner_payload)`.
//!
//! The game nests base64 at unpredictable depth and records no depth field,
//! so "every byte is a base64 text character" is the only recursion guard
//! available. Whole-span layers are bounded by [`NestedDecoder::max_depth`].

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{Error, Result};
use crate::scan;

pub const MARKER: &[u8] = b"NOCOMPRESSION";
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Standard alphabet, padded on encode, lenient on decode the way the
/// game's own reader is.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEnvelope {
    pub is_outer_base64: bool,
    /// Everything up to and including the marker.
    pub header_prefix: Vec<u8>,
    pub inner_payload: Vec<u8>,
    /// Bytes after the inner base64 run, kept verbatim.
    pub trailer: Vec<u8>,
}

impl RawEnvelope {
    pub fn encode(&self) -> Vec<u8> {
        encode_envelope(self)
    }

    /// Same wrapping around a different payload.
    pub fn with_payload(self, inner_payload: Vec<u8>) -> Self {
        Self {
            inner_payload,
            ..self
        }
    }
}

/// Recursive decoder for nested base64/marker layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedDecoder {
    pub max_depth: usize,
}

impl Default for NestedDecoder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl NestedDecoder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn decode(&self, bytes: &[u8]) -> Vec<u8> {
        self.decode_at(bytes, 0)
    }

    /// Never fails: a span that does not decode is passed through as-is so
    /// one corrupt region does not hide the rest of the file.
    ///
    /// The depth bound caps only whole-span base64 layers. Marker runs are
    /// always expanded since each one is strictly shorter than its input.
    pub fn decode_at(&self, bytes: &[u8], depth: usize) -> Vec<u8> {
        if depth < self.max_depth && is_pure_base64(bytes) {
            match decode_base64_text(bytes) {
                Ok(decoded) => return self.decode_at(&decoded, depth + 1),
                Err(e) => {
                    tracing::debug!(depth, error = %e, "pure base64 layer failed to decode");
                }
            }
        }

        let mut out = Vec::with_capacity(bytes.len());
        let mut pos = 0;
        while let Some(idx) = scan::find(bytes, MARKER, pos) {
            out.extend_from_slice(&bytes[pos..idx]);

            let run_start = idx + MARKER.len();
            let run_end = base64_run_end(bytes, run_start);
            if run_end == run_start {
                out.extend_from_slice(MARKER);
            } else {
                match BASE64.decode(&bytes[run_start..run_end]) {
                    Ok(decoded) => out.extend(self.decode_at(&decoded, depth + 1)),
                    Err(e) => {
                        tracing::debug!(
                            offset = run_start,
                            depth,
                            error = %e,
                            "marker run is not valid base64, passing through"
                        );
                        out.extend_from_slice(&bytes[idx..run_end]);
                    }
                }
            }
            pos = run_end;
        }
        out.extend_from_slice(&bytes[pos..]);
        out
    }
}

/// True iff every byte is a base64 alphabet character, `=` padding, or an
/// ASCII line break.
pub fn is_pure_base64(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|&b| is_base64_char(b) || b == b'\n' || b == b'\r')
}

/// Recursive decode with the default depth bound.
pub fn decode_recursive(bytes: &[u8], depth: usize) -> Vec<u8> {
    NestedDecoder::default().decode_at(bytes, depth)
}

pub fn decode_envelope(file_bytes: &[u8]) -> Result<RawEnvelope> {
    let (is_outer_base64, decoded) = unwrap_outer_layer(file_bytes);

    let marker_at = scan::find(&decoded, MARKER, 0).ok_or(Error::MissingMarker {
        scanned: decoded.len(),
    })?;
    let run_start = marker_at + MARKER.len();
    let run_end = base64_run_end(&decoded, run_start);

    let inner_payload = BASE64
        .decode(&decoded[run_start..run_end])
        .map_err(|source| Error::Base64 {
            offset: run_start,
            source,
        })?;

    tracing::debug!(
        is_outer_base64,
        marker_at,
        inner_len = inner_payload.len(),
        trailer_len = decoded.len() - run_end,
        "decoded envelope"
    );

    Ok(RawEnvelope {
        is_outer_base64,
        header_prefix: decoded[..run_start].to_vec(),
        inner_payload,
        trailer: decoded[run_end..].to_vec(),
    })
}

pub fn encode_envelope(envelope: &RawEnvelope) -> Vec<u8> {
    let mut body = envelope.header_prefix.clone();
    body.extend_from_slice(BASE64.encode(&envelope.inner_payload).as_bytes());
    body.extend_from_slice(&envelope.trailer);

    if envelope.is_outer_base64 {
        BASE64.encode(&body).into_bytes()
    } else {
        body
    }
}

/// Standard padded base64, as the game writes it.
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// A plain envelope such as `HDR` + marker + base64 text is itself made of
/// base64 characters, so the outer layer only counts when decoding it
/// actually exposes the marker.
fn unwrap_outer_layer(file_bytes: &[u8]) -> (bool, Vec<u8>) {
    if is_pure_base64(file_bytes) {
        match decode_base64_text(file_bytes) {
            Ok(decoded) if scan::find(&decoded, MARKER, 0).is_some() => return (true, decoded),
            Ok(_) => tracing::debug!("outer base64 layer has no marker, reading file as-is"),
            Err(e) => tracing::debug!(error = %e, "outer base64 layer does not decode"),
        }
    }
    (false, file_bytes.to_vec())
}

fn is_base64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

fn base64_run_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| !is_base64_char(b))
        .map_or(bytes.len(), |len| start + len)
}

fn decode_base64_text(bytes: &[u8]) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|&b| b != b'\n' && b != b'\r')
        .collect();
    BASE64.decode(compact)
}
