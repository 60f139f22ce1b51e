//! Best-effort segmentation of the object region into serialized blobs.
//!
//! Blobs carry no length field. Each one starts with its own `SerV10`
//! mini-header, so the 7-byte sequence `0x06 "SerV10"` is used as the
//! boundary marker. The format has no escaping: a blob whose opaque
//! interior happens to contain those bytes is split in two. That is a
//! known imprecision of the format and is deliberately left as-is; the
//! split halves still cover every byte, so nothing is lost on re-encode.

use crate::header::{SERIALIZER_VERSION, read_preamble};
use crate::layout::{ByteRange, PayloadLayout, RegionId, RegionLayout};
use crate::reader::LittleEndianReader;
use crate::scan;

/// `0x06` is the length prefix of the literal `SerV10`.
pub const BLOB_MARKER: &[u8] = b"\x06SerV10";
pub const PARSE_ERROR_TYPE: &str = "ParseError";
pub const UNKNOWN_TYPE: &str = "Unknown";

const _: () = assert!(BLOB_MARKER.len() == SERIALIZER_VERSION.len() + 1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob<'a> {
    pub start_offset: usize,
    pub end_offset: usize,
    pub declared_types: Vec<String>,
    pub raw_bytes: &'a [u8],
}

impl Blob<'_> {
    pub fn primary_type(&self) -> &str {
        self.declared_types
            .first()
            .map_or(UNKNOWN_TYPE, String::as_str)
    }

    /// Last dot-separated component of the primary type.
    pub fn short_type(&self) -> &str {
        short_type_name(self.primary_type())
    }

    pub fn is_parse_error(&self) -> bool {
        self.declared_types.len() == 1 && self.declared_types[0] == PARSE_ERROR_TYPE
    }

    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.start_offset,
            end: self.end_offset,
        }
    }

    pub fn len(&self) -> usize {
        self.raw_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_bytes.is_empty()
    }
}

pub fn short_type_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

/// Result of segmenting `[start_offset, len)`: the bytes before the first
/// marker, then the blobs. Together they cover the range exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation<'a> {
    pub prefix: ByteRange,
    pub blobs: Vec<Blob<'a>>,
}

impl Segmentation<'_> {
    /// Full layout of the payload. Everything before the prefix is treated
    /// as the outer header.
    pub fn layout(&self, payload_len: usize) -> PayloadLayout {
        let mut regions = Vec::with_capacity(self.blobs.len() + 2);
        regions.push(RegionLayout {
            id: RegionId::Header,
            range: ByteRange {
                start: 0,
                end: self.prefix.start,
            },
        });
        regions.push(RegionLayout {
            id: RegionId::Prefix,
            range: self.prefix,
        });
        for (index, blob) in self.blobs.iter().enumerate() {
            regions.push(RegionLayout {
                id: RegionId::Blob(index),
                range: blob.range(),
            });
        }
        PayloadLayout {
            payload_len,
            regions,
        }
    }
}

pub fn segment_blobs(payload: &[u8], start_offset: usize) -> Segmentation<'_> {
    let start_offset = start_offset.min(payload.len());
    let positions = scan::find_all(payload, BLOB_MARKER, start_offset);
    tracing::trace!(start_offset, markers = positions.len(), "segmenting payload");

    let prefix = ByteRange {
        start: start_offset,
        end: positions.first().copied().unwrap_or(payload.len()),
    };

    let blobs = positions
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = positions.get(i + 1).copied().unwrap_or(payload.len());
            let raw_bytes = &payload[start..end];
            Blob {
                start_offset: start,
                end_offset: end,
                declared_types: declared_types(raw_bytes, start),
                raw_bytes,
            }
        })
        .collect();

    Segmentation { prefix, blobs }
}

fn declared_types(raw_bytes: &[u8], start_offset: usize) -> Vec<String> {
    let mut r = LittleEndianReader::new(raw_bytes);
    match read_preamble(&mut r) {
        Ok(preamble) => preamble.types,
        Err(e) => {
            tracing::debug!(start_offset, error = %e, "blob mini-header did not parse");
            vec![PARSE_ERROR_TYPE.to_string()]
        }
    }
}
