use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reader::LittleEndianReader;

/// The only serializer version this codec understands.
pub const SERIALIZER_VERSION: &str = "SerV10";

/// Outer header of a decoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub version: String,
    pub registered_types: Vec<String>,
    pub registered_properties: Vec<String>,
    /// Offset of the first byte after the header, where the object region
    /// begins.
    pub payload_offset: usize,
}

/// Version string plus registered type table. Both the outer header and
/// every blob's mini-header start with this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preamble {
    pub version: String,
    pub types: Vec<String>,
}

pub fn parse_header(payload: &[u8]) -> Result<HeaderInfo> {
    let mut r = LittleEndianReader::new(payload);
    let preamble = read_preamble(&mut r)?;
    let registered_properties = r.read_string_table("property table")?;

    Ok(HeaderInfo {
        version: preamble.version,
        registered_types: preamble.types,
        registered_properties,
        payload_offset: r.position(),
    })
}

pub fn read_preamble(r: &mut LittleEndianReader<'_>) -> Result<Preamble> {
    let version_offset = r.position();
    let version = r.read_string()?;
    if version != SERIALIZER_VERSION {
        return Err(Error::UnsupportedVersion {
            offset: version_offset,
            found: version,
            expected: SERIALIZER_VERSION,
        });
    }

    let separator = r.read_u8("version separator")?;
    if separator != 0 {
        tracing::trace!(
            offset = r.position() - 1,
            separator,
            "non-zero byte after version string"
        );
    }

    let types = r.read_string_table("type table")?;
    Ok(Preamble { version, types })
}
