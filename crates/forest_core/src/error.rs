/// Errors raised by the low-level codec, segmentation and patch routines.
///
/// Every aborting variant names the byte offset it happened at and the
/// operation that was being attempted, so a failure on a multi-megabyte
/// payload can be located without a debugger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The buffer ended in the middle of a field.
    #[error("truncated input while reading {context} at offset {offset}: need {needed} byte(s), {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
        context: &'static str,
    },

    /// A caller handed in a value the format cannot represent.
    #[error("invalid argument for {context}: {message}")]
    InvalidArgument {
        context: &'static str,
        message: String,
    },

    /// No `NOCOMPRESSION` marker after outer base64 normalization.
    #[error("NOCOMPRESSION marker not found while decoding envelope ({scanned} bytes scanned)")]
    MissingMarker { scanned: usize },

    /// The inner base64 run of the envelope could not be decoded.
    #[error("invalid base64 in envelope payload at offset {offset}: {source}")]
    Base64 {
        offset: usize,
        #[source]
        source: base64::DecodeError,
    },

    /// The header version string is not the one this codec understands.
    #[error("unsupported serializer version {found:?} at offset {offset}, expected {expected:?}")]
    UnsupportedVersion {
        offset: usize,
        found: String,
        expected: &'static str,
    },

    /// The bytes are present but do not form a valid value.
    #[error("malformed {context} at offset {offset}: {message}")]
    Malformed {
        offset: usize,
        context: &'static str,
        message: String,
    },

    /// A scalar patch target could not be located inside a blob.
    #[error("{field} not found in blob at offset {blob_offset}")]
    FieldNotFound {
        blob_offset: usize,
        field: &'static str,
    },

    /// A write would run past the end of the buffer.
    #[error("{context} out of bounds: offset {offset} + {width} exceeds buffer length {len}")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
        context: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
