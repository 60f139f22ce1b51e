//! 7-bit variable-length integers and the length-prefixed UTF-8 strings
//! built on top of them (the .NET `BinaryWriter` encoding).

use crate::error::{Error, Result};

/// A u64 needs at most ten 7-bit groups.
const MAX_VARINT_BYTES: usize = 10;

/// Reads a varint starting at `pos`, returning the value and the position
/// just past its last byte.
pub fn read_varint(buffer: &[u8], pos: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut cursor = pos;

    for group in 0..MAX_VARINT_BYTES {
        let Some(&byte) = buffer.get(cursor) else {
            return Err(Error::TruncatedInput {
                offset: cursor,
                needed: 1,
                available: 0,
                context: "varint",
            });
        };
        cursor += 1;

        let bits = u64::from(byte & 0x7F);
        let shift = group * 7;
        if shift == 63 && bits > 1 {
            return Err(overflow(pos));
        }
        value |= bits << shift;

        if byte & 0x80 == 0 {
            return Ok((value, cursor));
        }
    }

    Err(overflow(pos))
}

/// Encodes a non-negative integer as a varint.
pub fn write_varint(value: i64) -> Result<Vec<u8>> {
    if value < 0 {
        return Err(Error::InvalidArgument {
            context: "varint",
            message: format!("cannot encode negative value {value}"),
        });
    }

    let mut remaining = value as u64;
    let mut out = Vec::with_capacity(MAX_VARINT_BYTES);
    while remaining >= 0x80 {
        out.push((remaining as u8 & 0x7F) | 0x80);
        remaining >>= 7;
    }
    out.push(remaining as u8);
    Ok(out)
}

pub fn read_length_prefixed_string(buffer: &[u8], pos: usize) -> Result<(String, usize)> {
    let (len, start) = read_varint(buffer, pos)?;
    if len == 0 {
        return Ok((String::new(), start));
    }

    let available = buffer.len().saturating_sub(start);
    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len <= available)
        .ok_or(Error::TruncatedInput {
            offset: start,
            needed: usize::try_from(len).unwrap_or(usize::MAX),
            available,
            context: "length-prefixed string",
        })?;

    let end = start + len;
    let text = std::str::from_utf8(&buffer[start..end]).map_err(|e| Error::Malformed {
        offset: start,
        context: "length-prefixed string",
        message: e.to_string(),
    })?;
    Ok((text.to_string(), end))
}

pub fn write_length_prefixed_string(value: &str) -> Result<Vec<u8>> {
    let len = i64::try_from(value.len()).map_err(|_| Error::InvalidArgument {
        context: "length-prefixed string",
        message: format!("string of {} bytes is too long", value.len()),
    })?;
    let mut out = write_varint(len)?;
    out.extend_from_slice(value.as_bytes());
    Ok(out)
}

fn overflow(offset: usize) -> Error {
    Error::Malformed {
        offset,
        context: "varint",
        message: "value does not fit in 64 bits".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_values_encode_as_themselves() {
        assert_eq!(write_varint(0).expect("zero"), vec![0x00]);
        assert_eq!(write_varint(6).expect("six"), vec![0x06]);
        assert_eq!(write_varint(0x7F).expect("max single"), vec![0x7F]);
    }

    #[test]
    fn multi_byte_values_set_continuation_bits() {
        assert_eq!(write_varint(0x80).expect("128"), vec![0x80, 0x01]);
        assert_eq!(write_varint(300).expect("300"), vec![0xAC, 0x02]);
        assert_eq!(
            write_varint(u32::MAX as i64).expect("u32 max"),
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]
        );
    }

    #[test]
    fn varint_round_trips_across_group_boundaries() {
        for value in [
            0u32,
            1,
            127,
            128,
            16_383,
            16_384,
            2_097_151,
            2_097_152,
            268_435_455,
            268_435_456,
            u32::MAX,
        ] {
            let encoded = write_varint(i64::from(value)).expect("encode");
            let (decoded, next) = read_varint(&encoded, 0).expect("decode");
            assert_eq!(decoded, u64::from(value));
            assert_eq!(next, encoded.len());
        }
    }

    #[test]
    fn read_varint_honours_start_position() {
        let bytes = [0xAA, 0xBB, 0xAC, 0x02, 0xCC];
        assert_eq!(read_varint(&bytes, 2).expect("decode"), (300, 4));
    }

    #[test]
    fn negative_values_are_rejected() {
        let err = write_varint(-1).expect_err("negative should fail");
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn unterminated_varint_is_truncated_input() {
        let err = read_varint(&[0x80, 0x80], 0).expect_err("should be truncated");
        assert_eq!(
            err,
            Error::TruncatedInput {
                offset: 2,
                needed: 1,
                available: 0,
                context: "varint",
            }
        );

        let err = read_varint(&[0x01], 1).expect_err("past end");
        assert!(matches!(err, Error::TruncatedInput { offset: 1, .. }));
    }

    #[test]
    fn overlong_varint_is_malformed() {
        let bytes = [0xFF; 11];
        let err = read_varint(&bytes, 0).expect_err("should overflow");
        assert!(matches!(err, Error::Malformed { offset: 0, .. }));
    }

    #[test]
    fn empty_string_consumes_only_its_length_byte() {
        let (text, next) = read_length_prefixed_string(&[0x00, 0x41], 0).expect("decode");
        assert_eq!(text, "");
        assert_eq!(next, 1);
    }

    #[test]
    fn strings_round_trip() {
        let encoded = write_length_prefixed_string("SerV10").expect("encode");
        assert_eq!(encoded[0], 0x06);
        assert_eq!(&encoded[1..], b"SerV10");

        let (text, next) = read_length_prefixed_string(&encoded, 0).expect("decode");
        assert_eq!(text, "SerV10");
        assert_eq!(next, encoded.len());
    }

    #[test]
    fn string_longer_than_buffer_is_truncated_input() {
        let err = read_length_prefixed_string(&[0x05, b'a', b'b'], 0).expect_err("short");
        assert_eq!(
            err,
            Error::TruncatedInput {
                offset: 1,
                needed: 5,
                available: 2,
                context: "length-prefixed string",
            }
        );
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = read_length_prefixed_string(&[0x02, 0xC3, 0x28], 0).expect_err("bad utf8");
        assert!(matches!(err, Error::Malformed { offset: 1, .. }));
    }
}
