//! Binary framing shared by split encodings.
//!
//! Text is written as a big-endian `u32` byte length followed by UTF-8 bytes.

use crate::error::{DecodeError, EncodeError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Write a length-prefixed UTF-8 string.
pub fn put_text(out: &mut BytesMut, text: &str) -> Result<()> {
    let len = frame_len(text.len())?;
    out.reserve(4 + text.len());
    out.put_u32(len);
    out.put_slice(text.as_bytes());
    Ok(())
}

/// The `u32` length prefix of a payload of `len` bytes.
pub fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| EncodeError::TooLong { len }.into())
}

/// Read a length-prefixed UTF-8 string.
pub fn get_text(input: &mut Bytes) -> Result<String> {
    let len = get_u32(input)? as usize;
    ensure_remaining(input, len)?;
    let raw = input.split_to(len);
    let text = std::str::from_utf8(&raw).map_err(DecodeError::from)?;
    Ok(text.to_string())
}

/// Read a big-endian `u32`.
pub fn get_u32(input: &mut Bytes) -> Result<u32> {
    ensure_remaining(input, 4)?;
    Ok(input.get_u32())
}

fn ensure_remaining(input: &Bytes, needed: usize) -> Result<()> {
    if input.remaining() < needed {
        return Err(DecodeError::Truncated {
            needed,
            remaining: input.remaining(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WeftError;

    #[test]
    fn test_text_frame() {
        let mut out = BytesMut::new();
        put_text(&mut out, "héllo").unwrap();
        assert_eq!(&out[..4], &[0, 0, 0, 6]);

        let mut input = out.freeze();
        assert_eq!(get_text(&mut input).unwrap(), "héllo");
        assert!(input.is_empty());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_payload_is_an_encode_error() {
        let len = u32::MAX as usize + 1;
        let err = frame_len(len).unwrap_err();
        assert!(matches!(err, WeftError::Encode(EncodeError::TooLong { len: l }) if l == len));
        assert_eq!(
            err.to_string(),
            "encode error: payload of 4294967296 bytes exceeds the u32 length prefix"
        );
        assert_eq!(frame_len(6).unwrap(), 6);
    }

    #[test]
    fn test_truncated_payload() {
        let mut out = BytesMut::new();
        out.put_u32(10);
        out.put_slice(b"abc");
        let err = get_text(&mut out.freeze()).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Decode(DecodeError::Truncated {
                needed: 10,
                remaining: 3
            })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut out = BytesMut::new();
        out.put_u32(2);
        out.put_slice(&[0xff, 0xfe]);
        let err = get_text(&mut out.freeze()).unwrap_err();
        assert!(matches!(err, WeftError::Decode(DecodeError::Utf8(_))));
    }
}
