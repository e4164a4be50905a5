//! Wire framing: a 10-byte ASCII decimal length, left-justified and
//! space-padded, followed by exactly that many payload bytes.
//!
//! ```text
//! "42        {"type":"OK","payload":null, ...}"
//!  └─ 10 ──┘ └──────────── 42 bytes ─────────┘
//! ```

use crate::TransportError;

/// Size of the length header.
pub const HEADER_LEN: usize = 10;

/// Largest length the header can express.
pub const MAX_HEADER_VALUE: usize = 9_999_999_999;

/// Frame size limit applied by connections unless overridden.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encodes `len` as a header.
pub fn encode_header(len: usize) -> Result<[u8; HEADER_LEN], TransportError> {
    if len > MAX_HEADER_VALUE {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_HEADER_VALUE,
        });
    }
    let text = format!("{len:<width$}", width = HEADER_LEN);
    let mut header = [b' '; HEADER_LEN];
    header.copy_from_slice(text.as_bytes());
    Ok(header)
}

/// Parses a header back into a payload length.
///
/// Surrounding spaces are ignored; anything else that isn't a decimal
/// digit is rejected.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<usize, TransportError> {
    let invalid = || TransportError::InvalidHeader(String::from_utf8_lossy(header).into_owned());

    let text = std::str::from_utf8(header).map_err(|_| invalid())?.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    text.parse().map_err(|_| invalid())
}

/// Builds a complete frame (header + payload).
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let header = encode_header(payload.len())?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header_round_trips_lengths() {
        for len in [1usize, 9, 10, 999_999_999] {
            let header = encode_header(len).unwrap();
            assert_eq!(header.len(), HEADER_LEN);
            assert_eq!(decode_header(&header).unwrap(), len);
        }
    }

    #[test]
    fn test_encode_header_left_justified() {
        assert_eq!(&encode_header(42).unwrap(), b"42        ");
        assert_eq!(&encode_header(999_999_999).unwrap(), b"999999999 ");
    }

    #[test]
    fn test_encode_header_rejects_oversized_length() {
        assert!(matches!(
            encode_header(MAX_HEADER_VALUE + 1),
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_header_accepts_right_padding_and_leading_space() {
        assert_eq!(decode_header(b"  17      ").unwrap(), 17);
    }

    #[test]
    fn test_decode_header_rejects_non_numeric() {
        for bad in [b"HTTP/1.1 2", b"          ", b"12 34     ", b"-5        "] {
            let err = decode_header(bad).unwrap_err();
            assert!(err.is_protocol_mismatch(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_encode_frame_prefixes_payload() {
        let frame = encode_frame(br#"{"a":1}"#).unwrap();
        assert_eq!(&frame[..HEADER_LEN], b"7         ");
        assert_eq!(&frame[HEADER_LEN..], br#"{"a":1}"#);
    }
}
