//! Frame header parsing and frame serialization (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                  Masking key (if MASK set)                    |
//! +---------------------------------------------------------------+
//! |                         Payload data                          |
//! +---------------------------------------------------------------+
//! ```
//!
//! Only headers are parsed here. Payloads are streamed by the reader so a
//! frame larger than one receive never has to be buffered whole.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseReason};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Longest close reason text that fits a control frame after the status code.
pub const MAX_CLOSE_REASON_LEN: usize = MAX_CONTROL_FRAME_PAYLOAD - 2;

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Any of RSV1-3 set.
    pub rsv: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, if the MASK bit is set.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub payload_len: u64,
}

impl FrameHeader {
    /// Parse a header from the start of `buf`.
    ///
    /// Returns the header and the number of header bytes, or `None` if `buf`
    /// does not yet hold the whole header.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedOpcode` for reserved opcodes.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let byte0 = buf[0];
        let byte1 = buf[1];
        let fin = byte0 & 0x80 != 0;
        let rsv = byte0 & 0x70 != 0;
        let opcode = OpCode::from_u8(byte0)?;
        let masked = byte1 & 0x80 != 0;

        let (payload_len, len_size) = match byte1 & 0x7F {
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 2)
            }
            127 => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len), 8)
            }
            short => (u64::from(short), 0),
        };

        let mask_offset = 2 + len_size;
        let header_len = if masked { mask_offset + 4 } else { mask_offset };
        if buf.len() < header_len {
            return Ok(None);
        }

        let mask = masked.then(|| {
            [
                buf[mask_offset],
                buf[mask_offset + 1],
                buf[mask_offset + 2],
                buf[mask_offset + 3],
            ]
        });

        Ok(Some((
            Self {
                fin,
                rsv,
                opcode,
                mask,
                payload_len,
            },
            header_len,
        )))
    }

    /// Check rules that hold regardless of negotiated limits.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` if reserved bits are set
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv {
            return Err(Error::ProtocolViolation(
                "reserved bits set without negotiated extension".into(),
            ));
        }
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(self.payload_len as usize));
            }
        }
        Ok(())
    }
}

/// Append one serialized frame to `dst`.
///
/// The payload is masked in `dst` when `mask` is given.
pub fn encode_frame(
    dst: &mut BytesMut,
    fin: bool,
    opcode: OpCode,
    payload: &[u8],
    mask: Option<[u8; 4]>,
) {
    let len = payload.len();
    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    dst.reserve(14 + len);

    let fin_bit = if fin { 0x80 } else { 0x00 };
    dst.put_u8(fin_bit | opcode.as_u8());
    if len <= 125 {
        dst.put_u8(mask_bit | len as u8);
    } else if let Ok(short) = u16::try_from(len) {
        dst.put_u8(mask_bit | 126);
        dst.put_u16(short);
    } else {
        dst.put_u8(mask_bit | 127);
        dst.put_u64(len as u64);
    }

    let start = match mask {
        Some(key) => {
            dst.put_slice(&key);
            dst.len()
        }
        None => dst.len(),
    };
    dst.put_slice(payload);
    if let Some(key) = mask {
        apply_mask(&mut dst[start..], key, 0);
    }
}

/// Build the payload of a close frame.
///
/// Codes that may not appear on the wire produce an empty payload. Reason
/// text is truncated on a character boundary to fit a control frame.
#[must_use]
pub fn close_payload(reason: &CloseReason) -> Vec<u8> {
    if !reason.code.is_sendable() {
        return Vec::new();
    }
    let mut end = reason.reason.len().min(MAX_CLOSE_REASON_LEN);
    while !reason.reason.is_char_boundary(end) {
        end -= 1;
    }
    let mut payload = Vec::with_capacity(2 + end);
    payload.extend_from_slice(&reason.code.as_u16().to_be_bytes());
    payload.extend_from_slice(&reason.reason.as_bytes()[..end]);
    payload
}

/// Decode a close frame payload.
///
/// An empty payload means the peer gave no status.
///
/// # Errors
///
/// - `Error::ProtocolViolation` for a one-byte payload
/// - `Error::InvalidUtf8` if the reason text is not UTF-8
pub fn parse_close_payload(payload: &[u8]) -> Result<Option<CloseReason>> {
    match payload {
        [] => Ok(None),
        [_] => Err(Error::ProtocolViolation("close payload of one byte".into())),
        [hi, lo, text @ ..] => {
            let code = CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]));
            let text = std::str::from_utf8(text)?;
            Ok(Some(CloseReason::new(code, text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unmasked_text_header() {
        let data = [0x81, 0x05, b'H', b'e', b'l', b'l', b'o'];
        let (header, len) = FrameHeader::parse(&data).unwrap().unwrap();
        assert_eq!(len, 2);
        assert!(header.fin);
        assert!(!header.rsv);
        assert_eq!(header.opcode, OpCode::Text);
        assert_eq!(header.mask, None);
        assert_eq!(header.payload_len, 5);
    }

    #[test]
    fn test_parse_masked_header() {
        let data = [0x01, 0x85, 0x37, 0xfa, 0x21, 0x3d];
        let (header, len) = FrameHeader::parse(&data).unwrap().unwrap();
        assert_eq!(len, 6);
        assert!(!header.fin);
        assert_eq!(header.mask, Some([0x37, 0xfa, 0x21, 0x3d]));
    }

    #[test]
    fn test_parse_incomplete_headers() {
        assert_eq!(FrameHeader::parse(&[0x81]).unwrap(), None);
        assert_eq!(FrameHeader::parse(&[0x81, 0x7E, 0x01]).unwrap(), None);
        assert_eq!(FrameHeader::parse(&[0x81, 0x7F, 0, 0, 0]).unwrap(), None);
        assert_eq!(FrameHeader::parse(&[0x81, 0x85, 0x37]).unwrap(), None);
    }

    #[test]
    fn test_parse_extended_lengths() {
        let (header, len) = FrameHeader::parse(&[0x82, 0x7E, 0x01, 0x00]).unwrap().unwrap();
        assert_eq!((header.payload_len, len), (256, 4));

        let data = [0x82, 0x7F, 0, 0, 0, 0, 0, 0x01, 0x00, 0x00];
        let (header, len) = FrameHeader::parse(&data).unwrap().unwrap();
        assert_eq!((header.payload_len, len), (65536, 10));
    }

    #[test]
    fn test_parse_reserved_opcode() {
        assert_eq!(
            FrameHeader::parse(&[0x83, 0x00]),
            Err(Error::ReservedOpcode(0x3))
        );
    }

    #[test]
    fn test_validate_control_rules() {
        let (ping, _) = FrameHeader::parse(&[0x09, 0x00]).unwrap().unwrap();
        assert_eq!(ping.validate(), Err(Error::FragmentedControlFrame));

        let (close, _) = FrameHeader::parse(&[0x88, 0x7E, 0x00, 0x7E]).unwrap().unwrap();
        assert_eq!(close.validate(), Err(Error::ControlFrameTooLarge(126)));

        let (rsv, _) = FrameHeader::parse(&[0xC1, 0x00]).unwrap().unwrap();
        assert!(matches!(rsv.validate(), Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_encode_unmasked() {
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, true, OpCode::Text, b"Hello", None);
        assert_eq!(&buf[..], &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_encode_non_final_continuation() {
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, false, OpCode::Continuation, b"ab", None);
        assert_eq!(&buf[..], &[0x00, 0x02, b'a', b'b']);
    }

    #[test]
    fn test_encode_masked_matches_rfc_example() {
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, true, OpCode::Text, b"Hello", Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(
            &buf[..],
            &[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
    }

    #[test]
    fn test_encode_extended_length_header() {
        let mut buf = BytesMut::new();
        encode_frame(&mut buf, true, OpCode::Binary, &[0u8; 300], None);
        let (header, len) = FrameHeader::parse(&buf).unwrap().unwrap();
        assert_eq!(len, 4);
        assert_eq!(header.payload_len, 300);
        assert_eq!(buf.len(), 304);
    }

    #[test]
    fn test_close_payload_roundtrip() {
        let reason = CloseReason::new(CloseCode::InternalServerError, "InternalServerError");
        let payload = close_payload(&reason);
        assert_eq!(&payload[..2], &1011u16.to_be_bytes());
        assert_eq!(parse_close_payload(&payload).unwrap(), Some(reason));
    }

    #[test]
    fn test_close_payload_unsendable_code_is_empty() {
        assert!(close_payload(&CloseReason::from_code(CloseCode::Empty)).is_empty());
        assert_eq!(parse_close_payload(&[]).unwrap(), None);
    }

    #[test]
    fn test_close_reason_truncated_on_char_boundary() {
        let reason = CloseReason::new(CloseCode::NormalClosure, "é".repeat(100));
        let payload = close_payload(&reason);
        assert!(payload.len() <= MAX_CONTROL_FRAME_PAYLOAD);
        assert!(std::str::from_utf8(&payload[2..]).is_ok());
    }

    #[test]
    fn test_parse_close_one_byte_rejected() {
        assert!(parse_close_payload(&[0x03]).is_err());
    }
}
