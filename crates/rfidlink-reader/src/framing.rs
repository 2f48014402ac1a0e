//! Line framing between the session and the reader's ASCII protocol.
//!
//! Readers of this family speak CRLF-terminated ASCII: the host sends one
//! command per line and the device answers with one or more lines. The
//! [`Framing`] trait keeps the exact frame layout out of the session so a
//! different vendor dialect can be dropped in.

use crate::error::{ReaderError, Result};
use crate::tag::TagId;
use bytes::BytesMut;
use std::fmt;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

/// Text rendered for a command that got no answer.
pub const NO_RESPONSE: &str = "NO_RESPONSE";

/// Encodes outgoing write frames and decodes incoming lines.
pub trait Framing: Send + Sync + 'static {
    /// Build the frame that writes `tag` to the tag in range.
    fn encode_write(&self, tag: &TagId) -> Vec<u8>;

    /// Extract the first non-empty line from a raw response.
    ///
    /// Returns `Ok(None)` when the response is empty or only whitespace.
    fn decode_line(&self, data: &[u8]) -> Result<Option<String>>;
}

/// CRLF line framing.
///
/// # Examples
///
/// ```
/// use rfidlink_reader::framing::{Framing, LineFraming};
/// use rfidlink_reader::TagId;
///
/// let framing = LineFraming;
/// let tag = TagId::new("abc123").unwrap();
/// assert_eq!(framing.encode_write(&tag), b"WRITE:ABC123\r\n");
///
/// let line = framing.decode_line(b"\r\nE2003412\r\nOK\r\n").unwrap();
/// assert_eq!(line.as_deref(), Some("E2003412"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFraming;

impl LineFraming {
    /// Prefix of the write command.
    pub const WRITE_PREFIX: &'static str = "WRITE:";

    /// Line terminator used on the wire.
    pub const TERMINATOR: &'static str = "\r\n";
}

impl Framing for LineFraming {
    fn encode_write(&self, tag: &TagId) -> Vec<u8> {
        format!("{}{}{}", Self::WRITE_PREFIX, tag, Self::TERMINATOR).into_bytes()
    }

    fn decode_line(&self, data: &[u8]) -> Result<Option<String>> {
        let mut codec = LinesCodec::new();
        let mut buffer = BytesMut::from(data);

        while let Some(line) = codec.decode(&mut buffer).map_err(codec_error)? {
            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }

        // Trailing text without a terminator still counts as a line.
        match codec.decode_eof(&mut buffer).map_err(codec_error)? {
            Some(line) if !line.trim().is_empty() => Ok(Some(line.trim().to_string())),
            _ => Ok(None),
        }
    }
}

fn codec_error(e: LinesCodecError) -> ReaderError {
    match e {
        LinesCodecError::Io(io) => ReaderError::invalid_response(io.to_string()),
        LinesCodecError::MaxLineLengthExceeded => {
            ReaderError::invalid_response("line length exceeded")
        }
    }
}

/// Reply to a free-form command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    /// Text the device sent back, with line endings as received.
    Reply(String),

    /// Nothing arrived within the read timeout.
    NoResponse,
}

impl CommandResponse {
    pub(crate) fn from_bytes(data: &[u8]) -> Self {
        if data.is_empty() {
            Self::NoResponse
        } else {
            Self::Reply(String::from_utf8_lossy(data).into_owned())
        }
    }

    /// The reply text, if any.
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Reply(text) => Some(text),
            Self::NoResponse => None,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Self::Reply(_))
    }
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(text) => write!(f, "{text}"),
            Self::NoResponse => write!(f, "{NO_RESPONSE}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_encode_write_frame() {
        let tag = TagId::new(" e2003412 ").unwrap();
        assert_eq!(LineFraming.encode_write(&tag), b"WRITE:E2003412\r\n".to_vec());
    }

    #[rstest]
    #[case(b"", None)]
    #[case(b"\r\n", None)]
    #[case(b"  \r\n \r\n", None)]
    #[case(b"ABC123", Some("ABC123"))]
    #[case(b"ABC123\r\n", Some("ABC123"))]
    #[case(b"ABC123\n", Some("ABC123"))]
    #[case(b"\r\n  abc123  \r\nOK\r\n", Some("abc123"))]
    #[case(b"FIRST\r\nSECOND\r\n", Some("FIRST"))]
    #[case(b"\r\nPARTIAL", Some("PARTIAL"))]
    fn test_decode_first_non_empty_line(#[case] data: &[u8], #[case] expected: Option<&str>) {
        let line = LineFraming.decode_line(data).unwrap();
        assert_eq!(line.as_deref(), expected);
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let result = LineFraming.decode_line(&[0xFF, 0xFE, b'\r', b'\n']);
        assert!(matches!(result, Err(ReaderError::InvalidResponse { .. })));
    }

    #[test]
    fn test_command_response_rendering() {
        assert_eq!(CommandResponse::NoResponse.to_string(), "NO_RESPONSE");
        assert_eq!(CommandResponse::from_bytes(b""), CommandResponse::NoResponse);

        let reply = CommandResponse::from_bytes(b"OK\r\n");
        assert!(reply.is_response());
        assert_eq!(reply.reply(), Some("OK\r\n"));
        assert_eq!(reply.to_string(), "OK\r\n");
    }
}
