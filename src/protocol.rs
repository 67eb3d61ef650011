use crate::error::Result;
use crate::message::{Codec, QUERY_MARKER};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Line terminator used in both directions
pub const DELIMITER: u8 = b'\r';

/// Longest line the receiver is documented to handle
pub const MAX_LINE_LENGTH: usize = 135;

/// Inbound bytes without a delimiter are discarded past this size
const MAX_BUFFERED: usize = 4096;

/// Whether a line expects a reply from the receiver
pub fn is_query(line: &str) -> bool {
    line.contains(QUERY_MARKER)
}

/// `\r` delimited line codec
///
/// Decoded lines are raw bytes; character decoding is left to
/// [`Codec::parse_bytes`] since it depends on the active mode.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Position up to which the buffer is known to hold no delimiter
    scanned: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Bytes>, io::Error> {
        loop {
            let Some(offset) = src[self.scanned..].iter().position(|b| *b == DELIMITER) else {
                if src.len() > MAX_BUFFERED {
                    tracing::error!("Discarding {} bytes received without a line delimiter", src.len());
                    src.clear();
                    self.scanned = 0;
                } else {
                    self.scanned = src.len();
                }
                return Ok(None);
            };

            let end = self.scanned + offset;
            self.scanned = 0;
            let line = src.split_to(end).freeze();
            src.advance(1);

            // Empty lines carry nothing; keep looking
            if line.is_empty() {
                continue;
            }
            if line.len() > MAX_LINE_LENGTH {
                tracing::warn!("Received line of {} bytes exceeds {}", line.len(), MAX_LINE_LENGTH);
            }
            return Ok(Some(line));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> std::result::Result<(), io::Error> {
        if line.len() > MAX_LINE_LENGTH {
            tracing::warn!("Sending line of {} bytes exceeds {}: {}", line.len(), MAX_LINE_LENGTH, line);
        }
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(DELIMITER);
        Ok(())
    }
}

/// An intent to send to the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Request {
    PowerStatus,
    SetPower(bool),
    VolumeStatus,
    /// A master volume display label such as `"-18.0dB"`
    SetVolume(String),
    VolumeUp,
    VolumeDown,
    MuteStatus,
    SetMute(bool),
    SourceStatus,
    /// An input source code such as `"GAME"`
    SetSource(String),
    /// A line sent verbatim
    Raw(String),
}

impl Request {
    /// Resolve to the wire line, checking tokens against the grammar
    pub fn to_line(&self, codec: &Codec) -> Result<String> {
        match self {
            Request::PowerStatus => codec.format_request("PW", None, None),
            Request::SetPower(on) => {
                codec.format_request("PW", None, Some(if *on { "ON" } else { "STANDBY" }))
            }
            Request::VolumeStatus => codec.format_request("MV", None, None),
            Request::SetVolume(label) => codec.volume_request(label),
            Request::VolumeUp => codec.format_request("MV", None, Some("UP")),
            Request::VolumeDown => codec.format_request("MV", None, Some("DOWN")),
            Request::MuteStatus => codec.format_request("MU", None, None),
            Request::SetMute(on) => {
                codec.format_request("MU", None, Some(if *on { "ON" } else { "OFF" }))
            }
            Request::SourceStatus => codec.format_request("SI", None, None),
            Request::SetSource(code) => codec.format_request("SI", None, Some(code)),
            Request::Raw(line) => Ok(line.clone()),
        }
    }

    /// Queries sent right after a connection is established
    pub fn startup_burst() -> [Request; 4] {
        [
            Request::PowerStatus,
            Request::VolumeStatus,
            Request::MuteStatus,
            Request::SourceStatus,
        ]
    }
}
