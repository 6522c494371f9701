//! eISCP packet framing
//!
//! Every ISCP message travels inside a 16 byte header:
//!
//! ```text
//! "ISCP" | header size (u32 BE) | data size (u32 BE) | version | 3 reserved
//! ```
//!
//! followed by `!1<message>\r`. Receivers terminate their own messages
//! with `\x1A` and usually `\r\n` as well.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{LinkError, Result};

const MAGIC: &[u8; 4] = b"ISCP";
const VERSION: u8 = 0x01;
const UNIT_TYPE: &[u8; 2] = b"!1";

/// Size of the fixed eISCP header
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single packet's data section
const MAX_DATA_SIZE: usize = 64 * 1024;

/// Wrap an ISCP message in an eISCP packet
pub fn encode_packet(message: &str) -> Bytes {
    let data_size = UNIT_TYPE.len() + message.len() + 1;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + data_size);
    buf.put_slice(MAGIC);
    buf.put_u32(HEADER_SIZE as u32);
    buf.put_u32(data_size as u32);
    buf.put_u8(VERSION);
    buf.put_slice(&[0, 0, 0]);
    buf.put_slice(UNIT_TYPE);
    buf.put_slice(message.as_bytes());
    buf.put_u8(b'\r');
    buf.freeze()
}

/// Incremental decoder for a stream of eISCP packets
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buffer: BytesMut,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the socket
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete message, if one is buffered
    ///
    /// A corrupt header discards everything buffered so far; the stream
    /// resynchronises on the next packet the receiver sends.
    pub fn next_message(&mut self) -> Result<Option<String>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        if &self.buffer[..4] != MAGIC {
            self.buffer.clear();
            return Err(LinkError::Frame("missing ISCP magic".to_string()));
        }

        let mut sizes = &self.buffer[4..12];
        let header_size = sizes.get_u32() as usize;
        let data_size = sizes.get_u32() as usize;

        if header_size < HEADER_SIZE || data_size > MAX_DATA_SIZE {
            self.buffer.clear();
            return Err(LinkError::Frame(format!(
                "invalid sizes: header {} data {}",
                header_size, data_size
            )));
        }

        if self.buffer.len() < header_size + data_size {
            return Ok(None);
        }

        self.buffer.advance(header_size);
        let data = self.buffer.split_to(data_size);

        let text = String::from_utf8_lossy(&data);
        let text = text.trim_end_matches(['\x1A', '\r', '\n']);
        let message = match text.strip_prefix('!') {
            // Skip the unit type character following '!'
            Some(rest) => rest.get(1..).unwrap_or_default(),
            None => text,
        };

        Ok(Some(message.to_string()))
    }
}
