//! Transport codec
//!
//! Every push-data frame (keepalive probes included) arrives gzip compressed.
//! Frames are decoded to text before anything inspects them.

use crate::error::{BingxError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Liveness probe sent by the server
pub const PING: &str = "Ping";

/// Reply expected on the same connection
pub const PONG: &str = "Pong";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decompresses a gzip frame into UTF-8 text
pub fn decode_gzip(data: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(data);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| BingxError::Decode(format!("invalid gzip frame: {}", e)))?;
    Ok(text)
}

/// Compresses text into a gzip frame
pub fn encode_gzip(text: &str) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .and_then(|_| encoder.finish())
        .map_err(|e| BingxError::Internal(format!("gzip encoding failed: {}", e)))
}

pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

pub fn is_ping(text: &str) -> bool {
    text == PING
}
