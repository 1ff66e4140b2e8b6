//! # Common Utilities
//!
//! Gzip helpers and the UTC timestamp format used in response envelopes.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;

/// Gzip-encode a byte slice.
pub fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decode a gzip byte slice.
pub fn gunzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Current UTC time for `at` response fields.
pub fn utc_now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Current UTC time as a unix timestamp, for `learnedOn` fields.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trip() {
        let input = b"word 12\nanother 3\n".to_vec();
        let packed = gzip_bytes(&input).unwrap();
        assert_ne!(packed, input);
        assert_eq!(gunzip_bytes(&packed).unwrap(), input);
    }

    #[test]
    fn gunzip_rejects_garbage() {
        assert!(gunzip_bytes(b"definitely not gzip").is_err());
    }
}
