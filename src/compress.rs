//! Payload decompression.
//!
//! The server wraps large payloads (profile, graph exports) in zlib or
//! gzip, chosen ambiguously by server version. Detection is by leading
//! bytes:
//! - `0x78` followed by `0x01`/`0x5E`/`0x9C`/`0xDA` → zlib stream
//! - `0x1F 0x8B` → gzip member
//! - anything else → returned unchanged (assumed plaintext)

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::{BlynkError, Result};

/// Detected compression container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Zlib,
    Gzip,
    None,
}

fn detect(data: &[u8]) -> Container {
    match data {
        [0x78, 0x01 | 0x5E | 0x9C | 0xDA, ..] => Container::Zlib,
        [0x1F, 0x8B, ..] => Container::Gzip,
        _ => Container::None,
    }
}

/// Decompress a payload that may be zlib-wrapped, gzip-wrapped, or raw.
///
/// Raw input is returned unchanged. A detected container that yields no
/// output fails with [`BlynkError::Decompress`]. Output size is not
/// bounded by the input length; the buffer grows as needed.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match detect(data) {
        Container::None => return Ok(data.to_vec()),
        Container::Zlib => {
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| BlynkError::Decompress(format!("zlib: {e}")))?;
        }
        Container::Gzip => {
            GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| BlynkError::Decompress(format!("gzip: {e}")))?;
        }
    }
    if out.is_empty() {
        return Err(BlynkError::Decompress("stream yielded no output".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;

    use super::*;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_zlib_roundtrip() {
        let profile = br#"{"dashBoards":[{"id":1,"name":"Demo"}]}"#;
        let wrapped = zlib(profile);
        assert_eq!(wrapped[0], 0x78);
        assert_eq!(decompress(&wrapped).unwrap(), profile);
    }

    #[test]
    fn test_gzip_roundtrip() {
        let profile = br#"{"dashBoards":[]}"#;
        let wrapped = gzip(profile);
        assert_eq!(&wrapped[..2], &[0x1F, 0x8B]);
        assert_eq!(decompress(&wrapped).unwrap(), profile);
    }

    #[test]
    fn test_gzip_with_filename_header() {
        // FNAME flag set: variable header must be honoured.
        let mut enc = flate2::GzBuilder::new()
            .filename("profile.json")
            .write(Vec::new(), Compression::default());
        enc.write_all(b"payload with header flags").unwrap();
        let wrapped = enc.finish().unwrap();

        assert_eq!(decompress(&wrapped).unwrap(), b"payload with header flags");
    }

    #[test]
    fn test_plaintext_passthrough() {
        let plain = br#"{"already":"json"}"#;
        assert_eq!(decompress(plain).unwrap(), plain);
    }

    #[test]
    fn test_empty_input_passthrough() {
        assert_eq!(decompress(b"").unwrap(), b"");
    }

    #[test]
    fn test_truncated_zlib_fails() {
        let wrapped = zlib(b"some profile data");
        let truncated = &wrapped[..wrapped.len() / 2];
        assert!(matches!(
            decompress(truncated),
            Err(BlynkError::Decompress(_))
        ));
    }

    #[test]
    fn test_zlib_header_with_garbage_fails() {
        // Valid magic, invalid stream.
        let bogus = [0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(decompress(&bogus), Err(BlynkError::Decompress(_))));
    }

    #[test]
    fn test_large_expansion() {
        // Output much larger than input; buffer must grow.
        let big = vec![b'x'; 1024 * 1024];
        let wrapped = zlib(&big);
        assert!(wrapped.len() < big.len() / 100);
        assert_eq!(decompress(&wrapped).unwrap(), big);
    }

    #[test]
    fn test_all_zlib_level_bytes_detected() {
        for level in [0x01u8, 0x5E, 0x9C, 0xDA] {
            assert_eq!(detect(&[0x78, level, 0x00]), Container::Zlib);
        }
        // 0x78 with a non-zlib second byte is plaintext.
        assert_eq!(detect(&[0x78, 0x00, 0x00]), Container::None);
    }
}
