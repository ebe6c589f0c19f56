//! Buffered inflate/deflate helpers for loose objects.
//!
//! A loose object here is read whole into memory rather than streamed
//! incrementally, since callers need the full byte buffer to hand to the
//! codec dispatcher anyway (`spec.md` §4.B/§4.C).

use std::io::{self, Read};

use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Decompress `input` into memory, refusing to produce more than `max_bytes` of
/// output. Guards against a corrupt or hostile object claiming an enormous
/// decompressed size.
pub fn inflate_bounded(input: &[u8], max_bytes: usize) -> io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = decoder.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        if out.len() + n > max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("object exceeds {max_bytes}-byte bound"),
            ));
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

/// Deflate `data` in one shot, used when writing a loose object to its temp file.
pub fn deflate_to_vec(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    io::Write::write_all(&mut encoder, data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_zlib() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let compressed = deflate_to_vec(&data).unwrap();
        let decompressed = inflate_bounded(&compressed, data.len() + 1).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn bound_is_enforced() {
        let data = vec![0u8; 10_000];
        let compressed = deflate_to_vec(&data).unwrap();
        let err = inflate_bounded(&compressed, 100).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn corrupt_stream_errors() {
        let err = inflate_bounded(b"not zlib", 1024).unwrap_err();
        assert!(matches!(err.kind(), io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof));
    }
}
