//! Shared I/O helpers: a byte-counting reader wrapper and a typed little-endian
//! cursor used by every object codec to read the shared envelope and headers
//! described in `spec.md` §4.A.

use std::io::{self, Read};

/// A lightweight wrapper that counts bytes read from the underlying reader.
pub struct CountingReader<R> {
    pub inner: R,
    pub bytes_read: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Typed little-endian reader over an in-memory byte slice.
///
/// Every object codec reads its header through a `Cursor` rather than an
/// `io::Read`: the whole object is already inflated into memory by the time the
/// load dispatcher hands off to a per-kind handler (`spec.md` §4.B), so bounds
/// checks can be plain slice-index checks instead of I/O errors.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

#[derive(Debug)]
pub struct Truncated;

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        if self.remaining() < n {
            return Err(Truncated);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Truncated> {
        self.take(n).map(|_| ())
    }

    pub fn u16(&mut self) -> Result<u16, Truncated> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, Truncated> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, Truncated> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn i64(&mut self) -> Result<i64, Truncated> {
        Ok(self.u64()? as i64)
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        self.take(n)
    }

    pub fn oid(&mut self) -> Result<crate::hash::Oid, Truncated> {
        let b = self.take(crate::hash::OID_BYTES)?;
        crate::hash::Oid::from_bytes(b).map_err(|_| Truncated)
    }

    /// Read the whole remaining tail (used to slice out the string pool region).
    pub fn tail(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Slice an arbitrary byte range from the start of the buffer, independent of
    /// cursor position -- used once offsets have been read out of the header.
    pub fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], Truncated> {
        if start > self.data.len() || len > self.data.len() - start {
            return Err(Truncated);
        }
        Ok(&self.data[start..start + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_u32() {
        let mut c = Cursor::new(&[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(c.u32().unwrap(), 1);
    }

    #[test]
    fn truncation_is_detected() {
        let mut c = Cursor::new(&[0x01, 0x02]);
        assert!(c.u32().is_err());
    }

    #[test]
    fn skip_advances_position() {
        let mut c = Cursor::new(&[0, 0, 0, 0, 7, 0, 0, 0]);
        c.skip(4).unwrap();
        assert_eq!(c.u32().unwrap(), 7);
    }

    #[test]
    fn slice_is_position_independent() {
        let c = Cursor::new(&[1, 2, 3, 4, 5]);
        assert_eq!(c.slice(1, 3).unwrap(), &[2, 3, 4]);
        assert!(c.slice(3, 3).is_err());
    }
}
