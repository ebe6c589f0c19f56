//! `LineCoverage` object: a run-length-encoded per-line coverage record
//! (`spec.md` §3, §6).
//!
//! Each packed `u32` entry carries a 31-bit `value` in the low bits and an
//! `is_null` flag in the top bit. A null entry is a run of `value` consecutive
//! unreachable/non-code lines; a non-null entry is the hit count of exactly one
//! line. Concatenating all entries reconstructs the file's per-line coverage.

use crate::errors::CovError;
use crate::internal::codec::{read_envelope, write_envelope, ObjectKind, ENVELOPE_LEN};
use crate::utils::Cursor;

const IS_NULL_BIT: u32 = 1 << 31;
const VALUE_MASK: u32 = IS_NULL_BIT - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEntry {
    /// A run of `len` consecutive unreachable/non-code lines.
    Null { len: u32 },
    /// A single line's hit count.
    Hits { count: u32 },
}

impl LineEntry {
    fn pack(self) -> u32 {
        match self {
            LineEntry::Null { len } => IS_NULL_BIT | (len & VALUE_MASK),
            LineEntry::Hits { count } => count & VALUE_MASK,
        }
    }

    fn unpack(word: u32) -> Result<LineEntry, CovError> {
        let value = word & VALUE_MASK;
        let is_null = word & IS_NULL_BIT != 0;
        if is_null && value == 0 {
            return Err(CovError::syntax(
                "line coverage entry",
                "null run of length 0 is ambiguous",
            ));
        }
        Ok(if is_null {
            LineEntry::Null { len: value }
        } else {
            LineEntry::Hits { count: value }
        })
    }

    /// How many source lines this entry accounts for.
    pub fn line_span(self) -> u32 {
        match self {
            LineEntry::Null { len } => len,
            LineEntry::Hits { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCoverage {
    pub entries: Vec<LineEntry>,
}

impl LineCoverage {
    pub fn new(entries: Vec<LineEntry>) -> Self {
        LineCoverage { entries }
    }

    /// Total number of source lines this record reconstructs to.
    pub fn reconstructed_len(&self) -> u64 {
        self.entries.iter().map(|e| e.line_span() as u64).sum()
    }

    pub fn load(data: &[u8]) -> Result<LineCoverage, CovError> {
        let (envelope, mut cur) = read_envelope(data)?;
        if envelope.kind != ObjectKind::LineCoverage {
            return Err(CovError::syntax("line coverage", "magic mismatch"));
        }
        let count = cur
            .u32()
            .map_err(|_| CovError::syntax("line coverage header", "truncated count"))?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let word = cur
                .u32()
                .map_err(|_| CovError::syntax("line coverage entries", "truncated entry"))?;
            entries.push(LineEntry::unpack(word)?);
        }
        debug_assert_eq!(cur.position(), ENVELOPE_LEN + 4 + 4 * count as usize);
        Ok(LineCoverage { entries })
    }

    pub fn store(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_LEN + 4 + 4 * self.entries.len());
        write_envelope(&mut out, ObjectKind::LineCoverage);
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.pack().to_le_bytes());
        }
        out
    }
}
