//! `FunctionCoverage` object: an ordered array of per-function hit counts and
//! source spans (`spec.md` §3, §6).

use crate::errors::CovError;
use crate::internal::codec::{
    pad4, read_envelope, write_envelope, ObjectKind, StringPoolBuilder, StringPoolView,
    ENVELOPE_LEN,
};
use crate::utils::Cursor;

/// Minimum entry stride, in `u32` words: `name, demangled_name, count,
/// start_line, start_col, end_line, end_col`.
const MIN_STRIDE_WORDS: u32 = 7;

const HEADER_LEN: usize = ENVELOPE_LEN + 4 * 5; // entries(offset,stride,count) + strings(offset,size)

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: String,
    pub demangled_name: String,
    pub count: u32,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl FunctionEntry {
    /// Two entries are aliases (template instantiations of the same source
    /// function) iff they share start, end and demangled name.
    pub fn is_alias_of(&self, other: &FunctionEntry) -> bool {
        self.start_line == other.start_line
            && self.start_col == other.start_col
            && self.end_line == other.end_line
            && self.end_col == other.end_col
            && self.demangled_name == other.demangled_name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionCoverage {
    pub entries: Vec<FunctionEntry>,
}

impl FunctionCoverage {
    pub fn new(entries: Vec<FunctionEntry>) -> Self {
        FunctionCoverage { entries }
    }

    /// Merge entries that alias each other, summing counts under the
    /// demangled label (`spec.md` §3).
    pub fn merged_by_alias(&self) -> Vec<FunctionEntry> {
        let mut merged: Vec<FunctionEntry> = Vec::new();
        for entry in &self.entries {
            if let Some(existing) = merged.iter_mut().find(|m| entry.is_alias_of(m)) {
                existing.count = existing.count.saturating_add(entry.count);
            } else {
                merged.push(entry.clone());
            }
        }
        merged
    }

    pub fn load(data: &[u8]) -> Result<FunctionCoverage, CovError> {
        let (envelope, mut cur) = read_envelope(data)?;
        if envelope.kind != ObjectKind::FunctionCoverage {
            return Err(CovError::syntax("function coverage", "magic mismatch"));
        }
        let err = |reason: &str| CovError::syntax("function coverage header", reason.to_string());
        let entries_offset = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;
        let entries_stride = cur.u32().map_err(|_| err("truncated header"))?;
        let entries_count = cur.u32().map_err(|_| err("truncated header"))? as usize;
        let strings_offset = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;
        let strings_size = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;

        if entries_stride < MIN_STRIDE_WORDS {
            return Err(CovError::syntax(
                "function coverage entries",
                "entry stride smaller than declared minimum",
            ));
        }
        let stride_bytes = entries_stride as usize * 4;

        crate::internal::codec::validate_layout(
            data.len(),
            HEADER_LEN,
            entries_offset,
            stride_bytes * entries_count,
            strings_offset,
            strings_size,
        )?;

        let strings = StringPoolView::new(
            cur.slice(strings_offset, strings_size)
                .map_err(|_| err("strings region out of bounds"))?,
        );

        let mut entries = Vec::with_capacity(entries_count);
        for i in 0..entries_count {
            let entry_bytes = cur
                .slice(entries_offset + i * stride_bytes, stride_bytes)
                .map_err(|_| err("entries region out of bounds"))?;
            let mut ecur = Cursor::new(entry_bytes);
            let name_off = ecur.u32().map_err(|_| err("truncated entry"))?;
            let demangled_off = ecur.u32().map_err(|_| err("truncated entry"))?;
            let count = ecur.u32().map_err(|_| err("truncated entry"))?;
            let start_line = ecur.u32().map_err(|_| err("truncated entry"))?;
            let start_col = ecur.u32().map_err(|_| err("truncated entry"))?;
            let end_line = ecur.u32().map_err(|_| err("truncated entry"))?;
            let end_col = ecur.u32().map_err(|_| err("truncated entry"))?;
            if (end_line, end_col) < (start_line, start_col) {
                return Err(CovError::syntax(
                    "function coverage entry",
                    "end precedes start",
                ));
            }
            entries.push(FunctionEntry {
                name: strings.get(name_off)?.to_string(),
                demangled_name: strings.get(demangled_off)?.to_string(),
                count,
                start_line,
                start_col,
                end_line,
                end_col,
            });
        }
        Ok(FunctionCoverage { entries })
    }

    pub fn store(&self) -> Vec<u8> {
        let mut pool = StringPoolBuilder::new();
        let mut entry_bytes = Vec::with_capacity(self.entries.len() * MIN_STRIDE_WORDS as usize * 4);
        for entry in &self.entries {
            let name_off = pool.intern(&entry.name);
            let demangled_off = pool.intern(&entry.demangled_name);
            entry_bytes.extend_from_slice(&name_off.to_le_bytes());
            entry_bytes.extend_from_slice(&demangled_off.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.count.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.start_line.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.start_col.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.end_line.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.end_col.to_le_bytes());
        }

        let entries_offset_words = HEADER_LEN as u32 / 4;
        let entries_len = entry_bytes.len();
        let strings_offset_bytes = HEADER_LEN + entries_len;
        let mut strings_bytes = pool.into_bytes();
        pad4(&mut strings_bytes);

        let mut out = Vec::with_capacity(strings_offset_bytes + strings_bytes.len());
        write_envelope(&mut out, ObjectKind::FunctionCoverage);
        out.extend_from_slice(&entries_offset_words.to_le_bytes());
        out.extend_from_slice(&MIN_STRIDE_WORDS.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&((strings_offset_bytes / 4) as u32).to_le_bytes());
        out.extend_from_slice(&((strings_bytes.len() / 4) as u32).to_le_bytes());
        out.extend_from_slice(&entry_bytes);
        out.extend_from_slice(&strings_bytes);
        out
    }
}
