//! `Files` object: the ordered, strictly-sorted array of per-file coverage
//! summaries a `Build` points at (`spec.md` §3, §6).
//!
//! The field order `spec.md` §6 gives for an entry interleaves the optional
//! `function_coverage`/`branch_coverage` oids and `functions`/`branches` pairs
//! with required fields. This codec instead lays the optional fields out as a
//! single trailing block, which is the only arrangement consistent with the
//! "trailing optional fields exist iff stride is large enough" rule -- see
//! `DESIGN.md`.

use crate::errors::CovError;
use crate::hash::Oid;
use crate::internal::codec::{
    pad4, read_envelope, validate_layout, write_envelope, ObjectKind, Pair, StringPoolBuilder,
    StringPoolView, ENVELOPE_LEN, UNINITIALISED,
};
use crate::utils::Cursor;

const MIN_STRIDE_WORDS: u32 = 14;
const FULL_STRIDE_WORDS: u32 = 28;

const HEADER_LEN: usize = ENVELOPE_LEN + 4 * 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesEntry {
    pub path: String,
    pub contents_oid: Oid,
    pub line_coverage_oid: Oid,
    pub lines_total: u32,
    pub lines: Pair,
    pub function_coverage_oid: Option<Oid>,
    pub branch_coverage_oid: Option<Oid>,
    pub functions: Pair,
    pub branches: Pair,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Files {
    pub entries: Vec<FilesEntry>,
}

impl Files {
    pub fn new(entries: Vec<FilesEntry>) -> Self {
        Files { entries }
    }

    pub fn load(data: &[u8]) -> Result<Files, CovError> {
        let (envelope, mut cur) = read_envelope(data)?;
        if envelope.kind != ObjectKind::Files {
            return Err(CovError::syntax("files", "magic mismatch"));
        }
        let err = |reason: &str| CovError::syntax("files header", reason.to_string());
        let entries_offset = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;
        let entries_stride = cur.u32().map_err(|_| err("truncated header"))?;
        let entries_count = cur.u32().map_err(|_| err("truncated header"))? as usize;
        let strings_offset = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;
        let strings_size = cur.u32().map_err(|_| err("truncated header"))? as usize * 4;

        if entries_stride < MIN_STRIDE_WORDS {
            return Err(CovError::syntax(
                "files entries",
                "entry stride smaller than declared minimum",
            ));
        }
        let has_optional = entries_stride >= FULL_STRIDE_WORDS;
        let stride_bytes = entries_stride as usize * 4;

        validate_layout(
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
            let truncated = || CovError::syntax("files entry", "truncated");
            let path_off = ecur.u32().map_err(|_| truncated())?;
            let contents_oid = ecur.oid().map_err(|_| truncated())?;
            let line_coverage_oid = ecur.oid().map_err(|_| truncated())?;
            let lines_total = ecur.u32().map_err(|_| truncated())?;
            let lines = Pair {
                relevant: ecur.u32().map_err(|_| truncated())?,
                visited: ecur.u32().map_err(|_| truncated())?,
            };
            let (function_coverage_oid, branch_coverage_oid, functions, branches) = if has_optional
            {
                let fco = ecur.oid().map_err(|_| truncated())?;
                let bco = ecur.oid().map_err(|_| truncated())?;
                let functions = Pair {
                    relevant: ecur.u32().map_err(|_| truncated())?,
                    visited: ecur.u32().map_err(|_| truncated())?,
                };
                let branches = Pair {
                    relevant: ecur.u32().map_err(|_| truncated())?,
                    visited: ecur.u32().map_err(|_| truncated())?,
                };
                (
                    (!fco.is_zero()).then_some(fco),
                    (!bco.is_zero()).then_some(bco),
                    functions,
                    branches,
                )
            } else {
                (None, None, UNINITIALISED, UNINITIALISED)
            };

            entries.push(FilesEntry {
                path: strings.get(path_off)?.to_string(),
                contents_oid,
                line_coverage_oid,
                lines_total,
                lines,
                function_coverage_oid,
                branch_coverage_oid,
                functions,
                branches,
            });
        }

        for window in entries.windows(2) {
            if window[0].path >= window[1].path {
                return Err(CovError::syntax(
                    "files entries",
                    "paths are not strictly sorted, or contain a duplicate",
                ));
            }
        }

        Ok(Files { entries })
    }

    pub fn store(&self) -> Vec<u8> {
        let mut pool = StringPoolBuilder::new();
        let mut entry_bytes = Vec::with_capacity(self.entries.len() * FULL_STRIDE_WORDS as usize * 4);
        for entry in &self.entries {
            let path_off = pool.intern(&entry.path);
            entry_bytes.extend_from_slice(&path_off.to_le_bytes());
            entry_bytes.extend_from_slice(entry.contents_oid.as_ref());
            entry_bytes.extend_from_slice(entry.line_coverage_oid.as_ref());
            entry_bytes.extend_from_slice(&entry.lines_total.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.lines.relevant.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.lines.visited.to_le_bytes());
            entry_bytes.extend_from_slice(
                entry.function_coverage_oid.unwrap_or_else(Oid::zero).as_ref(),
            );
            entry_bytes.extend_from_slice(
                entry.branch_coverage_oid.unwrap_or_else(Oid::zero).as_ref(),
            );
            entry_bytes.extend_from_slice(&entry.functions.relevant.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.functions.visited.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.branches.relevant.to_le_bytes());
            entry_bytes.extend_from_slice(&entry.branches.visited.to_le_bytes());
        }

        let entries_offset_words = HEADER_LEN as u32 / 4;
        let strings_offset_bytes = HEADER_LEN + entry_bytes.len();
        let mut strings_bytes = pool.into_bytes();
        pad4(&mut strings_bytes);

        let mut out = Vec::with_capacity(strings_offset_bytes + strings_bytes.len());
        write_envelope(&mut out, ObjectKind::Files);
        out.extend_from_slice(&entries_offset_words.to_le_bytes());
        out.extend_from_slice(&FULL_STRIDE_WORDS.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&((strings_offset_bytes / 4) as u32).to_le_bytes());
        out.extend_from_slice(&((strings_bytes.len() / 4) as u32).to_le_bytes());
        out.extend_from_slice(&entry_bytes);
        out.extend_from_slice(&strings_bytes);
        out
    }

    /// Sum of all entries' stats, used to check the `Report`/`Build`
    /// aggregate-stats invariant (`spec.md` §3).
    pub fn total_stats(&self) -> crate::internal::codec::CoverageStats {
        self.entries.iter().fold(
            crate::internal::codec::CoverageStats::default(),
            |acc, e| {
                acc.combine(&crate::internal::codec::CoverageStats {
                    lines_total: e.lines_total,
                    lines: e.lines,
                    functions: e.functions,
                    branches: e.branches,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_entry(path: &str) -> FilesEntry {
        FilesEntry {
            path: path.to_string(),
            contents_oid: Oid::of(path.as_bytes()),
            line_coverage_oid: Oid::of(b"lines"),
            lines_total: 100,
            lines: Pair {
                relevant: 80,
                visited: 70,
            },
            function_coverage_oid: None,
            branch_coverage_oid: None,
            functions: UNINITIALISED,
            branches: UNINITIALISED,
        }
    }

    #[test]
    fn round_trips_without_optional_fields() {
        let files = Files::new(vec![minimal_entry("a.cc"), minimal_entry("b.cc")]);
        let bytes = files.store();
        assert_eq!(Files::load(&bytes).unwrap(), files);
    }

    #[test]
    fn round_trips_with_optional_fields() {
        let mut entry = minimal_entry("a.cc");
        entry.function_coverage_oid = Some(Oid::of(b"funcs"));
        entry.branch_coverage_oid = Some(Oid::of(b"branches"));
        entry.functions = Pair {
            relevant: 5,
            visited: 3,
        };
        entry.branches = Pair {
            relevant: 2,
            visited: 2,
        };
        let files = Files::new(vec![entry]);
        let bytes = files.store();
        assert_eq!(Files::load(&bytes).unwrap(), files);
    }

    #[test]
    fn rejects_unsorted_paths() {
        let files = Files::new(vec![minimal_entry("b.cc"), minimal_entry("a.cc")]);
        let bytes = files.store();
        assert!(Files::load(&bytes).is_err());
    }

    #[test]
    fn rejects_duplicate_paths() {
        let files = Files::new(vec![minimal_entry("a.cc"), minimal_entry("a.cc")]);
        let bytes = files.store();
        assert!(Files::load(&bytes).is_err());
    }

    #[test]
    fn total_stats_sums_entries() {
        let files = Files::new(vec![minimal_entry("a.cc"), minimal_entry("b.cc")]);
        let stats = files.total_stats();
        assert_eq!(stats.lines_total, 200);
        assert_eq!(stats.lines.visited, 140);
        assert!(!stats.functions.is_initialised());
    }

    #[test]
    fn empty_files_round_trips() {
        let files = Files::new(vec![]);
        assert_eq!(Files::load(&files.store()).unwrap(), files);
    }
}
