//! Shared binary envelope, string-pool convention, and coverage-stats model for
//! the five persistent object kinds (`spec.md` §3, §4.B, §6).
//!
//! Every object on disk looks like:
//!
//! ```text
//! magic[4]  version_major[1]  version_minor[1]  flags[2]  header[H]  tail
//! ```
//!
//! `header` is kind-specific (see the per-kind modules); `tail` always ends in a
//! NUL-padded string pool, present only when the object contains string
//! references. The load dispatcher in this module reads the envelope, looks the
//! magic up in a small table, and hands the remaining bytes to the matching
//! per-kind loader -- a tagged-dispatch table rather than open inheritance, per
//! `spec.md` §9.

pub mod build;
pub mod files;
pub mod function_coverage;
pub mod line_coverage;
pub mod propset;
pub mod report;
pub mod stringpool;

pub use stringpool::{StringPoolBuilder, StringPoolView};

use crate::errors::CovError;
use crate::hash::Oid;
use crate::utils::Cursor;

/// Magic byte sequences for the five object kinds, in the order `spec.md` §6
/// lists them.
pub const MAGIC_REPORT: [u8; 4] = *b"rprt";
pub const MAGIC_BUILD: [u8; 4] = *b"bld ";
pub const MAGIC_FILES: [u8; 4] = *b"list";
pub const MAGIC_LINES: [u8; 4] = *b"lnes";
pub const MAGIC_FUNCTIONS: [u8; 4] = *b"fnct";

/// Length, in bytes, of the fixed envelope prefix every object starts with:
/// 4-byte magic, 1-byte major version, 1-byte minor version, 2-byte reserved
/// flags field.
pub const ENVELOPE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Report,
    Build,
    Files,
    LineCoverage,
    FunctionCoverage,
}

impl ObjectKind {
    pub fn magic(self) -> [u8; 4] {
        match self {
            ObjectKind::Report => MAGIC_REPORT,
            ObjectKind::Build => MAGIC_BUILD,
            ObjectKind::Files => MAGIC_FILES,
            ObjectKind::LineCoverage => MAGIC_LINES,
            ObjectKind::FunctionCoverage => MAGIC_FUNCTIONS,
        }
    }

    pub fn from_magic(magic: &[u8; 4]) -> Result<Self, CovError> {
        Ok(match *magic {
            MAGIC_REPORT => ObjectKind::Report,
            MAGIC_BUILD => ObjectKind::Build,
            MAGIC_FILES => ObjectKind::Files,
            MAGIC_LINES => ObjectKind::LineCoverage,
            MAGIC_FUNCTIONS => ObjectKind::FunctionCoverage,
            other => {
                return Err(CovError::syntax(
                    "object envelope",
                    format!("unknown magic {:?}", other),
                ));
            }
        })
    }
}

/// Version this crate writes and accepts. Only the major version gates
/// compatibility; a reader encountering a newer minor version still parses
/// fields it understands.
pub const CURRENT_MAJOR: u8 = 1;
pub const CURRENT_MINOR: u8 = 0;

pub struct Envelope {
    pub kind: ObjectKind,
    pub major: u8,
    pub minor: u8,
}

/// Read and validate the 8-byte envelope prefix, returning the kind and the
/// cursor positioned right after it.
pub fn read_envelope<'a>(data: &'a [u8]) -> Result<(Envelope, Cursor<'a>), CovError> {
    let mut cur = Cursor::new(data);
    let magic_bytes = cur
        .bytes(4)
        .map_err(|_| CovError::syntax("object envelope", "truncated before magic"))?;
    let magic: [u8; 4] = magic_bytes.try_into().unwrap();
    let kind = ObjectKind::from_magic(&magic)?;
    let major = cur
        .bytes(1)
        .map_err(|_| CovError::syntax("object envelope", "truncated before version"))?[0];
    let minor = cur
        .bytes(1)
        .map_err(|_| CovError::syntax("object envelope", "truncated before version"))?[0];
    cur.skip(2)
        .map_err(|_| CovError::syntax("object envelope", "truncated before flags"))?;
    if major != CURRENT_MAJOR {
        return Err(CovError::syntax(
            "object envelope",
            format!("unsupported major version {major}"),
        ));
    }
    Ok((Envelope { kind, major, minor }, cur))
}

/// Write the envelope prefix for `kind`.
pub fn write_envelope(out: &mut Vec<u8>, kind: ObjectKind) {
    out.extend_from_slice(&kind.magic());
    out.push(CURRENT_MAJOR);
    out.push(CURRENT_MINOR);
    out.extend_from_slice(&[0u8, 0u8]); // reserved flags
}

/// Validate that the entries array and string pool declared by a header are
/// disjoint, lie entirely within the stream, and that the string pool begins no
/// earlier than the end of the fixed header (`spec.md` §4.B).
pub fn validate_layout(
    total_len: usize,
    header_size: usize,
    entries_offset: usize,
    entries_len: usize,
    strings_offset: usize,
    strings_len: usize,
) -> Result<(), CovError> {
    if strings_offset < header_size {
        return Err(CovError::syntax(
            "object layout",
            "strings region starts before end of header",
        ));
    }
    if entries_offset < header_size {
        return Err(CovError::syntax(
            "object layout",
            "entries region starts before end of header",
        ));
    }
    let entries_end = entries_offset
        .checked_add(entries_len)
        .ok_or_else(|| CovError::syntax("object layout", "entries region overflows"))?;
    let strings_end = strings_offset
        .checked_add(strings_len)
        .ok_or_else(|| CovError::syntax("object layout", "strings region overflows"))?;
    if entries_end > strings_offset {
        return Err(CovError::syntax(
            "object layout",
            "entries region overlaps or follows the string pool",
        ));
    }
    if strings_end > total_len {
        return Err(CovError::syntax(
            "object layout",
            "string pool extends past end of stream",
        ));
    }
    if entries_end > total_len {
        return Err(CovError::syntax(
            "object layout",
            "entries region extends past end of stream",
        ));
    }
    Ok(())
}

/// Pad `out` with NULs until its length is a multiple of 4.
pub fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// A `u32/u32` rating ratio, e.g. `3/4` for the default "incomplete" threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub num: u32,
    pub den: u32,
}

impl Ratio {
    pub const fn new(num: u32, den: u32) -> Self {
        Ratio { num, den }
    }

    fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RatingThresholds {
    pub incomplete: Ratio,
    pub passing: Ratio,
}

impl Default for RatingThresholds {
    fn default() -> Self {
        RatingThresholds {
            incomplete: Ratio::new(3, 4),
            passing: Ratio::new(9, 10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Passing,
    Incomplete,
    Failing,
}

/// `{relevant, visited}` pair. Used for lines/functions/branches counters.
/// `functions`/`branches` use the sentinel `(u32::MAX, u32::MAX)` to mean
/// "uninitialised" (older writers never populated them), per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub relevant: u32,
    pub visited: u32,
}

pub const UNINITIALISED: Pair = Pair {
    relevant: u32::MAX,
    visited: u32::MAX,
};

impl Default for Pair {
    fn default() -> Self {
        Pair {
            relevant: 0,
            visited: 0,
        }
    }
}

impl Pair {
    pub fn is_initialised(self) -> bool {
        self != UNINITIALISED
    }

    pub fn rating(self, thresholds: &RatingThresholds) -> Rating {
        if self.relevant == 0 {
            return Rating::Failing;
        }
        let ratio = self.visited as f64 / self.relevant as f64;
        if ratio >= thresholds.passing.as_f64() {
            Rating::Passing
        } else if ratio >= thresholds.incomplete.as_f64() {
            Rating::Incomplete
        } else {
            Rating::Failing
        }
    }

    fn add(self, other: Pair) -> Pair {
        Pair {
            relevant: self.relevant.saturating_add(other.relevant),
            visited: self.visited.saturating_add(other.visited),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageStats {
    pub lines_total: u32,
    pub lines: Pair,
    pub functions: Pair,
    pub branches: Pair,
}

impl Default for CoverageStats {
    fn default() -> Self {
        CoverageStats {
            lines_total: 0,
            lines: Pair::default(),
            functions: UNINITIALISED,
            branches: UNINITIALISED,
        }
    }
}

/// Fixed on-disk size of a `CoverageStats` block: 7 little-endian `u32`s.
pub const STATS_SIZE: usize = 7 * 4;

impl CoverageStats {
    pub fn read(cur: &mut Cursor) -> Result<CoverageStats, CovError> {
        let err = || CovError::syntax("coverage stats", "truncated");
        let lines_total = cur.u32().map_err(|_| err())?;
        let lines = Pair {
            relevant: cur.u32().map_err(|_| err())?,
            visited: cur.u32().map_err(|_| err())?,
        };
        let functions = Pair {
            relevant: cur.u32().map_err(|_| err())?,
            visited: cur.u32().map_err(|_| err())?,
        };
        let branches = Pair {
            relevant: cur.u32().map_err(|_| err())?,
            visited: cur.u32().map_err(|_| err())?,
        };
        Ok(CoverageStats {
            lines_total,
            lines,
            functions,
            branches,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.lines_total.to_le_bytes());
        out.extend_from_slice(&self.lines.relevant.to_le_bytes());
        out.extend_from_slice(&self.lines.visited.to_le_bytes());
        out.extend_from_slice(&self.functions.relevant.to_le_bytes());
        out.extend_from_slice(&self.functions.visited.to_le_bytes());
        out.extend_from_slice(&self.branches.relevant.to_le_bytes());
        out.extend_from_slice(&self.branches.visited.to_le_bytes());
    }

    /// Sum of this and `other`, honoring the uninitialised sentinel: the sum is
    /// only initialised when both sides are.
    pub fn combine(&self, other: &CoverageStats) -> CoverageStats {
        CoverageStats {
            lines_total: self.lines_total.saturating_add(other.lines_total),
            lines: self.lines.add(other.lines),
            functions: if self.functions.is_initialised() && other.functions.is_initialised() {
                self.functions.add(other.functions)
            } else if self.functions.is_initialised() {
                self.functions
            } else {
                other.functions
            },
            branches: if self.branches.is_initialised() && other.branches.is_initialised() {
                self.branches.add(other.branches)
            } else if self.branches.is_initialised() {
                self.branches
            } else {
                other.branches
            },
        }
    }
}

/// Parsed decoded form of any of the five object kinds, used by generic callers
/// (the ODB, the formatter facade) that don't statically know which kind they
/// loaded.
#[derive(Debug, Clone)]
pub enum CovObject {
    Report(report::Report),
    Build(build::Build),
    Files(files::Files),
    LineCoverage(line_coverage::LineCoverage),
    FunctionCoverage(function_coverage::FunctionCoverage),
}

impl CovObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            CovObject::Report(_) => ObjectKind::Report,
            CovObject::Build(_) => ObjectKind::Build,
            CovObject::Files(_) => ObjectKind::Files,
            CovObject::LineCoverage(_) => ObjectKind::LineCoverage,
            CovObject::FunctionCoverage(_) => ObjectKind::FunctionCoverage,
        }
    }

    pub fn store(&self) -> Vec<u8> {
        match self {
            CovObject::Report(o) => o.store(),
            CovObject::Build(o) => o.store(),
            CovObject::Files(o) => o.store(),
            CovObject::LineCoverage(o) => o.store(),
            CovObject::FunctionCoverage(o) => o.store(),
        }
    }

    /// Object id of the stored bytes. Storage address law: `sha1(store(O)) ==
    /// storage_address(O)` (`spec.md` §8, property 1).
    pub fn oid(&self) -> Oid {
        Oid::of(&self.store())
    }
}

/// Dispatch on the envelope magic and call the matching per-kind loader.
pub fn load(data: &[u8]) -> Result<CovObject, CovError> {
    let (envelope, _) = read_envelope(data)?;
    Ok(match envelope.kind {
        ObjectKind::Report => CovObject::Report(report::Report::load(data)?),
        ObjectKind::Build => CovObject::Build(build::Build::load(data)?),
        ObjectKind::Files => CovObject::Files(files::Files::load(data)?),
        ObjectKind::LineCoverage => CovObject::LineCoverage(line_coverage::LineCoverage::load(data)?),
        ObjectKind::FunctionCoverage => {
            CovObject::FunctionCoverage(function_coverage::FunctionCoverage::load(data)?)
        }
    })
}
