//! Error types for the coverage-data repository core.
//!
//! Mirrors the single flat `thiserror` enum style of the object-store layer this
//! crate grew out of: one variant per externally visible failure kind (see
//! `spec.md` §7), each carrying enough context to be useful without a backtrace.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the covdata core.
///
/// Callers are expected to pattern-match on the kind; no panics or `unwrap`
/// cross the core boundary in non-test code.
pub enum CovError {
    /// Reference or object by the given id/name does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persisted bytes failed the codec's structural checks.
    #[error("syntax error in `{what}`: {reason}")]
    SyntaxError { what: String, reason: String },

    /// Compare-and-set failed because the current value no longer matched `expected`.
    #[error("ref `{0}` was modified concurrently")]
    Modified(String),

    /// Caller supplied an ill-formed reference or propset name.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Discovery found no repository, or HEAD points at an unborn branch.
    #[error("repository is uninitialised: {0}")]
    Uninitialised(String),

    /// Worktree-init guard: the Git dir named is not a linked worktree.
    #[error("`{0}` is not a worktree")]
    NotAWorktree(PathBuf),

    /// Worktree-init guard: HEAD does not point at a branch.
    #[error("HEAD does not point at a branch")]
    NotABranch,

    /// Init over an existing repository without the reinit flag.
    #[error("`{0}` already exists")]
    AlreadyExists(PathBuf),

    /// Ambiguous abbreviated object id: more than one candidate matches the prefix.
    #[error("ambiguous prefix `{0}`: {1} candidates")]
    AmbiguousPrefix(String, usize),

    /// Malformed revision expression.
    #[error("invalid revision `{0}`: {1}")]
    InvalidRevision(String, String),

    /// Malformed format template.
    #[error("invalid format string: {0}")]
    InvalidTemplate(String),

    /// Transparent wrap of filesystem or zlib errors, with the path that was being
    /// operated on for context.
    #[error("io error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A filesystem error with no single relevant path (e.g. `current_dir()`).
    #[error("io error: {0}")]
    IoPlain(#[from] std::io::Error),
}

impl CovError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CovError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn syntax(what: impl Into<String>, reason: impl Into<String>) -> Self {
        CovError::SyntaxError {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CovError>;
