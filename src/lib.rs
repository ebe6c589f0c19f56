//! Content-addressed coverage-data repository: a Git-adjacent object store
//! recording line, function, and branch coverage over time, linked to the
//! commits that produced it (`spec.md` §1, §2).
//!
//! Coverage is captured per build, aggregated into per-commit reports, and
//! chained into a single-parent history alongside (but never inside) the
//! project's own Git history. This crate owns the on-disk object format, the
//! loose-object store, the reference store, revision parsing, configuration,
//! module filtering, the file-list diff engine, and a `%`-directive
//! template formatter; it reads the companion Git repository for commit
//! metadata and rename hints but never writes to it.

pub mod config;
pub mod diff;
pub mod errors;
pub mod format;
pub mod gitlink;
pub mod hash;
pub mod internal;
pub mod utils;

pub use config::Config;
pub use diff::{diff_files, DiffKind, FileDiff};
pub use errors::CovError;
pub use gitlink::{GitLink, GixLink};
pub use hash::Oid;
pub use internal::codec::{CovObject, CoverageStats, Pair, Rating, RatingThresholds};
pub use internal::repository::Repository;