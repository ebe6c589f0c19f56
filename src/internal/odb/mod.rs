//! Loose-object backend: a two-level hex fan-out directory of zlib-deflated
//! objects under `<repo>/objects/coverage/` (`spec.md` §4.C).

pub mod safe_stream;

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::CovError;
use crate::hash::Oid;
use crate::internal::codec::files::FilesEntry;
use crate::internal::codec::line_coverage::LineCoverage;
use crate::internal::codec::{self, CovObject};
use crate::internal::zlib::{deflate_to_vec, inflate_bounded};
use safe_stream::SafeStream;

/// Refuse to inflate an object past this size. Loose coverage objects are
/// small (header plus string pool); this is a defence against a corrupt or
/// hostile object claiming an enormous decompressed size.
const MAX_OBJECT_BYTES: usize = 256 * 1024 * 1024;

pub struct LooseObjectStore {
    root: PathBuf,
}

impl LooseObjectStore {
    /// `root` is `<repo>/objects/coverage/`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LooseObjectStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, oid: &Oid) -> PathBuf {
        let (dir, file) = oid.fanout();
        self.root.join(dir).join(file)
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.path_for(oid).is_file()
    }

    /// Read and decode the object with the given id.
    pub fn read(&self, oid: &Oid) -> Result<CovObject, CovError> {
        let path = self.path_for(oid);
        let compressed = fs::read(&path).map_err(|e| {
            tracing::warn!("object {oid} missing at {}", path.display());
            CovError::io(path.clone(), e)
        })?;
        let bytes = inflate_bounded(&compressed, MAX_OBJECT_BYTES)
            .map_err(|e| CovError::io(path.clone(), e))?;
        codec::load(&bytes)
    }

    /// Write `object`, returning its oid. A no-op (beyond recomputing the hash)
    /// if an object with the same bytes already exists -- objects are
    /// immutable, so re-writing identical bytes changes nothing (`spec.md`
    /// §3 "Lifecycles").
    pub fn write(&self, object: &CovObject) -> Result<Oid, CovError> {
        let bytes = object.store();
        let oid = Oid::of(&bytes);
        let path = self.path_for(&oid);
        if path.is_file() {
            tracing::debug!("object {oid} already present, skipping write");
            return Ok(oid);
        }
        let dir = path.parent().expect("fan-out path always has a parent");
        fs::create_dir_all(dir).map_err(|e| CovError::io(dir.to_path_buf(), e))?;

        let compressed = deflate_to_vec(&bytes).map_err(|e| CovError::io(path.clone(), e))?;
        let mut stream = SafeStream::create(dir, &path)?;
        stream.write_all(&compressed)?;
        stream.commit()?;
        tracing::debug!("wrote object {oid} ({} bytes compressed)", compressed.len());
        Ok(oid)
    }

    /// Read the `LineCoverage` object a `Files` entry points at, checking that
    /// its reconstructed line count does not exceed the entry's declared
    /// `lines_total` (`spec.md` §3 "a `LineCoverage`'s reconstructed line
    /// count does not exceed `stats.lines_total`").
    pub fn read_line_coverage(&self, entry: &FilesEntry) -> Result<LineCoverage, CovError> {
        let object = self.read(&entry.line_coverage_oid)?;
        let line_coverage = match object {
            CovObject::LineCoverage(lc) => lc,
            other => {
                return Err(CovError::syntax(
                    "files entry line coverage",
                    format!("expected a line coverage object, found a {:?}", other.kind()),
                ))
            }
        };
        let reconstructed = line_coverage.reconstructed_len();
        if reconstructed > entry.lines_total as u64 {
            return Err(CovError::syntax(
                "files entry line coverage",
                format!(
                    "reconstructed line count {reconstructed} for `{}` exceeds its declared lines_total {}",
                    entry.path, entry.lines_total
                ),
            ));
        }
        Ok(line_coverage)
    }

    /// Resolve an abbreviated hex prefix (`N >= 2`) to the one object it
    /// unambiguously names (`spec.md` §4.C).
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Oid, CovError> {
        if prefix.len() < 2 || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CovError::InvalidName(format!(
                "`{prefix}` is not a valid hex oid prefix"
            )));
        }
        let (dir_name, rest) = prefix.split_at(2);
        let dir = self.root.join(dir_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CovError::NotFound(format!("no object matching `{prefix}`")))
            }
            Err(e) => return Err(CovError::io(dir, e)),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CovError::io(dir.clone(), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(rest) {
                let hex = format!("{dir_name}{name}");
                if let Ok(oid) = hex.parse::<Oid>() {
                    if self.decodes_as_object(&oid) {
                        candidates.push(oid);
                    }
                }
            }
        }

        match candidates.len() {
            0 => Err(CovError::NotFound(format!("no object matching `{prefix}`"))),
            1 => Ok(candidates.remove(0)),
            n => Err(CovError::AmbiguousPrefix(prefix.to_string(), n)),
        }
    }

    /// Whether `oid` names a file that decompresses and decodes as one of the
    /// five known object kinds. A hex-named filename alone is not enough --
    /// `spec.md` §4.C requires prefix resolution to succeed "only if exactly
    /// one candidate exists and parses as a known object type", so a stray
    /// hex-named file with garbage content must not count as a candidate.
    fn decodes_as_object(&self, oid: &Oid) -> bool {
        let path = self.path_for(oid);
        let Ok(compressed) = fs::read(&path) else {
            return false;
        };
        let Ok(bytes) = inflate_bounded(&compressed, MAX_OBJECT_BYTES) else {
            return false;
        };
        codec::load(&bytes).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;
    use crate::internal::codec::line_coverage::{LineCoverage, LineEntry};

    /// Surfaces the `tracing::debug!` calls in `write`/`read` when running
    /// this file's tests with `RUST_LOG=debug`. Safe to call from more than
    /// one test; `try_init` ignores a subscriber already installed.
    fn init_logger() {
        let _ = tracing_subscriber::fmt::Subscriber::builder()
            .with_target(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish()
            .try_init();
    }

    fn sample_object() -> CovObject {
        CovObject::LineCoverage(LineCoverage::new(vec![
            LineEntry::Null { len: 2 },
            LineEntry::Hits { count: 5 },
        ]))
    }

    #[test]
    fn write_then_read_round_trips() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        let object = sample_object();
        let oid = store.write(&object).unwrap();
        assert!(store.contains(&oid));
        let back = store.read(&oid).unwrap();
        assert_eq!(back.store(), object.store());
    }

    #[test]
    fn write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        let object = sample_object();
        let first = store.write(&object).unwrap();
        let second = store.write(&object).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn prefix_lookup_resolves_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        let oid = store.write(&sample_object()).unwrap();
        let prefix = &oid.to_string()[..8];
        assert_eq!(store.resolve_prefix(prefix).unwrap(), oid);
    }

    #[test]
    fn prefix_lookup_skips_garbage_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        let oid = store.write(&sample_object()).unwrap();
        let prefix = &oid.to_string()[..8];

        // A second, differently-hashed file that happens to share the prefix
        // but holds garbage instead of a compressed object.
        let (dir_name, rest) = prefix.split_at(2);
        let mut stray_hex = format!("{dir_name}{rest}");
        stray_hex.push_str(&"0".repeat(crate::hash::OID_HEX_LEN - stray_hex.len()));
        let stray_dir = dir.path().join(dir_name);
        fs::create_dir_all(&stray_dir).unwrap();
        fs::write(stray_dir.join(&stray_hex[2..]), b"not a real object").unwrap();

        assert_eq!(store.resolve_prefix(prefix).unwrap(), oid);
    }

    #[test]
    fn read_line_coverage_accepts_matching_lines_total() {
        use crate::hash::Oid;
        use crate::internal::codec::files::FilesEntry;
        use crate::internal::codec::{Pair, UNINITIALISED};

        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        let line_coverage = LineCoverage::new(vec![
            LineEntry::Null { len: 2 },
            LineEntry::Hits { count: 5 },
        ]);
        let oid = store
            .write(&CovObject::LineCoverage(line_coverage.clone()))
            .unwrap();
        let entry = FilesEntry {
            path: "a.cc".to_string(),
            contents_oid: Oid::of(b"contents"),
            line_coverage_oid: oid,
            lines_total: 3,
            lines: Pair {
                relevant: 1,
                visited: 1,
            },
            function_coverage_oid: None,
            branch_coverage_oid: None,
            functions: UNINITIALISED,
            branches: UNINITIALISED,
        };
        assert_eq!(store.read_line_coverage(&entry).unwrap(), line_coverage);
    }

    #[test]
    fn read_line_coverage_rejects_overshoot_past_lines_total() {
        use crate::hash::Oid;
        use crate::internal::codec::files::FilesEntry;
        use crate::internal::codec::{Pair, UNINITIALISED};

        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        let line_coverage = LineCoverage::new(vec![
            LineEntry::Null { len: 2 },
            LineEntry::Hits { count: 5 },
        ]);
        let oid = store
            .write(&CovObject::LineCoverage(line_coverage))
            .unwrap();
        let entry = FilesEntry {
            path: "a.cc".to_string(),
            contents_oid: Oid::of(b"contents"),
            line_coverage_oid: oid,
            lines_total: 2,
            lines: Pair {
                relevant: 1,
                visited: 1,
            },
            function_coverage_oid: None,
            branch_coverage_oid: None,
            functions: UNINITIALISED,
            branches: UNINITIALISED,
        };
        assert!(store.read_line_coverage(&entry).is_err());
    }

    #[test]
    fn prefix_lookup_rejects_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        assert!(store.resolve_prefix("deadbeef").is_err());
    }

    #[test]
    fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path());
        assert!(store.read(&Oid::of(b"nope")).is_err());
    }
}
