//! Reference store: direct and symbolic refs under `<repo>/refs/`, plus
//! `HEAD` (`spec.md` §3 "Entities", §4.D).

pub mod name;

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::CovError;
use crate::hash::Oid;
use crate::internal::odb::safe_stream::SafeStream;

const SYMBOLIC_PREFIX: &str = "ref: ";
const HEADS_PREFIX: &str = "refs/heads/";
const TAGS_PREFIX: &str = "refs/tags/";
const REFS_PREFIX: &str = "refs/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Direct(Oid),
    Symbolic(String),
}

/// `{branch?, tip?, ref}` as returned by `current_head` (`spec.md` §4.E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub branch: Option<String>,
    pub tip: Option<Oid>,
    pub reference: String,
}

pub struct RefStore {
    /// Root of the repository (so `HEAD` and `refs/` are both reachable).
    root: PathBuf,
}

impl RefStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RefStore { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Read and parse the reference `name` currently holds, or `None` if no
    /// such file exists.
    pub fn lookup(&self, name: &str) -> Result<Option<Reference>, CovError> {
        if !name::is_valid_name(name) {
            return Err(CovError::InvalidName(name.to_string()));
        }
        let path = self.path_for(name);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CovError::io(path, e)),
        };
        let line = contents.trim_end_matches(['\n', '\r']);
        if let Some(target) = line.strip_prefix(SYMBOLIC_PREFIX) {
            return Ok(Some(Reference::Symbolic(target.to_string())));
        }
        let oid: Oid = line
            .parse()
            .map_err(|_| CovError::syntax("reference", format!("`{name}` is not a valid ref")))?;
        Ok(Some(Reference::Direct(oid)))
    }

    fn write_line(&self, name: &str, line: &str) -> Result<(), CovError> {
        let path = self.path_for(name);
        let dir = path.parent().expect("ref path always has a parent");
        fs::create_dir_all(dir).map_err(|e| CovError::io(dir.to_path_buf(), e))?;
        let mut stream = SafeStream::create(dir, &path)?;
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.commit()
    }

    pub fn create_direct(&self, name: &str, target: Oid) -> Result<(), CovError> {
        if !name::is_valid_name(name) {
            return Err(CovError::InvalidName(name.to_string()));
        }
        self.write_line(name, &target.to_string())
    }

    pub fn create_symbolic(&self, name: &str, target: &str) -> Result<(), CovError> {
        if !name::is_valid_name(name) || !name::is_valid_name(target) {
            return Err(CovError::InvalidName(name.to_string()));
        }
        self.write_line(name, &format!("{SYMBOLIC_PREFIX}{target}"))
    }

    /// Atomically update `name` to `new`, but only if its current value is
    /// exactly `expected`. Returns `CovError::Modified` if the current value
    /// has moved on (`spec.md` §4.D).
    pub fn create_matching(
        &self,
        name: &str,
        new: Oid,
        expected: Oid,
    ) -> Result<(), CovError> {
        match self.lookup(name)? {
            Some(Reference::Direct(current)) if current == expected => {}
            None if expected.is_zero() => {}
            _ => {
                tracing::warn!("ref {name} moved since expected {expected}, refusing update to {new}");
                return Err(CovError::Modified(name.to_string()));
            }
        }
        self.create_direct(name, new)
    }

    pub fn delete(&self, name: &str) -> Result<(), CovError> {
        if name == "HEAD" {
            return Err(CovError::InvalidName("HEAD may never be deleted".into()));
        }
        tracing::debug!("deleting ref {name}");
        let path = self.path_for(name);
        fs::remove_file(&path).map_err(|e| CovError::io(path, e))
    }

    /// Try, in order: the bare name, `refs/<x>`, `refs/tags/<x>`,
    /// `refs/heads/<x>`; return the first that resolves (`spec.md` §4.D).
    pub fn dwim(&self, shorthand: &str) -> Result<Option<(String, Reference)>, CovError> {
        for candidate in [
            shorthand.to_string(),
            format!("{REFS_PREFIX}{shorthand}"),
            format!("{TAGS_PREFIX}{shorthand}"),
            format!("{HEADS_PREFIX}{shorthand}"),
        ] {
            if !name::is_valid_name(&candidate) {
                continue;
            }
            if let Some(reference) = self.lookup(&candidate)? {
                return Ok(Some((candidate, reference)));
            }
        }
        Ok(None)
    }

    /// Walk a chain of symbolic references until a direct ref or an
    /// unresolvable terminal ref is reached.
    pub fn peel_target(&self, name: &str) -> Result<Option<Oid>, CovError> {
        let mut current = name.to_string();
        let mut hops = 0;
        loop {
            hops += 1;
            if hops > 16 {
                return Err(CovError::syntax("reference", "symbolic ref chain too long"));
            }
            match self.lookup(&current)? {
                Some(Reference::Direct(oid)) => return Ok(Some(oid)),
                Some(Reference::Symbolic(target)) => current = target,
                None => return Ok(None),
            }
        }
    }

    /// `current_head()`: peel `HEAD`, reporting the branch name when it
    /// points (possibly unresolvably) at one (`spec.md` §4.E).
    pub fn current_head(&self) -> Result<Head, CovError> {
        match self.lookup("HEAD")? {
            None => Err(CovError::Uninitialised("no HEAD reference".into())),
            Some(Reference::Direct(oid)) => Ok(Head {
                branch: None,
                tip: Some(oid),
                reference: "HEAD".to_string(),
            }),
            Some(Reference::Symbolic(target)) => {
                let branch = target
                    .strip_prefix(HEADS_PREFIX)
                    .map(|short| short.to_string());
                let tip = self.peel_target(&target)?;
                Ok(Head {
                    branch,
                    tip,
                    reference: target,
                })
            }
        }
    }

    /// Yield every valid, resolvable reference under `prefix` (e.g.
    /// `refs/heads/`), in a stable directory-traversal order.
    pub fn iter_prefix(&self, prefix: &str) -> Result<Vec<(String, Reference)>, CovError> {
        let mut out = Vec::new();
        self.walk(&self.path_for(prefix), prefix, &mut out)?;
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn walk(
        &self,
        dir: &Path,
        name_prefix: &str,
        out: &mut Vec<(String, Reference)>,
    ) -> Result<(), CovError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CovError::io(dir.to_path_buf(), e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| CovError::io(dir.to_path_buf(), e))?;
            let file_type = entry.file_type().map_err(|e| CovError::io(dir.to_path_buf(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let full_name = format!("{name_prefix}{name}");
            if file_type.is_dir() {
                self.walk(&entry.path(), &format!("{full_name}/"), out)?;
            } else if let Some(reference) = self.lookup(&full_name)? {
                out.push((full_name, reference));
            }
        }
        Ok(())
    }
}
