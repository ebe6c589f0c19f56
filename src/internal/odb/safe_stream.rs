//! Write-to-temp-file-then-rename publisher shared by the loose-object store
//! and the reference store (`spec.md` §4.C, §4.D).
//!
//! Writes go to a sibling temp file in the same directory as the final path
//! (so the rename is same-filesystem and therefore atomic); the file is
//! fsynced before the rename so a commit is durable even across a crash right
//! after it returns.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::CovError;

pub struct SafeStream {
    temp: Option<NamedTempFile>,
    target: PathBuf,
}

impl SafeStream {
    /// Open a temp file inside `dir`, which will be renamed to `target` on
    /// [`commit`](Self::commit).
    pub fn create(dir: &Path, target: &Path) -> Result<Self, CovError> {
        let temp = NamedTempFile::new_in(dir).map_err(|e| CovError::io(dir.to_path_buf(), e))?;
        Ok(SafeStream {
            temp: Some(temp),
            target: target.to_path_buf(),
        })
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), CovError> {
        let temp = self.temp.as_mut().expect("stream already finalised");
        temp.write_all(bytes)
            .map_err(|e| CovError::io(self.target.clone(), e))
    }

    fn file(&mut self) -> &mut File {
        self.temp.as_mut().expect("stream already finalised").as_file_mut()
    }

    /// fsync the temp file then atomically rename it onto the target path,
    /// overwriting whatever was there.
    pub fn commit(mut self) -> Result<(), CovError> {
        self.file()
            .sync_all()
            .map_err(|e| CovError::io(self.target.clone(), e))?;
        let temp = self.temp.take().expect("stream already finalised");
        temp.persist(&self.target)
            .map_err(|e| CovError::io(self.target.clone(), e.error))?;
        tracing::debug!("published {}", self.target.display());
        Ok(())
    }

    /// Discard the temp file without publishing it. Called implicitly on drop
    /// if `commit` was never reached (e.g. a write error partway through).
    pub fn rollback(mut self) {
        tracing::debug!("rolled back write to {}", self.target.display());
        self.temp.take();
    }
}

impl Drop for SafeStream {
    fn drop(&mut self) {
        // NamedTempFile removes its underlying file on drop if still present.
        let _ = self.temp.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_publishes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("published");
        let mut stream = SafeStream::create(dir.path(), &target).unwrap();
        stream.write_all(b"hello").unwrap();
        stream.commit().unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn dropped_without_commit_leaves_no_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never-published");
        {
            let mut stream = SafeStream::create(dir.path(), &target).unwrap();
            stream.write_all(b"abandoned").unwrap();
        }
        assert!(!target.exists());
    }

    #[test]
    fn commit_overwrites_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("published");
        std::fs::write(&target, b"old").unwrap();
        let mut stream = SafeStream::create(dir.path(), &target).unwrap();
        stream.write_all(b"new").unwrap();
        stream.commit().unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }
}
