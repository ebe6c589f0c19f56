//! Narrow interface onto the companion Git repository: commit metadata, blob
//! contents, and rename hints for the diff engine. Coverage objects refer to
//! Git commits and blobs but never write to the Git object database, so this
//! crate only ever reads through `gix` (`spec.md` §2, §4.C, §4.H).

use crate::errors::CovError;
use crate::internal::codec::report::Signature;

/// A Git commit's metadata, in the shape `Report`'s commit view stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    pub commit_time_utc: i64,
}

/// Where a blob's bytes came from, recorded for diagnostics when the
/// loose-object backend falls back from the Git ODB to its own store
/// (`spec.md` §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOrigin {
    Git,
    Cov,
}

/// A same-content-ish rename hint the diff engine can use to pair an old path
/// with a new one instead of reporting a delete+add (`spec.md` §4.H).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameHint {
    pub old_path: String,
    pub new_path: String,
    pub similarity_percent: u8,
}

pub trait GitLink {
    fn discover(start: &std::path::Path) -> Result<Option<std::path::PathBuf>, CovError>
    where
        Self: Sized;

    fn read_commit(&self, commit_id: &str) -> Result<CommitInfo, CovError>;

    /// Read a blob's raw contents by its Git oid.
    fn read_blob(&self, blob_id: &str) -> Result<Vec<u8>, CovError>;

    /// Rename hints between the trees of `old_commit` and `new_commit`, kept
    /// only above `similarity_percent` (0-100).
    fn detect_renames(
        &self,
        old_commit: &str,
        new_commit: &str,
        similarity_percent: u8,
    ) -> Result<Vec<RenameHint>, CovError>;
}

/// `gix`-backed implementation used outside of tests.
pub struct GixLink {
    repo: gix::Repository,
}

impl GixLink {
    pub fn open(git_dir: &std::path::Path) -> Result<Self, CovError> {
        let repo = gix::open(git_dir)
            .map_err(|e| CovError::io(git_dir.to_path_buf(), std::io::Error::other(e)))?;
        Ok(GixLink { repo })
    }
}

impl GitLink for GixLink {
    fn discover(start: &std::path::Path) -> Result<Option<std::path::PathBuf>, CovError> {
        match gix::discover(start) {
            Ok(repo) => Ok(Some(repo.git_dir().to_path_buf())),
            Err(_) => Ok(None),
        }
    }

    fn read_commit(&self, commit_id: &str) -> Result<CommitInfo, CovError> {
        let oid = gix::ObjectId::from_hex(commit_id.as_bytes())
            .map_err(|_| CovError::InvalidName(commit_id.to_string()))?;
        let commit = self
            .repo
            .find_object(oid)
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?
            .try_into_commit()
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;
        let message = commit
            .message_raw()
            .map(|m| String::from_utf8_lossy(m).into_owned())
            .unwrap_or_default();
        let author = commit
            .author()
            .map(|s| crate::internal::codec::report::Signature {
                name: s.name.to_string(),
                email: s.email.to_string(),
            })
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;
        let committer = commit
            .committer()
            .map(|s| crate::internal::codec::report::Signature {
                name: s.name.to_string(),
                email: s.email.to_string(),
            })
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;
        let time = commit
            .time()
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;
        Ok(CommitInfo {
            id: commit_id.to_string(),
            author,
            committer,
            message,
            commit_time_utc: time.seconds,
        })
    }

    fn read_blob(&self, blob_id: &str) -> Result<Vec<u8>, CovError> {
        let oid = gix::ObjectId::from_hex(blob_id.as_bytes())
            .map_err(|_| CovError::InvalidName(blob_id.to_string()))?;
        let object = self
            .repo
            .find_object(oid)
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;
        Ok(object.data.clone())
    }

    fn detect_renames(
        &self,
        old_commit: &str,
        new_commit: &str,
        similarity_percent: u8,
    ) -> Result<Vec<RenameHint>, CovError> {
        let tree_of = |commit_id: &str| -> Result<gix::Tree<'_>, CovError> {
            let oid = gix::ObjectId::from_hex(commit_id.as_bytes())
                .map_err(|_| CovError::InvalidName(commit_id.to_string()))?;
            let io_err = |e: gix::object::find::existing::Error| {
                CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e))
            };
            let commit = self
                .repo
                .find_object(oid)
                .map_err(io_err)?
                .try_into_commit()
                .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;
            commit
                .tree()
                .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))
        };

        let old_tree = tree_of(old_commit)?;
        let new_tree = tree_of(new_commit)?;

        let mut platform = old_tree
            .changes()
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;
        platform.track_rewrites(Some(gix::diff::Rewrites {
            percentage: Some(similarity_percent as f32 / 100.0),
            ..gix::diff::Rewrites::default()
        }));

        let mut hints = Vec::new();
        platform
            .for_each_to_obtain_tree(&new_tree, |change| {
                if let gix::object::tree::diff::change::Event::Rewrite { source_location, .. } =
                    &change.event
                {
                    hints.push(RenameHint {
                        old_path: source_location.to_string(),
                        new_path: change.location.to_string(),
                        similarity_percent,
                    });
                }
                Ok::<_, std::convert::Infallible>(gix::object::tree::diff::Action::Continue)
            })
            .map_err(|e| CovError::io(self.repo.git_dir().to_path_buf(), std::io::Error::other(e)))?;

        Ok(hints)
    }
}
