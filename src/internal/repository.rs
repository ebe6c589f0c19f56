//! Repository façade: discovery, init, and the write-through handle bundling
//! refs + object store + config (`spec.md` §4.E).

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::errors::CovError;
use crate::gitlink::{GitLink, GixLink};
use crate::hash::Oid;
use crate::internal::codec::CovObject;
use crate::internal::modules::ModuleFilter;
use crate::internal::odb::LooseObjectStore;
use crate::internal::refs::{Head, RefStore};

const COVDATA_DIR: &str = ".covdata";
const COVLINK_PREFIX: &str = "covdata: ";

fn is_valid_repo_dir(dir: &Path) -> bool {
    dir.join("objects").join("coverage").is_dir()
        && dir.join("config").is_file()
        && dir.join("HEAD").is_file()
}

fn read_covlink(path: &Path) -> Option<PathBuf> {
    if !path.is_file() {
        return None;
    }
    let contents = fs::read_to_string(path).ok()?;
    let line = contents.lines().next()?;
    let target = line.strip_prefix(COVLINK_PREFIX)?.trim();
    if target.is_empty() {
        return None;
    }
    Some(path.parent().unwrap_or(Path::new(".")).join(target))
}

#[cfg(unix)]
fn device_id(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).ok().map(|m| m.dev())
}

#[cfg(not(unix))]
fn device_id(_path: &Path) -> Option<u64> {
    None
}

/// Try `dir` (and, if it's a covlink file, the path it points at) as a
/// repository directory.
fn try_candidate(dir: &Path) -> Option<PathBuf> {
    if is_valid_repo_dir(dir) {
        return Some(dir.to_path_buf());
    }
    let linked = read_covlink(dir)?;
    is_valid_repo_dir(&linked).then_some(linked)
}

/// Walk upward from `start`, looking for a `.covdata` directory or covlink at
/// every level; optionally refuses to cross filesystem boundaries
/// (`spec.md` §4.E).
pub fn discover(start: &Path, across_fs: bool) -> Option<PathBuf> {
    if let Some(found) = try_candidate(&start.join(COVDATA_DIR)) {
        tracing::debug!("discovered repository at {}", found.display());
        return Some(found);
    }

    let mut dirname = start.to_path_buf();
    let mut device = device_id(&dirname);

    loop {
        let parent = match dirname.parent() {
            Some(p) if p != dirname => p.to_path_buf(),
            _ => break,
        };
        dirname = parent;

        if !across_fs {
            if let Some(current_device) = device_id(&dirname) {
                match device {
                    Some(d) if d != current_device => {
                        tracing::debug!("stopping discovery at filesystem boundary {}", dirname.display());
                        return None;
                    }
                    None => device = Some(current_device),
                    _ => {}
                }
            }
        }

        if let Some(found) = try_candidate(&dirname.join(COVDATA_DIR)) {
            tracing::debug!("discovered repository at {}", found.display());
            return Some(found);
        }
    }

    // No `.covdata` (direct or covlink) anywhere up to the filesystem root;
    // fall back to asking the Git layer for `.git` and re-check its
    // `.covdata` (`spec.md` §4.E, step 3).
    match GixLink::discover(start) {
        Ok(Some(git_dir)) => {
            if let Some(found) = try_candidate(&git_dir.join(COVDATA_DIR)) {
                tracing::debug!("discovered repository at {} via git dir {}", found.display(), git_dir.display());
                return Some(found);
            }
            None
        }
        Ok(None) => None,
        Err(e) => {
            tracing::debug!("git-layer discovery from {} failed: {e}", start.display());
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    pub reinit: bool,
}

/// Create the four mandatory subdirectories, write `HEAD`, and link back to
/// `git_dir` via `core.gitdir`. Transactional: any failure removes everything
/// created (`spec.md` §4.E).
pub fn init(base_dir: &Path, git_dir: &Path, opts: InitOptions) -> Result<(), CovError> {
    if base_dir.exists() {
        if !opts.reinit {
            return Err(CovError::AlreadyExists(base_dir.to_path_buf()));
        }
        tracing::warn!("reinitialising existing repository at {}", base_dir.display());
        fs::remove_dir_all(base_dir).map_err(|e| CovError::io(base_dir.to_path_buf(), e))?;
    }

    let result = (|| -> Result<(), CovError> {
        for sub in ["objects/pack", "objects/coverage", "refs/heads", "refs/tags"] {
            fs::create_dir_all(base_dir.join(sub))
                .map_err(|e| CovError::io(base_dir.join(sub), e))?;
        }

        let mut config = Config::new();
        let rel_gitdir = pathdiff(git_dir, base_dir);
        config.set("core.gitdir", rel_gitdir.to_string_lossy().into_owned());
        config.save(&base_dir.join("config"))?;

        let head_path = base_dir.join("HEAD");
        fs::write(&head_path, "ref: refs/heads/main\n")
            .map_err(|e| CovError::io(head_path, e))?;

        Ok(())
    })();

    if result.is_err() {
        tracing::error!("init of {} failed, rolling back", base_dir.display());
        let _ = fs::remove_dir_all(base_dir);
    } else {
        tracing::debug!("initialised repository at {}", base_dir.display());
    }
    result
}

/// A per-worktree `.covdata` shadow: `{commondir, covdir, gitdir, HEAD}`
/// pointer files under `<common>/worktrees/<name>/` (`spec.md` §4.E).
pub fn init_worktree_shadow(
    common_dir: &Path,
    worktree_name: &str,
    covdir: &Path,
    git_dir: &Path,
) -> Result<PathBuf, CovError> {
    let shadow = common_dir.join("worktrees").join(worktree_name);
    fs::create_dir_all(&shadow).map_err(|e| CovError::io(shadow.clone(), e))?;
    let write = |name: &str, contents: &Path| -> Result<(), CovError> {
        let path = shadow.join(name);
        fs::write(&path, format!("{}\n", contents.display())).map_err(|e| CovError::io(path, e))
    };
    write("commondir", common_dir)?;
    write("covdir", covdir)?;
    write("gitdir", git_dir)?;
    fs::write(shadow.join("HEAD"), "ref: refs/heads/main\n")
        .map_err(|e| CovError::io(shadow.join("HEAD"), e))?;
    Ok(shadow)
}

/// Naive relative-path diff good enough for linking `core.gitdir`; falls back
/// to the absolute path when the two roots share no common ancestor.
fn pathdiff(target: &Path, base: &Path) -> PathBuf {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base.components().collect();
    let common = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return target.to_path_buf();
    }
    let mut result = PathBuf::new();
    for _ in 0..(base_components.len() - common) {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component);
    }
    result
}

/// The open repository handle: config + refs + loose-object store bundled
/// together, with a bounded lifetime tied to the process (`spec.md` §3
/// "Lifecycles").
pub struct Repository {
    root: PathBuf,
    config: Config,
    refs: RefStore,
    odb: LooseObjectStore,
}

impl Repository {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CovError> {
        let root = root.into();
        if !is_valid_repo_dir(&root) {
            tracing::warn!("{} is not a covdata repository", root.display());
            return Err(CovError::Uninitialised(format!(
                "`{}` is not a covdata repository",
                root.display()
            )));
        }
        tracing::debug!("opening repository at {}", root.display());
        let config = Config::load(&root.join("config"))?;
        let refs = RefStore::new(&root);
        let odb = LooseObjectStore::new(root.join("objects").join("coverage"));
        Ok(Repository {
            root,
            config,
            refs,
            odb,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn odb(&self) -> &LooseObjectStore {
        &self.odb
    }

    pub fn current_head(&self) -> Result<Head, CovError> {
        self.refs.current_head()
    }

    pub fn write(&self, object: &CovObject) -> Result<Oid, CovError> {
        self.odb.write(object)
    }

    pub fn lookup(&self, oid: Oid) -> Result<CovObject, CovError> {
        self.odb.read(&oid)
    }

    pub fn find_partial(&self, prefix: &str) -> Result<CovObject, CovError> {
        let oid = self.odb.resolve_prefix(prefix)?;
        self.odb.read(&oid)
    }

    pub fn module_filter(&self) -> Result<ModuleFilter, CovError> {
        let (sep, paths) = self.config.module_entries();
        ModuleFilter::from_config_entries(sep, paths)
    }
}
