//! The session value every coordinator works through.
//!
//! A [`Workspace`] owns one repository handle plus the configuration and
//! identity resolved for it. Independent writers (threads or processes) each
//! open their own `Workspace`; nothing here is shared between them except the
//! repository on disk.

use std::path::Path;

use git2::{ErrorCode, Oid, Repository};
use tracing::debug;

use crate::actor::{self, Identity};
use crate::catalog::{self, FileRevision};
use crate::config::{Config, CONFIG_FILENAME};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::push::{self, SaveReport};
use crate::refs;
use crate::staging::StagingIndex;

/// Repository handle with its configuration and author identity.
pub struct Workspace {
    repo: Repository,
    config: Config,
    identity: Identity,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("git_dir", &self.repo.path())
            .field("mainline", &self.config.mainline)
            .field("identity", &self.identity.to_string())
            .finish()
    }
}

impl Workspace {
    /// Discover the repository containing `path` and load its configuration.
    pub fn open(path: &Path, author: Option<&str>) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|err| {
            if err.code() == ErrorCode::NotFound {
                Error::RepoNotFound(path.to_path_buf())
            } else {
                Error::Git(err)
            }
        })?;
        Self::from_repo(repo, author)
    }

    /// Open the repository at `path`, creating an empty one if none exists.
    pub fn init(path: &Path, bare: bool, author: Option<&str>) -> Result<Self> {
        let repo = match Repository::open(path) {
            Ok(repo) => repo,
            Err(err) if err.code() == ErrorCode::NotFound => {
                std::fs::create_dir_all(path)?;
                let repo = if bare {
                    Repository::init_bare(path)?
                } else {
                    Repository::init(path)?
                };
                debug!(path = %path.display(), bare, "initialized repository");
                repo
            }
            Err(err) => return Err(Error::Git(err)),
        };
        Self::from_repo(repo, author)
    }

    /// Wrap an already-open repository, loading `gitsave.toml` from its git dir.
    pub fn from_repo(repo: Repository, author: Option<&str>) -> Result<Self> {
        let config = Config::load_from_repo(repo.path())?;
        Self::with_config(repo, config, author)
    }

    /// Wrap an already-open repository with an explicit configuration.
    pub fn with_config(repo: Repository, config: Config, author: Option<&str>) -> Result<Self> {
        let identity = actor::resolve_identity(&repo, &config, author)?;
        Ok(Self {
            repo,
            config,
            identity,
        })
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Path of the configuration file for this repository.
    pub fn config_path(&self) -> std::path::PathBuf {
        self.repo.path().join(CONFIG_FILENAME)
    }

    /// Full name of the mainline reference.
    pub fn mainline_ref(&self) -> String {
        self.config.mainline_ref()
    }

    /// Current mainline commit, or `None` for an empty store.
    pub fn mainline_tip(&self) -> Result<Option<Oid>> {
        refs::read_ref(&self.repo, &self.mainline_ref())
    }

    /// A fresh staging index seeded from `base`, or from the mainline tip
    /// when `base` is `None`. An empty store yields an empty index.
    pub fn staging(&self, base: Option<Oid>) -> Result<StagingIndex<'_>> {
        let base = match base {
            Some(oid) => Some(oid),
            None => self.mainline_tip()?,
        };
        StagingIndex::new(&self.repo, base)
    }

    /// Entry at `path` on the mainline.
    pub fn find_entry(&self, path: &str) -> Result<Option<Entry>> {
        match self.mainline_tip()? {
            Some(tip) => catalog::find_entry(&self.repo, tip, path),
            None => Ok(None),
        }
    }

    /// Content of the file at `path` on the mainline.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self.mainline_tip()? {
            Some(tip) => catalog::read_file(&self.repo, tip, path),
            None => Err(Error::EntryMissing(path.to_string())),
        }
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.find_entry(path)?.is_some())
    }

    /// Every file path on the mainline, optionally filtered by a glob.
    pub fn file_list(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        match self.mainline_tip()? {
            Some(tip) => catalog::file_list(&self.repo, tip, pattern),
            None => Ok(Vec::new()),
        }
    }

    /// Immediate children of the directory at `dir` on the mainline.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        match self.mainline_tip()? {
            Some(tip) => catalog::list_entries(&self.repo, tip, dir),
            None if crate::entry::lookup_path(dir).is_empty() => Ok(Vec::new()),
            None => Err(Error::EntryMissing(dir.to_string())),
        }
    }

    /// Most recent mainline commit that touched `path`.
    pub fn history(&self, path: &str) -> Result<Option<FileRevision>> {
        match self.mainline_tip()? {
            Some(tip) => catalog::file_history(&self.repo, tip, path),
            None => Ok(None),
        }
    }

    /// Commit `staging` and merge it into the local mainline.
    pub fn save_local(&self, staging: StagingIndex<'_>, message: &str) -> Result<SaveReport> {
        push::save_local(self, staging, message)
    }

    /// Commit `staging`, rebase it onto the mainline, and publish it.
    pub fn save_remote(&self, staging: StagingIndex<'_>, message: &str) -> Result<SaveReport> {
        push::save_remote(self, staging, message)
    }
}
