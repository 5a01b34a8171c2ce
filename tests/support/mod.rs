#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository};
use gitsave::config::CONFIG_FILENAME;
use gitsave::{EntryMetadata, SaveReport, Workspace};
use tempfile::TempDir;

pub const AUTHOR: &str = "gitsave-test <gitsave-test@example.com>";

/// Fast lock polling so contention tests finish quickly.
const TEST_CONFIG: &str = r#"
[lock]
retry_interval_ms = 5
"#;

/// A store backed by a non-bare repository in a temp dir.
pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        Repository::init(dir.path())?;
        let store = Self { dir };
        store.write_config(TEST_CONFIG)?;
        Ok(store)
    }

    /// A store whose `origin` remote is `remote`.
    pub fn clone_of(remote: &TestRemote) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Self::init()?;
        let repo = store.repo()?;
        repo.remote("origin", &remote.url())?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git_dir(&self) -> PathBuf {
        self.dir.path().join(".git")
    }

    /// Replace `gitsave.toml` in the git dir.
    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.git_dir().join(CONFIG_FILENAME);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// A fresh, independent session on this store.
    pub fn open(&self) -> gitsave::Result<Workspace> {
        Workspace::open(self.path(), Some(AUTHOR))
    }

    /// A raw handle for inspecting refs and objects.
    pub fn repo(&self) -> Result<Repository, git2::Error> {
        Repository::open(self.path())
    }

    pub fn mainline_tip(&self) -> Result<Option<Oid>, git2::Error> {
        let repo = self.repo()?;
        let tip = repo.refname_to_id("refs/heads/master").ok();
        Ok(tip)
    }
}

/// A bare repository standing in for the shared remote.
pub struct TestRemote {
    dir: TempDir,
}

impl TestRemote {
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        Repository::init_bare(dir.path())?;
        Ok(Self { dir })
    }

    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn repo(&self) -> Result<Repository, git2::Error> {
        Repository::open_bare(self.dir.path())
    }

    pub fn mainline_tip(&self) -> Result<Option<Oid>, git2::Error> {
        Ok(self.repo()?.refname_to_id("refs/heads/master").ok())
    }

    /// Content of `path` on the remote mainline.
    pub fn read(&self, path: &str) -> Result<Option<Vec<u8>>, git2::Error> {
        let repo = self.repo()?;
        let Ok(tip) = repo.refname_to_id("refs/heads/master") else {
            return Ok(None);
        };
        let tree = repo.find_commit(tip)?.tree()?;
        let Ok(entry) = tree.get_path(Path::new(path)) else {
            return Ok(None);
        };
        let blob = repo.find_blob(entry.id())?;
        Ok(Some(blob.content().to_vec()))
    }
}

/// Stage `files` on top of the mainline and save them locally.
pub fn save_files(ws: &Workspace, files: &[(&str, &str)], message: &str) -> gitsave::Result<SaveReport> {
    let mut staging = ws.staging(None)?;
    for (path, content) in files {
        staging.add(path, content.as_bytes(), EntryMetadata::default())?;
    }
    ws.save_local(staging, message)
}

/// Stage `files` on top of the mainline and publish them to the remote.
pub fn publish_files(
    ws: &Workspace,
    files: &[(&str, &str)],
    message: &str,
) -> gitsave::Result<SaveReport> {
    let mut staging = ws.staging(None)?;
    for (path, content) in files {
        staging.add(path, content.as_bytes(), EntryMetadata::default())?;
    }
    ws.save_remote(staging, message)
}

pub fn read_string(ws: &Workspace, path: &str) -> gitsave::Result<String> {
    Ok(String::from_utf8_lossy(&ws.read(path)?).into_owned())
}
