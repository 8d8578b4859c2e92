// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::IoError;
use std::fs;
use std::path::{Path, PathBuf};

/// A directory inside the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    /// Directory at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Directory { path: path.into() }
    }

    /// Path of the directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the file `name` inside this directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Whether the directory exists
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Creates the directory and its parents if needed
    pub fn create(&self) -> Result<(), IoError> {
        fs::create_dir_all(&self.path).map_err(|err| IoError::io(&self.path, err))
    }

    /// Replaces `destination` with this directory.
    /// The destination is purged and removed first, then this directory is renamed into place.
    pub fn move_to(&self, destination: &Directory) -> Result<(), IoError> {
        if destination.exists() {
            purge_directory(destination.path())?;
            fs::remove_dir(destination.path()).map_err(|err| IoError::io(destination.path(), err))?;
        }
        fs::rename(&self.path, destination.path()).map_err(|err| IoError::io(&self.path, err))
    }
}

/// Layout of the node data directory
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: Directory,
}

impl DataDirectory {
    /// Data directory rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataDirectory {
            root: Directory::new(root),
        }
    }

    /// Creates the root, the spool root and the importance directories
    pub fn prepare(root: impl Into<PathBuf>) -> Result<Self, IoError> {
        let data_directory = DataDirectory::new(root);
        data_directory.root.create()?;
        data_directory.spool_root().create()?;
        data_directory.importance_wip().create()?;
        Ok(data_directory)
    }

    /// Root directory
    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// Named directory under the root
    pub fn dir(&self, name: &str) -> Directory {
        Directory::new(self.root.file(name))
    }

    /// Root of all spool queues
    pub fn spool_root(&self) -> Directory {
        self.dir("spool")
    }

    /// Named spool queue directory
    pub fn spool_dir(&self, name: &str) -> Directory {
        Directory::new(self.spool_root().file(name))
    }

    /// Durable local state
    pub fn state(&self) -> Directory {
        self.dir("state")
    }

    /// Staging area of the next durable local state
    pub fn state_tmp(&self) -> Directory {
        self.dir("state.tmp")
    }

    /// Importance snapshots
    pub fn importance(&self) -> Directory {
        self.dir("importance")
    }

    /// Importance snapshots being written
    pub fn importance_wip(&self) -> Directory {
        Directory::new(self.importance().file("wip"))
    }

    /// Path of the commit step marker
    pub fn commit_step_file(&self) -> PathBuf {
        self.root.file(crate::commit_step::COMMIT_STEP_FILENAME)
    }
}

/// Removes everything inside `path`, keeping the directory itself.
/// A missing directory is not an error.
pub fn purge_directory(path: &Path) -> Result<(), IoError> {
    if !path.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(path).map_err(|err| IoError::io(path, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| IoError::io(path, err))?;
        let entry_path = entry.path();
        let result = if entry_path.is_dir() {
            fs::remove_dir_all(&entry_path)
        } else {
            fs::remove_file(&entry_path)
        };
        result.map_err(|err| IoError::io(&entry_path, err))?;
    }
    Ok(())
}
