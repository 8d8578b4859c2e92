// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::IoError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A file holding a single little endian `u64`
#[derive(Debug, Clone)]
pub struct IndexFile {
    path: PathBuf,
}

impl IndexFile {
    /// Index file at `path`. Nothing is created until the first `set`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IndexFile { path: path.into() }
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the value, failing if the file does not exist
    pub fn get(&self) -> Result<u64, IoError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(IoError::MissingIndex(self.path.clone()))
            }
            Err(err) => return Err(IoError::io(&self.path, err)),
        };
        let bytes: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IoError::CorruptedIndex(self.path.clone()))?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads the value, returning `default` if the file does not exist
    pub fn get_or(&self, default: u64) -> Result<u64, IoError> {
        match self.get() {
            Err(IoError::MissingIndex(_)) => Ok(default),
            other => other,
        }
    }

    /// Writes the value and syncs it to disk
    pub fn set(&self, value: u64) -> Result<(), IoError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|err| IoError::io(&self.path, err))?;
        file.write_all(&value.to_le_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|err| IoError::io(&self.path, err))
    }

    /// Increments the value (a missing file counts as zero) and returns the new value
    pub fn increment(&self) -> Result<u64, IoError> {
        let value = self.get_or(0)? + 1;
        self.set(value)?;
        Ok(value)
    }
}
