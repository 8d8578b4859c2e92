// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_io::{CommitOperationStep, DataDirectory, IoError, COMMIT_STEP_FILENAME};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Lock file left by a running broker process
pub const BROKER_LOCK_FILENAME: &str = "broker.lock";
/// Lock file left by a running server process
pub const SERVER_LOCK_FILENAME: &str = "server.lock";
/// Harvesters file being written. It only survives a failure, on success it is renamed.
pub const HARVESTERS_TEMP_FILENAME: &str = "harvesters.dat.tmp";

/// Process level markers kept at the root of the data directory
pub struct BitxorCoreSystemState<'a> {
    data_directory: &'a DataDirectory,
}

impl<'a> BitxorCoreSystemState<'a> {
    /// System state of `data_directory`
    pub fn new(data_directory: &'a DataDirectory) -> Self {
        BitxorCoreSystemState { data_directory }
    }

    fn root_file(&self, name: &str) -> PathBuf {
        self.data_directory.root().file(name)
    }

    /// Whether the broker process stopped without cleaning up
    pub fn should_recover_broker(&self) -> bool {
        self.root_file(BROKER_LOCK_FILENAME).exists()
    }

    /// Whether the server process stopped without cleaning up
    pub fn should_recover_server(&self) -> bool {
        self.root_file(SERVER_LOCK_FILENAME).exists()
    }

    /// Last commit step set, `All_Updated` when the marker is absent
    pub fn commit_step(&self) -> Result<CommitOperationStep, IoError> {
        CommitOperationStep::read_from(self.data_directory.root().path())
    }

    /// Removes the lock files, the harvesters temporary file and the commit step marker
    pub fn reset(&self) -> Result<(), IoError> {
        for name in [
            BROKER_LOCK_FILENAME,
            SERVER_LOCK_FILENAME,
            HARVESTERS_TEMP_FILENAME,
            COMMIT_STEP_FILENAME,
        ] {
            let path = self.root_file(name);
            match fs::remove_file(&path) {
                Err(err) if err.kind() != ErrorKind::NotFound => return Err(IoError::io(path, err)),
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_commit_step_means_all_updated() {
        let temp = TempDir::new().unwrap();
        let data_directory = DataDirectory::prepare(temp.path()).unwrap();
        let system_state = BitxorCoreSystemState::new(&data_directory);

        assert_eq!(system_state.commit_step().unwrap(), CommitOperationStep::AllUpdated);
        assert!(!system_state.should_recover_broker());
        assert!(!system_state.should_recover_server());
    }

    #[test]
    fn reset_removes_markers_only() {
        let temp = TempDir::new().unwrap();
        let data_directory = DataDirectory::prepare(temp.path()).unwrap();
        for name in [
            BROKER_LOCK_FILENAME,
            SERVER_LOCK_FILENAME,
            HARVESTERS_TEMP_FILENAME,
            "harvesters.dat",
        ] {
            fs::write(temp.path().join(name), b"x").unwrap();
        }
        CommitOperationStep::StateWritten
            .write_to(temp.path())
            .unwrap();
        let system_state = BitxorCoreSystemState::new(&data_directory);
        assert!(system_state.should_recover_broker());
        assert!(system_state.should_recover_server());
        assert_eq!(system_state.commit_step().unwrap(), CommitOperationStep::StateWritten);

        system_state.reset().unwrap();

        assert!(!system_state.should_recover_broker());
        assert!(!system_state.should_recover_server());
        assert!(!temp.path().join(HARVESTERS_TEMP_FILENAME).exists());
        assert!(temp.path().join("harvesters.dat").exists());
        assert_eq!(system_state.commit_step().unwrap(), CommitOperationStep::AllUpdated);

        // nothing left to remove
        system_state.reset().unwrap();
    }
}
