// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::IoError;
use crate::index_file::IndexFile;
use std::path::Path;

/// Name of the commit step marker in the data directory root
pub const COMMIT_STEP_FILENAME: &str = "commit_step.dat";

/// Highest fully completed phase of the last multi step commit
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u64)]
pub enum CommitOperationStep {
    /// blocks are staged, state is not durable yet
    BlocksWritten = 0,
    /// state is durable in its staging location
    StateWritten = 1,
    /// everything is in place
    AllUpdated = 2,
}

impl TryFrom<u64> for CommitOperationStep {
    type Error = IoError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommitOperationStep::BlocksWritten),
            1 => Ok(CommitOperationStep::StateWritten),
            2 => Ok(CommitOperationStep::AllUpdated),
            other => Err(IoError::InvalidCommitStep(other)),
        }
    }
}

impl std::fmt::Display for CommitOperationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitOperationStep::BlocksWritten => write!(f, "Blocks_Written"),
            CommitOperationStep::StateWritten => write!(f, "State_Written"),
            CommitOperationStep::AllUpdated => write!(f, "All_Updated"),
        }
    }
}

impl CommitOperationStep {
    /// Writes the marker into `root`
    pub fn write_to(self, root: &Path) -> Result<(), IoError> {
        IndexFile::new(root.join(COMMIT_STEP_FILENAME)).set(self as u64)
    }

    /// Reads the marker from `root`; an absent marker means the last run completed cleanly
    pub fn read_from(root: &Path) -> Result<Self, IoError> {
        let index = IndexFile::new(root.join(COMMIT_STEP_FILENAME));
        CommitOperationStep::try_from(index.get_or(CommitOperationStep::AllUpdated as u64)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn steps_are_ordered() {
        assert!(CommitOperationStep::BlocksWritten < CommitOperationStep::StateWritten);
        assert!(CommitOperationStep::StateWritten < CommitOperationStep::AllUpdated);
    }

    #[test]
    fn absent_marker_reads_as_all_updated() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            CommitOperationStep::read_from(dir.path()).unwrap(),
            CommitOperationStep::AllUpdated
        );
        CommitOperationStep::StateWritten.write_to(dir.path()).unwrap();
        assert_eq!(
            CommitOperationStep::read_from(dir.path()).unwrap(),
            CommitOperationStep::StateWritten
        );
    }

    #[test]
    fn unknown_marker_is_rejected() {
        let dir = TempDir::new().unwrap();
        IndexFile::new(dir.path().join(COMMIT_STEP_FILENAME))
            .set(3)
            .unwrap();
        assert!(CommitOperationStep::read_from(dir.path()).is_err());
    }
}
