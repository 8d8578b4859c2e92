// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_io::{purge_directory, CommitOperationStep, DataDirectory, IoError};
use std::fs;
use tracing::debug;

/// Commits the importance files staged in `importance/wip` when `State_Written` was reached,
/// discards them otherwise
pub fn repair_importance(
    data_directory: &DataDirectory,
    commit_step: CommitOperationStep,
) -> Result<(), IoError> {
    let wip = data_directory.importance_wip();
    if !wip.exists() {
        return Ok(());
    }

    if commit_step != CommitOperationStep::StateWritten {
        debug!(" - purging {}", wip.path().display());
        return purge_directory(wip.path());
    }

    let importance = data_directory.importance();
    let entries = fs::read_dir(wip.path()).map_err(|err| IoError::io(wip.path(), err))?;
    for entry in entries {
        let entry = entry.map_err(|err| IoError::io(wip.path(), err))?;
        let source = entry.path();
        if !source.is_file() {
            continue;
        }
        let destination = importance.path().join(entry.file_name());
        debug!(" - committing {}", destination.display());
        fs::rename(&source, &destination).map_err(|err| IoError::io(&source, err))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn count_entries(path: &std::path::Path) -> usize {
        fs::read_dir(path).unwrap().count()
    }

    fn run(commit_step: CommitOperationStep) -> (usize, usize) {
        let temp = TempDir::new().unwrap();
        let data_directory = DataDirectory::prepare(temp.path()).unwrap();
        for name in ["foo", "bar"] {
            fs::write(data_directory.importance_wip().file(name), b"importance").unwrap();
        }

        repair_importance(&data_directory, commit_step).unwrap();

        (
            count_entries(data_directory.importance().path()),
            count_entries(data_directory.importance_wip().path()),
        )
    }

    #[test]
    fn wip_is_purged_unless_state_written() {
        // the importance directory only holds wip
        assert_eq!(run(CommitOperationStep::BlocksWritten), (1, 0));
        assert_eq!(run(CommitOperationStep::AllUpdated), (1, 0));
    }

    #[test]
    fn wip_is_committed_when_state_written() {
        assert_eq!(run(CommitOperationStep::StateWritten), (3, 0));
    }
}
