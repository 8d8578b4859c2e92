// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! # General description
//!
//! Recovery of a node data directory after an abrupt stop.
//!
//! The last commit step recorded in `commit_step.dat` tells which copy of the state is valid:
//! * before `State_Written`, the interrupted commit is discarded: staged blocks, staged state,
//!   staged importance files and unpublished state changes are dropped
//! * at `State_Written`, the interrupted commit is completed: the staged state is promoted, the
//!   staged blocks are moved into the block storage and the cache catches up with them
//!
//! Queues read by the broker are replayed into the registered subscribers, transient queues are
//! purged and the process markers are removed once the data directory is consistent again.

#![warn(missing_docs)]

mod block_loader;
mod error;
mod orchestrator;
mod recovery_mode;
mod repair_importance;
mod repair_spooling;
mod repair_state;
mod repairing_subscriber;
mod system_state;

pub use block_loader::{load_blockchain, reapply_blocks};
pub use error::RecoveryError;
pub use orchestrator::RecoveryOrchestrator;
pub use recovery_mode::{calculate_state_recovery_mode, StateRecoveryMode};
pub use repair_importance::repair_importance;
pub use repair_spooling::repair_spooling;
pub use repair_state::repair_state;
pub use repairing_subscriber::StateChangeRepairingSubscriber;
pub use system_state::{
    BitxorCoreSystemState, BROKER_LOCK_FILENAME, HARVESTERS_TEMP_FILENAME, SERVER_LOCK_FILENAME,
};
