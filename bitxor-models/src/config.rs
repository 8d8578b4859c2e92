// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::address::Address;
use crate::amount::{Amount, Importance};
use crate::network::NetworkInfo;
use crate::token::TokenId;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use std::path::PathBuf;

/// Network wide settings. Every node of a network must use the same values.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainConfiguration {
    /// network fingerprint
    pub network: NetworkInfo,
    /// compute and check state hashes
    pub enable_verifiable_state: bool,
    /// compute and check receipts hashes
    pub enable_verifiable_receipts: bool,
    /// currency token
    #[serde_as(as = "DisplayFromStr")]
    pub currency_token_id: TokenId,
    /// harvesting token
    #[serde_as(as = "DisplayFromStr")]
    pub harvesting_token_id: TokenId,
    /// number of blocks between importance recalculations
    pub importance_grouping: u64,
    /// maximum number of blocks that can be rolled back
    pub max_rollback_blocks: u32,
    /// total currency created by the genesis block
    pub initial_currency_atomic_units: Amount,
    /// maximum supply of any token
    pub max_token_atomic_units: Amount,
    /// total importance of the chain
    pub total_chain_importance: Importance,
    /// maximum number of transactions in a block
    pub max_transactions_per_block: u32,
    /// maximum lifetime of a transaction, in milliseconds
    pub max_transaction_lifetime_ms: u64,
    /// fee multiplier used when a block does not define one
    pub default_dynamic_fee_multiplier: u32,
    /// optional account collecting a share of harvest fees
    #[serde(default)]
    pub harvest_network_fee_sink_address: Option<Address>,
    /// percentage of harvest fees sent to the network sink
    #[serde(default)]
    pub harvest_network_percentage: u8,
}

/// Settings of the external cache database
#[derive(Debug, Clone, Deserialize)]
pub struct CacheDatabaseSettings {
    /// maximum number of files rocksdb keeps open
    pub max_open_files: i32,
}

impl Default for CacheDatabaseSettings {
    fn default() -> Self {
        CacheDatabaseSettings { max_open_files: 64 }
    }
}

/// Local node settings
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfiguration {
    /// keep sub cache contents in a durable database instead of saving them in full
    pub enable_cache_database_storage: bool,
    /// number of blocks per block storage directory
    pub file_database_batch_size: u64,
    /// number of entries committed at once when loading a saved state
    pub loader_batch_size: usize,
    /// cache database tuning
    #[serde(default)]
    pub cache_database: CacheDatabaseSettings,
}

/// User settings
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfiguration {
    /// root of the data directory
    pub data_directory: PathBuf,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfiguration {
    /// 0: errors only, 1: warnings, 2: info, 3: debug, 4: trace
    pub level: usize,
}

/// All the configuration of a node process
#[derive(Debug, Clone, Deserialize)]
pub struct BitxorCoreConfiguration {
    /// network settings
    pub blockchain: BlockchainConfiguration,
    /// node settings
    pub node: NodeConfiguration,
    /// user settings
    pub user: UserConfiguration,
    /// logging settings
    pub logging: LoggingConfiguration,
}
