// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Local node fixtures over a temporary data directory

use crate::committer::ChainCommitter;
use crate::factory::{create_block_storage, create_cache};
use crate::file_storage::load_state_from_directory;
use crate::state_ref::{calculate_block_score, LocalNodeChainScore, LocalNodeStateRef, StateHeights};
use bitxor_cache::{AccountStateCache, CacheDelta, CoreCache};
use bitxor_chain::test_exports::{
    create_signed_block, create_test_configuration, create_test_plugin_manager, create_transfer,
};
use bitxor_chain::{execute_block, PluginManager};
use bitxor_genesis::test_exports::{create_genesis_block, TEST_RECIPIENT_SEEDS};
use bitxor_io::{BlockStorageCache, DataDirectory};
use bitxor_models::address::Address;
use bitxor_models::amount::{Amount, ChainScore};
use bitxor_models::block::BlockElement;
use bitxor_models::config::{
    BitxorCoreConfiguration, CacheDatabaseSettings, LoggingConfiguration, NodeConfiguration,
    UserConfiguration,
};
use bitxor_models::height::Height;
use bitxor_signature::KeyPair;
use std::path::{Path, PathBuf};

/// Amount moved by every test transfer
pub const TEST_TRANSFER_AMOUNT: u64 = 1_000;

/// Node configuration over the test network, with the data directory at `root`
pub fn create_test_node_configuration(root: &Path, enable_cache_db: bool) -> BitxorCoreConfiguration {
    BitxorCoreConfiguration {
        blockchain: create_test_configuration(),
        node: NodeConfiguration {
            enable_cache_database_storage: enable_cache_db,
            file_database_batch_size: 100,
            loader_batch_size: 10,
            cache_database: CacheDatabaseSettings { max_open_files: 16 },
        },
        user: UserConfiguration {
            data_directory: root.to_path_buf(),
        },
        logging: LoggingConfiguration { level: 2 },
    }
}

/// Local node with a block storage holding at least the test genesis block.
/// Nothing is loaded into the cache until `load_state` is called.
pub struct LocalNodeTestContext {
    /// node configuration
    pub config: BitxorCoreConfiguration,
    /// data directory layout
    pub data_directory: DataDirectory,
    /// test plugins
    pub plugins: PluginManager,
    /// ledger state
    pub cache: CoreCache,
    /// block storage at the data directory root
    pub storage: BlockStorageCache,
    /// chain score
    pub score: LocalNodeChainScore,
}

impl LocalNodeTestContext {
    /// Context over `root`, saving the genesis block when the storage is empty
    pub fn new(root: &Path, enable_cache_db: bool) -> Self {
        let config = create_test_node_configuration(root, enable_cache_db);
        let data_directory = DataDirectory::prepare(root).unwrap();
        let plugins = create_test_plugin_manager();
        let cache = create_cache(&config, &data_directory).unwrap();
        let storage = create_block_storage(&data_directory);
        if storage.view().chain_height().unwrap() == Height(0) {
            let mut modifier = storage.modifier();
            modifier.save_block(create_genesis_block(&plugins)).unwrap();
            modifier.commit().unwrap();
        }
        LocalNodeTestContext {
            config,
            data_directory,
            plugins,
            cache,
            storage,
            score: LocalNodeChainScore::default(),
        }
    }

    /// Root of the data directory
    pub fn root(&self) -> PathBuf {
        self.config.user.data_directory.clone()
    }

    /// Borrowed state
    pub fn state_ref(&self) -> LocalNodeStateRef<'_> {
        LocalNodeStateRef::new(&self.config, &self.cache, &self.storage, &self.score)
    }

    /// Loads the saved state, or the genesis block
    pub fn load_state(&self) -> StateHeights {
        load_state_from_directory(&self.data_directory.state(), &self.state_ref(), &self.plugins)
            .unwrap()
    }

    /// Committer of this node
    pub fn committer(&self) -> ChainCommitter<'_> {
        ChainCommitter::new(&self.data_directory, self.state_ref()).unwrap()
    }

    /// Drops the in memory state, as a process restart would, and reopens the data directory
    pub fn reopen(self) -> Self {
        let root = self.root();
        let enable_cache_db = self.config.node.enable_cache_database_storage;
        drop(self);
        LocalNodeTestContext::new(&root, enable_cache_db)
    }

    /// Executes `count` blocks on top of the block storage, each moving
    /// `TEST_TRANSFER_AMOUNT` currency units between the two test recipients
    pub fn execute_blocks(&self, count: u64) -> (CacheDelta, Vec<BlockElement>, ChainScore) {
        let keypair = KeyPair::from_bytes(&TEST_RECIPIENT_SEEDS[0]);
        let recipient = KeyPair::from_bytes(&TEST_RECIPIENT_SEEDS[1]).get_public_key();
        let currency = self.plugins.config().currency_token_id;

        let mut parent = self
            .storage
            .view()
            .load_block_element(self.storage.view().chain_height().unwrap())
            .unwrap();
        let mut delta = self.cache.create_delta();
        let mut blocks = Vec::new();
        let mut score = ChainScore::default();
        for _ in 0..count {
            let element = create_signed_block(
                &keypair,
                parent.height().next(),
                vec![create_transfer(&keypair, &recipient, currency, TEST_TRANSFER_AMOUNT)],
            );
            execute_block(&self.plugins, &element, &mut delta, None).unwrap();
            score = score.add(calculate_block_score(
                &parent.block.header,
                &element.block.header,
            ));
            blocks.push(element.clone());
            parent = element;
        }
        (delta, blocks, score)
    }

    /// Currency balance of the second test recipient in the committed cache
    pub fn recipient_balance(&self) -> Amount {
        let recipient = Address::from_public_key(
            &KeyPair::from_bytes(&TEST_RECIPIENT_SEEDS[1]).get_public_key(),
            self.plugins.config().network.identifier,
        );
        self.cache
            .create_view()
            .sub::<AccountStateCache>()
            .find(&recipient)
            .unwrap()
            .map(|account| account.balance(self.plugins.config().currency_token_id))
            .unwrap_or_else(Amount::zero)
    }
}
