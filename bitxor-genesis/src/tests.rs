// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::test_exports::{
    create_genesis_block, create_genesis_block_with, expected_recipient_balance,
    genesis_keypair, recipient_addresses,
};
use crate::{
    GenesisBlockBuilder, GenesisBlockLoader, GenesisError, GenesisFundingType,
    StateHashVerification,
};
use assert_matches::assert_matches;
use bitxor_cache::{AccountStateCache, CacheConfiguration, CacheDelta, CoreCache};
use bitxor_chain::test_exports::create_test_configuration;
use bitxor_chain::PluginManager;
use bitxor_hash::Hash;
use bitxor_io::{BlockStorageCache, Directory, FileBlockStorage};
use bitxor_models::address::Address;
use bitxor_models::amount::{Amount, Importance};
use bitxor_models::block::{BlockElement, BlockHeader};
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::height::Height;
use bitxor_models::network::NetworkIdentifier;
use bitxor_signature::KeyPair;
use tempfile::TempDir;

fn verifiable_configuration() -> BlockchainConfiguration {
    let mut config = create_test_configuration();
    config.enable_verifiable_state = true;
    config.enable_verifiable_receipts = true;
    config
}

fn create_plugins(config: BlockchainConfiguration) -> PluginManager {
    PluginManager::with_builtin_plugins(config).unwrap()
}

fn create_cache(config: &BlockchainConfiguration) -> CoreCache {
    CoreCache::new(CacheConfiguration {
        enable_verifiable_state: config.enable_verifiable_state,
        database: None,
    })
}

fn execute(
    plugins: &PluginManager,
    config: &BlockchainConfiguration,
    element: &BlockElement,
) -> (CacheDelta, Result<crate::GenesisFundingState, GenesisError>) {
    let cache = create_cache(plugins.config());
    let mut delta = cache.create_delta();
    let result = GenesisBlockLoader::new(&mut delta, plugins).execute_with_config(config, element);
    (delta, result)
}

/// Changes the header and signs the block again, keeping the generation hash
fn resign(element: &BlockElement, change: impl FnOnce(&mut BlockHeader)) -> BlockElement {
    let mut block = element.block.clone();
    change(&mut block.header);
    block.sign(&genesis_keypair()).unwrap();
    let mut resigned = BlockElement::new(block).unwrap();
    resigned.generation_hash = element.generation_hash;
    resigned
}

fn store_genesis(directory: &TempDir, element: BlockElement) -> BlockStorageCache {
    let storage = BlockStorageCache::new(Box::new(FileBlockStorage::new(Directory::new(
        directory.path(),
    ))));
    let mut modifier = storage.modifier();
    modifier.save_block(element).unwrap();
    modifier.commit().unwrap();
    storage
}

#[test]
fn genesis_block_funds_recipients() {
    let plugins = create_plugins(create_test_configuration());
    let element = create_genesis_block(&plugins);

    let (delta, result) = execute(&plugins, plugins.config(), &element);

    let funding = result.unwrap();
    let config = plugins.config();
    assert_eq!(funding.funding_type, GenesisFundingType::Implicit);
    assert_eq!(
        funding.funded(config.currency_token_id),
        config.initial_currency_atomic_units
    );
    for recipient in recipient_addresses(&plugins) {
        let account = delta
            .sub::<AccountStateCache>()
            .find(&recipient)
            .unwrap()
            .unwrap();
        for token_id in [config.currency_token_id, config.harvesting_token_id] {
            assert_eq!(
                account.balance(token_id),
                expected_recipient_balance(&plugins, token_id)
            );
        }
    }
    assert_eq!(delta.dependent_state().last_finalized_height, Height::GENESIS);
}

#[test]
fn genesis_execution_is_deterministic() {
    let plugins = create_plugins(verifiable_configuration());
    let element = create_genesis_block(&plugins);

    let (first, first_result) = execute(&plugins, plugins.config(), &element);
    let (second, second_result) = execute(&plugins, plugins.config(), &element);

    assert_eq!(first_result.unwrap(), second_result.unwrap());
    assert_eq!(first.changes(), second.changes());
}

#[test]
fn harvesting_balance_must_be_a_power_of_ten_multiple_of_total_importance() {
    let mut config = create_test_configuration();
    config.total_chain_importance = Importance(1234);
    let valid = create_plugins(config.clone());
    let element = create_genesis_block_with(
        &valid,
        config.initial_currency_atomic_units,
        Amount::from_raw(1234 * 10_000),
    );
    assert!(execute(&valid, &config, &element).1.is_ok());

    // built for a network whose total importance matches the funding
    let mut builder_config = config.clone();
    builder_config.total_chain_importance = Importance(1233);
    let builder_plugins = create_plugins(builder_config);
    let element = create_genesis_block_with(
        &builder_plugins,
        config.initial_currency_atomic_units,
        Amount::from_raw(1233),
    );
    assert_matches!(
        execute(&valid, &config, &element).1,
        Err(GenesisError::Consistency(_))
    );
}

#[test]
fn currency_balance_must_match_initial_currency() {
    let config = create_test_configuration();
    let mut builder_config = config.clone();
    builder_config.initial_currency_atomic_units = Amount::from_raw(1_000);
    let builder_plugins = create_plugins(builder_config);
    let element = create_genesis_block_with(
        &builder_plugins,
        Amount::from_raw(1_000),
        Amount::from_raw(config.total_chain_importance.0),
    );

    let plugins = create_plugins(config.clone());
    assert_matches!(
        execute(&plugins, &config, &element).1,
        Err(GenesisError::Consistency(_))
    );
}

#[test]
fn funded_tokens_cannot_exceed_max_atomic_units() {
    let mut config = create_test_configuration();
    config.max_token_atomic_units = Amount::from_raw(1_000_000);
    config.initial_currency_atomic_units = Amount::from_raw(1_000_000);
    config.total_chain_importance = Importance(1_000);
    let plugins = create_plugins(config.clone());
    let element = create_genesis_block_with(
        &plugins,
        Amount::from_raw(1_000_000),
        Amount::from_raw(1_000),
    );
    assert!(execute(&plugins, &config, &element).1.is_ok());

    let mut strict = config.clone();
    strict.max_token_atomic_units = Amount::from_raw(999_999);
    assert_matches!(
        execute(&plugins, &strict, &element).1,
        Err(GenesisError::Consistency(_))
    );
}

#[test]
fn declared_hashes_are_verified() {
    let plugins = create_plugins(verifiable_configuration());
    let element = create_genesis_block(&plugins);
    assert!(!element.block.header.state_hash.is_zero());
    assert!(execute(&plugins, plugins.config(), &element).1.is_ok());

    let mut corrupted = *element.block.header.receipts_hash.to_bytes();
    corrupted[7] ^= 0xFF;
    let bad_receipts = resign(&element, |header| {
        header.receipts_hash = Hash::from_bytes(&corrupted)
    });
    assert_matches!(
        execute(&plugins, plugins.config(), &bad_receipts).1,
        Err(GenesisError::HashMismatch {
            description: "genesis block receipts hash",
            ..
        })
    );

    let mut corrupted = *element.block.header.state_hash.to_bytes();
    corrupted[0] ^= 1;
    let bad_state = resign(&element, |header| {
        header.state_hash = Hash::from_bytes(&corrupted)
    });
    assert_matches!(
        execute(&plugins, plugins.config(), &bad_state).1,
        Err(GenesisError::HashMismatch {
            description: "genesis block state hash",
            ..
        })
    );
}

#[test]
fn state_hash_is_only_compared_when_verification_is_enabled() {
    let plugins = create_plugins(verifiable_configuration());
    let element = create_genesis_block(&plugins);
    let bad_state = resign(&element, |header| header.state_hash = Hash::compute_from(b"bad"));
    let directory = TempDir::new().unwrap();
    let storage = store_genesis(&directory, bad_state);
    let cache = create_cache(plugins.config());

    let mut delta = cache.create_delta();
    assert_matches!(
        GenesisBlockLoader::new(&mut delta, &plugins)
            .execute(&storage.view(), StateHashVerification::Enabled),
        Err(GenesisError::HashMismatch { .. })
    );

    let mut delta = cache.create_delta();
    GenesisBlockLoader::new(&mut delta, &plugins)
        .execute(&storage.view(), StateHashVerification::Disabled)
        .unwrap();
    // calculated anyway
    assert_eq!(
        delta.calculate_state_hash().state_hash,
        element.block.header.state_hash
    );
}

#[test]
fn execute_and_commit_commits_at_genesis_height() {
    let plugins = create_plugins(verifiable_configuration());
    let element = create_genesis_block(&plugins);
    let directory = TempDir::new().unwrap();
    let storage = store_genesis(&directory, element.clone());
    let cache = create_cache(plugins.config());

    GenesisBlockLoader::execute_and_commit(
        &cache,
        &plugins,
        &storage.view(),
        StateHashVerification::Enabled,
    )
    .unwrap();

    let view = cache.create_view();
    assert_eq!(cache.height(), Height::GENESIS);
    assert_eq!(view.dependent_state().last_finalized_height, Height::GENESIS);
    assert_eq!(view.calculate_state_hash().state_hash, element.block.header.state_hash);
    assert_eq!(
        view.sub::<AccountStateCache>().len(),
        recipient_addresses(&plugins).len() + 1
    );
}

#[test]
fn structural_mismatches_are_invalid_arguments() {
    let plugins = create_plugins(create_test_configuration());
    let element = create_genesis_block(&plugins);

    let mut other_network = create_test_configuration();
    other_network.network.identifier = NetworkIdentifier::Testnet;
    assert_matches!(
        execute(&plugins, &other_network, &element).1,
        Err(GenesisError::InvalidArgument(_))
    );

    let mut other_signer = create_test_configuration();
    other_signer.network.genesis_signer_public_key = KeyPair::from_bytes(&[9; 32]).get_public_key();
    assert_matches!(
        execute(&plugins, &other_signer, &element).1,
        Err(GenesisError::InvalidArgument(_))
    );

    let mut other_seed = create_test_configuration();
    other_seed.network.generation_hash_seed = Hash::compute_from(b"other seed");
    assert_matches!(
        execute(&plugins, &other_seed, &element).1,
        Err(GenesisError::InvalidArgument(_))
    );

    let mut wrong_generation_hash = element.clone();
    wrong_generation_hash.generation_hash = Hash::compute_from(b"wrong");
    assert_matches!(
        execute(&plugins, plugins.config(), &wrong_generation_hash).1,
        Err(GenesisError::InvalidArgument(_))
    );

    let with_fee = resign(&element, |header| header.fee_multiplier = 1);
    assert_matches!(
        execute(&plugins, plugins.config(), &with_fee).1,
        Err(GenesisError::InvalidArgument(_))
    );
}

#[test]
fn unknown_transaction_types_are_rejected() {
    let plugins = create_plugins(create_test_configuration());
    let transfers_only = PluginManager::builder(create_test_configuration())
        .add_transaction_plugin(Box::new(bitxor_chain::plugins::TransferPlugin))
        .unwrap()
        .build();
    let keypair = genesis_keypair();
    let mut builder = GenesisBlockBuilder::new(&plugins, &keypair).unwrap();
    builder.add_namespace_registration("bitxor").unwrap();
    let config = plugins.config();
    let recipient = recipient_addresses(&plugins)[0];
    builder
        .add_transfer(
            recipient,
            vec![
                (
                    config.currency_token_id.unresolve(),
                    config.initial_currency_atomic_units,
                ),
                (
                    config.harvesting_token_id.unresolve(),
                    Amount::from_raw(config.total_chain_importance.0),
                ),
            ],
        )
        .unwrap();
    let element = builder.build().unwrap();

    assert_matches!(
        execute(&transfers_only, config, &element).1,
        Err(GenesisError::InvalidArgument(_))
    );
}

#[test]
fn invalid_signature_fails_stateless_validation() {
    let plugins = create_plugins(create_test_configuration());
    let element = create_genesis_block(&plugins);
    let mut tampered = element.clone();
    tampered.block.header.difficulty += 1;

    assert_matches!(
        execute(&plugins, plugins.config(), &tampered).1,
        Err(GenesisError::ValidationFailed { .. })
    );
}

#[test]
fn fee_sink_account_is_created_by_genesis() {
    let sink = Address::from_public_key(
        &KeyPair::from_bytes(&[0x33; 32]).get_public_key(),
        NetworkIdentifier::PrivateTest,
    );
    let mut config = create_test_configuration();
    config.harvest_network_fee_sink_address = Some(sink);
    let plugins = create_plugins(config);
    let element = create_genesis_block(&plugins);

    let (delta, result) = execute(&plugins, plugins.config(), &element);

    result.unwrap();
    assert!(delta.sub::<AccountStateCache>().contains(&sink).unwrap());
}

#[test]
fn builder_requires_the_genesis_signer() {
    let plugins = create_plugins(create_test_configuration());
    let keypair = KeyPair::from_bytes(&[5; 32]);
    assert_matches!(
        GenesisBlockBuilder::new(&plugins, &keypair),
        Err(GenesisError::InvalidArgument(_))
    );
}
