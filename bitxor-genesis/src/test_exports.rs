// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Genesis blocks matching the test network configuration

use crate::builder::GenesisBlockBuilder;
use bitxor_chain::test_exports::TEST_KEYPAIR_SEED;
use bitxor_chain::PluginManager;
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::block::BlockElement;
use bitxor_models::timestamp::Timestamp;
use bitxor_models::token::TokenId;
use bitxor_signature::KeyPair;

/// Seeds of the accounts funded by the test genesis block
pub const TEST_RECIPIENT_SEEDS: [[u8; 32]; 2] = [[0x11; 32], [0x22; 32]];

/// Key pair of the test genesis signer
pub fn genesis_keypair() -> KeyPair {
    KeyPair::from_bytes(&TEST_KEYPAIR_SEED)
}

/// Addresses funded by the test genesis block
pub fn recipient_addresses(plugins: &PluginManager) -> Vec<Address> {
    TEST_RECIPIENT_SEEDS
        .iter()
        .map(|seed| {
            Address::from_public_key(
                &KeyPair::from_bytes(seed).get_public_key(),
                plugins.config().network.identifier,
            )
        })
        .collect()
}

/// Genesis block splitting `currency` and `harvesting` between the test recipients
pub fn create_genesis_block_with(
    plugins: &PluginManager,
    currency: Amount,
    harvesting: Amount,
) -> BlockElement {
    let config = plugins.config();
    let keypair = genesis_keypair();
    let mut builder = GenesisBlockBuilder::new(plugins, &keypair)
        .expect("test key pair is the genesis signer")
        .timestamp(Timestamp(1_000));
    let recipients = recipient_addresses(plugins);
    let shares = recipients.len() as u64;
    for (index, recipient) in recipients.into_iter().enumerate() {
        // the last recipient takes the remainders
        let share = |total: Amount| {
            let base = total.to_raw() / shares;
            if index as u64 == shares - 1 {
                Amount::from_raw(total.to_raw() - base * (shares - 1))
            } else {
                Amount::from_raw(base)
            }
        };
        builder
            .add_transfer(
                recipient,
                vec![
                    (config.currency_token_id.unresolve(), share(currency)),
                    (config.harvesting_token_id.unresolve(), share(harvesting)),
                ],
            )
            .expect("transfer payloads are always serializable");
    }
    builder.build().expect("test genesis block is valid")
}

/// Genesis block funding exactly the configured currency and a thousandfold of the total importance
pub fn create_genesis_block(plugins: &PluginManager) -> BlockElement {
    let config = plugins.config();
    create_genesis_block_with(
        plugins,
        config.initial_currency_atomic_units,
        Amount::from_raw(config.total_chain_importance.0 * 1_000),
    )
}

/// Balance of `token_id` expected for every test recipient after `create_genesis_block`
pub fn expected_recipient_balance(plugins: &PluginManager, token_id: TokenId) -> Amount {
    let config = plugins.config();
    let total = if token_id == config.currency_token_id {
        config.initial_currency_atomic_units.to_raw()
    } else {
        config.total_chain_importance.0 * 1_000
    };
    Amount::from_raw(total / TEST_RECIPIENT_SEEDS.len() as u64)
}
