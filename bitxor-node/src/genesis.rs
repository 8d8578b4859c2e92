// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use anyhow::{bail, Context, Result};
use bitxor_cache::{CacheConfiguration, CoreCache};
use bitxor_chain::PluginManager;
use bitxor_genesis::{GenesisBlockBuilder, GenesisBlockLoader, GenesisFundingState};
use bitxor_io::{DataDirectory, IoError};
use bitxor_local_state::create_block_storage;
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::block::{BlockElement, BlockElementDeserializer, BlockElementSerializer};
use bitxor_models::config::BitxorCoreConfiguration;
use bitxor_models::height::Height;
use bitxor_models::timestamp::Timestamp;
use bitxor_models::token::NamespaceId;
use bitxor_serialization::{deserialize_exact, Serializer};
use bitxor_signature::KeyPair;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Genesis block description, read from a TOML file
#[derive(Debug, Deserialize)]
pub struct GenesisDescription {
    /// genesis signer private key, bs58 with checksum
    pub signer_private_key: String,
    /// block timestamp, in milliseconds
    #[serde(default)]
    pub timestamp: u64,
    /// block difficulty, the builder default when absent
    pub difficulty: Option<u64>,
    /// root namespaces registered by the genesis account
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// tokens defined by the genesis account
    #[serde(default)]
    pub tokens: Vec<GenesisTokenDescription>,
    /// transfers out of the genesis account
    #[serde(default)]
    pub transfers: Vec<GenesisTransferDescription>,
}

/// Token defined by the genesis block
#[derive(Debug, Deserialize)]
pub struct GenesisTokenDescription {
    /// definition nonce
    pub nonce: u32,
    /// number of decimals
    pub divisibility: u8,
    /// supply, credited to the genesis account
    pub supply: Amount,
    /// namespace linked to the token, registered in `namespaces`
    pub alias: Option<String>,
}

/// Currency and harvesting tokens sent to a recipient
#[derive(Debug, Deserialize)]
pub struct GenesisTransferDescription {
    /// recipient address
    pub recipient: Address,
    /// currency atomic units
    #[serde(default)]
    pub currency: Amount,
    /// harvesting atomic units
    #[serde(default)]
    pub harvesting: Amount,
}

impl GenesisDescription {
    /// Parses the TOML description at `path`
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read genesis description {}", path.display()))?;
        toml_edit::de::from_str(&text)
            .with_context(|| format!("invalid genesis description {}", path.display()))
    }
}

/// Builds and signs the genesis block described by `description` for the network of `plugins`
pub fn build_genesis_block(
    plugins: &PluginManager,
    description: &GenesisDescription,
) -> Result<BlockElement> {
    let keypair = KeyPair::from_bs58_check(&description.signer_private_key)?;
    let mut builder =
        GenesisBlockBuilder::new(plugins, &keypair)?.timestamp(Timestamp(description.timestamp));
    if let Some(difficulty) = description.difficulty {
        builder = builder.difficulty(difficulty);
    }

    for name in description.namespaces.iter() {
        builder.add_namespace_registration(name)?;
    }
    for token in description.tokens.iter() {
        let token_id = builder.add_token_definition(token.nonce, token.divisibility, token.supply)?;
        if let Some(alias) = &token.alias {
            if !description.namespaces.contains(alias) {
                bail!("token alias {} is not a registered namespace", alias);
            }
            builder.add_token_alias(NamespaceId::from_name(alias), token_id)?;
        }
    }

    let config = plugins.config();
    for transfer in description.transfers.iter() {
        let mut tokens = Vec::new();
        if !transfer.currency.is_zero() {
            tokens.push((config.currency_token_id.unresolve(), transfer.currency));
        }
        if !transfer.harvesting.is_zero() {
            tokens.push((config.harvesting_token_id.unresolve(), transfer.harvesting));
        }
        builder.add_transfer(transfer.recipient, tokens)?;
    }

    Ok(builder.build()?)
}

/// Builds the genesis block described at `description_path` and saves it at the genesis
/// height of the empty block storage of `config`. Writes the serialized block to `output` too.
pub fn generate_genesis(
    config: &BitxorCoreConfiguration,
    description_path: &Path,
    output: Option<&Path>,
) -> Result<BlockElement> {
    let plugins = PluginManager::with_builtin_plugins(config.blockchain.clone())?;
    let description = GenesisDescription::from_file(description_path)?;
    let element = build_genesis_block(&plugins, &description)?;

    let data_directory = DataDirectory::prepare(config.user.data_directory.clone())?;
    let storage = create_block_storage(&data_directory);
    let chain_height = storage.view().chain_height()?;
    if chain_height != Height(0) {
        bail!(
            "block storage in {} is not empty (height {})",
            data_directory.root().path().display(),
            chain_height
        );
    }
    let mut modifier = storage.modifier();
    modifier.save_block(element.clone())?;
    modifier.commit()?;
    info!(
        "genesis block {} saved in {}",
        element.entity_hash,
        data_directory.root().path().display()
    );

    if let Some(output) = output {
        write_block_file(output, &element)?;
        info!("genesis block written to {}", output.display());
    }
    Ok(element)
}

/// Serializes `element` to `path`, in the block storage format
pub fn write_block_file(path: &Path, element: &BlockElement) -> Result<()> {
    let mut buffer = Vec::new();
    BlockElementSerializer::new().serialize(element, &mut buffer)?;
    fs::write(path, buffer).map_err(|err| IoError::io(path, err))?;
    Ok(())
}

/// Reads a block element serialized in the block storage format
pub fn read_block_file(path: &Path) -> Result<BlockElement> {
    let bytes = fs::read(path).map_err(|err| IoError::io(path, err))?;
    deserialize_exact(&BlockElementDeserializer::new(), &bytes)
        .map_err(|reason| anyhow::anyhow!("invalid block file {}: {}", path.display(), reason))
}

/// Executes the genesis block at `path` against the network of `config` on a scratch cache,
/// with every check enabled
pub fn verify_genesis(config: &BitxorCoreConfiguration, path: &Path) -> Result<GenesisFundingState> {
    let plugins = PluginManager::with_builtin_plugins(config.blockchain.clone())?;
    let element = read_block_file(path)?;
    let cache = CoreCache::new(CacheConfiguration {
        enable_verifiable_state: config.blockchain.enable_verifiable_state,
        database: None,
    });
    let mut delta = cache.create_delta();
    let funding =
        GenesisBlockLoader::new(&mut delta, &plugins).execute_with_config(plugins.config(), &element)?;

    info!(
        "genesis block {} is valid: {} currency and {} harvesting atomic units funded",
        element.entity_hash,
        funding.funded(plugins.config().currency_token_id),
        funding.funded(plugins.config().harvesting_token_id)
    );
    Ok(funding)
}
