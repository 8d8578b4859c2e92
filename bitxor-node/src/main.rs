// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>
//! Bitxor node tool: recovers a data directory after a crash and creates or checks genesis
//! blocks. Settings come from `base_config/config.toml`, overridable through
//! `config/config.toml`, the user config directory and `BITXOR_` environment variables.

#![warn(missing_docs)]

use anyhow::Result;
use bitxor_models::config::BitxorCoreConfiguration;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

mod genesis;
mod inspect;
mod recover;
mod settings;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Overrides the data directory of the settings
    #[arg(long)]
    data_directory: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repairs the data directory after an abrupt stop
    Recover,
    /// Builds the genesis block of a description file and stores it in the empty data directory
    GenerateGenesis {
        /// TOML genesis description
        #[arg(long)]
        description: PathBuf,
        /// Also writes the serialized block to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Executes a serialized genesis block against the configured network
    VerifyGenesis {
        /// serialized block element
        #[arg(long)]
        block: PathBuf,
    },
    /// Prints the commit step, heights and spool indexes of the data directory
    Inspect {
        /// prints JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn level_filter(level: usize) -> LevelFilter {
    match level {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config: BitxorCoreConfiguration =
        settings::build_bitxor_settings("bitxor-node", "BITXOR")?;
    if let Some(data_directory) = args.data_directory {
        config.user.data_directory = data_directory;
    }

    let tracing_layer =
        tracing_subscriber::fmt::layer().with_filter(level_filter(config.logging.level));
    tracing_subscriber::registry().with(tracing_layer).init();
    info!(
        "network {}, data directory {}",
        config.blockchain.network.identifier,
        config.user.data_directory.display()
    );

    match args.command {
        Command::Recover => {
            let (heights, score) = recover::run_recovery(config)?;
            println!("recovered at height {} with score {}", heights.storage, score);
        }
        Command::GenerateGenesis {
            description,
            output,
        } => {
            let element = genesis::generate_genesis(&config, &description, output.as_deref())?;
            println!("genesis block {}", element.entity_hash);
        }
        Command::VerifyGenesis { block } => {
            let funding = genesis::verify_genesis(&config, &block)?;
            println!(
                "currency funded: {}",
                funding.funded(config.blockchain.currency_token_id)
            );
            println!(
                "harvesting funded: {}",
                funding.funded(config.blockchain.harvesting_token_id)
            );
        }
        Command::Inspect { json } => {
            let report = inspect::inspect_data_directory(&config.user.data_directory)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
        }
    }
    Ok(())
}
