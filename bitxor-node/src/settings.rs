// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

//! Build here the node settings from the configuration files and the environment

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use std::path::Path;

const BASE_CONFIG_PATH: &str = "base_config/config.toml";
const OVERRIDE_CONFIG_PATH: &str = "config/config.toml";

/// Layers, by increasing priority: the base config file, the override file when present, the
/// user config file when present and the environment variables starting with `env_prefix`.
/// Nested keys are separated by `__` in variable names: `BITXOR_NODE__LOADER_BATCH_SIZE`.
pub fn build_bitxor_settings<T: DeserializeOwned>(
    app_name: &str,
    env_prefix: &str,
) -> Result<T, ConfigError> {
    let config_path = std::env::var(format!("{}_CONFIG_PATH", env_prefix))
        .unwrap_or_else(|_| BASE_CONFIG_PATH.to_string());
    let mut builder = Config::builder().add_source(File::with_name(&config_path));

    let config_override_path = std::env::var(format!("{}_CONFIG_OVERRIDE_PATH", env_prefix))
        .unwrap_or_else(|_| OVERRIDE_CONFIG_PATH.to_string());
    if Path::new(&config_override_path).is_file() {
        builder = builder.add_source(File::with_name(&config_override_path));
    }

    if let Some(proj_dirs) = ProjectDirs::from("io", "BitxorLabs", app_name) {
        // portable user config
        let user_config_path = proj_dirs.config_dir().join("config.toml");
        if user_config_path.is_file() {
            builder = builder.add_source(File::from(user_config_path));
        }
    }

    builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_models::config::BitxorCoreConfiguration;
    use bitxor_models::network::NetworkIdentifier;
    use serial_test::serial;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const ENV_PREFIX: &str = "BITXOR_TEST";

    fn base_config_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(BASE_CONFIG_PATH)
    }

    fn clear_env() {
        for name in [
            "BITXOR_TEST_CONFIG_PATH",
            "BITXOR_TEST_CONFIG_OVERRIDE_PATH",
            "BITXOR_TEST_NODE__LOADER_BATCH_SIZE",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn base_config_is_complete() {
        clear_env();
        std::env::set_var("BITXOR_TEST_CONFIG_PATH", base_config_path());
        let temp = TempDir::new().unwrap();
        std::env::set_var(
            "BITXOR_TEST_CONFIG_OVERRIDE_PATH",
            temp.path().join("missing.toml"),
        );

        let config: BitxorCoreConfiguration =
            build_bitxor_settings("bitxor-node-test", ENV_PREFIX).unwrap();

        assert_eq!(config.blockchain.network.identifier, NetworkIdentifier::PrivateTest);
        assert!(!config.node.enable_cache_database_storage);
        assert_eq!(config.logging.level, 2);
        clear_env();
    }

    #[test]
    #[serial]
    fn override_file_and_environment_take_precedence() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let override_path = temp.path().join("config.toml");
        fs::write(
            &override_path,
            "[node]\nenable_cache_database_storage = true\nloader_batch_size = 7\n",
        )
        .unwrap();
        std::env::set_var("BITXOR_TEST_CONFIG_PATH", base_config_path());
        std::env::set_var("BITXOR_TEST_CONFIG_OVERRIDE_PATH", &override_path);
        std::env::set_var("BITXOR_TEST_NODE__LOADER_BATCH_SIZE", "42");

        let config: BitxorCoreConfiguration =
            build_bitxor_settings("bitxor-node-test", ENV_PREFIX).unwrap();

        assert!(config.node.enable_cache_database_storage);
        assert_eq!(config.node.loader_batch_size, 42);
        // untouched keys keep their base value
        assert_eq!(config.node.file_database_batch_size, 10_000);
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_base_config_is_an_error() {
        clear_env();
        let temp = TempDir::new().unwrap();
        std::env::set_var("BITXOR_TEST_CONFIG_PATH", temp.path().join("missing.toml"));

        let result = build_bitxor_settings::<BitxorCoreConfiguration>("bitxor-node-test", ENV_PREFIX);

        assert!(result.is_err());
        clear_env();
    }
}
