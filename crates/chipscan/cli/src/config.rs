//! Layered CLI configuration
//!
//! Defaults, then `chipscan.toml` (or `--config`), then `CHIPSCAN_`
//! environment variables. Nested keys use a double underscore, e.g.
//! `CHIPSCAN_KEYS__KEY0`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chipscan_core::{ScannerConfig, TagKey, TagSecret};
use chipscan_ultralight::{SimulationConfig, TagModel};
use clap::ValueEnum;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Config file read when `--config` is not given
pub(crate) const DEFAULT_CONFIG_FILE: &str = "chipscan.toml";

/// Prefix of configuration environment variables
pub(crate) const ENV_PREFIX: &str = "CHIPSCAN_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    /// Host keys; scans are refused while unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) keys: Option<TagSecret>,
    pub(crate) scanner: ScannerConfig,
    pub(crate) tag: TagConfig,
}

/// The tag presented to the simulated field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TagConfig {
    pub(crate) model: ModelName,
    /// Seven byte UID, hex encoded
    pub(crate) uid: String,
    pub(crate) random_id: bool,
    /// Keys programmed into the tag; the host keys are used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) key0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) key1: Option<String>,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            model: ModelName::default(),
            uid: hex::encode_upper(SimulationConfig::default().uid),
            random_id: false,
            key0: None,
            key1: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ModelName {
    #[default]
    UltralightAes,
    UltralightEv1,
    Ntag215,
}

impl From<ModelName> for TagModel {
    fn from(model: ModelName) -> Self {
        match model {
            ModelName::UltralightAes => Self::UltralightAes,
            ModelName::UltralightEv1 => Self::UltralightEv1,
            ModelName::Ntag215 => Self::Ntag215,
        }
    }
}

impl TagConfig {
    /// Build the simulated tag parameters, falling back to `host` for keys
    /// not configured on the tag
    pub(crate) fn to_simulation(&self, host: Option<&TagSecret>) -> anyhow::Result<SimulationConfig> {
        let uid = hex::decode(self.uid.trim())
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .with_context(|| format!("tag UID must be 7 hex encoded bytes, got {:?}", self.uid))?;

        let key0 = tag_key(self.key0.as_deref(), host.map(|s| s.key0.as_str()), "tag key0")?;
        let key1 = tag_key(self.key1.as_deref(), host.map(|s| s.key1.as_str()), "tag key1")?;

        Ok(SimulationConfig::default()
            .with_model(self.model.into())
            .with_uid(uid)
            .with_random_id(self.random_id)
            .with_keys(key0, key1))
    }
}

fn tag_key(configured: Option<&str>, host: Option<&str>, name: &str) -> anyhow::Result<[u8; 16]> {
    match configured.or(host) {
        Some(encoded) => Ok(*TagKey::from_hex(encoded)
            .with_context(|| format!("invalid {name}"))?
            .as_bytes()),
        None => Ok([0u8; 16]),
    }
}

/// Load the configuration from defaults, the config file and the environment
pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .with_context(|| format!("failed to load configuration from {}", file.display()))
}

#[cfg(test)]
mod tests {
    use chipscan_core::ReadMode;
    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_| {
            let config = load(None).expect("defaults load");
            assert!(config.keys.is_none());
            assert_eq!(config.scanner.read_mode, ReadMode::secure());
            assert_eq!(config.tag.model, ModelName::UltralightAes);
            Ok(())
        });
    }

    #[test]
    fn test_file_and_environment_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chipscan.toml",
                r#"
                [keys]
                key0 = "000102030405060708090a0b0c0d0e0f"
                key1 = "00102030405060708090a0b0c0d0e0f0"

                [scanner.read_mode]
                kind = "fast"

                [tag]
                model = "ntag215"
                random_id = true
                "#,
            )?;
            jail.set_env("CHIPSCAN_TAG__UID", "04FFEEDDCCBBAA");

            let config = load(None).expect("layered load");
            let keys = config.keys.expect("keys from file");
            assert_eq!(keys.key1, "00102030405060708090a0b0c0d0e0f0");
            assert_eq!(config.scanner.read_mode, ReadMode::Fast);
            assert_eq!(config.tag.model, ModelName::Ntag215);
            assert!(config.tag.random_id);
            assert_eq!(config.tag.uid, "04FFEEDDCCBBAA");
            Ok(())
        });
    }

    #[test]
    fn test_simulation_keys_fall_back_to_host() {
        let host = TagSecret::new(
            "000102030405060708090a0b0c0d0e0f",
            "00102030405060708090a0b0c0d0e0f0",
        );
        let tag = TagConfig {
            key0: Some("ffffffffffffffffffffffffffffffff".to_string()),
            ..TagConfig::default()
        };

        let simulation = tag.to_simulation(Some(&host)).unwrap();
        assert_eq!(simulation.key0, [0xff; 16]);
        assert_eq!(simulation.key1[1], 0x10);

        let factory = TagConfig::default().to_simulation(None).unwrap();
        assert_eq!(factory.key0, [0u8; 16]);
    }

    #[test]
    fn test_bad_uid_is_rejected() {
        let tag = TagConfig {
            uid: "0401".to_string(),
            ..TagConfig::default()
        };
        assert!(tag.to_simulation(None).is_err());
    }
}
