//! TOML configuration for the case service.
//!
//! Every section and field has a default, so an empty document is a valid
//! configuration:
//!
//! ```toml
//! [chain]
//! append_retry_limit = 5
//!
//! [cipher]
//! default_key_id = "tenant-default"
//!
//! [cipher.keys]
//! tenant-default = "<64 hex chars>"
//!
//! [pack]
//! signer_key_id = "casetrail-pack-signer"
//! signer_seed_hex = "<64 hex chars>"
//! artifact_dir = "packs"
//! ```

use std::{collections::BTreeMap, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use casetrail_contracts::error::{CaseError, CaseResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub chain: ChainConfig,
    pub cipher: CipherConfig,
    pub pack: PackConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Total attempts an append makes when it loses the head race.
    pub append_retry_limit: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { append_retry_limit: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Key new reports are sealed under.
    pub default_key_id: String,
    /// Key id to hex key material. Only read by local keyring setups.
    pub keys: BTreeMap<String, String>,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            default_key_id: "tenant-default".to_string(),
            keys: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub signer_key_id: String,
    /// Hex Ed25519 seed. A fresh key is generated when absent.
    pub signer_seed_hex: Option<String>,
    /// Directory for rendered pack documents. In-memory when absent.
    pub artifact_dir: Option<PathBuf>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            signer_key_id: "casetrail-pack-signer".to_string(),
            signer_seed_hex: None,
            artifact_dir: None,
        }
    }
}

impl CaseConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `CaseError::ConfigError` if the TOML is malformed, does not
    /// match the expected shape, or holds values the service cannot run with.
    pub fn from_toml_str(s: &str) -> CaseResult<Self> {
        let config: CaseConfig = toml::from_str(s).map_err(|e| CaseError::ConfigError {
            reason: format!("failed to parse case config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> CaseResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CaseError::ConfigError {
            reason: format!("failed to read case config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> CaseResult<()> {
        if self.chain.append_retry_limit == 0 {
            return Err(CaseError::ConfigError {
                reason: "chain.append_retry_limit must be at least 1".to_string(),
            });
        }
        if self.cipher.default_key_id.trim().is_empty() {
            return Err(CaseError::ConfigError {
                reason: "cipher.default_key_id must not be empty".to_string(),
            });
        }
        if self.pack.signer_key_id.trim().is_empty() {
            return Err(CaseError::ConfigError {
                reason: "pack.signer_key_id must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
