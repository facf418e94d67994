//! Register configuration.
//!
//! `ArchiveConfig` is deserialized from TOML.  Every section is optional;
//! an empty document yields the defaults below.
//!
//! ```toml
//! [store]
//! data_dir = "/var/lib/nf525"
//! sales_file = "sales.json"
//! closures_file = "closures.json"
//! audit_file = "audit.json"
//!
//! [append]
//! max_attempts = 3
//!
//! [verification]
//! timeout_ms = 30000
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use nf525_chain::{ChainWriter, ScanControl};
use nf525_contracts::error::{ChainError, ChainResult};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub store: StoreConfig,
    pub append: AppendConfig,
    pub verification: VerificationConfig,
}

/// Where each family's JSON chain file lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub sales_file: String,
    pub closures_file: String,
    pub audit_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("nf525-data"),
            sales_file: "sales.json".to_string(),
            closures_file: "closures.json".to_string(),
            audit_file: "audit.json".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn sales_path(&self) -> PathBuf {
        self.data_dir.join(&self.sales_file)
    }

    pub fn closures_path(&self) -> PathBuf {
        self.data_dir.join(&self.closures_file)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join(&self.audit_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppendConfig {
    /// Seal-and-insert rounds before an append conflict is surfaced.
    pub max_attempts: u32,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            max_attempts: ChainWriter::<()>::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Abort a verification pass after this many milliseconds.  Unbounded
    /// when absent.
    pub timeout_ms: Option<u64>,
}

impl VerificationConfig {
    /// A fresh scan control honoring the configured timeout.
    pub fn scan_control(&self) -> ScanControl {
        match self.timeout_ms {
            Some(ms) => ScanControl::new().with_timeout(Duration::from_millis(ms)),
            None => ScanControl::new(),
        }
    }
}

impl ArchiveConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `ChainError::ConfigError` if the TOML is malformed, does not
    /// match the schema, or holds invalid values.
    pub fn from_toml_str(s: &str) -> ChainResult<Self> {
        let config: ArchiveConfig = toml::from_str(s).map_err(|e| ChainError::ConfigError {
            reason: format!("failed to parse register TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as register configuration.
    pub fn from_file(path: &Path) -> ChainResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ChainError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> ChainResult<()> {
        if self.append.max_attempts == 0 {
            return Err(ChainError::ConfigError {
                reason: "append.max_attempts must be at least 1".to_string(),
            });
        }
        let files = [
            &self.store.sales_file,
            &self.store.closures_file,
            &self.store.audit_file,
        ];
        if files.iter().any(|f| f.trim().is_empty()) {
            return Err(ChainError::ConfigError {
                reason: "store file names must not be empty".to_string(),
            });
        }
        if self.store.sales_file == self.store.closures_file
            || self.store.sales_file == self.store.audit_file
            || self.store.closures_file == self.store.audit_file
        {
            return Err(ChainError::ConfigError {
                reason: "each chain family needs its own store file".to_string(),
            });
        }
        Ok(())
    }
}
