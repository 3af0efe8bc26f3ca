//! Runtime configuration for the `lendledger` binary

use lendledger_compliance::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use lendledger_core::{LedgerError, LedgerResult};
use lendledger_customer::{DEFAULT_KYC_VALIDITY_DAYS, MAX_KYC_VALIDITY_DAYS};
use lendledger_passport::{DEFAULT_MAX_VALIDITY_DAYS, MAX_CDP_VALIDITY_DAYS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "LENDLEDGER_DATA_DIR";
pub const ENV_LOG: &str = "LENDLEDGER_LOG";
pub const ENV_ADMIN: &str = "LENDLEDGER_ADMIN";

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding `ledger.jsonl`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// `tracing` filter directive, e.g. `info` or `lendledger_loan=debug`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Actor id created by `init`
    #[serde(default = "default_bootstrap_admin_id")]
    pub bootstrap_admin_id: String,

    /// Lifetime of a VERIFIED KYC record (days)
    #[serde(default = "default_kyc_validity_days")]
    pub kyc_validity_days: i64,

    /// Upper bound on a requested CDP validity (days)
    #[serde(default = "default_max_cdp_validity_days")]
    pub max_cdp_validity_days: i64,

    #[serde(default = "default_search_limit")]
    pub default_search_limit: usize,

    #[serde(default = "default_max_search_limit")]
    pub max_search_limit: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_bootstrap_admin_id() -> String {
    "ADMIN".to_string()
}

fn default_kyc_validity_days() -> i64 {
    DEFAULT_KYC_VALIDITY_DAYS
}

fn default_max_cdp_validity_days() -> i64 {
    DEFAULT_MAX_VALIDITY_DAYS
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_max_search_limit() -> usize {
    MAX_SEARCH_LIMIT
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_filter: default_log_filter(),
            bootstrap_admin_id: default_bootstrap_admin_id(),
            kyc_validity_days: default_kyc_validity_days(),
            max_cdp_validity_days: default_max_cdp_validity_days(),
            default_search_limit: default_search_limit(),
            max_search_limit: default_max_search_limit(),
        }
    }
}

impl LedgerConfig {
    /// Load and validate configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        config
            .validate()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Check the numeric settings against the ranges the services accept
    pub fn validate(&self) -> LedgerResult<()> {
        if !(1..=MAX_KYC_VALIDITY_DAYS).contains(&self.kyc_validity_days) {
            return Err(LedgerError::Validation(format!(
                "kyc_validity_days must be between 1 and {} (got {})",
                MAX_KYC_VALIDITY_DAYS, self.kyc_validity_days
            )));
        }
        if !(1..=MAX_CDP_VALIDITY_DAYS).contains(&self.max_cdp_validity_days) {
            return Err(LedgerError::Validation(format!(
                "max_cdp_validity_days must be between 1 and {} (got {})",
                MAX_CDP_VALIDITY_DAYS, self.max_cdp_validity_days
            )));
        }
        if self.max_search_limit == 0 || !(1..=self.max_search_limit).contains(&self.default_search_limit) {
            return Err(LedgerError::Validation(format!(
                "search limits must satisfy 1 <= default_search_limit ({}) <= max_search_limit ({})",
                self.default_search_limit, self.max_search_limit
            )));
        }
        Ok(())
    }

    /// Apply `LENDLEDGER_*` overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup; blank values are ignored
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        if let Some(admin) = lookup(ENV_ADMIN) {
            self.bootstrap_admin_id = admin;
        }
        self
    }
}
