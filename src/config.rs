//! Frontend configuration.
//!
//! Knobs deserialize from TOML or JSON with defaults, so embedders can
//! carry them inside a larger service configuration. `validate` rejects
//! values that would disable the signature-interval rules.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

fn default_sig_max_tx() -> u64 {
    1000
}

fn default_sig_max_ms() -> u64 {
    1000
}

/// Invalid frontend configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `sig_max_tx` must be positive.
    #[error("sig_max_tx must be positive")]
    ZeroSignatureTxInterval,
    /// `sig_max_ms` must be positive.
    #[error("sig_max_ms must be positive")]
    ZeroSignatureTimeInterval,
}

/// Tunable frontend behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Emit a signature when a commit version hits the midpoint of this
    /// many transactions.
    #[serde(default = "default_sig_max_tx")]
    pub sig_max_tx: u64,
    /// Emit a signature on the leader at most this many milliseconds
    /// apart, whenever a commit gap exists.
    #[serde(default = "default_sig_max_ms")]
    pub sig_max_ms: u64,
    /// Persist client signature records with the signed content cleared.
    #[serde(default)]
    pub request_storing_disabled: bool,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            sig_max_tx: default_sig_max_tx(),
            sig_max_ms: default_sig_max_ms(),
            request_storing_disabled: false,
        }
    }
}

impl FrontendConfig {
    /// Reject configurations that would break the signature intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sig_max_tx == 0 {
            return Err(ConfigError::ZeroSignatureTxInterval);
        }
        if self.sig_max_ms == 0 {
            return Err(ConfigError::ZeroSignatureTimeInterval);
        }
        Ok(())
    }
}
