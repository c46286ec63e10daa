//! Configuration of the token service system contract.
//!
//! Values come from a JSON document (camelCase keys, every field optional) and
//! may be overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HTS_PRECOMPILE_ADDR` | `precompileAddress` |
//! | `HTS_DEFAULT_GAS_COST` | `gas.defaultPrecompileGas` |
//! | `HTS_MAX_AIRDROP_TRANSFERS` | `maxAirdropTransfers` |
//! | `HTS_ALLOW_SYSTEM_USE_OF_HAPI_SIGS` | `legacySignatures.allowedOperations` |
//! | `HTS_HAPI_SIGS_CUTOFF_BLOCK` | `legacySignatures.cutoffBlock` |
//! | `HTS_MAX_NUM_WITH_HAPI_SIGS_ACCESS` | `legacySignatures.maxContractNum` |

use crate::{
    gas::GasSchedule,
    ops::{OperationKind, UnknownOperation},
    policy::{CheckOrderPolicy, InvalidCheckOrder},
};
use alloy_primitives::{address, Address};
use hts_primitives::ContractId;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, env, fmt, path::Path, str::FromStr};
use thiserror::Error;

/// Address of the token service system contract, `0x167`.
pub const HTS_PRECOMPILE_ADDRESS: Address = address!("0x0000000000000000000000000000000000000167");

/// Env var overriding the precompile address.
pub const ENV_PRECOMPILE_ADDR: &str = "HTS_PRECOMPILE_ADDR";
/// Env var overriding the default precompile gas.
pub const ENV_DEFAULT_GAS_COST: &str = "HTS_DEFAULT_GAS_COST";
/// Env var overriding the airdrop credit limit.
pub const ENV_MAX_AIRDROP_TRANSFERS: &str = "HTS_MAX_AIRDROP_TRANSFERS";
/// Env var listing operations that may use top-level signatures.
pub const ENV_ALLOW_HAPI_SIGS: &str = "HTS_ALLOW_SYSTEM_USE_OF_HAPI_SIGS";
/// Env var setting the block at which top-level signatures stop counting.
pub const ENV_HAPI_SIGS_CUTOFF_BLOCK: &str = "HTS_HAPI_SIGS_CUTOFF_BLOCK";
/// Env var setting the highest contract number with top-level signature access.
pub const ENV_MAX_NUM_WITH_HAPI_SIGS: &str = "HTS_MAX_NUM_WITH_HAPI_SIGS_ACCESS";

/// When top-level transaction signatures may satisfy simple keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacySignatureConfig {
    /// Operations allowed to consult top-level signatures.
    pub allowed_operations: BTreeSet<OperationKind>,
    /// First block at which top-level signatures are ignored.
    pub cutoff_block: Option<u64>,
    /// Highest calling contract number that keeps access.
    pub max_contract_num: Option<u64>,
    /// Contracts that keep access regardless of their number.
    pub special_access: BTreeSet<ContractId>,
}

impl Default for LegacySignatureConfig {
    fn default() -> Self {
        Self {
            allowed_operations: OperationKind::ALL.into_iter().filter(|k| !k.is_view()).collect(),
            cutoff_block: None,
            max_contract_num: None,
            special_access: BTreeSet::new(),
        }
    }
}

impl LegacySignatureConfig {
    /// Disables top-level signatures for every operation.
    pub fn disabled() -> Self {
        Self { allowed_operations: BTreeSet::new(), ..Self::default() }
    }

    /// Whether `kind`, called by `caller` at `block`, may consult top-level
    /// signatures. Without a calling contract only the kind and block count.
    pub fn permits(&self, kind: OperationKind, block: u64, caller: Option<ContractId>) -> bool {
        if !self.allowed_operations.contains(&kind) {
            return false;
        }
        if self.cutoff_block.is_some_and(|cutoff| block >= cutoff) {
            return false;
        }
        caller.is_none_or(|contract| {
            self.max_contract_num.is_none_or(|max| contract.num() <= max)
                || self.special_access.contains(&contract)
        })
    }
}

/// Switches for functions that can be turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    /// `airdropTokens`.
    pub airdrops: bool,
    /// `rejectTokens`.
    pub reject: bool,
    /// `update*CustomFees`.
    pub fee_schedule_update: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self { airdrops: true, reject: true, fee_schedule_update: true }
    }
}

impl FeatureFlags {
    /// Whether `kind` is enabled.
    pub const fn enabled(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Airdrop => self.airdrops,
            OperationKind::Reject => self.reject,
            OperationKind::UpdateFees => self.fee_schedule_update,
            _ => true,
        }
    }
}

/// Configuration of the token service system contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HtsConfig {
    /// Address the precompile is installed at.
    pub precompile_address: Address,
    /// Gas schedule.
    pub gas: GasSchedule,
    /// Longest custom fee schedule.
    pub max_custom_fees_allowed: usize,
    /// Most credits in one airdrop.
    pub max_airdrop_transfers: usize,
    /// Most references in one rejection.
    pub max_token_rejections: usize,
    /// Most serials minted at once.
    pub max_batch_size_mint: usize,
    /// Most serials burned at once.
    pub max_batch_size_burn: usize,
    /// Most serials wiped at once.
    pub max_batch_size_wipe: usize,
    /// Longest NFT metadata.
    pub max_metadata_bytes: usize,
    /// Most tokens one account may be associated with.
    pub max_tokens_per_account: usize,
    /// Top-level signature access.
    pub legacy_signatures: LegacySignatureConfig,
    /// Enabled functions.
    pub features: FeatureFlags,
    /// Order of the token checks.
    pub check_order: CheckOrderPolicy,
}

impl Default for HtsConfig {
    fn default() -> Self {
        Self {
            precompile_address: HTS_PRECOMPILE_ADDRESS,
            gas: GasSchedule::default(),
            max_custom_fees_allowed: 10,
            max_airdrop_transfers: 10,
            max_token_rejections: 10,
            max_batch_size_mint: 10,
            max_batch_size_burn: 10,
            max_batch_size_wipe: 10,
            max_metadata_bytes: 100,
            max_tokens_per_account: 1_000,
            legacy_signatures: LegacySignatureConfig::default(),
            features: FeatureFlags::default(),
            check_order: CheckOrderPolicy::default(),
        }
    }
}

impl HtsConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON document from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_json_str(&raw)
    }

    /// Defaults with the process environment applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|var| env::var(var).ok())?;
        Ok(config)
    }

    /// Applies overrides read through `lookup`, which maps a variable name to
    /// its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = non_empty(&lookup, ENV_PRECOMPILE_ADDR)? {
            self.precompile_address = parse_address(&raw)?;
        }
        if let Some(raw) = non_empty(&lookup, ENV_DEFAULT_GAS_COST)? {
            self.gas.default_precompile_gas = parse_number(ENV_DEFAULT_GAS_COST, &raw)?;
        }
        if let Some(raw) = non_empty(&lookup, ENV_MAX_AIRDROP_TRANSFERS)? {
            self.max_airdrop_transfers = parse_number(ENV_MAX_AIRDROP_TRANSFERS, &raw)?;
        }
        // An empty allow-list is meaningful: it switches top-level signatures off.
        if let Some(raw) = lookup(ENV_ALLOW_HAPI_SIGS) {
            self.legacy_signatures.allowed_operations = raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(OperationKind::from_str)
                .collect::<Result<_, _>>()?;
        }
        if let Some(raw) = non_empty(&lookup, ENV_HAPI_SIGS_CUTOFF_BLOCK)? {
            self.legacy_signatures.cutoff_block = Some(parse_number(ENV_HAPI_SIGS_CUTOFF_BLOCK, &raw)?);
        }
        if let Some(raw) = non_empty(&lookup, ENV_MAX_NUM_WITH_HAPI_SIGS)? {
            self.legacy_signatures.max_contract_num =
                Some(parse_number(ENV_MAX_NUM_WITH_HAPI_SIGS, &raw)?);
        }
        self.validate()
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_order.validate()?;
        Ok(())
    }
}

/// Errors raised while building an [`HtsConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An override variable was set but blank.
    #[error("environment variable {var} is empty")]
    EmptyEnv {
        /// Name of the variable.
        var: String,
    },
    /// An address could not be parsed.
    #[error("invalid precompile address: {0}")]
    InvalidAddress(AddressParseDisplay),
    /// A numeric override could not be parsed.
    #[error("environment variable {var} is not a number: {value}")]
    InvalidNumber {
        /// Name of the variable.
        var: String,
        /// Raw value.
        value: String,
    },
    /// An operation name is not known.
    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),
    /// A check order is not a permutation of the checks.
    #[error(transparent)]
    InvalidCheckOrder(#[from] InvalidCheckOrder),
    /// The document is not valid JSON for this type.
    #[error("invalid config json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The file could not be read.
    #[error("failed to read {path}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Wrapper for formatting address parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseDisplay(String);

impl fmt::Display for AddressParseDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_address(value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value)
        .map_err(|err| ConfigError::InvalidAddress(AddressParseDisplay(err.to_string())))
}

fn parse_number<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { var: var.into(), value: value.into() })
}

fn non_empty<F>(lookup: &F, var: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::EmptyEnv { var: var.into() }),
        Some(raw) => Ok(Some(raw.trim().to_string())),
        None => Ok(None),
    }
}
