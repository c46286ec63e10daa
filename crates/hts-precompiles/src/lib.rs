//! # HTS System Contract
//!
//! This crate implements the token service system contract: the precompile
//! through which EVM contracts administer native tokens.
//!
//! ## Pipeline
//!
//! Every invocation runs through the same stages:
//!
//! 1. **Dispatch**: the 4-byte selector picks a function from [`abi`]. Unknown
//!    selectors are a no-op; undecodable arguments halt.
//! 2. **Prechecks and gas**: shape checks, then the [`gas`] schedule.
//! 3. **Authorization**: the token's key for the operation and the keys of
//!    the accounts involved are evaluated by [`auth`], in the order given by
//!    the [`policy`] table.
//! 4. **Execution**: an executor from [`ops`] applies the state transition to
//!    the [`state::Ledger`] and reports a [`record::ChildRecord`].
//!
//! A [`frame::ContractCall`] groups the invocations of one transaction and
//! commits or reverts them together.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`abi`] | Solidity interface, selector routing and return encoding |
//! | [`auth`] | Call frames and key activation |
//! | [`config`] | Limits, legacy signature rules and feature flags |
//! | [`dispatch`] | Per-invocation pipeline |
//! | [`frame`] | Whole-call execution, snapshots and gas |
//! | [`precompile`] | revm adapter |
//!
//! ## Integration
//!
//! ```ignore
//! use hts_precompiles::{config::HtsConfig, precompile::HtsPrecompile, state::Ledger};
//!
//! let hts = HtsPrecompile::new(HtsConfig::from_env()?, Ledger::new());
//! hts.install(&mut precompiles);
//! ```

pub mod abi;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod frame;
pub mod gas;
pub mod ops;
pub mod policy;
pub mod precompile;
pub mod record;
pub mod state;

pub use config::HtsConfig;
pub use frame::{CallOutcome, ContractCall, HtsEngine};
pub use precompile::HtsPrecompile;
pub use state::Ledger;
