//! Execution of whole contract calls.
//!
//! A [`ContractCall`] carries every system-contract invocation one top-level
//! transaction makes. [`HtsEngine::execute`] runs them in order against a
//! snapshot of the ledger and either commits all of their effects or none.

use crate::{
    config::HtsConfig,
    dispatch::{self, CallEnv, Dispatched, HaltReason, PrecompileInvocation, STATIC_CALL_REVERT_REASON},
    gas::GasMeter,
    record::ChildRecord,
    state::Ledger,
};
use alloy_primitives::Bytes;
use hts_primitives::{AccountId, ResponseCode, SignatureMap};
use serde::{Deserialize, Serialize};

/// Lifecycle of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FramePhase {
    /// Not started. Calls rejected before execution stay here.
    Pending,
    /// Invocations are running against a snapshot.
    Executing,
    /// Every effect was kept.
    Committed,
    /// The snapshot was restored.
    Reverted,
}

/// A contract call reaching the system contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    /// Account paying for the transaction.
    pub payer: AccountId,
    /// Gas available to the whole call.
    pub gas_limit: u64,
    /// Signatures of the top-level transaction.
    #[serde(default)]
    pub signatures: SignatureMap,
    /// Block the call executes in.
    #[serde(default)]
    pub block_number: u64,
    /// System-contract invocations in execution order.
    #[serde(default)]
    pub invocations: Vec<PrecompileInvocation>,
}

/// Result of [`HtsEngine::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    /// `SUCCESS`, `CONTRACT_REVERT_EXECUTED` or `INSUFFICIENT_GAS`.
    pub status: ResponseCode,
    /// Gas charged to the payer.
    pub gas_used: u64,
    /// One record per attempted operation, in invocation order.
    pub child_records: Vec<ChildRecord>,
    /// Return data of each invocation that ran.
    pub outputs: Vec<Bytes>,
    /// Set when the system contract halted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<HaltReason>,
    /// Set when the call reverted with a reason string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    /// Final phase of the call.
    pub phase: FramePhase,
}

impl CallOutcome {
    /// Whether the call committed.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Outcome of a single invocation run through [`HtsEngine::invoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// What the dispatcher did.
    pub dispatched: Dispatched,
    /// Gas charged for the invocation.
    pub gas_used: u64,
}

/// The system contract together with the ledger it administers.
#[derive(Debug, Clone, Default)]
pub struct HtsEngine {
    config: HtsConfig,
    ledger: Ledger,
}

impl HtsEngine {
    /// Creates an engine over `ledger`.
    pub const fn new(config: HtsConfig, ledger: Ledger) -> Self {
        Self { config, ledger }
    }

    /// Active configuration.
    pub const fn config(&self) -> &HtsConfig {
        &self.config
    }

    /// Current ledger state.
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Mutable access to the ledger, for seeding state.
    pub const fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Consumes the engine, returning the ledger.
    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Runs `call` and commits or reverts it as a whole.
    pub fn execute(&mut self, call: &ContractCall) -> CallOutcome {
        let intrinsic = self.config.gas.intrinsic_gas;
        if call.gas_limit < intrinsic {
            tracing::debug!(target: "hts::frame", gas_limit = call.gas_limit, intrinsic, "call below intrinsic gas");
            return CallOutcome {
                status: ResponseCode::InsufficientGas,
                gas_used: 0,
                child_records: Vec::new(),
                outputs: Vec::new(),
                halt_reason: None,
                revert_reason: None,
                phase: FramePhase::Pending,
            };
        }

        let mut meter = GasMeter::new(call.gas_limit);
        let charged = meter.charge(intrinsic);
        debug_assert!(charged, "intrinsic gas is checked against the limit above");

        let env = CallEnv { signatures: call.signatures.clone(), block_number: call.block_number };
        let snapshot = self.ledger.clone();
        let mut phase = FramePhase::Executing;
        let mut child_records = Vec::new();
        let mut outputs = Vec::new();
        let mut halt_reason = None;
        let mut revert_reason = None;

        for (index, invocation) in call.invocations.iter().enumerate() {
            match dispatch::dispatch(&mut self.ledger, &self.config, &env, invocation, &mut meter) {
                Dispatched::Ignored => outputs.push(Bytes::new()),
                Dispatched::Executed(record) => {
                    let success = record.is_success();
                    outputs.push(record.output.clone());
                    child_records.push(record);
                    if !success {
                        phase = FramePhase::Reverted;
                    }
                }
                Dispatched::Halted(reason) => {
                    halt_reason = Some(reason);
                    phase = FramePhase::Reverted;
                }
                Dispatched::StaticRevert => {
                    revert_reason = Some(STATIC_CALL_REVERT_REASON.to_string());
                    phase = FramePhase::Reverted;
                }
            }
            if phase == FramePhase::Reverted {
                tracing::debug!(target: "hts::frame", index, "invocation failed, skipping the rest");
                break;
            }
        }

        let status = if phase == FramePhase::Reverted {
            self.ledger = snapshot;
            ResponseCode::ContractRevertExecuted
        } else {
            phase = FramePhase::Committed;
            ResponseCode::Success
        };
        tracing::info!(
            target: "hts::frame",
            payer = %call.payer,
            %status,
            gas_used = meter.used(),
            records = child_records.len(),
            "call finished"
        );

        CallOutcome {
            status,
            gas_used: meter.used(),
            child_records,
            outputs,
            halt_reason,
            revert_reason,
            phase,
        }
    }

    /// Runs one invocation with `gas_limit` and no intrinsic charge, keeping
    /// its effects only when it succeeds.
    pub fn invoke(&mut self, env: &CallEnv, invocation: &PrecompileInvocation, gas_limit: u64) -> InvocationOutcome {
        invoke_with(&self.config, &mut self.ledger, env, invocation, gas_limit)
    }

    /// Like [`HtsEngine::invoke`], but against a working copy of the ledger.
    pub fn invoke_on(
        &self,
        ledger: &mut Ledger,
        env: &CallEnv,
        invocation: &PrecompileInvocation,
        gas_limit: u64,
    ) -> InvocationOutcome {
        invoke_with(&self.config, ledger, env, invocation, gas_limit)
    }

    /// Replaces the ledger with a working copy built by [`HtsEngine::invoke_on`].
    pub fn commit(&mut self, ledger: Ledger) {
        self.ledger = ledger;
    }
}

fn invoke_with(
    config: &HtsConfig,
    ledger: &mut Ledger,
    env: &CallEnv,
    invocation: &PrecompileInvocation,
    gas_limit: u64,
) -> InvocationOutcome {
    let mut meter = GasMeter::new(gas_limit);
    let snapshot = ledger.clone();
    let dispatched = dispatch::dispatch(ledger, config, env, invocation, &mut meter);
    if !dispatched.is_success() {
        *ledger = snapshot;
    }
    InvocationOutcome { dispatched, gas_used: meter.used() }
}
