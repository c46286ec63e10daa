//! Routing of one precompile invocation through decoding, prechecks, gas,
//! authorization and execution.

use crate::{
    abi::{self, DecodedInput},
    auth::{self, CallKind, Frame, KeyContext},
    config::HtsConfig,
    gas::GasMeter,
    ops::{Operation, OperationKind, TokenGate},
    policy::Check,
    record::{ChildRecord, ResultPayload, SideEffects},
    state::Ledger,
};
use alloy_primitives::Bytes;
use hts_primitives::{ResponseCode, SignatureMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Revert reason of a state-changing function reached in a static frame.
pub const STATIC_CALL_REVERT_REASON: &str = "static call to state-changing HTS function";

/// One call into the system contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecompileInvocation {
    /// Frames that reached the precompile, outermost first.
    #[serde(default)]
    pub stack: Vec<Frame>,
    /// How the precompile itself was called.
    #[serde(default)]
    pub kind: CallKind,
    /// Selector and ABI arguments.
    pub input: Bytes,
}

impl PrecompileInvocation {
    /// A direct call with `input` from the innermost frame of `stack`.
    pub fn call(stack: Vec<Frame>, input: impl Into<Bytes>) -> Self {
        Self { stack, kind: CallKind::Call, input: input.into() }
    }

    /// Whether the precompile runs in a read-only context.
    pub fn is_static(&self) -> bool {
        self.kind == CallKind::StaticCall
            || self.stack.iter().any(|frame| frame.kind == CallKind::StaticCall)
    }
}

/// Transaction-wide inputs shared by every invocation of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallEnv {
    /// Signatures of the top-level transaction.
    pub signatures: SignatureMap,
    /// Block the call executes in.
    pub block_number: u64,
}

/// Exceptional halt of the system contract. Consumes all gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HaltReason {
    /// A known selector with undecodable arguments.
    ErrorDecodingPrecompileInput,
    /// The function is disabled by configuration.
    NotSupported,
    /// The precompile was reached through `delegatecall`.
    InvalidDelegate,
    /// Not enough gas left to run the operation.
    InsufficientGas,
}

impl HaltReason {
    /// Protocol name of the halt.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ErrorDecodingPrecompileInput => "ERROR_DECODING_PRECOMPILE_INPUT",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::InvalidDelegate => "INVALID_DELEGATE",
            Self::InsufficientGas => "INSUFFICIENT_GAS",
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Unknown or short selector. Nothing ran and no record was written.
    Ignored,
    /// The system contract halted.
    Halted(HaltReason),
    /// A state-changing function was called in a static frame.
    StaticRevert,
    /// An operation was attempted. Its record carries the outcome.
    Executed(ChildRecord),
}

impl Dispatched {
    /// Whether the enclosing call may continue.
    pub const fn is_success(&self) -> bool {
        match self {
            Self::Ignored => true,
            Self::Executed(record) => record.is_success(),
            Self::Halted(_) | Self::StaticRevert => false,
        }
    }
}

/// Runs `invocation` against `ledger`, charging `meter`.
///
/// Halts exhaust the meter. The ledger may be left partially updated when the
/// returned outcome is not a success; callers roll it back.
pub fn dispatch(
    ledger: &mut Ledger,
    config: &HtsConfig,
    env: &CallEnv,
    invocation: &PrecompileInvocation,
    meter: &mut GasMeter,
) -> Dispatched {
    if invocation.kind == CallKind::DelegateCall {
        tracing::debug!(target: "hts::dispatch", "system contract reached through delegatecall");
        meter.exhaust();
        return Dispatched::Halted(HaltReason::InvalidDelegate);
    }

    let op = match abi::decode_input(&invocation.input) {
        DecodedInput::Unrecognized => {
            tracing::trace!(target: "hts::dispatch", len = invocation.input.len(), "ignoring unknown selector");
            if !meter.charge(config.gas.default_precompile_gas) {
                meter.exhaust();
                return Dispatched::Halted(HaltReason::InsufficientGas);
            }
            return Dispatched::Ignored;
        }
        DecodedInput::Malformed(err) => {
            tracing::debug!(target: "hts::dispatch", %err, "undecodable arguments");
            meter.exhaust();
            return Dispatched::Halted(HaltReason::ErrorDecodingPrecompileInput);
        }
        DecodedInput::Call(op) => op,
    };
    let kind = op.kind();

    if !config.features.enabled(kind) {
        tracing::debug!(target: "hts::dispatch", %kind, "function disabled");
        meter.exhaust();
        return Dispatched::Halted(HaltReason::NotSupported);
    }

    if !kind.is_view() && invocation.is_static() {
        tracing::debug!(target: "hts::dispatch", %kind, "state change in static frame");
        return Dispatched::StaticRevert;
    }

    if let Err(status) = op.precheck(config) {
        tracing::debug!(target: "hts::dispatch", %kind, %status, "precheck failed");
        return Dispatched::Executed(ChildRecord::failure(kind, status, 0));
    }

    let cost = config.gas.operation_cost(kind, op.item_count());
    if !meter.charge(cost) {
        let remaining = meter.remaining();
        tracing::debug!(target: "hts::dispatch", %kind, cost, remaining, "insufficient gas");
        meter.exhaust();
        return Dispatched::Executed(ChildRecord::failure(kind, ResponseCode::InsufficientGas, remaining));
    }

    let record = match run(ledger, config, env, invocation, &op) {
        Ok((result, effects)) => ChildRecord::success(kind, result, effects, cost),
        Err(status) => {
            tracing::debug!(target: "hts::dispatch", %kind, %status, "operation failed");
            ChildRecord::failure(kind, status, cost)
        }
    };
    Dispatched::Executed(record)
}

fn run(
    ledger: &mut Ledger,
    config: &HtsConfig,
    env: &CallEnv,
    invocation: &PrecompileInvocation,
    op: &Operation,
) -> Result<(ResultPayload, SideEffects), ResponseCode> {
    let kind = op.kind();
    let consult_signatures = config.legacy_signatures.permits(
        kind,
        env.block_number,
        invocation.stack.last().map(|frame| frame.contract),
    );
    let ctx = KeyContext::new(&invocation.stack, &env.signatures, consult_signatures);

    if let Some(gate) = op.token_gate() {
        check_token_gate(ledger, config, &ctx, kind, gate)?;
    }

    for signer in op.signers() {
        let account = ledger
            .resolve_account(signer.account)
            .and_then(|id| ledger.account(id))
            .ok_or(signer.unresolved)?;
        auth::authorize(account.key.as_ref(), &ctx, kind)?;
    }

    let mut effects = SideEffects::default();
    let result = op.execute(ledger, config, &mut effects)?;
    Ok((result, effects))
}

/// Resolves the gated token and runs the configured checks in order.
fn check_token_gate(
    ledger: &Ledger,
    config: &HtsConfig,
    ctx: &KeyContext<'_>,
    kind: OperationKind,
    gate: TokenGate,
) -> Result<(), ResponseCode> {
    let token = ledger
        .resolve_token(gate.token)
        .and_then(|id| ledger.token(id))
        .ok_or(ResponseCode::InvalidTokenId)?;
    let key = token.keys.get(gate.role);
    for check in config.check_order.order(kind) {
        match check {
            Check::TokenDeleted if token.deleted => return Err(ResponseCode::TokenWasDeleted),
            Check::KeyPresent if key.is_none() => return Err(gate.role.missing_status()),
            // An absent key is reported by `KeyPresent`.
            Check::Signature if key.is_some() => auth::authorize(key, ctx, kind)?,
            _ => {}
        }
    }
    Ok(())
}
