//! Key activation for system contract calls.
//!
//! A [`Key`] is evaluated against the [`KeyContext`] of one precompile
//! invocation: the frames that reached the precompile and the signatures of
//! the top-level transaction.
//!
//! | Key | Satisfied when |
//! |-----|----------------|
//! | simple | a full-prefix signature is present and top-level signatures may be consulted |
//! | contract id | the frame calling the precompile is a non-delegate frame of that contract |
//! | delegatable contract id | that contract is the storage context of any frame |
//! | threshold `M` of `N` | at least `M` components are satisfied, `M` clamped into `[1, N]` |
//! | list | every component is satisfied |

use crate::ops::OperationKind;
use hts_primitives::{ContractId, Key, PrefixMatch, ResponseCode, SignatureMap};
use serde::{Deserialize, Serialize};

/// How a frame was entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallKind {
    /// `CALL`: runs the callee in its own storage context.
    #[default]
    Call,
    /// `DELEGATECALL`: runs the callee's code in the caller's storage context.
    DelegateCall,
    /// `STATICCALL`: read-only call.
    StaticCall,
}

/// One EVM frame on the way to the precompile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Contract whose storage the frame runs in.
    pub contract: ContractId,
    /// Contract whose code runs. Defaults to `contract`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ContractId>,
    /// How the frame was entered.
    #[serde(default)]
    pub kind: CallKind,
}

impl Frame {
    /// A direct call into `contract`.
    pub const fn call(contract: ContractId) -> Self {
        Self { contract, code: None, kind: CallKind::Call }
    }

    /// `code` delegate-called from `contract`, running in its storage.
    pub const fn delegate(contract: ContractId, code: ContractId) -> Self {
        Self { contract, code: Some(code), kind: CallKind::DelegateCall }
    }

    /// A static call into `contract`.
    pub const fn static_call(contract: ContractId) -> Self {
        Self { contract, code: None, kind: CallKind::StaticCall }
    }

    /// Contract whose code runs in this frame.
    pub fn code(&self) -> ContractId {
        self.code.unwrap_or(self.contract)
    }
}

/// Everything key activation may look at.
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    /// Frames that reached the precompile, outermost first.
    pub stack: &'a [Frame],
    /// Signatures of the top-level transaction.
    pub signatures: &'a SignatureMap,
    /// Whether top-level signatures may satisfy simple keys.
    pub consult_signatures: bool,
}

impl<'a> KeyContext<'a> {
    /// Creates a context.
    pub const fn new(stack: &'a [Frame], signatures: &'a SignatureMap, consult_signatures: bool) -> Self {
        Self { stack, signatures, consult_signatures }
    }

    /// Contract of the frame that called the precompile.
    pub fn calling_contract(&self) -> Option<ContractId> {
        self.stack.last().map(|frame| frame.contract)
    }
}

/// Result of evaluating a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The key is satisfied.
    Satisfied,
    /// The key is not satisfied.
    Unsatisfied,
    /// Not satisfied, and a partial-prefix signature was the closest match.
    PartialPrefix,
}

impl Activation {
    /// Returns true for [`Activation::Satisfied`].
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Evaluates `key` in `ctx`.
pub fn evaluate(key: &Key, ctx: &KeyContext<'_>) -> Activation {
    match key {
        Key::Simple { key } => match ctx.signatures.lookup(key) {
            PrefixMatch::Full if ctx.consult_signatures => Activation::Satisfied,
            PrefixMatch::Full | PrefixMatch::None => Activation::Unsatisfied,
            PrefixMatch::Partial => Activation::PartialPrefix,
        },
        Key::ContractId { contract } => {
            let direct = ctx
                .stack
                .last()
                .is_some_and(|frame| frame.kind != CallKind::DelegateCall && frame.contract == *contract);
            activation(direct)
        }
        Key::DelegatableContractId { contract } => {
            activation(ctx.stack.iter().any(|frame| frame.contract == *contract))
        }
        Key::Threshold { threshold, keys } => {
            let required = usize::try_from(*threshold).unwrap_or(usize::MAX);
            evaluate_threshold(required, keys, ctx)
        }
        Key::List { keys } => evaluate_threshold(keys.len(), keys, ctx),
    }
}

fn evaluate_threshold(required: usize, keys: &[Key], ctx: &KeyContext<'_>) -> Activation {
    if keys.is_empty() {
        return Activation::Unsatisfied;
    }
    let required = required.clamp(1, keys.len());
    let mut satisfied = 0;
    let mut partial = false;
    for key in keys {
        match evaluate(key, ctx) {
            Activation::Satisfied => {
                satisfied += 1;
                if satisfied >= required {
                    return Activation::Satisfied;
                }
            }
            Activation::PartialPrefix => partial = true,
            Activation::Unsatisfied => {}
        }
    }
    if partial {
        Activation::PartialPrefix
    } else {
        Activation::Unsatisfied
    }
}

const fn activation(satisfied: bool) -> Activation {
    if satisfied {
        Activation::Satisfied
    } else {
        Activation::Unsatisfied
    }
}

/// Authorizes `kind` against `key`.
///
/// An absent key can never be satisfied. A failure caused by a partial-prefix
/// signature always reports `INVALID_FULL_PREFIX_SIGNATURE_FOR_PRECOMPILE`.
/// Any other failure reports the operation's own signature status.
pub fn authorize(key: Option<&Key>, ctx: &KeyContext<'_>, kind: OperationKind) -> Result<(), ResponseCode> {
    let activation = key.map_or(Activation::Unsatisfied, |key| evaluate(key, ctx));
    match activation {
        Activation::Satisfied => {
            tracing::trace!(target: "hts::auth", %kind, "key satisfied");
            Ok(())
        }
        Activation::PartialPrefix => {
            tracing::debug!(target: "hts::auth", %kind, "only a partial-prefix signature matched");
            Err(ResponseCode::InvalidFullPrefixSignatureForPrecompile)
        }
        Activation::Unsatisfied => {
            tracing::debug!(
                target: "hts::auth",
                %kind,
                caller = ?ctx.calling_contract(),
                consult_signatures = ctx.consult_signatures,
                "key not satisfied"
            );
            Err(kind.signature_failure())
        }
    }
}
