//! Gas schedule and per-call gas meter.

use crate::ops::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gas charged up front for every contract call.
pub const DEFAULT_INTRINSIC_GAS: u64 = 21_000;

/// Floor of every state-changing operation, and the charge for no-op selectors.
pub const DEFAULT_PRECOMPILE_GAS: u64 = 10_000;

/// Flat charge for read-only functions.
pub const DEFAULT_VIEW_GAS: u64 = 100;

/// Linear cost of one operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationGas {
    /// Cost of the first element.
    pub base: u64,
    /// Cost of each further element.
    #[serde(default)]
    pub per_item: u64,
}

impl OperationGas {
    /// Creates a cost entry.
    pub const fn new(base: u64, per_item: u64) -> Self {
        Self { base, per_item }
    }
}

/// Gas charged by the system contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GasSchedule {
    /// Charged once per call before any invocation.
    pub intrinsic_gas: u64,
    /// Floor of every operation and the charge of ignored selectors.
    pub default_precompile_gas: u64,
    /// Charge of view functions.
    pub view_gas: u64,
    /// Per-operation costs. Kinds missing here cost the floor.
    pub operations: BTreeMap<OperationKind, OperationGas>,
}

impl Default for GasSchedule {
    fn default() -> Self {
        let operations = [
            (OperationKind::Associate, OperationGas::new(10_000, 2_500)),
            (OperationKind::Dissociate, OperationGas::new(10_000, 2_500)),
            (OperationKind::Mint, OperationGas::new(20_000, 5_000)),
            (OperationKind::Burn, OperationGas::new(20_000, 5_000)),
            (OperationKind::Wipe, OperationGas::new(15_000, 5_000)),
            (OperationKind::Freeze, OperationGas::new(10_000, 0)),
            (OperationKind::Unfreeze, OperationGas::new(10_000, 0)),
            (OperationKind::GrantKyc, OperationGas::new(10_000, 0)),
            (OperationKind::RevokeKyc, OperationGas::new(10_000, 0)),
            (OperationKind::Pause, OperationGas::new(10_000, 0)),
            (OperationKind::Unpause, OperationGas::new(10_000, 0)),
            (OperationKind::Airdrop, OperationGas::new(25_000, 5_000)),
            (OperationKind::UpdateFees, OperationGas::new(15_000, 2_000)),
            (OperationKind::Reject, OperationGas::new(20_000, 5_000)),
        ]
        .into_iter()
        .collect();
        Self {
            intrinsic_gas: DEFAULT_INTRINSIC_GAS,
            default_precompile_gas: DEFAULT_PRECOMPILE_GAS,
            view_gas: DEFAULT_VIEW_GAS,
            operations,
        }
    }
}

impl GasSchedule {
    /// Cost of `kind` touching `items` elements.
    ///
    /// State-changing operations cost `max(floor, base + per_item * (items - 1))`.
    pub fn operation_cost(&self, kind: OperationKind, items: usize) -> u64 {
        if kind.is_view() {
            return self.view_gas;
        }
        let Some(entry) = self.operations.get(&kind) else {
            return self.default_precompile_gas;
        };
        let extra = u64::try_from(items.saturating_sub(1)).unwrap_or(u64::MAX);
        entry.base.saturating_add(entry.per_item.saturating_mul(extra)).max(self.default_precompile_gas)
    }
}

/// Tracks the gas of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    /// A meter with nothing spent.
    pub const fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Gas still available.
    pub const fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Gas spent so far.
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// The limit the meter was created with.
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Records `cost`. Returns `false`, spending nothing, when it does not fit.
    #[must_use]
    pub const fn charge(&mut self, cost: u64) -> bool {
        if cost > self.remaining() {
            return false;
        }
        self.used += cost;
        true
    }

    /// Consumes everything that is left.
    pub const fn exhaust(&mut self) {
        self.used = self.limit;
    }
}
