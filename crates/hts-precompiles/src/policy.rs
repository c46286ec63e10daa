//! Order of the token checks that precede execution.
//!
//! Token-keyed operations run three checks after resolving the token: that it
//! is not deleted, that it carries the key the operation needs, and that the
//! key is satisfied. Which failure wins when several apply is a per-operation
//! table. Token existence is always checked first and is not part of it.

use crate::ops::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// One reorderable check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Check {
    /// `TOKEN_WAS_DELETED`.
    TokenDeleted,
    /// `TOKEN_HAS_NO_*_KEY`.
    KeyPresent,
    /// Key activation.
    Signature,
}

/// Order used when an operation has no override.
pub const DEFAULT_CHECK_ORDER: [Check; 3] = [Check::TokenDeleted, Check::KeyPresent, Check::Signature];

/// An order that does not list each check exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("check order for {operation} must list TokenDeleted, KeyPresent and Signature once each, got {order:?}")]
pub struct InvalidCheckOrder {
    /// Operation the order was given for, or `default`.
    pub operation: String,
    /// The rejected order.
    pub order: Vec<Check>,
}

/// Per-operation check order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckOrderPolicy {
    /// Order for operations without an override.
    pub default: Vec<Check>,
    /// Orders for specific operations.
    pub overrides: BTreeMap<OperationKind, Vec<Check>>,
}

impl Default for CheckOrderPolicy {
    fn default() -> Self {
        Self { default: DEFAULT_CHECK_ORDER.to_vec(), overrides: BTreeMap::new() }
    }
}

impl CheckOrderPolicy {
    /// The order applied to `kind`.
    pub fn order(&self, kind: OperationKind) -> &[Check] {
        self.overrides.get(&kind).unwrap_or(&self.default)
    }

    /// Overrides the order of one operation.
    pub fn with_order(mut self, kind: OperationKind, order: impl Into<Vec<Check>>) -> Self {
        self.overrides.insert(kind, order.into());
        self
    }

    /// Ensures every order is a permutation of the three checks.
    pub fn validate(&self) -> Result<(), InvalidCheckOrder> {
        let entries = std::iter::once(("default".to_string(), &self.default))
            .chain(self.overrides.iter().map(|(kind, order)| (kind.to_string(), order)));
        for (operation, order) in entries {
            let complete = order.len() == DEFAULT_CHECK_ORDER.len()
                && DEFAULT_CHECK_ORDER.iter().all(|check| order.contains(check));
            if !complete {
                return Err(InvalidCheckOrder { operation, order: order.clone() });
            }
        }
        Ok(())
    }
}
