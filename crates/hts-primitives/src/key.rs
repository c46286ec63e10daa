//! Key structures guarding accounts and token administration, and the
//! signature map carried by a top-level transaction.

use crate::ids::ContractId;
use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};

/// A primitive public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "key", rename_all = "camelCase")]
pub enum PublicKey {
    /// 32-byte ED25519 public key.
    Ed25519(B256),
    /// Compressed (33-byte) ECDSA secp256k1 public key.
    EcdsaSecp256k1(Bytes),
}

impl PublicKey {
    /// Raw key bytes, used to match signature-map prefixes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(key) => key.as_slice(),
            Self::EcdsaSecp256k1(key) => key.as_ref(),
        }
    }
}

/// Key structure required to authorize an action.
///
/// Evaluated recursively; see `hts_precompiles::auth` for activation rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Key {
    /// A primitive key, satisfied by a full-prefix top-level signature.
    Simple {
        /// The public key.
        key: PublicKey,
    },
    /// Satisfied only by a direct call from this contract.
    ContractId {
        /// The contract.
        contract: ContractId,
    },
    /// Satisfied when this contract is anywhere in the call stack.
    DelegatableContractId {
        /// The contract.
        contract: ContractId,
    },
    /// Satisfied when at least `threshold` of `keys` are satisfied.
    Threshold {
        /// Number of keys that must be satisfied.
        threshold: u32,
        /// Candidate keys.
        keys: Vec<Key>,
    },
    /// Satisfied when every key is satisfied.
    List {
        /// Required keys.
        keys: Vec<Key>,
    },
}

impl Key {
    /// An ED25519 simple key.
    pub const fn ed25519(key: B256) -> Self {
        Self::Simple { key: PublicKey::Ed25519(key) }
    }

    /// A contract-id key.
    pub const fn contract(contract: ContractId) -> Self {
        Self::ContractId { contract }
    }

    /// A delegatable contract-id key.
    pub const fn delegatable(contract: ContractId) -> Self {
        Self::DelegatableContractId { contract }
    }

    /// An M-of-N threshold key.
    pub const fn threshold(threshold: u32, keys: Vec<Key>) -> Self {
        Self::Threshold { threshold, keys }
    }
}

/// One entry of a signature map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePair {
    /// Leading bytes of the signing public key.
    pub pub_key_prefix: Bytes,
    /// The signature. Cryptographic validity is established upstream.
    pub signature: Bytes,
}

/// Result of looking a public key up in a [`SignatureMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixMatch {
    /// An entry carries the complete public key.
    Full,
    /// Only a proper, non-empty prefix of the key was supplied.
    Partial,
    /// No entry references the key.
    None,
}

/// Signatures attached to the top-level transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureMap(pub Vec<SignaturePair>);

impl SignatureMap {
    /// Creates an empty map.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a full-prefix signature for `key`.
    pub fn with_full_prefix(mut self, key: &PublicKey, signature: Bytes) -> Self {
        self.0.push(SignaturePair {
            pub_key_prefix: Bytes::copy_from_slice(key.as_bytes()),
            signature,
        });
        self
    }

    /// Adds a signature whose prefix is the first `len` bytes of `key`.
    pub fn with_prefix(mut self, key: &PublicKey, len: usize, signature: Bytes) -> Self {
        let bytes = key.as_bytes();
        let len = len.min(bytes.len());
        self.0.push(SignaturePair {
            pub_key_prefix: Bytes::copy_from_slice(&bytes[..len]),
            signature,
        });
        self
    }

    /// Finds the best match for `key` among the entries.
    pub fn lookup(&self, key: &PublicKey) -> PrefixMatch {
        let bytes = key.as_bytes();
        let mut found = PrefixMatch::None;
        for pair in &self.0 {
            let prefix = pair.pub_key_prefix.as_ref();
            if pair.signature.is_empty() || prefix.is_empty() {
                continue;
            }
            if prefix == bytes {
                return PrefixMatch::Full;
            }
            if bytes.starts_with(prefix) {
                found = PrefixMatch::Partial;
            }
        }
        found
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
