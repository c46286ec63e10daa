//! Entity identifiers and their long-zero EVM address form.
//!
//! Accounts, tokens and contracts are addressed as `0.0.N`. Inside the EVM the
//! same entity is the address made of twelve zero bytes followed by the
//! big-endian entity number. Any other address does not name an entity.

use alloy_primitives::Address;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Length of the zero prefix of a long-zero address.
const LONG_ZERO_PREFIX: usize = 12;

/// Returns the entity number encoded in a long-zero address.
pub fn entity_num_from_address(address: Address) -> Option<u64> {
    let bytes = address.as_slice();
    if bytes[..LONG_ZERO_PREFIX].iter().any(|b| *b != 0) {
        return None;
    }
    let mut num = [0u8; 8];
    num.copy_from_slice(&bytes[LONG_ZERO_PREFIX..]);
    Some(u64::from_be_bytes(num))
}

/// Builds the long-zero address of an entity number.
pub fn address_from_entity_num(num: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[LONG_ZERO_PREFIX..].copy_from_slice(&num.to_be_bytes());
    Address::from(bytes)
}

/// Failure to parse an entity id from its `0.0.N` form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid entity id `{0}`, expected `0.0.N` or a long-zero address")]
pub struct EntityIdParseError(String);

fn parse_entity_num(raw: &str) -> Result<u64, EntityIdParseError> {
    let raw = raw.trim();
    let err = || EntityIdParseError(raw.to_string());

    if raw.starts_with("0x") {
        let address = Address::from_str(raw).map_err(|_| err())?;
        return entity_num_from_address(address).ok_or_else(err);
    }

    let mut parts = raw.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("0"), Some("0"), Some(num), None) => num.parse().map_err(|_| err()),
        (Some(num), None, None, None) => num.parse().map_err(|_| err()),
        _ => Err(err()),
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Creates the id from its entity number.
            pub const fn new(num: u64) -> Self {
                Self(num)
            }

            /// Returns the entity number.
            pub const fn num(&self) -> u64 {
                self.0
            }

            /// Returns the long-zero EVM address of this entity.
            pub fn to_address(&self) -> Address {
                address_from_entity_num(self.0)
            }

            /// Resolves a long-zero address into an id.
            pub fn from_address(address: Address) -> Option<Self> {
                entity_num_from_address(address).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0.0.{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_entity_num(s).map(Self)
            }
        }

        impl From<$name> for Address {
            fn from(id: $name) -> Self {
                id.to_address()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

entity_id!(
    /// Identifier of an account (`0.0.N`).
    AccountId
);
entity_id!(
    /// Identifier of a token (`0.0.N`).
    TokenId
);
entity_id!(
    /// Identifier of a smart contract (`0.0.N`).
    ///
    /// Every contract also owns the account with the same number.
    ContractId
);

impl ContractId {
    /// The account backing this contract.
    pub const fn account(&self) -> AccountId {
        AccountId(self.0)
    }
}

impl AccountId {
    /// Interprets this account as a contract with the same number.
    pub const fn as_contract(&self) -> ContractId {
        ContractId(self.0)
    }
}

/// A single non-fungible token instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NftId {
    /// Token the serial belongs to.
    pub token: TokenId,
    /// Serial number, starting at 1.
    pub serial: i64,
}

impl NftId {
    /// Creates a new NFT id.
    pub const fn new(token: TokenId, serial: i64) -> Self {
        Self { token, serial }
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.token, self.serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn long_zero_round_trip() {
        let id = TokenId::new(1001);
        let addr = id.to_address();
        assert_eq!(addr, address!("0x00000000000000000000000000000000000003e9"));
        assert_eq!(TokenId::from_address(addr), Some(id));
    }

    #[test]
    fn evm_native_address_is_not_an_entity() {
        let addr = address!("0x1000000000000000000000000000000000000001");
        assert_eq!(AccountId::from_address(addr), None);
    }

    #[test]
    fn parses_dotted_and_hex_forms() {
        assert_eq!("0.0.42".parse::<AccountId>().unwrap(), AccountId(42));
        assert_eq!("42".parse::<AccountId>().unwrap(), AccountId(42));
        assert_eq!(
            "0x000000000000000000000000000000000000002a".parse::<ContractId>().unwrap(),
            ContractId(42)
        );
        assert!("1.0.42".parse::<AccountId>().is_err());
        assert!("0.0.x".parse::<AccountId>().is_err());
    }

    #[test]
    fn serializes_as_dotted_string() {
        let json = serde_json::to_string(&TokenId(7)).unwrap();
        assert_eq!(json, "\"0.0.7\"");
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TokenId(7));
    }
}
