//! Primitive types shared by the HTS system-contract engine: entity ids,
//! key structures, signature maps and response codes.

pub mod ids;
pub mod key;
pub mod status;

pub use ids::{AccountId, ContractId, EntityIdParseError, NftId, TokenId};
pub use key::{Key, PrefixMatch, PublicKey, SignatureMap, SignaturePair};
pub use status::ResponseCode;
