//! Operation executors.
//!
//! Each executor is a state transition over the [`Ledger`]: it either applies
//! its effects and reports them through [`SideEffects`], or fails with the
//! [`ResponseCode`] describing the first violated rule. Authorization happens
//! before an executor runs; see [`crate::dispatch`].

mod airdrop;
mod association;
mod fees;
mod flags;
mod reject;
mod supply;
mod views;

use crate::{
    abi::IHederaTokenService::{FixedFee, FractionalFee, RoyaltyFee, TokenTransferList},
    config::HtsConfig,
    record::{ResultPayload, SideEffects},
    state::{KeyRole, Ledger, Token},
};
use alloy_primitives::{Address, Bytes};
use hts_primitives::{AccountId, ResponseCode, TokenId};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Kind of token service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    /// Associate tokens with an account.
    Associate,
    /// Dissociate tokens from an account.
    Dissociate,
    /// Mint fungible units or NFT serials.
    Mint,
    /// Burn treasury-held units or serials.
    Burn,
    /// Wipe units or serials from an account.
    Wipe,
    /// Freeze an account's relationship.
    Freeze,
    /// Unfreeze an account's relationship.
    Unfreeze,
    /// Grant KYC.
    GrantKyc,
    /// Revoke KYC.
    RevokeKyc,
    /// Pause a token.
    Pause,
    /// Unpause a token.
    Unpause,
    /// Airdrop fungible units and NFTs.
    Airdrop,
    /// Replace the custom fee schedule.
    UpdateFees,
    /// Return holdings to the treasury.
    Reject,
    /// `isFrozen` view.
    IsFrozen,
    /// `isKyc` view.
    IsKyc,
    /// `isToken` view.
    IsToken,
    /// `getTokenType` view.
    GetTokenType,
    /// `getTokenExpiryInfo` view.
    GetTokenExpiryInfo,
    /// `getTokenDefaultFreezeStatus` view.
    GetTokenDefaultFreezeStatus,
    /// `getTokenDefaultKycStatus` view.
    GetTokenDefaultKycStatus,
}

impl OperationKind {
    /// Every operation kind.
    pub const ALL: [Self; 21] = [
        Self::Associate,
        Self::Dissociate,
        Self::Mint,
        Self::Burn,
        Self::Wipe,
        Self::Freeze,
        Self::Unfreeze,
        Self::GrantKyc,
        Self::RevokeKyc,
        Self::Pause,
        Self::Unpause,
        Self::Airdrop,
        Self::UpdateFees,
        Self::Reject,
        Self::IsFrozen,
        Self::IsKyc,
        Self::IsToken,
        Self::GetTokenType,
        Self::GetTokenExpiryInfo,
        Self::GetTokenDefaultFreezeStatus,
        Self::GetTokenDefaultKycStatus,
    ];

    /// HAPI functionality name, as used in `allowSystemUseOfHapiSigs`.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Associate => "TokenAssociateToAccount",
            Self::Dissociate => "TokenDissociateFromAccount",
            Self::Mint => "TokenMint",
            Self::Burn => "TokenBurn",
            Self::Wipe => "TokenAccountWipe",
            Self::Freeze => "TokenFreezeAccount",
            Self::Unfreeze => "TokenUnfreezeAccount",
            Self::GrantKyc => "TokenGrantKycToAccount",
            Self::RevokeKyc => "TokenRevokeKycFromAccount",
            Self::Pause => "TokenPause",
            Self::Unpause => "TokenUnpause",
            Self::Airdrop => "TokenAirdrop",
            Self::UpdateFees => "TokenFeeScheduleUpdate",
            Self::Reject => "TokenReject",
            Self::IsFrozen => "isFrozen",
            Self::IsKyc => "isKyc",
            Self::IsToken => "isToken",
            Self::GetTokenType => "getTokenType",
            Self::GetTokenExpiryInfo => "getTokenExpiryInfo",
            Self::GetTokenDefaultFreezeStatus => "getTokenDefaultFreezeStatus",
            Self::GetTokenDefaultKycStatus => "getTokenDefaultKycStatus",
        }
    }

    /// Read-only operations, allowed in static frames.
    pub const fn is_view(&self) -> bool {
        matches!(
            self,
            Self::IsFrozen
                | Self::IsKyc
                | Self::IsToken
                | Self::GetTokenType
                | Self::GetTokenExpiryInfo
                | Self::GetTokenDefaultFreezeStatus
                | Self::GetTokenDefaultKycStatus
        )
    }

    /// Status reported when a required key is not satisfied.
    ///
    /// Operations guarded by a token administration key report
    /// `INVALID_SIGNATURE`. Operations guarded by account keys or the supply
    /// key report `INVALID_FULL_PREFIX_SIGNATURE_FOR_PRECOMPILE`.
    pub const fn signature_failure(&self) -> ResponseCode {
        match self {
            Self::Wipe
            | Self::Freeze
            | Self::Unfreeze
            | Self::GrantKyc
            | Self::RevokeKyc
            | Self::Pause
            | Self::Unpause
            | Self::UpdateFees => ResponseCode::InvalidSignature,
            _ => ResponseCode::InvalidFullPrefixSignatureForPrecompile,
        }
    }

    /// Token key role guarding this operation, if any.
    pub const fn key_role(&self) -> Option<KeyRole> {
        match self {
            Self::Mint | Self::Burn => Some(KeyRole::Supply),
            Self::Wipe => Some(KeyRole::Wipe),
            Self::Freeze | Self::Unfreeze => Some(KeyRole::Freeze),
            Self::GrantKyc | Self::RevokeKyc => Some(KeyRole::Kyc),
            Self::Pause | Self::Unpause => Some(KeyRole::Pause),
            Self::UpdateFees => Some(KeyRole::FeeSchedule),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation `{0}`")]
pub struct UnknownOperation(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

impl Serialize for OperationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for OperationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Token whose administration key guards an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGate {
    /// Token address as passed by the caller.
    pub token: Address,
    /// Key role that must be satisfied.
    pub role: KeyRole,
}

/// Account whose key must be satisfied, and the status to report when the
/// address does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    /// Account address as passed by the caller.
    pub account: Address,
    /// Status when the address is not a live account.
    pub unresolved: ResponseCode,
}

/// A decoded token service call.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Operation {
    Associate { account: Address, tokens: Vec<Address> },
    Dissociate { account: Address, tokens: Vec<Address> },
    Mint { token: Address, amount: i64, metadata: Vec<Bytes> },
    Burn { token: Address, amount: i64, serials: Vec<i64> },
    WipeFungible { token: Address, account: Address, amount: i64 },
    WipeNft { token: Address, account: Address, serials: Vec<i64> },
    Freeze { token: Address, account: Address },
    Unfreeze { token: Address, account: Address },
    GrantKyc { token: Address, account: Address },
    RevokeKyc { token: Address, account: Address },
    Pause { token: Address },
    Unpause { token: Address },
    Airdrop { transfers: Vec<TokenTransferList> },
    UpdateFungibleFees { token: Address, fixed: Vec<FixedFee>, fractional: Vec<FractionalFee> },
    UpdateNftFees { token: Address, fixed: Vec<FixedFee>, royalty: Vec<RoyaltyFee> },
    Reject { owner: Address, fungible: Vec<Address>, nfts: Vec<(Address, i64)> },
    IsFrozen { token: Address, account: Address },
    IsKyc { token: Address, account: Address },
    IsToken { token: Address },
    GetTokenType { token: Address },
    GetTokenExpiryInfo { token: Address },
    GetTokenDefaultFreezeStatus { token: Address },
    GetTokenDefaultKycStatus { token: Address },
}

impl Operation {
    /// The operation kind.
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Associate { .. } => OperationKind::Associate,
            Self::Dissociate { .. } => OperationKind::Dissociate,
            Self::Mint { .. } => OperationKind::Mint,
            Self::Burn { .. } => OperationKind::Burn,
            Self::WipeFungible { .. } | Self::WipeNft { .. } => OperationKind::Wipe,
            Self::Freeze { .. } => OperationKind::Freeze,
            Self::Unfreeze { .. } => OperationKind::Unfreeze,
            Self::GrantKyc { .. } => OperationKind::GrantKyc,
            Self::RevokeKyc { .. } => OperationKind::RevokeKyc,
            Self::Pause { .. } => OperationKind::Pause,
            Self::Unpause { .. } => OperationKind::Unpause,
            Self::Airdrop { .. } => OperationKind::Airdrop,
            Self::UpdateFungibleFees { .. } | Self::UpdateNftFees { .. } => {
                OperationKind::UpdateFees
            }
            Self::Reject { .. } => OperationKind::Reject,
            Self::IsFrozen { .. } => OperationKind::IsFrozen,
            Self::IsKyc { .. } => OperationKind::IsKyc,
            Self::IsToken { .. } => OperationKind::IsToken,
            Self::GetTokenType { .. } => OperationKind::GetTokenType,
            Self::GetTokenExpiryInfo { .. } => OperationKind::GetTokenExpiryInfo,
            Self::GetTokenDefaultFreezeStatus { .. } => OperationKind::GetTokenDefaultFreezeStatus,
            Self::GetTokenDefaultKycStatus { .. } => OperationKind::GetTokenDefaultKycStatus,
        }
    }

    /// Number of elements the operation touches, used for gas metering.
    pub fn item_count(&self) -> usize {
        let count = match self {
            Self::Associate { tokens, .. } | Self::Dissociate { tokens, .. } => tokens.len(),
            Self::Mint { metadata, .. } => metadata.len(),
            Self::Burn { serials, .. } | Self::WipeNft { serials, .. } => serials.len(),
            Self::Airdrop { transfers } => airdrop::credit_count(transfers),
            Self::UpdateFungibleFees { fixed, fractional, .. } => fixed.len() + fractional.len(),
            Self::UpdateNftFees { fixed, royalty, .. } => fixed.len() + royalty.len(),
            Self::Reject { fungible, nfts, .. } => fungible.len() + nfts.len(),
            _ => 1,
        };
        count.max(1)
    }

    /// Token administration key this operation must satisfy.
    pub fn token_gate(&self) -> Option<TokenGate> {
        let role = self.kind().key_role()?;
        let token = match self {
            Self::Mint { token, .. }
            | Self::Burn { token, .. }
            | Self::WipeFungible { token, .. }
            | Self::WipeNft { token, .. }
            | Self::Freeze { token, .. }
            | Self::Unfreeze { token, .. }
            | Self::GrantKyc { token, .. }
            | Self::RevokeKyc { token, .. }
            | Self::Pause { token }
            | Self::Unpause { token }
            | Self::UpdateFungibleFees { token, .. }
            | Self::UpdateNftFees { token, .. } => *token,
            _ => return None,
        };
        Some(TokenGate { token, role })
    }

    /// Accounts whose keys must be satisfied, in evaluation order.
    pub fn signers(&self) -> Vec<Signer> {
        match self {
            Self::Associate { account, .. } | Self::Dissociate { account, .. } => {
                vec![Signer { account: *account, unresolved: ResponseCode::InvalidAccountId }]
            }
            Self::Reject { owner, .. } => {
                vec![Signer { account: *owner, unresolved: ResponseCode::InvalidOwnerId }]
            }
            Self::Airdrop { transfers } => airdrop::senders(transfers)
                .into_iter()
                .map(|account| Signer { account, unresolved: ResponseCode::InvalidAccountId })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Shape checks that run before any gas is metered.
    pub fn precheck(&self, config: &HtsConfig) -> Result<(), ResponseCode> {
        match self {
            Self::Reject { fungible, nfts, .. } => reject::precheck(config, fungible, nfts),
            Self::Airdrop { transfers } => airdrop::precheck(config, transfers),
            _ => Ok(()),
        }
    }

    /// Applies the operation to `ledger`.
    pub fn execute(
        &self,
        ledger: &mut Ledger,
        config: &HtsConfig,
        effects: &mut SideEffects,
    ) -> Result<ResultPayload, ResponseCode> {
        match self {
            Self::Associate { account, tokens } => {
                association::associate(ledger, config, *account, tokens)
            }
            Self::Dissociate { account, tokens } => association::dissociate(ledger, *account, tokens),
            Self::Mint { token, amount, metadata } => {
                supply::mint(ledger, config, effects, *token, *amount, metadata)
            }
            Self::Burn { token, amount, serials } => {
                supply::burn(ledger, config, effects, *token, *amount, serials)
            }
            Self::WipeFungible { token, account, amount } => {
                supply::wipe_fungible(ledger, effects, *token, *account, *amount)
            }
            Self::WipeNft { token, account, serials } => {
                supply::wipe_nft(ledger, config, effects, *token, *account, serials)
            }
            Self::Freeze { token, account } => flags::set_frozen(ledger, *token, *account, true),
            Self::Unfreeze { token, account } => flags::set_frozen(ledger, *token, *account, false),
            Self::GrantKyc { token, account } => flags::set_kyc(ledger, *token, *account, true),
            Self::RevokeKyc { token, account } => flags::set_kyc(ledger, *token, *account, false),
            Self::Pause { token } => flags::set_paused(ledger, *token, true),
            Self::Unpause { token } => flags::set_paused(ledger, *token, false),
            Self::Airdrop { transfers } => airdrop::airdrop(ledger, effects, transfers),
            Self::UpdateFungibleFees { token, fixed, fractional } => {
                fees::update_fungible(ledger, config, *token, fixed, fractional)
            }
            Self::UpdateNftFees { token, fixed, royalty } => {
                fees::update_non_fungible(ledger, config, *token, fixed, royalty)
            }
            Self::Reject { owner, fungible, nfts } => {
                reject::reject(ledger, effects, *owner, fungible, nfts)
            }
            Self::IsFrozen { token, account } => views::is_frozen(ledger, *token, *account),
            Self::IsKyc { token, account } => views::is_kyc(ledger, *token, *account),
            Self::IsToken { token } => Ok(views::is_token(ledger, *token)),
            Self::GetTokenType { token } => views::token_type(ledger, *token),
            Self::GetTokenExpiryInfo { token } => views::expiry(ledger, *token),
            Self::GetTokenDefaultFreezeStatus { token } => views::default_freeze(ledger, *token),
            Self::GetTokenDefaultKycStatus { token } => views::default_kyc(ledger, *token),
        }
    }
}

// === Shared lookups ===

fn find_token(ledger: &Ledger, address: Address) -> Result<&Token, ResponseCode> {
    ledger
        .resolve_token(address)
        .and_then(|id| ledger.token(id))
        .ok_or(ResponseCode::InvalidTokenId)
}

fn find_live_token(ledger: &Ledger, address: Address) -> Result<&Token, ResponseCode> {
    let token = find_token(ledger, address)?;
    if token.deleted {
        return Err(ResponseCode::TokenWasDeleted);
    }
    Ok(token)
}

fn find_account(ledger: &Ledger, address: Address) -> Result<AccountId, ResponseCode> {
    ledger.resolve_account(address).ok_or(ResponseCode::InvalidAccountId)
}

const fn ensure_not_paused(token: &Token) -> Result<(), ResponseCode> {
    if token.paused {
        return Err(ResponseCode::TokenIsPaused);
    }
    Ok(())
}

const fn ensure_fungible(token: &Token) -> Result<(), ResponseCode> {
    if !token.token_type.is_fungible() {
        return Err(ResponseCode::AccountAmountTransfersOnlyAllowedForFungibleCommon);
    }
    Ok(())
}

const fn ensure_non_fungible(token: &Token) -> Result<(), ResponseCode> {
    if token.token_type.is_fungible() {
        return Err(ResponseCode::InvalidNftId);
    }
    Ok(())
}

fn adjust_supply(ledger: &mut Ledger, token: TokenId, delta: i64) -> Result<i64, ResponseCode> {
    let token = ledger.token_mut(token).ok_or(ResponseCode::InvalidTokenId)?;
    let next = token.total_supply.checked_add(delta).ok_or(ResponseCode::FailInvalid)?;
    if next < 0 {
        return Err(ResponseCode::FailInvalid);
    }
    token.total_supply = next;
    Ok(next)
}

fn count_as_i64(n: usize) -> Result<i64, ResponseCode> {
    i64::try_from(n).map_err(|_| ResponseCode::FailInvalid)
}
