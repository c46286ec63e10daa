//! Child records: one immutable entry per internal token operation.

use crate::{
    abi,
    ops::OperationKind,
    state::{Expiry, PendingAirdrop, PendingAirdropId},
};
use alloy_primitives::Bytes;
use hts_primitives::{AccountId, ResponseCode, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed result of a successful operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResultPayload {
    /// Nothing beyond the status.
    #[default]
    None,
    /// New total supply after mint or burn, plus minted serials.
    Supply {
        /// Supply after the operation.
        total_supply: i64,
        /// Serials created by an NFT mint.
        serial_numbers: Vec<i64>,
    },
    /// Boolean view result.
    Bool {
        /// The value.
        value: bool,
    },
    /// `getTokenType` result.
    TokenType {
        /// `0` fungible, `1` non-fungible.
        value: i32,
    },
    /// `getTokenExpiryInfo` result.
    Expiry(Expiry),
}

/// Net change of one account's fungible balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceChange {
    /// Token.
    pub token: TokenId,
    /// Account.
    pub account: AccountId,
    /// Signed change.
    pub amount: i64,
}

/// Ownership change of one serial. `None` stands for mint or burn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftOwnershipChange {
    /// Token.
    pub token: TokenId,
    /// Serial.
    pub serial: i64,
    /// Previous owner.
    pub sender: Option<AccountId>,
    /// New owner.
    pub receiver: Option<AccountId>,
}

/// Relationship created automatically while executing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticAssociation {
    /// Account.
    pub account: AccountId,
    /// Token.
    pub token: TokenId,
}

/// Side effects an executor reports while mutating the ledger.
#[derive(Debug, Clone, Default)]
pub struct SideEffects {
    balances: BTreeMap<(TokenId, AccountId), i64>,
    nfts: Vec<NftOwnershipChange>,
    pending: BTreeMap<PendingAirdropId, i64>,
    associations: Vec<AutomaticAssociation>,
}

impl SideEffects {
    /// Records a fungible balance change.
    pub fn track_balance(&mut self, token: TokenId, account: AccountId, amount: i64) {
        let entry = self.balances.entry((token, account)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Records a serial changing hands.
    pub fn track_nft(
        &mut self,
        token: TokenId,
        serial: i64,
        sender: Option<AccountId>,
        receiver: Option<AccountId>,
    ) {
        self.nfts.push(NftOwnershipChange { token, serial, sender, receiver });
    }

    /// Records a pending airdrop.
    pub fn track_pending_airdrop(&mut self, id: PendingAirdropId, amount: i64) {
        let entry = self.pending.entry(id).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Records an automatic association.
    pub fn track_auto_association(&mut self, account: AccountId, token: TokenId) {
        self.associations.push(AutomaticAssociation { account, token });
    }
}

/// Immutable record of one internal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRecord {
    /// Operation executed.
    pub operation: OperationKind,
    /// Status of this operation alone.
    pub status: ResponseCode,
    /// Typed result.
    pub result: ResultPayload,
    /// ABI-encoded return data handed back to the calling contract.
    pub output: Bytes,
    /// Net fungible balance changes, ordered by token then account.
    pub token_transfers: Vec<TokenBalanceChange>,
    /// NFT ownership changes in execution order.
    pub nft_transfers: Vec<NftOwnershipChange>,
    /// Airdrops left pending for their receivers.
    pub pending_airdrops: Vec<PendingAirdrop>,
    /// Relationships created automatically.
    pub automatic_associations: Vec<AutomaticAssociation>,
    /// Gas charged for the operation.
    pub gas_used: u64,
}

impl ChildRecord {
    /// Builds the record of a successful operation from its side effects.
    pub fn success(
        operation: OperationKind,
        result: ResultPayload,
        effects: SideEffects,
        gas_used: u64,
    ) -> Self {
        let output = abi::encode_output(operation, ResponseCode::Success, &result);
        let token_transfers = effects
            .balances
            .into_iter()
            .filter(|(_, amount)| *amount != 0)
            .map(|((token, account), amount)| TokenBalanceChange { token, account, amount })
            .collect();
        let pending_airdrops = effects
            .pending
            .into_iter()
            .map(|(id, amount)| PendingAirdrop { id, amount })
            .collect();
        Self {
            operation,
            status: ResponseCode::Success,
            result,
            output,
            token_transfers,
            nft_transfers: effects.nfts,
            pending_airdrops,
            automatic_associations: effects.associations,
            gas_used,
        }
    }

    /// Builds the record of a failed operation. Failed operations carry no
    /// side effects since their state changes are rolled back.
    pub fn failure(operation: OperationKind, status: ResponseCode, gas_used: u64) -> Self {
        Self {
            operation,
            status,
            result: ResultPayload::None,
            output: abi::encode_output(operation, status, &ResultPayload::None),
            token_transfers: Vec::new(),
            nft_transfers: Vec::new(),
            pending_airdrops: Vec::new(),
            automatic_associations: Vec::new(),
            gas_used,
        }
    }

    /// Whether the operation succeeded.
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
