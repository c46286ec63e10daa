//! Airdrops: transfers that never fail on an unassociated receiver.
//!
//! A receiver that is not associated is auto-associated when it has a free
//! slot. Otherwise the credit is parked as a pending airdrop and the sender
//! keeps the units (or the serial) until it is claimed.

use super::{ensure_fungible, ensure_non_fungible, ensure_not_paused, find_account, find_live_token};
use crate::{
    abi::IHederaTokenService::TokenTransferList,
    config::HtsConfig,
    record::{ResultPayload, SideEffects},
    state::{Account, Ledger, PendingAirdropId, TokenRelationship},
};
use alloy_primitives::Address;
use hts_primitives::{AccountId, NftId, ResponseCode, TokenId};

/// Positive fungible legs plus NFT legs.
pub(super) fn credit_count(transfers: &[TokenTransferList]) -> usize {
    transfers
        .iter()
        .map(|list| {
            list.transfers.iter().filter(|leg| leg.amount > 0).count() + list.nftTransfers.len()
        })
        .sum()
}

/// Distinct debited accounts and NFT senders, first-seen order.
pub(super) fn senders(transfers: &[TokenTransferList]) -> Vec<Address> {
    let mut out = Vec::new();
    let debits = transfers
        .iter()
        .flat_map(|list| list.transfers.iter().filter(|leg| leg.amount < 0).map(|leg| leg.accountID));
    let nft_senders =
        transfers.iter().flat_map(|list| list.nftTransfers.iter().map(|leg| leg.senderAccountID));
    for address in debits.chain(nft_senders) {
        if !out.contains(&address) {
            out.push(address);
        }
    }
    out
}

pub(super) fn precheck(config: &HtsConfig, transfers: &[TokenTransferList]) -> Result<(), ResponseCode> {
    if credit_count(transfers) > config.max_airdrop_transfers {
        return Err(ResponseCode::TokenReferenceListSizeLimitExceeded);
    }
    Ok(())
}

pub(super) fn airdrop(
    ledger: &mut Ledger,
    effects: &mut SideEffects,
    transfers: &[TokenTransferList],
) -> Result<ResultPayload, ResponseCode> {
    for list in transfers {
        let token = find_live_token(ledger, list.token)?;
        ensure_not_paused(token)?;
        if !list.transfers.is_empty() {
            ensure_fungible(token)?;
        }
        if !list.nftTransfers.is_empty() {
            ensure_non_fungible(token)?;
        }
        let id = token.id;
        fungible_legs(ledger, effects, id, list)?;
        nft_legs(ledger, effects, id, list)?;
    }
    Ok(ResultPayload::None)
}

fn fungible_legs(
    ledger: &mut Ledger,
    effects: &mut SideEffects,
    token: TokenId,
    list: &TokenTransferList,
) -> Result<(), ResponseCode> {
    if list.transfers.is_empty() {
        return Ok(());
    }
    if list.transfers.iter().any(|leg| leg.isApproval) {
        return Err(ResponseCode::SpenderDoesNotHaveAllowance);
    }
    let sum = list
        .transfers
        .iter()
        .try_fold(0i64, |acc, leg| acc.checked_add(leg.amount))
        .ok_or(ResponseCode::TransfersNotZeroSumForToken)?;
    if sum != 0 {
        return Err(ResponseCode::TransfersNotZeroSumForToken);
    }

    let mut payer = None;
    for leg in list.transfers.iter().filter(|leg| leg.amount < 0) {
        let account = find_account(ledger, leg.accountID)?;
        let rel = ledger
            .relationship(account, token)
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        ensure_transferable(rel)?;
        if rel.balance < leg.amount.saturating_neg() {
            return Err(ResponseCode::InsufficientTokenBalance);
        }
        ledger.adjust_balance(account, token, leg.amount)?;
        effects.track_balance(token, account, leg.amount);
        payer.get_or_insert(account);
    }

    for leg in list.transfers.iter().filter(|leg| leg.amount > 0) {
        let account = find_account(ledger, leg.accountID)?;
        if prepare_receiver(ledger, effects, account, token)? {
            ledger.adjust_balance(account, token, leg.amount)?;
            effects.track_balance(token, account, leg.amount);
            continue;
        }
        // Positive legs imply a debit, so the payer is always known here.
        let sender = payer.ok_or(ResponseCode::TransfersNotZeroSumForToken)?;
        ledger.adjust_balance(sender, token, leg.amount)?;
        effects.track_balance(token, sender, leg.amount);
        let id = PendingAirdropId { sender, receiver: account, token, serial: None };
        ledger.add_pending_airdrop(id, leg.amount);
        effects.track_pending_airdrop(id, leg.amount);
    }
    Ok(())
}

fn nft_legs(
    ledger: &mut Ledger,
    effects: &mut SideEffects,
    token: TokenId,
    list: &TokenTransferList,
) -> Result<(), ResponseCode> {
    for leg in &list.nftTransfers {
        if leg.isApproval {
            return Err(ResponseCode::SpenderDoesNotHaveAllowance);
        }
        let sender = find_account(ledger, leg.senderAccountID)?;
        let receiver = find_account(ledger, leg.receiverAccountID)?;
        let nft_id = NftId::new(token, leg.serialNumber);
        let owner = ledger
            .nft(nft_id)
            .filter(|_| leg.serialNumber > 0)
            .ok_or(ResponseCode::InvalidNftId)?
            .owner;
        if owner != sender {
            return Err(ResponseCode::SenderDoesNotOwnNftSerialNo);
        }
        let rel = ledger
            .relationship(sender, token)
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        ensure_transferable(rel)?;

        if prepare_receiver(ledger, effects, receiver, token)? {
            ledger.set_nft_owner(nft_id, receiver)?;
            ledger.adjust_balance(sender, token, -1)?;
            ledger.adjust_balance(receiver, token, 1)?;
            effects.track_nft(token, leg.serialNumber, Some(sender), Some(receiver));
        } else {
            let id = PendingAirdropId { sender, receiver, token, serial: Some(leg.serialNumber) };
            ledger.add_pending_airdrop(id, 0);
            effects.track_pending_airdrop(id, 0);
        }
    }
    Ok(())
}

/// Makes sure `account` can receive `token`, auto-associating when a slot is
/// free. Returns `false` when the credit has to stay pending.
fn prepare_receiver(
    ledger: &mut Ledger,
    effects: &mut SideEffects,
    account: AccountId,
    token: TokenId,
) -> Result<bool, ResponseCode> {
    if ledger.relationship(account, token).is_none() {
        if !ledger.account(account).is_some_and(Account::has_free_auto_association_slot) {
            return Ok(false);
        }
        ledger.associate(account, token, true);
        if let Some(acct) = ledger.account_mut(account) {
            acct.used_auto_associations = acct.used_auto_associations.saturating_add(1);
        }
        effects.track_auto_association(account, token);
    }
    let rel = ledger
        .relationship(account, token)
        .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
    ensure_transferable(rel)?;
    Ok(true)
}

const fn ensure_transferable(rel: &TokenRelationship) -> Result<(), ResponseCode> {
    if rel.frozen {
        return Err(ResponseCode::AccountFrozenForToken);
    }
    if !rel.kyc_granted {
        return Err(ResponseCode::AccountKycNotGrantedForToken);
    }
    Ok(())
}
