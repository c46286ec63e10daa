//! Mint, burn and wipe. All three move supply in or out of circulation.

use super::{
    adjust_supply, count_as_i64, ensure_fungible, ensure_non_fungible, ensure_not_paused,
    find_account, find_live_token,
};
use crate::{
    config::HtsConfig,
    record::{ResultPayload, SideEffects},
    state::{Ledger, Nft},
};
use alloy_primitives::{Address, Bytes};
use hts_primitives::{NftId, ResponseCode};

pub(super) fn mint(
    ledger: &mut Ledger,
    config: &HtsConfig,
    effects: &mut SideEffects,
    token: Address,
    amount: i64,
    metadata: &[Bytes],
) -> Result<ResultPayload, ResponseCode> {
    let token = find_live_token(ledger, token)?;
    ensure_not_paused(token)?;
    let (id, treasury, supply, max_supply, last_serial) =
        (token.id, token.treasury, token.total_supply, token.max_supply, token.last_serial);

    if token.token_type.is_fungible() {
        if amount <= 0 {
            return Err(ResponseCode::InvalidTokenMintAmount);
        }
        let next = supply.checked_add(amount).ok_or(ResponseCode::TokenMaxSupplyReached)?;
        if max_supply.is_some_and(|max| next > max) {
            return Err(ResponseCode::TokenMaxSupplyReached);
        }
        ledger.adjust_balance(treasury, id, amount)?;
        let total_supply = adjust_supply(ledger, id, amount)?;
        effects.track_balance(id, treasury, amount);
        return Ok(ResultPayload::Supply { total_supply, serial_numbers: Vec::new() });
    }

    // The amount argument is ignored for non-fungible mints.
    if metadata.is_empty() {
        return Err(ResponseCode::InvalidTokenMintMetadata);
    }
    if metadata.len() > config.max_batch_size_mint {
        return Err(ResponseCode::BatchSizeLimitExceeded);
    }
    if metadata.iter().any(|m| m.len() > config.max_metadata_bytes) {
        return Err(ResponseCode::MetadataTooLong);
    }
    let count = count_as_i64(metadata.len())?;
    let next = supply.checked_add(count).ok_or(ResponseCode::TokenMaxSupplyReached)?;
    if max_supply.is_some_and(|max| next > max) {
        return Err(ResponseCode::TokenMaxSupplyReached);
    }

    let mut serial_numbers = Vec::with_capacity(metadata.len());
    for (serial, meta) in (last_serial + 1..).zip(metadata) {
        ledger.insert_nft(Nft { id: NftId::new(id, serial), owner: treasury, metadata: meta.clone() });
        effects.track_nft(id, serial, None, Some(treasury));
        serial_numbers.push(serial);
    }
    if let Some(token) = ledger.token_mut(id) {
        token.last_serial = last_serial + count;
    }
    ledger.adjust_balance(treasury, id, count)?;
    let total_supply = adjust_supply(ledger, id, count)?;
    Ok(ResultPayload::Supply { total_supply, serial_numbers })
}

pub(super) fn burn(
    ledger: &mut Ledger,
    config: &HtsConfig,
    effects: &mut SideEffects,
    token: Address,
    amount: i64,
    serials: &[i64],
) -> Result<ResultPayload, ResponseCode> {
    let token = find_live_token(ledger, token)?;
    ensure_not_paused(token)?;
    let (id, treasury) = (token.id, token.treasury);

    if token.token_type.is_fungible() {
        if amount <= 0 {
            return Err(ResponseCode::InvalidTokenBurnAmount);
        }
        let held = ledger.relationship(treasury, id).map_or(0, |rel| rel.balance);
        if amount > held {
            return Err(ResponseCode::InsufficientTokenBalance);
        }
        ledger.adjust_balance(treasury, id, -amount)?;
        let total_supply = adjust_supply(ledger, id, -amount)?;
        effects.track_balance(id, treasury, -amount);
        return Ok(ResultPayload::Supply { total_supply, serial_numbers: Vec::new() });
    }

    if serials.is_empty() {
        return Err(ResponseCode::InvalidTokenBurnAmount);
    }
    if serials.len() > config.max_batch_size_burn {
        return Err(ResponseCode::BatchSizeLimitExceeded);
    }
    for &serial in serials {
        let nft_id = NftId::new(id, serial);
        let nft = ledger.nft(nft_id).filter(|_| serial > 0).ok_or(ResponseCode::InvalidNftId)?;
        if nft.owner != treasury {
            return Err(ResponseCode::TreasuryMustOwnBurnedNft);
        }
        ledger.remove_nft(nft_id);
        effects.track_nft(id, serial, Some(treasury), None);
    }
    let count = count_as_i64(serials.len())?;
    ledger.adjust_balance(treasury, id, -count)?;
    let total_supply = adjust_supply(ledger, id, -count)?;
    Ok(ResultPayload::Supply { total_supply, serial_numbers: Vec::new() })
}

pub(super) fn wipe_fungible(
    ledger: &mut Ledger,
    effects: &mut SideEffects,
    token: Address,
    account: Address,
    amount: i64,
) -> Result<ResultPayload, ResponseCode> {
    let token = find_live_token(ledger, token)?;
    ensure_not_paused(token)?;
    ensure_fungible(token)?;
    let (id, treasury) = (token.id, token.treasury);
    let account = find_account(ledger, account)?;

    if account == treasury {
        return Err(ResponseCode::CannotWipeTokenTreasuryAccount);
    }
    let held = ledger
        .relationship(account, id)
        .ok_or(ResponseCode::TokenNotAssociatedToAccount)?
        .balance;
    if amount <= 0 || amount > held {
        return Err(ResponseCode::InvalidWipingAmount);
    }
    ledger.adjust_balance(account, id, -amount)?;
    adjust_supply(ledger, id, -amount)?;
    effects.track_balance(id, account, -amount);
    Ok(ResultPayload::None)
}

pub(super) fn wipe_nft(
    ledger: &mut Ledger,
    config: &HtsConfig,
    effects: &mut SideEffects,
    token: Address,
    account: Address,
    serials: &[i64],
) -> Result<ResultPayload, ResponseCode> {
    let token = find_live_token(ledger, token)?;
    ensure_not_paused(token)?;
    ensure_non_fungible(token)?;
    let (id, treasury) = (token.id, token.treasury);
    let account = find_account(ledger, account)?;

    if account == treasury {
        return Err(ResponseCode::CannotWipeTokenTreasuryAccount);
    }
    if ledger.relationship(account, id).is_none() {
        return Err(ResponseCode::TokenNotAssociatedToAccount);
    }
    if serials.is_empty() {
        return Err(ResponseCode::InvalidWipingAmount);
    }
    if serials.len() > config.max_batch_size_wipe {
        return Err(ResponseCode::BatchSizeLimitExceeded);
    }
    for &serial in serials {
        let nft_id = NftId::new(id, serial);
        let nft = ledger.nft(nft_id).filter(|_| serial > 0).ok_or(ResponseCode::InvalidNftId)?;
        if nft.owner != account {
            return Err(ResponseCode::AccountDoesNotOwnWipedNft);
        }
        ledger.remove_nft(nft_id);
        effects.track_nft(id, serial, Some(account), None);
    }
    let count = count_as_i64(serials.len())?;
    ledger.adjust_balance(account, id, -count)?;
    adjust_supply(ledger, id, -count)?;
    Ok(ResultPayload::None)
}
