//! Freeze, KYC and pause flags on tokens and token relationships.

use super::{ensure_not_paused, find_account, find_live_token};
use crate::{record::ResultPayload, state::Ledger};
use alloy_primitives::Address;
use hts_primitives::{AccountId, ResponseCode, TokenId};

pub(super) fn set_frozen(
    ledger: &mut Ledger,
    token: Address,
    account: Address,
    frozen: bool,
) -> Result<ResultPayload, ResponseCode> {
    let (token, account) = relationship_target(ledger, token, account)?;
    if let Some(rel) = ledger.relationship_mut(account, token) {
        rel.frozen = frozen;
    }
    Ok(ResultPayload::None)
}

pub(super) fn set_kyc(
    ledger: &mut Ledger,
    token: Address,
    account: Address,
    granted: bool,
) -> Result<ResultPayload, ResponseCode> {
    let (token, account) = relationship_target(ledger, token, account)?;
    if let Some(rel) = ledger.relationship_mut(account, token) {
        rel.kyc_granted = granted;
    }
    Ok(ResultPayload::None)
}

pub(super) fn set_paused(
    ledger: &mut Ledger,
    token: Address,
    paused: bool,
) -> Result<ResultPayload, ResponseCode> {
    let id = find_live_token(ledger, token)?.id;
    if let Some(token) = ledger.token_mut(id) {
        token.paused = paused;
    }
    Ok(ResultPayload::None)
}

/// Live, unpaused token and an account associated with it.
fn relationship_target(
    ledger: &Ledger,
    token: Address,
    account: Address,
) -> Result<(TokenId, AccountId), ResponseCode> {
    let token = find_live_token(ledger, token)?;
    ensure_not_paused(token)?;
    let account = find_account(ledger, account)?;
    if ledger.relationship(account, token.id).is_none() {
        return Err(ResponseCode::TokenNotAssociatedToAccount);
    }
    Ok((token.id, account))
}
