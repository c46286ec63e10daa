//! Token association and dissociation.

use super::{find_account, find_token};
use crate::{config::HtsConfig, record::ResultPayload, state::Ledger};
use alloy_primitives::Address;
use hts_primitives::{ResponseCode, TokenId};

/// Resolves each address once, keeping first-seen order.
fn distinct_tokens(
    ledger: &Ledger,
    tokens: &[Address],
) -> Result<Vec<TokenId>, ResponseCode> {
    let mut ids: Vec<TokenId> = Vec::with_capacity(tokens.len());
    for address in tokens {
        let id = find_token(ledger, *address)?.id;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub(super) fn associate(
    ledger: &mut Ledger,
    config: &HtsConfig,
    account: Address,
    tokens: &[Address],
) -> Result<ResultPayload, ResponseCode> {
    let account = find_account(ledger, account)?;
    let ids = distinct_tokens(ledger, tokens)?;

    let mut fresh = Vec::with_capacity(ids.len());
    for id in ids {
        if ledger.token(id).is_some_and(|t| t.deleted) {
            return Err(ResponseCode::TokenWasDeleted);
        }
        // Already associated: nothing to do.
        if ledger.relationship(account, id).is_none() {
            fresh.push(id);
        }
    }

    if ledger.association_count(account) + fresh.len() > config.max_tokens_per_account {
        return Err(ResponseCode::TokensPerAccountLimitExceeded);
    }
    for id in fresh {
        ledger.associate(account, id, false);
    }
    Ok(ResultPayload::None)
}

pub(super) fn dissociate(
    ledger: &mut Ledger,
    account: Address,
    tokens: &[Address],
) -> Result<ResultPayload, ResponseCode> {
    let account = find_account(ledger, account)?;
    let ids = distinct_tokens(ledger, tokens)?;

    for id in &ids {
        let rel = ledger
            .relationship(account, *id)
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        let Some(token) = ledger.token(*id) else {
            return Err(ResponseCode::InvalidTokenId);
        };
        if token.deleted {
            continue;
        }
        if token.treasury == account {
            return Err(ResponseCode::AccountIsTreasury);
        }
        if rel.frozen {
            return Err(ResponseCode::AccountFrozenForToken);
        }
        if rel.balance != 0 {
            return Err(ResponseCode::TransactionRequiresZeroTokenBalances);
        }
    }

    for id in ids {
        ledger.dissociate(account, id);
    }
    Ok(ResultPayload::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Account, Token};
    use hts_primitives::AccountId;

    const TREASURY: AccountId = AccountId(2);
    const HOLDER: AccountId = AccountId(3);
    const TOKEN: TokenId = TokenId(100);

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .insert_account(Account::new(TREASURY, None))
            .insert_account(Account::new(HOLDER, None))
            .insert_token(Token::fungible(TOKEN, TREASURY).with_supply(10))
            .insert_token(Token::fungible(TokenId(101), TREASURY));
        ledger
    }

    #[test]
    fn associate_is_idempotent() {
        let mut ledger = ledger();
        let config = HtsConfig::default();
        let tokens = [TOKEN.to_address(), TOKEN.to_address()];
        associate(&mut ledger, &config, HOLDER.to_address(), &tokens).unwrap();
        associate(&mut ledger, &config, HOLDER.to_address(), &tokens).unwrap();
        assert_eq!(ledger.association_count(HOLDER), 1);
    }

    #[test]
    fn associate_empty_list_is_noop() {
        let mut ledger = ledger();
        let before = ledger.clone();
        associate(&mut ledger, &HtsConfig::default(), HOLDER.to_address(), &[]).unwrap();
        assert_eq!(ledger, before);
    }

    #[test]
    fn associate_reports_bad_arguments() {
        let mut ledger = ledger();
        let config = HtsConfig::default();
        let err = associate(&mut ledger, &config, AccountId(77).to_address(), &[TOKEN.to_address()])
            .unwrap_err();
        assert_eq!(err, ResponseCode::InvalidAccountId);

        let tokens = [TOKEN.to_address(), TokenId(999).to_address()];
        let err = associate(&mut ledger, &config, HOLDER.to_address(), &tokens).unwrap_err();
        assert_eq!(err, ResponseCode::InvalidTokenId);
        assert!(ledger.relationship(HOLDER, TOKEN).is_none());
    }

    #[test]
    fn associate_enforces_per_account_limit() {
        let mut ledger = ledger();
        let config = HtsConfig { max_tokens_per_account: 1, ..Default::default() };
        let tokens = [TOKEN.to_address(), TokenId(101).to_address()];
        let err = associate(&mut ledger, &config, HOLDER.to_address(), &tokens).unwrap_err();
        assert_eq!(err, ResponseCode::TokensPerAccountLimitExceeded);
    }

    #[test]
    fn dissociate_requires_zero_balance() {
        let mut ledger = ledger();
        ledger.associate(HOLDER, TOKEN, false).balance = 4;
        let err = dissociate(&mut ledger, HOLDER.to_address(), &[TOKEN.to_address()]).unwrap_err();
        assert_eq!(err, ResponseCode::TransactionRequiresZeroTokenBalances);

        ledger.relationship_mut(HOLDER, TOKEN).unwrap().balance = 0;
        dissociate(&mut ledger, HOLDER.to_address(), &[TOKEN.to_address()]).unwrap();
        assert!(ledger.relationship(HOLDER, TOKEN).is_none());
    }

    #[test]
    fn treasury_cannot_dissociate_live_token() {
        let mut ledger = ledger();
        let err = dissociate(&mut ledger, TREASURY.to_address(), &[TOKEN.to_address()]).unwrap_err();
        assert_eq!(err, ResponseCode::AccountIsTreasury);

        ledger.token_mut(TOKEN).unwrap().deleted = true;
        dissociate(&mut ledger, TREASURY.to_address(), &[TOKEN.to_address()]).unwrap();
    }

    #[test]
    fn dissociate_unassociated_token_fails() {
        let mut ledger = ledger();
        let err = dissociate(&mut ledger, HOLDER.to_address(), &[TOKEN.to_address()]).unwrap_err();
        assert_eq!(err, ResponseCode::TokenNotAssociatedToAccount);
    }
}
