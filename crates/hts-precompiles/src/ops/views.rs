//! Read-only queries. Views never mutate the ledger and never need a key.

use super::find_token;
use crate::{record::ResultPayload, state::Ledger};
use alloy_primitives::Address;
use hts_primitives::ResponseCode;

pub(super) fn is_frozen(
    ledger: &Ledger,
    token: Address,
    account: Address,
) -> Result<ResultPayload, ResponseCode> {
    let token = find_token(ledger, token)?.id;
    let account = ledger.resolve_account(account).ok_or(ResponseCode::InvalidAccountId)?;
    let value = ledger.relationship(account, token).is_some_and(|rel| rel.frozen);
    Ok(ResultPayload::Bool { value })
}

pub(super) fn is_kyc(
    ledger: &Ledger,
    token: Address,
    account: Address,
) -> Result<ResultPayload, ResponseCode> {
    let token = find_token(ledger, token)?.id;
    let account = ledger.resolve_account(account).ok_or(ResponseCode::InvalidAccountId)?;
    let value = ledger.relationship(account, token).is_some_and(|rel| rel.kyc_granted);
    Ok(ResultPayload::Bool { value })
}

/// Never fails: an unknown address is simply not a token.
pub(super) fn is_token(ledger: &Ledger, token: Address) -> ResultPayload {
    ResultPayload::Bool { value: ledger.resolve_token(token).is_some() }
}

pub(super) fn token_type(ledger: &Ledger, token: Address) -> Result<ResultPayload, ResponseCode> {
    let token = find_token(ledger, token)?;
    Ok(ResultPayload::TokenType { value: token.token_type.abi_value() })
}

pub(super) fn expiry(ledger: &Ledger, token: Address) -> Result<ResultPayload, ResponseCode> {
    Ok(ResultPayload::Expiry(find_token(ledger, token)?.expiry))
}

pub(super) fn default_freeze(
    ledger: &Ledger,
    token: Address,
) -> Result<ResultPayload, ResponseCode> {
    Ok(ResultPayload::Bool { value: find_token(ledger, token)?.default_frozen() })
}

pub(super) fn default_kyc(ledger: &Ledger, token: Address) -> Result<ResultPayload, ResponseCode> {
    Ok(ResultPayload::Bool { value: find_token(ledger, token)?.default_kyc_granted() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Account, KeyRole, Token};
    use hts_primitives::{AccountId, ContractId, Key, TokenId};

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .insert_account(Account::new(AccountId(2), None))
            .insert_account(Account::new(AccountId(3), None))
            .insert_token(
                Token::fungible(TokenId(100), AccountId(2))
                    .with_key(KeyRole::Freeze, Key::contract(ContractId(9)))
                    .with_freeze_default(true),
            )
            .insert_token(Token::non_fungible(TokenId(200), AccountId(2)));
        ledger
    }

    #[test]
    fn unassociated_account_is_neither_frozen_nor_kyc() {
        let ledger = ledger();
        let (token, account) = (TokenId(200).to_address(), AccountId(3).to_address());
        assert_eq!(is_frozen(&ledger, token, account), Ok(ResultPayload::Bool { value: false }));
        assert_eq!(is_kyc(&ledger, token, account), Ok(ResultPayload::Bool { value: false }));
    }

    #[test]
    fn frozen_by_default_when_token_says_so() {
        let mut ledger = ledger();
        ledger.associate(AccountId(3), TokenId(100), false);
        let result = is_frozen(&ledger, TokenId(100).to_address(), AccountId(3).to_address());
        assert_eq!(result, Ok(ResultPayload::Bool { value: true }));
        assert_eq!(
            default_freeze(&ledger, TokenId(100).to_address()),
            Ok(ResultPayload::Bool { value: true })
        );
    }

    #[test]
    fn views_report_unknown_ids() {
        let ledger = ledger();
        assert_eq!(
            is_frozen(&ledger, TokenId(100).to_address(), AccountId(44).to_address()),
            Err(ResponseCode::InvalidAccountId)
        );
        assert_eq!(token_type(&ledger, TokenId(5).to_address()), Err(ResponseCode::InvalidTokenId));
        assert_eq!(is_token(&ledger, TokenId(5).to_address()), ResultPayload::Bool { value: false });
    }

    #[test]
    fn token_type_and_defaults() {
        let ledger = ledger();
        assert_eq!(
            token_type(&ledger, TokenId(200).to_address()),
            Ok(ResultPayload::TokenType { value: 1 })
        );
        assert_eq!(
            default_kyc(&ledger, TokenId(200).to_address()),
            Ok(ResultPayload::Bool { value: true })
        );
        assert!(matches!(expiry(&ledger, TokenId(200).to_address()), Ok(ResultPayload::Expiry(_))));
    }
}
