//! Token rejection: an owner hands whole fungible balances and single NFTs
//! back to the token treasury.

use super::{ensure_fungible, ensure_non_fungible, ensure_not_paused, find_live_token};
use crate::{
    config::HtsConfig,
    record::{ResultPayload, SideEffects},
    state::Ledger,
};
use alloy_primitives::Address;
use hts_primitives::{AccountId, NftId, ResponseCode, TokenId};

pub(super) fn precheck(
    config: &HtsConfig,
    fungible: &[Address],
    nfts: &[(Address, i64)],
) -> Result<(), ResponseCode> {
    let total = fungible.len() + nfts.len();
    if total == 0 {
        return Err(ResponseCode::EmptyTokenReferenceList);
    }
    if total > config.max_token_rejections {
        return Err(ResponseCode::TokenReferenceListSizeLimitExceeded);
    }
    let repeated = fungible.iter().enumerate().any(|(i, a)| fungible[..i].contains(a))
        || nfts.iter().enumerate().any(|(i, n)| nfts[..i].contains(n));
    if repeated {
        return Err(ResponseCode::TokenReferenceRepeated);
    }
    Ok(())
}

pub(super) fn reject(
    ledger: &mut Ledger,
    effects: &mut SideEffects,
    owner: Address,
    fungible: &[Address],
    nfts: &[(Address, i64)],
) -> Result<ResultPayload, ResponseCode> {
    let owner = ledger.resolve_account(owner).ok_or(ResponseCode::InvalidOwnerId)?;
    let mut touched = Vec::new();

    for address in fungible {
        let (token, treasury) = holding(ledger, *address, owner, true)?;
        let rel = ledger
            .relationship(owner, token)
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        if rel.frozen {
            return Err(ResponseCode::AccountFrozenForToken);
        }
        let amount = rel.balance;
        if amount <= 0 {
            return Err(ResponseCode::InsufficientTokenBalance);
        }
        ledger.adjust_balance(owner, token, -amount)?;
        ledger.adjust_balance(treasury, token, amount)?;
        effects.track_balance(token, owner, -amount);
        effects.track_balance(token, treasury, amount);
        touched.push(token);
    }

    for (address, serial) in nfts {
        let (token, treasury) = holding(ledger, *address, owner, false)?;
        let nft_id = NftId::new(token, *serial);
        let nft = ledger.nft(nft_id).filter(|_| *serial > 0).ok_or(ResponseCode::InvalidNftId)?;
        if nft.owner != owner {
            return Err(ResponseCode::InvalidOwnerId);
        }
        if ledger.relationship(owner, token).is_some_and(|rel| rel.frozen) {
            return Err(ResponseCode::AccountFrozenForToken);
        }
        ledger.set_nft_owner(nft_id, treasury)?;
        ledger.adjust_balance(owner, token, -1)?;
        ledger.adjust_balance(treasury, token, 1)?;
        effects.track_nft(token, *serial, Some(owner), Some(treasury));
        if !touched.contains(&token) {
            touched.push(token);
        }
    }

    for token in touched {
        if ledger.relationship(owner, token).is_some_and(|rel| rel.balance == 0) {
            ledger.dissociate(owner, token);
        }
    }
    Ok(ResultPayload::None)
}

/// Validates a rejected token reference and returns the token and its treasury.
fn holding(
    ledger: &Ledger,
    address: Address,
    owner: AccountId,
    fungible: bool,
) -> Result<(TokenId, AccountId), ResponseCode> {
    let token = find_live_token(ledger, address)?;
    if fungible {
        ensure_fungible(token)?;
    } else {
        ensure_non_fungible(token)?;
    }
    ensure_not_paused(token)?;
    if token.treasury == owner {
        return Err(ResponseCode::AccountIsTreasury);
    }
    Ok((token.id, token.treasury))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Account, Nft, Token};
    use alloy_primitives::Bytes;

    const TREASURY: AccountId = AccountId(2);
    const HOLDER: AccountId = AccountId(3);
    const FUNGIBLE: TokenId = TokenId(100);
    const UNIQUE: TokenId = TokenId(200);

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .insert_account(Account::new(TREASURY, None))
            .insert_account(Account::new(HOLDER, None))
            .insert_token(Token::fungible(FUNGIBLE, TREASURY).with_supply(100))
            .insert_token(Token::non_fungible(UNIQUE, TREASURY));
        ledger.associate(HOLDER, FUNGIBLE, false);
        ledger.adjust_balance(TREASURY, FUNGIBLE, -30).unwrap();
        ledger.adjust_balance(HOLDER, FUNGIBLE, 30).unwrap();
        ledger.associate(HOLDER, UNIQUE, false).balance = 1;
        ledger.insert_nft(Nft { id: NftId::new(UNIQUE, 1), owner: HOLDER, metadata: Bytes::new() });
        ledger
    }

    #[test]
    fn prechecks() {
        let config = HtsConfig::default();
        let a = FUNGIBLE.to_address();
        assert_eq!(precheck(&config, &[], &[]), Err(ResponseCode::EmptyTokenReferenceList));
        assert_eq!(precheck(&config, &[a, a], &[]), Err(ResponseCode::TokenReferenceRepeated));
        assert_eq!(
            precheck(&config, &[], &[(a, 1), (a, 1)]),
            Err(ResponseCode::TokenReferenceRepeated)
        );
        assert_eq!(precheck(&config, &[], &[(a, 1), (a, 2)]), Ok(()));
        let many: Vec<_> = (1..=11).map(|serial| (a, serial)).collect();
        assert_eq!(
            precheck(&config, &[], &many),
            Err(ResponseCode::TokenReferenceListSizeLimitExceeded)
        );
    }

    #[test]
    fn returns_everything_to_treasury_and_dissociates() {
        let mut ledger = ledger();
        let mut effects = SideEffects::default();
        reject(
            &mut ledger,
            &mut effects,
            HOLDER.to_address(),
            &[FUNGIBLE.to_address()],
            &[(UNIQUE.to_address(), 1)],
        )
        .unwrap();
        assert_eq!(ledger.relationship(TREASURY, FUNGIBLE).unwrap().balance, 100);
        assert_eq!(ledger.nft(NftId::new(UNIQUE, 1)).unwrap().owner, TREASURY);
        assert!(ledger.relationship(HOLDER, FUNGIBLE).is_none());
        assert!(ledger.relationship(HOLDER, UNIQUE).is_none());
    }

    #[test]
    fn rejection_failures() {
        let mut ledger = ledger();
        let mut effects = SideEffects::default();
        let holder = HOLDER.to_address();
        assert_eq!(
            reject(&mut ledger, &mut effects, AccountId(77).to_address(), &[FUNGIBLE.to_address()], &[]),
            Err(ResponseCode::InvalidOwnerId)
        );
        assert_eq!(
            reject(&mut ledger, &mut effects, TREASURY.to_address(), &[FUNGIBLE.to_address()], &[]),
            Err(ResponseCode::AccountIsTreasury)
        );
        assert_eq!(
            reject(&mut ledger, &mut effects, holder, &[UNIQUE.to_address()], &[]),
            Err(ResponseCode::AccountAmountTransfersOnlyAllowedForFungibleCommon)
        );
        assert_eq!(
            reject(&mut ledger, &mut effects, holder, &[], &[(FUNGIBLE.to_address(), 1)]),
            Err(ResponseCode::InvalidNftId)
        );
        assert_eq!(
            reject(&mut ledger, &mut effects, holder, &[], &[(UNIQUE.to_address(), 2)]),
            Err(ResponseCode::InvalidNftId)
        );

        ledger.relationship_mut(HOLDER, FUNGIBLE).unwrap().frozen = true;
        assert_eq!(
            reject(&mut ledger, &mut effects, holder, &[FUNGIBLE.to_address()], &[]),
            Err(ResponseCode::AccountFrozenForToken)
        );

        ledger.relationship_mut(HOLDER, FUNGIBLE).unwrap().frozen = false;
        ledger.relationship_mut(HOLDER, FUNGIBLE).unwrap().balance = 0;
        assert_eq!(
            reject(&mut ledger, &mut effects, holder, &[FUNGIBLE.to_address()], &[]),
            Err(ResponseCode::InsufficientTokenBalance)
        );

        ledger.token_mut(FUNGIBLE).unwrap().paused = true;
        assert_eq!(
            reject(&mut ledger, &mut effects, holder, &[FUNGIBLE.to_address()], &[]),
            Err(ResponseCode::TokenIsPaused)
        );
    }

    #[test]
    fn nft_owned_by_someone_else() {
        let mut ledger = ledger();
        ledger.set_nft_owner(NftId::new(UNIQUE, 1), TREASURY).unwrap();
        let mut effects = SideEffects::default();
        let err = reject(&mut ledger, &mut effects, HOLDER.to_address(), &[], &[(UNIQUE.to_address(), 1)])
            .unwrap_err();
        assert_eq!(err, ResponseCode::InvalidOwnerId);
    }
}
