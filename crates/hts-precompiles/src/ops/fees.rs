//! Custom fee schedule replacement.

use super::find_live_token;
use crate::{
    abi::IHederaTokenService as sol,
    config::HtsConfig,
    record::ResultPayload,
    state::{CustomFee, FeeDenomination, FixedFee, FractionalFee, Ledger, RoyaltyFee, Token},
};
use alloy_primitives::Address;
use hts_primitives::{AccountId, ResponseCode, TokenId};

pub(super) fn update_fungible(
    ledger: &mut Ledger,
    config: &HtsConfig,
    token: Address,
    fixed: &[sol::FixedFee],
    fractional: &[sol::FractionalFee],
) -> Result<ResultPayload, ResponseCode> {
    let target = find_live_token(ledger, token)?;
    check_schedule_shape(config, target, fixed.len() + fractional.len())?;
    if !fractional.is_empty() && !target.token_type.is_fungible() {
        return Err(ResponseCode::CustomFractionalFeeOnlyAllowedForFungibleCommon);
    }

    let mut schedule = Vec::with_capacity(fixed.len() + fractional.len());
    for fee in fixed {
        schedule.push(CustomFee::Fixed(fixed_fee(ledger, target, fee)?));
    }
    for fee in fractional {
        schedule.push(CustomFee::Fractional(fractional_fee(ledger, target, fee)?));
    }
    let id = target.id;
    replace_schedule(ledger, id, schedule)
}

pub(super) fn update_non_fungible(
    ledger: &mut Ledger,
    config: &HtsConfig,
    token: Address,
    fixed: &[sol::FixedFee],
    royalty: &[sol::RoyaltyFee],
) -> Result<ResultPayload, ResponseCode> {
    let target = find_live_token(ledger, token)?;
    check_schedule_shape(config, target, fixed.len() + royalty.len())?;
    if !royalty.is_empty() && target.token_type.is_fungible() {
        return Err(ResponseCode::CustomRoyaltyFeeOnlyAllowedForNonFungibleUnique);
    }

    let mut schedule = Vec::with_capacity(fixed.len() + royalty.len());
    for fee in fixed {
        schedule.push(CustomFee::Fixed(fixed_fee(ledger, target, fee)?));
    }
    for fee in royalty {
        schedule.push(CustomFee::Royalty(royalty_fee(ledger, fee)?));
    }
    let id = target.id;
    replace_schedule(ledger, id, schedule)
}

fn check_schedule_shape(config: &HtsConfig, token: &Token, len: usize) -> Result<(), ResponseCode> {
    if len > config.max_custom_fees_allowed {
        return Err(ResponseCode::CustomFeesListTooLong);
    }
    if len == 0 && token.custom_fees.is_empty() {
        return Err(ResponseCode::CustomScheduleAlreadyHasNoFees);
    }
    Ok(())
}

fn replace_schedule(
    ledger: &mut Ledger,
    token: TokenId,
    schedule: Vec<CustomFee>,
) -> Result<ResultPayload, ResponseCode> {
    let token = ledger.token_mut(token).ok_or(ResponseCode::InvalidTokenId)?;
    token.custom_fees = schedule;
    Ok(ResultPayload::None)
}

fn collector(ledger: &Ledger, address: Address) -> Result<AccountId, ResponseCode> {
    ledger.resolve_account(address).ok_or(ResponseCode::InvalidCustomFeeCollector)
}

/// Resolves the unit a fixed fee is paid in. A zero token address means hbar.
fn denomination(
    ledger: &Ledger,
    current: &Token,
    token: Address,
    use_hbar: bool,
    use_current: bool,
    collector: AccountId,
) -> Result<FeeDenomination, ResponseCode> {
    if use_hbar || (!use_current && token.is_zero()) {
        return Ok(FeeDenomination::Hbar);
    }
    let denominating = if use_current {
        current
    } else {
        ledger
            .resolve_token(token)
            .and_then(|id| ledger.token(id))
            .ok_or(ResponseCode::InvalidTokenIdInCustomFees)?
    };
    if !denominating.token_type.is_fungible() {
        return Err(ResponseCode::CustomFeeDenominationMustBeFungibleCommon);
    }
    if ledger.relationship(collector, denominating.id).is_none() {
        return Err(ResponseCode::TokenNotAssociatedToFeeCollector);
    }
    Ok(FeeDenomination::Token(denominating.id))
}

fn fixed_fee(ledger: &Ledger, current: &Token, fee: &sol::FixedFee) -> Result<FixedFee, ResponseCode> {
    if fee.amount <= 0 {
        return Err(ResponseCode::CustomFeeMustBePositive);
    }
    let collector = collector(ledger, fee.feeCollector)?;
    let denomination = denomination(
        ledger,
        current,
        fee.tokenId,
        fee.useHbarsForPayment,
        fee.useCurrentTokenForPayment,
        collector,
    )?;
    Ok(FixedFee { amount: fee.amount, denomination, collector })
}

fn fractional_fee(
    ledger: &Ledger,
    current: &Token,
    fee: &sol::FractionalFee,
) -> Result<FractionalFee, ResponseCode> {
    check_fraction(fee.numerator, fee.denominator)?;
    if fee.minimumAmount < 0 || fee.maximumAmount < 0 {
        return Err(ResponseCode::CustomFeeMustBePositive);
    }
    if fee.maximumAmount > 0 && fee.minimumAmount > fee.maximumAmount {
        return Err(ResponseCode::FractionalFeeMaxAmountLessThanMinAmount);
    }
    let collector = collector(ledger, fee.feeCollector)?;
    if ledger.relationship(collector, current.id).is_none() {
        return Err(ResponseCode::TokenNotAssociatedToFeeCollector);
    }
    Ok(FractionalFee {
        numerator: fee.numerator,
        denominator: fee.denominator,
        minimum_amount: fee.minimumAmount,
        maximum_amount: fee.maximumAmount,
        net_of_transfers: fee.netOfTransfers,
        collector,
    })
}

fn royalty_fee(ledger: &Ledger, fee: &sol::RoyaltyFee) -> Result<RoyaltyFee, ResponseCode> {
    check_fraction(fee.numerator, fee.denominator)?;
    if fee.numerator > fee.denominator {
        return Err(ResponseCode::RoyaltyFractionCannotExceedOne);
    }
    let collector = collector(ledger, fee.feeCollector)?;
    let fallback = match fee.amount {
        0 => None,
        amount if amount < 0 => return Err(ResponseCode::CustomFeeMustBePositive),
        amount => {
            let denomination = if fee.useHbarsForPayment || fee.tokenId.is_zero() {
                FeeDenomination::Hbar
            } else {
                let token = ledger
                    .resolve_token(fee.tokenId)
                    .and_then(|id| ledger.token(id))
                    .ok_or(ResponseCode::InvalidTokenIdInCustomFees)?;
                if !token.token_type.is_fungible() {
                    return Err(ResponseCode::CustomFeeDenominationMustBeFungibleCommon);
                }
                if ledger.relationship(collector, token.id).is_none() {
                    return Err(ResponseCode::TokenNotAssociatedToFeeCollector);
                }
                FeeDenomination::Token(token.id)
            };
            Some(FixedFee { amount, denomination, collector })
        }
    };
    Ok(RoyaltyFee { numerator: fee.numerator, denominator: fee.denominator, fallback, collector })
}

const fn check_fraction(numerator: i64, denominator: i64) -> Result<(), ResponseCode> {
    if denominator == 0 {
        return Err(ResponseCode::FractionDividesByZero);
    }
    if numerator <= 0 || denominator < 0 {
        return Err(ResponseCode::CustomFeeMustBePositive);
    }
    Ok(())
}
