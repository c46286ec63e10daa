//! Response codes reported by the token service.
//!
//! The numeric values follow the HAPI `ResponseCodeEnum` numbering so the
//! `int64 responseCode` returned to contracts keeps its familiar meaning.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

macro_rules! response_codes {
    ($($variant:ident = $code:literal => $name:literal,)+) => {
        /// Status of a call or of one of its child records.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        #[allow(missing_docs)]
        pub enum ResponseCode {
            $($variant,)+
        }

        impl ResponseCode {
            /// Every known code, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Numeric protocol value.
            pub const fn code(&self) -> i32 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Protocol name, e.g. `TOKEN_WAS_DELETED`.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Looks a code up by its numeric value.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl FromStr for ResponseCode {
            type Err = UnknownResponseCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(UnknownResponseCode(other.to_string())),
                }
            }
        }
    };
}

response_codes! {
    InvalidSignature = 7 => "INVALID_SIGNATURE",
    NotSupported = 13 => "NOT_SUPPORTED",
    InvalidAccountId = 15 => "INVALID_ACCOUNT_ID",
    Success = 22 => "SUCCESS",
    FailInvalid = 23 => "FAIL_INVALID",
    InsufficientGas = 30 => "INSUFFICIENT_GAS",
    ContractRevertExecuted = 33 => "CONTRACT_REVERT_EXECUTED",
    AccountFrozenForToken = 165 => "ACCOUNT_FROZEN_FOR_TOKEN",
    TokensPerAccountLimitExceeded = 166 => "TOKENS_PER_ACCOUNT_LIMIT_EXCEEDED",
    InvalidTokenId = 167 => "INVALID_TOKEN_ID",
    TokenHasNoFreezeKey = 172 => "TOKEN_HAS_NO_FREEZE_KEY",
    TransfersNotZeroSumForToken = 173 => "TRANSFERS_NOT_ZERO_SUM_FOR_TOKEN",
    AccountKycNotGrantedForToken = 176 => "ACCOUNT_KYC_NOT_GRANTED_FOR_TOKEN",
    TokenHasNoKycKey = 177 => "TOKEN_HAS_NO_KYC_KEY",
    InsufficientTokenBalance = 178 => "INSUFFICIENT_TOKEN_BALANCE",
    TokenWasDeleted = 179 => "TOKEN_WAS_DELETED",
    TokenHasNoSupplyKey = 180 => "TOKEN_HAS_NO_SUPPLY_KEY",
    TokenHasNoWipeKey = 181 => "TOKEN_HAS_NO_WIPE_KEY",
    InvalidTokenMintAmount = 182 => "INVALID_TOKEN_MINT_AMOUNT",
    InvalidTokenBurnAmount = 183 => "INVALID_TOKEN_BURN_AMOUNT",
    TokenNotAssociatedToAccount = 184 => "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT",
    CannotWipeTokenTreasuryAccount = 185 => "CANNOT_WIPE_TOKEN_TREASURY_ACCOUNT",
    InvalidWipingAmount = 192 => "INVALID_WIPING_AMOUNT",
    TransactionRequiresZeroTokenBalances = 195 => "TRANSACTION_REQUIRES_ZERO_TOKEN_BALANCES",
    AccountIsTreasury = 196 => "ACCOUNT_IS_TREASURY",
    InvalidNftId = 226 => "INVALID_NFT_ID",
    MetadataTooLong = 227 => "METADATA_TOO_LONG",
    BatchSizeLimitExceeded = 228 => "BATCH_SIZE_LIMIT_EXCEEDED",
    FractionDividesByZero = 230 => "FRACTION_DIVIDES_BY_ZERO",
    CustomFeesListTooLong = 232 => "CUSTOM_FEES_LIST_TOO_LONG",
    InvalidCustomFeeCollector = 233 => "INVALID_CUSTOM_FEE_COLLECTOR",
    InvalidTokenIdInCustomFees = 234 => "INVALID_TOKEN_ID_IN_CUSTOM_FEES",
    TokenNotAssociatedToFeeCollector = 235 => "TOKEN_NOT_ASSOCIATED_TO_FEE_COLLECTOR",
    TokenMaxSupplyReached = 236 => "TOKEN_MAX_SUPPLY_REACHED",
    SenderDoesNotOwnNftSerialNo = 237 => "SENDER_DOES_NOT_OWN_NFT_SERIAL_NO",
    CustomFeeMustBePositive = 239 => "CUSTOM_FEE_MUST_BE_POSITIVE",
    TokenHasNoFeeScheduleKey = 240 => "TOKEN_HAS_NO_FEE_SCHEDULE_KEY",
    RoyaltyFractionCannotExceedOne = 242 => "ROYALTY_FRACTION_CANNOT_EXCEED_ONE",
    FractionalFeeMaxAmountLessThanMinAmount = 243 => "FRACTIONAL_FEE_MAX_AMOUNT_LESS_THAN_MIN_AMOUNT",
    CustomScheduleAlreadyHasNoFees = 244 => "CUSTOM_SCHEDULE_ALREADY_HAS_NO_FEES",
    CustomFeeDenominationMustBeFungibleCommon = 245 => "CUSTOM_FEE_DENOMINATION_MUST_BE_FUNGIBLE_COMMON",
    CustomFractionalFeeOnlyAllowedForFungibleCommon = 246 => "CUSTOM_FRACTIONAL_FEE_ONLY_ALLOWED_FOR_FUNGIBLE_COMMON",
    InvalidTokenMintMetadata = 248 => "INVALID_TOKEN_MINT_METADATA",
    TreasuryMustOwnBurnedNft = 252 => "TREASURY_MUST_OWN_BURNED_NFT",
    AccountDoesNotOwnWipedNft = 253 => "ACCOUNT_DOES_NOT_OWN_WIPED_NFT",
    AccountAmountTransfersOnlyAllowedForFungibleCommon = 254 => "ACCOUNT_AMOUNT_TRANSFERS_ONLY_ALLOWED_FOR_FUNGIBLE_COMMON",
    CustomRoyaltyFeeOnlyAllowedForNonFungibleUnique = 261 => "CUSTOM_ROYALTY_FEE_ONLY_ALLOWED_FOR_NON_FUNGIBLE_UNIQUE",
    TokenIsPaused = 265 => "TOKEN_IS_PAUSED",
    TokenHasNoPauseKey = 266 => "TOKEN_HAS_NO_PAUSE_KEY",
    InvalidOwnerId = 290 => "INVALID_OWNER_ID",
    SpenderDoesNotHaveAllowance = 292 => "SPENDER_DOES_NOT_HAVE_ALLOWANCE",
    InvalidFullPrefixSignatureForPrecompile = 325 => "INVALID_FULL_PREFIX_SIGNATURE_FOR_PRECOMPILE",
    TokenReferenceRepeated = 366 => "TOKEN_REFERENCE_REPEATED",
    TokenReferenceListSizeLimitExceeded = 367 => "TOKEN_REFERENCE_LIST_SIZE_LIMIT_EXCEEDED",
    EmptyTokenReferenceList = 369 => "EMPTY_TOKEN_REFERENCE_LIST",
}

impl ResponseCode {
    /// Returns true for [`ResponseCode::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response-code name that is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown response code `{0}`")]
pub struct UnknownResponseCode(String);
