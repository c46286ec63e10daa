//! Solidity surface of the token service system contract.
//!
//! Decodes calldata into an [`Operation`] and encodes the `responseCode`-first
//! return tuples contracts expect.

use crate::{
    ops::{Operation, OperationKind},
    record::ResultPayload,
};
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{sol, SolCall, SolInterface, SolValue};
use hts_primitives::ResponseCode;

sol! {
    /// Token service functions reachable through the system contract.
    #[sol(all_derives)]
    interface IHederaTokenService {
        struct AccountAmount {
            address accountID;
            int64 amount;
            bool isApproval;
        }

        struct NftTransfer {
            address senderAccountID;
            address receiverAccountID;
            int64 serialNumber;
            bool isApproval;
        }

        struct TokenTransferList {
            address token;
            AccountAmount[] transfers;
            NftTransfer[] nftTransfers;
        }

        struct Expiry {
            int64 second;
            address autoRenewAccount;
            int64 autoRenewPeriod;
        }

        struct FixedFee {
            int64 amount;
            address tokenId;
            bool useHbarsForPayment;
            bool useCurrentTokenForPayment;
            address feeCollector;
        }

        struct FractionalFee {
            int64 numerator;
            int64 denominator;
            int64 minimumAmount;
            int64 maximumAmount;
            bool netOfTransfers;
            address feeCollector;
        }

        struct RoyaltyFee {
            int64 numerator;
            int64 denominator;
            int64 amount;
            address tokenId;
            bool useHbarsForPayment;
            address feeCollector;
        }

        struct NftID {
            address nft;
            int64 serial;
        }

        function associateToken(address account, address token) external returns (int64 responseCode);
        function associateTokens(address account, address[] memory tokens) external returns (int64 responseCode);
        function dissociateToken(address account, address token) external returns (int64 responseCode);
        function dissociateTokens(address account, address[] memory tokens) external returns (int64 responseCode);

        function mintToken(address token, int64 amount, bytes[] memory metadata)
            external
            returns (int64 responseCode, int64 newTotalSupply, int64[] memory serialNumbers);
        function burnToken(address token, int64 amount, int64[] memory serialNumbers)
            external
            returns (int64 responseCode, int64 newTotalSupply);
        function wipeTokenAccount(address token, address account, int64 amount) external returns (int64 responseCode);
        function wipeTokenAccountNFT(address token, address account, int64[] memory serialNumbers)
            external
            returns (int64 responseCode);

        function freezeToken(address token, address account) external returns (int64 responseCode);
        function unfreezeToken(address token, address account) external returns (int64 responseCode);
        function grantTokenKyc(address token, address account) external returns (int64 responseCode);
        function revokeTokenKyc(address token, address account) external returns (int64 responseCode);
        function pauseToken(address token) external returns (int64 responseCode);
        function unpauseToken(address token) external returns (int64 responseCode);

        function airdropTokens(TokenTransferList[] memory tokenTransfers) external returns (int64 responseCode);
        function updateFungibleTokenCustomFees(
            address token,
            FixedFee[] memory fixedFees,
            FractionalFee[] memory fractionalFees
        ) external returns (int64 responseCode);
        function updateNonFungibleTokenCustomFees(
            address token,
            FixedFee[] memory fixedFees,
            RoyaltyFee[] memory royaltyFees
        ) external returns (int64 responseCode);
        function rejectTokens(address rejectingAddress, address[] memory ftAddresses, NftID[] memory nftIds)
            external
            returns (int64 responseCode);

        function isFrozen(address token, address account) external returns (int64 responseCode, bool frozen);
        function isKyc(address token, address account) external returns (int64 responseCode, bool kycGranted);
        function isToken(address token) external returns (int64 responseCode, bool isTokenFlag);
        function getTokenType(address token) external returns (int64 responseCode, int32 tokenType);
        function getTokenExpiryInfo(address token) external returns (int64 responseCode, Expiry memory expiry);
        function getTokenDefaultFreezeStatus(address token)
            external
            returns (int64 responseCode, bool defaultFreezeStatus);
        function getTokenDefaultKycStatus(address token)
            external
            returns (int64 responseCode, bool defaultKycStatus);
    }
}

use IHederaTokenService::*;

/// A supported function and the operation it maps to.
#[derive(Debug, Clone, Copy)]
pub struct FunctionInfo {
    /// Canonical Solidity signature.
    pub signature: &'static str,
    /// 4-byte selector.
    pub selector: [u8; 4],
    /// Operation executed.
    pub kind: OperationKind,
}

macro_rules! functions {
    ($($call:ty => $kind:ident),+ $(,)?) => {
        &[$(FunctionInfo {
            signature: <$call as SolCall>::SIGNATURE,
            selector: <$call as SolCall>::SELECTOR,
            kind: OperationKind::$kind,
        }),+]
    };
}

/// Every function the dispatcher routes.
pub const FUNCTIONS: &[FunctionInfo] = functions![
    associateTokenCall => Associate,
    associateTokensCall => Associate,
    dissociateTokenCall => Dissociate,
    dissociateTokensCall => Dissociate,
    mintTokenCall => Mint,
    burnTokenCall => Burn,
    wipeTokenAccountCall => Wipe,
    wipeTokenAccountNFTCall => Wipe,
    freezeTokenCall => Freeze,
    unfreezeTokenCall => Unfreeze,
    grantTokenKycCall => GrantKyc,
    revokeTokenKycCall => RevokeKyc,
    pauseTokenCall => Pause,
    unpauseTokenCall => Unpause,
    airdropTokensCall => Airdrop,
    updateFungibleTokenCustomFeesCall => UpdateFees,
    updateNonFungibleTokenCustomFeesCall => UpdateFees,
    rejectTokensCall => Reject,
    isFrozenCall => IsFrozen,
    isKycCall => IsKyc,
    isTokenCall => IsToken,
    getTokenTypeCall => GetTokenType,
    getTokenExpiryInfoCall => GetTokenExpiryInfo,
    getTokenDefaultFreezeStatusCall => GetTokenDefaultFreezeStatus,
    getTokenDefaultKycStatusCall => GetTokenDefaultKycStatus,
];

/// Outcome of decoding precompile calldata.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedInput {
    /// Too short to carry a selector, or the selector is not ours.
    Unrecognized,
    /// Known selector with arguments that do not decode.
    Malformed(String),
    /// A decoded operation.
    Call(Operation),
}

/// Decodes calldata by selector.
pub fn decode_input(data: &[u8]) -> DecodedInput {
    let Some(selector) = data.get(..4) else {
        return DecodedInput::Unrecognized;
    };
    let mut raw = [0u8; 4];
    raw.copy_from_slice(selector);
    if !IHederaTokenServiceCalls::valid_selector(raw) {
        return DecodedInput::Unrecognized;
    }
    match IHederaTokenServiceCalls::abi_decode(data) {
        Ok(call) => DecodedInput::Call(call.into()),
        Err(err) => DecodedInput::Malformed(err.to_string()),
    }
}

impl From<IHederaTokenServiceCalls> for Operation {
    fn from(call: IHederaTokenServiceCalls) -> Self {
        use IHederaTokenServiceCalls as C;
        match call {
            C::associateToken(c) => Self::Associate { account: c.account, tokens: vec![c.token] },
            C::associateTokens(c) => Self::Associate { account: c.account, tokens: c.tokens },
            C::dissociateToken(c) => Self::Dissociate { account: c.account, tokens: vec![c.token] },
            C::dissociateTokens(c) => Self::Dissociate { account: c.account, tokens: c.tokens },
            C::mintToken(c) => Self::Mint { token: c.token, amount: c.amount, metadata: c.metadata },
            C::burnToken(c) => {
                Self::Burn { token: c.token, amount: c.amount, serials: c.serialNumbers }
            }
            C::wipeTokenAccount(c) => {
                Self::WipeFungible { token: c.token, account: c.account, amount: c.amount }
            }
            C::wipeTokenAccountNFT(c) => {
                Self::WipeNft { token: c.token, account: c.account, serials: c.serialNumbers }
            }
            C::freezeToken(c) => Self::Freeze { token: c.token, account: c.account },
            C::unfreezeToken(c) => Self::Unfreeze { token: c.token, account: c.account },
            C::grantTokenKyc(c) => Self::GrantKyc { token: c.token, account: c.account },
            C::revokeTokenKyc(c) => Self::RevokeKyc { token: c.token, account: c.account },
            C::pauseToken(c) => Self::Pause { token: c.token },
            C::unpauseToken(c) => Self::Unpause { token: c.token },
            C::airdropTokens(c) => Self::Airdrop { transfers: c.tokenTransfers },
            C::updateFungibleTokenCustomFees(c) => Self::UpdateFungibleFees {
                token: c.token,
                fixed: c.fixedFees,
                fractional: c.fractionalFees,
            },
            C::updateNonFungibleTokenCustomFees(c) => Self::UpdateNftFees {
                token: c.token,
                fixed: c.fixedFees,
                royalty: c.royaltyFees,
            },
            C::rejectTokens(c) => Self::Reject {
                owner: c.rejectingAddress,
                fungible: c.ftAddresses,
                nfts: c.nftIds.into_iter().map(|id| (id.nft, id.serial)).collect(),
            },
            C::isFrozen(c) => Self::IsFrozen { token: c.token, account: c.account },
            C::isKyc(c) => Self::IsKyc { token: c.token, account: c.account },
            C::isToken(c) => Self::IsToken { token: c.token },
            C::getTokenType(c) => Self::GetTokenType { token: c.token },
            C::getTokenExpiryInfo(c) => Self::GetTokenExpiryInfo { token: c.token },
            C::getTokenDefaultFreezeStatus(c) => Self::GetTokenDefaultFreezeStatus { token: c.token },
            C::getTokenDefaultKycStatus(c) => Self::GetTokenDefaultKycStatus { token: c.token },
        }
    }
}

/// Encodes the return data of `kind` for `status`.
///
/// Failed calls keep the success shape with zeroed values so callers can
/// always decode the response code from the first word.
pub fn encode_output(kind: OperationKind, status: ResponseCode, payload: &ResultPayload) -> Bytes {
    let rc = i64::from(status.code());
    let encoded = match kind {
        OperationKind::Mint => {
            let (supply, serials) = match payload {
                ResultPayload::Supply { total_supply, serial_numbers } => {
                    (*total_supply, serial_numbers.clone())
                }
                _ => (0, Vec::new()),
            };
            (rc, supply, serials).abi_encode_params()
        }
        OperationKind::Burn => {
            let supply = match payload {
                ResultPayload::Supply { total_supply, .. } => *total_supply,
                _ => 0,
            };
            (rc, supply).abi_encode_params()
        }
        OperationKind::IsFrozen
        | OperationKind::IsKyc
        | OperationKind::IsToken
        | OperationKind::GetTokenDefaultFreezeStatus
        | OperationKind::GetTokenDefaultKycStatus => {
            let flag = matches!(payload, ResultPayload::Bool { value: true });
            (rc, flag).abi_encode_params()
        }
        OperationKind::GetTokenType => {
            let token_type = match payload {
                ResultPayload::TokenType { value } => *value,
                _ => 0,
            };
            (rc, token_type).abi_encode_params()
        }
        OperationKind::GetTokenExpiryInfo => {
            let expiry = match payload {
                ResultPayload::Expiry(expiry) => (
                    expiry.second,
                    expiry.auto_renew_account.map(|a| a.to_address()).unwrap_or(Address::ZERO),
                    expiry.auto_renew_period,
                ),
                _ => (0, Address::ZERO, 0),
            };
            (rc, expiry).abi_encode_params()
        }
        _ => rc.abi_encode(),
    };
    encoded.into()
}
