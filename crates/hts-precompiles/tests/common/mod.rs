#![allow(dead_code, unreachable_pub)]

use alloy_primitives::{b256, Bytes};
use alloy_sol_types::SolCall;
use hts_precompiles::{
    auth::Frame,
    dispatch::PrecompileInvocation,
    frame::{CallOutcome, ContractCall, HtsEngine},
    state::{Account, KeyRole, Ledger, Nft, Token},
    HtsConfig,
};
use hts_primitives::{AccountId, ContractId, Key, NftId, PublicKey, SignatureMap, TokenId};

pub const GAS_LIMIT: u64 = 2_000_000;

pub const TREASURY: AccountId = AccountId(1002);
pub const ALICE: AccountId = AccountId(1003);
pub const BOB: AccountId = AccountId(1004);
pub const CAROL: AccountId = AccountId(1005);

/// Administers every fixture token.
pub const ADMIN: ContractId = ContractId(2001);
/// Delegate-called by [`ADMIN`] in delegate scenarios.
pub const LIBRARY: ContractId = ContractId(2002);

pub const FUNGIBLE: TokenId = TokenId(3001);
pub const UNIQUE: TokenId = TokenId(3002);
/// Fungible token with freeze and KYC keys.
pub const GATED: TokenId = TokenId(3003);

pub fn alice_key() -> PublicKey {
    PublicKey::Ed25519(b256!("0xa11ce00000000000000000000000000000000000000000000000000000000001"))
}

pub fn admin_key() -> Key {
    Key::contract(ADMIN)
}

/// Ledger with a treasury controlled by [`ADMIN`] and three tokens.
pub fn ledger() -> Ledger {
    let mut ledger = Ledger::new();
    ledger
        .insert_account(Account::contract(ADMIN.account()))
        .insert_account(Account::contract(LIBRARY.account()))
        .insert_account(Account::new(TREASURY, Some(Key::delegatable(ADMIN))))
        .insert_account(Account::new(ALICE, Some(Key::Simple { key: alice_key() })))
        .insert_account(Account::new(BOB, None).with_max_auto_associations(-1))
        .insert_account(Account::new(CAROL, None))
        .insert_token(
            Token::fungible(FUNGIBLE, TREASURY)
                .with_supply(1_000)
                .with_key(KeyRole::Supply, admin_key())
                .with_key(KeyRole::Wipe, admin_key())
                .with_key(KeyRole::Pause, admin_key())
                .with_key(KeyRole::FeeSchedule, admin_key()),
        )
        .insert_token(
            Token::non_fungible(UNIQUE, TREASURY)
                .with_key(KeyRole::Supply, admin_key())
                .with_key(KeyRole::Wipe, admin_key())
                .with_key(KeyRole::FeeSchedule, admin_key()),
        )
        .insert_token(
            Token::fungible(GATED, TREASURY)
                .with_supply(500)
                .with_key(KeyRole::Freeze, admin_key())
                .with_key(KeyRole::Kyc, admin_key()),
        );
    for serial in 1..=3 {
        ledger.insert_nft(Nft { id: NftId::new(UNIQUE, serial), owner: TREASURY, metadata: Bytes::new() });
    }
    ledger.token_mut(UNIQUE).unwrap().last_serial = 3;
    ledger.token_mut(UNIQUE).unwrap().total_supply = 3;
    ledger.relationship_mut(TREASURY, UNIQUE).unwrap().balance = 3;
    ledger
}

pub fn engine() -> HtsEngine {
    HtsEngine::new(HtsConfig::default(), ledger())
}

pub fn engine_with(config: HtsConfig) -> HtsEngine {
    HtsEngine::new(config, ledger())
}

/// A direct call from [`ADMIN`].
pub fn from_admin(call: impl SolCall) -> PrecompileInvocation {
    PrecompileInvocation::call(vec![Frame::call(ADMIN)], call.abi_encode())
}

/// A call from [`LIBRARY`] code delegate-called by [`ADMIN`].
pub fn through_library(call: impl SolCall) -> PrecompileInvocation {
    PrecompileInvocation::call(vec![Frame::call(ADMIN), Frame::delegate(ADMIN, LIBRARY)], call.abi_encode())
}

pub fn contract_call(invocations: Vec<PrecompileInvocation>) -> ContractCall {
    signed_call(SignatureMap::new(), invocations)
}

pub fn signed_call(signatures: SignatureMap, invocations: Vec<PrecompileInvocation>) -> ContractCall {
    ContractCall { payer: TREASURY, gas_limit: GAS_LIMIT, signatures, block_number: 100, invocations }
}

pub fn run(engine: &mut HtsEngine, invocations: Vec<PrecompileInvocation>) -> CallOutcome {
    engine.execute(&contract_call(invocations))
}

pub fn balance(engine: &HtsEngine, account: AccountId, token: TokenId) -> Option<i64> {
    engine.ledger().relationship(account, token).map(|rel| rel.balance)
}

pub fn supply(engine: &HtsEngine, token: TokenId) -> i64 {
    engine.ledger().token(token).map(|t| t.total_supply).unwrap_or_default()
}
