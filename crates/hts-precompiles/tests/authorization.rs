//! Key activation, legacy signatures and check ordering through full calls.

mod common;

use alloy_primitives::{bytes, Bytes};
use alloy_sol_types::SolCall;
use common::*;
use hts_precompiles::{
    abi::IHederaTokenService::{
        associateTokenCall, burnTokenCall, freezeTokenCall, grantTokenKycCall, mintTokenCall,
        pauseTokenCall, revokeTokenKycCall, unfreezeTokenCall, unpauseTokenCall,
        updateFungibleTokenCustomFeesCall, wipeTokenAccountCall,
    },
    auth::Frame,
    config::LegacySignatureConfig,
    dispatch::PrecompileInvocation,
    ops::OperationKind,
    policy::{Check, CheckOrderPolicy},
    state::{KeyRole, Token},
    HtsConfig, HtsEngine,
};
use hts_primitives::{AccountId, ContractId, Key, ResponseCode, SignatureMap, TokenId};

const BARE: TokenId = TokenId(3999);
const STRANGER: ContractId = ContractId(2999);

/// Every token-keyed function, its key role and its calldata against `token`.
fn gated_calls(token: TokenId) -> Vec<(OperationKind, KeyRole, Bytes)> {
    let token = token.to_address();
    let account = ALICE.to_address();
    vec![
        (
            OperationKind::Mint,
            KeyRole::Supply,
            mintTokenCall { token, amount: 1, metadata: vec![] }.abi_encode().into(),
        ),
        (
            OperationKind::Burn,
            KeyRole::Supply,
            burnTokenCall { token, amount: 1, serialNumbers: vec![] }.abi_encode().into(),
        ),
        (
            OperationKind::Wipe,
            KeyRole::Wipe,
            wipeTokenAccountCall { token, account, amount: 1 }.abi_encode().into(),
        ),
        (OperationKind::Freeze, KeyRole::Freeze, freezeTokenCall { token, account }.abi_encode().into()),
        (
            OperationKind::Unfreeze,
            KeyRole::Freeze,
            unfreezeTokenCall { token, account }.abi_encode().into(),
        ),
        (
            OperationKind::GrantKyc,
            KeyRole::Kyc,
            grantTokenKycCall { token, account }.abi_encode().into(),
        ),
        (
            OperationKind::RevokeKyc,
            KeyRole::Kyc,
            revokeTokenKycCall { token, account }.abi_encode().into(),
        ),
        (OperationKind::Pause, KeyRole::Pause, pauseTokenCall { token }.abi_encode().into()),
        (OperationKind::Unpause, KeyRole::Pause, unpauseTokenCall { token }.abi_encode().into()),
        (
            OperationKind::UpdateFees,
            KeyRole::FeeSchedule,
            updateFungibleTokenCustomFeesCall { token, fixedFees: vec![], fractionalFees: vec![] }
                .abi_encode()
                .into(),
        ),
    ]
}

fn engine_with_bare_token(config: HtsConfig, configure: impl FnOnce(&mut Token)) -> HtsEngine {
    let mut engine = engine_with(config);
    let mut token = Token::fungible(BARE, TREASURY).with_supply(10);
    configure(&mut token);
    engine.ledger_mut().insert_token(token);
    engine
}

fn first_status(engine: &mut HtsEngine, stack: Vec<Frame>, input: Bytes) -> ResponseCode {
    let outcome = run(engine, vec![PrecompileInvocation::call(stack, input)]);
    outcome.child_records.first().map(|record| record.status).unwrap_or(outcome.status)
}

#[test]
fn missing_key_is_reported_per_role() {
    for (kind, role, input) in gated_calls(BARE) {
        let mut engine = engine_with_bare_token(HtsConfig::default(), |_| {});
        let status = first_status(&mut engine, vec![Frame::call(ADMIN)], input);
        assert_eq!(status, role.missing_status(), "{kind}");
    }
}

#[test]
fn deleted_token_wins_under_default_order() {
    for (kind, _, input) in gated_calls(BARE) {
        let mut engine = engine_with_bare_token(HtsConfig::default(), |token| token.deleted = true);
        let status = first_status(&mut engine, vec![Frame::call(STRANGER)], input);
        assert_eq!(status, ResponseCode::TokenWasDeleted, "{kind}");
    }
}

#[test]
fn unsatisfied_key_on_live_token_reports_signature_failure() {
    for (kind, role, input) in gated_calls(BARE) {
        let mut engine =
            engine_with_bare_token(HtsConfig::default(), |token| token.keys.set(role, Some(admin_key())));
        let status = first_status(&mut engine, vec![Frame::call(STRANGER)], input);
        assert_eq!(status, kind.signature_failure(), "{kind}");
    }
}

#[test]
fn signature_first_order_reports_signature_on_deleted_token() {
    for (kind, role, input) in gated_calls(BARE) {
        let config = HtsConfig {
            check_order: CheckOrderPolicy::default()
                .with_order(kind, [Check::Signature, Check::TokenDeleted, Check::KeyPresent]),
            ..HtsConfig::default()
        };
        let mut engine = engine_with_bare_token(config, |token| {
            token.deleted = true;
            token.keys.set(role, Some(admin_key()));
        });
        let status = first_status(&mut engine, vec![Frame::call(STRANGER)], input.clone());
        assert_eq!(status, kind.signature_failure(), "{kind}");

        // The authorized caller falls through to the deleted check.
        let status = first_status(&mut engine, vec![Frame::call(ADMIN)], input);
        assert_eq!(status, ResponseCode::TokenWasDeleted, "{kind}");
    }
}

#[test]
fn unknown_token_precedes_every_check() {
    for (kind, _, input) in gated_calls(TokenId(4_040)) {
        let mut engine = engine();
        let status = first_status(&mut engine, vec![Frame::call(STRANGER)], input);
        assert_eq!(status, ResponseCode::InvalidTokenId, "{kind}");
    }
}

// === Legacy top-level signatures ===

fn associate_alice(engine: &mut HtsEngine, signatures: SignatureMap, block_number: u64) -> ResponseCode {
    let invocation =
        from_admin(associateTokenCall { account: ALICE.to_address(), token: FUNGIBLE.to_address() });
    let mut call = signed_call(signatures, vec![invocation]);
    call.block_number = block_number;
    let outcome = engine.execute(&call);
    outcome.child_records[0].status
}

fn alice_signed() -> SignatureMap {
    SignatureMap::new().with_full_prefix(&alice_key(), bytes!("a1"))
}

fn legacy(configure: impl FnOnce(&mut LegacySignatureConfig)) -> HtsEngine {
    let mut config = HtsConfig::default();
    configure(&mut config.legacy_signatures);
    engine_with(config)
}

#[test]
fn full_prefix_signature_satisfies_simple_key_by_default() {
    assert_eq!(associate_alice(&mut engine(), alice_signed(), 100), ResponseCode::Success);
    assert_eq!(
        associate_alice(&mut engine(), SignatureMap::new(), 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );
}

#[test]
fn partial_prefix_never_satisfies() {
    let partial = SignatureMap::new().with_prefix(&alice_key(), 4, bytes!("a1"));
    assert_eq!(
        associate_alice(&mut engine(), partial, 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );

    // Administration keys report the partial prefix too.
    let mut engine = engine();
    engine
        .ledger_mut()
        .token_mut(FUNGIBLE)
        .unwrap()
        .keys
        .set(KeyRole::Pause, Some(Key::Simple { key: alice_key() }));
    let pause = from_admin(pauseTokenCall { token: FUNGIBLE.to_address() });
    let partial = SignatureMap::new().with_prefix(&alice_key(), 4, bytes!("a1"));
    let outcome = engine.execute(&signed_call(partial, vec![pause.clone()]));
    assert_eq!(outcome.child_records[0].status, ResponseCode::InvalidFullPrefixSignatureForPrecompile);
    let outcome = engine.execute(&signed_call(SignatureMap::new(), vec![pause.clone()]));
    assert_eq!(outcome.child_records[0].status, ResponseCode::InvalidSignature);
    let outcome = engine.execute(&signed_call(alice_signed(), vec![pause]));
    assert_eq!(outcome.status, ResponseCode::Success);
}

#[test]
fn allow_list_gates_top_level_signatures() {
    let mut engine = legacy(|legacy| {
        legacy.allowed_operations.remove(&OperationKind::Associate);
    });
    assert_eq!(
        associate_alice(&mut engine, alice_signed(), 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );

    let mut engine = legacy(|legacy| *legacy = LegacySignatureConfig::disabled());
    assert_eq!(
        associate_alice(&mut engine, alice_signed(), 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );

    let mut engine = legacy(|legacy| {
        legacy.allowed_operations = [OperationKind::Associate].into_iter().collect();
    });
    assert_eq!(associate_alice(&mut engine, alice_signed(), 100), ResponseCode::Success);
}

#[test]
fn cutoff_block_ends_top_level_signatures() {
    let mut engine = legacy(|legacy| legacy.cutoff_block = Some(100));
    assert_eq!(associate_alice(&mut engine, alice_signed(), 99), ResponseCode::Success);

    let mut engine = legacy(|legacy| legacy.cutoff_block = Some(100));
    assert_eq!(
        associate_alice(&mut engine, alice_signed(), 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );
}

#[test]
fn contract_number_cutoff_and_special_access() {
    let mut engine = legacy(|legacy| legacy.max_contract_num = Some(ADMIN.num()));
    assert_eq!(associate_alice(&mut engine, alice_signed(), 100), ResponseCode::Success);

    let mut engine = legacy(|legacy| legacy.max_contract_num = Some(ADMIN.num() - 1));
    assert_eq!(
        associate_alice(&mut engine, alice_signed(), 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );

    let mut engine = legacy(|legacy| {
        legacy.max_contract_num = Some(1);
        legacy.special_access.insert(ADMIN);
    });
    assert_eq!(associate_alice(&mut engine, alice_signed(), 100), ResponseCode::Success);
}

// === Composite keys ===

fn with_alice_key(key: Key) -> HtsEngine {
    let mut engine = engine();
    engine.ledger_mut().account_mut(ALICE).unwrap().key = Some(key);
    engine
}

#[test]
fn threshold_keys_count_components() {
    let components = || vec![Key::Simple { key: alice_key() }, Key::contract(ADMIN)];

    let mut engine = with_alice_key(Key::threshold(1, components()));
    assert_eq!(associate_alice(&mut engine, SignatureMap::new(), 100), ResponseCode::Success);

    let mut engine = with_alice_key(Key::threshold(2, components()));
    assert_eq!(
        associate_alice(&mut engine, SignatureMap::new(), 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );
    let mut engine = with_alice_key(Key::threshold(2, components()));
    assert_eq!(associate_alice(&mut engine, alice_signed(), 100), ResponseCode::Success);

    // Thresholds above N behave as N.
    let mut engine = with_alice_key(Key::threshold(7, components()));
    assert_eq!(associate_alice(&mut engine, alice_signed(), 100), ResponseCode::Success);
}

#[test]
fn key_lists_need_every_component() {
    let list = || Key::List { keys: vec![Key::Simple { key: alice_key() }, Key::delegatable(ADMIN)] };

    let mut engine = with_alice_key(list());
    assert_eq!(
        associate_alice(&mut engine, SignatureMap::new(), 100),
        ResponseCode::InvalidFullPrefixSignatureForPrecompile
    );
    let mut engine = with_alice_key(list());
    assert_eq!(associate_alice(&mut engine, alice_signed(), 100), ResponseCode::Success);
}

#[test]
fn contract_key_rejects_nested_callers() {
    let mut engine = engine();
    let mint = mintTokenCall { token: FUNGIBLE.to_address(), amount: 5, metadata: vec![] }.abi_encode();

    // ADMIN calls LIBRARY, which calls the precompile.
    let status = first_status(&mut engine, vec![Frame::call(ADMIN), Frame::call(LIBRARY)], mint.clone().into());
    assert_eq!(status, ResponseCode::InvalidFullPrefixSignatureForPrecompile);

    let status = first_status(&mut engine, vec![Frame::call(LIBRARY), Frame::call(ADMIN)], mint.into());
    assert_eq!(status, ResponseCode::Success);
}

#[test]
fn accounts_without_keys_cannot_be_acted_for() {
    let mut engine = engine();
    let invocation =
        from_admin(associateTokenCall { account: CAROL.to_address(), token: FUNGIBLE.to_address() });
    let outcome = run(&mut engine, vec![invocation]);
    assert_eq!(outcome.child_records[0].status, ResponseCode::InvalidFullPrefixSignatureForPrecompile);

    let invocation =
        from_admin(associateTokenCall { account: AccountId(9_999).to_address(), token: FUNGIBLE.to_address() });
    let outcome = run(&mut engine, vec![invocation]);
    assert_eq!(outcome.child_records[0].status, ResponseCode::InvalidAccountId);
}
