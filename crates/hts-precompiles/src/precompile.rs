//! Token service system contract as a revm precompile.
//!
//! ## Overview
//!
//! [`HtsPrecompile`] exposes an [`HtsEngine`] at the configured address
//! (`0x..0167` by default). Each EVM call into that address is one
//! invocation: it is decoded, authorized and executed against the native
//! ledger.
//!
//! ## Transactions
//!
//! Invocations never write to the engine directly. They run against a
//! per-transaction working ledger, opened by
//! [`HtsPrecompile::begin_transaction`] together with the transaction's
//! signatures, and folded into the engine by
//! [`HtsPrecompile::finish_transaction`]. A call made with no open
//! transaction opens one without signatures.
//!
//! Every successful invocation gets a sequence number. The adapter keeps it
//! in transient storage of the precompile account and emits it in an
//! [`INVOCATION_EVENT`] log, so both are rolled back with the EVM frame that
//! made the call:
//!
//! - on the next invocation, the transient sequence tells how many earlier
//!   invocations survived, and the working ledger is rewound to them;
//! - at the end of the transaction, the surviving logs tell the same, and
//!   only those invocations are committed. A reverted transaction has no logs
//!   and commits nothing.
//!
//! ## Call context
//!
//! The EVM hands the precompile its immediate caller only, so the key context
//! is a single direct frame for a long-zero contract caller, and empty
//! otherwise. Static frames are reported through the input.
//!
//! ## Results
//!
//! | Outcome | Result |
//! |---------|--------|
//! | success or unknown selector | `PrecompileOutput` with the operation gas and ABI return data |
//! | failed operation | `PrecompileError::Other` carrying the response code name |
//! | halt | `PrecompileError::Other` carrying the halt name |

use crate::{
    auth::{CallKind, Frame},
    config::HtsConfig,
    dispatch::{CallEnv, Dispatched, PrecompileInvocation, STATIC_CALL_REVERT_REASON},
    frame::HtsEngine,
    record::ChildRecord,
    state::Ledger,
};
use alloy_evm::{
    precompiles::{DynPrecompile, Precompile, PrecompileInput, PrecompilesMap},
    revm::precompile::{PrecompileError, PrecompileId, PrecompileResult},
};
use alloy_primitives::{keccak256, Address, Bytes, Log, B256, U256};
use hts_primitives::{ContractId, SignatureMap};
use parking_lot::{Mutex, RwLock};
use revm::precompile::PrecompileOutput;
use std::sync::{Arc, OnceLock};

/// Event emitted by every successful invocation, carrying its sequence
/// number within the transaction.
pub const INVOCATION_EVENT: &str = "HtsInvocation(uint64)";

/// Transient storage slot of the precompile account holding the number of
/// invocations that survived so far.
const SEQUENCE_SLOT: U256 = U256::ZERO;

/// Topic of [`INVOCATION_EVENT`].
pub fn invocation_topic() -> B256 {
    static TOPIC: OnceLock<B256> = OnceLock::new();
    *TOPIC.get_or_init(|| keccak256(INVOCATION_EVENT))
}

/// A successful invocation of the running transaction.
#[derive(Debug)]
struct Applied {
    /// Working ledger before the invocation ran.
    before: Ledger,
    record: ChildRecord,
}

/// Working state of the running transaction.
#[derive(Debug)]
struct PendingTransaction {
    signatures: SignatureMap,
    ledger: Ledger,
    applied: Vec<Applied>,
}

impl PendingTransaction {
    const fn new(ledger: Ledger, signatures: SignatureMap) -> Self {
        Self { signatures, ledger, applied: Vec::new() }
    }

    /// Drops the invocations past the first `surviving`.
    ///
    /// EVM frames revert in LIFO order, so the survivors are always a prefix.
    fn rewind(&mut self, surviving: usize) {
        if surviving >= self.applied.len() {
            return;
        }
        tracing::debug!(
            target: "hts::precompile",
            surviving,
            dropped = self.applied.len() - surviving,
            "rewinding reverted invocations"
        );
        let mut dropped = self.applied.drain(surviving..);
        if let Some(first) = dropped.next() {
            self.ledger = first.before;
        }
    }
}

/// Token service precompile backed by a shared [`HtsEngine`].
#[derive(Clone, Debug)]
pub struct HtsPrecompile {
    address: Address,
    engine: Arc<RwLock<HtsEngine>>,
    pending: Arc<Mutex<Option<PendingTransaction>>>,
}

impl HtsPrecompile {
    /// Lazily-initialized precompile ID
    pub fn id() -> &'static PrecompileId {
        static ID: OnceLock<PrecompileId> = OnceLock::new();
        ID.get_or_init(|| PrecompileId::custom("hts"))
    }

    /// Creates the precompile over `ledger`.
    pub fn new(config: HtsConfig, ledger: Ledger) -> Self {
        Self::with_engine(Arc::new(RwLock::new(HtsEngine::new(config, ledger))))
    }

    /// Creates the precompile over an engine shared with other components.
    pub fn with_engine(engine: Arc<RwLock<HtsEngine>>) -> Self {
        let address = engine.read().config().precompile_address;
        Self { address, engine, pending: Arc::default() }
    }

    /// Address the precompile is installed at.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The shared engine.
    pub const fn engine(&self) -> &Arc<RwLock<HtsEngine>> {
        &self.engine
    }

    /// Opens a transaction signed with `signatures`, discarding any
    /// transaction left open.
    pub fn begin_transaction(&self, signatures: SignatureMap) {
        let base = self.engine.read().ledger().clone();
        if self.pending.lock().replace(PendingTransaction::new(base, signatures)).is_some() {
            tracing::debug!(target: "hts::precompile", "discarded unfinished transaction");
        }
    }

    /// Closes the running transaction given the logs it left behind, and
    /// commits the invocations whose [`INVOCATION_EVENT`] log survived.
    ///
    /// Pass no logs for a transaction that reverted. Returns the child
    /// records of the committed invocations.
    pub fn finish_transaction(&self, logs: &[Log]) -> Vec<ChildRecord> {
        let Some(mut tx) = self.pending.lock().take() else {
            return Vec::new();
        };

        let topic = invocation_topic();
        let surviving = logs
            .iter()
            .filter(|log| log.address == self.address && log.topics().first() == Some(&topic))
            .filter_map(|log| U256::try_from_be_slice(&log.data.data))
            .map(|sequence| sequence.saturating_to::<usize>())
            .max()
            .unwrap_or_default();
        tx.rewind(surviving);

        let records: Vec<ChildRecord> = tx.applied.into_iter().map(|applied| applied.record).collect();
        if !records.is_empty() {
            self.engine.write().commit(tx.ledger);
        }
        tracing::info!(target: "hts::precompile", committed = records.len(), "transaction finished");
        records
    }

    /// Drops the running transaction without committing anything.
    pub fn discard_transaction(&self) {
        self.pending.lock().take();
    }

    /// Registers this precompile in `precompiles` at its configured address.
    pub fn install(&self, precompiles: &mut PrecompilesMap) {
        let hts = Arc::new(self.clone());
        let id = Self::id().clone();
        let address = self.address;

        precompiles.apply_precompile(&address, move |_| {
            let hts_for_call = Arc::clone(&hts);
            let id_for_call = id;
            Some(DynPrecompile::new_stateful(id_for_call, move |input| hts_for_call.call(input)))
        });
    }
}

impl Precompile for HtsPrecompile {
    fn precompile_id(&self) -> &PrecompileId {
        Self::id()
    }

    fn call(&self, mut input: PrecompileInput<'_>) -> PrecompileResult {
        let caller = input.caller;
        let gas_limit = input.gas;

        tracing::info!(
            target: "hts::precompile",
            ?caller,
            gas = gas_limit,
            calldata_len = input.data.len(),
            "precompile call invoked"
        );

        let kind = if input.target_address != input.bytecode_address {
            CallKind::DelegateCall
        } else if input.is_static {
            CallKind::StaticCall
        } else {
            CallKind::Call
        };
        let stack = ContractId::from_address(caller).map(Frame::call).into_iter().collect();
        let invocation = PrecompileInvocation { stack, kind, input: Bytes::copy_from_slice(input.data) };

        let address = self.address;
        let internals = input.internals_mut();
        let block_number = internals.block_number().saturating_to::<u64>();
        let surviving = internals.tload(address, SEQUENCE_SLOT).saturating_to::<usize>();

        let mut pending = self.pending.lock();
        let engine = self.engine.read();
        let tx = pending
            .get_or_insert_with(|| PendingTransaction::new(engine.ledger().clone(), SignatureMap::new()));
        tx.rewind(surviving);

        let env = CallEnv { signatures: tx.signatures.clone(), block_number };
        let before = tx.ledger.clone();
        let outcome = engine.invoke_on(&mut tx.ledger, &env, &invocation, gas_limit);
        match outcome.dispatched {
            Dispatched::Ignored => Ok(PrecompileOutput::new(outcome.gas_used, Bytes::new())),
            Dispatched::Executed(record) if record.is_success() => {
                let output = record.output.clone();
                tx.applied.push(Applied { before, record });
                let sequence = U256::from(tx.applied.len());
                internals.tstore(address, SEQUENCE_SLOT, sequence);
                internals.log(Log::new_unchecked(
                    address,
                    vec![invocation_topic()],
                    Bytes::copy_from_slice(&sequence.to_be_bytes::<32>()),
                ));
                Ok(PrecompileOutput::new(outcome.gas_used, output))
            }
            Dispatched::Executed(record) => {
                tracing::debug!(target: "hts::precompile", status = %record.status, "operation failed");
                Err(PrecompileError::other(record.status.to_string()))
            }
            Dispatched::Halted(reason) => {
                tracing::debug!(target: "hts::precompile", %reason, "precompile halted");
                Err(PrecompileError::other(reason.to_string()))
            }
            Dispatched::StaticRevert => Err(PrecompileError::other_static(STATIC_CALL_REVERT_REASON)),
        }
    }

    fn is_pure(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abi::IHederaTokenService::{isTokenCall, mintTokenCall, pauseTokenCall},
        config::HTS_PRECOMPILE_ADDRESS,
        state::{Account, KeyRole, Token},
    };
    use alloy_evm::EvmInternals;
    use alloy_primitives::bytes;
    use alloy_sol_types::{SolCall, SolValue};
    use hts_primitives::{AccountId, Key, PublicKey, ResponseCode, TokenId};
    use revm::{
        context::{
            journal::{Journal, JournalInner},
            BlockEnv, CfgEnv, TxEnv,
        },
        database::{CacheDB, EmptyDB},
        primitives::hardfork::SpecId,
    };

    type TestJournal = Journal<CacheDB<EmptyDB>>;

    const GAS_LIMIT: u64 = 1_000_000;
    const CONTRACT: AccountId = AccountId(1001);
    const TREASURY: AccountId = AccountId(2);
    const TOKEN: TokenId = TokenId(500);
    const SIGNED_TOKEN: TokenId = TokenId(600);

    fn supply_signer() -> PublicKey {
        PublicKey::Ed25519(B256::repeat_byte(0xaa))
    }

    struct Harness {
        journal: TestJournal,
        block_env: BlockEnv,
        cfg_env: CfgEnv,
        tx_env: TxEnv,
    }

    impl Harness {
        fn new() -> Self {
            let mut journal = Journal::new_with_inner(CacheDB::default(), JournalInner::new());
            journal.inner.set_spec_id(SpecId::PRAGUE);
            Self {
                journal,
                block_env: BlockEnv::default(),
                cfg_env: CfgEnv::default(),
                tx_env: TxEnv::default(),
            }
        }

        fn call_with(
            &mut self,
            precompile: &HtsPrecompile,
            caller: Address,
            bytecode_address: Address,
            is_static: bool,
            data: &[u8],
        ) -> PrecompileResult {
            let input = PrecompileInput {
                data,
                gas: GAS_LIMIT,
                caller,
                value: U256::ZERO,
                target_address: HTS_PRECOMPILE_ADDRESS,
                is_static,
                bytecode_address,
                internals: EvmInternals::new(
                    &mut self.journal,
                    &self.block_env,
                    &self.cfg_env,
                    &self.tx_env,
                ),
            };

            precompile.call(input)
        }

        fn call(&mut self, precompile: &HtsPrecompile, caller: Address, data: &[u8]) -> PrecompileResult {
            self.call_with(precompile, caller, HTS_PRECOMPILE_ADDRESS, false, data)
        }

        /// Runs `body` in a nested frame that reverts afterwards.
        fn reverted_frame<T>(&mut self, body: impl FnOnce(&mut Self) -> T) -> T {
            let checkpoint = self.journal.inner.checkpoint();
            let result = body(self);
            self.journal.inner.checkpoint_revert(checkpoint);
            result
        }

        /// Ends the EVM transaction and returns its logs.
        fn end_transaction(&mut self) -> Vec<Log> {
            let logs = std::mem::take(&mut self.journal.inner.logs);
            self.journal.inner.commit_tx();
            logs
        }
    }

    fn precompile() -> HtsPrecompile {
        let mut ledger = Ledger::new();
        ledger
            .insert_account(Account::contract(CONTRACT))
            .insert_account(Account::new(TREASURY, None))
            .insert_token(
                Token::fungible(TOKEN, TREASURY)
                    .with_key(KeyRole::Supply, Key::contract(CONTRACT.as_contract())),
            )
            .insert_token(
                Token::fungible(SIGNED_TOKEN, TREASURY)
                    .with_key(KeyRole::Supply, Key::Simple { key: supply_signer() }),
            );
        HtsPrecompile::new(HtsConfig::default(), ledger)
    }

    fn mint_of(token: TokenId, amount: i64) -> Vec<u8> {
        mintTokenCall { token: token.to_address(), amount, metadata: vec![] }.abi_encode()
    }

    fn mint(amount: i64) -> Vec<u8> {
        mint_of(TOKEN, amount)
    }

    fn supply_of(precompile: &HtsPrecompile, token: TokenId) -> i64 {
        precompile.engine().read().ledger().token(token).map(|t| t.total_supply).unwrap_or_default()
    }

    fn supply(precompile: &HtsPrecompile) -> i64 {
        supply_of(precompile, TOKEN)
    }

    fn assert_failure(result: PrecompileResult, expected: &str) {
        match result {
            Err(PrecompileError::Other(msg)) => assert_eq!(msg, expected),
            other => panic!("expected {expected}, got {other:?}"),
        }
    }

    #[test]
    fn mint_commits_when_the_transaction_finishes() {
        let precompile = precompile();
        let mut harness = Harness::new();
        precompile.begin_transaction(SignatureMap::new());

        let output =
            harness.call(&precompile, CONTRACT.to_address(), &mint(25)).expect("mint should succeed");
        let (rc, total, serials) = <(i64, i64, Vec<i64>)>::abi_decode_params(&output.bytes).unwrap();
        assert_eq!(rc, 22);
        assert_eq!(total, 25);
        assert!(serials.is_empty());
        assert_eq!(output.gas_used, 20_000);
        assert_eq!(supply(&precompile), 0, "nothing is committed mid-transaction");

        let logs = harness.end_transaction();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].address, HTS_PRECOMPILE_ADDRESS);
        assert_eq!(logs[0].topics(), &[invocation_topic()]);

        let records = precompile.finish_transaction(&logs);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ResponseCode::Success);
        assert_eq!(supply(&precompile), 25);
        assert!(precompile.finish_transaction(&[]).is_empty());
    }

    #[test]
    fn reverted_transaction_commits_nothing() {
        let precompile = precompile();
        let mut harness = Harness::new();

        harness.call(&precompile, CONTRACT.to_address(), &mint(25)).expect("mint should succeed");
        harness.journal.inner.discard_tx();

        assert!(precompile.finish_transaction(&[]).is_empty());
        assert_eq!(supply(&precompile), 0);
    }

    #[test]
    fn enclosing_frame_revert_drops_the_mint() {
        let precompile = precompile();
        let mut harness = Harness::new();

        let result = harness.reverted_frame(|h| h.call(&precompile, CONTRACT.to_address(), &mint(25)));
        assert!(result.is_ok());

        // The transaction itself succeeds after catching the revert.
        let logs = harness.end_transaction();
        assert!(logs.is_empty());
        assert!(precompile.finish_transaction(&logs).is_empty());
        assert_eq!(supply(&precompile), 0);
    }

    #[test]
    fn later_calls_see_reverted_frames_rolled_back() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let contract = CONTRACT.to_address();

        harness.call(&precompile, contract, &mint(3)).expect("first mint");
        harness.reverted_frame(|h| {
            let output = h.call(&precompile, contract, &mint(100)).expect("inner mint");
            let (_, total, _) = <(i64, i64, Vec<i64>)>::abi_decode_params(&output.bytes).unwrap();
            assert_eq!(total, 103);
        });
        let output = harness.call(&precompile, contract, &mint(4)).expect("last mint");
        let (_, total, _) = <(i64, i64, Vec<i64>)>::abi_decode_params(&output.bytes).unwrap();
        assert_eq!(total, 7, "the reverted mint is not visible");

        let records = precompile.finish_transaction(&harness.end_transaction());
        assert_eq!(records.len(), 2);
        assert_eq!(supply(&precompile), 7);
    }

    #[test]
    fn failed_later_call_keeps_earlier_surviving_calls() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let contract = CONTRACT.to_address();

        harness.call(&precompile, contract, &mint(3)).expect("mint");
        // The token has no pause key. The failing frame is caught by the caller.
        let pause = pauseTokenCall { token: TOKEN.to_address() }.abi_encode();
        let result = harness.reverted_frame(|h| h.call(&precompile, contract, &pause));
        assert_failure(result, &ResponseCode::TokenHasNoPauseKey.to_string());

        let records = precompile.finish_transaction(&harness.end_transaction());
        assert_eq!(records.len(), 1);
        assert_eq!(supply(&precompile), 3);
    }

    #[test]
    fn trailing_reverted_calls_are_not_committed() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let contract = CONTRACT.to_address();

        harness.call(&precompile, contract, &mint(3)).expect("mint");
        harness.reverted_frame(|h| h.call(&precompile, contract, &mint(50)).expect("inner mint"));

        let records = precompile.finish_transaction(&harness.end_transaction());
        assert_eq!(records.len(), 1);
        assert_eq!(supply(&precompile), 3);
    }

    #[test]
    fn signatures_last_for_one_transaction() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let contract = CONTRACT.to_address();
        let signed = SignatureMap::new().with_full_prefix(&supply_signer(), bytes!("a1"));

        precompile.begin_transaction(signed);
        harness.call(&precompile, contract, &mint_of(SIGNED_TOKEN, 5)).expect("signed mint");
        precompile.finish_transaction(&harness.end_transaction());
        assert_eq!(supply_of(&precompile, SIGNED_TOKEN), 5);

        // The next transaction carries no signatures.
        let result = harness.call(&precompile, contract, &mint_of(SIGNED_TOKEN, 5));
        assert_failure(result, &ResponseCode::InvalidFullPrefixSignatureForPrecompile.to_string());
        precompile.finish_transaction(&harness.end_transaction());
        assert_eq!(supply_of(&precompile, SIGNED_TOKEN), 5);
    }

    #[test]
    fn unfinished_transaction_is_discarded_on_begin() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let signed = SignatureMap::new().with_full_prefix(&supply_signer(), bytes!("a1"));

        precompile.begin_transaction(signed);
        harness.call(&precompile, CONTRACT.to_address(), &mint(8)).expect("mint");
        harness.end_transaction();

        precompile.begin_transaction(SignatureMap::new());
        let result = harness.call(&precompile, CONTRACT.to_address(), &mint_of(SIGNED_TOKEN, 1));
        assert_failure(result, &ResponseCode::InvalidFullPrefixSignatureForPrecompile.to_string());
        assert!(precompile.finish_transaction(&harness.end_transaction()).is_empty());
        assert_eq!(supply(&precompile), 0);

        precompile.begin_transaction(SignatureMap::new());
        precompile.discard_transaction();
        assert!(precompile.finish_transaction(&[]).is_empty());
    }

    #[test]
    fn foreign_caller_fails() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let stranger = AccountId(4242).to_address();

        let result = harness.call(&precompile, stranger, &mint(25));
        assert_failure(result, &ResponseCode::InvalidFullPrefixSignatureForPrecompile.to_string());
        assert!(harness.journal.inner.logs.is_empty());
        assert!(precompile.finish_transaction(&harness.end_transaction()).is_empty());
        assert_eq!(supply(&precompile), 0);
    }

    #[test]
    fn delegate_call_is_rejected() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let proxy = AccountId(3003).to_address();

        let result = harness.call_with(&precompile, CONTRACT.to_address(), proxy, false, &mint(1));
        assert_failure(result, "INVALID_DELEGATE");
        assert!(precompile.finish_transaction(&harness.end_transaction()).is_empty());
    }

    #[test]
    fn static_frames_allow_views_only() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let contract = CONTRACT.to_address();

        let result = harness.call_with(&precompile, contract, HTS_PRECOMPILE_ADDRESS, true, &mint(1));
        assert_failure(result, STATIC_CALL_REVERT_REASON);

        let calldata = isTokenCall { token: TOKEN.to_address() }.abi_encode();
        let output = harness
            .call_with(&precompile, contract, HTS_PRECOMPILE_ADDRESS, true, &calldata)
            .expect("view in a static frame");
        let (rc, is_token) = <(i64, bool)>::abi_decode_params(&output.bytes).unwrap();
        assert_eq!((rc, is_token), (22, true));
    }

    #[test]
    fn views_and_unknown_selectors() {
        let precompile = precompile();
        let mut harness = Harness::new();
        let calldata = isTokenCall { token: TOKEN.to_address() }.abi_encode();
        let caller = Address::repeat_byte(0x11);

        let output = harness.call(&precompile, caller, &calldata).expect("view should succeed");
        let (rc, is_token) = <(i64, bool)>::abi_decode_params(&output.bytes).unwrap();
        assert_eq!((rc, is_token), (22, true));

        let output = harness.call(&precompile, caller, &[0xab]).expect("short input is a no-op");
        assert!(output.bytes.is_empty());
        assert_eq!(output.gas_used, precompile.engine().read().config().gas.default_precompile_gas);
    }

    #[test]
    fn precompile_is_not_pure() {
        assert!(!precompile().is_pure());
        assert_eq!(precompile().address(), HTS_PRECOMPILE_ADDRESS);
    }
}
