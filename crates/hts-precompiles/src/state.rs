//! Native token ledger the system contract operates on.
//!
//! The ledger is a plain value: a call takes a snapshot by cloning it on entry
//! and restores the snapshot when it reverts.

use alloy_primitives::{Address, Bytes};
use hts_primitives::{AccountId, Key, NftId, ResponseCode, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default auto-renew period, 90 days.
pub const DEFAULT_AUTO_RENEW_PERIOD: i64 = 7_776_000;

/// An account holding hbar and token relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Key guarding the account. `None` means no signature can satisfy it.
    #[serde(default)]
    pub key: Option<Key>,
    /// Hbar balance in tinybars.
    #[serde(default)]
    pub balance: u64,
    /// Automatic association slots, `-1` for unlimited.
    #[serde(default)]
    pub max_auto_associations: i32,
    /// Slots already consumed by automatic associations.
    #[serde(default)]
    pub used_auto_associations: i32,
    /// Whether the account backs a smart contract.
    #[serde(default)]
    pub smart_contract: bool,
    /// Whether the account was deleted.
    #[serde(default)]
    pub deleted: bool,
}

impl Account {
    /// A plain account guarded by `key`.
    pub const fn new(id: AccountId, key: Option<Key>) -> Self {
        Self {
            id,
            key,
            balance: 0,
            max_auto_associations: 0,
            used_auto_associations: 0,
            smart_contract: false,
            deleted: false,
        }
    }

    /// A contract account. Its default key is its own contract-id key.
    pub fn contract(id: AccountId) -> Self {
        let mut account = Self::new(id, Some(Key::contract(id.as_contract())));
        account.smart_contract = true;
        account
    }

    /// Sets the automatic association limit.
    pub fn with_max_auto_associations(mut self, max: i32) -> Self {
        self.max_auto_associations = max;
        self
    }

    /// Whether another automatic association may be created.
    pub const fn has_free_auto_association_slot(&self) -> bool {
        self.max_auto_associations < 0 || self.used_auto_associations < self.max_auto_associations
    }
}

/// Fungible or non-fungible token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    /// Interchangeable units with a balance per account.
    FungibleCommon,
    /// Individually numbered serials.
    NonFungibleUnique,
}

impl TokenType {
    /// Value returned by `getTokenType`.
    pub const fn abi_value(&self) -> i32 {
        match self {
            Self::FungibleCommon => 0,
            Self::NonFungibleUnique => 1,
        }
    }

    /// Returns true for [`TokenType::FungibleCommon`].
    pub const fn is_fungible(&self) -> bool {
        matches!(self, Self::FungibleCommon)
    }
}

/// Administrative key roles of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyRole {
    /// Admin key.
    Admin,
    /// Mints and burns supply.
    Supply,
    /// Freezes relationships.
    Freeze,
    /// Grants and revokes KYC.
    Kyc,
    /// Pauses the token.
    Pause,
    /// Wipes balances.
    Wipe,
    /// Updates custom fees.
    FeeSchedule,
}

impl KeyRole {
    /// Status reported when the token lacks this key.
    pub const fn missing_status(&self) -> ResponseCode {
        match self {
            Self::Admin => ResponseCode::FailInvalid,
            Self::Supply => ResponseCode::TokenHasNoSupplyKey,
            Self::Freeze => ResponseCode::TokenHasNoFreezeKey,
            Self::Kyc => ResponseCode::TokenHasNoKycKey,
            Self::Pause => ResponseCode::TokenHasNoPauseKey,
            Self::Wipe => ResponseCode::TokenHasNoWipeKey,
            Self::FeeSchedule => ResponseCode::TokenHasNoFeeScheduleKey,
        }
    }
}

/// Optional administrative keys of a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenKeys {
    /// Admin key.
    pub admin: Option<Key>,
    /// Supply key.
    pub supply: Option<Key>,
    /// Freeze key.
    pub freeze: Option<Key>,
    /// KYC key.
    pub kyc: Option<Key>,
    /// Pause key.
    pub pause: Option<Key>,
    /// Wipe key.
    pub wipe: Option<Key>,
    /// Fee schedule key.
    pub fee_schedule: Option<Key>,
}

impl TokenKeys {
    /// The key for `role`, if set.
    pub const fn get(&self, role: KeyRole) -> Option<&Key> {
        match role {
            KeyRole::Admin => self.admin.as_ref(),
            KeyRole::Supply => self.supply.as_ref(),
            KeyRole::Freeze => self.freeze.as_ref(),
            KeyRole::Kyc => self.kyc.as_ref(),
            KeyRole::Pause => self.pause.as_ref(),
            KeyRole::Wipe => self.wipe.as_ref(),
            KeyRole::FeeSchedule => self.fee_schedule.as_ref(),
        }
    }

    /// Sets the key for `role`.
    pub fn set(&mut self, role: KeyRole, key: Option<Key>) {
        let slot = match role {
            KeyRole::Admin => &mut self.admin,
            KeyRole::Supply => &mut self.supply,
            KeyRole::Freeze => &mut self.freeze,
            KeyRole::Kyc => &mut self.kyc,
            KeyRole::Pause => &mut self.pause,
            KeyRole::Wipe => &mut self.wipe,
            KeyRole::FeeSchedule => &mut self.fee_schedule,
        };
        *slot = key;
    }
}

/// Expiry information returned by `getTokenExpiryInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expiry {
    /// Expiration time in epoch seconds.
    pub second: i64,
    /// Account charged for auto-renewal.
    #[serde(default)]
    pub auto_renew_account: Option<AccountId>,
    /// Auto-renew period in seconds.
    pub auto_renew_period: i64,
}

impl Default for Expiry {
    fn default() -> Self {
        Self { second: 0, auto_renew_account: None, auto_renew_period: DEFAULT_AUTO_RENEW_PERIOD }
    }
}

/// Where a fixed fee is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeDenomination {
    /// Paid in hbar.
    Hbar,
    /// Paid in units of a fungible token.
    Token(TokenId),
}

/// A flat fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedFee {
    /// Amount charged.
    pub amount: i64,
    /// Unit the amount is charged in.
    pub denomination: FeeDenomination,
    /// Account receiving the fee.
    pub collector: AccountId,
}

/// A fee proportional to the transferred fungible amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FractionalFee {
    /// Fraction numerator.
    pub numerator: i64,
    /// Fraction denominator.
    pub denominator: i64,
    /// Lower bound on the charged amount.
    pub minimum_amount: i64,
    /// Upper bound on the charged amount, `0` for none.
    pub maximum_amount: i64,
    /// Whether the sender pays on top of the transferred amount.
    pub net_of_transfers: bool,
    /// Account receiving the fee.
    pub collector: AccountId,
}

/// A fee charged on NFT ownership changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoyaltyFee {
    /// Fraction numerator.
    pub numerator: i64,
    /// Fraction denominator.
    pub denominator: i64,
    /// Charged when no fungible value is exchanged.
    #[serde(default)]
    pub fallback: Option<FixedFee>,
    /// Account receiving the fee.
    pub collector: AccountId,
}

/// A custom fee attached to a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CustomFee {
    /// Flat fee.
    Fixed(FixedFee),
    /// Proportional fee, fungible tokens only.
    Fractional(FractionalFee),
    /// Royalty, non-fungible tokens only.
    Royalty(RoyaltyFee),
}

impl CustomFee {
    /// Account receiving the fee.
    pub const fn collector(&self) -> AccountId {
        match self {
            Self::Fixed(fee) => fee.collector,
            Self::Fractional(fee) => fee.collector,
            Self::Royalty(fee) => fee.collector,
        }
    }
}

/// A token and its administrative state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Token id.
    pub id: TokenId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: String,
    /// Fungible or non-fungible.
    pub token_type: TokenType,
    /// Decimals of a fungible token.
    #[serde(default)]
    pub decimals: u32,
    /// Units (or serials) in circulation.
    #[serde(default)]
    pub total_supply: i64,
    /// Upper bound on supply, `None` for infinite.
    #[serde(default)]
    pub max_supply: Option<i64>,
    /// Treasury account receiving minted supply.
    pub treasury: AccountId,
    /// Administrative keys.
    #[serde(default)]
    pub keys: TokenKeys,
    /// Whether new relationships start frozen.
    #[serde(default)]
    pub freeze_default: bool,
    /// Whether the token is paused.
    #[serde(default)]
    pub paused: bool,
    /// Whether the token was deleted.
    #[serde(default)]
    pub deleted: bool,
    /// Custom fee schedule.
    #[serde(default)]
    pub custom_fees: Vec<CustomFee>,
    /// Expiry information.
    #[serde(default)]
    pub expiry: Expiry,
    /// Last serial number handed out.
    #[serde(default)]
    pub last_serial: i64,
}

impl Token {
    /// A fungible token with no keys and no supply.
    pub fn fungible(id: TokenId, treasury: AccountId) -> Self {
        Self::new(id, treasury, TokenType::FungibleCommon)
    }

    /// A non-fungible token with no keys and no serials.
    pub fn non_fungible(id: TokenId, treasury: AccountId) -> Self {
        Self::new(id, treasury, TokenType::NonFungibleUnique)
    }

    fn new(id: TokenId, treasury: AccountId, token_type: TokenType) -> Self {
        Self {
            id,
            name: String::new(),
            symbol: String::new(),
            token_type,
            decimals: 0,
            total_supply: 0,
            max_supply: None,
            treasury,
            keys: TokenKeys::default(),
            freeze_default: false,
            paused: false,
            deleted: false,
            custom_fees: Vec::new(),
            expiry: Expiry::default(),
            last_serial: 0,
        }
    }

    /// Sets the key for `role`.
    pub fn with_key(mut self, role: KeyRole, key: Key) -> Self {
        self.keys.set(role, Some(key));
        self
    }

    /// Sets the initial supply held by the treasury.
    pub fn with_supply(mut self, supply: i64) -> Self {
        self.total_supply = supply;
        self
    }

    /// Sets a finite max supply.
    pub fn with_max_supply(mut self, max: i64) -> Self {
        self.max_supply = Some(max);
        self
    }

    /// Sets the default freeze status of new relationships.
    pub fn with_freeze_default(mut self, frozen: bool) -> Self {
        self.freeze_default = frozen;
        self
    }

    /// Whether the relationship with this token defaults to frozen.
    pub const fn default_frozen(&self) -> bool {
        self.freeze_default && self.keys.freeze.is_some()
    }

    /// Whether new relationships start with KYC granted.
    pub const fn default_kyc_granted(&self) -> bool {
        self.keys.kyc.is_none()
    }
}

/// Link between an account and a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRelationship {
    /// Account side.
    pub account: AccountId,
    /// Token side.
    pub token: TokenId,
    /// Units (or serial count) held.
    #[serde(default)]
    pub balance: i64,
    /// Whether transfers are blocked.
    #[serde(default)]
    pub frozen: bool,
    /// Whether KYC was granted.
    #[serde(default)]
    pub kyc_granted: bool,
    /// Whether the relationship was created automatically.
    #[serde(default)]
    pub automatic_association: bool,
}

/// A minted NFT serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    /// Token and serial.
    pub id: NftId,
    /// Current owner.
    pub owner: AccountId,
    /// Metadata supplied at mint.
    #[serde(default)]
    pub metadata: Bytes,
}

/// Key of a pending airdrop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAirdropId {
    /// Sender.
    pub sender: AccountId,
    /// Intended receiver.
    pub receiver: AccountId,
    /// Token.
    pub token: TokenId,
    /// NFT serial, `None` for fungible airdrops.
    #[serde(default)]
    pub serial: Option<i64>,
}

/// An airdrop waiting to be claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAirdrop {
    /// Airdrop key.
    pub id: PendingAirdropId,
    /// Fungible amount, `0` for NFTs.
    pub amount: i64,
}

/// Errors raised while loading a ledger fixture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A record references an unknown account.
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
    /// A record references an unknown token.
    #[error("unknown token {0}")]
    UnknownToken(TokenId),
    /// The same entity appears twice.
    #[error("duplicate entry {0}")]
    Duplicate(String),
}

/// Serialized form of a [`Ledger`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSnapshot {
    /// Accounts.
    pub accounts: Vec<Account>,
    /// Tokens.
    pub tokens: Vec<Token>,
    /// Relationships. Missing treasury relationships are created on load.
    pub relationships: Vec<TokenRelationship>,
    /// NFTs.
    pub nfts: Vec<Nft>,
    /// Pending airdrops.
    pub pending_airdrops: Vec<PendingAirdrop>,
}

/// In-memory token ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "LedgerSnapshot", try_from = "LedgerSnapshot")]
pub struct Ledger {
    accounts: BTreeMap<AccountId, Account>,
    tokens: BTreeMap<TokenId, Token>,
    relationships: BTreeMap<(AccountId, TokenId), TokenRelationship>,
    nfts: BTreeMap<NftId, Nft>,
    pending_airdrops: BTreeMap<PendingAirdropId, i64>,
}

impl Ledger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // === Setup ===

    /// Inserts (or replaces) an account.
    pub fn insert_account(&mut self, account: Account) -> &mut Self {
        self.accounts.insert(account.id, account);
        self
    }

    /// Inserts a token and associates its treasury, crediting it the
    /// initial supply.
    pub fn insert_token(&mut self, token: Token) -> &mut Self {
        let (id, treasury, supply) = (token.id, token.treasury, token.total_supply);
        let fungible = token.token_type.is_fungible();
        self.tokens.insert(id, token);
        let rel = self.associate(treasury, id, false);
        // The treasury starts unfrozen with KYC granted.
        rel.frozen = false;
        rel.kyc_granted = true;
        if fungible {
            rel.balance = supply;
        }
        self
    }

    // === Lookups ===

    /// Account by id, including deleted accounts.
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// Mutable account by id.
    pub fn account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    /// Token by id, including deleted tokens.
    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    /// Mutable token by id.
    pub fn token_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.tokens.get_mut(&id)
    }

    /// Resolves an EVM address to a live account.
    pub fn resolve_account(&self, address: Address) -> Option<AccountId> {
        let id = AccountId::from_address(address)?;
        self.accounts.get(&id).filter(|a| !a.deleted).map(|a| a.id)
    }

    /// Resolves an EVM address to a token, deleted or not.
    pub fn resolve_token(&self, address: Address) -> Option<TokenId> {
        let id = TokenId::from_address(address)?;
        self.tokens.contains_key(&id).then_some(id)
    }

    /// Relationship between `account` and `token`.
    pub fn relationship(&self, account: AccountId, token: TokenId) -> Option<&TokenRelationship> {
        self.relationships.get(&(account, token))
    }

    /// Mutable relationship between `account` and `token`.
    pub fn relationship_mut(
        &mut self,
        account: AccountId,
        token: TokenId,
    ) -> Option<&mut TokenRelationship> {
        self.relationships.get_mut(&(account, token))
    }

    /// Number of tokens `account` is associated with.
    pub fn association_count(&self, account: AccountId) -> usize {
        self.relationships.range((account, TokenId(0))..=(account, TokenId(u64::MAX))).count()
    }

    /// All relationships, ordered by account then token.
    pub fn relationships(&self) -> impl Iterator<Item = &TokenRelationship> {
        self.relationships.values()
    }

    /// NFT by id.
    pub fn nft(&self, id: NftId) -> Option<&Nft> {
        self.nfts.get(&id)
    }

    /// All serials of `token`.
    pub fn nfts_of(&self, token: TokenId) -> impl Iterator<Item = &Nft> {
        self.nfts.range(NftId::new(token, i64::MIN)..=NftId::new(token, i64::MAX)).map(|(_, nft)| nft)
    }

    /// Pending airdrops, ordered by key.
    pub fn pending_airdrops(&self) -> impl Iterator<Item = PendingAirdrop> + '_ {
        self.pending_airdrops
            .iter()
            .map(|(id, amount)| PendingAirdrop { id: *id, amount: *amount })
    }

    // === Mutations ===

    /// Creates the relationship if missing and returns it.
    ///
    /// New relationships take their frozen and KYC flags from the token.
    pub fn associate(
        &mut self,
        account: AccountId,
        token: TokenId,
        automatic: bool,
    ) -> &mut TokenRelationship {
        let (frozen, kyc_granted) = self
            .tokens
            .get(&token)
            .map_or((false, true), |t| (t.default_frozen(), t.default_kyc_granted()));
        self.relationships.entry((account, token)).or_insert_with(|| TokenRelationship {
            account,
            token,
            balance: 0,
            frozen,
            kyc_granted,
            automatic_association: automatic,
        })
    }

    /// Removes a relationship, returning it.
    pub fn dissociate(&mut self, account: AccountId, token: TokenId) -> Option<TokenRelationship> {
        let rel = self.relationships.remove(&(account, token))?;
        if rel.automatic_association {
            if let Some(acct) = self.accounts.get_mut(&account) {
                acct.used_auto_associations = acct.used_auto_associations.saturating_sub(1);
            }
        }
        Some(rel)
    }

    /// Applies a signed change to a relationship balance.
    pub fn adjust_balance(
        &mut self,
        account: AccountId,
        token: TokenId,
        delta: i64,
    ) -> Result<i64, ResponseCode> {
        let rel = self
            .relationships
            .get_mut(&(account, token))
            .ok_or(ResponseCode::TokenNotAssociatedToAccount)?;
        let next = rel.balance.checked_add(delta).ok_or(ResponseCode::FailInvalid)?;
        if next < 0 {
            return Err(ResponseCode::InsufficientTokenBalance);
        }
        rel.balance = next;
        Ok(next)
    }

    /// Stores a newly minted serial.
    pub fn insert_nft(&mut self, nft: Nft) {
        self.nfts.insert(nft.id, nft);
    }

    /// Removes a serial.
    pub fn remove_nft(&mut self, id: NftId) -> Option<Nft> {
        self.nfts.remove(&id)
    }

    /// Changes the owner of a serial.
    pub fn set_nft_owner(&mut self, id: NftId, owner: AccountId) -> Result<(), ResponseCode> {
        let nft = self.nfts.get_mut(&id).ok_or(ResponseCode::InvalidNftId)?;
        nft.owner = owner;
        Ok(())
    }

    /// Records a pending airdrop, accumulating fungible amounts.
    pub fn add_pending_airdrop(&mut self, id: PendingAirdropId, amount: i64) {
        let entry = self.pending_airdrops.entry(id).or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}

impl From<Ledger> for LedgerSnapshot {
    fn from(ledger: Ledger) -> Self {
        Self {
            accounts: ledger.accounts.into_values().collect(),
            tokens: ledger.tokens.into_values().collect(),
            relationships: ledger.relationships.into_values().collect(),
            nfts: ledger.nfts.into_values().collect(),
            pending_airdrops: ledger
                .pending_airdrops
                .into_iter()
                .map(|(id, amount)| PendingAirdrop { id, amount })
                .collect(),
        }
    }
}

impl TryFrom<LedgerSnapshot> for Ledger {
    type Error = LedgerError;

    fn try_from(snapshot: LedgerSnapshot) -> Result<Self, Self::Error> {
        let mut ledger = Self::new();
        for account in snapshot.accounts {
            if ledger.accounts.contains_key(&account.id) {
                return Err(LedgerError::Duplicate(account.id.to_string()));
            }
            ledger.accounts.insert(account.id, account);
        }
        for token in &snapshot.tokens {
            if ledger.tokens.contains_key(&token.id) {
                return Err(LedgerError::Duplicate(token.id.to_string()));
            }
            if !ledger.accounts.contains_key(&token.treasury) {
                return Err(LedgerError::UnknownAccount(token.treasury));
            }
            ledger.tokens.insert(token.id, token.clone());
        }
        for rel in snapshot.relationships {
            if !ledger.accounts.contains_key(&rel.account) {
                return Err(LedgerError::UnknownAccount(rel.account));
            }
            if !ledger.tokens.contains_key(&rel.token) {
                return Err(LedgerError::UnknownToken(rel.token));
            }
            ledger.relationships.insert((rel.account, rel.token), rel);
        }
        for nft in snapshot.nfts {
            if !ledger.tokens.contains_key(&nft.id.token) {
                return Err(LedgerError::UnknownToken(nft.id.token));
            }
            if !ledger.accounts.contains_key(&nft.owner) {
                return Err(LedgerError::UnknownAccount(nft.owner));
            }
            ledger.nfts.insert(nft.id, nft);
        }
        for token in snapshot.tokens {
            if ledger.relationship(token.treasury, token.id).is_some() {
                continue;
            }
            let balance = if token.token_type.is_fungible() {
                token.total_supply
            } else {
                let owned =
                    ledger.nfts_of(token.id).filter(|nft| nft.owner == token.treasury).count();
                i64::try_from(owned).unwrap_or(i64::MAX)
            };
            let rel = ledger.associate(token.treasury, token.id, false);
            rel.balance = balance;
            rel.frozen = false;
            rel.kyc_granted = true;
        }
        for pending in snapshot.pending_airdrops {
            ledger.add_pending_airdrop(pending.id, pending.amount);
        }
        Ok(ledger)
    }
}
