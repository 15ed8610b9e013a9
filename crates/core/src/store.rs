//! Authoritative in-memory ledger state.
//!
//! The store enforces nothing beyond existence; rule checks live in the
//! engines, which validate everything before calling any `put_*`.

use std::collections::{BTreeMap, HashMap};

use crate::account::{Account, Token, Topic};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::transaction::{TransactionId, TransactionReceipt};
use crate::types::{AccountId, EntityId, EntityKind, EntityRef, TokenId, TopicId};

#[derive(Debug)]
pub struct LedgerStore {
    shard: u64,
    realm: u64,
    counters: HashMap<EntityKind, u64>,
    first_entity_num: u64,
    next_nonce: u64,
    accounts: BTreeMap<AccountId, Account>,
    tokens: BTreeMap<TokenId, Token>,
    topics: BTreeMap<TopicId, Topic>,
    receipts: HashMap<TransactionId, std::result::Result<TransactionReceipt, LedgerError>>,
}

impl LedgerStore {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            shard: config.shard,
            realm: config.realm,
            counters: HashMap::new(),
            first_entity_num: config.first_entity_num,
            next_nonce: 1,
            accounts: BTreeMap::new(),
            tokens: BTreeMap::new(),
            topics: BTreeMap::new(),
            receipts: HashMap::new(),
        }
    }

    /// Monotonic per-kind id allocation.
    pub fn next_id(&mut self, kind: EntityKind) -> EntityId {
        let counter = self.counters.entry(kind).or_insert(self.first_entity_num);
        let num = *counter;
        *counter += 1;
        EntityId::new(self.shard, self.realm, num)
    }

    pub fn next_nonce(&mut self) -> u64 {
        let nonce = self.next_nonce;
        self.next_nonce += 1;
        nonce
    }

    pub fn get_account(&self, id: &AccountId) -> Result<&Account> {
        self.accounts
            .get(id)
            .ok_or(LedgerError::NotFound(EntityRef::Account(*id)))
    }

    pub fn get_token(&self, id: &TokenId) -> Result<&Token> {
        self.tokens
            .get(id)
            .ok_or(LedgerError::NotFound(EntityRef::Token(*id)))
    }

    pub fn get_topic(&self, id: &TopicId) -> Result<&Topic> {
        self.topics
            .get(id)
            .ok_or(LedgerError::NotFound(EntityRef::Topic(*id)))
    }

    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    pub fn put_token(&mut self, token: Token) {
        self.tokens.insert(token.id, token);
    }

    pub fn put_topic(&mut self, topic: Topic) {
        self.topics.insert(topic.id, topic);
    }

    pub(crate) fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account> {
        self.accounts
            .get_mut(id)
            .ok_or(LedgerError::NotFound(EntityRef::Account(*id)))
    }

    pub(crate) fn topic_mut(&mut self, id: &TopicId) -> Result<&mut Topic> {
        self.topics
            .get_mut(id)
            .ok_or(LedgerError::NotFound(EntityRef::Topic(*id)))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn receipt(
        &self,
        id: &TransactionId,
    ) -> Option<&std::result::Result<TransactionReceipt, LedgerError>> {
        self.receipts.get(id)
    }

    pub fn record_outcome(
        &mut self,
        id: TransactionId,
        outcome: std::result::Result<TransactionReceipt, LedgerError>,
    ) {
        self.receipts.insert(id, outcome);
    }
}
