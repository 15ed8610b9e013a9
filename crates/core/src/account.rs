use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::Key;
use crate::types::{AccountId, Amount, Digest, Timestamp, TokenId, TopicId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub key: Key,
    pub hbar_balance: Amount,
    /// Presence of an entry is what makes the account associated.
    pub token_balances: BTreeMap<TokenId, Amount>,
}

impl Account {
    pub fn new(id: AccountId, key: Key, hbar_balance: Amount) -> Self {
        Self {
            id,
            key,
            hbar_balance,
            token_balances: BTreeMap::new(),
        }
    }

    pub fn is_associated(&self, token: &TokenId) -> bool {
        self.token_balances.contains_key(token)
    }

    pub fn token_balance(&self, token: &TokenId) -> Option<Amount> {
        self.token_balances.get(token).copied()
    }

    pub fn balances(&self) -> AccountBalance {
        AccountBalance {
            account: self.id,
            hbars: self.hbar_balance,
            tokens: self.token_balances.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountId,
    pub hbars: Amount,
    pub tokens: BTreeMap<TokenId, Amount>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyType {
    Infinite,
    Finite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub supply_type: SupplyType,
    pub total_supply: Amount,
    /// Only set for [`SupplyType::Finite`]; `total_supply <= max_supply` always.
    pub max_supply: Option<Amount>,
    pub treasury: AccountId,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
}

impl Token {
    /// Remaining mintable amount, `None` when unbounded.
    pub fn headroom(&self) -> Option<Amount> {
        match (self.supply_type, self.max_supply) {
            (SupplyType::Finite, Some(max)) => Some(max.saturating_sub(self.total_supply)),
            _ => None,
        }
    }

    pub fn info(&self) -> TokenInfo {
        TokenInfo {
            token: self.id,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            supply_type: self.supply_type,
            total_supply: self.total_supply,
            max_supply: self.max_supply,
            treasury: self.treasury,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub supply_type: SupplyType,
    pub total_supply: Amount,
    pub max_supply: Option<Amount>,
    pub treasury: AccountId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub memo: String,
    pub submit_key: Option<Key>,
    /// Append-only; the message at index `i` has sequence number `i + 1`.
    pub messages: Vec<TopicMessage>,
}

impl Topic {
    pub fn new(id: TopicId, memo: String, submit_key: Option<Key>) -> Self {
        Self {
            id,
            memo,
            submit_key,
            messages: Vec::new(),
        }
    }

    pub fn sequence_number(&self) -> u64 {
        self.messages.len() as u64
    }

    pub fn message(&self, sequence_number: u64) -> Option<&TopicMessage> {
        let index = sequence_number.checked_sub(1)?;
        self.messages.get(usize::try_from(index).ok()?)
    }

    pub fn info(&self) -> TopicInfo {
        TopicInfo {
            topic: self.id,
            memo: self.memo.clone(),
            has_submit_key: self.submit_key.is_some(),
            sequence_number: self.sequence_number(),
            running_hash: self.messages.last().map(|m| m.running_hash).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub topic: TopicId,
    pub memo: String,
    pub has_submit_key: bool,
    pub sequence_number: u64,
    pub running_hash: Digest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic: TopicId,
    pub sequence_number: u64,
    pub consensus_timestamp: Timestamp,
    pub payload: Vec<u8>,
    pub running_hash: Digest,
}
