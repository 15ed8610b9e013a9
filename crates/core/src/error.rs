use std::time::Duration;

use thiserror::Error;

use crate::transaction::{TransactionId, TransactionState};
use crate::types::{AccountId, Amount, Asset, EntityRef, TokenId, TopicId};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Every way a ledger operation can be rejected. A rejected operation never
/// leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(EntityRef),

    #[error("signature requirement of {0} not met")]
    Unauthorized(EntityRef),

    #[error("invalid supply configuration: {0}")]
    InvalidSupplyConfiguration(String),

    #[error("minting {requested} of token {token} exceeds max supply {max_supply} (current {current})")]
    SupplyLimitExceeded {
        token: TokenId,
        current: Amount,
        requested: Amount,
        max_supply: Amount,
    },

    #[error("account {account} holds {balance} {asset}, cannot apply {delta}")]
    InsufficientBalance {
        account: AccountId,
        asset: Asset,
        balance: Amount,
        delta: i128,
    },

    #[error("account {account} is not associated with token {token}")]
    NotAssociated { account: AccountId, token: TokenId },

    #[error("transfer of {asset} does not sum to zero (imbalance {imbalance})")]
    Unbalanced { asset: Asset, imbalance: i128 },

    #[error("no message on topic {topic} within {waited:?}")]
    Timeout { topic: TopicId, waited: Duration },

    #[error("transaction {id} is {actual:?}, operation requires {expected}")]
    InvalidState {
        id: TransactionId,
        expected: &'static str,
        actual: TransactionState,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid amount {amount} for token {token}")]
    InvalidAmount { token: TokenId, amount: Amount },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("transaction {0} was already submitted")]
    DuplicateTransaction(TransactionId),

    #[error("digest failure: {0}")]
    Digest(String),
}

impl LedgerError {
    /// Stable short name of the error kind, used in logs and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NotFound",
            LedgerError::Unauthorized(_) => "Unauthorized",
            LedgerError::InvalidSupplyConfiguration(_) => "InvalidSupplyConfiguration",
            LedgerError::SupplyLimitExceeded { .. } => "SupplyLimitExceeded",
            LedgerError::InsufficientBalance { .. } => "InsufficientBalance",
            LedgerError::NotAssociated { .. } => "NotAssociated",
            LedgerError::Unbalanced { .. } => "Unbalanced",
            LedgerError::Timeout { .. } => "Timeout",
            LedgerError::InvalidState { .. } => "InvalidState",
            LedgerError::InvalidKey(_) => "InvalidKey",
            LedgerError::InvalidAmount { .. } => "InvalidAmount",
            LedgerError::InvalidTransaction(_) => "InvalidTransaction",
            LedgerError::DuplicateTransaction(_) => "DuplicateTransaction",
            LedgerError::Digest(_) => "Digest",
        }
    }
}
