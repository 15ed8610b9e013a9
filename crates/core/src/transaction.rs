//! Transactions and their lifecycle:
//! `Built -> Frozen -> Signed -> Submitted -> {Committed | Rejected}`.
//!
//! Only `Built` transactions accept edits. Freezing fixes the body and its
//! digest, signing accumulates signer identities over that digest, and the
//! [`Ledger`](crate::Ledger) drives the remaining transitions on submit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::hash::digest;
use crate::key::SignerSet;
use crate::signer::{Credential, Signature, SigningOracle};
use crate::token::TransferLine;
use crate::types::{AccountId, Amount, Delta, Digest, Timestamp, TokenId, TopicId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub payer: AccountId,
    pub nonce: u64,
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.payer, self.nonce)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    Built,
    Frozen,
    Signed,
    Submitted,
    Committed,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBody {
    Transfer { lines: Vec<TransferLine> },
    TokenMint { token: TokenId, amount: Amount },
    TokenAssociate { account: AccountId, token: TokenId },
    TopicMessage { topic: TopicId, payload: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub consensus_timestamp: Timestamp,
    /// Net movements for transfers.
    pub transfers: Vec<TransferLine>,
    /// Total supply after a mint.
    pub total_supply: Option<Amount>,
    /// Sequence number of a submitted topic message.
    pub topic_sequence_number: Option<u64>,
}

impl TransactionReceipt {
    pub fn new(transaction_id: TransactionId, consensus_timestamp: Timestamp) -> Self {
        Self {
            transaction_id,
            consensus_timestamp,
            transfers: Vec::new(),
            total_supply: None,
            topic_sequence_number: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Transaction {
    id: TransactionId,
    body: TransactionBody,
    state: TransactionState,
    digest: Option<Digest>,
    signatures: Vec<Signature>,
    outcome: Option<LedgerError>,
}

impl Transaction {
    pub fn new(id: TransactionId, body: TransactionBody) -> Self {
        Self {
            id,
            body,
            state: TransactionState::Built,
            digest: None,
            signatures: Vec::new(),
            outcome: None,
        }
    }

    /// Empty transfer batch to be filled with line items.
    pub fn transfer(id: TransactionId) -> Self {
        Self::new(id, TransactionBody::Transfer { lines: Vec::new() })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn digest(&self) -> Option<Digest> {
        self.digest
    }

    /// The rejection reason once the transaction is `Rejected`.
    pub fn outcome(&self) -> Option<&LedgerError> {
        self.outcome.as_ref()
    }

    pub fn signers(&self) -> SignerSet {
        self.signatures.iter().map(|s| s.signer).collect()
    }

    fn expect_state(&self, allowed: &[TransactionState], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(LedgerError::InvalidState {
                id: self.id,
                expected,
                actual: self.state,
            })
        }
    }

    fn push_line(&mut self, line: TransferLine) -> Result<&mut Self> {
        self.expect_state(&[TransactionState::Built], "Built")?;
        match &mut self.body {
            TransactionBody::Transfer { lines } => {
                lines.push(line);
                Ok(self)
            }
            _ => Err(LedgerError::InvalidTransaction(format!(
                "transaction {} is not a transfer",
                self.id
            ))),
        }
    }

    pub fn add_hbar_transfer(&mut self, account: AccountId, delta: Delta) -> Result<&mut Self> {
        self.push_line(TransferLine::hbar(account, delta))
    }

    pub fn add_token_transfer(&mut self, token: TokenId, account: AccountId, delta: Delta) -> Result<&mut Self> {
        self.push_line(TransferLine::token(token, account, delta))
    }

    /// Snapshots the body and returns the digest signers commit to.
    pub fn freeze(&mut self) -> Result<Digest> {
        self.expect_state(&[TransactionState::Built], "Built")?;
        let encoded = bincode::serde::encode_to_vec((&self.id, &self.body), bincode::config::standard())
            .map_err(|e| LedgerError::Digest(e.to_string()))?;
        let frozen = digest(&encoded)?;
        self.digest = Some(frozen);
        self.state = TransactionState::Frozen;
        Ok(frozen)
    }

    /// Signs the frozen digest through `oracle`. May be called repeatedly;
    /// the signer sets accumulate.
    pub fn sign(&mut self, oracle: &dyn SigningOracle, credential: &Credential) -> Result<&mut Self> {
        self.expect_state(&[TransactionState::Frozen, TransactionState::Signed], "Frozen or Signed")?;
        let frozen = self.digest.ok_or(LedgerError::InvalidState {
            id: self.id,
            expected: "Frozen",
            actual: self.state,
        })?;
        let signature = oracle.sign(credential, &frozen)?;
        self.add_signature(signature)
    }

    /// Attaches a signature produced elsewhere over [`Transaction::digest`].
    pub fn add_signature(&mut self, signature: Signature) -> Result<&mut Self> {
        self.expect_state(&[TransactionState::Frozen, TransactionState::Signed], "Frozen or Signed")?;
        if !self.signatures.iter().any(|s| s.signer == signature.signer) {
            self.signatures.push(signature);
        }
        self.state = TransactionState::Signed;
        Ok(self)
    }

    pub(crate) fn begin_submit(&mut self) -> Result<()> {
        self.expect_state(&[TransactionState::Signed], "Signed")?;
        self.state = TransactionState::Submitted;
        Ok(())
    }

    pub(crate) fn finish(&mut self, outcome: &Result<TransactionReceipt>) {
        match outcome {
            Ok(_) => self.state = TransactionState::Committed,
            Err(e) => {
                self.state = TransactionState::Rejected;
                self.outcome = Some(e.clone());
            }
        }
    }
}
