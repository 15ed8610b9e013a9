//! Explicit state carried between scenario steps: who the actors are, which
//! tokens and topics they created, and the transactions still in flight.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use log::debug;
use tally_core::{
    AccountId, Amount, Credential, Key, KeyProvisioner, Ledger, LedgerConfig, PoseidonOracle, SignerSet,
    TokenCreate, TokenId, TopicId, Transaction, TransactionBody, TransactionReceipt,
};

#[derive(Debug, Clone)]
pub struct Actor {
    pub account: AccountId,
    pub credential: Credential,
}

pub struct Session {
    pub ledger: Ledger,
    keys: KeyProvisioner,
    oracle: PoseidonOracle,
    actors: HashMap<String, Actor>,
    tokens: HashMap<String, TokenId>,
    topics: HashMap<String, TopicId>,
    pending: HashMap<String, Transaction>,
}

impl Session {
    pub fn new(ledger: Ledger, keys: KeyProvisioner) -> Self {
        Self {
            ledger,
            keys,
            oracle: PoseidonOracle,
            actors: HashMap::new(),
            tokens: HashMap::new(),
            topics: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Fresh ledger with reproducible key material.
    pub fn seeded(config: LedgerConfig, seed: u64) -> Self {
        Self::new(Ledger::new(config), KeyProvisioner::seeded(seed))
    }

    pub fn credential(&mut self) -> Result<Credential> {
        Ok(self.keys.next_credential()?)
    }

    pub async fn add_actor(&mut self, name: &str, hbar: Amount) -> Result<AccountId> {
        let credential = self.credential()?;
        let account = self
            .ledger
            .create_account(Key::Single(credential.public_key()), hbar)
            .await?;
        debug!("actor {name} is account {account}");
        self.actors.insert(name.to_string(), Actor { account, credential });
        Ok(account)
    }

    pub fn actor(&self, name: &str) -> Result<&Actor> {
        self.actors.get(name).ok_or_else(|| anyhow!("unknown actor {name}"))
    }

    pub fn account(&self, name: &str) -> Result<AccountId> {
        Ok(self.actor(name)?.account)
    }

    pub fn public_key(&self, name: &str) -> Result<Key> {
        Ok(Key::Single(self.actor(name)?.credential.public_key()))
    }

    /// Signer identities of the named actors.
    pub fn signers(&self, names: &[&str]) -> Result<SignerSet> {
        names
            .iter()
            .map(|name| Ok(self.actor(name)?.credential.public_key()))
            .collect()
    }

    pub async fn create_token(&mut self, name: &str, params: TokenCreate) -> Result<TokenId> {
        let token = self.ledger.create_token(params).await?;
        self.tokens.insert(name.to_string(), token);
        Ok(token)
    }

    pub fn token(&self, name: &str) -> Result<TokenId> {
        self.tokens
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown token {name}"))
    }

    pub async fn create_topic(&mut self, name: &str, memo: &str, submit_key: Option<Key>) -> Result<TopicId> {
        let topic = self.ledger.create_topic(memo.to_string(), submit_key).await?;
        self.topics.insert(name.to_string(), topic);
        Ok(topic)
    }

    pub fn topic(&self, name: &str) -> Result<TopicId> {
        self.topics
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown topic {name}"))
    }

    /// Starts a transfer batch paid for by `payer` and parks it under `label`.
    pub async fn begin_transfer(&mut self, label: &str, payer: &str) -> Result<()> {
        let payer = self.account(payer)?;
        let tx = self.ledger.build_transfer(payer).await;
        self.pending.insert(label.to_string(), tx);
        Ok(())
    }

    pub async fn begin_transaction(&mut self, label: &str, payer: &str, body: TransactionBody) -> Result<()> {
        let payer = self.account(payer)?;
        let tx = self.ledger.build_transaction(payer, body).await;
        self.pending.insert(label.to_string(), tx);
        Ok(())
    }

    pub fn pending_mut(&mut self, label: &str) -> Result<&mut Transaction> {
        self.pending
            .get_mut(label)
            .ok_or_else(|| anyhow!("no pending transaction {label}"))
    }

    pub fn add_hbar_line(&mut self, label: &str, actor: &str, delta: i64) -> Result<()> {
        let account = self.account(actor)?;
        self.pending_mut(label)?.add_hbar_transfer(account, delta)?;
        Ok(())
    }

    pub fn add_token_line(&mut self, label: &str, token: &str, actor: &str, delta: i64) -> Result<()> {
        let token = self.token(token)?;
        let account = self.account(actor)?;
        self.pending_mut(label)?.add_token_transfer(token, account, delta)?;
        Ok(())
    }

    /// Freezes the transaction on first use, then signs it as each actor.
    pub fn sign(&mut self, label: &str, actors: &[&str]) -> Result<()> {
        let credentials: Vec<Credential> = actors
            .iter()
            .map(|name| Ok(self.actor(name)?.credential.clone()))
            .collect::<Result<_>>()?;
        let oracle = self.oracle;
        let tx = self.pending_mut(label)?;
        if tx.digest().is_none() {
            tx.freeze()?;
        }
        for credential in &credentials {
            tx.sign(&oracle, credential)?;
        }
        Ok(())
    }

    pub fn forget(&mut self, label: &str) -> Option<Transaction> {
        self.pending.remove(label)
    }

    /// Submits the parked transaction; it stays parked so its final state
    /// can be inspected.
    pub async fn submit(&mut self, label: &str) -> Result<TransactionReceipt> {
        let mut tx = self
            .pending
            .remove(label)
            .ok_or_else(|| anyhow!("no pending transaction {label}"))?;
        let outcome = self.ledger.submit(&mut tx).await;
        self.pending.insert(label.to_string(), tx);
        outcome.with_context(|| format!("submitting {label}"))
    }
}
