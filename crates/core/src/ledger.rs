//! The single logical ledger shared by every caller.
//!
//! Mutations take the store's write lock for the whole operation, so each one
//! either commits completely or leaves the store untouched. Queries take the
//! read lock and only ever see committed state. Topic notifications are sent
//! after the lock is released.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{broadcast, RwLock};

use crate::account::{Account, AccountBalance, TokenInfo, TopicInfo, TopicMessage};
use crate::clock::{Clock, LogicalClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::key::{authorize, Key, SignerSet};
use crate::store::LedgerStore;
use crate::subscription::TopicSubscription;
use crate::token::{self, TokenCreate, TokenUpdate, TransferLine};
use crate::topic;
use crate::transaction::{Transaction, TransactionBody, TransactionId, TransactionReceipt};
use crate::types::{AccountId, Amount, Delta, EntityKind, EntityRef, Timestamp, TokenId, TopicId};

#[derive(Clone)]
pub struct Ledger {
    store: Arc<RwLock<LedgerStore>>,
    notifier: broadcast::Sender<TopicMessage>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

fn rejected<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!("{operation} rejected ({}): {e}", e.kind());
    }
    result
}

impl Ledger {
    /// Ledger driven by a [`LogicalClock`].
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(LogicalClock::default()))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let (notifier, _) = broadcast::channel(config.notification_buffer.max(1));
        Self {
            store: Arc::new(RwLock::new(LedgerStore::new(&config))),
            notifier,
            clock,
            config,
        }
    }

    /// Opens an account controlled by `key`. Stands in for the network's
    /// account provisioning.
    pub async fn create_account(&self, key: Key, initial_hbar: Amount) -> Result<AccountId> {
        rejected("account create", key.validate())?;
        let mut store = self.store.write().await;
        let id = AccountId::from(store.next_id(EntityKind::Account));
        store.put_account(Account::new(id, key, initial_hbar));
        info!("created account {id} with {initial_hbar} hbar");
        Ok(id)
    }

    pub async fn get_account_balance(&self, account: &AccountId) -> Result<Amount> {
        let store = self.store.read().await;
        Ok(store.get_account(account)?.hbar_balance)
    }

    pub async fn get_account_balances(&self, account: &AccountId) -> Result<AccountBalance> {
        let store = self.store.read().await;
        Ok(store.get_account(account)?.balances())
    }

    pub async fn get_token_balance(&self, account: &AccountId, token: &TokenId) -> Result<Amount> {
        let store = self.store.read().await;
        store.get_token(token)?;
        store
            .get_account(account)?
            .token_balance(token)
            .ok_or(LedgerError::NotAssociated {
                account: *account,
                token: *token,
            })
    }

    pub async fn get_token_info(&self, token: &TokenId) -> Result<TokenInfo> {
        let store = self.store.read().await;
        Ok(store.get_token(token)?.info())
    }

    pub async fn get_topic_info(&self, topic: &TopicId) -> Result<TopicInfo> {
        let store = self.store.read().await;
        Ok(store.get_topic(topic)?.info())
    }

    /// Up to `limit` stored messages starting at sequence number `from`.
    pub async fn get_topic_messages(&self, topic: &TopicId, from: u64, limit: usize) -> Result<Vec<TopicMessage>> {
        let store = self.store.read().await;
        let topic = store.get_topic(topic)?;
        let skip = usize::try_from(from.max(1) - 1).unwrap_or(usize::MAX);
        Ok(topic.messages.iter().skip(skip).take(limit).cloned().collect())
    }

    /// Outcome of a submitted transaction, `None` if it was never submitted.
    pub async fn get_receipt(&self, id: &TransactionId) -> Option<Result<TransactionReceipt>> {
        self.store.read().await.receipt(id).cloned()
    }

    pub async fn create_token(&self, params: TokenCreate) -> Result<TokenId> {
        let mut store = self.store.write().await;
        let (name, treasury) = (params.name.clone(), params.treasury);
        let id = rejected("token create", token::create(&mut store, params, &self.config))?;
        info!("created token {id} ({name}) with treasury {treasury}");
        Ok(id)
    }

    /// Returns the new total supply.
    pub async fn mint(&self, token: &TokenId, amount: Amount, signers: &SignerSet) -> Result<Amount> {
        let mut store = self.store.write().await;
        let total = rejected("mint", token::mint(&mut store, token, amount, signers))?;
        info!("minted {amount} of {token}, total supply {total}");
        Ok(total)
    }

    pub async fn associate(&self, account: &AccountId, token: &TokenId) -> Result<()> {
        let mut store = self.store.write().await;
        if rejected("associate", token::associate(&mut store, account, token))? {
            info!("associated {account} with {token}");
        } else {
            debug!("{account} already associated with {token}");
        }
        Ok(())
    }

    pub async fn update_token(&self, token: &TokenId, update: TokenUpdate, signers: &SignerSet) -> Result<()> {
        let mut store = self.store.write().await;
        rejected("token update", token::update(&mut store, token, update, signers, &self.config))?;
        info!("updated token {token}");
        Ok(())
    }

    /// Direct single-token transfer of `(account, delta)` line items.
    pub async fn transfer_token(
        &self,
        token: &TokenId,
        lines: &[(AccountId, Delta)],
        signers: &SignerSet,
    ) -> Result<Vec<TransferLine>> {
        let lines: Vec<TransferLine> = lines
            .iter()
            .map(|(account, delta)| TransferLine::token(*token, *account, *delta))
            .collect();
        let mut store = self.store.write().await;
        let applied = rejected("transfer", token::transfer(&mut store, &lines, signers, &self.config))?;
        info!("transferred {token} across {} accounts", applied.len());
        Ok(applied)
    }

    pub async fn create_topic(&self, memo: String, submit_key: Option<Key>) -> Result<TopicId> {
        let mut store = self.store.write().await;
        let id = rejected("topic create", topic::create(&mut store, memo, submit_key, &self.config))?;
        info!("created topic {id}");
        Ok(id)
    }

    /// Returns the sequence number and consensus timestamp of the message.
    pub async fn submit_message(&self, topic: &TopicId, payload: Vec<u8>, signers: &SignerSet) -> Result<(u64, Timestamp)> {
        let message = {
            let mut store = self.store.write().await;
            let now = self.clock.now();
            rejected("message submit", topic::submit(&mut store, topic, payload, signers, now, &self.config))?
        };
        let committed = (message.sequence_number, message.consensus_timestamp);
        self.publish(message);
        Ok(committed)
    }

    fn publish(&self, message: TopicMessage) {
        debug!(
            "topic {} message {} at {}",
            message.topic, message.sequence_number, message.consensus_timestamp
        );
        // no receivers just means nobody is subscribed right now
        let _ = self.notifier.send(message);
    }

    pub async fn subscribe(&self, topic: &TopicId, from_sequence: u64) -> Result<TopicSubscription> {
        let store = self.store.read().await;
        store.get_topic(topic)?;
        let notifications = self.notifier.subscribe();
        drop(store);
        debug!("subscribed to {topic} from sequence {from_sequence}");
        Ok(TopicSubscription::new(
            self.store.clone(),
            notifications,
            *topic,
            from_sequence,
        ))
    }

    /// New transaction for `payer` carrying `body`, in the `Built` state.
    pub async fn build_transaction(&self, payer: AccountId, body: TransactionBody) -> Transaction {
        let nonce = self.store.write().await.next_nonce();
        Transaction::new(TransactionId { payer, nonce }, body)
    }

    /// Empty transfer batch paid for by `payer`.
    pub async fn build_transfer(&self, payer: AccountId) -> Transaction {
        self.build_transaction(payer, TransactionBody::Transfer { lines: Vec::new() })
            .await
    }

    /// Executes a signed transaction as one atomic step. The transaction ends
    /// up `Committed` or `Rejected`; the returned error is also recorded as
    /// its outcome and receipt.
    pub async fn submit(&self, tx: &mut Transaction) -> Result<TransactionReceipt> {
        tx.begin_submit()?;
        let id = tx.id();
        let signers = tx.signers();

        let executed = {
            let mut store = self.store.write().await;
            if store.receipt(&id).is_some() {
                Err(LedgerError::DuplicateTransaction(id))
            } else {
                let executed = self.execute(&mut store, id, tx.body(), &signers);
                store.record_outcome(id, executed.clone().map(|(receipt, _)| receipt));
                executed
            }
        };

        let outcome = match executed {
            Ok((receipt, message)) => {
                info!("transaction {id} committed at {}", receipt.consensus_timestamp);
                if let Some(message) = message {
                    self.publish(message);
                }
                Ok(receipt)
            }
            Err(e) => {
                warn!("transaction {id} rejected ({}): {e}", e.kind());
                Err(e)
            }
        };
        tx.finish(&outcome);
        outcome
    }

    fn execute(
        &self,
        store: &mut LedgerStore,
        id: TransactionId,
        body: &TransactionBody,
        signers: &SignerSet,
    ) -> Result<(TransactionReceipt, Option<TopicMessage>)> {
        let payer = store.get_account(&id.payer)?;
        authorize(Some(&payer.key), signers, EntityRef::Account(id.payer))?;

        let now = self.clock.now();
        let mut receipt = TransactionReceipt::new(id, now);
        match body {
            TransactionBody::Transfer { lines } => {
                receipt.transfers = token::transfer(store, lines, signers, &self.config)?;
                Ok((receipt, None))
            }
            TransactionBody::TokenMint { token: token_id, amount } => {
                receipt.total_supply = Some(token::mint(store, token_id, *amount, signers)?);
                Ok((receipt, None))
            }
            TransactionBody::TokenAssociate { account, token: token_id } => {
                let holder = store.get_account(account)?;
                authorize(Some(&holder.key), signers, EntityRef::Account(*account))?;
                token::associate(store, account, token_id)?;
                Ok((receipt, None))
            }
            TransactionBody::TopicMessage { topic: topic_id, payload } => {
                let message = topic::submit(store, topic_id, payload.clone(), signers, now, &self.config)?;
                receipt.consensus_timestamp = message.consensus_timestamp;
                receipt.topic_sequence_number = Some(message.sequence_number);
                Ok((receipt, Some(message)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::SupplyType;
    use crate::signer::{Credential, KeyProvisioner, PoseidonOracle};
    use crate::transaction::TransactionState;
    use crate::types::Asset;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Clone)]
    struct Actor {
        id: AccountId,
        credential: Credential,
    }

    impl Actor {
        fn signers(&self) -> SignerSet {
            [self.credential.public_key()].into_iter().collect()
        }
    }

    async fn actor(ledger: &Ledger, keys: &mut KeyProvisioner, hbar: Amount) -> Actor {
        let credential = keys.next_credential().unwrap();
        let id = ledger
            .create_account(Key::Single(credential.public_key()), hbar)
            .await
            .unwrap();
        Actor { id, credential }
    }

    fn sign_all(tx: &mut Transaction, actors: &[&Actor]) {
        tx.freeze().unwrap();
        for actor in actors {
            tx.sign(&PoseidonOracle, &actor.credential).unwrap();
        }
    }

    #[tokio::test]
    async fn test_infinite_supply_mint() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(1);
        let treasury = actor(&ledger, &mut keys, 0).await;
        let params = TokenCreate::new("Infinite", "INF", treasury.id)
            .supply_key(Key::Single(treasury.credential.public_key()));
        let token = assert_ok!(ledger.create_token(params).await);

        assert_eq!(ledger.mint(&token, 1000, &treasury.signers()).await, Ok(1000));
        let info = ledger.get_token_info(&token).await.unwrap();
        assert_eq!(info.total_supply, 1000);
        assert_eq!(info.supply_type, SupplyType::Infinite);
    }

    #[tokio::test]
    async fn test_finite_supply_mint_beyond_max_is_rejected() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(2);
        let treasury = actor(&ledger, &mut keys, 0).await;
        let params = TokenCreate::new("Finite", "FIN", treasury.id)
            .finite(500)
            .initial_supply(500)
            .supply_key(Key::Single(treasury.credential.public_key()));
        let token = ledger.create_token(params).await.unwrap();

        let err = assert_err!(ledger.mint(&token, 1, &treasury.signers()).await);
        assert!(matches!(err, LedgerError::SupplyLimitExceeded { .. }));
        assert_eq!(ledger.get_token_info(&token).await.unwrap().total_supply, 500);
    }

    #[tokio::test]
    async fn test_association_gates_transfer() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(3);
        let a = actor(&ledger, &mut keys, 10).await;
        let b = actor(&ledger, &mut keys, 10).await;
        let token = ledger
            .create_token(TokenCreate::new("Gate", "GTE", a.id).initial_supply(100))
            .await
            .unwrap();

        let lines = [(a.id, -10), (b.id, 10)];
        assert_eq!(
            ledger.transfer_token(&token, &lines, &a.signers()).await,
            Err(LedgerError::NotAssociated { account: b.id, token })
        );
        assert_eq!(
            ledger.get_token_balance(&b.id, &token).await,
            Err(LedgerError::NotAssociated { account: b.id, token })
        );

        ledger.associate(&b.id, &token).await.unwrap();
        ledger.transfer_token(&token, &lines, &a.signers()).await.unwrap();
        assert_eq!(ledger.get_token_balance(&a.id, &token).await, Ok(90));
        assert_eq!(ledger.get_token_balance(&b.id, &token).await, Ok(10));
    }

    #[tokio::test]
    async fn test_multi_party_transfer_through_coordinator() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(4);
        let alice = actor(&ledger, &mut keys, 1_000).await;
        let bob = actor(&ledger, &mut keys, 1_000).await;
        let carol = actor(&ledger, &mut keys, 0).await;

        let mut tx = ledger.build_transfer(alice.id).await;
        tx.add_hbar_transfer(alice.id, -300)
            .unwrap()
            .add_hbar_transfer(bob.id, -200)
            .unwrap()
            .add_hbar_transfer(carol.id, 500)
            .unwrap();
        sign_all(&mut tx, &[&alice, &bob]);

        let receipt = ledger.submit(&mut tx).await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(receipt.transfers.len(), 3);
        assert_eq!(ledger.get_account_balance(&alice.id).await, Ok(700));
        assert_eq!(ledger.get_account_balance(&bob.id).await, Ok(800));
        assert_eq!(ledger.get_account_balance(&carol.id).await, Ok(500));
        assert_eq!(ledger.get_receipt(&tx.id()).await, Some(Ok(receipt)));
    }

    #[tokio::test]
    async fn test_invalid_line_rejects_whole_batch() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(5);
        let alice = actor(&ledger, &mut keys, 1_000).await;
        let bob = actor(&ledger, &mut keys, 100).await;
        let carol = actor(&ledger, &mut keys, 0).await;

        let mut tx = ledger.build_transfer(alice.id).await;
        tx.add_hbar_transfer(alice.id, -300)
            .unwrap()
            .add_hbar_transfer(bob.id, -200)
            .unwrap()
            .add_hbar_transfer(carol.id, 500)
            .unwrap();
        sign_all(&mut tx, &[&alice, &bob]);

        let err = ledger.submit(&mut tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { account, asset: Asset::Hbar, .. } if account == bob.id));
        assert_eq!(tx.state(), TransactionState::Rejected);
        assert_eq!(tx.outcome(), Some(&err));
        assert_eq!(ledger.get_account_balance(&alice.id).await, Ok(1_000));
        assert_eq!(ledger.get_account_balance(&bob.id).await, Ok(100));
        assert_eq!(ledger.get_account_balance(&carol.id).await, Ok(0));
        assert_eq!(ledger.get_receipt(&tx.id()).await, Some(Err(err)));
    }

    #[tokio::test]
    async fn test_payer_must_sign() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(6);
        let payer = actor(&ledger, &mut keys, 50).await;
        let alice = actor(&ledger, &mut keys, 50).await;
        let bob = actor(&ledger, &mut keys, 0).await;

        let mut tx = ledger.build_transfer(payer.id).await;
        tx.add_hbar_transfer(alice.id, -5).unwrap().add_hbar_transfer(bob.id, 5).unwrap();
        sign_all(&mut tx, &[&alice]);
        assert_eq!(
            ledger.submit(&mut tx).await,
            Err(LedgerError::Unauthorized(EntityRef::Account(payer.id)))
        );
        assert_eq!(ledger.get_account_balance(&alice.id).await, Ok(50));
    }

    #[tokio::test]
    async fn test_submit_outside_signed_state() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(7);
        let alice = actor(&ledger, &mut keys, 10).await;
        let bob = actor(&ledger, &mut keys, 0).await;

        let mut tx = ledger.build_transfer(alice.id).await;
        tx.add_hbar_transfer(alice.id, -1).unwrap().add_hbar_transfer(bob.id, 1).unwrap();
        tx.freeze().unwrap();
        assert!(matches!(
            ledger.submit(&mut tx).await,
            Err(LedgerError::InvalidState { actual: TransactionState::Frozen, .. })
        ));

        tx.sign(&PoseidonOracle, &alice.credential).unwrap();
        ledger.submit(&mut tx).await.unwrap();
        assert!(matches!(
            tx.sign(&PoseidonOracle, &alice.credential),
            Err(LedgerError::InvalidState { actual: TransactionState::Committed, .. })
        ));
        assert!(matches!(ledger.submit(&mut tx).await, Err(LedgerError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_resubmitting_a_copy_is_duplicate() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(8);
        let alice = actor(&ledger, &mut keys, 10).await;
        let bob = actor(&ledger, &mut keys, 0).await;

        let mut tx = ledger.build_transfer(alice.id).await;
        tx.add_hbar_transfer(alice.id, -4).unwrap().add_hbar_transfer(bob.id, 4).unwrap();
        sign_all(&mut tx, &[&alice]);
        let mut copy = tx.clone();
        ledger.submit(&mut tx).await.unwrap();
        assert_eq!(
            ledger.submit(&mut copy).await,
            Err(LedgerError::DuplicateTransaction(tx.id()))
        );
        assert_eq!(ledger.get_account_balance(&bob.id).await, Ok(4));
        assert!(matches!(ledger.get_receipt(&tx.id()).await, Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_coordinator_mint_and_associate() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(9);
        let treasury = actor(&ledger, &mut keys, 10).await;
        let holder = actor(&ledger, &mut keys, 10).await;
        let params = TokenCreate::new("Coord", "CRD", treasury.id)
            .finite(100)
            .supply_key(Key::Single(treasury.credential.public_key()));
        let token = ledger.create_token(params).await.unwrap();

        let mut mint = ledger
            .build_transaction(treasury.id, TransactionBody::TokenMint { token, amount: 60 })
            .await;
        sign_all(&mut mint, &[&treasury]);
        assert_eq!(ledger.submit(&mut mint).await.unwrap().total_supply, Some(60));

        let body = TransactionBody::TokenAssociate {
            account: holder.id,
            token,
        };
        let mut unsigned = ledger.build_transaction(treasury.id, body.clone()).await;
        sign_all(&mut unsigned, &[&treasury]);
        assert_eq!(
            ledger.submit(&mut unsigned).await,
            Err(LedgerError::Unauthorized(EntityRef::Account(holder.id)))
        );

        let mut signed = ledger.build_transaction(holder.id, body).await;
        sign_all(&mut signed, &[&holder]);
        ledger.submit(&mut signed).await.unwrap();
        assert_eq!(ledger.get_token_balance(&holder.id, &token).await, Ok(0));
    }

    #[tokio::test]
    async fn test_threshold_topic_submit() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(10);
        let members: Vec<Credential> = (0..3).map(|_| keys.next_credential().unwrap()).collect();
        let key = Key::threshold(2, members.iter().map(Credential::public_key)).unwrap();
        let topic = ledger.create_topic("council".into(), Some(key)).await.unwrap();
        assert!(ledger.get_topic_info(&topic).await.unwrap().has_submit_key);

        let one: SignerSet = [members[1].public_key()].into_iter().collect();
        assert_eq!(
            ledger.submit_message(&topic, b"vote".to_vec(), &one).await,
            Err(LedgerError::Unauthorized(EntityRef::Topic(topic)))
        );
        let two: SignerSet = [members[0].public_key(), members[2].public_key()].into_iter().collect();
        let (sequence, _) = ledger.submit_message(&topic, b"vote".to_vec(), &two).await.unwrap();
        assert_eq!(sequence, 1);
    }

    #[tokio::test]
    async fn test_topic_message_transaction_notifies_subscribers() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(11);
        let payer = actor(&ledger, &mut keys, 1).await;
        let topic = ledger.create_topic(String::new(), None).await.unwrap();
        let mut sub = ledger.subscribe(&topic, 1).await.unwrap();

        let mut tx = ledger
            .build_transaction(
                payer.id,
                TransactionBody::TopicMessage {
                    topic,
                    payload: b"hello".to_vec(),
                },
            )
            .await;
        sign_all(&mut tx, &[&payer]);
        let receipt = ledger.submit(&mut tx).await.unwrap();
        assert_eq!(receipt.topic_sequence_number, Some(1));

        let delivered = sub.next(std::time::Duration::from_millis(200)).await.unwrap().unwrap();
        assert_eq!(delivered.payload, b"hello");
        assert_eq!(delivered.consensus_timestamp, receipt.consensus_timestamp);
    }

    #[tokio::test]
    async fn test_unknown_entities_are_not_found() {
        let ledger = Ledger::new(LedgerConfig::default());
        let ghost = AccountId::new(0, 0, 404);
        assert_eq!(
            ledger.get_account_balance(&ghost).await,
            Err(LedgerError::NotFound(EntityRef::Account(ghost)))
        );
        let topic = TopicId::new(0, 0, 404);
        assert!(matches!(ledger.subscribe(&topic, 1).await, Err(LedgerError::NotFound(_))));
        assert!(matches!(
            ledger.get_token_info(&TokenId::new(0, 0, 404)).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_topic_message_paging() {
        let ledger = Ledger::new(LedgerConfig::default());
        let topic = ledger.create_topic("log".into(), None).await.unwrap();
        for i in 0..5u8 {
            ledger.submit_message(&topic, vec![i], &SignerSet::new()).await.unwrap();
        }
        let page = ledger.get_topic_messages(&topic, 2, 2).await.unwrap();
        let sequences: Vec<u64> = page.iter().map(|m| m.sequence_number).collect();
        assert_eq!(sequences, vec![2, 3]);
        assert!(ledger.get_topic_messages(&topic, 9, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsatisfiable_keys_are_refused() {
        let ledger = Ledger::new(LedgerConfig::default());
        let locked = Key::Threshold {
            threshold: 3,
            members: vec![[1u8; 32], [2u8; 32]],
        };
        assert!(matches!(
            ledger.create_topic("locked".into(), Some(locked.clone())).await,
            Err(LedgerError::InvalidKey(_))
        ));
        assert!(matches!(
            ledger.create_account(locked, 10).await,
            Err(LedgerError::InvalidKey(_))
        ));

        let quorum = Key::threshold(2, [[1u8; 32], [2u8; 32]]).unwrap();
        let topic = ledger.create_topic("open".into(), Some(quorum)).await.unwrap();
        let both: SignerSet = [[1u8; 32], [2u8; 32]].into_iter().collect();
        assert_eq!(ledger.submit_message(&topic, b"m".to_vec(), &both).await.map(|(seq, _)| seq), Ok(1));
    }

    #[tokio::test]
    async fn test_update_token_through_ledger() {
        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(21);
        let admin = actor(&ledger, &mut keys, 0).await;
        let other = actor(&ledger, &mut keys, 0).await;
        let params = TokenCreate::new("Old", "OLD", admin.id).admin_key(Key::Single(admin.credential.public_key()));
        let token = ledger.create_token(params).await.unwrap();
        let update = TokenUpdate {
            name: Some("New".into()),
            symbol: Some("NEW".into()),
        };

        assert_eq!(
            ledger.update_token(&token, update.clone(), &other.signers()).await,
            Err(LedgerError::Unauthorized(EntityRef::Token(token)))
        );
        assert_eq!(ledger.get_token_info(&token).await.unwrap().name, "Old");

        assert_ok!(ledger.update_token(&token, update, &admin.signers()).await);
        let info = ledger.get_token_info(&token).await.unwrap();
        assert_eq!((info.name.as_str(), info.symbol.as_str()), ("New", "NEW"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_conserve_totals() {
        const MAX_SUPPLY: Amount = 1_000;
        const ROUNDS: usize = 40;

        let ledger = Ledger::new(LedgerConfig::default());
        let mut keys = KeyProvisioner::seeded(22);
        let treasury = actor(&ledger, &mut keys, 0).await;
        let mut holders = Vec::new();
        for _ in 0..6 {
            holders.push(actor(&ledger, &mut keys, 1_000).await);
        }
        let params = TokenCreate::new("Capped", "CAP", treasury.id)
            .finite(MAX_SUPPLY)
            .supply_key(Key::Single(treasury.credential.public_key()));
        let token = ledger.create_token(params).await.unwrap();
        for holder in &holders {
            ledger.associate(&holder.id, &token).await.unwrap();
        }

        let holders = Arc::new(holders);
        let mut tasks = Vec::new();
        for i in 0..holders.len() {
            let (ledger, holders, treasury) = (ledger.clone(), holders.clone(), treasury.clone());
            tasks.push(tokio::spawn(async move {
                let from = &holders[i];
                let to = &holders[(i + 1) % holders.len()];
                for round in 0..ROUNDS {
                    let mut tx = ledger.build_transfer(from.id).await;
                    let amount = (round % 7 + 1) as Delta * 10;
                    tx.add_hbar_transfer(from.id, -amount)
                        .unwrap()
                        .add_hbar_transfer(to.id, amount)
                        .unwrap();
                    sign_all(&mut tx, &[from]);
                    // overdrafts are expected once balances drift
                    let _ = ledger.submit(&mut tx).await;

                    let _ = ledger.mint(&token, 10, &treasury.signers()).await;
                    let lines = [(treasury.id, -5), (from.id, 5)];
                    let _ = ledger.transfer_token(&token, &lines, &treasury.signers()).await;

                    let info = ledger.get_token_info(&token).await.unwrap();
                    assert!(info.total_supply <= MAX_SUPPLY);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut hbar = 0;
        let mut held = ledger.get_token_balance(&treasury.id, &token).await.unwrap();
        for holder in holders.iter() {
            hbar += ledger.get_account_balance(&holder.id).await.unwrap();
            held += ledger.get_token_balance(&holder.id, &token).await.unwrap();
        }
        let info = ledger.get_token_info(&token).await.unwrap();
        assert_eq!(hbar, 6 * 1_000);
        assert_eq!(held, info.total_supply);
        assert_eq!(info.total_supply, MAX_SUPPLY);
    }
}
