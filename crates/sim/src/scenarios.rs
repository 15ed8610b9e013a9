//! Behaviour scenarios run against an in-process ledger.

use std::time::Duration;

use anyhow::{bail, ensure, Result};
use log::info;
use tally_core::{Key, LedgerConfig, LedgerError, SignerSet, SupplyType, TokenCreate, TransactionBody};

use crate::context::Session;

const SUBSCRIBE_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    BalanceQuery,
    TokenLifecycle,
    AssociationGate,
    AtomicTransfer,
    TopicMessaging,
    ThresholdTopic,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::BalanceQuery,
        Scenario::TokenLifecycle,
        Scenario::AssociationGate,
        Scenario::AtomicTransfer,
        Scenario::TopicMessaging,
        Scenario::ThresholdTopic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::BalanceQuery => "account balance query",
            Scenario::TokenLifecycle => "token supply lifecycle",
            Scenario::AssociationGate => "association-gated transfer",
            Scenario::AtomicTransfer => "atomic multi-party transfer",
            Scenario::TopicMessaging => "ordered topic messaging",
            Scenario::ThresholdTopic => "threshold-key topic",
        }
    }

    pub async fn run(self, config: LedgerConfig) -> Result<()> {
        let mut session = Session::seeded(config, self as u64 + 1);
        match self {
            Scenario::BalanceQuery => balance_query(&mut session).await,
            Scenario::TokenLifecycle => token_lifecycle(&mut session).await,
            Scenario::AssociationGate => association_gate(&mut session).await,
            Scenario::AtomicTransfer => atomic_transfer(&mut session).await,
            Scenario::TopicMessaging => topic_messaging(&mut session).await,
            Scenario::ThresholdTopic => threshold_topic(&mut session).await,
        }
    }
}

/// Expects `result` to fail with a ledger error matching `check`.
fn expect_rejection<T>(result: Result<T>, what: &str, check: impl Fn(&LedgerError) -> bool) -> Result<LedgerError> {
    match result {
        Ok(_) => bail!("{what} unexpectedly succeeded"),
        Err(e) => match e.downcast_ref::<LedgerError>() {
            Some(ledger_error) if check(ledger_error) => Ok(ledger_error.clone()),
            _ => bail!("{what} failed for the wrong reason: {e:#}"),
        },
    }
}

pub async fn balance_query(session: &mut Session) -> Result<()> {
    let operator = session.add_actor("operator", 5_000).await?;
    let balance = session.ledger.get_account_balance(&operator).await?;
    ensure!(balance == 5_000, "operator balance is {balance}");

    let balances = session.ledger.get_account_balances(&operator).await?;
    ensure!(balances.tokens.is_empty(), "fresh account holds tokens");
    info!("operator {operator} holds {} hbar", balances.hbars);
    Ok(())
}

pub async fn token_lifecycle(session: &mut Session) -> Result<()> {
    let treasury = session.add_actor("treasury", 100).await?;
    let supply_key = session.public_key("treasury")?;
    let signers = session.signers(&["treasury"])?;

    let infinite = session
        .create_token(
            "infinite",
            TokenCreate::new("Infinite", "INF", treasury).supply_key(supply_key.clone()),
        )
        .await?;
    let total = session.ledger.mint(&infinite, 1_000, &signers).await?;
    let info = session.ledger.get_token_info(&infinite).await?;
    ensure!(total == 1_000 && info.total_supply == 1_000, "total supply is {}", info.total_supply);
    ensure!(info.supply_type == SupplyType::Infinite, "wrong supply type");
    info!("minted {total} {}", info.symbol);

    let finite = session
        .create_token(
            "finite",
            TokenCreate::new("Finite", "FIN", treasury)
                .finite(500)
                .initial_supply(500)
                .supply_key(supply_key),
        )
        .await?;
    let over = session.ledger.mint(&finite, 1, &signers).await.map_err(Into::into);
    expect_rejection(over, "mint past max supply", |e| {
        matches!(e, LedgerError::SupplyLimitExceeded { .. })
    })?;
    let info = session.ledger.get_token_info(&finite).await?;
    ensure!(info.total_supply == 500, "finite supply moved to {}", info.total_supply);

    let unsigned = session.ledger.mint(&infinite, 1, &SignerSet::new()).await.map_err(Into::into);
    expect_rejection(unsigned, "unsigned mint", |e| matches!(e, LedgerError::Unauthorized(_)))?;
    Ok(())
}

pub async fn association_gate(session: &mut Session) -> Result<()> {
    let a = session.add_actor("a", 100).await?;
    let b = session.add_actor("b", 100).await?;
    let token = session
        .create_token("gate", TokenCreate::new("Gate", "GTE", a).initial_supply(100))
        .await?;

    session.begin_transfer("early", "a").await?;
    session.add_token_line("early", "gate", "a", -10)?;
    session.add_token_line("early", "gate", "b", 10)?;
    session.sign("early", &["a"])?;
    let early = session.submit("early").await;
    expect_rejection(early, "transfer to unassociated account", |e| {
        matches!(e, LedgerError::NotAssociated { account, .. } if *account == b)
    })?;

    session.ledger.associate(&b, &token).await?;
    session.begin_transfer("late", "a").await?;
    session.add_token_line("late", "gate", "a", -10)?;
    session.add_token_line("late", "gate", "b", 10)?;
    session.sign("late", &["a"])?;
    session.submit("late").await?;

    let held_a = session.ledger.get_token_balance(&a, &token).await?;
    let held_b = session.ledger.get_token_balance(&b, &token).await?;
    ensure!((held_a, held_b) == (90, 10), "balances are {held_a}/{held_b}");
    Ok(())
}

pub async fn atomic_transfer(session: &mut Session) -> Result<()> {
    let names = ["alice", "bob", "carol"];
    let funds = [1_000, 100, 0];
    let mut accounts = Vec::new();
    for (name, hbar) in names.iter().zip(funds) {
        accounts.push(session.add_actor(name, hbar).await?);
    }

    // bob cannot cover his line, so nobody moves
    session.begin_transfer("overdrawn", "alice").await?;
    session.add_hbar_line("overdrawn", "alice", -300)?;
    session.add_hbar_line("overdrawn", "bob", -200)?;
    session.add_hbar_line("overdrawn", "carol", 500)?;
    session.sign("overdrawn", &["alice", "bob"])?;
    let overdrawn = session.submit("overdrawn").await;
    expect_rejection(overdrawn, "overdrawn batch", |e| {
        matches!(e, LedgerError::InsufficientBalance { .. })
    })?;
    for (account, expected) in accounts.iter().zip(funds) {
        let balance = session.ledger.get_account_balance(account).await?;
        ensure!(balance == expected, "{account} changed to {balance} after rejection");
    }

    session.begin_transfer("settled", "alice").await?;
    session.add_hbar_line("settled", "alice", -300)?;
    session.add_hbar_line("settled", "bob", -100)?;
    session.add_hbar_line("settled", "carol", 400)?;
    session.sign("settled", &["alice"])?;
    session.sign("settled", &["bob"])?;
    let receipt = session.submit("settled").await?;
    ensure!(receipt.transfers.len() == 3, "receipt lists {} movements", receipt.transfers.len());

    let mut total = 0;
    for (account, expected) in accounts.iter().zip([700, 0, 400]) {
        let balance = session.ledger.get_account_balance(account).await?;
        ensure!(balance == expected, "{account} holds {balance}, expected {expected}");
        total += balance;
    }
    ensure!(total == 1_100, "hbar was created or destroyed");
    Ok(())
}

pub async fn topic_messaging(session: &mut Session) -> Result<()> {
    session.add_actor("publisher", 10).await?;
    let topic = session.create_topic("news", "scenario feed", None).await?;
    let mut subscription = session.ledger.subscribe(&topic, 1).await?;

    for body in ["M1", "M2", "M3"] {
        session
            .begin_transaction(
                body,
                "publisher",
                TransactionBody::TopicMessage {
                    topic,
                    payload: body.as_bytes().to_vec(),
                },
            )
            .await?;
        session.sign(body, &["publisher"])?;
        session.submit(body).await?;
    }

    let mut previous = None;
    for (expected_sequence, body) in (1u64..).zip(["M1", "M2", "M3"]) {
        let Some(message) = subscription.next(SUBSCRIBE_WAIT).await? else {
            bail!("subscription ended early");
        };
        ensure!(message.sequence_number == expected_sequence, "out of order delivery");
        ensure!(message.payload == body.as_bytes(), "payload mismatch at {expected_sequence}");
        if let Some(previous) = previous {
            ensure!(message.consensus_timestamp > previous, "timestamps not increasing");
        }
        previous = Some(message.consensus_timestamp);
    }

    subscription.cancel();
    ensure!(subscription.is_cancelled(), "cancel did not stick");
    ensure!(subscription.next(SUBSCRIBE_WAIT).await?.is_none(), "cancelled subscription delivered");
    let info = session.ledger.get_topic_info(&topic).await?;
    ensure!(info.sequence_number == 3, "topic holds {} messages", info.sequence_number);
    Ok(())
}

pub async fn threshold_topic(session: &mut Session) -> Result<()> {
    for name in ["m1", "m2", "m3"] {
        session.add_actor(name, 0).await?;
    }
    let members = ["m1", "m2", "m3"]
        .iter()
        .map(|name| Ok(session.actor(name)?.credential.public_key()))
        .collect::<Result<Vec<_>>>()?;
    let key = Key::threshold(2, members)?;
    let topic = session.create_topic("council", "2-of-3", Some(key)).await?;

    let lone = session.signers(&["m2"])?;
    let rejected = session
        .ledger
        .submit_message(&topic, b"motion".to_vec(), &lone)
        .await
        .map_err(Into::into);
    expect_rejection(rejected, "single-member submit", |e| matches!(e, LedgerError::Unauthorized(_)))?;

    let quorum = session.signers(&["m1", "m3"])?;
    let (sequence, _) = session
        .ledger
        .submit_message(&topic, b"motion".to_vec(), &quorum)
        .await?;
    ensure!(sequence == 1, "first message got sequence {sequence}");
    Ok(())
}
