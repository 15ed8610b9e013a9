//! seeds a demo ledger, keeps generating traffic and serves the query API

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tally_core::{KeyProvisioner, Ledger, SystemClock, TokenCreate};
use tally_rpc::{run_api, RpcConfig, SharedState};
use tally_sim::{Session, SimulationPresets};
use tokio::task;

const ACTORS: [&str; 3] = ["alice", "bob", "carol"];

async fn seed(session: &mut Session) -> Result<()> {
    for name in ACTORS {
        session.add_actor(name, 10_000).await?;
    }
    let treasury = session.account("alice")?;
    let supply_key = session.public_key("alice")?;
    let token = session
        .create_token(
            "demo",
            TokenCreate::new("Demo Token", "DMO", treasury)
                .decimals(2)
                .initial_supply(1_000_000)
                .finite(10_000_000)
                .supply_key(supply_key),
        )
        .await?;
    for name in &ACTORS[1..] {
        let account = session.account(name)?;
        session.ledger.associate(&account, &token).await?;
    }
    session.create_topic("activity", "demo activity feed", None).await?;
    Ok(())
}

/// One random token transfer between two distinct actors, announced on the
/// activity topic.
async fn tick(session: &mut Session, round: u64) -> Result<()> {
    let (from, to, amount) = {
        let mut rng = rand::rng();
        let from = rng.random_range(0..ACTORS.len());
        let to = (from + rng.random_range(1..ACTORS.len())) % ACTORS.len();
        (ACTORS[from], ACTORS[to], rng.random_range(1..=500i64))
    };

    let label = format!("tick-{round}");
    session.begin_transfer(&label, from).await?;
    session.add_token_line(&label, "demo", from, -amount)?;
    session.add_token_line(&label, "demo", to, amount)?;
    session.sign(&label, &[from])?;
    let submitted = session.submit(&label).await;
    session.forget(&label);
    match submitted {
        Ok(receipt) => {
            let note = format!("{from} sent {amount} DMO to {to} ({})", receipt.transaction_id);
            let topic = session.topic("activity")?;
            if let Err(e) = session
                .ledger
                .submit_message(&topic, note.into_bytes(), &Default::default())
                .await
            {
                log::warn!("round {round}: announcement dropped: {e}");
            }
        }
        Err(e) => log::warn!("round {round}: {e:#}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    log::info!("=== Tally Ledger Node Starting ===");
    let ledger = Ledger::with_clock(SimulationPresets::local(), Arc::new(SystemClock));
    let mut session = Session::new(ledger.clone(), KeyProvisioner::new());
    seed(&mut session).await?;

    let state = SharedState {
        ledger,
        config: RpcConfig::default(),
    };
    log::info!("Starting API server on {}...", state.config.bind_addr);

    // api in dedicated task
    let api_handle = task::spawn(run_api(state));

    let mut interval = tokio::time::interval(Duration::from_secs(2));
    let mut round = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                round += 1;
                if let Err(e) = tick(&mut session, round).await {
                    log::error!("round {round} failed: {e:#}");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    log::info!("Shutting down after {round} rounds");
    api_handle.abort();
    Ok(())
}
