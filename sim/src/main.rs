//! Tally Sim - drives one in-process server and a fleet of syncing clients.
//!
//! Clients mutate a shared key space concurrently and sync after every round.
//! When the workload ends every node is settled and checked for convergence,
//! and the final state is printed as text or JSON.

mod config;
mod error;
mod scenario;

use crate::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_sim=debug,tally_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    run().await?;

    Ok(())
}

async fn run() -> error::Result<()> {
    let config = Config::from_env()?;

    tracing::info!(
        clients = config.clients,
        rounds = config.rounds,
        keys = config.keys,
        policy = %config.policy,
        seed = config.seed,
        "Starting simulation"
    );

    let outcome = scenario::run(&config).await?;

    if config.dump_json {
        println!("{}", outcome.to_json()?);
    } else {
        print!("{outcome}");
    }

    Ok(())
}
