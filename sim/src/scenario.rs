//! Randomized multi-client workload against one shared server.
//!
//! Every client runs on its own tokio task and performs a few random
//! mutations followed by a sync, once per round. The server edits its own
//! records on a separate task. Once all tasks finish, every client does a
//! full sync followed by one more incremental sync and the final states
//! must agree.

use crate::config::Config;
use crate::error::{AppError, Result};
use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use tally_engine::{Client, ClientConfig, Record, Server, SharedServer, SyncCursors, SyncReport};

/// Counters accumulated by one node over the run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStats {
    pub mutations: usize,
    pub syncs: usize,
    /// Dirty records resolved through the conflict policy
    pub conflicts: usize,
    /// Pushes answered with CONFLICT
    pub collisions: usize,
}

impl WorkloadStats {
    fn record_sync(&mut self, report: &SyncReport) {
        self.syncs += 1;
        self.conflicts += report.pull.conflicts.len();
        if !report.push.status.is_ok() {
            self.collisions += 1;
        }
    }

    fn merge(&mut self, other: &WorkloadStats) {
        self.mutations += other.mutations;
        self.syncs += other.syncs;
        self.conflicts += other.conflicts;
        self.collisions += other.collisions;
    }
}

/// Final state of a completed run.
#[derive(Debug)]
pub struct Outcome {
    pub server: SharedServer,
    pub clients: Vec<Client<SharedServer>>,
    pub stats: WorkloadStats,
}

fn key_for(index: usize) -> String {
    format!("item-{index:03}")
}

/// Run the configured workload to completion and verify convergence.
pub async fn run(config: &Config) -> Result<Outcome> {
    let server = SharedServer::new(Server::new("server"));

    let server_task = tokio::spawn(edit_server(
        server.clone(),
        config.rounds,
        config.seed.wrapping_sub(1),
    ));

    let client_tasks = (0..config.clients).map(|i| {
        let client = Client::new(
            ClientConfig::new(format!("client-{i}")).with_policy(config.policy),
            server.clone(),
        );
        tokio::spawn(drive_client(
            client,
            config.rounds,
            config.keys,
            config.seed.wrapping_add(i as u64),
        ))
    });

    let finished = try_join_all(client_tasks).await?;
    let mut stats = server_task.await?;

    let mut clients = Vec::with_capacity(finished.len());
    for result in finished {
        let (client, client_stats) = result?;
        stats.merge(&client_stats);
        clients.push(client);
    }

    tracing::info!(
        mutations = stats.mutations,
        syncs = stats.syncs,
        conflicts = stats.conflicts,
        collisions = stats.collisions,
        "Concurrent rounds finished, settling"
    );

    settle(&mut clients, &mut stats)?;
    verify_convergence(&server, &clients)?;

    tracing::info!(
        records = server.lock().len(),
        clients = clients.len(),
        "All nodes converged"
    );

    Ok(Outcome {
        server,
        clients,
        stats,
    })
}

async fn drive_client(
    mut client: Client<SharedServer>,
    rounds: usize,
    keys: usize,
    seed: u64,
) -> std::result::Result<(Client<SharedServer>, WorkloadStats), tally_engine::Error> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stats = WorkloadStats::default();

    for round in 0..rounds {
        for _ in 0..rng.gen_range(1..=3) {
            mutate(&mut client, &mut rng, keys)?;
            stats.mutations += 1;
        }

        let report = client.sync()?;
        tracing::debug!(
            client = client.name(),
            round,
            status = %report.status(),
            received = report.pull.received,
            sent = report.push.sent,
            "Round synced"
        );
        stats.record_sync(&report);

        tokio::task::yield_now().await;
    }

    Ok((client, stats))
}

fn mutate(
    client: &mut Client<SharedServer>,
    rng: &mut StdRng,
    keys: usize,
) -> std::result::Result<(), tally_engine::Error> {
    let key = key_for(rng.gen_range(0..keys));
    let value = rng.gen_range(0..1000).to_string();

    match client.get(&key).map(Record::is_active) {
        None => {
            let name = client.name().to_string();
            client.create(key, name, value)?;
        }
        Some(true) if rng.gen_bool(0.2) => {
            client.delete(&key)?;
        }
        Some(_) => {
            client.update(&key, value)?;
        }
    }
    Ok(())
}

async fn edit_server(server: SharedServer, rounds: usize, seed: u64) -> WorkloadStats {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stats = WorkloadStats::default();

    for _ in 0..rounds {
        {
            let mut guard = server.lock();
            let active: Vec<String> = guard
                .records()
                .filter(|r| r.is_active())
                .map(|r| r.primary_key.clone())
                .collect();
            if !active.is_empty() {
                let key = &active[rng.gen_range(0..active.len())];
                let value = format!("srv-{}", rng.gen_range(0..1000));
                if guard.update(key, value).is_ok() {
                    stats.mutations += 1;
                }
            }
        }
        tokio::task::yield_now().await;
    }

    stats
}

/// Full sync everyone once, then one incremental round.
fn settle(clients: &mut [Client<SharedServer>], stats: &mut WorkloadStats) -> Result<()> {
    for client in clients.iter_mut() {
        let report = client.full_sync()?;
        stats.record_sync(&report);
    }
    for client in clients.iter_mut() {
        let report = client.sync()?;
        stats.record_sync(&report);
    }
    Ok(())
}

/// Every client must hold exactly the server's records.
pub fn verify_convergence(server: &SharedServer, clients: &[Client<SharedServer>]) -> Result<()> {
    let server = server.lock();

    for client in clients {
        if client.len() != server.len() {
            return Err(AppError::Diverged(format!(
                "{} holds {} records, server holds {}",
                client.name(),
                client.len(),
                server.len()
            )));
        }

        for expected in server.records() {
            let matches = client.get(&expected.primary_key).is_some_and(|local| {
                local.global_id == expected.global_id
                    && local.value == expected.value
                    && local.deleted == expected.deleted
            });
            if !matches {
                return Err(AppError::Diverged(format!(
                    "{} disagrees with server on {}",
                    client.name(),
                    expected.primary_key
                )));
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeDump<'a> {
    name: &'a str,
    counter: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursors: Option<SyncCursors>,
    records: Vec<&'a Record>,
}

#[derive(Serialize)]
struct StateDump<'a> {
    stats: WorkloadStats,
    nodes: Vec<NodeDump<'a>>,
}

impl Outcome {
    /// Pretty JSON of every node's final state.
    pub fn to_json(&self) -> Result<String> {
        let server = self.server.lock();
        let mut nodes = vec![NodeDump {
            name: server.name(),
            counter: server.counter(),
            cursors: None,
            records: server.records().collect(),
        }];
        nodes.extend(self.clients.iter().map(|client| NodeDump {
            name: client.name(),
            counter: client.counter(),
            cursors: Some(client.cursors()),
            records: client.records().collect(),
        }));

        let dump = StateDump {
            stats: self.stats,
            nodes,
        };
        let json = serde_json::to_string_pretty(&dump)?;
        Ok(json)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "mutations={} syncs={} conflicts={} collisions={}",
            self.stats.mutations, self.stats.syncs, self.stats.conflicts, self.stats.collisions
        )?;
        writeln!(f)?;
        // Node Display impls already end every line, records included
        write!(f, "{}", *self.server.lock())?;
        for client in &self.clients {
            writeln!(f)?;
            write!(f, "{client}")?;
        }
        Ok(())
    }
}
