//! Property tests: random mutation histories always converge, and a converged
//! system stays put under repeated syncs.

use chrono::Duration;
use proptest::prelude::*;
use std::sync::Arc;
use tally_engine::{
    Client, ClientConfig, ConflictPolicy, ManualClock, Server, SharedServer,
};

const KEYS: [&str; 4] = ["2014-05-10", "2014-05-11", "2014-05-12", "2014-05-13"];
const CLIENTS: usize = 3;

#[derive(Debug, Clone)]
enum Step {
    Create { node: usize, key: usize, value: u8 },
    Update { node: usize, key: usize, value: u8 },
    Delete { node: usize, key: usize },
    Sync { client: usize },
    FullSync { client: usize },
    Wait { seconds: u8 },
}

fn step() -> impl Strategy<Value = Step> {
    // node 0 is the server, 1..=CLIENTS are clients
    let node = 0..=CLIENTS;
    let key = 0..KEYS.len();
    prop_oneof![
        (node.clone(), key.clone(), any::<u8>())
            .prop_map(|(node, key, value)| Step::Create { node, key, value }),
        (node.clone(), key.clone(), any::<u8>())
            .prop_map(|(node, key, value)| Step::Update { node, key, value }),
        (node, key).prop_map(|(node, key)| Step::Delete { node, key }),
        (0..CLIENTS).prop_map(|client| Step::Sync { client }),
        (0..CLIENTS).prop_map(|client| Step::FullSync { client }),
        (1u8..5).prop_map(|seconds| Step::Wait { seconds }),
    ]
}

fn policy() -> impl Strategy<Value = ConflictPolicy> {
    prop_oneof![
        Just(ConflictPolicy::ServerWins),
        Just(ConflictPolicy::ClientWins),
        Just(ConflictPolicy::TimestampWins),
    ]
}

struct World {
    server: SharedServer,
    clients: Vec<Client<SharedServer>>,
    clock: Arc<ManualClock>,
}

impl World {
    fn new(policy: ConflictPolicy) -> Self {
        let clock = Arc::new(ManualClock::default());
        let server = SharedServer::new(Server::with_clock("server", clock.clone()));
        let clients = (0..CLIENTS)
            .map(|i| {
                Client::with_clock(
                    ClientConfig::new(format!("client{i}")).with_policy(policy),
                    server.clone(),
                    clock.clone(),
                )
            })
            .collect();
        Self {
            server,
            clients,
            clock,
        }
    }

    // Duplicate keys and unknown keys are rejected without side effects;
    // the histories deliberately include them.
    fn apply(&mut self, step: &Step) {
        match *step {
            Step::Create { node: 0, key, value } => {
                let _ = self.server.lock().create(KEYS[key], "server", value.to_string());
            }
            Step::Create { node, key, value } => {
                let _ = self.clients[node - 1].create(KEYS[key], "client", value.to_string());
            }
            Step::Update { node: 0, key, value } => {
                let _ = self.server.lock().update(KEYS[key], value.to_string());
            }
            Step::Update { node, key, value } => {
                let _ = self.clients[node - 1].update(KEYS[key], value.to_string());
            }
            Step::Delete { node: 0, key } => {
                let _ = self.server.lock().delete(KEYS[key]);
            }
            Step::Delete { node, key } => {
                let _ = self.clients[node - 1].delete(KEYS[key]);
            }
            Step::Sync { client } => {
                self.clients[client].sync().unwrap();
            }
            Step::FullSync { client } => {
                self.clients[client].full_sync().unwrap();
            }
            Step::Wait { seconds } => {
                self.clock.advance(Duration::seconds(i64::from(seconds)));
            }
        }
    }

    fn sync_round(&mut self) {
        for client in &mut self.clients {
            client.sync().unwrap();
        }
    }

    fn assert_converged(&self) {
        let server = self.server.lock();
        for client in &self.clients {
            assert_eq!(client.len(), server.len(), "{client}\n{server}");
            for record in server.records() {
                let local = client
                    .get(&record.primary_key)
                    .unwrap_or_else(|| panic!("{} missing {}", client.name(), record.primary_key));
                assert_eq!(local.global_id, record.global_id);
                assert_eq!(local.value, record.value);
                assert_eq!(local.deleted, record.deleted);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn two_sequential_rounds_converge(
        policy in policy(),
        steps in proptest::collection::vec(step(), 0..40),
    ) {
        let mut world = World::new(policy);
        for step in &steps {
            world.apply(step);
        }

        world.sync_round();
        world.sync_round();

        world.assert_converged();
    }

    #[test]
    fn converged_state_is_stable_under_resync(
        policy in policy(),
        steps in proptest::collection::vec(step(), 0..40),
        repeats in 1usize..4,
    ) {
        let mut world = World::new(policy);
        for step in &steps {
            world.apply(step);
        }
        world.sync_round();
        world.sync_round();

        let snapshot: Vec<_> = world
            .clients
            .iter()
            .map(|c| (c.records().cloned().collect::<Vec<_>>(), c.counter(), c.cursors()))
            .collect();
        let server_counter = world.server.lock().counter();

        for _ in 0..repeats {
            world.clock.advance(Duration::seconds(60));
            world.sync_round();
        }

        for (client, (records, counter, cursors)) in world.clients.iter().zip(snapshot) {
            prop_assert_eq!(client.records().cloned().collect::<Vec<_>>(), records);
            prop_assert_eq!(client.counter(), counter);
            prop_assert_eq!(client.cursors(), cursors);
        }
        prop_assert_eq!(world.server.lock().counter(), server_counter);
    }
}
