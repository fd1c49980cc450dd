// Common test utilities for integration tests
#![allow(dead_code)]

use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Once};

use palaver::ids::SequentialGenerator;
use palaver::notify::{ChannelNotifier, Notice};
use palaver::storage::MemoryStorage;
use palaver::{ChatStore, ResponseSimulator, SimulatorConfig};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// A store over fresh in-memory storage with predictable ids
pub fn memory_store() -> (ChatStore, Arc<MemoryStorage>) {
    setup_logging();
    let storage = Arc::new(MemoryStorage::new());
    let store = ChatStore::open_with_ids(storage.clone(), Arc::new(SequentialGenerator::new("id")));
    (store, storage)
}

/// Simulator config with a fixed follow-up decision
pub fn config_with_follow_up(probability: f64) -> SimulatorConfig {
    SimulatorConfig {
        follow_up_probability: probability,
        ..SimulatorConfig::default()
    }
}

/// A seeded simulator that reports notices over a channel
pub fn simulator(store: &ChatStore, config: SimulatorConfig) -> (ResponseSimulator, tokio::sync::mpsc::Receiver<Notice>) {
    let (notifier, notices) = ChannelNotifier::new(16);
    let simulator = ResponseSimulator::with_rng(store.clone(), config, Arc::new(notifier), StdRng::seed_from_u64(42));
    (simulator, notices)
}
