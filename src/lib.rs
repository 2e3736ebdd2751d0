// Reward Points - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod service;
pub mod source;
pub mod tiers;
pub mod transaction;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use aggregator::{window_start, AggregationScope, Aggregator, MonthlyPoints, RewardResult};
pub use config::RewardConfig;
pub use db::{
    get_all_transactions, get_transactions_for_customer, insert_transactions, setup_database,
    verify_count, SqliteSource,
};
pub use error::{RewardError, ServiceError};
pub use service::RewardService;
pub use source::{load_csv, InMemorySource, TransactionSource};
pub use tiers::{points, Tier, TierCalculator};
pub use transaction::{CustomerId, Transaction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the `tracing` subscriber used by both binaries (`RUST_LOG`, default `info`)
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
