pub mod memory;
pub mod postgres_fraud_log;
pub mod postgres_transaction_repository;

pub use memory::{InMemoryFraudLog, InMemoryLedger};
pub use postgres_fraud_log::PostgresFraudLog;
pub use postgres_transaction_repository::PostgresTransactionRepository;
