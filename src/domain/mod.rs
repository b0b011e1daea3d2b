pub mod fraud;
pub mod ticket;
pub mod transaction;

pub use fraud::{FraudLogEntry, FraudReason, NewFraudLogEntry};
pub use ticket::TicketPayload;
pub use transaction::{
    NewTransaction, Transaction, TransactionFilter, TransactionStatus, TransactionUpdate,
    UnknownStatus,
};
