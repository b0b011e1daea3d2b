pub mod fraud_recorder;
pub mod fraud_scan;
pub mod redemption;
pub mod scan_scheduler;
pub mod ticket_protocol;

pub use fraud_recorder::{FraudRecorder, RetryPolicy};
pub use fraud_scan::FraudScanService;
pub use redemption::{RedemptionLocks, RedemptionStateMachine};
pub use scan_scheduler::ScanScheduler;
pub use ticket_protocol::{IssuedTicket, Purchase, PurchaseRequest, Redemption, TicketService};

use std::future::Future;
use std::time::Duration;

use crate::ports::{RepositoryError, RepositoryResult};

/// Bound a store call; an elapsed timer is reported as an unavailable store.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> RepositoryResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Unavailable(format!(
            "call timed out after {} ms",
            limit.as_millis()
        ))),
    }
}
