//! Long-running processors.
//!
//! - `TaskWorker`: leases due tasks from the queue and runs a `TaskHandler`
//!   on each (the `PaymentStatusTask` reconciliation task in production)
//! - `BalanceUpdater`: receives `BalanceEvent`, refreshes and stores
//!   merchant balances

pub mod balance_updater;
pub mod payment_status;
pub mod task_worker;

pub use balance_updater::{BalanceError, BalanceUpdater};
pub use payment_status::{PaymentStatusPayload, PaymentStatusTask, ReconcileError};
pub use task_worker::{Settlement, TaskHandler, TaskOutcome, TaskWorker};
