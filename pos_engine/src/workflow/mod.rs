//! Payment workflows.
//!
//! One [`PaymentWorkflow`] runs one transaction kind through amount entry, ledger check, payment method selection and
//! booking. Which payment methods a kind takes, and whether its failed bookings are retried in the background, is
//! looked up in the [`policy`](crate::policy) registry.
mod errors;
mod payment_workflow;
mod state;
mod tag;

pub use errors::WorkflowError;
pub use payment_workflow::{PaymentWorkflow, WorkflowLimits, WorkflowServices};
pub use state::WorkflowState;
pub use tag::{TagReadError, TagReader};
