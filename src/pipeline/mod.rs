//! End-to-end processing of vouchers and batches.
//!
//! [`Pipeline`] takes one [`Document`](crate::core::Document) from its
//! current lifecycle state to `Accepted`/`Rejected`, saving a snapshot
//! through the [`DocumentStore`] after every transition.
//! [`BatchCoordinator`] feeds stored documents through the pipeline one at
//! a time in a detached task.

mod batch;
mod process;
mod store;

pub use batch::{BatchConfig, BatchCoordinator, BatchHandle, BatchItemError, BatchState, BatchStatus};
pub use process::{Pipeline, PipelineError, Stage};
pub use store::{DocumentStore, InMemoryStore};
