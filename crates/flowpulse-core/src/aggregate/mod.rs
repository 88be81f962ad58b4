//! Workflow aggregation: the pure fold plus the live aggregator around it.

pub mod aggregator;
pub mod fold;

use flowpulse_types::error::StoreError;
use thiserror::Error;

pub use aggregator::WorkflowAggregator;
pub use fold::{WorkflowFold, fold_events};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
