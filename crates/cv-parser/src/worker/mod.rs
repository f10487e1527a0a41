//! Job model and workload-isolated thread pools.

pub mod job;
pub mod manager;
pub mod pool;

pub use job::{Job, JobOutcome, JobState};
pub use manager::{PoolKind, WorkPoolManager};
pub use pool::{DrainReport, WorkPool};
