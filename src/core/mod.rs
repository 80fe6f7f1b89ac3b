//! Run orchestration and the bounded worker pool

mod engine;
mod pool;

pub use engine::MirrorEngine;
pub use pool::{PoolStats, TransferPool};
