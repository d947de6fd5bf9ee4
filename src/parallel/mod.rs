pub mod batch;
pub mod pool;

pub use batch::{batch_ranges, run_parallel_jobs};
pub use pool::WorkerPool;
