//! Turns a set of inputs and requested prediction dates into an ordered,
//! memory-bounded job list, and runs tileable kernels across a worker pool.

mod job_planner;
mod parallelizer;

pub use job_planner::{Job, JobKind, JobPlanner, PlanStep};
pub use parallelizer::{NumThreads, Parallelizer};
