pub mod job_runner;
pub mod scheduler;

pub use job_runner::{JobRunner, REBATE_JOB_LOCK, TIER_JOB_LOCK};
pub use scheduler::JobScheduler;
