pub mod cron_worker;
pub mod job;
pub mod runner;

pub use cron_worker::CronWorker;
pub use job::JobKind;
pub use runner::{JobRunRecord, JobRunner, JobStatus};
