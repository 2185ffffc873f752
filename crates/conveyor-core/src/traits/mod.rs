pub mod job_store;
pub mod schedule_store;

pub use job_store::JobStore;
pub use schedule_store::CronScheduleStore;
