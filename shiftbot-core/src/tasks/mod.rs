pub mod poll_scheduler;

pub use poll_scheduler::{
    poll_once, CycleOutcome, Job, PollScheduler, SchedulerHandle, SchedulerState, StopReason,
    DEFAULT_POLL_INTERVAL,
};
