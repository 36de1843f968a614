mod intervals;
mod select;
mod types;

pub use select::Scheduler;
pub use types::{Rejection, RejectionReason, ScheduleResult, SelectOptions};
