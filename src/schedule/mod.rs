//! Run scheduling: off-day rules and jitter delays

mod delay;
mod policy;

pub use delay::{jitter_sleep, random_delay_secs, DelayRange};
pub use policy::{is_weekend, local_date_in, should_skip, OffDayConfig, SkipReason};
