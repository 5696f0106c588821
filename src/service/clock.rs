use chrono::{Local, NaiveDateTime};

/// Source of "now" in server-local time. The calendar date of `now()` is "today".
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
