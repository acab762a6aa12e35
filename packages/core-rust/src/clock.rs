//! Source of "today" for date-dependent computed fields.
//!
//! Age and licence-status derivation depend on the current date. Injecting it
//! through [`Clock`] keeps the computation engine pure and lets tests pin the
//! date.

use chrono::{Local, NaiveDate};

/// Abstraction over the calendar date used by the computation engine.
pub trait Clock: Send + Sync {
    /// Returns the current local calendar date.
    fn today(&self) -> NaiveDate;
}

/// Reads the date from the system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
