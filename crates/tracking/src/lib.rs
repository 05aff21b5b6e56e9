//! Click and sale tracking: the click -> sale attribution chain and the
//! aggregate counters it maintains.

#![warn(clippy::unwrap_used)]

pub mod classify;
pub mod click;
pub mod daily;
pub mod outcome;
pub mod profile;
pub mod sale;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use click::{ClickAttributor, ClickOutcome, ClickRequest};
pub use daily::DailyMetricsLedger;
pub use outcome::{Bookkeeping, Step, StepOutcome, StepStatus};
pub use profile::{ProfileDefaults, UserProfileStore};
pub use sale::{SaleCallback, SaleOutcome};
pub use stats::OfferStatsAggregator;
