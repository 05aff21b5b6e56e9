//! Outcomes of best-effort bookkeeping steps.
//!
//! Counter and profile updates that follow a click or sale never fail the
//! parent operation. Each step reports here instead; failures are logged and
//! counted, and stay invisible to the HTTP caller.

use affiliate_core::AffiliateResult;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    OfferLookup,
    OfferClickStats,
    ProfileClick,
    ClickLookup,
    OfferSaleStats,
    ProfileConversion,
    DailyMetrics,
    PersonalizedCache,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfferLookup => "offer_lookup",
            Self::OfferClickStats => "offer_click_stats",
            Self::ProfileClick => "profile_click",
            Self::ClickLookup => "click_lookup",
            Self::OfferSaleStats => "offer_sale_stats",
            Self::ProfileConversion => "profile_conversion",
            Self::DailyMetrics => "daily_metrics",
            Self::PersonalizedCache => "personalized_cache",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Applied,
    Skipped(&'static str),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step: Step,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default)]
pub struct Bookkeeping {
    steps: Vec<StepOutcome>,
}

impl Bookkeeping {
    /// Record the result of a step, logging and counting a failure.
    pub fn record<T>(&mut self, step: Step, result: AffiliateResult<T>) {
        let status = match result {
            Ok(_) => StepStatus::Applied,
            Err(e) => {
                warn!(step = step.as_str(), error = %e, "Bookkeeping step failed");
                metrics::counter!("bookkeeping.failed", "step" => step.as_str()).increment(1);
                StepStatus::Failed(e.to_string())
            }
        };
        self.steps.push(StepOutcome { step, status });
    }

    pub fn skip(&mut self, step: Step, reason: &'static str) {
        self.steps.push(StepOutcome {
            step,
            status: StepStatus::Skipped(reason),
        });
    }

    pub fn status(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|o| o.step == step).map(|o| &o.status)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Failed(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}
