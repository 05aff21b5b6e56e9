//! Periodic background jobs.

use affiliate_api::AppState;
use affiliate_core::config::ScheduleConfig;
use affiliate_store::KeyValueStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Store housekeeping such as expiring in-memory TTL entries.
pub fn spawn_maintenance(store: Arc<dyn KeyValueStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            store.maintenance().await;
        }
    });
}

/// Run `job` every `period`, starting one period from now.
fn spawn_every<F, Fut>(period: Duration, mut job: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            job().await;
        }
    });
}

/// Publish a feed and a ranking at startup, then keep refreshing the feed and
/// re-ranking on their configured intervals. A failed run is logged and
/// retried on the next tick.
pub fn spawn_jobs(state: &AppState, schedule: &ScheduleConfig) {
    let refresh_every = Duration::from_secs(schedule.refresh_interval_secs.max(1));
    let rank_every = Duration::from_secs(schedule.ranking_interval_secs.max(1));

    let startup = state.clone();
    tokio::spawn(async move {
        refresh_feed(&startup).await;
        rank_offers(&startup).await;
    });

    let refresh_state = state.clone();
    spawn_every(refresh_every, move || {
        let state = refresh_state.clone();
        async move { refresh_feed(&state).await }
    });

    let rank_state = state.clone();
    spawn_every(rank_every, move || {
        let state = rank_state.clone();
        async move { rank_offers(&state).await }
    });

    info!(
        refresh_interval_secs = refresh_every.as_secs(),
        ranking_interval_secs = rank_every.as_secs(),
        "Scheduled jobs started"
    );
}

async fn refresh_feed(state: &AppState) {
    match state.catalog.refresh().await {
        Ok(refresh) => info!(count = refresh.count, "Scheduled feed refresh complete"),
        Err(e) => error!(error = %e, "Scheduled feed refresh failed"),
    }
}

async fn rank_offers(state: &AppState) {
    match state.ranking.run().await {
        Ok(summary) => info!(
            count = summary.count,
            top_offer = %summary.top_offer,
            "Scheduled ranking complete"
        ),
        Err(e) if e.is_client_error() => warn!(error = %e, "Scheduled ranking skipped"),
        Err(e) => error!(error = %e, "Scheduled ranking failed"),
    }
}
