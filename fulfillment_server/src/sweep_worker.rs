use std::{sync::Arc, time::Duration};

use actix_web::rt::{self, task::JoinHandle};
use fulfillment_engine::reconciliation_objects::SweepResult;
use log::*;

use crate::server::LiveReconciliationApi;

/// Starts the stale order sweep. Orders that are still waiting on the gateway after `stale_after` are re-queried,
/// which covers webhooks that were lost or never sent. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// The sweep runs on the current arbiter, so this must be called from within the actix system.
pub fn start_sweep_worker(
    api: Arc<LiveReconciliationApi>,
    interval: Duration,
    stale_after: chrono::Duration,
) -> JoinHandle<()> {
    rt::spawn(async move {
        let mut timer = rt::time::interval(interval);
        // the first tick completes immediately
        timer.tick().await;
        info!("🧹️ Stale order sweep started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🧹️ Running stale order sweep");
            match api.reconcile_stale_orders(stale_after).await {
                Ok(result) if result.examined == 0 => trace!("🧹️ No stale orders"),
                Ok(result) => info!("🧹️ {}", sweep_summary(&result)),
                Err(e) => error!("🧹️ Error running the stale order sweep: {e}"),
            }
        }
    })
}

fn sweep_summary(result: &SweepResult) -> String {
    format!(
        "{} stale orders examined. {} committed, {} unchanged, {} anomalies, {} to retry, {} failed",
        result.examined, result.committed, result.unchanged, result.anomalies, result.retry_later, result.failed
    )
}
