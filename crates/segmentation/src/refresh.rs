//! Background refresh of cached list counts.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::registry::ListRegistry;

/// Run [`ListRegistry::recount_all`] every `period` until the returned
/// handle is aborted. The first pass runs immediately.
pub fn spawn_periodic_recount(registry: Arc<ListRegistry>, period: Duration) -> JoinHandle<()> {
    info!(period_secs = period.as_secs_f64(), "starting periodic list recount");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let registry = registry.clone();
            match tokio::task::spawn_blocking(move || registry.recount_all()).await {
                Ok(report) => {
                    for (list_id, err) in report.failures() {
                        warn!(list_id = %list_id, error = %err, "periodic recount failed");
                    }
                }
                Err(e) => error!(error = %e, "periodic recount task aborted"),
            }
        }
    })
}
