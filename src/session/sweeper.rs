use super::SessionStore;
use crate::recording::Recorder;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Evict sessions idle longer than `max_idle` every `period`.
///
/// Recordings held by evicted sessions are discarded with them.
pub fn spawn_idle_sweeper(
    store: Arc<dyn SessionStore>,
    recorder: Arc<Recorder>,
    max_idle: Duration,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_idle(store.as_ref(), &recorder, max_idle).await;
        }
    })
}

/// One eviction pass; returns how many sessions were evicted
pub async fn sweep_idle(store: &dyn SessionStore, recorder: &Recorder, max_idle: Duration) -> usize {
    let evicted = store.evict_idle(max_idle).await;

    for session in &evicted {
        if recorder.discard_session(session).await {
            info!(
                "Discarded recording of idle session {}",
                session.user_id()
            );
        }
    }

    if !evicted.is_empty() {
        info!(
            "Evicted {} idle sessions ({} remaining)",
            evicted.len(),
            store.len().await
        );
    }

    evicted.len()
}
