use std::{sync::Arc, time::Duration};

use futures::{stream::FuturesUnordered, StreamExt};
use shared::{domain::TrackId, protocol::Notification};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{error::ClientError, remote::RemoteService};

pub const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Receives poll results. Sequence numbers come from `begin_fetch`, so the
/// sink decides which completion is the latest.
pub trait NotificationSink: Send + Sync + 'static {
    fn begin_fetch(&self) -> u64;
    fn publish(&self, sequence: u64, notifications: Vec<Notification>);
    /// Called for every failed fetch. The loop keeps running regardless.
    fn report_failure(&self, sequence: u64, error: &ClientError);
}

#[derive(Clone)]
pub struct NotificationPoller {
    remote: Arc<dyn RemoteService>,
    period: Duration,
}

impl NotificationPoller {
    pub fn new(remote: Arc<dyn RemoteService>, period: Duration) -> Self {
        let period = if period.is_zero() {
            NOTIFICATION_POLL_INTERVAL
        } else {
            period
        };
        Self { remote, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Fetches once right away, then every period until the handle is stopped
    /// or dropped.
    pub fn start(&self, track_id: TrackId, sink: Arc<dyn NotificationSink>) -> PollerHandle {
        info!(
            track_id = %track_id,
            period_secs = self.period.as_secs(),
            "poller: started"
        );
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.remote),
            self.period,
            track_id,
            sink,
        ));
        PollerHandle {
            track_id,
            task: Some(task),
        }
    }
}

async fn poll_loop(
    remote: Arc<dyn RemoteService>,
    period: Duration,
    track_id: TrackId,
    sink: Arc<dyn NotificationSink>,
) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let sequence = sink.begin_fetch();
                let remote = Arc::clone(&remote);
                in_flight.push(async move { (sequence, remote.list_notifications().await) });
            }
            Some((sequence, result)) = in_flight.next(), if !in_flight.is_empty() => match result {
                Ok(batch) => {
                    debug!(track_id = %track_id, sequence, count = batch.len(), "poller: fetched");
                    sink.publish(sequence, batch);
                }
                Err(err) => {
                    warn!(track_id = %track_id, sequence, error = %err, "poller: fetch failed");
                    sink.report_failure(sequence, &err);
                }
            },
        }
    }
}

/// Owns the polling task. `stop` is idempotent; dropping the handle aborts
/// the task as well.
#[derive(Debug)]
pub struct PollerHandle {
    track_id: TrackId,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Returns once the task is gone; no fetch is issued after that.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        let _ = task.await;
        info!(track_id = %self.track_id, "poller: stopped");
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
