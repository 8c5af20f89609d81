//! Timer bank
//!
//! One repeating timer task per enabled interval schedule, keyed by the
//! schedule id. A fire re-checks the owning record and then hands the id
//! to the orchestrator over an mpsc channel; the orchestrator applies the
//! minimum-interval guard and starts the job.

use super::{ScheduleKind, ScheduleStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct TimerBank {
    store: Arc<ScheduleStore>,
    fire_tx: mpsc::Sender<Uuid>,
    timers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl TimerBank {
    pub fn new(store: Arc<ScheduleStore>, fire_tx: mpsc::Sender<Uuid>) -> Self {
        Self {
            store,
            fire_tx,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Start the timer for an interval schedule. Restart is idempotent:
    /// a running timer for the same id is stopped first. Non-interval
    /// kinds are ignored.
    pub async fn start(&self, schedule_id: Uuid) {
        let Some(schedule) = self.store.get(schedule_id).await else {
            return;
        };
        let ScheduleKind::Interval { every_ms } = schedule.kind else {
            return;
        };
        if !schedule.enabled {
            return;
        }

        self.stop(schedule_id);

        let period = Duration::from_millis(every_ms.max(1) as u64);
        let store = Arc::clone(&self.store);
        let fire_tx = self.fire_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                // Re-read the owning record; it may have been disabled or
                // deleted since the last tick.
                match store.get(schedule_id).await {
                    Some(s) if s.enabled => {
                        if fire_tx.send(schedule_id).await.is_err() {
                            tracing::debug!("Timer fire channel closed, stopping {}", schedule_id);
                            break;
                        }
                    }
                    Some(_) => {
                        tracing::debug!("Schedule {} disabled, timer exiting", schedule_id);
                        break;
                    }
                    None => break,
                }
            }
        });
        self.timers.lock().insert(schedule_id, handle);
        tracing::debug!("Started timer for schedule {} every {:?}", schedule_id, period);
    }

    /// Stop and forget the timer for a schedule, if any
    pub fn stop(&self, schedule_id: Uuid) {
        if let Some(handle) = self.timers.lock().remove(&schedule_id) {
            handle.abort();
            tracing::debug!("Stopped timer for schedule {}", schedule_id);
        }
    }

    pub fn stop_all(&self) {
        let mut timers = self.timers.lock();
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn running_count(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Drop for TimerBank {
    fn drop(&mut self) {
        self.stop_all();
    }
}
