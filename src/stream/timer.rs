//! Cancellable scheduled tasks
//!
//! Both session timers run as tokio tasks owned through a [`ScheduledTask`].
//! Dropping or cancelling the handle aborts the task, so a disarmed timer can
//! never fire.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

/// Handle to a spawned timer; aborts on drop
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `fire` once after `delay`
    pub fn after<F>(delay: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(async move {
            time::sleep(delay).await;
            fire();
        })
    }

    /// Run `fire` every `period`, first after one full period.
    ///
    /// The task stops by itself when `fire` returns false.
    pub fn every<F>(period: Duration, mut fire: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        Self::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !fire() {
                    break;
                }
            }
        })
    }

    /// Run a one-off background future under the same abort-on-drop rule
    pub fn run(task: impl Future<Output = ()> + Send + 'static) -> Self {
        Self::spawn(task)
    }

    fn spawn(task: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            handle: tokio::spawn(task),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
