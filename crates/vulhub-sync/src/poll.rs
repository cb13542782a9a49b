use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::key::QueryKey;

/// One timer per key, armed while the key has subscribers.
///
/// The tick callback returns `false` once its owner is gone, which ends the
/// timer without waiting for `disarm`.
#[derive(Debug)]
pub struct PollingScheduler {
    timers: Mutex<HashMap<QueryKey, CancellationToken>>,
    shutdown: CancellationToken,
}

impl PollingScheduler {
    #[must_use]
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<QueryKey, CancellationToken>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start ticking `key` every `period`, first tick one period from now.
    ///
    /// Re-arming an armed key replaces its timer. A zero period arms nothing.
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, key: QueryKey, period: Duration, tick: F)
    where
        F: Fn(&QueryKey) -> bool + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return;
        }
        if period.is_zero() {
            debug!("Not polling {key}, period is zero");
            self.disarm(&key);
            return;
        }

        let token = self.shutdown.child_token();
        if let Some(previous) = self.timers().insert(key.clone(), token.clone()) {
            previous.cancel();
        }
        debug!("Polling {key} every {}s", period.as_secs_f64());

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        if !tick(&key) {
                            break;
                        }
                    }
                }
            }
            debug!("Polling stopped for {key}");
        });
    }

    pub fn disarm(&self, key: &QueryKey) {
        if let Some(token) = self.timers().remove(key) {
            token.cancel();
        }
    }

    #[must_use]
    pub fn is_armed(&self, key: &QueryKey) -> bool {
        self.timers().contains_key(key)
    }

    pub fn disarm_all(&self) {
        for (_, token) in self.timers().drain() {
            token.cancel();
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
