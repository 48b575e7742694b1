use std::time::{Duration, Instant};

/// Accounts host time per executor step.
pub(crate) struct StepTimer {
    start: Instant,
    last: Instant,
}

impl StepTimer {
    pub fn from_now() -> Self {
        let now = Instant::now();
        StepTimer {
            start: now,
            last: now,
        }
    }

    /// Close the current step, logging how long it took.
    pub fn checkpoint(&mut self, step: &str) {
        let now = Instant::now();
        let took = now.saturating_duration_since(self.last);
        log::debug!("{}: {:?}", step, took);
        self.last = now;
    }

    pub fn spent(&self) -> Duration {
        self.last.saturating_duration_since(self.start)
    }
}
