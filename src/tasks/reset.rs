//! Reset Timer
//!
//! The one-shot registration state every repository carries: the periodic
//! callback is installed at most once per instance and can be killed for good.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{CachePolicy, Refresh};
use crate::tasks::{Scheduler, Tick, TimerHandle};

// == Reset Timer ==
#[derive(Debug, Default)]
pub struct ResetTimer {
    registered: AtomicBool,
    handle: Mutex<Option<TimerHandle>>,
}

impl ResetTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `tick` according to `policy`, unless this timer was already
    /// registered. Returns `true` only for the registration that took effect.
    pub fn register(
        &self,
        name: &str,
        policy: CachePolicy,
        scheduler: &dyn Scheduler,
        tick: Tick,
    ) -> bool {
        if self
            .registered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(
                "Reset timer for '{}' already registered, ignoring policy {}",
                name, policy
            );
            return false;
        }

        if let Refresh::Every(period) = policy.refresh() {
            debug!("Registering reset timer for '{}' every {:?}", name, period);
            *self.handle.lock() = Some(scheduler.schedule_repeating(period, tick));
        }
        true
    }

    /// True while a periodic callback is installed and not killed.
    pub fn is_active(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Stops the periodic callback permanently. Idempotent.
    pub fn kill(&self) {
        if let Some(mut handle) = self.handle.lock().take() {
            handle.cancel();
        }
    }
}

impl Drop for ResetTimer {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::ManualScheduler;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_tick() -> (Arc<AtomicUsize>, Tick) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_register_exactly_once() {
        let scheduler = ManualScheduler::new();
        let timer = ResetTimer::new();
        let (count, tick) = counting_tick();

        assert!(timer.register("repo", CachePolicy::StaleAfterFiveSeconds, &scheduler, tick.clone()));
        assert!(!timer.register("repo", CachePolicy::StaleAfterTenSeconds, &scheduler, tick));
        assert_eq!(scheduler.active_timers(), 1);

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_timer_policies_register_without_callback() {
        let scheduler = ManualScheduler::new();

        for policy in [CachePolicy::NoReset, CachePolicy::DoNotCache] {
            let timer = ResetTimer::new();
            let (_, tick) = counting_tick();
            assert!(timer.register("repo", policy, &scheduler, tick.clone()));
            assert!(!timer.is_active());
            assert!(!timer.register("repo", CachePolicy::StaleAfterFiveSeconds, &scheduler, tick));
        }
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn test_kill_is_permanent_and_idempotent() {
        let scheduler = ManualScheduler::new();
        let timer = ResetTimer::new();
        let (count, tick) = counting_tick();
        timer.register("repo", CachePolicy::StaleAfterFiveSeconds, &scheduler, tick.clone());
        assert!(timer.is_active());

        timer.kill();
        timer.kill();
        assert!(!timer.is_active());
        assert!(!timer.register("repo", CachePolicy::StaleAfterFiveSeconds, &scheduler, tick));

        scheduler.advance(Duration::from_secs(60));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_cancels_timer() {
        let scheduler = ManualScheduler::new();
        let (count, tick) = counting_tick();
        {
            let timer = ResetTimer::new();
            timer.register("repo", CachePolicy::StaleAfterFiveSeconds, &scheduler, tick);
        }

        scheduler.advance(Duration::from_secs(60));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
