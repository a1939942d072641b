//! Periodic Scheduler
//!
//! Repositories never start timers themselves; they ask an injected
//! [`Scheduler`] for a repeating tick. [`TokioScheduler`] runs ticks on tokio's
//! blocking pool, [`ManualScheduler`] runs them when virtual time is advanced.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Callback invoked on every tick.
pub type Tick = Arc<dyn Fn() + Send + Sync>;

// == Scheduler ==
/// Source of repeating ticks.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Calls `tick` every `period`, first one full period from now, until the
    /// returned handle is cancelled.
    fn schedule_repeating(&self, period: Duration, tick: Tick) -> TimerHandle;
}

// == Timer Handle ==
/// Owned handle to a repeating tick.
///
/// Once [`TimerHandle::cancel`] returns no new tick starts. A tick that is
/// already running completes.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    fn new(cancelled: Arc<AtomicBool>, task: Option<JoinHandle<()>>) -> Self {
        Self { cancelled, task }
    }

    /// Stops the tick. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// == Tokio Scheduler ==
/// Times ticks on a tokio runtime. Ticks do blocking disk I/O, so each one
/// runs on the runtime's blocking pool and the next waits for it to finish.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Uses the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime; use [`TokioScheduler::try_current`]
    /// where that is possible.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Uses the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, tick: Tick) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let task = self.handle.spawn(async move {
            debug!("Starting repeating tick every {:?}", period);

            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let tick = tick.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || tick()).await {
                    warn!("Repeating tick failed: {}", e);
                }
            }
        });

        TimerHandle::new(cancelled, Some(task))
    }
}

// == Manual Scheduler ==
/// Virtual-time scheduler; ticks fire only inside [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    timers: Vec<ManualTimer>,
}

struct ManualTimer {
    period: Duration,
    next_due: Duration,
    tick: Tick,
    cancelled: Arc<AtomicBool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of timers that have not been cancelled.
    pub fn active_timers(&self) -> usize {
        let mut state = self.state.lock();
        state.timers.retain(|timer| !timer.cancelled.load(Ordering::SeqCst));
        state.timers.len()
    }

    /// Moves virtual time forward by `by`, firing every tick that falls due,
    /// in chronological order. Returns how many ticks ran.
    ///
    /// Ticks run on the calling thread without the scheduler lock held.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut fired = 0;

        loop {
            let due = {
                let mut state = self.state.lock();
                state.timers.retain(|timer| !timer.cancelled.load(Ordering::SeqCst));

                let next = state
                    .timers
                    .iter_mut()
                    .filter(|timer| timer.next_due <= target)
                    .min_by_key(|timer| timer.next_due);

                match next {
                    Some(timer) => {
                        let due_at = timer.next_due;
                        timer.next_due += timer.period;
                        let tick = (timer.tick.clone(), timer.cancelled.clone());
                        state.now = due_at;
                        Some(tick)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            let Some((tick, cancelled)) = due else {
                break;
            };
            if cancelled.load(Ordering::SeqCst) {
                continue;
            }
            tick();
            fired += 1;
        }

        trace!("Advanced virtual time by {:?}, {} tick(s) fired", by, fired);
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, tick: Tick) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let next_due = state.now + period;
        state.timers.push(ManualTimer {
            period,
            next_due,
            tick,
            cancelled: cancelled.clone(),
        });
        TimerHandle::new(cancelled, None)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("timers", &state.timers.len())
            .finish()
    }
}
