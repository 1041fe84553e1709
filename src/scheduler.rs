// THEORY:
// Both screens need timers: a one-second countdown ticker, and a short one-shot
// delay before the recorder is asked to start. This module is the seam for them.
//
// Timers do not run callbacks. A firing is delivered as a plain `TimerFired` value
// to whoever owns the session, and the owner asks the scheduler to `accept` it
// before acting. A handle that has been cancelled is unknown to the scheduler, so a
// firing that was already in flight when the session stopped is rejected there and
// can never resurrect a stopped session.
//
// Two implementations are provided:
// - `TokioScheduler` runs every timer as a small tokio task and delivers firings
//   through an unbounded mpsc channel. Cancelling aborts the task.
// - `ManualScheduler` keeps a virtual clock and hands out due firings one at a time,
//   for deterministic tests and for embedders that drive their own loop.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Opaque identifier of a scheduled timer. Never reused by the scheduler that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What a timer is for, so a single firing channel can serve a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    DwellCountdown,
    SessionCountdown,
    RecorderStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub handle: TimerHandle,
    pub kind: TimerKind,
}

pub trait Scheduler {
    /// Fires once after `delay`.
    fn schedule_once(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle;

    /// Fires every `interval`, the first time one `interval` from now.
    fn schedule_repeating(&mut self, interval: Duration, kind: TimerKind) -> TimerHandle;

    /// Stops a timer. Unknown or already-cancelled handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);

    /// Returns true if `fired` belongs to a live timer and should be acted on.
    /// One-shot timers are retired by a successful accept.
    fn accept(&mut self, fired: &TimerFired) -> bool;
}

struct TokioTimer {
    task: JoinHandle<()>,
    repeating: bool,
}

/// Timers backed by tokio tasks. Must be used from within a tokio runtime.
pub struct TokioScheduler {
    fired_tx: mpsc::UnboundedSender<TimerFired>,
    timers: HashMap<TimerHandle, TokioTimer>,
    next_id: u64,
}

impl TokioScheduler {
    /// Creates the scheduler together with the receiving end of its firing channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            fired_tx,
            timers: HashMap::new(),
            next_id: 0,
        };
        (scheduler, fired_rx)
    }

    fn next_handle(&mut self) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    pub fn live_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        let handle = self.next_handle();
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired { handle, kind });
        });
        trace!(?handle, ?kind, ?delay, "scheduled one-shot timer");
        self.timers.insert(
            handle,
            TokioTimer {
                task,
                repeating: false,
            },
        );
        handle
    }

    fn schedule_repeating(&mut self, interval: Duration, kind: TimerKind) -> TimerHandle {
        let handle = self.next_handle();
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(TimerFired { handle, kind }).is_err() {
                    break;
                }
            }
        });
        trace!(?handle, ?kind, ?interval, "scheduled repeating timer");
        self.timers.insert(
            handle,
            TokioTimer {
                task,
                repeating: true,
            },
        );
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(timer) = self.timers.remove(&handle) {
            timer.task.abort();
            trace!(?handle, "cancelled timer");
        }
    }

    fn accept(&mut self, fired: &TimerFired) -> bool {
        match self.timers.get(&fired.handle) {
            None => false,
            Some(timer) if timer.repeating => true,
            Some(_) => {
                self.timers.remove(&fired.handle);
                true
            }
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct ManualTimer {
    /// Virtual time of the next firing. `None` once a one-shot has fired and awaits `accept`.
    due: Option<Duration>,
    interval: Option<Duration>,
    kind: TimerKind,
}

/// A scheduler over a virtual clock that only moves when told to.
#[derive(Default)]
pub struct ManualScheduler {
    now: Duration,
    timers: HashMap<TimerHandle, ManualTimer>,
    next_id: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Pops the earliest timer due at or before `until`, moving the clock to its due time.
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerFired> {
        let (handle, due) = self
            .timers
            .iter()
            .filter_map(|(handle, timer)| timer.due.map(|due| (*handle, due)))
            .filter(|(_, due)| *due <= until)
            .min_by_key(|(handle, due)| (*due, *handle))?;

        let timer = self.timers.get_mut(&handle)?;
        self.now = self.now.max(due);
        timer.due = timer.interval.map(|interval| due + interval);
        Some(TimerFired {
            handle,
            kind: timer.kind,
        })
    }

    /// Moves the clock forward to `until` without firing anything.
    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    pub fn live_timers(&self) -> usize {
        self.timers.len()
    }

    fn insert(&mut self, first_due: Duration, interval: Option<Duration>, kind: TimerKind) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            handle,
            ManualTimer {
                due: Some(self.now + first_due),
                interval,
                kind,
            },
        );
        handle
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        self.insert(delay, None, kind)
    }

    fn schedule_repeating(&mut self, interval: Duration, kind: TimerKind) -> TimerHandle {
        self.insert(interval, Some(interval), kind)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.remove(&handle);
    }

    fn accept(&mut self, fired: &TimerFired) -> bool {
        match self.timers.get(&fired.handle) {
            None => false,
            Some(timer) if timer.interval.is_some() => true,
            Some(_) => {
                self.timers.remove(&fired.handle);
                true
            }
        }
    }
}
