//! One-shot timers for a single character.
//!
//! The state machine never sleeps; it asks a [`Scheduler`] for a wake-up and
//! keeps the returned [`TimerToken`]. A token that is no longer the armed one
//! for its [`TimerKind`] is stale, and firing it does nothing :
//!
//! ┌──────────── Stale timer guard ──────────────────────────┐
//! │  arm(Frame)      -> token 7    armed[Frame] = 7         │
//! │  arm(Frame)      -> token 8    armed[Frame] = 8 (7 cxl) │
//! │  fire(7)         -> ignored    7 != armed[Frame]        │
//! │  fire(8)         -> Frame      armed[Frame] cleared     │
//! └─────────────────────────────────────────────────────────┘
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

/// Shortest delay handed to a scheduler, so a zero interval can't spin.
const MIN_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    Frame,
    Physics,
    Movement,
    Jump,
    IdleCheck,
    Close,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// "Wake me after a duration" plus cancellation, on a clock owned by the
/// scheduler.
pub trait Scheduler {
    fn now(&self) -> Duration;
    fn schedule(&mut self, delay: Duration) -> TimerToken;
    fn cancel(&mut self, token: TimerToken);
    /// Pops the earliest timer due at or before `deadline` and moves the
    /// clock to its due time. With nothing due the clock moves to
    /// `deadline` and `None` is returned.
    fn next_due(&mut self, deadline: Duration) -> Option<TimerToken>;
    /// Timers scheduled and not yet fired or cancelled.
    fn pending(&self) -> usize;
}

/// Deterministic scheduler driven by explicit elapsed time.
/// - the browser game loop feeds it fixed steps
/// - tests feed it whatever they like
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_token: u64,
    queue: BTreeSet<(Duration, TimerToken)>,
    due_at: HashMap<TimerToken, Duration>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for TimerQueue {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(&mut self, delay: Duration) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        let due = self.now + delay;
        self.queue.insert((due, token));
        self.due_at.insert(token, due);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(due) = self.due_at.remove(&token) {
            self.queue.remove(&(due, token));
        }
    }

    fn next_due(&mut self, deadline: Duration) -> Option<TimerToken> {
        match self.queue.first().copied() {
            Some((due, token)) if due <= deadline => {
                self.queue.remove(&(due, token));
                self.due_at.remove(&token);
                self.now = self.now.max(due);
                Some(token)
            }
            _ => {
                self.now = self.now.max(deadline);
                None
            }
        }
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// The armed timer of each kind for one character.
#[derive(Debug, Default)]
pub struct Timers<S> {
    scheduler: S,
    armed: BTreeMap<TimerKind, TimerToken>,
}

impl<S: Scheduler> Timers<S> {
    pub fn new(scheduler: S) -> Self {
        Timers {
            scheduler,
            armed: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// (Re)arms `kind`; a previously armed timer of that kind is cancelled
    /// so there is never more than one per kind.
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.disarm(kind);
        let token = self.scheduler.schedule(delay.max(MIN_DELAY));
        self.armed.insert(kind, token);
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        if let Some(token) = self.armed.remove(&kind) {
            self.scheduler.cancel(token);
        }
    }

    pub fn disarm_all(&mut self) {
        for (_, token) in std::mem::take(&mut self.armed) {
            self.scheduler.cancel(token);
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Armed kinds in a stable order.
    pub fn armed(&self) -> Vec<TimerKind> {
        self.armed.keys().copied().collect()
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// Next live timer due by `deadline`; stale tokens are skipped.
    pub fn next_fired(&mut self, deadline: Duration) -> Option<TimerKind> {
        loop {
            let token = self.scheduler.next_due(deadline)?;
            if let Some(kind) = self.claim(token) {
                return Some(kind);
            }
        }
    }

    fn claim(&mut self, token: TimerToken) -> Option<TimerKind> {
        let kind = self
            .armed
            .iter()
            .find(|(_, armed)| **armed == token)
            .map(|(kind, _)| *kind)?;
        self.armed.remove(&kind);
        Some(kind)
    }
}
