use std::cell::Cell;
use std::fmt::Debug;
use std::rc::Rc;

/// Suspension predicate polled while it sits on top of a runner's waiter stack.
pub trait Waiter: Debug {
    /// `true` keeps the runner suspended for this tick.
    fn should_wait(&mut self, delta_time: f32) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedWaiter {
    duration: f32,
    elapsed: f32,
}

impl TimedWaiter {
    pub fn new(seconds: f32) -> Self {
        Self {
            duration: seconds,
            elapsed: 0.0,
        }
    }

    pub fn remaining(&self) -> f32 {
        (self.duration - self.elapsed).max(0.0)
    }
}

impl Waiter for TimedWaiter {
    fn should_wait(&mut self, delta_time: f32) -> bool {
        self.elapsed += delta_time;
        self.elapsed < self.duration
    }
}

/// Waits until the paired [`CancelHandle`] fires.
#[derive(Debug)]
pub struct CancelableWaiter {
    cancelled: Rc<Cell<bool>>,
}

#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Rc<Cell<bool>>,
}

impl CancelableWaiter {
    pub fn new() -> (Self, CancelHandle) {
        let cancelled = Rc::new(Cell::new(false));
        (
            Self {
                cancelled: cancelled.clone(),
            },
            CancelHandle { cancelled },
        )
    }
}

impl Waiter for CancelableWaiter {
    fn should_wait(&mut self, _delta_time: f32) -> bool {
        !self.cancelled.get()
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}
