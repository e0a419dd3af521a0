//! Microtask loop.
//!
//! The runtime never suspends on its own. Deferred work is pushed onto a
//! per-thread FIFO of microtasks, and the host drains it by calling
//! [`EventLoop::run_until_idle`] once the synchronous part of its turn is
//! over. Failures recorded by tasks during the drain are returned together.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::{Error, Result};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
    static FAILURES: RefCell<Vec<Error>> = RefCell::new(Vec::new());
}

/// Schedule `task` to run on the next drain.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    MICROTASKS.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
}

/// Record a failure to be returned from the current drain.
pub(crate) fn report(error: Error) {
    FAILURES.with(|failures| failures.borrow_mut().push(error));
}

/// The per-thread event loop.
pub struct EventLoop;

impl EventLoop {
    /// Run microtasks until none are left, including ones queued while
    /// draining. Returns how many ran.
    pub fn run_until_idle() -> Result<usize> {
        let mut ran = 0;
        // Pop one at a time so tasks can queue more without a borrow conflict.
        while let Some(task) = MICROTASKS.with(|queue| queue.borrow_mut().pop_front()) {
            task();
            ran += 1;
        }

        tracing::trace!(ran, "event loop idle");
        let failures = FAILURES.with(|failures| std::mem::take(&mut *failures.borrow_mut()));
        Error::collect(failures).map(|()| ran)
    }

    /// Number of microtasks waiting.
    pub fn pending() -> usize {
        MICROTASKS.with(|queue| queue.borrow().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn runs_in_fifo_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            queue_microtask(move || log.borrow_mut().push(i));
        }

        assert_eq!(EventLoop::pending(), 3);
        assert_eq!(EventLoop::run_until_idle().unwrap(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_queued_while_draining_run_in_the_same_drain() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let outer = log.clone();
        queue_microtask(move || {
            outer.borrow_mut().push("first");
            let inner = outer.clone();
            queue_microtask(move || inner.borrow_mut().push("second"));
        });

        assert_eq!(EventLoop::run_until_idle().unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(EventLoop::pending(), 0);
    }

    #[test]
    fn reported_failures_are_returned_once() {
        queue_microtask(|| report(Error::callback("bad")));

        assert!(EventLoop::run_until_idle().is_err());
        assert_eq!(EventLoop::run_until_idle().unwrap(), 0);
    }
}
