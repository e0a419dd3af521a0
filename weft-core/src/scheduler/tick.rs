//! Deferred callbacks (`next_tick`).
//!
//! Callbacks are kept in one FIFO list. The first callback added while no
//! drain is pending schedules a single microtask; that microtask drains the
//! whole list, including callbacks added while it runs.
//!
//! The watcher-queue flush is itself registered through [`next_tick`], and it
//! is always the first callback of the burst that dirtied anything. User
//! callbacks registered after a mutation therefore observe the patched tree.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::event_loop::queue_microtask;

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct CallbackQueue {
    callbacks: VecDeque<Callback>,
    /// A drain microtask has been queued and has not started yet.
    pending: bool,
}

thread_local! {
    static CALLBACKS: RefCell<CallbackQueue> = RefCell::new(CallbackQueue::default());
}

/// Run `callback` after the current synchronous turn, after any flush that
/// was scheduled before it.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    let schedule = CALLBACKS.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.callbacks.push_back(Box::new(callback));
        !std::mem::replace(&mut queue.pending, true)
    });

    if schedule {
        queue_microtask(flush_callbacks);
    }
}

/// Number of callbacks waiting for the next drain.
pub fn pending_callbacks() -> usize {
    CALLBACKS.with(|queue| queue.borrow().callbacks.len())
}

fn flush_callbacks() {
    // Cleared before running so a callback can schedule a fresh drain.
    CALLBACKS.with(|queue| queue.borrow_mut().pending = false);

    while let Some(callback) = CALLBACKS.with(|queue| queue.borrow_mut().callbacks.pop_front()) {
        callback();
    }
}
