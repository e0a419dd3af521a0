//! Update Scheduler
//!
//! Batches watcher re-runs so that any number of synchronous writes in one
//! turn produce a single flush, and provides `next_tick` for callbacks that
//! must observe the patched tree.
//!
//! Everything here is per thread. Nothing runs until the host drives the
//! [`EventLoop`].

mod event_loop;
mod queue;
mod tick;

pub use event_loop::{queue_microtask, EventLoop, Task};
pub(crate) use event_loop::report;
pub use queue::{is_queued, queue_watcher, queued_len, reset_stats, stats, FlushStats};
pub use tick::{next_tick, pending_callbacks};
