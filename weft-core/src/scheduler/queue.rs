//! Watcher Queue
//!
//! Eager watchers that were notified are not run immediately. They are
//! collected here, deduplicated by id, and flushed once per turn in
//! ascending id order. Ids are handed out at creation, so parents (created
//! first) are patched before their children.
//!
//! # Flush
//!
//! 1. Sort the queue by id.
//! 2. Pop the lowest entry, clear its `has` flag, run it.
//! 3. A watcher notified mid-flush is inserted after the last pending entry
//!    with a smaller id, so it still runs in order within this flush.
//! 4. A watcher that runs more than `max_update_count` times in one flush is
//!    treated as an infinite loop: the flush is abandoned.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use super::event_loop::report;
use super::tick::next_tick;
use crate::config;
use crate::error::Error;
use crate::reactive::{SubscriberId, Watcher};

/// Counters accumulated across flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Completed flushes.
    pub flushes: u64,
    /// Watcher runs across all flushes.
    pub runs: u64,
}

#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<Watcher>,
    has: HashSet<SubscriberId>,
    /// A flush has been handed to `next_tick` and has not finished.
    waiting: bool,
    flushing: bool,
    stats: FlushStats,
}

thread_local! {
    static STATE: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

fn with_state<R>(f: impl FnOnce(&mut SchedulerState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Add `watcher` to the pending queue unless it is already there.
///
/// The first watcher queued in a turn schedules the flush.
pub fn queue_watcher(watcher: Watcher) {
    let id = watcher.id();
    let schedule = with_state(|state| {
        if !state.has.insert(id) {
            return false;
        }

        if state.flushing {
            let at = state
                .queue
                .iter()
                .rposition(|queued| queued.id() < id)
                .map_or(0, |i| i + 1);
            state.queue.insert(at, watcher);
        } else {
            state.queue.push_back(watcher);
        }
        tracing::trace!(subscriber = %id, "watcher queued");

        !std::mem::replace(&mut state.waiting, true)
    });

    if schedule {
        next_tick(flush_scheduler_queue);
    }
}

/// Check whether `id` is waiting in the queue.
pub fn is_queued(id: SubscriberId) -> bool {
    with_state(|state| state.has.contains(&id))
}

/// Number of watchers waiting in the queue.
pub fn queued_len() -> usize {
    with_state(|state| state.queue.len())
}

/// Counters accumulated on this thread.
pub fn stats() -> FlushStats {
    with_state(|state| state.stats)
}

/// Zero the counters.
pub fn reset_stats() {
    with_state(|state| state.stats = FlushStats::default());
}

fn flush_scheduler_queue() {
    let limit = config::current().max_update_count;
    let pending = with_state(|state| {
        state.flushing = true;
        state.queue.make_contiguous().sort_by_key(Watcher::id);
        state.queue.len()
    });
    tracing::debug!(pending, "flushing watcher queue");

    let mut counts: HashMap<SubscriberId, usize> = HashMap::new();
    let mut runs = 0u64;

    loop {
        let next = with_state(|state| {
            let watcher = state.queue.pop_front()?;
            state.has.remove(&watcher.id());
            Some(watcher)
        });
        let Some(watcher) = next else { break };
        let id = watcher.id();

        let count = counts.entry(id).or_default();
        *count += 1;
        if *count > limit {
            tracing::error!(subscriber = %id, limit, "infinite update loop, abandoning flush");
            report(Error::UpdateLoop { id, limit });
            with_state(|state| {
                state.queue.clear();
                state.has.clear();
            });
            break;
        }

        if let Err(source) = watcher.run() {
            tracing::warn!(subscriber = %id, error = %source, "watcher failed");
            report(Error::Evaluation {
                id,
                source: Box::new(source),
            });
        }
        runs += 1;
    }

    with_state(|state| {
        state.waiting = false;
        state.flushing = false;
        state.stats.flushes += 1;
        state.stats.runs += runs;
    });
    tracing::debug!(runs, "flush complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::reactive::{observe, ReactiveObject, Value};
    use crate::scheduler::EventLoop;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn object(data: serde_json::Value) -> ReactiveObject {
        observe(data).as_object().cloned().unwrap()
    }

    fn logging(log: &Log, name: &'static str) -> Watcher {
        let log = log.clone();
        Watcher::new(move || {
            log.borrow_mut().push(name);
            Ok(Value::Null)
        })
        .unwrap()
    }

    #[test]
    fn queueing_twice_runs_once() {
        let log: Log = Rc::default();
        let watcher = logging(&log, "w");
        log.borrow_mut().clear();

        queue_watcher(watcher.clone());
        queue_watcher(watcher.clone());
        assert_eq!(queued_len(), 1);

        EventLoop::run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["w"]);
        assert!(!is_queued(watcher.id()));
    }

    #[test]
    fn flush_runs_in_id_order() {
        let log: Log = Rc::default();
        let first = logging(&log, "1");
        let second = logging(&log, "2");
        let third = logging(&log, "3");
        log.borrow_mut().clear();

        queue_watcher(third);
        queue_watcher(first);
        queue_watcher(second);

        EventLoop::run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["1", "2", "3"]);
    }

    #[test]
    fn watcher_dirtied_mid_flush_runs_in_order() {
        let data = object(json!({ "x": 0 }));
        let log: Log = Rc::default();
        let armed = Rc::new(Cell::new(false));

        let (sink, writer, trigger) = (log.clone(), data.clone(), armed.clone());
        let first = Watcher::new(move || {
            sink.borrow_mut().push("1");
            if trigger.get() {
                writer.set("x", 1)?;
            }
            Ok(Value::Null)
        })
        .unwrap();

        let (sink, reader) = (log.clone(), data.clone());
        let _second = Watcher::new(move || {
            sink.borrow_mut().push("2");
            Ok(reader.get("x").unwrap_or_default())
        })
        .unwrap();

        let third = logging(&log, "3");
        log.borrow_mut().clear();
        armed.set(true);

        queue_watcher(third);
        queue_watcher(first);
        EventLoop::run_until_idle().unwrap();

        assert_eq!(*log.borrow(), vec!["1", "2", "3"]);
    }

    #[test]
    fn lower_id_dirtied_mid_flush_runs_next() {
        let data = object(json!({ "x": 0 }));
        let log: Log = Rc::default();
        let armed = Rc::new(Cell::new(false));

        let (sink, reader) = (log.clone(), data.clone());
        let _low = Watcher::new(move || {
            sink.borrow_mut().push("low");
            Ok(reader.get("x").unwrap_or_default())
        })
        .unwrap();

        let (sink, writer, trigger) = (log.clone(), data.clone(), armed.clone());
        let high = Watcher::new(move || {
            sink.borrow_mut().push("high");
            if trigger.get() {
                writer.set("x", 1)?;
            }
            Ok(Value::Null)
        })
        .unwrap();

        let highest = logging(&log, "highest");
        log.borrow_mut().clear();
        armed.set(true);

        queue_watcher(highest);
        queue_watcher(high);
        EventLoop::run_until_idle().unwrap();

        // No pending entry has a smaller id, so the reader goes to the front.
        assert_eq!(*log.borrow(), vec!["high", "low", "highest"]);
    }

    #[test]
    fn self_triggering_watcher_aborts_the_flush() {
        config::set(Config {
            max_update_count: 5,
            ..Config::default()
        });

        let data = object(json!({ "count": 0 }));
        let source = data.clone();
        let runaway = Watcher::new(move || {
            let n = source.get("count").and_then(|v| v.as_f64()).unwrap_or_default();
            source.set("count", n + 1.0)?;
            Ok(Value::Null)
        })
        .unwrap();

        let err = EventLoop::run_until_idle().unwrap_err();
        assert!(matches!(err, Error::UpdateLoop { id, limit: 5 } if id == runaway.id()));
        assert_eq!(queued_len(), 0);
        assert_eq!(runaway.run_count(), 6);
    }

    #[test]
    fn failing_watcher_does_not_stop_the_flush() {
        let log: Log = Rc::default();
        let armed = Rc::new(Cell::new(false));
        let trigger = armed.clone();
        let failing = Watcher::new(move || {
            if trigger.get() {
                return Err(Error::callback("render failed"));
            }
            Ok(Value::Null)
        })
        .unwrap();
        let healthy = logging(&log, "healthy");
        log.borrow_mut().clear();
        armed.set(true);

        queue_watcher(failing.clone());
        queue_watcher(healthy);

        let err = EventLoop::run_until_idle().unwrap_err();
        assert!(matches!(err, Error::Evaluation { id, .. } if id == failing.id()));
        assert_eq!(*log.borrow(), vec!["healthy"]);
    }

    #[test]
    fn flush_precedes_later_callbacks() {
        let data = object(json!({ "n": 1 }));
        let reader = data.clone();
        let watcher = Watcher::new(move || Ok(reader.get("n").unwrap_or_default())).unwrap();

        data.set("n", 2).unwrap();

        let seen = Rc::new(RefCell::new(Value::Null));
        let (sink, observed) = (seen.clone(), watcher.clone());
        crate::scheduler::next_tick(move || *sink.borrow_mut() = observed.value());

        EventLoop::run_until_idle().unwrap();
        assert_eq!(*seen.borrow(), Value::from(2));
    }

    #[test]
    fn stats_count_flushes_and_runs() {
        let log: Log = Rc::default();
        let a = logging(&log, "a");
        let b = logging(&log, "b");
        reset_stats();

        queue_watcher(a);
        queue_watcher(b);
        EventLoop::run_until_idle().unwrap();

        assert_eq!(stats(), FlushStats { flushes: 1, runs: 2 });
    }
}
