//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently evaluating.
//! When a reactive property is read, the subscriber on top of the stack is
//! registered as a dependent of that property's [`Dep`](super::Dep).
//!
//! # Implementation
//!
//! We use a thread-local stack rather than a single "current subscriber"
//! slot. A computed value evaluated lazily in the middle of a render pushes
//! its own frame, collects its own dependencies, and pops back to the render
//! frame without disturbing it.
//!
//! Frames are popped by a guard, so the stack stays balanced on every exit
//! path: early `?` returns and panics included.

use std::cell::RefCell;

use super::{SubscriberId, Watcher};

thread_local! {
    /// `None` frames are untracked scopes: reads inside them register nothing.
    static CONTEXT_STACK: RefCell<Vec<Option<Watcher>>> = RefCell::new(Vec::new());
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given watcher.
    ///
    /// While the returned guard is alive, reactive reads register `watcher`
    /// as a dependent.
    pub fn enter(watcher: &Watcher) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(watcher.clone())));
        Self {
            subscriber_id: Some(watcher.id()),
        }
    }

    /// Run `f` with dependency collection suspended.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        let _guard = Self {
            subscriber_id: None,
        };
        f()
    }

    /// Check if a subscriber is currently collecting dependencies.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// The watcher currently collecting dependencies, if any.
    pub fn current() -> Option<Watcher> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.as_ref().map(Watcher::id))
        })
    }

    /// Number of frames on the stack, tracked or not.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Catch mismatched enter/exit pairs.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.as_ref().map(Watcher::id),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Value;

    fn watcher() -> Watcher {
        Watcher::lazy(|| Ok(Value::Null))
    }

    #[test]
    fn context_tracks_subscriber() {
        let w = watcher();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(&w);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(w.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let outer = watcher();
        let inner = watcher();

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(&inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner.id()));
                assert_eq!(ReactiveContext::depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_hides_outer_subscriber() {
        let outer = watcher();
        let _ctx = ReactiveContext::enter(&outer);

        ReactiveContext::untracked(|| {
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::current().is_none());
        });

        assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
    }

    #[test]
    fn stack_unwinds_on_panic() {
        let w = watcher();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(&w);
            panic!("evaluation failed");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
