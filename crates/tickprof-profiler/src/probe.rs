//! Shadow call stack maintained by instrumentation probes.
//!
//! Instrumented functions call [`enter`] on entry and hold the returned
//! [`ProbeGuard`] until they return. The stack is thread-local; a profiler
//! samples the calling thread's stack on each tick.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::events::CallSite;

thread_local! {
    static STACK: RefCell<Vec<CallSite>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard that pops its call site on drop.
#[must_use = "dropping the guard immediately pops the call site; bind it with `let _probe = ...`"]
pub struct ProbeGuard {
    depth: usize,
    // The stack is thread-local, so the guard must stay on its thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        // Truncating also discards entries of guards leaked by mem::forget.
        STACK.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

/// Push `site` onto this thread's shadow stack.
#[inline]
pub fn enter(site: CallSite) -> ProbeGuard {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(site);
        ProbeGuard {
            depth,
            _not_send: PhantomData,
        }
    })
}

/// Push `site` with rendered argument values.
#[inline]
pub fn enter_with_args(site: CallSite, args: Vec<String>) -> ProbeGuard {
    enter(site.with_args(args))
}

/// Run `f` over this thread's shadow stack, outermost call first.
pub fn with_stack<R>(f: impl FnOnce(&[CallSite]) -> R) -> R {
    STACK.with(|stack| f(&stack.borrow()))
}

/// Number of active probes on this thread.
#[must_use]
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

/// Copy of this thread's shadow stack, outermost call first.
#[must_use]
pub fn snapshot() -> Vec<CallSite> {
    with_stack(<[CallSite]>::to_vec)
}
