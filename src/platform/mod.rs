//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Display-refresh scheduling
//! - Cancellation of in-flight frame callbacks
//! - Event-listener lifetimes

use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Schedules one frame callback per request (requestAnimationFrame on web)
pub trait FrameScheduler {
    type Handle: Copy + std::fmt::Debug + PartialEq;

    /// Ask for the next frame; `None` when the platform can't schedule
    fn request(&mut self) -> Option<Self::Handle>;

    /// Cancel a pending request. Unknown or already-fired handles are ignored.
    fn cancel(&mut self, handle: Self::Handle);
}

/// Shared flag checked by in-flight callbacks before touching the engine
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

type Detach = Box<dyn FnOnce()>;

/// Keeps an event listener attached until dropped or detached
pub struct Subscription {
    detach: RefCell<Option<Detach>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: RefCell::new(Some(Box::new(detach))),
        }
    }

    /// Remove the listener; later calls do nothing
    pub fn detach(&self) {
        if let Some(detach) = self.detach.borrow_mut().take() {
            detach();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.detach.borrow().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Undo a half-finished mount step (e.g. remove an attached canvas) when
/// the next step fails
pub fn undo_on_err<T, E>(result: Result<T, E>, undo: impl FnOnce()) -> Result<T, E> {
    if result.is_err() {
        undo();
    }
    result
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Scheduler that never fires; used for one-shot renders
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualScheduler {
    next: u32,
}

impl FrameScheduler for ManualScheduler {
    type Handle = u32;

    fn request(&mut self) -> Option<u32> {
        self.next = self.next.wrapping_add(1);
        Some(self.next)
    }

    fn cancel(&mut self, _handle: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_subscription_detaches_once() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let sub = Subscription::new(move || c.set(c.get() + 1));
        sub.detach();
        sub.detach();
        drop(sub);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_subscription_detaches_on_drop() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        {
            let _sub = Subscription::new(move || c.set(c.get() + 1));
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_undo_runs_only_on_error() {
        let undone = Cell::new(0);
        let ok: Result<u32, String> = undo_on_err(Ok(7), || undone.set(undone.get() + 1));
        assert_eq!(ok, Ok(7));
        assert_eq!(undone.get(), 0);

        let err: Result<u32, String> =
            undo_on_err(Err("listener".into()), || undone.set(undone.get() + 1));
        assert_eq!(err, Err("listener".to_string()));
        assert_eq!(undone.get(), 1);
    }

    #[test]
    fn test_manual_scheduler_handles_distinct() {
        let mut s = ManualScheduler::default();
        let a = s.request();
        let b = s.request();
        assert_ne!(a, b);
    }
}
