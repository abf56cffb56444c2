//! Platform abstraction for deferring reconciler work.
//!
//! The reconciler never runs passive effects or cross-render flushes on the
//! stack that requested them. It hands a task to the embedder through
//! [`TaskScheduler`] and expects it to be called back on a later turn of the
//! same thread.

pub type Task = Box<dyn FnOnce() + 'static>;

pub trait TaskScheduler {
    /// Run `task` as soon as the current call stack unwinds.
    fn schedule_microtask(&self, task: Task);

    /// Run `task` on a later turn, after pending microtasks.
    fn schedule_deferred_callback(&self, task: Task);
}

#[cfg(test)]
pub(crate) use test_scheduler::TestScheduler;
