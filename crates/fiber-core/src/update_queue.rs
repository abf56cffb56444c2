//! Pending-update queues and the per-pass interleaved merge.
//!
//! Updates raised while a pass is running land in a queue's `interleaved`
//! list. Only when the next pass starts are they appended to `pending`, so the
//! list a render is consuming is never extended underneath it.

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

pub(crate) struct SharedQueue<U> {
    pending: RefCell<Vec<U>>,
    interleaved: RefCell<Vec<U>>,
    registered: Cell<bool>,
}

impl<U> Default for SharedQueue<U> {
    fn default() -> Self {
        Self {
            pending: RefCell::new(Vec::new()),
            interleaved: RefCell::new(Vec::new()),
            registered: Cell::new(false),
        }
    }
}

impl<U> SharedQueue<U> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns true when this is the first interleaved update since the last
    /// merge, meaning the queue still has to be registered for the pass.
    fn push_interleaved(&self, update: U) -> bool {
        self.interleaved.borrow_mut().push(update);
        !self.registered.replace(true)
    }

    /// Render-phase updates skip the interleaved list.
    pub(crate) fn push_pending(&self, update: U) {
        self.pending.borrow_mut().push(update);
    }

    pub(crate) fn take_pending(&self) -> Vec<U> {
        mem::take(&mut *self.pending.borrow_mut())
    }

    pub(crate) fn has_updates(&self) -> bool {
        !self.pending.borrow().is_empty() || !self.interleaved.borrow().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    #[cfg(test)]
    pub(crate) fn interleaved_len(&self) -> usize {
        self.interleaved.borrow().len()
    }

    fn merge_interleaved(&self) {
        self.registered.set(false);
        let interleaved = mem::take(&mut *self.interleaved.borrow_mut());
        if interleaved.is_empty() {
            return;
        }
        self.pending.borrow_mut().extend(interleaved);
    }
}

pub(crate) trait ConcurrentQueue {
    fn finish_queueing(&self);
}

impl<U> ConcurrentQueue for SharedQueue<U> {
    fn finish_queueing(&self) {
        self.merge_interleaved();
    }
}

/// Queues that received interleaved updates since the last pass started.
#[derive(Default)]
pub(crate) struct ConcurrentQueues {
    queues: RefCell<Vec<Rc<dyn ConcurrentQueue>>>,
}

impl ConcurrentQueues {
    pub(crate) fn enqueue<U: 'static>(&self, queue: &Rc<SharedQueue<U>>, update: U) {
        if queue.push_interleaved(update) {
            let queue: Rc<dyn ConcurrentQueue> = queue.clone();
            self.queues.borrow_mut().push(queue);
        }
    }

    pub(crate) fn finish_queueing(&self) {
        let queues = mem::take(&mut *self.queues.borrow_mut());
        for queue in queues {
            queue.finish_queueing();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queues.borrow().len()
    }
}

pub(crate) struct Update<P> {
    pub(crate) payload: P,
}

/// Class-style queue used by the root; each update replaces the state.
pub(crate) struct UpdateQueue<S> {
    pub(crate) shared: Rc<SharedQueue<Update<S>>>,
}

impl<S: 'static> UpdateQueue<S> {
    pub(crate) fn new() -> Self {
        Self {
            shared: Rc::new(SharedQueue::new()),
        }
    }

    pub(crate) fn enqueue(&self, queues: &ConcurrentQueues, payload: S) {
        queues.enqueue(&self.shared, Update { payload });
    }

    /// Applies every pending update in order on top of `base`.
    pub(crate) fn process(&self, base: S) -> S {
        self.shared
            .take_pending()
            .into_iter()
            .fold(base, |_, update| update.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_updates_wait_for_finish_queueing() {
        let queues = ConcurrentQueues::default();
        let queue: UpdateQueue<i32> = UpdateQueue::new();
        queue.enqueue(&queues, 1);
        queue.enqueue(&queues, 2);
        assert_eq!(queues.len(), 1);
        assert_eq!(queue.shared.pending_len(), 0);
        assert_eq!(queue.process(0), 0);

        queues.finish_queueing();
        assert_eq!(queue.shared.interleaved_len(), 0);
        assert_eq!(queue.process(0), 2);
        assert!(!queue.shared.has_updates());
    }

    #[test]
    fn merge_appends_after_existing_pending() {
        let queues = ConcurrentQueues::default();
        let queue = Rc::new(SharedQueue::<&'static str>::new());
        queue.push_pending("render-phase");
        queues.enqueue(&queue, "interleaved");
        queues.finish_queueing();
        assert_eq!(queue.take_pending(), vec!["render-phase", "interleaved"]);
    }

    #[test]
    fn queue_registers_again_after_merge() {
        let queues = ConcurrentQueues::default();
        let queue = Rc::new(SharedQueue::<u8>::new());
        queues.enqueue(&queue, 1);
        queues.finish_queueing();
        queues.enqueue(&queue, 2);
        assert_eq!(queues.len(), 1);
    }
}
