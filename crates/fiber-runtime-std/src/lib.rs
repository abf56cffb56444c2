//! Standard runtime services for fiber roots.
//!
//! [`StdScheduler`] implements [`fiber_core::TaskScheduler`] with two FIFO
//! queues. Nothing runs on its own: the embedder drains the queues from its
//! event loop with [`StdScheduler::run_until_idle`] or the finer-grained
//! `run_*` methods.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use fiber_core::{Task, TaskScheduler};
use log::trace;

/// Single-threaded scheduler backed by `VecDeque`s.
#[derive(Default)]
pub struct StdScheduler {
    microtasks: RefCell<VecDeque<Task>>,
    deferred: RefCell<VecDeque<Task>>,
    waker: RefCell<Option<Rc<dyn Fn()>>>,
    executed: Cell<u64>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked whenever a task is queued.
    pub fn set_waker(&self, waker: impl Fn() + 'static) {
        *self.waker.borrow_mut() = Some(Rc::new(waker));
    }

    pub fn clear_waker(&self) {
        self.waker.borrow_mut().take();
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.borrow().len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_microtasks() > 0 || self.pending_deferred() > 0
    }

    /// Tasks run since the scheduler was created.
    pub fn executed(&self) -> u64 {
        self.executed.get()
    }

    /// Runs microtasks until the queue is empty, including ones queued by the
    /// tasks themselves. Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.microtasks.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            self.run(task);
            ran += 1;
        }
        ran
    }

    /// Drains microtasks, then runs one deferred callback. Returns `false`
    /// when there was no deferred callback to run.
    pub fn run_next_deferred(&self) -> bool {
        self.run_microtasks();
        let task = self.deferred.borrow_mut().pop_front();
        match task {
            Some(task) => {
                self.run(task);
                self.run_microtasks();
                true
            }
            None => false,
        }
    }

    /// Runs everything queued, and everything those tasks queue, until both
    /// queues are empty. Returns how many tasks ran.
    pub fn run_until_idle(&self) -> usize {
        let before = self.executed.get();
        while self.run_next_deferred() {}
        let ran = self.executed.get() - before;
        trace!("scheduler idle after {ran} tasks");
        ran as usize
    }

    fn run(&self, task: Task) {
        self.executed.set(self.executed.get() + 1);
        task();
    }

    fn wake(&self) {
        let waker = self.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl TaskScheduler for StdScheduler {
    fn schedule_microtask(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
        self.wake();
    }

    fn schedule_deferred_callback(&self, task: Task) {
        self.deferred.borrow_mut().push_back(task);
        self.wake();
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("microtasks", &self.pending_microtasks())
            .field("deferred", &self.pending_deferred())
            .field("executed", &self.executed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use fiber_core::{
        create_root_container, update_root_container, Component, Element, HookContext,
        MemoryHost, Node, Props, TaskScheduler,
    };

    use super::StdScheduler;

    #[test]
    fn microtasks_run_before_deferred_callbacks() {
        let scheduler = StdScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&order);
        scheduler.schedule_deferred_callback(Box::new(move || log.borrow_mut().push("deferred")));
        let log = Rc::clone(&order);
        scheduler.schedule_microtask(Box::new(move || log.borrow_mut().push("micro")));

        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(*order.borrow(), vec!["micro", "deferred"]);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn waker_fires_for_every_queued_task() {
        let scheduler = StdScheduler::new();
        let wakes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&wakes);
        scheduler.set_waker(move || counter.set(counter.get() + 1));
        scheduler.schedule_microtask(Box::new(|| {}));
        scheduler.schedule_deferred_callback(Box::new(|| {}));
        assert_eq!(wakes.get(), 2);

        scheduler.clear_waker();
        scheduler.schedule_microtask(Box::new(|| {}));
        assert_eq!(wakes.get(), 2);
    }

    #[test]
    fn drives_passive_effects_of_a_root() {
        let scheduler = Rc::new(StdScheduler::new());
        let tasks: Rc<dyn TaskScheduler> = scheduler.clone();
        let host = MemoryHost::new();
        let container = host.root();
        let root = create_root_container(host, container, tasks);

        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let component = Component::new("Effectful", move |cx: &mut HookContext<'_>, _: &Props| {
            let flag = Rc::clone(&flag);
            cx.use_effect_with_deps((), move || flag.set(true));
            Node::Empty
        });
        update_root_container(Element::component(&component), &root).unwrap();

        assert!(!ran.get());
        assert_eq!(scheduler.pending_deferred(), 1);
        scheduler.run_until_idle();
        assert!(ran.get());
    }
}
