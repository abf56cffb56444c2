use std::cell::RefCell;
use std::rc::Rc;

use crate::platform::{TaskScheduler, TestScheduler};
use crate::{
    create_root_container_with_options, update_root_container, FiberRoot, HostOp, MemoryHost,
    Node, ReconcileError, RootOptions,
};

pub(crate) struct Harness {
    pub(crate) root: FiberRoot<MemoryHost>,
    pub(crate) scheduler: Rc<TestScheduler>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_options(RootOptions::default())
    }

    pub(crate) fn with_options(options: RootOptions) -> Self {
        let scheduler = Rc::new(TestScheduler::default());
        let tasks: Rc<dyn TaskScheduler> = scheduler.clone();
        let host = MemoryHost::new();
        let container = host.root();
        let root = create_root_container_with_options(host, container, tasks, options);
        Self { root, scheduler }
    }

    pub(crate) fn render(&self, node: impl Into<Node>) -> Result<(), ReconcileError> {
        update_root_container(node, &self.root)
    }

    /// Runs queued microtasks and deferred callbacks until none are left.
    pub(crate) fn flush(&self) {
        self.scheduler.run_until_idle();
    }

    pub(crate) fn take_ops(&self) -> Vec<HostOp> {
        self.root.with_host_mut(MemoryHost::take_ops)
    }

    pub(crate) fn text(&self) -> String {
        self.root.with_host(|host| host.text_content(host.root()))
    }

    pub(crate) fn top_level_count(&self) -> usize {
        self.root.with_host(|host| host.children(host.root()).len())
    }

    pub(crate) fn dump(&self) -> String {
        self.root.with_host(|host| host.dump_tree(Some(host.root())))
    }
}

/// Shared list of strings components and effects append to.
#[derive(Clone, Default)]
pub(crate) struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Slot a component writes a handle into so the test can reach it later.
pub(crate) struct Captured<T>(Rc<RefCell<Option<T>>>);

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for Captured<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }
}

impl<T: Clone> Captured<T> {
    pub(crate) fn set(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }

    pub(crate) fn get(&self) -> T {
        self.0.borrow().clone().expect("nothing captured yet")
    }
}

pub(crate) fn count_ops(ops: &[HostOp], pred: impl Fn(&HostOp) -> bool) -> usize {
    ops.iter().filter(|op| pred(op)).count()
}
