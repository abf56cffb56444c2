use std::cell::RefCell;
use std::rc::Rc;

use fiber_core::{
    create_root_container_with_options, update_root_container, FiberRoot, HostNodeId, HostOp,
    MemoryHost, Node, ReconcileError, RootOptions, TaskScheduler,
};
use fiber_runtime_std::StdScheduler;

/// Headless harness for exercising a root in tests.
///
/// Owns a root mounted on a [`MemoryHost`] and the [`StdScheduler`] its
/// deferred work is queued on. Nothing scheduled runs until [`TestRoot::flush`]
/// or [`TestRoot::render_and_flush`] drains the queues.
pub struct TestRoot {
    root: FiberRoot<MemoryHost>,
    scheduler: Rc<StdScheduler>,
}

impl TestRoot {
    pub fn new() -> Self {
        Self::with_options(RootOptions::default())
    }

    pub fn with_options(options: RootOptions) -> Self {
        let scheduler = Rc::new(StdScheduler::new());
        let tasks: Rc<dyn TaskScheduler> = scheduler.clone();
        let host = MemoryHost::new();
        let container = host.root();
        let root = create_root_container_with_options(host, container, tasks, options);
        Self { root, scheduler }
    }

    /// Renders and commits `node` synchronously. Passive effects stay queued.
    pub fn render(&self, node: impl Into<Node>) -> Result<(), ReconcileError> {
        update_root_container(node, &self.root)
    }

    /// Renders `node`, then drains every queued task.
    pub fn render_and_flush(&self, node: impl Into<Node>) -> Result<(), ReconcileError> {
        self.render(node)?;
        self.flush()
    }

    /// Runs queued microtasks and deferred callbacks until the scheduler is
    /// idle. Fails with the first error scheduled work raised.
    pub fn flush(&self) -> Result<(), ReconcileError> {
        self.scheduler.run_until_idle();
        match self.root.take_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn root(&self) -> &FiberRoot<MemoryHost> {
        &self.root
    }

    pub fn scheduler(&self) -> &StdScheduler {
        &self.scheduler
    }

    pub fn render_passes(&self) -> u64 {
        self.root.render_passes()
    }

    pub fn ops(&self) -> Vec<HostOp> {
        self.root.with_host(|host| host.ops().to_vec())
    }

    pub fn take_ops(&self) -> Vec<HostOp> {
        self.root.with_host_mut(MemoryHost::take_ops)
    }

    /// Host nodes directly under the container.
    pub fn top_level(&self) -> Vec<HostNodeId> {
        self.root
            .with_host(|host| host.children(host.root()).to_vec())
    }

    pub fn children_of(&self, id: HostNodeId) -> Vec<HostNodeId> {
        self.root.with_host(|host| host.children(id).to_vec())
    }

    pub fn text_of(&self, id: HostNodeId) -> String {
        self.root.with_host(|host| host.text_content(id))
    }

    /// Concatenated text of the whole host tree.
    pub fn text(&self) -> String {
        self.root.with_host(|host| host.text_content(host.root()))
    }

    pub fn dump(&self) -> String {
        self.root
            .with_host(|host| host.dump_tree(Some(host.root())))
    }

    pub fn fiber_count(&self) -> usize {
        self.root.fibers().len()
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRoot`.
pub fn run_test_root<R>(f: impl FnOnce(&TestRoot) -> R) -> R {
    let root = TestRoot::new();
    f(&root)
}

/// Ordered record of calls made from components and effects.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Returns and clears everything recorded so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

/// Shared slot a component writes a handle into so the test can use it after
/// the render returns.
pub struct Capture<T> {
    slot: Rc<RefCell<Option<T>>>,
}

impl<T> Clone for Capture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> Default for Capture<T> {
    fn default() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }
}

impl<T: Clone> Capture<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: T) {
        self.slot.borrow_mut().replace(value);
    }

    pub fn get(&self) -> Option<T> {
        self.slot.borrow().clone()
    }
}
