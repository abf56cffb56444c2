//! Root container, scheduling, and the public entry points.

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use log::{debug, error, info};

use crate::commit_work::{collect_passive_effects, CommitSession, CommitStats};
use crate::element::Node;
use crate::fiber::{
    create_host_root_fiber, mark_update_from_fiber_to_root, FiberArena, FiberId, RootState,
};
use crate::flags::ExecutionContext;
use crate::host_config::HostConfig;
use crate::platform::TaskScheduler;
use crate::update_queue::{ConcurrentQueues, SharedQueue, UpdateQueue};
use crate::work_loop::RenderSession;
use crate::ReconcileError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootOptions {
    /// Render-phase re-runs allowed per component render.
    pub re_render_limit: usize,
    /// Log a summary of every commit at `info` instead of `debug`.
    pub log_commits: bool,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            re_render_limit: 25,
            log_commits: false,
        }
    }
}

/// Work a root exposes to its scheduled tasks.
pub(crate) trait RootWork {
    fn perform_sync_work(&self) -> Result<(), ReconcileError>;
    fn flush_passive_effects(&self) -> Result<bool, ReconcileError>;
    fn record_fatal(&self, error: ReconcileError);
    fn is_poisoned(&self) -> bool;
    fn owning_root(&self, fiber: FiberId) -> Option<FiberId>;
}

/// Root state hooks and dispatchers reach without knowing the host type.
pub(crate) struct RootShared {
    execution_context: Cell<ExecutionContext>,
    pub(crate) concurrent_queues: ConcurrentQueues,
    currently_rendering: Cell<Option<(FiberId, Option<FiberId>)>>,
    did_schedule_render_phase_update: Cell<bool>,
    sync_work_pending: Cell<bool>,
    microtask_scheduled: Cell<bool>,
    is_flushing_sync: Cell<bool>,
    render_passes: Cell<u64>,
    scheduler: Rc<dyn TaskScheduler>,
    work: Weak<dyn RootWork>,
}

impl RootShared {
    fn new(scheduler: Rc<dyn TaskScheduler>, work: Weak<dyn RootWork>) -> Self {
        Self {
            execution_context: Cell::new(ExecutionContext::empty()),
            concurrent_queues: ConcurrentQueues::default(),
            currently_rendering: Cell::new(None),
            did_schedule_render_phase_update: Cell::new(false),
            sync_work_pending: Cell::new(false),
            microtask_scheduled: Cell::new(false),
            is_flushing_sync: Cell::new(false),
            render_passes: Cell::new(0),
            scheduler,
            work,
        }
    }

    pub(crate) fn context(&self) -> ExecutionContext {
        self.execution_context.get()
    }

    fn with_context<R>(&self, context: ExecutionContext, f: impl FnOnce() -> R) -> R {
        let previous = self.execution_context.get();
        self.execution_context.set(previous | context);
        let result = f();
        self.execution_context.set(previous);
        result
    }

    pub(crate) fn set_currently_rendering(&self, fiber: Option<(FiberId, Option<FiberId>)>) {
        self.currently_rendering.set(fiber);
    }

    /// True when `fiber` is, or is the alternate of, the component rendering
    /// right now.
    pub(crate) fn is_render_phase_update(&self, fiber: FiberId) -> bool {
        match self.currently_rendering.get() {
            Some((rendering, alternate)) => fiber == rendering || alternate == Some(fiber),
            None => false,
        }
    }

    /// Queues `update` for `fiber` and returns the root fiber it belongs to.
    /// Nothing is queued for a fiber cut off from every root.
    pub(crate) fn enqueue_concurrent_hook_update<U: 'static>(
        &self,
        fiber: FiberId,
        queue: &Rc<SharedQueue<U>>,
        update: U,
    ) -> Option<FiberId> {
        let root = self.work.upgrade()?.owning_root(fiber)?;
        self.concurrent_queues.enqueue(queue, update);
        Some(root)
    }

    pub(crate) fn mark_render_phase_update(&self) {
        self.did_schedule_render_phase_update.set(true);
    }

    pub(crate) fn take_render_phase_update(&self) -> bool {
        self.did_schedule_render_phase_update.replace(false)
    }

    /// Idle roots flush right away; otherwise a microtask picks the work up
    /// once the current pass, effect flush or batch is over.
    pub(crate) fn ensure_root_is_scheduled(self: &Rc<Self>) {
        self.sync_work_pending.set(true);
        let context = self.context();
        if context.is_empty() {
            self.flush_sync_work();
            return;
        }
        if context.is_working() && !self.microtask_scheduled.replace(true) {
            let shared = Rc::downgrade(self);
            self.scheduler.schedule_microtask(Box::new(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.microtask_scheduled.set(false);
                    shared.flush_sync_work();
                }
            }));
        }
    }

    fn flush_sync_work(self: &Rc<Self>) {
        if self.is_flushing_sync.get() {
            return;
        }
        if self.context().is_working() {
            self.ensure_root_is_scheduled();
            return;
        }
        let Some(work) = self.work.upgrade() else {
            return;
        };
        if work.is_poisoned() {
            if self.sync_work_pending.replace(false) {
                debug!("dropping scheduled work on a poisoned root");
            }
            return;
        }

        self.is_flushing_sync.set(true);
        while self.sync_work_pending.replace(false) {
            if let Err(error) = work.perform_sync_work() {
                work.record_fatal(error);
                break;
            }
        }
        self.is_flushing_sync.set(false);
    }

    fn schedule_passive_flush(&self) {
        let work = Weak::clone(&self.work);
        self.scheduler.schedule_deferred_callback(Box::new(move || {
            let Some(work) = work.upgrade() else {
                return;
            };
            if let Err(error) = work.flush_passive_effects() {
                work.record_fatal(error);
            }
        }));
    }
}

pub(crate) struct RootInner<H: HostConfig> {
    shared: Rc<RootShared>,
    host: RefCell<H>,
    arena: RefCell<FiberArena<H>>,
    current: Cell<FiberId>,
    queue: Rc<UpdateQueue<RootState>>,
    pending_passive: Cell<Option<FiberId>>,
    last_commit: Cell<CommitStats>,
    error: RefCell<Option<ReconcileError>>,
    poisoned: Cell<bool>,
    options: RootOptions,
}

impl<H: HostConfig> RootInner<H> {
    fn render_root_sync(&self) -> Result<FiberId, ReconcileError> {
        let shared = &self.shared;
        shared.sync_work_pending.set(false);
        let pass = shared.render_passes.get() + 1;
        shared.render_passes.set(pass);

        let mut arena = self.arena.borrow_mut();
        let mut host = self.host.borrow_mut();
        shared.with_context(ExecutionContext::RENDER, || {
            let mut session = RenderSession::new(&mut arena, &mut host, shared, &self.options);
            let finished = session.prepare_fresh_stack(self.current.get());
            let units = session.work_loop_sync()?;
            debug!("render pass {pass} finished after {units} units of work");
            Ok(finished)
        })
    }

    fn commit_root(&self, finished: FiberId) -> Result<(), ReconcileError> {
        let shared = &self.shared;
        let (stats, has_passive) = {
            let mut arena = self.arena.borrow_mut();
            let mut host = self.host.borrow_mut();
            shared.with_context(ExecutionContext::COMMIT, || {
                CommitSession::new(&mut arena, &mut host).commit_root(finished)
            })?
        };
        self.current.set(finished);
        self.last_commit.set(stats);

        let pass = shared.render_passes.get();
        if self.options.log_commits {
            info!("commit {pass}: {stats:?}");
        } else {
            debug!("commit {pass}: {stats:?}");
        }

        if has_passive {
            self.pending_passive.set(Some(finished));
            shared.schedule_passive_flush();
        }
        Ok(())
    }
}

impl<H: HostConfig> RootWork for RootInner<H> {
    fn perform_sync_work(&self) -> Result<(), ReconcileError> {
        if self.poisoned.get() {
            return Err(ReconcileError::RootPoisoned);
        }
        let result = self
            .flush_passive_effects()
            .and_then(|_| self.render_root_sync())
            .and_then(|finished| self.commit_root(finished));
        if result.is_err() {
            self.poisoned.set(true);
        }
        result
    }

    fn flush_passive_effects(&self) -> Result<bool, ReconcileError> {
        if self.shared.context().is_working() {
            self.poisoned.set(true);
            return Err(ReconcileError::ReentrantPassiveFlush);
        }
        let Some(finished) = self.pending_passive.take() else {
            return Ok(false);
        };
        let effects = collect_passive_effects(&mut self.arena.borrow_mut(), finished);
        let (unmount, mount) = effects.counts();
        debug!(
            "passive flush: {unmount} destroys, {mount} creates, {} fibers released",
            effects.released()
        );
        self.shared
            .with_context(ExecutionContext::COMMIT, || effects.run());
        Ok(true)
    }

    fn record_fatal(&self, error: ReconcileError) {
        error!("root failed: {error}");
        self.poisoned.set(true);
        self.error.borrow_mut().get_or_insert(error);
    }

    fn is_poisoned(&self) -> bool {
        self.poisoned.get()
    }

    fn owning_root(&self, fiber: FiberId) -> Option<FiberId> {
        match self.arena.try_borrow() {
            Ok(arena) => mark_update_from_fiber_to_root(&arena, fiber),
            // Mid-pass: deletions are only applied at commit.
            Err(_) => Some(self.current.get()),
        }
    }
}

/// Handle to one mounted tree.
pub struct FiberRoot<H: HostConfig> {
    inner: Rc<RootInner<H>>,
}

impl<H: HostConfig> Clone for FiberRoot<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: HostConfig> FiberRoot<H> {
    /// Render passes started since the root was created.
    pub fn render_passes(&self) -> u64 {
        self.inner.shared.render_passes.get()
    }

    pub fn last_commit(&self) -> CommitStats {
        self.inner.last_commit.get()
    }

    /// The first fatal error raised by scheduled work, if any.
    pub fn take_error(&self) -> Option<ReconcileError> {
        self.inner.error.borrow_mut().take()
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.get()
    }

    pub fn options(&self) -> &RootOptions {
        &self.inner.options
    }

    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.inner.host.borrow())
    }

    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.host.borrow_mut())
    }

    /// Read access to every fiber of both buffers.
    pub fn fibers(&self) -> Ref<'_, FiberArena<H>> {
        self.inner.arena.borrow()
    }

    /// The committed `HostRoot` fiber.
    pub fn current(&self) -> FiberId {
        self.inner.current.get()
    }

    /// Whether `fiber` belongs to the committed tree.
    pub fn is_mounted(&self, fiber: FiberId) -> bool {
        let arena = self.inner.arena.borrow();
        let Some(root) = mark_update_from_fiber_to_root(&arena, fiber) else {
            return false;
        };
        if root != self.current() {
            return false;
        }
        let mut node = fiber;
        while let Some(parent) = arena.get(node).and_then(|fiber| fiber.parent()) {
            if !arena.children(parent).contains(&node) {
                return false;
            }
            node = parent;
        }
        true
    }

    pub fn has_pending_passive_effects(&self) -> bool {
        self.inner.pending_passive.get().is_some()
    }

    /// Runs pending passive effects now. Fails while rendering or committing.
    pub fn flush_passive_effects(&self) -> Result<bool, ReconcileError> {
        self.inner.flush_passive_effects()
    }

    /// Defers the flush of updates raised inside `f` until it returns.
    pub fn batched_updates<R>(&self, f: impl FnOnce() -> R) -> R {
        let shared = &self.inner.shared;
        let result = shared.with_context(ExecutionContext::BATCHED, f);
        if shared.context().is_empty() && shared.sync_work_pending.get() {
            shared.flush_sync_work();
        }
        result
    }
}

pub fn create_root_container<H: HostConfig>(
    host: H,
    container: H::Instance,
    scheduler: Rc<dyn TaskScheduler>,
) -> FiberRoot<H> {
    create_root_container_with_options(host, container, scheduler, RootOptions::default())
}

pub fn create_root_container_with_options<H: HostConfig>(
    host: H,
    container: H::Instance,
    scheduler: Rc<dyn TaskScheduler>,
    options: RootOptions,
) -> FiberRoot<H> {
    let inner = Rc::new_cyclic(|weak: &Weak<RootInner<H>>| {
        let work: Weak<dyn RootWork> = weak.clone();
        let shared = Rc::new(RootShared::new(scheduler, work));
        let queue = Rc::new(UpdateQueue::new());
        let mut arena = FiberArena::new();
        let current = create_host_root_fiber(&mut arena, container, Rc::clone(&queue));
        RootInner {
            shared,
            host: RefCell::new(host),
            arena: RefCell::new(arena),
            current: Cell::new(current),
            queue,
            pending_passive: Cell::new(None),
            last_commit: Cell::new(CommitStats::default()),
            error: RefCell::new(None),
            poisoned: Cell::new(false),
            options,
        }
    });
    FiberRoot { inner }
}

/// Schedules `node` as the root's new content. Renders and commits before
/// returning unless called from inside a pass, an effect flush or a batch.
pub fn update_root_container<H: HostConfig>(
    node: impl Into<Node>,
    root: &FiberRoot<H>,
) -> Result<(), ReconcileError> {
    let inner = &root.inner;
    if inner.poisoned.get() {
        return Err(ReconcileError::RootPoisoned);
    }
    let shared = &inner.shared;
    inner.queue.enqueue(
        &shared.concurrent_queues,
        RootState {
            element: node.into(),
        },
    );
    if shared.context().is_empty() && !shared.is_flushing_sync.get() {
        return inner.perform_sync_work();
    }
    shared.ensure_root_is_scheduled();
    Ok(())
}
