//! Per-component hook state.
//!
//! A function component's hooks are a list of cells addressed by call order.
//! Cells are `Rc`-shared between the current and the work-in-progress fiber:
//! the first visit in a pass shares the committed cell into the new list and
//! the render updates it in place.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, trace, warn};

use crate::element::{Component, Node, Props};
use crate::fiber::{FiberArena, FiberId, FiberUpdateQueue, MemoizedState};
use crate::flags::{Flags, HookFlags};
use crate::host_config::HostConfig;
use crate::root::RootShared;
use crate::update_queue::SharedQueue;
use crate::ReconcileError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookKind {
    State,
    Reducer,
    Effect,
    Memo,
    Ref,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::State => "use_state",
            HookKind::Reducer => "use_reducer",
            HookKind::Effect => "use_effect",
            HookKind::Memo => "use_memo",
            HookKind::Ref => "use_ref",
        };
        f.write_str(name)
    }
}

trait HookQueue {
    fn detach(&self);
}

pub(crate) struct Hook {
    kind: HookKind,
    state: RefCell<Box<dyn Any>>,
    queue: Option<Rc<dyn HookQueue>>,
}

impl Hook {
    fn new(kind: HookKind, state: impl Any) -> Self {
        Self {
            kind,
            state: RefCell::new(Box::new(state)),
            queue: None,
        }
    }

    fn with_state<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.state.borrow_mut();
        state.downcast_mut::<T>().map(f)
    }

    fn effect(&self) -> Option<Rc<Effect>> {
        match self.kind {
            HookKind::Effect => self.state.borrow().downcast_ref::<Rc<Effect>>().cloned(),
            _ => None,
        }
    }

    /// Drops any later dispatch to this cell's queue.
    pub(crate) fn detach(&self) {
        if let Some(queue) = &self.queue {
            queue.detach();
        }
    }
}

/// Returned by an effect's `create`; runs before the next `create` of the
/// same hook, or when the component unmounts.
#[derive(Default)]
pub struct Cleanup(Option<Box<dyn FnOnce()>>);

impl Cleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    fn run(self) {
        if let Some(cleanup) = self.0 {
            cleanup();
        }
    }
}

impl From<()> for Cleanup {
    fn from(_: ()) -> Self {
        Cleanup::none()
    }
}

/// Survives across renders of one effect hook and carries the pending
/// `destroy` of the last `create` that ran.
#[derive(Default)]
pub(crate) struct EffectInstance {
    destroy: RefCell<Option<Cleanup>>,
}

type EffectCreate = Box<dyn FnOnce() -> Cleanup>;

pub(crate) struct Effect {
    pub(crate) tag: HookFlags,
    create: RefCell<Option<EffectCreate>>,
    inst: Rc<EffectInstance>,
    deps: Option<Box<dyn Any>>,
}

impl Effect {
    pub(crate) fn has_effect(&self) -> bool {
        self.tag.contains(HookFlags::HAS_EFFECT | HookFlags::PASSIVE)
    }

    pub(crate) fn run_destroy(&self) {
        let destroy = self.inst.destroy.borrow_mut().take();
        if let Some(destroy) = destroy {
            destroy.run();
        }
    }

    pub(crate) fn run_create(&self) {
        let create = self.create.borrow_mut().take();
        if let Some(create) = create {
            let destroy = create();
            *self.inst.destroy.borrow_mut() = Some(destroy);
        }
    }
}

/// Effect records pushed by the last render of a function fiber, in order.
#[derive(Default)]
pub(crate) struct FunctionUpdateQueue {
    pub(crate) effects: Vec<Rc<Effect>>,
}

pub(crate) struct HookUpdate<S, A> {
    action: A,
    eager_state: Option<S>,
}

type Reducer<S, A> = Rc<dyn Fn(&S, &A) -> S>;

pub(crate) struct ReducerQueue<S, A> {
    updates: Rc<SharedQueue<HookUpdate<S, A>>>,
    last_rendered_state: RefCell<S>,
    last_rendered_reducer: RefCell<Reducer<S, A>>,
    eager: bool,
    detached: Cell<bool>,
}

impl<S, A> ReducerQueue<S, A> {
    fn new(state: S, reducer: Reducer<S, A>, eager: bool) -> Self {
        Self {
            updates: Rc::new(SharedQueue::new()),
            last_rendered_state: RefCell::new(state),
            last_rendered_reducer: RefCell::new(reducer),
            eager,
            detached: Cell::new(false),
        }
    }
}

impl<S, A> HookQueue for ReducerQueue<S, A> {
    fn detach(&self) {
        self.detached.set(true);
    }
}

struct StateCell<S, A> {
    memoized_state: S,
    base_state: S,
    base_queue: Vec<HookUpdate<S, A>>,
    queue: Rc<ReducerQueue<S, A>>,
}

struct MemoCell {
    value: Box<dyn Any>,
    deps: Box<dyn Any>,
}

/// Action type of [`HookContext::use_state`].
pub enum StateAction<S> {
    Set(S),
    Update(Rc<dyn Fn(&S) -> S>),
}

fn basic_state_reducer<S: Clone>(state: &S, action: &StateAction<S>) -> S {
    match action {
        StateAction::Set(value) => value.clone(),
        StateAction::Update(update) => update(state),
    }
}

/// Sends actions to one reducer hook. Stable across renders of the owning
/// component.
pub struct Dispatch<S, A> {
    queue: Rc<ReducerQueue<S, A>>,
    fiber: FiberId,
    root: Weak<RootShared>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            fiber: self.fiber,
            root: Weak::clone(&self.root),
        }
    }
}

impl<S, A> PartialEq for Dispatch<S, A> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatch({})", self.fiber)
    }
}

impl<S, A> Dispatch<S, A>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    pub fn dispatch(&self, action: A) {
        let Some(shared) = self.root.upgrade() else {
            debug!("dispatch to {} dropped: root is gone", self.fiber);
            return;
        };
        if self.queue.detached.get() {
            debug!("dispatch to {} dropped: component unmounted", self.fiber);
            return;
        }

        if shared.is_render_phase_update(self.fiber) {
            shared.mark_render_phase_update();
            self.queue.updates.push_pending(HookUpdate {
                action,
                eager_state: None,
            });
            return;
        }

        let mut eager_state = None;
        if self.queue.eager && !self.queue.updates.has_updates() {
            let reducer = Rc::clone(&self.queue.last_rendered_reducer.borrow());
            let current = self.queue.last_rendered_state.borrow();
            let next = reducer(&*current, &action);
            if next == *current {
                return;
            }
            eager_state = Some(next);
        }

        let update = HookUpdate {
            action,
            eager_state,
        };
        if shared
            .enqueue_concurrent_hook_update(self.fiber, &self.queue.updates, update)
            .is_none()
        {
            warn!("dispatch to {} dropped: not attached to a root", self.fiber);
            return;
        }
        shared.ensure_root_is_scheduled();
    }
}

/// Setter returned by [`HookContext::use_state`].
pub struct SetState<S>(Dispatch<S, StateAction<S>>);

impl<S> Clone for SetState<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> PartialEq for SetState<S> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<S> fmt::Debug for SetState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetState({})", self.0.fiber)
    }
}

impl<S: Clone + PartialEq + 'static> SetState<S> {
    pub fn set(&self, value: S) {
        self.0.dispatch(StateAction::Set(value));
    }

    pub fn update(&self, update: impl Fn(&S) -> S + 'static) {
        self.0.dispatch(StateAction::Update(Rc::new(update)));
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum HookMode {
    Mount,
    Update,
}

enum Slot {
    Fresh,
    Existing(Rc<Hook>),
}

/// Hook bookkeeping for one render of one function fiber.
struct RenderFrame {
    shared: Rc<RootShared>,
    fiber: FiberId,
    component: &'static str,
    mode: HookMode,
    current: Vec<Rc<Hook>>,
    committed_effects: Vec<Option<Rc<Effect>>>,
    wip: Vec<Rc<Hook>>,
    cursor: usize,
    re_rendering: bool,
    effects: Vec<Rc<Effect>>,
    flags: Flags,
    did_receive_update: bool,
    error: Option<ReconcileError>,
}

impl RenderFrame {
    fn begin_pass(&mut self, re_rendering: bool) {
        self.cursor = 0;
        self.re_rendering = re_rendering;
        self.effects.clear();
        self.flags = Flags::empty();
    }

    fn fail(&mut self, error: ReconcileError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn next_hook(&mut self, kind: HookKind) -> Slot {
        let index = self.cursor;
        self.cursor += 1;

        let hook = match self.wip.get(index) {
            Some(hook) => Rc::clone(hook),
            None if self.mode == HookMode::Mount && !self.re_rendering => return Slot::Fresh,
            None if self.mode == HookMode::Mount => {
                self.fail(ReconcileError::TooManyHooks {
                    component: self.component,
                    expected: self.wip.len(),
                });
                return Slot::Fresh;
            }
            None => match self.current.get(index) {
                Some(hook) => {
                    let hook = Rc::clone(hook);
                    self.wip.push(Rc::clone(&hook));
                    hook
                }
                None => {
                    self.fail(ReconcileError::TooManyHooks {
                        component: self.component,
                        expected: self.current.len(),
                    });
                    return Slot::Fresh;
                }
            },
        };

        if hook.kind != kind {
            self.fail(ReconcileError::HookKindMismatch {
                component: self.component,
                index,
                expected: hook.kind,
                found: kind,
            });
            return Slot::Fresh;
        }
        Slot::Existing(hook)
    }

    fn install(&mut self, hook: Hook) {
        if self.wip.len() + 1 == self.cursor {
            self.wip.push(Rc::new(hook));
        }
    }

    fn type_mismatch(&mut self, kind: HookKind) {
        self.fail(ReconcileError::HookKindMismatch {
            component: self.component,
            index: self.cursor - 1,
            expected: kind,
            found: kind,
        });
    }

    fn dispatch<S, A>(&self, queue: Rc<ReducerQueue<S, A>>) -> Dispatch<S, A> {
        Dispatch {
            queue,
            fiber: self.fiber,
            root: Rc::downgrade(&self.shared),
        }
    }

    fn use_reducer_impl<S, A>(
        &mut self,
        kind: HookKind,
        reducer: Reducer<S, A>,
        init: impl FnOnce() -> S,
        eager: bool,
    ) -> (S, Rc<ReducerQueue<S, A>>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        if let Slot::Existing(hook) = self.next_hook(kind) {
            let resolved = hook.with_state(|cell: &mut StateCell<S, A>| {
                resolve_reducer(cell, &reducer)
            });
            match resolved {
                Some((state, changed, queue)) => {
                    self.did_receive_update |= changed;
                    return (state, queue);
                }
                None => self.type_mismatch(kind),
            }
        }

        let state = init();
        let queue = Rc::new(ReducerQueue::new(state.clone(), reducer, eager));
        let cell = StateCell {
            memoized_state: state.clone(),
            base_state: state.clone(),
            base_queue: Vec::new(),
            queue: Rc::clone(&queue),
        };
        let mut hook = Hook::new(kind, cell);
        let detach: Rc<dyn HookQueue> = queue.clone();
        hook.queue = Some(detach);
        self.install(hook);
        (state, queue)
    }

    fn push_effect<D: PartialEq + 'static>(
        &mut self,
        deps: Option<D>,
        create: EffectCreate,
    ) {
        let index = self.cursor;
        let existing = match self.next_hook(HookKind::Effect) {
            Slot::Existing(hook) => match hook.effect() {
                Some(effect) => Some((hook, effect)),
                None => {
                    self.type_mismatch(HookKind::Effect);
                    None
                }
            },
            Slot::Fresh => None,
        };

        let committed = self.committed_effects.get(index).cloned().flatten();
        let unchanged = match (&deps, &committed) {
            (Some(next), Some(prev)) => deps_equal(prev.deps.as_deref(), next),
            _ => false,
        };

        let inst = existing
            .as_ref()
            .map(|(_, effect)| Rc::clone(&effect.inst))
            .unwrap_or_default();
        let tag = if unchanged {
            HookFlags::PASSIVE
        } else {
            self.flags |= Flags::PASSIVE;
            HookFlags::HAS_EFFECT | HookFlags::PASSIVE
        };
        let effect = Rc::new(Effect {
            tag,
            create: RefCell::new((!unchanged).then_some(create)),
            inst,
            deps: deps.map(|deps| Box::new(deps) as Box<dyn Any>),
        });
        self.effects.push(Rc::clone(&effect));

        match existing {
            Some((hook, _)) => {
                *hook.state.borrow_mut() = Box::new(effect);
            }
            None => self.install(Hook::new(HookKind::Effect, effect)),
        }
    }

    fn use_memo_impl<D, T>(&mut self, deps: D, compute: impl FnOnce() -> T) -> T
    where
        D: PartialEq + 'static,
        T: Clone + 'static,
    {
        if let Slot::Existing(hook) = self.next_hook(HookKind::Memo) {
            let cached = hook.with_state(|cell: &mut MemoCell| {
                if deps_equal(Some(cell.deps.as_ref()), &deps) {
                    cell.value.downcast_ref::<T>().cloned()
                } else {
                    None
                }
            });
            match cached {
                Some(Some(value)) => return value,
                Some(None) => {
                    let value = compute();
                    hook.with_state(|cell: &mut MemoCell| {
                        cell.value = Box::new(value.clone());
                        cell.deps = Box::new(deps);
                    });
                    return value;
                }
                None => self.type_mismatch(HookKind::Memo),
            }
        }

        let value = compute();
        self.install(Hook::new(
            HookKind::Memo,
            MemoCell {
                value: Box::new(value.clone()),
                deps: Box::new(deps),
            },
        ));
        value
    }
}

fn resolve_reducer<S, A>(
    cell: &mut StateCell<S, A>,
    reducer: &Reducer<S, A>,
) -> (S, bool, Rc<ReducerQueue<S, A>>)
where
    S: Clone + PartialEq,
{
    let queue = Rc::clone(&cell.queue);
    *queue.last_rendered_reducer.borrow_mut() = Rc::clone(reducer);

    cell.base_queue.extend(queue.updates.take_pending());
    let mut changed = false;
    if !cell.base_queue.is_empty() {
        let mut state = cell.base_state.clone();
        for update in cell.base_queue.drain(..) {
            state = match update.eager_state {
                Some(eager) => eager,
                None => reducer(&state, &update.action),
            };
        }
        changed = state != cell.memoized_state;
        cell.memoized_state = state.clone();
        cell.base_state = state;
    }

    *queue.last_rendered_state.borrow_mut() = cell.memoized_state.clone();
    (cell.memoized_state.clone(), changed, queue)
}

fn deps_equal<D: PartialEq + 'static>(prev: Option<&dyn Any>, next: &D) -> bool {
    prev.and_then(|prev| prev.downcast_ref::<D>())
        .is_some_and(|prev| prev == next)
}

/// Handed to a function component while it renders.
pub struct HookContext<'a> {
    frame: &'a mut RenderFrame,
}

impl HookContext<'_> {
    /// The fiber being rendered.
    pub fn fiber(&self) -> FiberId {
        self.frame.fiber
    }

    pub fn use_state<S>(&mut self, init: impl FnOnce() -> S) -> (S, SetState<S>)
    where
        S: Clone + PartialEq + 'static,
    {
        let reducer: Reducer<S, StateAction<S>> = Rc::new(basic_state_reducer::<S>);
        let (state, queue) = self
            .frame
            .use_reducer_impl(HookKind::State, reducer, init, true);
        (state, SetState(self.frame.dispatch(queue)))
    }

    pub fn use_reducer<S, A>(
        &mut self,
        reducer: impl Fn(&S, &A) -> S + 'static,
        initial: S,
    ) -> (S, Dispatch<S, A>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let reducer: Reducer<S, A> = Rc::new(reducer);
        let (state, queue) =
            self.frame
                .use_reducer_impl(HookKind::Reducer, reducer, move || initial, false);
        (state, self.frame.dispatch(queue))
    }

    /// Runs `create` after every commit of this component.
    pub fn use_effect<F, C>(&mut self, create: F)
    where
        F: FnOnce() -> C + 'static,
        C: Into<Cleanup>,
    {
        self.frame
            .push_effect::<()>(None, Box::new(move || create().into()));
    }

    /// Runs `create` after commits where `deps` changed since the last run.
    pub fn use_effect_with_deps<D, F, C>(&mut self, deps: D, create: F)
    where
        D: PartialEq + 'static,
        F: FnOnce() -> C + 'static,
        C: Into<Cleanup>,
    {
        self.frame
            .push_effect(Some(deps), Box::new(move || create().into()));
    }

    pub fn use_memo<D, T>(&mut self, deps: D, compute: impl FnOnce() -> T) -> T
    where
        D: PartialEq + 'static,
        T: Clone + 'static,
    {
        self.frame.use_memo_impl(deps, compute)
    }

    pub fn use_callback<D, F>(&mut self, deps: D, callback: F) -> Rc<F>
    where
        D: PartialEq + 'static,
        F: 'static,
    {
        self.frame.use_memo_impl(deps, move || Rc::new(callback))
    }

    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        if let Slot::Existing(hook) = self.frame.next_hook(HookKind::Ref) {
            match hook.with_state(|cell: &mut Rc<RefCell<T>>| Rc::clone(cell)) {
                Some(cell) => return cell,
                None => self.frame.type_mismatch(HookKind::Ref),
            }
        }
        let cell = Rc::new(RefCell::new(init()));
        self.frame
            .install(Hook::new(HookKind::Ref, Rc::clone(&cell)));
        cell
    }
}

/// Renders the function component at `wip`, re-running it while it schedules
/// updates on itself, and stores the resulting hook list and effects on the
/// fiber.
pub(crate) fn render_with_hooks<H: HostConfig>(
    arena: &mut FiberArena<H>,
    shared: &Rc<RootShared>,
    wip: FiberId,
    component: &Component,
    props: &Props,
    re_render_limit: usize,
) -> Result<Node, ReconcileError> {
    let current = arena[wip].alternate;
    let current_hooks: Vec<Rc<Hook>> = current
        .and_then(|current| arena.get(current))
        .and_then(|fiber| fiber.memoized_state.hooks())
        .map(<[_]>::to_vec)
        .unwrap_or_default();
    let mode = if current_hooks.is_empty() {
        HookMode::Mount
    } else {
        HookMode::Update
    };
    let committed_effects = current_hooks.iter().map(|hook| hook.effect()).collect();

    let mut frame = RenderFrame {
        shared: Rc::clone(shared),
        fiber: wip,
        component: component.name(),
        mode,
        current: current_hooks,
        committed_effects,
        wip: Vec::new(),
        cursor: 0,
        re_rendering: false,
        effects: Vec::new(),
        flags: Flags::empty(),
        did_receive_update: false,
        error: None,
    };

    shared.set_currently_rendering(Some((wip, current)));
    let mut re_renders = 0;
    let result = loop {
        frame.begin_pass(re_renders > 0);
        let children = component.render(&mut HookContext { frame: &mut frame }, props);
        if let Some(error) = frame.error.take() {
            break Err(error);
        }
        if !shared.take_render_phase_update() {
            break Ok(children);
        }
        re_renders += 1;
        if re_renders > re_render_limit {
            break Err(ReconcileError::TooManyReRenders {
                component: frame.component,
                limit: re_render_limit,
            });
        }
        trace!("re-rendering {} ({re_renders})", frame.component);
    };
    shared.set_currently_rendering(None);
    shared.take_render_phase_update();
    let children = result?;

    // A mount that re-ran is held to the hooks of its own first run.
    let expected = frame.current.len().max(frame.wip.len());
    if frame.cursor < expected {
        return Err(ReconcileError::TooFewHooks {
            component: frame.component,
            expected,
            rendered: frame.cursor,
        });
    }

    let fiber = &mut arena[wip];
    fiber.memoized_state = MemoizedState::Hooks(frame.wip);
    fiber.update_queue = FiberUpdateQueue::Function(Rc::new(FunctionUpdateQueue {
        effects: frame.effects,
    }));
    fiber.flags |= frame.flags;
    fiber.did_receive_update = frame.did_receive_update;
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_reducer_applies_set_and_update() {
        let set = StateAction::Set(4);
        assert_eq!(basic_state_reducer(&1, &set), 4);
        let update = StateAction::Update(Rc::new(|n: &i32| n * 10));
        assert_eq!(basic_state_reducer(&3, &update), 30);
    }

    #[test]
    fn deps_compare_by_value_and_type() {
        let prev: Box<dyn Any> = Box::new((1, "a"));
        assert!(deps_equal(Some(prev.as_ref()), &(1, "a")));
        assert!(!deps_equal(Some(prev.as_ref()), &(2, "a")));
        assert!(!deps_equal(Some(prev.as_ref()), &1u8));
        assert!(!deps_equal::<u8>(None, &1));
    }

    #[test]
    fn effect_create_result_becomes_destroy() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = Rc::clone(&log);
        let create: EffectCreate = Box::new(move || {
            inner.borrow_mut().push("create");
            let inner = Rc::clone(&inner);
            Cleanup::new(move || inner.borrow_mut().push("destroy"))
        });
        let effect = Effect {
            tag: HookFlags::HAS_EFFECT | HookFlags::PASSIVE,
            create: RefCell::new(Some(create)),
            inst: Rc::default(),
            deps: None,
        };
        assert!(effect.has_effect());
        effect.run_destroy();
        effect.run_create();
        effect.run_create();
        effect.run_destroy();
        effect.run_destroy();
        assert_eq!(*log.borrow(), vec!["create", "destroy"]);
    }
}
