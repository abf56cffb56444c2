//! Work nodes ("fibers") and the arena holding both tree buffers.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use crate::element::{Element, ElementType, Key, Node, NodeRef, Props};
use crate::flags::Flags;
use crate::hooks::{FunctionUpdateQueue, Hook};
use crate::host_config::HostConfig;
use crate::update_queue::UpdateQueue;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId {
    index: u32,
    generation: u32,
}

impl FiberId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkTag {
    HostRoot,
    HostComponent,
    HostText,
    FunctionComponent,
    /// A component fiber that has not rendered yet.
    IndeterminateComponent,
}

impl WorkTag {
    pub fn is_host(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::HostText)
    }

    pub fn is_host_parent(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::HostRoot)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FiberProps {
    #[default]
    None,
    Element(Rc<Props>),
    Text(Rc<str>),
}

impl FiberProps {
    pub fn element(&self) -> Option<&Rc<Props>> {
        match self {
            FiberProps::Element(props) => Some(props),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&Rc<str>> {
        match self {
            FiberProps::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RootState {
    pub element: Node,
}

#[derive(Clone, Default)]
pub(crate) enum MemoizedState {
    #[default]
    None,
    Root(RootState),
    Hooks(Vec<Rc<Hook>>),
}

impl MemoizedState {
    pub(crate) fn hooks(&self) -> Option<&[Rc<Hook>]> {
        match self {
            MemoizedState::Hooks(hooks) => Some(hooks),
            _ => None,
        }
    }
}

pub(crate) enum FiberUpdateQueue<P> {
    None,
    Root(Rc<UpdateQueue<RootState>>),
    Host(Option<P>),
    Function(Rc<FunctionUpdateQueue>),
}

impl<P: Clone> Clone for FiberUpdateQueue<P> {
    fn clone(&self) -> Self {
        match self {
            FiberUpdateQueue::None => FiberUpdateQueue::None,
            FiberUpdateQueue::Root(queue) => FiberUpdateQueue::Root(Rc::clone(queue)),
            FiberUpdateQueue::Host(payload) => FiberUpdateQueue::Host(payload.clone()),
            FiberUpdateQueue::Function(queue) => FiberUpdateQueue::Function(Rc::clone(queue)),
        }
    }
}

pub struct Fiber<H: HostConfig> {
    pub(crate) tag: WorkTag,
    pub(crate) key: Option<Key>,
    pub(crate) element_type: Option<ElementType>,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) state_node: Option<H::Instance>,

    pub(crate) return_fiber: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) index: usize,

    pub(crate) pending_props: FiberProps,
    pub(crate) memoized_props: FiberProps,
    pub(crate) memoized_state: MemoizedState,
    pub(crate) update_queue: FiberUpdateQueue<H::UpdatePayload>,

    pub(crate) flags: Flags,
    pub(crate) subtree_flags: Flags,
    pub(crate) deletions: Vec<FiberId>,

    pub(crate) alternate: Option<FiberId>,
    pub(crate) did_receive_update: bool,
}

impl<H: HostConfig> Fiber<H> {
    pub(crate) fn new(tag: WorkTag, pending_props: FiberProps, key: Option<Key>) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            node_ref: None,
            state_node: None,
            return_fiber: None,
            child: None,
            sibling: None,
            index: 0,
            pending_props,
            memoized_props: FiberProps::None,
            memoized_state: MemoizedState::None,
            update_queue: FiberUpdateQueue::None,
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            deletions: Vec::new(),
            alternate: None,
            did_receive_update: false,
        }
    }

    pub fn tag(&self) -> WorkTag {
        self.tag
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn element_type(&self) -> Option<&ElementType> {
        self.element_type.as_ref()
    }

    pub fn state_node(&self) -> Option<&H::Instance> {
        self.state_node.as_ref()
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.return_fiber
    }

    pub fn first_child(&self) -> Option<FiberId> {
        self.child
    }

    pub fn next_sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn subtree_flags(&self) -> Flags {
        self.subtree_flags
    }

    pub fn deletions(&self) -> &[FiberId] {
        &self.deletions
    }

    pub fn memoized_props(&self) -> &FiberProps {
        &self.memoized_props
    }

    pub fn hook_count(&self) -> usize {
        self.memoized_state.hooks().map_or(0, <[_]>::len)
    }

    /// Whether the last render of this fiber processed a state change.
    pub fn did_receive_update(&self) -> bool {
        self.did_receive_update
    }

    pub(crate) fn host_type(&self) -> Option<&str> {
        self.element_type.as_ref().and_then(ElementType::host_name)
    }

    pub(crate) fn pending_element_props(&self) -> Rc<Props> {
        self.pending_props.element().cloned().unwrap_or_default()
    }

    pub(crate) fn memoized_element_props(&self) -> Rc<Props> {
        self.memoized_props.element().cloned().unwrap_or_default()
    }
}

impl<H: HostConfig> fmt::Debug for Fiber<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("type", &self.element_type)
            .field("index", &self.index)
            .field("flags", &self.flags)
            .field("subtree_flags", &self.subtree_flags)
            .field("alternate", &self.alternate)
            .finish()
    }
}

struct Slot<H: HostConfig> {
    generation: u32,
    fiber: Option<Fiber<H>>,
}

/// Storage for every live fiber of one root, both buffers included.
pub struct FiberArena<H: HostConfig> {
    slots: Vec<Slot<H>>,
    free: Vec<u32>,
    live: usize,
}

impl<H: HostConfig> Default for FiberArena<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostConfig> FiberArena<H> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn alloc(&mut self, fiber: Fiber<H>) -> FiberId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.fiber = Some(fiber);
            return FiberId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            fiber: Some(fiber),
        });
        FiberId {
            index,
            generation: 0,
        }
    }

    /// Frees the slot. The handle and any copies of it stop resolving.
    pub(crate) fn release(&mut self, id: FiberId) -> Option<Fiber<H>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let fiber = slot.fiber.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(fiber)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<H>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<H>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_mut())
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live fibers across both buffers.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Children of `id` in sibling order.
    pub fn children(&self, id: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.get(id).and_then(|fiber| fiber.child);
        while let Some(child) = next {
            out.push(child);
            next = self.get(child).and_then(|fiber| fiber.sibling);
        }
        out
    }
}

impl<H: HostConfig> Index<FiberId> for FiberArena<H> {
    type Output = Fiber<H>;

    fn index(&self, id: FiberId) -> &Self::Output {
        match self.get(id) {
            Some(fiber) => fiber,
            None => panic!("stale fiber handle {id:?}"),
        }
    }
}

impl<H: HostConfig> IndexMut<FiberId> for FiberArena<H> {
    fn index_mut(&mut self, id: FiberId) -> &mut Self::Output {
        match self.get_mut(id) {
            Some(fiber) => fiber,
            None => panic!("stale fiber handle {id:?}"),
        }
    }
}

pub(crate) fn create_host_root_fiber<H: HostConfig>(
    arena: &mut FiberArena<H>,
    container: H::Instance,
    queue: Rc<UpdateQueue<RootState>>,
) -> FiberId {
    let mut fiber = Fiber::new(WorkTag::HostRoot, FiberProps::None, None);
    fiber.state_node = Some(container);
    fiber.memoized_state = MemoizedState::Root(RootState::default());
    fiber.update_queue = FiberUpdateQueue::Root(queue);
    arena.alloc(fiber)
}

/// Returns the work-in-progress twin of `current`, reusing the alternate slot
/// when one exists so that a position never has more than two fibers.
pub(crate) fn create_work_in_progress<H: HostConfig>(
    arena: &mut FiberArena<H>,
    current: FiberId,
    pending_props: FiberProps,
) -> FiberId {
    let wip = match arena[current].alternate {
        Some(wip) => {
            let current_type = arena[current].element_type.clone();
            let fiber = &mut arena[wip];
            fiber.pending_props = pending_props;
            fiber.element_type = current_type;
            fiber.flags = Flags::empty();
            fiber.subtree_flags = Flags::empty();
            fiber.deletions.clear();
            wip
        }
        None => {
            let source = &arena[current];
            let mut fiber = Fiber::new(source.tag, pending_props, source.key.clone());
            fiber.element_type = source.element_type.clone();
            fiber.state_node = source.state_node.clone();
            fiber.alternate = Some(current);
            let wip = arena.alloc(fiber);
            arena[current].alternate = Some(wip);
            wip
        }
    };

    let source = &arena[current];
    let child = source.child;
    let sibling = source.sibling;
    let index = source.index;
    let tag = source.tag;
    let node_ref = source.node_ref.clone();
    let state_node = source.state_node.clone();
    let memoized_props = source.memoized_props.clone();
    let memoized_state = source.memoized_state.clone();
    let update_queue = match &source.update_queue {
        FiberUpdateQueue::Host(_) => FiberUpdateQueue::Host(None),
        other => other.clone(),
    };

    let fiber = &mut arena[wip];
    fiber.tag = tag;
    fiber.child = child;
    fiber.sibling = sibling;
    fiber.index = index;
    fiber.node_ref = node_ref;
    fiber.state_node = state_node;
    fiber.memoized_props = memoized_props;
    fiber.memoized_state = memoized_state;
    fiber.update_queue = update_queue;
    fiber.did_receive_update = false;
    wip
}

pub(crate) fn create_fiber_from_element<H: HostConfig>(
    arena: &mut FiberArena<H>,
    element: &Element,
) -> FiberId {
    let tag = match element.ty {
        ElementType::Host(_) => WorkTag::HostComponent,
        ElementType::Component(_) => WorkTag::IndeterminateComponent,
    };
    let mut fiber = Fiber::new(
        tag,
        FiberProps::Element(Rc::clone(&element.props)),
        element.key.clone(),
    );
    fiber.element_type = Some(element.ty.clone());
    fiber.node_ref = element.node_ref.clone();
    arena.alloc(fiber)
}

pub(crate) fn create_fiber_from_text<H: HostConfig>(
    arena: &mut FiberArena<H>,
    text: &str,
) -> FiberId {
    let fiber = Fiber::new(WorkTag::HostText, FiberProps::Text(Rc::from(text)), None);
    arena.alloc(fiber)
}

/// Walks `return` links to the top of the tree. `None` when the fiber is
/// detached or the topmost fiber is not a root.
pub(crate) fn mark_update_from_fiber_to_root<H: HostConfig>(
    arena: &FiberArena<H>,
    source: FiberId,
) -> Option<FiberId> {
    let mut node = source;
    let mut parent = arena.get(node)?.return_fiber;
    while let Some(next) = parent {
        node = next;
        parent = arena.get(node)?.return_fiber;
    }
    match arena.get(node)?.tag {
        WorkTag::HostRoot => Some(node),
        _ => None,
    }
}
