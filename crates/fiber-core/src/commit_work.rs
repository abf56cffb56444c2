//! Applies a finished tree to the host.
//!
//! The mutation pass runs synchronously right after render. Passive effects
//! are collected from the committed tree later, when the deferred flush runs.

use std::mem;
use std::rc::Rc;

use crate::element::ElementType;
use crate::fiber::{FiberArena, FiberId, FiberUpdateQueue, WorkTag};
use crate::flags::{Flags, HookFlags};
use crate::hooks::Effect;
use crate::host_config::HostConfig;
use crate::ReconcileError;

/// Host mutations applied by one commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
}

pub(crate) struct CommitSession<'a, H: HostConfig> {
    arena: &'a mut FiberArena<H>,
    host: &'a mut H,
    stats: CommitStats,
}

impl<'a, H: HostConfig> CommitSession<'a, H> {
    pub(crate) fn new(arena: &'a mut FiberArena<H>, host: &'a mut H) -> Self {
        Self {
            arena,
            host,
            stats: CommitStats::default(),
        }
    }

    /// Runs the mutation pass. Returns the stats and whether the tree has
    /// passive work left for the deferred flush.
    pub(crate) fn commit_root(
        mut self,
        finished: FiberId,
    ) -> Result<(CommitStats, bool), ReconcileError> {
        let root = &self.arena[finished];
        let flags = root.flags | root.subtree_flags;
        if flags.intersects(Flags::MUTATION_MASK) {
            self.commit_mutation_effects_on_fiber(finished)?;
        }
        Ok((self.stats, flags.intersects(Flags::PASSIVE_MASK)))
    }

    fn commit_mutation_effects_on_fiber(&mut self, fiber: FiberId) -> Result<(), ReconcileError> {
        self.recursively_traverse_mutation_effects(fiber)?;
        self.commit_reconciliation_effects(fiber)?;

        let flags = self.arena[fiber].flags;
        match self.arena[fiber].tag {
            WorkTag::HostComponent => {
                if flags.contains(Flags::CONTENT_RESET) {
                    let instance = self.instance(fiber)?;
                    self.host.reset_text_content(&instance);
                }
                if flags.contains(Flags::UPDATE) {
                    self.commit_host_update(fiber)?;
                }
                if flags.contains(Flags::REF) {
                    self.commit_attach_ref(fiber)?;
                }
            }
            WorkTag::HostText => {
                if flags.contains(Flags::UPDATE) {
                    self.commit_text_update(fiber)?;
                }
            }
            WorkTag::IndeterminateComponent => {
                return Err(ReconcileError::UnresolvedComponent { fiber });
            }
            WorkTag::HostRoot | WorkTag::FunctionComponent => {}
        }
        Ok(())
    }

    fn recursively_traverse_mutation_effects(
        &mut self,
        parent: FiberId,
    ) -> Result<(), ReconcileError> {
        let deletions = self.arena[parent].deletions.clone();
        for deleted in deletions {
            self.commit_deletion_effects(parent, deleted)?;
        }

        if self.arena[parent].subtree_flags.intersects(Flags::MUTATION_MASK) {
            let mut next = self.arena[parent].child;
            while let Some(child) = next {
                self.commit_mutation_effects_on_fiber(child)?;
                next = self.arena[child].sibling;
            }
        }
        Ok(())
    }

    fn instance(&self, fiber: FiberId) -> Result<H::Instance, ReconcileError> {
        self.arena[fiber]
            .state_node
            .clone()
            .ok_or(ReconcileError::MissingInstance { fiber })
    }

    /// Nearest host component or root at or above `start`.
    fn host_parent_fiber(
        &self,
        start: Option<FiberId>,
        origin: FiberId,
    ) -> Result<FiberId, ReconcileError> {
        let mut next = start;
        while let Some(fiber) = next {
            if self.arena[fiber].tag.is_host_parent() {
                return Ok(fiber);
            }
            next = self.arena[fiber].return_fiber;
        }
        Err(ReconcileError::MissingHostParent { fiber: origin })
    }

    fn commit_deletion_effects(
        &mut self,
        return_fiber: FiberId,
        deleted: FiberId,
    ) -> Result<(), ReconcileError> {
        let host_parent = self.host_parent_fiber(Some(return_fiber), deleted)?;
        let parent_instance = self.instance(host_parent)?;
        self.delete_subtree(Some(&parent_instance), deleted)?;
        self.stats.deletions += 1;

        let fiber = &mut self.arena[deleted];
        fiber.return_fiber = None;
        if let Some(alternate) = fiber.alternate {
            if let Some(alternate) = self.arena.get_mut(alternate) {
                alternate.return_fiber = None;
            }
        }
        Ok(())
    }

    /// Detaches refs below `fiber` and removes its topmost host instances
    /// from `host_parent`.
    fn delete_subtree(
        &mut self,
        host_parent: Option<&H::Instance>,
        fiber: FiberId,
    ) -> Result<(), ReconcileError> {
        let tag = self.arena[fiber].tag;
        let children = self.arena.children(fiber);
        if tag.is_host() {
            if let Some(node_ref) = &self.arena[fiber].node_ref {
                node_ref.detach();
            }
            for child in children {
                self.delete_subtree(None, child)?;
            }
            if let Some(parent) = host_parent {
                let instance = self.instance(fiber)?;
                self.host.remove_child(parent, &instance);
            }
        } else {
            for child in children {
                self.delete_subtree(host_parent, child)?;
            }
        }
        Ok(())
    }

    fn commit_reconciliation_effects(&mut self, fiber: FiberId) -> Result<(), ReconcileError> {
        if self.arena[fiber].flags.contains(Flags::PLACEMENT) {
            self.commit_placement(fiber)?;
            self.arena[fiber].flags.remove(Flags::PLACEMENT);
        }
        Ok(())
    }

    fn commit_placement(&mut self, fiber: FiberId) -> Result<(), ReconcileError> {
        let parent_fiber = self.host_parent_fiber(self.arena[fiber].return_fiber, fiber)?;
        let parent = self.instance(parent_fiber)?;

        let parent_node = &mut self.arena[parent_fiber];
        if parent_node.tag == WorkTag::HostComponent
            && parent_node.flags.contains(Flags::CONTENT_RESET)
        {
            parent_node.flags.remove(Flags::CONTENT_RESET);
            self.host.reset_text_content(&parent);
        }

        let before = self.host_sibling(fiber);
        self.insert_or_append_placement_node(fiber, before.as_ref(), &parent)?;
        self.stats.placements += 1;
        Ok(())
    }

    /// First host instance after `fiber` that is already in place, which a
    /// placed node has to be inserted in front of.
    fn host_sibling(&mut self, fiber: FiberId) -> Option<H::Instance> {
        let mut node = fiber;
        'siblings: loop {
            let sibling = loop {
                let current = &self.arena[node];
                if let Some(sibling) = current.sibling {
                    break sibling;
                }
                match current.return_fiber {
                    Some(parent) if !self.arena[parent].tag.is_host_parent() => node = parent,
                    _ => return None,
                }
            };
            let parent = self.arena[node].return_fiber;
            self.arena[sibling].return_fiber = parent;
            node = sibling;

            while !self.arena[node].tag.is_host() {
                let current = &self.arena[node];
                let placed = current.flags.contains(Flags::PLACEMENT);
                let child = current.child;
                if placed {
                    continue 'siblings;
                }
                let Some(child) = child else {
                    continue 'siblings;
                };
                self.arena[child].return_fiber = Some(node);
                node = child;
            }

            let current = &self.arena[node];
            if !current.flags.contains(Flags::PLACEMENT) {
                return current.state_node.clone();
            }
        }
    }

    fn insert_or_append_placement_node(
        &mut self,
        node: FiberId,
        before: Option<&H::Instance>,
        parent: &H::Instance,
    ) -> Result<(), ReconcileError> {
        if self.arena[node].tag.is_host() {
            let instance = self.instance(node)?;
            match before {
                Some(before) => self.host.insert_before(parent, &instance, before),
                None => self.host.append_child(parent, &instance),
            }
            return Ok(());
        }
        let mut next = self.arena[node].child;
        while let Some(child) = next {
            self.insert_or_append_placement_node(child, before, parent)?;
            next = self.arena[child].sibling;
        }
        Ok(())
    }

    fn commit_host_update(&mut self, fiber: FiberId) -> Result<(), ReconcileError> {
        let instance = self.instance(fiber)?;
        let node = &mut self.arena[fiber];
        let ty = match &node.element_type {
            Some(ElementType::Host(ty)) => Rc::clone(ty),
            _ => return Ok(()),
        };
        let new_props = node.memoized_element_props();

        let Some(alternate) = node.alternate else {
            self.host.commit_mount(&instance, &ty, &new_props);
            return Ok(());
        };
        let payload = match mem::replace(&mut node.update_queue, FiberUpdateQueue::Host(None)) {
            FiberUpdateQueue::Host(payload) => payload,
            other => {
                node.update_queue = other;
                None
            }
        };
        if let Some(payload) = payload {
            let old_props = self.arena[alternate].memoized_element_props();
            self.host
                .apply_update_payload(&instance, payload, &ty, &old_props, &new_props);
            self.stats.updates += 1;
        }
        Ok(())
    }

    fn commit_text_update(&mut self, fiber: FiberId) -> Result<(), ReconcileError> {
        let instance = self.instance(fiber)?;
        let node = &self.arena[fiber];
        let new_text = node.memoized_props.text().cloned().unwrap_or_else(|| Rc::from(""));
        let old_text = node
            .alternate
            .and_then(|alternate| self.arena.get(alternate))
            .and_then(|alternate| alternate.memoized_props.text().cloned())
            .unwrap_or_else(|| Rc::clone(&new_text));
        self.host.commit_text_update(&instance, &old_text, &new_text);
        self.stats.updates += 1;
        Ok(())
    }

    fn commit_attach_ref(&mut self, fiber: FiberId) -> Result<(), ReconcileError> {
        let node = &self.arena[fiber];
        let previous = node
            .alternate
            .and_then(|alternate| self.arena.get(alternate))
            .and_then(|alternate| alternate.node_ref.clone());
        if let Some(previous) = previous {
            if node.node_ref.as_ref() != Some(&previous) {
                previous.detach();
            }
        }
        if let Some(node_ref) = node.node_ref.clone() {
            let instance = self.instance(fiber)?;
            node_ref.attach(&instance);
        }
        Ok(())
    }
}

/// Destroys and creates collected from a committed tree, in run order.
#[derive(Default)]
pub(crate) struct PassiveEffects {
    unmount: Vec<Rc<Effect>>,
    mount: Vec<Rc<Effect>>,
    released: usize,
}

impl PassiveEffects {
    pub(crate) fn counts(&self) -> (usize, usize) {
        (self.unmount.len(), self.mount.len())
    }

    pub(crate) fn released(&self) -> usize {
        self.released
    }

    /// All destroys, then all creates.
    pub(crate) fn run(self) {
        for effect in &self.unmount {
            effect.run_destroy();
        }
        for effect in &self.mount {
            effect.run_create();
        }
    }
}

fn function_effects<H: HostConfig>(arena: &FiberArena<H>, fiber: FiberId) -> &[Rc<Effect>] {
    match &arena[fiber].update_queue {
        FiberUpdateQueue::Function(queue) => &queue.effects,
        _ => &[],
    }
}

/// Gathers the passive work of `finished` and frees every deleted fiber
/// along with its alternate. Runs no user code.
pub(crate) fn collect_passive_effects<H: HostConfig>(
    arena: &mut FiberArena<H>,
    finished: FiberId,
) -> PassiveEffects {
    let mut effects = PassiveEffects::default();
    let mut deleted = Vec::new();
    passive_unmount_on_fiber(arena, finished, &mut effects, &mut deleted);
    passive_mount_on_fiber(arena, finished, &mut effects);

    for fiber in deleted {
        let alternate = arena.get(fiber).and_then(|fiber| fiber.alternate);
        if let Some(alternate) = alternate {
            if arena.release(alternate).is_some() {
                effects.released += 1;
            }
        }
        if arena.release(fiber).is_some() {
            effects.released += 1;
        }
    }
    effects
}

fn passive_unmount_on_fiber<H: HostConfig>(
    arena: &FiberArena<H>,
    fiber: FiberId,
    effects: &mut PassiveEffects,
    deleted: &mut Vec<FiberId>,
) {
    let node = &arena[fiber];
    if node.flags.contains(Flags::CHILD_DELETION) {
        for &child in &node.deletions {
            if arena.contains(child) {
                passive_unmount_deleted_tree(arena, child, effects, deleted);
            }
        }
    }
    if node.subtree_flags.intersects(Flags::PASSIVE_MASK) {
        let mut next = node.child;
        while let Some(child) = next {
            passive_unmount_on_fiber(arena, child, effects, deleted);
            next = arena[child].sibling;
        }
    }
    if node.tag == WorkTag::FunctionComponent && node.flags.contains(Flags::PASSIVE) {
        let updated = function_effects(arena, fiber)
            .iter()
            .filter(|effect| effect.has_effect());
        effects.unmount.extend(updated.cloned());
    }
}

/// Parent before child.
fn passive_unmount_deleted_tree<H: HostConfig>(
    arena: &FiberArena<H>,
    fiber: FiberId,
    effects: &mut PassiveEffects,
    deleted: &mut Vec<FiberId>,
) {
    let node = &arena[fiber];
    deleted.push(fiber);
    if node.tag == WorkTag::FunctionComponent {
        let passive = function_effects(arena, fiber)
            .iter()
            .filter(|effect| effect.tag.contains(HookFlags::PASSIVE));
        effects.unmount.extend(passive.cloned());
        for hook in node.memoized_state.hooks().unwrap_or_default() {
            hook.detach();
        }
    }
    let mut next = node.child;
    while let Some(child) = next {
        passive_unmount_deleted_tree(arena, child, effects, deleted);
        next = arena[child].sibling;
    }
}

/// Child before parent.
fn passive_mount_on_fiber<H: HostConfig>(
    arena: &FiberArena<H>,
    fiber: FiberId,
    effects: &mut PassiveEffects,
) {
    let node = &arena[fiber];
    if node.subtree_flags.intersects(Flags::PASSIVE_MASK) {
        let mut next = node.child;
        while let Some(child) = next {
            passive_mount_on_fiber(arena, child, effects);
            next = arena[child].sibling;
        }
    }
    if node.tag == WorkTag::FunctionComponent && node.flags.contains(Flags::PASSIVE) {
        let mounted = function_effects(arena, fiber)
            .iter()
            .filter(|effect| effect.has_effect());
        effects.mount.extend(mounted.cloned());
    }
}
