//! Keyed diff of one level of children.
//!
//! Produces the new child chain of a work-in-progress fiber from the current
//! chain and the next child description, flagging inserted or moved fibers
//! with `PLACEMENT` and queueing removed ones on the parent's `deletions`.

use std::rc::Rc;

use log::warn;

use crate::collections::map::HashMap;
use crate::element::{Element, Key, Node};
use crate::fiber::{
    create_fiber_from_element, create_fiber_from_text, create_work_in_progress, FiberArena,
    FiberId, FiberProps, WorkTag,
};
use crate::flags::Flags;
use crate::host_config::HostConfig;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(usize),
}

impl ChildKey {
    fn of<H: HostConfig>(arena: &FiberArena<H>, fiber: FiberId) -> Self {
        let fiber = &arena[fiber];
        match &fiber.key {
            Some(key) => ChildKey::Key(Rc::clone(key)),
            None => ChildKey::Index(fiber.index),
        }
    }
}

/// The new child list being linked up, in order.
#[derive(Default)]
struct ChildChain {
    first: Option<FiberId>,
    last: Option<FiberId>,
}

impl ChildChain {
    fn push<H: HostConfig>(&mut self, arena: &mut FiberArena<H>, fiber: FiberId) {
        match self.last {
            Some(previous) => arena[previous].sibling = Some(fiber),
            None => self.first = Some(fiber),
        }
        self.last = Some(fiber);
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ChildReconciler {
    track_side_effects: bool,
}

impl ChildReconciler {
    /// Used below a fiber that is itself being placed; nothing is flagged.
    pub(crate) const MOUNT: ChildReconciler = ChildReconciler {
        track_side_effects: false,
    };
    pub(crate) const UPDATE: ChildReconciler = ChildReconciler {
        track_side_effects: true,
    };

    pub(crate) fn reconcile_child_fibers<H: HostConfig>(
        self,
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        new_child: &Node,
    ) -> Option<FiberId> {
        match new_child {
            Node::Element(element) => {
                let child =
                    self.reconcile_single_element(arena, return_fiber, current_first_child, element);
                Some(self.place_single_child(arena, child))
            }
            Node::Text(text) if !text.is_empty() => {
                let child =
                    self.reconcile_single_text(arena, return_fiber, current_first_child, text);
                Some(self.place_single_child(arena, child))
            }
            Node::List(children) => {
                self.reconcile_children_array(arena, return_fiber, current_first_child, children)
            }
            Node::Text(_) | Node::Empty => {
                self.delete_remaining_children(arena, return_fiber, current_first_child);
                None
            }
        }
    }

    fn delete_child<H: HostConfig>(
        self,
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        child: FiberId,
    ) {
        if !self.track_side_effects {
            return;
        }
        let parent = &mut arena[return_fiber];
        parent.deletions.push(child);
        parent.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children<H: HostConfig>(
        self,
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        first: Option<FiberId>,
    ) {
        if !self.track_side_effects {
            return;
        }
        let mut next = first;
        while let Some(child) = next {
            next = arena[child].sibling;
            self.delete_child(arena, return_fiber, child);
        }
    }

    fn map_remaining_children<H: HostConfig>(
        arena: &FiberArena<H>,
        first: Option<FiberId>,
    ) -> HashMap<ChildKey, FiberId> {
        let mut existing = HashMap::default();
        let mut next = first;
        while let Some(child) = next {
            existing.insert(ChildKey::of(arena, child), child);
            next = arena[child].sibling;
        }
        existing
    }

    fn use_fiber<H: HostConfig>(
        arena: &mut FiberArena<H>,
        fiber: FiberId,
        pending_props: FiberProps,
    ) -> FiberId {
        let clone = create_work_in_progress(arena, fiber, pending_props);
        let clone_fiber = &mut arena[clone];
        clone_fiber.index = 0;
        clone_fiber.sibling = None;
        clone
    }

    fn place_child<H: HostConfig>(
        self,
        arena: &mut FiberArena<H>,
        new_fiber: FiberId,
        last_placed_index: usize,
        new_index: usize,
    ) -> usize {
        arena[new_fiber].index = new_index;
        if !self.track_side_effects {
            return last_placed_index;
        }
        match arena[new_fiber].alternate {
            Some(current) => {
                let old_index = arena[current].index;
                if old_index < last_placed_index {
                    arena[new_fiber].flags |= Flags::PLACEMENT;
                    last_placed_index
                } else {
                    old_index
                }
            }
            None => {
                arena[new_fiber].flags |= Flags::PLACEMENT;
                last_placed_index
            }
        }
    }

    fn place_single_child<H: HostConfig>(self, arena: &mut FiberArena<H>, fiber: FiberId) -> FiberId {
        if self.track_side_effects && arena[fiber].alternate.is_none() {
            arena[fiber].flags |= Flags::PLACEMENT;
        }
        fiber
    }

    fn reconcile_single_element<H: HostConfig>(
        self,
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        element: &Element,
    ) -> FiberId {
        let mut child = current_first_child;
        while let Some(current) = child {
            if arena[current].key == element.key {
                if arena[current].element_type.as_ref() == Some(&element.ty) {
                    let sibling = arena[current].sibling;
                    self.delete_remaining_children(arena, return_fiber, sibling);
                    let existing = Self::use_fiber(
                        arena,
                        current,
                        FiberProps::Element(Rc::clone(&element.props)),
                    );
                    let fiber = &mut arena[existing];
                    fiber.node_ref = element.node_ref.clone();
                    fiber.return_fiber = Some(return_fiber);
                    return existing;
                }
                self.delete_remaining_children(arena, return_fiber, Some(current));
                break;
            }
            self.delete_child(arena, return_fiber, current);
            child = arena[current].sibling;
        }

        let created = create_fiber_from_element(arena, element);
        arena[created].return_fiber = Some(return_fiber);
        created
    }

    fn reconcile_single_text<H: HostConfig>(
        self,
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        text: &str,
    ) -> FiberId {
        if let Some(current) = current_first_child {
            if arena[current].tag == WorkTag::HostText {
                let sibling = arena[current].sibling;
                self.delete_remaining_children(arena, return_fiber, sibling);
                let existing = Self::use_fiber(arena, current, FiberProps::Text(Rc::from(text)));
                arena[existing].return_fiber = Some(return_fiber);
                return existing;
            }
        }
        self.delete_remaining_children(arena, return_fiber, current_first_child);
        let created = create_fiber_from_text(arena, text);
        arena[created].return_fiber = Some(return_fiber);
        created
    }

    fn update_text_node<H: HostConfig>(
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        current: Option<FiberId>,
        text: &str,
    ) -> FiberId {
        let fiber = match current.filter(|&current| arena[current].tag == WorkTag::HostText) {
            Some(current) => Self::use_fiber(arena, current, FiberProps::Text(Rc::from(text))),
            None => create_fiber_from_text(arena, text),
        };
        arena[fiber].return_fiber = Some(return_fiber);
        fiber
    }

    fn update_element<H: HostConfig>(
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        current: Option<FiberId>,
        element: &Element,
    ) -> FiberId {
        let same_type = |fiber: FiberId| arena[fiber].element_type.as_ref() == Some(&element.ty);
        let fiber = match current.filter(|&current| same_type(current)) {
            Some(current) => {
                let existing = Self::use_fiber(
                    arena,
                    current,
                    FiberProps::Element(Rc::clone(&element.props)),
                );
                arena[existing].node_ref = element.node_ref.clone();
                existing
            }
            None => create_fiber_from_element(arena, element),
        };
        arena[fiber].return_fiber = Some(return_fiber);
        fiber
    }

    fn create_child<H: HostConfig>(
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        new_child: &Node,
    ) -> Option<FiberId> {
        let fiber = match new_child {
            Node::Text(text) if !text.is_empty() => create_fiber_from_text(arena, text),
            Node::Element(element) => create_fiber_from_element(arena, element),
            Node::Text(_) | Node::Empty | Node::List(_) => return None,
        };
        arena[fiber].return_fiber = Some(return_fiber);
        Some(fiber)
    }

    /// Returns `None` when the slot's keys do not line up, which ends the
    /// in-order scan.
    fn update_slot<H: HostConfig>(
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        old_fiber: Option<FiberId>,
        new_child: &Node,
    ) -> Option<FiberId> {
        let old_key = old_fiber.and_then(|old| arena[old].key.clone());
        match new_child {
            Node::Text(text) if !text.is_empty() => {
                if old_key.is_some() {
                    return None;
                }
                Some(Self::update_text_node(arena, return_fiber, old_fiber, text))
            }
            Node::Element(element) => {
                if element.key != old_key {
                    return None;
                }
                Some(Self::update_element(arena, return_fiber, old_fiber, element))
            }
            Node::Text(_) | Node::Empty | Node::List(_) => None,
        }
    }

    fn update_from_map<H: HostConfig>(
        arena: &mut FiberArena<H>,
        existing: &HashMap<ChildKey, FiberId>,
        return_fiber: FiberId,
        new_index: usize,
        new_child: &Node,
    ) -> Option<FiberId> {
        match new_child {
            Node::Text(text) if !text.is_empty() => {
                let matched = existing.get(&ChildKey::Index(new_index)).copied();
                Some(Self::update_text_node(arena, return_fiber, matched, text))
            }
            Node::Element(element) => {
                let key = match &element.key {
                    Some(key) => ChildKey::Key(Rc::clone(key)),
                    None => ChildKey::Index(new_index),
                };
                let matched = existing.get(&key).copied();
                Some(Self::update_element(arena, return_fiber, matched, element))
            }
            Node::Text(_) | Node::Empty | Node::List(_) => None,
        }
    }

    fn reconcile_children_array<H: HostConfig>(
        self,
        arena: &mut FiberArena<H>,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        new_children: &[Node],
    ) -> Option<FiberId> {
        warn_nested_lists(arena, return_fiber, new_children);
        let mut chain = ChildChain::default();

        let mut old_fiber = current_first_child;
        let mut last_placed_index = 0;
        let mut new_index = 0;

        while let Some(old) = old_fiber {
            if new_index >= new_children.len() {
                break;
            }
            let (slot_fiber, next_old_fiber) = if arena[old].index > new_index {
                (None, Some(old))
            } else {
                (Some(old), arena[old].sibling)
            };
            let Some(new_fiber) =
                Self::update_slot(arena, return_fiber, slot_fiber, &new_children[new_index])
            else {
                old_fiber = slot_fiber.or(next_old_fiber);
                break;
            };
            if let Some(slot_fiber) = slot_fiber {
                if self.track_side_effects && arena[new_fiber].alternate.is_none() {
                    self.delete_child(arena, return_fiber, slot_fiber);
                }
            }
            last_placed_index = self.place_child(arena, new_fiber, last_placed_index, new_index);
            chain.push(arena, new_fiber);
            old_fiber = next_old_fiber;
            new_index += 1;
        }

        if new_index == new_children.len() {
            self.delete_remaining_children(arena, return_fiber, old_fiber);
            return chain.first;
        }

        if old_fiber.is_none() {
            for (index, child) in new_children.iter().enumerate().skip(new_index) {
                let Some(new_fiber) = Self::create_child(arena, return_fiber, child) else {
                    continue;
                };
                last_placed_index = self.place_child(arena, new_fiber, last_placed_index, index);
                chain.push(arena, new_fiber);
            }
            return chain.first;
        }

        let mut existing = Self::map_remaining_children(arena, old_fiber);
        for (index, child) in new_children.iter().enumerate().skip(new_index) {
            let Some(new_fiber) =
                Self::update_from_map(arena, &existing, return_fiber, index, child)
            else {
                continue;
            };
            if self.track_side_effects {
                if let Some(current) = arena[new_fiber].alternate {
                    let key = match &arena[current].key {
                        Some(key) => ChildKey::Key(Rc::clone(key)),
                        None => ChildKey::Index(index),
                    };
                    existing.remove(&key);
                }
            }
            last_placed_index = self.place_child(arena, new_fiber, last_placed_index, index);
            chain.push(arena, new_fiber);
        }

        if self.track_side_effects {
            let mut next = old_fiber;
            while let Some(old) = next {
                next = arena[old].sibling;
                if existing.get(&ChildKey::of(arena, old)) == Some(&old) {
                    self.delete_child(arena, return_fiber, old);
                }
            }
        }
        chain.first
    }
}

/// Nested lists produce no fiber. Returns how many `children` holds.
fn warn_nested_lists<H: HostConfig>(
    arena: &FiberArena<H>,
    return_fiber: FiberId,
    children: &[Node],
) -> usize {
    let nested = children
        .iter()
        .filter(|child| matches!(child, Node::List(_)))
        .count();
    if nested > 0 {
        let parent = arena[return_fiber]
            .element_type
            .as_ref()
            .map_or_else(|| "root".to_owned(), ToString::to_string);
        warn!("{nested} nested child list(s) under {parent} render nothing; flatten them first");
    }
    nested
}
