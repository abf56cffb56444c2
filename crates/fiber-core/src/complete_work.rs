use std::rc::Rc;

use crate::element::ElementType;
use crate::fiber::{FiberArena, FiberId, FiberUpdateQueue, WorkTag};
use crate::flags::Flags;
use crate::host_config::HostConfig;
use crate::work_loop::RenderSession;
use crate::ReconcileError;

/// Creates or diffs the host side of `wip` once all of its children are done.
pub(crate) fn complete_work<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    wip: FiberId,
) -> Result<(), ReconcileError> {
    let current = session.arena[wip].alternate;
    match session.arena[wip].tag {
        WorkTag::HostComponent => complete_host_component(session, current, wip)?,
        WorkTag::HostText => complete_host_text(session, current, wip),
        WorkTag::HostRoot | WorkTag::FunctionComponent | WorkTag::IndeterminateComponent => {}
    }
    bubble_properties(session.arena, wip);
    Ok(())
}

fn complete_host_component<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Result<(), ReconcileError> {
    let fiber = &session.arena[wip];
    let new_props = fiber.pending_element_props();
    let ty = match &fiber.element_type {
        Some(ElementType::Host(ty)) => Rc::clone(ty),
        _ => return Ok(()),
    };

    let existing = current.and_then(|current| {
        let current = &session.arena[current];
        current
            .state_node
            .clone()
            .map(|instance| (instance, current.memoized_element_props()))
    });

    match existing {
        Some((instance, old_props)) => {
            if Rc::ptr_eq(&old_props, &new_props) {
                return Ok(());
            }
            let payload = session
                .host
                .diff_properties(&instance, &ty, &old_props, &new_props);
            let fiber = &mut session.arena[wip];
            if let Some(payload) = payload {
                fiber.update_queue = FiberUpdateQueue::Host(Some(payload));
                fiber.flags |= Flags::UPDATE;
            }
        }
        None => {
            let instance = session.host.create_instance(&ty, &new_props, wip);
            append_all_children(session.arena, session.host, &instance, wip)?;
            let needs_commit = session
                .host
                .finalize_initial_properties(&instance, &ty, &new_props);
            let fiber = &mut session.arena[wip];
            fiber.state_node = Some(instance);
            if needs_commit {
                fiber.flags |= Flags::UPDATE;
            }
        }
    }
    Ok(())
}

fn complete_host_text<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    current: Option<FiberId>,
    wip: FiberId,
) {
    let new_text = session.arena[wip]
        .pending_props
        .text()
        .cloned()
        .unwrap_or_else(|| Rc::from(""));

    let existing = current.and_then(|current| {
        let current = &session.arena[current];
        current.state_node.as_ref().map(|_| current.memoized_props.text().cloned())
    });

    match existing {
        Some(old_text) => {
            if old_text.as_deref() != Some(&*new_text) {
                session.arena[wip].flags |= Flags::UPDATE;
            }
        }
        None => {
            let instance = session.host.create_text_instance(&new_text, wip);
            session.arena[wip].state_node = Some(instance);
        }
    }
}

/// Appends the topmost host instances below `wip` to `parent`, looking
/// through component fibers.
fn append_all_children<H: HostConfig>(
    arena: &FiberArena<H>,
    host: &mut H,
    parent: &H::Instance,
    wip: FiberId,
) -> Result<(), ReconcileError> {
    let mut next = arena[wip].child;
    while let Some(node) = next {
        let fiber = &arena[node];
        if fiber.tag.is_host() {
            let instance = fiber
                .state_node
                .as_ref()
                .ok_or(ReconcileError::MissingInstance { fiber: node })?;
            host.append_initial_child(parent, instance);
        } else if let Some(child) = fiber.child {
            next = Some(child);
            continue;
        }

        let mut node = node;
        loop {
            if node == wip {
                return Ok(());
            }
            if let Some(sibling) = arena[node].sibling {
                next = Some(sibling);
                break;
            }
            match arena[node].return_fiber {
                Some(up) if up != wip => node = up,
                _ => return Ok(()),
            }
        }
    }
    Ok(())
}

/// Folds the children's flags into `subtree_flags` and fixes their `return`
/// links.
fn bubble_properties<H: HostConfig>(arena: &mut FiberArena<H>, wip: FiberId) {
    let mut subtree_flags = Flags::empty();
    let mut next = arena[wip].child;
    while let Some(child) = next {
        let fiber = &mut arena[child];
        subtree_flags |= fiber.subtree_flags | fiber.flags;
        fiber.return_fiber = Some(wip);
        next = fiber.sibling;
    }
    arena[wip].subtree_flags |= subtree_flags;
}
