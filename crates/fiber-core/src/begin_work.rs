use crate::child_reconciler::ChildReconciler;
use crate::element::{ElementType, Node};
use crate::fiber::{FiberId, FiberUpdateQueue, MemoizedState, RootState, WorkTag};
use crate::flags::Flags;
use crate::hooks::render_with_hooks;
use crate::host_config::HostConfig;
use crate::work_loop::RenderSession;
use crate::ReconcileError;

/// Renders or diffs `wip` and returns its first child, if any.
pub(crate) fn begin_work<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    match session.arena[wip].tag {
        WorkTag::HostRoot => Ok(update_host_root(session, current, wip)),
        WorkTag::HostComponent => Ok(update_host_component(session, current, wip)),
        WorkTag::HostText => Ok(None),
        WorkTag::IndeterminateComponent => mount_indeterminate_component(session, wip),
        WorkTag::FunctionComponent => update_function_component(session, current, wip),
    }
}

fn reconcile_children<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    current: Option<FiberId>,
    wip: FiberId,
    next_children: &Node,
) -> Option<FiberId> {
    let child = match current {
        None => ChildReconciler::MOUNT.reconcile_child_fibers(session.arena, wip, None, next_children),
        Some(current) => {
            let current_child = session.arena[current].child;
            ChildReconciler::UPDATE.reconcile_child_fibers(
                session.arena,
                wip,
                current_child,
                next_children,
            )
        }
    };
    session.arena[wip].child = child;
    child
}

fn update_host_root<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Option<FiberId> {
    let fiber = &session.arena[wip];
    let previous = match &fiber.memoized_state {
        MemoizedState::Root(state) => state.clone(),
        _ => RootState::default(),
    };
    let next = match &fiber.update_queue {
        FiberUpdateQueue::Root(queue) => queue.process(previous),
        _ => previous,
    };
    let element = next.element.clone();
    session.arena[wip].memoized_state = MemoizedState::Root(next);
    reconcile_children(session, current, wip, &element)
}

fn update_host_component<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Option<FiberId> {
    let fiber = &session.arena[wip];
    let props = fiber.pending_element_props();
    let Some(ty) = fiber.host_type() else {
        return None;
    };
    let is_direct_text = session.host.should_treat_children_as_text(ty, &props);

    let mut flags = Flags::empty();
    if let Some(current) = current {
        let current_fiber = &session.arena[current];
        let previous = current_fiber.memoized_element_props();
        if !is_direct_text && session.host.should_treat_children_as_text(ty, &previous) {
            flags |= Flags::CONTENT_RESET;
        }
        if current_fiber.node_ref != fiber.node_ref {
            flags |= Flags::REF;
        }
    } else if fiber.node_ref.is_some() {
        flags |= Flags::REF;
    }
    session.arena[wip].flags |= flags;

    if is_direct_text {
        reconcile_children(session, current, wip, &Node::Empty)
    } else {
        reconcile_children(session, current, wip, props.children())
    }
}

fn render_component<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    wip: FiberId,
) -> Result<Node, ReconcileError> {
    let fiber = &session.arena[wip];
    let component = match &fiber.element_type {
        Some(ElementType::Component(component)) => component.clone(),
        _ => return Err(ReconcileError::UnresolvedComponent { fiber: wip }),
    };
    let props = fiber.pending_element_props();
    render_with_hooks(
        session.arena,
        session.shared,
        wip,
        &component,
        &props,
        session.options.re_render_limit,
    )
}

fn mount_indeterminate_component<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let children = render_component(session, wip)?;
    session.arena[wip].tag = WorkTag::FunctionComponent;
    Ok(reconcile_children(session, None, wip, &children))
}

fn update_function_component<H: HostConfig>(
    session: &mut RenderSession<'_, H>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let children = render_component(session, wip)?;
    Ok(reconcile_children(session, current, wip, &children))
}
