use std::rc::Rc;

use anyhow::{anyhow, Context};
use fiber_core::{
    create_root_container_with_options, update_root_container, Cleanup, Component, Element,
    FiberRoot, HookContext, HostNodeId, MemoryHost, Node, PropValue, Props, RootOptions,
    TaskScheduler,
};
use fiber_runtime_std::StdScheduler;
use log::info;

#[derive(Clone, Copy)]
enum TodoAction {
    Add,
    RemoveFirst,
    Rotate,
}

fn todos(items: &Vec<u32>, action: &TodoAction) -> Vec<u32> {
    let mut next = items.clone();
    match action {
        TodoAction::Add => {
            let id = next.iter().copied().max().map_or(1, |max| max + 1);
            next.push(id);
        }
        TodoAction::RemoveFirst => {
            if !next.is_empty() {
                next.remove(0);
            }
        }
        TodoAction::Rotate => next.rotate_right(1),
    }
    next
}

fn counter(cx: &mut HookContext<'_>, _: &Props) -> Node {
    let (count, set_count) = cx.use_state(|| 0i64);
    cx.use_effect_with_deps(count, move || {
        info!("count is now {count}");
        Cleanup::new(move || info!("leaving count {count}"))
    });

    let increment = set_count.clone();
    let decrement = set_count;
    Element::host("section")
        .children([
            Element::host("button")
                .attr("id", "increment")
                .on("onClick", move || increment.update(|n| n + 1))
                .text("+")
                .into(),
            Element::host("span")
                .children([Node::text("Count: "), count.into()])
                .into(),
            Element::host("button")
                .attr("id", "decrement")
                .on("onClick", move || decrement.update(|n| n - 1))
                .text("-")
                .into(),
        ])
        .into()
}

fn todo_list(cx: &mut HookContext<'_>, _: &Props) -> Node {
    let (items, dispatch) = cx.use_reducer(todos, vec![1, 2, 3]);
    let rows = items.iter().map(|id| {
        Element::host("li")
            .key(id.to_string())
            .text(format!("todo #{id}"))
            .into()
    });

    let actions = [
        ("add", TodoAction::Add),
        ("remove", TodoAction::RemoveFirst),
        ("rotate", TodoAction::Rotate),
    ];
    let buttons = actions.into_iter().map(|(id, action)| {
        let dispatch = dispatch.clone();
        Element::host("button")
            .key(id)
            .attr("id", id)
            .on("onClick", move || dispatch.dispatch(action))
            .text(id)
            .into()
    });

    Element::host("div")
        .children([
            Element::host("ul").children(rows).into(),
            Element::host("nav").children(buttons).into(),
        ])
        .into()
}

fn app() -> Node {
    let counter = Component::new("Counter", counter);
    let todo_list = Component::new("TodoList", todo_list);
    Element::host("main")
        .children([
            Element::component(&counter).key("counter").into(),
            Element::component(&todo_list).key("todos").into(),
        ])
        .into()
}

fn find_by_id(host: &MemoryHost, from: HostNodeId, id: &str) -> Option<HostNodeId> {
    if host.attr(from, "id").and_then(PropValue::as_str) == Some(id) {
        return Some(from);
    }
    host.children(from)
        .iter()
        .find_map(|&child| find_by_id(host, child, id))
}

/// Fires the `onClick` handler of the element with the given `id`.
fn click(root: &FiberRoot<MemoryHost>, id: &str) -> anyhow::Result<()> {
    let handler = root.with_host(|host| {
        find_by_id(host, host.root(), id).and_then(|node| match host.attr(node, "onClick") {
            Some(PropValue::Handler(handler)) => Some(handler.clone()),
            _ => None,
        })
    });
    let handler = handler.ok_or_else(|| anyhow!("no clickable element with id {id:?}"))?;
    info!("click #{id}");
    handler.call();
    Ok(())
}

fn settle(root: &FiberRoot<MemoryHost>, scheduler: &StdScheduler) -> anyhow::Result<()> {
    let ran = scheduler.run_until_idle();
    log::debug!("{ran} scheduled tasks ran");
    match root.take_error() {
        Some(error) => Err(error).context("scheduled work failed"),
        None => Ok(()),
    }
}

fn print_tree(label: &str, root: &FiberRoot<MemoryHost>) {
    println!("--- {label} ---");
    print!("{}", root.with_host(|host| host.dump_tree(Some(host.root()))));
    let stats = root.last_commit();
    println!(
        "(pass {}: {} placements, {} updates, {} deletions)",
        root.render_passes(),
        stats.placements,
        stats.updates,
        stats.deletions
    );
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("=== Fiber-RS Counter Example ===");
    println!("Drives a counter and a keyed todo list through simulated clicks.");
    println!();

    let scheduler = Rc::new(StdScheduler::new());
    let tasks: Rc<dyn TaskScheduler> = scheduler.clone();
    let host = MemoryHost::new();
    let container = host.root();
    let root = create_root_container_with_options(
        host,
        container,
        tasks,
        RootOptions {
            log_commits: true,
            ..RootOptions::default()
        },
    );

    update_root_container(app(), &root).context("initial render")?;
    settle(&root, &scheduler)?;
    print_tree("mounted", &root);

    for id in ["increment", "increment", "decrement"] {
        click(&root, id)?;
        settle(&root, &scheduler)?;
    }
    print_tree("after counter clicks", &root);

    root.batched_updates(|| -> anyhow::Result<()> {
        click(&root, "add")?;
        click(&root, "rotate")?;
        Ok(())
    })?;
    settle(&root, &scheduler)?;
    print_tree("after add + rotate (one batch)", &root);

    click(&root, "remove")?;
    settle(&root, &scheduler)?;
    print_tree("after remove", &root);

    update_root_container(Node::Empty, &root).context("unmount")?;
    settle(&root, &scheduler)?;
    print_tree("unmounted", &root);
    Ok(())
}
