use std::cell::Cell;
use std::rc::Rc;

use crate::hooks::Hook;
use crate::test_support::{Captured, Harness, Log};
use crate::{
    Component, Dispatch, Element, HookContext, HookKind, Node, Props, ReconcileError,
    RootOptions, SetState,
};

fn counter(setter: Captured<SetState<i32>>) -> Component {
    Component::new("Counter", move |cx: &mut HookContext<'_>, _: &Props| {
        let (count, set_count) = cx.use_state(|| 0);
        setter.set(set_count);
        Element::host("span").text(count.to_string()).into()
    })
}

#[test]
fn state_updates_from_outside_render_synchronously() {
    let harness = Harness::new();
    let setter = Captured::default();
    let component = counter(setter.clone());
    harness.render(Element::component(&component)).unwrap();
    assert_eq!(harness.text(), "0");

    setter.get().set(5);
    assert_eq!(harness.text(), "5");
    setter.get().update(|n| n + 1);
    assert_eq!(harness.text(), "6");
}

#[test]
fn setter_identity_survives_many_updates() {
    let harness = Harness::new();
    let setter = Captured::default();
    let component = counter(setter.clone());
    harness.render(Element::component(&component)).unwrap();
    let first = setter.get();

    for n in 1..=20 {
        first.set(n);
        assert_eq!(setter.get(), first);
    }
    assert_eq!(harness.text(), "20");
}

#[test]
fn setting_the_same_value_skips_the_render() {
    let harness = Harness::new();
    let setter = Captured::default();
    let component = counter(setter.clone());
    harness.render(Element::component(&component)).unwrap();
    let passes = harness.root.render_passes();

    setter.get().set(0);
    assert_eq!(harness.root.render_passes(), passes);
    setter.get().set(1);
    assert_eq!(harness.root.render_passes(), passes + 1);
}

#[test]
fn batched_updates_render_once() {
    let harness = Harness::new();
    let setter = Captured::default();
    let component = counter(setter.clone());
    harness.render(Element::component(&component)).unwrap();
    let passes = harness.root.render_passes();

    harness.root.batched_updates(|| {
        setter.get().set(1);
        setter.get().update(|n| n * 10);
        assert_eq!(harness.text(), "0");
    });
    assert_eq!(harness.text(), "10");
    assert_eq!(harness.root.render_passes(), passes + 1);
}

#[derive(Clone, Copy)]
enum Step {
    Add(i32),
    Reset,
}

fn tally(state: &i32, step: &Step) -> i32 {
    match step {
        Step::Add(n) => state + n,
        Step::Reset => 0,
    }
}

#[test]
fn reducer_folds_queued_actions_in_order() {
    let harness = Harness::new();
    let dispatch: Captured<Dispatch<i32, Step>> = Captured::default();
    let slot = dispatch.clone();
    let component = Component::new("Tally", move |cx: &mut HookContext<'_>, _: &Props| {
        let (total, send) = cx.use_reducer(tally, 0);
        slot.set(send);
        Node::text(total.to_string())
    });
    harness.render(Element::component(&component)).unwrap();

    harness.root.batched_updates(|| {
        dispatch.get().dispatch(Step::Add(2));
        dispatch.get().dispatch(Step::Add(3));
    });
    assert_eq!(harness.text(), "5");
    dispatch.get().dispatch(Step::Reset);
    assert_eq!(harness.text(), "0");
}

#[test]
fn render_phase_updates_rerun_the_component_within_one_pass() {
    let harness = Harness::new();
    let renders = Rc::new(Cell::new(0));
    let seen = Rc::clone(&renders);
    let component = Component::new("Climb", move |cx: &mut HookContext<'_>, _: &Props| {
        seen.set(seen.get() + 1);
        let (n, set_n) = cx.use_state(|| 0);
        if n < 3 {
            set_n.set(n + 1);
        }
        Node::text(n.to_string())
    });
    harness.render(Element::component(&component)).unwrap();

    assert_eq!(harness.text(), "3");
    assert_eq!(renders.get(), 4);
    assert_eq!(harness.root.render_passes(), 1);
}

#[test]
fn endless_render_phase_updates_fail_and_poison_the_root() {
    let harness = Harness::with_options(RootOptions {
        re_render_limit: 5,
        ..RootOptions::default()
    });
    let component = Component::new("Spin", |cx: &mut HookContext<'_>, _: &Props| {
        let (n, set_n) = cx.use_state(|| 0u32);
        set_n.set(n + 1);
        Node::Empty
    });

    let error = harness.render(Element::component(&component)).unwrap_err();
    assert_eq!(
        error,
        ReconcileError::TooManyReRenders {
            component: "Spin",
            limit: 5
        }
    );
    assert!(harness.root.is_poisoned());
    assert_eq!(
        harness.render(Node::Empty),
        Err(ReconcileError::RootPoisoned)
    );
}

fn stateful(cx: &mut HookContext<'_>, props: &Props) -> Node {
    let hooks = props.int("hooks").unwrap_or(0);
    for _ in 0..hooks {
        cx.use_state(|| 0);
    }
    Node::Empty
}

#[test]
fn fewer_hooks_than_last_render_is_an_error() {
    let harness = Harness::new();
    let component = Component::new("Stateful", stateful);
    harness
        .render(Element::component(&component).attr("hooks", 2))
        .unwrap();

    let error = harness
        .render(Element::component(&component).attr("hooks", 1))
        .unwrap_err();
    assert_eq!(
        error,
        ReconcileError::TooFewHooks {
            component: "Stateful",
            expected: 2,
            rendered: 1
        }
    );
}

#[test]
fn more_hooks_than_last_render_is_an_error() {
    let harness = Harness::new();
    let component = Component::new("Stateful", stateful);
    harness
        .render(Element::component(&component).attr("hooks", 1))
        .unwrap();

    let error = harness
        .render(Element::component(&component).attr("hooks", 3))
        .unwrap_err();
    assert_eq!(
        error,
        ReconcileError::TooManyHooks {
            component: "Stateful",
            expected: 1
        }
    );
}

#[test]
fn a_mount_re_run_with_fewer_hooks_is_an_error() {
    let harness = Harness::new();
    let component = Component::new("Shrinking", |cx: &mut HookContext<'_>, _: &Props| {
        let (n, set_n) = cx.use_state(|| 0);
        if n == 0 {
            cx.use_ref(|| 0);
            set_n.set(1);
        }
        Node::Empty
    });

    let error = harness.render(Element::component(&component)).unwrap_err();
    assert_eq!(
        error,
        ReconcileError::TooFewHooks {
            component: "Shrinking",
            expected: 2,
            rendered: 1
        }
    );
}

#[test]
fn a_mount_re_run_with_more_hooks_is_an_error() {
    let harness = Harness::new();
    let component = Component::new("Growing", |cx: &mut HookContext<'_>, _: &Props| {
        let (n, set_n) = cx.use_state(|| 0);
        if n == 0 {
            set_n.set(1);
        } else {
            cx.use_ref(|| 0);
        }
        Node::Empty
    });

    let error = harness.render(Element::component(&component)).unwrap_err();
    assert_eq!(
        error,
        ReconcileError::TooManyHooks {
            component: "Growing",
            expected: 1
        }
    );
}

fn shifty(cx: &mut HookContext<'_>, props: &Props) -> Node {
    if props.int("variant") == Some(1) {
        cx.use_ref(|| 0);
    } else {
        cx.use_state(|| 0);
    }
    Node::Empty
}

#[test]
fn changing_hook_order_is_reported_with_both_kinds() {
    let harness = Harness::new();
    let component = Component::new("Shifty", shifty);
    harness
        .render(Element::component(&component).attr("variant", 0))
        .unwrap();

    let error = harness
        .render(Element::component(&component).attr("variant", 1))
        .unwrap_err();
    assert_eq!(
        error,
        ReconcileError::HookKindMismatch {
            component: "Shifty",
            index: 0,
            expected: HookKind::State,
            found: HookKind::Ref
        }
    );
}

#[test]
fn memo_recomputes_only_when_deps_change() {
    let harness = Harness::new();
    let log = Log::default();
    let sink = log.clone();
    let component = Component::new("Square", move |cx: &mut HookContext<'_>, props: &Props| {
        let n = props.int("n").unwrap_or(0);
        let sink = sink.clone();
        let square = cx.use_memo(n, move || {
            sink.push(format!("compute {n}"));
            n * n
        });
        Node::text(square.to_string())
    });

    for n in [2, 2, 3, 3] {
        harness
            .render(Element::component(&component).attr("n", n))
            .unwrap();
    }
    assert_eq!(harness.text(), "9");
    assert_eq!(log.take(), vec!["compute 2", "compute 3"]);
}

#[test]
fn callback_and_ref_are_stable_across_renders() {
    let harness = Harness::new();
    let seen: Captured<(Rc<fn() -> i32>, Rc<std::cell::RefCell<i32>>)> = Captured::default();
    let slot = seen.clone();
    let component = Component::new("Stable", move |cx: &mut HookContext<'_>, _: &Props| {
        let callback: Rc<fn() -> i32> = cx.use_callback((), (|| 7) as fn() -> i32);
        let counter = cx.use_ref(|| 0);
        *counter.borrow_mut() += 1;
        slot.set((callback, counter));
        Node::Empty
    });

    harness.render(Element::component(&component)).unwrap();
    let (first_callback, first_ref) = seen.get();
    harness.render(Element::component(&component)).unwrap();
    let (second_callback, second_ref) = seen.get();

    assert!(Rc::ptr_eq(&first_callback, &second_callback));
    assert!(Rc::ptr_eq(&first_ref, &second_ref));
    assert_eq!(*second_ref.borrow(), 2);
    assert_eq!(second_callback(), 7);
}

#[test]
fn sibling_state_is_kept_per_key() {
    let harness = Harness::new();
    let setters: Rc<std::cell::RefCell<Vec<(String, SetState<i32>)>>> = Rc::default();
    let sink = Rc::clone(&setters);
    let item = Component::new("Item", move |cx: &mut HookContext<'_>, props: &Props| {
        let label = props.str("label").unwrap_or("").to_owned();
        let (count, set_count) = cx.use_state(|| 0);
        sink.borrow_mut().push((label.clone(), set_count));
        Node::text(format!("{label}{count}"))
    });
    let list = |labels: &[&str]| {
        Node::list(labels.iter().map(|label| {
            Element::component(&item)
                .key(label)
                .attr("label", *label)
                .into()
        }))
    };

    harness.render(list(&["a", "b"])).unwrap();
    let set_b = setters
        .borrow()
        .iter()
        .find(|(label, _)| label == "b")
        .map(|(_, set)| set.clone())
        .unwrap();
    set_b.set(4);
    assert_eq!(harness.text(), "a0b4");

    harness.render(list(&["b", "a"])).unwrap();
    assert_eq!(harness.text(), "b4a0");
}

fn committed_hooks(harness: &Harness) -> Vec<Rc<Hook>> {
    let fibers = harness.root.fibers();
    let component = fibers.children(harness.root.current())[0];
    fibers[component]
        .memoized_state
        .hooks()
        .map(<[_]>::to_vec)
        .unwrap_or_default()
}

#[test]
fn hook_cells_keep_their_identity_across_no_op_updates() {
    let harness = Harness::new();
    let log = Log::default();
    let sink = log.clone();
    let component = Component::new("Mixed", move |cx: &mut HookContext<'_>, _: &Props| {
        let (n, _) = cx.use_state(|| 1);
        let sink = sink.clone();
        cx.use_effect_with_deps(n, move || sink.push(format!("effect {n}")));
        let renders = cx.use_ref(|| 0);
        *renders.borrow_mut() += 1;
        cx.use_effect(|| ());
        cx.use_memo(n, || n * 2);
        Node::text(n.to_string())
    });

    harness.render(Element::component(&component)).unwrap();
    harness.flush();
    let first = committed_hooks(&harness);
    assert_eq!(first.len(), 5);

    for _ in 0..5 {
        harness.render(Element::component(&component)).unwrap();
        harness.flush();
        let again = committed_hooks(&harness);
        assert_eq!(again.len(), first.len());
        assert!(first.iter().zip(&again).all(|(a, b)| Rc::ptr_eq(a, b)));
    }
    assert_eq!(log.take(), vec!["effect 1"]);
    assert_eq!(harness.text(), "1");
}
