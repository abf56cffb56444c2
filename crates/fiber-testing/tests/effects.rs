use fiber_testing::prelude::*;

fn tracked(name: &'static str, log: &CallLog, child: Option<Component>) -> Component {
    let log = log.clone();
    Component::new(name, move |cx: &mut HookContext<'_>, _: &Props| {
        let sink = log.clone();
        cx.use_effect_with_deps((), move || {
            sink.record(format!("mount {name}"));
            let sink = sink.clone();
            Cleanup::new(move || sink.record(format!("unmount {name}")))
        });
        match &child {
            Some(child) => Element::host("div").child(Element::component(child)).into(),
            None => Node::text(name),
        }
    })
}

#[test]
fn mount_runs_children_first_and_teardown_runs_parents_first() {
    let root = TestRoot::new();
    let log = CallLog::new();
    let leaf = tracked("leaf", &log, None);
    let middle = tracked("middle", &log, Some(leaf));
    let top = tracked("top", &log, Some(middle));

    root.render_and_flush(Element::component(&top)).unwrap();
    assert_eq!(log.take(), vec!["mount leaf", "mount middle", "mount top"]);

    root.render_and_flush(Element::component(&top)).unwrap();
    assert!(log.is_empty());

    root.render_and_flush(Node::Empty).unwrap();
    assert_eq!(
        log.take(),
        vec!["unmount top", "unmount middle", "unmount leaf"]
    );
    assert_eq!(root.text(), "");
}

#[test]
fn effects_are_deferred_until_the_scheduler_runs() {
    let root = TestRoot::new();
    let log = CallLog::new();
    let leaf = tracked("leaf", &log, None);
    root.render(Element::component(&leaf)).unwrap();

    assert!(log.is_empty());
    assert!(root.root().has_pending_passive_effects());
    assert_eq!(root.scheduler().pending_deferred(), 1);

    root.flush().unwrap();
    assert_eq!(log.take(), vec!["mount leaf"]);
}

#[test]
fn changed_deps_tear_down_before_the_next_create() {
    let root = TestRoot::new();
    let log = CallLog::new();
    let sink = log.clone();
    let subscriber = Component::new("Subscriber", move |cx: &mut HookContext<'_>, props: &Props| {
        let topic = props.str("topic").unwrap_or("none").to_owned();
        let sink = sink.clone();
        cx.use_effect_with_deps(topic.clone(), move || {
            sink.record(format!("subscribe {topic}"));
            let sink = sink.clone();
            Cleanup::new(move || sink.record(format!("unsubscribe {topic}")))
        });
        Node::Empty
    });
    let view = |topic: &str| Element::component(&subscriber).attr("topic", topic);

    root.render_and_flush(view("news")).unwrap();
    root.render_and_flush(view("news")).unwrap();
    root.render_and_flush(view("sport")).unwrap();
    assert_eq!(
        log.take(),
        vec!["subscribe news", "unsubscribe news", "subscribe sport"]
    );
}

#[test]
fn effect_updates_render_on_a_microtask() {
    let root = TestRoot::new();
    let component = Component::new("Clock", |cx: &mut HookContext<'_>, _: &Props| {
        let (ticks, set_ticks) = cx.use_state(|| 0i64);
        cx.use_effect_with_deps(ticks, move || {
            if ticks < 3 {
                set_ticks.set(ticks + 1);
            }
        });
        Node::from(ticks)
    });

    root.render(Element::component(&component)).unwrap();
    assert_eq!(root.text(), "0");
    root.flush().unwrap();
    assert_eq!(root.text(), "3");
    assert_eq!(root.render_passes(), 4);
}

#[test]
fn unmounted_setters_are_ignored() {
    let root = TestRoot::new();
    let setter: Capture<SetState<i64>> = Capture::new();
    let slot = setter.clone();
    let component = Component::new("Short", move |cx: &mut HookContext<'_>, _: &Props| {
        let (value, set_value) = cx.use_state(|| 0i64);
        slot.set(set_value);
        Node::from(value)
    });
    root.render_and_flush(Element::component(&component)).unwrap();
    root.render_and_flush(Node::Empty).unwrap();
    let passes = root.render_passes();

    setter.get().unwrap().set(4);
    root.flush().unwrap();
    assert_eq!(root.render_passes(), passes);
}

#[test]
fn flushing_effects_from_render_poisons_the_root() {
    let root = TestRoot::new();
    let handle = Capture::new();
    handle.set(root.root().clone());
    let outcome = Capture::new();
    let seen = outcome.clone();
    let component = Component::new("Impatient", move |_: &mut HookContext<'_>, _: &Props| {
        if let Some(root) = handle.get() {
            seen.set(root.flush_passive_effects());
        }
        Node::Empty
    });

    let _ = root.render(Element::component(&component));
    assert_eq!(outcome.get(), Some(Err(ReconcileError::ReentrantPassiveFlush)));
    assert!(root.root().is_poisoned());
    assert_eq!(root.render(Node::Empty), Err(ReconcileError::RootPoisoned));
}

#[test]
fn node_ref_points_at_the_committed_instance() {
    let root = TestRoot::new();
    let input = NodeRef::new();
    root.render(Element::host("form").child(Element::host("input").node_ref(&input)))
        .unwrap();
    let form = root.top_level()[0];
    assert_eq!(input.get(), Some(root.children_of(form)[0]));

    root.render(Element::host("form")).unwrap();
    assert!(!input.is_attached());
}
