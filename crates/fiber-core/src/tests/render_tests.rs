use crate::test_support::{count_ops, Harness};
use crate::{Component, Element, HookContext, HostOp, Node, PropChange, Props};

fn keyed_items(keys: &[&str]) -> Node {
    Element::host("ul")
        .children(keys.iter().map(|key| Element::host("li").key(key).text(*key).into()))
        .into()
}

fn item_ids(harness: &Harness) -> Vec<crate::HostNodeId> {
    harness.root.with_host(|host| {
        let list = host.children(host.root())[0];
        host.children(list).to_vec()
    })
}

#[test]
fn mount_builds_host_tree_and_places_top_node_once() {
    let harness = Harness::new();
    harness
        .render(Element::host("div").children([
            Element::host("span").text("a").into(),
            Element::host("span").text("b").into(),
        ]))
        .unwrap();

    assert_eq!(harness.text(), "ab");
    assert_eq!(harness.top_level_count(), 1);
    let stats = harness.root.last_commit();
    assert_eq!(stats.placements, 1);
    assert_eq!(stats.deletions, 0);

    let ops = harness.take_ops();
    assert_eq!(count_ops(&ops, HostOp::is_creation), 3);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::AppendInitial { .. })), 2);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Append { .. })), 1);
}

#[test]
fn identical_rerender_touches_nothing() {
    let harness = Harness::new();
    let tree = || Element::host("div").attr("id", "x").text("same");
    harness.render(tree()).unwrap();
    harness.take_ops();

    harness.render(tree()).unwrap();
    assert!(harness.take_ops().is_empty());
    assert_eq!(harness.root.last_commit(), crate::CommitStats::default());
}

#[test]
fn rotating_keyed_list_moves_three_nodes_and_keeps_identity() {
    let harness = Harness::new();
    harness.render(keyed_items(&["A", "B", "C", "D"])).unwrap();
    let before = item_ids(&harness);
    harness.take_ops();

    harness.render(keyed_items(&["D", "A", "B", "C"])).unwrap();
    let ops = harness.take_ops();
    assert_eq!(harness.text(), "DABC");
    assert_eq!(count_ops(&ops, HostOp::is_creation), 0);
    assert_eq!(count_ops(&ops, HostOp::is_removal), 0);
    assert_eq!(harness.root.last_commit().placements, 3);

    let after = item_ids(&harness);
    assert_eq!(after, vec![before[3], before[0], before[1], before[2]]);
}

#[test]
fn reversing_keyed_list_moves_all_but_the_last() {
    let harness = Harness::new();
    harness.render(keyed_items(&["A", "B", "C"])).unwrap();
    harness.take_ops();

    harness.render(keyed_items(&["C", "B", "A"])).unwrap();
    let ops = harness.take_ops();
    assert_eq!(harness.text(), "CBA");
    assert_eq!(harness.root.last_commit().placements, 2);
    assert_eq!(count_ops(&ops, HostOp::is_creation), 0);
}

#[test]
fn removed_and_inserted_keys_touch_only_those_nodes() {
    let harness = Harness::new();
    harness.render(keyed_items(&["A", "B", "C"])).unwrap();
    harness.take_ops();

    harness.render(keyed_items(&["A", "C", "E"])).unwrap();
    let ops = harness.take_ops();
    assert_eq!(harness.text(), "ACE");
    assert_eq!(count_ops(&ops, HostOp::is_removal), 1);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Create { ty, .. } if ty == "li")), 1);
    let stats = harness.root.last_commit();
    assert_eq!(stats.deletions, 1);
    assert_eq!(stats.placements, 1);
}

#[test]
fn changed_type_replaces_the_subtree() {
    let harness = Harness::new();
    harness
        .render(Element::host("div").child(Element::host("span").text("x")))
        .unwrap();
    harness.take_ops();

    harness
        .render(Element::host("div").child(Element::host("p").text("x")))
        .unwrap();
    let ops = harness.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Create { ty, .. } if ty == "p")), 1);
    assert_eq!(count_ops(&ops, HostOp::is_removal), 1);
    assert!(harness.dump().contains("<p>"));
    assert!(!harness.dump().contains("<span>"));
}

#[test]
fn changed_text_child_is_a_single_text_update() {
    let harness = Harness::new();
    let tree = |count: i64| Element::host("div").children([Node::text("Count: "), count.into()]);
    harness.render(tree(1)).unwrap();
    harness.take_ops();

    harness.render(tree(2)).unwrap();
    let ops = harness.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], HostOp::UpdateText { text, .. } if text == "2"));
    assert_eq!(harness.text(), "Count: 2");
}

#[test]
fn changed_direct_text_goes_through_the_update_payload() {
    let harness = Harness::new();
    harness.render(Element::host("p").text("1")).unwrap();
    harness.take_ops();

    harness.render(Element::host("p").text("2")).unwrap();
    let ops = harness.take_ops();
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        HostOp::Update { changes, .. } => {
            assert_eq!(changes, &vec![PropChange::Text("2".to_owned())]);
        }
        other => panic!("unexpected op {other:?}"),
    }
}

#[test]
fn switching_from_direct_text_to_children_resets_content() {
    let harness = Harness::new();
    harness.render(Element::host("p").text("plain")).unwrap();
    harness.take_ops();

    harness
        .render(Element::host("p").child(Element::host("b").text("bold")))
        .unwrap();
    let ops = harness.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::ResetText { .. })), 1);
    assert_eq!(harness.text(), "bold");
}

#[test]
fn rendering_empty_clears_the_container() {
    let harness = Harness::new();
    harness.render(keyed_items(&["A", "B"])).unwrap();
    harness.render(Node::Empty).unwrap();
    assert_eq!(harness.top_level_count(), 0);
    assert_eq!(harness.root.last_commit().deletions, 1);
}

#[test]
fn nested_lists_render_nothing() {
    let harness = Harness::new();
    harness
        .render(Element::host("div").children([
            Node::text("a"),
            Node::list([Node::text("b")]),
            Node::text("c"),
        ]))
        .unwrap();
    assert_eq!(harness.text(), "ac");
}

fn greeting(_: &mut HookContext<'_>, props: &Props) -> Node {
    let name = props.str("name").unwrap_or("nobody").to_owned();
    Element::host("h1").text(format!("hello {name}")).into()
}

fn farewell(_: &mut HookContext<'_>, _: &Props) -> Node {
    Element::host("h1").text("bye").into()
}

#[test]
fn components_render_their_props_and_keep_host_nodes() {
    let harness = Harness::new();
    let component = Component::new("Greeting", greeting);
    harness
        .render(Element::component(&component).attr("name", "ada"))
        .unwrap();
    assert_eq!(harness.text(), "hello ada");
    harness.take_ops();

    harness
        .render(Element::component(&component).attr("name", "bob"))
        .unwrap();
    assert_eq!(harness.text(), "hello bob");
    let ops = harness.take_ops();
    assert_eq!(count_ops(&ops, HostOp::is_creation), 0);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Update { .. })), 1);
}

#[test]
fn different_components_do_not_share_fibers() {
    let harness = Harness::new();
    harness
        .render(Element::component(&Component::new("Greeting", greeting)))
        .unwrap();
    harness.take_ops();

    harness
        .render(Element::component(&Component::new("Farewell", farewell)))
        .unwrap();
    let ops = harness.take_ops();
    assert_eq!(harness.text(), "bye");
    assert_eq!(count_ops(&ops, HostOp::is_removal), 1);
    assert_eq!(count_ops(&ops, HostOp::is_creation), 1);
}

#[test]
fn only_committed_fibers_count_as_mounted() {
    let harness = Harness::new();
    harness.render(keyed_items(&["A", "B"])).unwrap();
    let (list, first) = {
        let fibers = harness.root.fibers();
        let list = fibers.children(harness.root.current())[0];
        (list, fibers.children(list)[0])
    };
    assert!(harness.root.is_mounted(list));
    assert!(harness.root.is_mounted(first));

    harness.render(keyed_items(&["B"])).unwrap();
    assert!(!harness.root.is_mounted(first));
}
