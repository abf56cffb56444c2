//! In-memory host tree.
//!
//! Stands in for a real UI toolkit in tests and demos: nodes live in a flat
//! vector, every host call is recorded as a [`HostOp`], and `dump_tree`
//! renders the tree as indented text.

use std::fmt;

use indexmap::IndexMap;

use crate::element::{Node, PropValue, Props, StyleValue};
use crate::fiber::FiberId;
use crate::host_config::HostConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNodeId(usize);

impl HostNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HostNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropChange {
    Set { name: String, value: PropValue },
    Remove { name: String },
    SetStyle { name: String, value: String },
    RemoveStyle { name: String },
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    Create { id: HostNodeId, ty: String },
    CreateText { id: HostNodeId, text: String },
    AppendInitial { parent: HostNodeId, child: HostNodeId },
    Append { parent: HostNodeId, child: HostNodeId },
    InsertBefore {
        parent: HostNodeId,
        child: HostNodeId,
        before: HostNodeId,
    },
    Remove { parent: HostNodeId, child: HostNodeId },
    Update { id: HostNodeId, changes: Vec<PropChange> },
    UpdateText { id: HostNodeId, text: String },
    ResetText { id: HostNodeId },
    Mount { id: HostNodeId },
}

impl HostOp {
    /// True for ops that create a node.
    pub fn is_creation(&self) -> bool {
        matches!(self, HostOp::Create { .. } | HostOp::CreateText { .. })
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, HostOp::Remove { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
enum HostNodeKind {
    Element {
        ty: String,
        attrs: IndexMap<String, PropValue>,
        text: Option<String>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct HostNode {
    kind: HostNodeKind,
    parent: Option<HostNodeId>,
    children: Vec<HostNodeId>,
    owner: Option<FiberId>,
}

pub struct MemoryHost {
    nodes: Vec<HostNode>,
    ops: Vec<HostOp>,
    root: HostNodeId,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let root = HostNode {
            kind: HostNodeKind::Element {
                ty: "#root".to_owned(),
                attrs: IndexMap::new(),
                text: None,
            },
            parent: None,
            children: Vec::new(),
            owner: None,
        };
        Self {
            nodes: vec![root],
            ops: Vec::new(),
            root: HostNodeId(0),
        }
    }

    /// The container node to mount a root into.
    pub fn root(&self) -> HostNodeId {
        self.root
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn children(&self, id: HostNodeId) -> &[HostNodeId] {
        self.nodes
            .get(id.0)
            .map_or(&[], |node| node.children.as_slice())
    }

    pub fn parent(&self, id: HostNodeId) -> Option<HostNodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    /// Fiber that created the node.
    pub fn owner(&self, id: HostNodeId) -> Option<FiberId> {
        self.nodes.get(id.0).and_then(|node| node.owner)
    }

    pub fn node_type(&self, id: HostNodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            HostNodeKind::Element { ty, .. } => Some(ty),
            HostNodeKind::Text(_) => None,
        }
    }

    pub fn attr(&self, id: HostNodeId, name: &str) -> Option<&PropValue> {
        match &self.nodes.get(id.0)?.kind {
            HostNodeKind::Element { attrs, .. } => attrs.get(name),
            HostNodeKind::Text(_) => None,
        }
    }

    /// Text of a text node, or the direct text content of an element.
    pub fn text(&self, id: HostNodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            HostNodeKind::Element { text, .. } => text.as_deref(),
            HostNodeKind::Text(text) => Some(text),
        }
    }

    /// Concatenated text of the subtree under `id`.
    pub fn text_content(&self, id: HostNodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: HostNodeId, out: &mut String) {
        if let Some(text) = self.text(id) {
            out.push_str(text);
        }
        for &child in self.children(id) {
            self.collect_text(child, out);
        }
    }

    pub fn dump_tree(&self, root: Option<HostNodeId>) -> String {
        let mut output = String::new();
        match root {
            Some(root) => self.dump_node(&mut output, root, 0),
            None => output.push_str("(no root)\n"),
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: HostNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.nodes.get(id.0) else {
            output.push_str(&format!("{indent}[{id}] (missing)\n"));
            return;
        };
        match &node.kind {
            HostNodeKind::Element { ty, attrs, text } => {
                output.push_str(&format!("{indent}[{id}] <{ty}>"));
                for (name, value) in attrs {
                    output.push_str(&format!(" {name}={}", format_value(value)));
                }
                if let Some(text) = text {
                    output.push_str(&format!(" {text:?}"));
                }
                output.push('\n');
            }
            HostNodeKind::Text(text) => output.push_str(&format!("{indent}[{id}] {text:?}\n")),
        }
        for &child in &node.children {
            self.dump_node(output, child, depth + 1);
        }
    }

    fn push_node(&mut self, kind: HostNodeKind, owner: FiberId) -> HostNodeId {
        let id = HostNodeId(self.nodes.len());
        self.nodes.push(HostNode {
            kind,
            parent: None,
            children: Vec::new(),
            owner: Some(owner),
        });
        id
    }

    fn detach(&mut self, child: HostNodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&id| id != child);
        }
    }

    fn attach(&mut self, parent: HostNodeId, child: HostNodeId, before: Option<HostNodeId>) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let position = before
            .and_then(|before| children.iter().position(|&id| id == before))
            .unwrap_or(children.len());
        children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn element_mut(
        &mut self,
        id: HostNodeId,
    ) -> Option<(&mut IndexMap<String, PropValue>, &mut Option<String>)> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            HostNodeKind::Element { attrs, text, .. } => Some((attrs, text)),
            HostNodeKind::Text(_) => None,
        }
    }
}

fn format_value(value: &PropValue) -> String {
    match value {
        PropValue::Null => "null".to_owned(),
        PropValue::Bool(value) => value.to_string(),
        PropValue::Int(value) => value.to_string(),
        PropValue::Float(value) => value.to_string(),
        PropValue::Str(value) => format!("{value:?}"),
        PropValue::Style(styles) => {
            let body: Vec<String> = styles
                .iter()
                .map(|(name, value)| format!("{name}: {}", style_value(name, value)))
                .collect();
            format!("{{{}}}", body.join("; "))
        }
        PropValue::Handler(_) => "<handler>".to_owned(),
    }
}

/// CSS properties whose numeric values take no `px` suffix.
const UNITLESS_NUMBERS: &[&str] = &[
    "animationIterationCount",
    "aspectRatio",
    "borderImageOutset",
    "borderImageSlice",
    "borderImageWidth",
    "boxFlex",
    "boxFlexGroup",
    "boxOrdinalGroup",
    "columnCount",
    "columns",
    "flex",
    "flexGrow",
    "flexPositive",
    "flexShrink",
    "flexNegative",
    "flexOrder",
    "gridArea",
    "gridRow",
    "gridRowEnd",
    "gridRowSpan",
    "gridRowStart",
    "gridColumn",
    "gridColumnEnd",
    "gridColumnSpan",
    "gridColumnStart",
    "fontWeight",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "scale",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
    "fillOpacity",
    "floodOpacity",
    "stopOpacity",
    "strokeDasharray",
    "strokeDashoffset",
    "strokeMiterlimit",
    "strokeOpacity",
    "strokeWidth",
];

/// The text a style entry is written to the host as. Non-zero numbers get a
/// `px` suffix unless the property is unitless or custom (`--name`); an empty
/// string unsets the entry.
pub fn style_value(name: &str, value: &StyleValue) -> String {
    match value {
        StyleValue::Number(number)
            if *number != 0.0
                && !name.starts_with("--")
                && !UNITLESS_NUMBERS.contains(&name) =>
        {
            format!("{number}px")
        }
        StyleValue::Number(number) => number.to_string(),
        StyleValue::Str(text) => text.trim().to_owned(),
    }
}

/// Writes `styles` out the way the host stores them, dropping unset entries.
fn normalize_styles(styles: &IndexMap<String, StyleValue>) -> IndexMap<String, StyleValue> {
    styles
        .iter()
        .map(|(name, value)| (name.clone(), style_value(name, value)))
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name, StyleValue::Str(value)))
        .collect()
}

fn remove_style(attrs: &mut IndexMap<String, PropValue>, name: &str) {
    if let Some(PropValue::Style(styles)) = attrs.get_mut("style") {
        styles.shift_remove(name);
        if styles.is_empty() {
            attrs.shift_remove("style");
        }
    }
}

fn style_of(props: &Props) -> Option<&IndexMap<String, StyleValue>> {
    match props.get("style") {
        Some(PropValue::Style(styles)) => Some(styles),
        _ => None,
    }
}

fn diff_styles(
    old: Option<&IndexMap<String, StyleValue>>,
    new: Option<&IndexMap<String, StyleValue>>,
    changes: &mut Vec<PropChange>,
) {
    if let Some(old) = old {
        for name in old.keys() {
            if new.map_or(true, |new| !new.contains_key(name)) {
                changes.push(PropChange::RemoveStyle { name: name.clone() });
            }
        }
    }
    if let Some(new) = new {
        for (name, value) in new {
            if old.and_then(|old| old.get(name)) != Some(value) {
                changes.push(PropChange::SetStyle {
                    name: name.clone(),
                    value: style_value(name, value),
                });
            }
        }
    }
}

fn auto_focus(ty: &str, props: &Props) -> bool {
    match ty {
        "button" | "input" | "select" | "textarea" => props
            .get("autoFocus")
            .and_then(PropValue::as_bool)
            .unwrap_or(false),
        "img" => true,
        _ => false,
    }
}

impl HostConfig for MemoryHost {
    type Instance = HostNodeId;
    type UpdatePayload = Vec<PropChange>;

    fn create_instance(&mut self, ty: &str, _props: &Props, owner: FiberId) -> HostNodeId {
        let id = self.push_node(
            HostNodeKind::Element {
                ty: ty.to_owned(),
                attrs: IndexMap::new(),
                text: None,
            },
            owner,
        );
        self.ops.push(HostOp::Create {
            id,
            ty: ty.to_owned(),
        });
        id
    }

    fn create_text_instance(&mut self, text: &str, owner: FiberId) -> HostNodeId {
        let id = self.push_node(HostNodeKind::Text(text.to_owned()), owner);
        self.ops.push(HostOp::CreateText {
            id,
            text: text.to_owned(),
        });
        id
    }

    fn append_initial_child(&mut self, parent: &HostNodeId, child: &HostNodeId) {
        self.attach(*parent, *child, None);
        self.ops.push(HostOp::AppendInitial {
            parent: *parent,
            child: *child,
        });
    }

    fn append_child(&mut self, parent: &HostNodeId, child: &HostNodeId) {
        self.attach(*parent, *child, None);
        self.ops.push(HostOp::Append {
            parent: *parent,
            child: *child,
        });
    }

    fn insert_before(&mut self, parent: &HostNodeId, child: &HostNodeId, before: &HostNodeId) {
        self.attach(*parent, *child, Some(*before));
        self.ops.push(HostOp::InsertBefore {
            parent: *parent,
            child: *child,
            before: *before,
        });
    }

    fn remove_child(&mut self, parent: &HostNodeId, child: &HostNodeId) {
        self.detach(*child);
        self.ops.push(HostOp::Remove {
            parent: *parent,
            child: *child,
        });
    }

    fn finalize_initial_properties(&mut self, instance: &HostNodeId, ty: &str, props: &Props) -> bool {
        let text = match &props.children {
            Node::Text(text) => Some(text.clone()),
            _ => None,
        };
        if let Some((attrs, text_content)) = self.element_mut(*instance) {
            *attrs = props.attrs.clone();
            if let Some(PropValue::Style(styles)) = attrs.get_mut("style") {
                *styles = normalize_styles(styles);
                if styles.is_empty() {
                    attrs.shift_remove("style");
                }
            }
            *text_content = text;
        }
        auto_focus(ty, props)
    }

    fn commit_mount(&mut self, instance: &HostNodeId, _ty: &str, _props: &Props) {
        self.ops.push(HostOp::Mount { id: *instance });
    }

    fn diff_properties(
        &mut self,
        _instance: &HostNodeId,
        _ty: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<Vec<PropChange>> {
        let mut changes = Vec::new();
        for name in old_props.attrs.keys() {
            if new_props.attrs.contains_key(name) {
                continue;
            }
            if name == "style" {
                diff_styles(style_of(old_props), None, &mut changes);
            } else {
                changes.push(PropChange::Remove { name: name.clone() });
            }
        }
        for (name, value) in &new_props.attrs {
            let old = old_props.attrs.get(name);
            if old == Some(value) {
                continue;
            }
            if name == "style" {
                diff_styles(style_of(old_props), style_of(new_props), &mut changes);
            } else {
                changes.push(PropChange::Set {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        if let Node::Text(next) = &new_props.children {
            if old_props.text_children() != Some(next.as_str()) {
                changes.push(PropChange::Text(next.clone()));
            }
        }
        (!changes.is_empty()).then_some(changes)
    }

    fn apply_update_payload(
        &mut self,
        instance: &HostNodeId,
        payload: Vec<PropChange>,
        _ty: &str,
        _old_props: &Props,
        _new_props: &Props,
    ) {
        if let Some((attrs, text)) = self.element_mut(*instance) {
            for change in &payload {
                match change {
                    PropChange::Set { name, value } => {
                        attrs.insert(name.clone(), value.clone());
                    }
                    PropChange::Remove { name } => {
                        attrs.shift_remove(name);
                    }
                    PropChange::SetStyle { name, value } if value.is_empty() => {
                        remove_style(attrs, name);
                    }
                    PropChange::SetStyle { name, value } => {
                        let entry = attrs
                            .entry("style".to_owned())
                            .or_insert_with(|| PropValue::Style(IndexMap::new()));
                        if let PropValue::Style(styles) = entry {
                            styles.insert(name.clone(), StyleValue::Str(value.clone()));
                        }
                    }
                    PropChange::RemoveStyle { name } => remove_style(attrs, name),
                    PropChange::Text(next) => *text = Some(next.clone()),
                }
            }
        }
        self.ops.push(HostOp::Update {
            id: *instance,
            changes: payload,
        });
    }

    fn commit_text_update(&mut self, instance: &HostNodeId, _old_text: &str, new_text: &str) {
        if let Some(node) = self.nodes.get_mut(instance.0) {
            node.kind = HostNodeKind::Text(new_text.to_owned());
        }
        self.ops.push(HostOp::UpdateText {
            id: *instance,
            text: new_text.to_owned(),
        });
    }

    fn reset_text_content(&mut self, instance: &HostNodeId) {
        if let Some((_, text)) = self.element_mut(*instance) {
            *text = None;
        }
        self.ops.push(HostOp::ResetText { id: *instance });
    }

    fn should_treat_children_as_text(&self, _ty: &str, props: &Props) -> bool {
        matches!(props.children, Node::Text(_))
    }
}
