//! Element descriptors: the immutable "what to render" values handed to the
//! reconciler on every render.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::hooks::HookContext;

pub type Key = Rc<str>;

type RenderFn = dyn Fn(&mut HookContext<'_>, &Props) -> Node;

/// A function component.
///
/// Two components are the same type when they wrap the same function item or
/// closure type, so `Component::new("Row", row)` built on every render still
/// matches the fiber created by the previous render.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    type_id: TypeId,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&mut HookContext<'_>, &Props) -> Node + 'static,
    {
        Self {
            name,
            type_id: TypeId::of::<F>(),
            render: Rc::new(render),
        }
    }

    /// Same as [`Component::new`] with the function's type name as display name.
    pub fn from_fn<F>(render: F) -> Self
    where
        F: Fn(&mut HookContext<'_>, &Props) -> Node + 'static,
    {
        let name = type_name::<F>();
        let short = name.rsplit("::").next().unwrap_or(name);
        Self::new(short, render)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, cx: &mut HookContext<'_>, props: &Props) -> Node {
        (self.render)(cx, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Host(Rc<str>),
    Component(Component),
}

impl ElementType {
    pub fn host_name(&self) -> Option<&str> {
        match self {
            ElementType::Host(name) => Some(name),
            ElementType::Component(_) => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Host(name) => f.write_str(name),
            ElementType::Component(component) => write!(f, "<{}>", component.name()),
        }
    }
}

#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn()>);

impl EventHandler {
    pub fn new(handler: impl Fn() + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self) {
        (self.0)()
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

/// One entry of a `style` prop. Hosts decide how numbers are written out.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleValue {
    Number(f64),
    Str(String),
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        StyleValue::Str(value.to_owned())
    }
}

impl From<String> for StyleValue {
    fn from(value: String) -> Self {
        StyleValue::Str(value)
    }
}

impl From<f64> for StyleValue {
    fn from(value: f64) -> Self {
        StyleValue::Number(value)
    }
}

impl From<i32> for StyleValue {
    fn from(value: i32) -> Self {
        StyleValue::Number(value.into())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Style(IndexMap<String, StyleValue>),
    Handler(EventHandler),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    pub attrs: IndexMap<String, PropValue>,
    pub children: Node,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn children(&self) -> &Node {
        &self.children
    }

    /// Text the children collapse to, when they are a single string.
    pub fn text_children(&self) -> Option<&str> {
        match &self.children {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Shared slot a host instance is written into once its node is committed.
#[derive(Clone, Default)]
pub struct NodeRef {
    slot: Rc<RefCell<Option<Box<dyn Any>>>>,
}

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<I: Clone + 'static>(&self) -> Option<I> {
        self.slot
            .borrow()
            .as_ref()
            .and_then(|value| value.downcast_ref::<I>())
            .cloned()
    }

    pub fn is_attached(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub(crate) fn attach<I: Clone + 'static>(&self, instance: &I) {
        *self.slot.borrow_mut() = Some(Box::new(instance.clone()));
    }

    pub(crate) fn detach(&self) {
        self.slot.borrow_mut().take();
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub ty: ElementType,
    pub key: Option<Key>,
    pub props: Rc<Props>,
    pub node_ref: Option<NodeRef>,
}

impl Element {
    pub fn host(ty: &str) -> ElementBuilder {
        ElementBuilder::new(ElementType::Host(Rc::from(ty)))
    }

    pub fn component(component: &Component) -> ElementBuilder {
        ElementBuilder::new(ElementType::Component(component.clone()))
    }
}

pub struct ElementBuilder {
    ty: ElementType,
    key: Option<Key>,
    props: Props,
    node_ref: Option<NodeRef>,
}

impl ElementBuilder {
    fn new(ty: ElementType) -> Self {
        Self {
            ty,
            key: None,
            props: Props::default(),
            node_ref: None,
        }
    }

    pub fn key(mut self, key: impl AsRef<str>) -> Self {
        self.key = Some(Rc::from(key.as_ref()));
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.props.attrs.insert(name.to_owned(), value.into());
        self
    }

    pub fn style(mut self, name: &str, value: impl Into<StyleValue>) -> Self {
        let entry = self
            .props
            .attrs
            .entry("style".to_owned())
            .or_insert_with(|| PropValue::Style(IndexMap::new()));
        if let PropValue::Style(styles) = entry {
            styles.insert(name.to_owned(), value.into());
        }
        self
    }

    pub fn on(self, event: &str, handler: impl Fn() + 'static) -> Self {
        self.attr(event, EventHandler::new(handler))
    }

    pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
        self.node_ref = Some(node_ref.clone());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.props.children = Node::Text(text.into());
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.props.children = child.into();
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.props.children = Node::List(children.into_iter().collect());
        self
    }

    pub fn build(self) -> Element {
        Element {
            ty: self.ty,
            key: self.key,
            props: Rc::new(self.props),
            node_ref: self.node_ref,
        }
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Self {
        Node::Element(builder.build())
    }
}

/// A child description as produced by a render.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Node {
    #[default]
    Empty,
    Text(String),
    Element(Element),
    List(Vec<Node>),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn list(children: impl IntoIterator<Item = Node>) -> Self {
        Node::List(children.into_iter().collect())
    }

    /// Empty strings render nothing, like null.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Empty => true,
            Node::Text(text) => text.is_empty(),
            Node::Element(_) | Node::List(_) => false,
        }
    }

    /// Splices nested lists into a single level. The reconciler never does
    /// this on its own.
    pub fn flatten(self) -> Node {
        match self {
            Node::List(children) => {
                let mut flat = Vec::with_capacity(children.len());
                flatten_into(children, &mut flat);
                Node::List(flat)
            }
            other => other,
        }
    }
}

fn flatten_into(children: Vec<Node>, out: &mut Vec<Node>) {
    for child in children {
        match child {
            Node::List(nested) => flatten_into(nested, out),
            other => out.push(other),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_owned())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<bool> for Node {
    fn from(_: bool) -> Self {
        Node::Empty
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Node::Empty)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::List(children)
    }
}
