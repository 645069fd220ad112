//! Element descriptions handed to the reconciler.
//!
//! Elements are immutable once built: every builder method returns a new
//! value and cloning is a reference-count bump. The reconciler only reads
//! them.

use crate::hooks::Hooks;
use crate::ReconcileError;
use std::fmt;
use std::rc::Rc;

/// Identity key that lets the reconciler match children across renders.
pub type Key = Rc<str>;

/// Name of the prop that carries an element's children.
pub const CHILDREN_PROP: &str = "children";

type RenderFn = dyn Fn(&mut Hooks<'_>, &Props) -> Result<Markup, ReconcileError>;

/// A function component. Two components are the same type when they share
/// the same render closure allocation.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new(
        name: impl Into<Rc<str>>,
        render: impl Fn(&mut Hooks<'_>, &Props) -> Result<Markup, ReconcileError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shorthand for `Element::component(self)`.
    pub fn element(&self) -> Element {
        Element::component(self)
    }

    pub(crate) fn render(
        &self,
        hooks: &mut Hooks<'_>,
        props: &Props,
    ) -> Result<Markup, ReconcileError> {
        (self.render)(hooks, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.render), Rc::as_ptr(&other.render))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name)
    }
}

/// Callback stored as a prop value. Compared by identity.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn()>);

impl Handler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) {
        (self.0)()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Handler(Handler),
    Object(Props),
    Node(Markup),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            PropValue::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Interprets the value in child position.
    pub fn to_markup(&self) -> Result<Markup, ReconcileError> {
        match self {
            PropValue::Null | PropValue::Bool(_) => Ok(Markup::Empty),
            PropValue::Int(n) => Ok(Markup::Text(n.to_string().into())),
            PropValue::Float(n) => Ok(Markup::Text(n.to_string().into())),
            PropValue::Str(s) => Ok(Markup::Text(s.clone())),
            PropValue::Node(markup) => Ok(markup.clone()),
            PropValue::Handler(_) => Err(ReconcileError::InvalidChild {
                found: "function".into(),
            }),
            PropValue::Object(props) => Err(ReconcileError::InvalidChild {
                found: format!("object with keys {{{}}}", props.keys().collect::<Vec<_>>().join(", ")),
            }),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
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

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<Handler> for PropValue {
    fn from(value: Handler) -> Self {
        PropValue::Handler(value)
    }
}

impl From<Props> for PropValue {
    fn from(value: Props) -> Self {
        PropValue::Object(value)
    }
}

impl From<Markup> for PropValue {
    fn from(value: Markup) -> Self {
        PropValue::Node(value)
    }
}

impl From<Element> for PropValue {
    fn from(value: Element) -> Self {
        PropValue::Node(Markup::Element(value))
    }
}

/// Ordered prop map. Insertion order is preserved so hosts apply
/// attributes deterministically.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    entries: Rc<Vec<(Rc<str>, PropValue)>>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `name` set to `value`, replacing any previous value.
    pub fn with(mut self, name: impl Into<Rc<str>>, value: impl Into<PropValue>) -> Self {
        let name = name.into();
        let value = value.into();
        let entries = Rc::make_mut(&mut self.entries);
        match entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => entries.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries
            .iter()
            .find(|(existing, _)| &**existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(name, value)| (&**name, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| &**name)
    }

    /// Every prop except `children`.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.iter().filter(|(name, _)| *name != CHILDREN_PROP)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `children` prop in child position; absent children are empty.
    pub fn children(&self) -> Result<Markup, ReconcileError> {
        match self.get(CHILDREN_PROP) {
            Some(value) => value.to_markup(),
            None => Ok(Markup::Empty),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementType {
    Host(Rc<str>),
    Function(Component),
    Fragment,
}

#[derive(Clone, Debug, PartialEq)]
struct ElementData {
    ty: ElementType,
    key: Option<Key>,
    props: Props,
}

/// A typed description of one node of UI.
#[derive(Clone, Debug)]
pub struct Element(Rc<ElementData>);

impl Element {
    pub fn new(ty: ElementType, key: Option<Key>, props: Props) -> Self {
        Self(Rc::new(ElementData { ty, key, props }))
    }

    pub fn host(tag: impl Into<Rc<str>>) -> Self {
        Self::new(ElementType::Host(tag.into()), None, Props::new())
    }

    pub fn component(component: &Component) -> Self {
        Self::new(ElementType::Function(component.clone()), None, Props::new())
    }

    pub fn fragment(children: impl Into<Markup>) -> Self {
        Self::new(
            ElementType::Fragment,
            None,
            Props::new().with(CHILDREN_PROP, PropValue::Node(children.into())),
        )
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        Rc::make_mut(&mut self.0).key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<Rc<str>>, value: impl Into<PropValue>) -> Self {
        let data = Rc::make_mut(&mut self.0);
        data.props = std::mem::take(&mut data.props).with(name, value);
        self
    }

    /// Sets a single child, replacing any previous children.
    pub fn child(self, child: impl Into<Markup>) -> Self {
        self.prop(CHILDREN_PROP, PropValue::Node(child.into()))
    }

    /// Sets the children to an ordered list.
    pub fn children<I>(self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Markup>,
    {
        let list: Vec<Markup> = children.into_iter().map(Into::into).collect();
        self.child(Markup::List(list.into()))
    }

    pub fn text(self, text: impl Into<Rc<str>>) -> Self {
        self.child(Markup::Text(text.into()))
    }

    pub fn ty(&self) -> &ElementType {
        &self.0.ty
    }

    pub fn key_ref(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub(crate) fn is_unkeyed_fragment(&self) -> bool {
        self.0.key.is_none() && matches!(self.0.ty, ElementType::Fragment)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

/// What a component renders and what a root displays.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Markup {
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Element),
    List(Rc<[Markup]>),
}

impl Markup {
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Markup>,
    {
        Markup::List(items.into_iter().map(Into::into).collect::<Vec<_>>().into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Markup::Empty)
    }
}

impl From<Element> for Markup {
    fn from(value: Element) -> Self {
        Markup::Element(value)
    }
}

impl From<&str> for Markup {
    fn from(value: &str) -> Self {
        Markup::Text(value.into())
    }
}

impl From<String> for Markup {
    fn from(value: String) -> Self {
        Markup::Text(value.into())
    }
}

impl From<Rc<str>> for Markup {
    fn from(value: Rc<str>) -> Self {
        Markup::Text(value)
    }
}

impl From<i64> for Markup {
    fn from(value: i64) -> Self {
        Markup::Text(value.to_string().into())
    }
}

impl From<i32> for Markup {
    fn from(value: i32) -> Self {
        Markup::Text(value.to_string().into())
    }
}

impl From<usize> for Markup {
    fn from(value: usize) -> Self {
        Markup::Text(value.to_string().into())
    }
}

impl From<f64> for Markup {
    fn from(value: f64) -> Self {
        Markup::Text(value.to_string().into())
    }
}

impl From<Vec<Markup>> for Markup {
    fn from(value: Vec<Markup>) -> Self {
        Markup::List(value.into())
    }
}

impl<T: Into<Markup>> From<Option<T>> for Markup {
    fn from(value: Option<T>) -> Self {
        value.map_or(Markup::Empty, Into::into)
    }
}

#[cfg(test)]
#[path = "tests/element_tests.rs"]
mod tests;
