//! The virtual tree: transient descriptions of what the host tree should look like.
//!
//! A [`VNode`] tree is rebuilt on every render and never mutated by the engine.
//! Only the host tree persists between updates.

use crate::component::{Component, ComponentType};
use core::{
	any::{type_name, Any},
	fmt::{self, Debug, Formatter},
	slice,
};
use std::{borrow::Cow, rc::Rc};
use tracing::warn;

/// One node of a virtual tree.
#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
	/// A string or number, rendered as a text node.
	Leaf(Leaf),
	/// A boolean or null child, rendered as an empty text node to keep sibling positions stable.
	Empty,
	/// A tagged element.
	Element(Element),
	/// A stateful or function component.
	Component(ComponentNode),
	/// A nested sequence of children.
	///
	/// Only meaningful as an item of a `children` list, where it is flattened by one level.
	/// Anywhere else (including one level deeper) it is an invalid virtual node.
	List(Vec<VNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
	Text(String),
	Number(f64),
}

impl Leaf {
	/// The content of the text node this leaf renders to.
	#[must_use]
	pub fn to_text(&self) -> Cow<'_, str> {
		match self {
			Leaf::Text(text) => Cow::Borrowed(text),
			Leaf::Number(number) => Cow::Owned(format_number(*number)),
		}
	}
}

/// Formats a number the way a script host would stringify it.
pub(crate) fn format_number(number: f64) -> String {
	if number.is_nan() {
		"NaN".to_owned()
	} else if number.is_infinite() {
		let text = if number > 0.0 { "Infinity" } else { "-Infinity" };
		text.to_owned()
	} else if number == 0.0 {
		// Also covers negative zero.
		"0".to_owned()
	} else if (1e-6..1e21).contains(&number.abs()) {
		number.to_string()
	} else {
		// Both use the shortest digits that round-trip. Script hosts sign positive exponents.
		let text = format!("{:e}", number);
		match text.split_once('e') {
			Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{}e+{}", mantissa, exponent),
			_ => text,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
	pub tag: String,
	pub props: Props,
	pub children: Vec<VNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNode {
	pub component: ComponentType,
	pub props: Props,
	pub children: Vec<VNode>,
}

impl ComponentNode {
	/// The props a component instance or function receives: the declared props plus `children`.
	#[must_use]
	pub fn merged_props(&self) -> Props {
		let mut props = self.props.clone();
		props.insert("children", PropValue::Nodes(self.children.clone()));
		props
	}
}

impl VNode {
	pub fn text(text: impl Into<String>) -> Self {
		VNode::Leaf(Leaf::Text(text.into()))
	}

	#[must_use]
	pub fn number(number: f64) -> Self {
		VNode::Leaf(Leaf::Number(number))
	}

	#[must_use]
	pub fn empty() -> Self {
		VNode::Empty
	}

	pub fn element(tag: impl Into<String>, props: Props, children: impl IntoIterator<Item = VNode>) -> Self {
		VNode::Element(Element {
			tag: tag.into(),
			props,
			children: children.into_iter().collect(),
		})
	}

	/// A stateful component node for `C`.
	pub fn component<C: Component>(props: Props, children: impl IntoIterator<Item = VNode>) -> Self {
		VNode::Component(ComponentNode {
			component: ComponentType::stateful::<C>(),
			props,
			children: children.into_iter().collect(),
		})
	}

	/// A function component node.
	pub fn function(component: ComponentType, props: Props, children: impl IntoIterator<Item = VNode>) -> Self {
		VNode::Component(ComponentNode {
			component,
			props,
			children: children.into_iter().collect(),
		})
	}

	pub fn list(items: impl IntoIterator<Item = VNode>) -> Self {
		VNode::List(items.into_iter().collect())
	}

	/// The explicit reconciliation key, if this node declares a usable one.
	#[must_use]
	pub fn key(&self) -> Option<String> {
		match self {
			VNode::Element(Element { props, .. }) | VNode::Component(ComponentNode { props, .. }) => props.key(),
			VNode::Leaf(_) | VNode::Empty | VNode::List(_) => None,
		}
	}

	/// The text content this node renders to, if it renders to a text node directly.
	#[must_use]
	pub fn text_content(&self) -> Option<Cow<'_, str>> {
		match self {
			VNode::Leaf(leaf) => Some(leaf.to_text()),
			VNode::Empty => Some(Cow::Borrowed("")),
			VNode::Element(_) | VNode::Component(_) | VNode::List(_) => None,
		}
	}
}

/// Builds an element node, the plain tree-construction call.
pub fn h(tag: impl Into<String>, props: Props, children: impl IntoIterator<Item = VNode>) -> VNode {
	VNode::element(tag, props, children)
}

/// Iterates `children` with nested [`VNode::List`]s flattened by exactly one level.
pub(crate) fn flatten(children: &[VNode]) -> impl Iterator<Item = &VNode> {
	children.iter().flat_map(|child| match child {
		VNode::List(items) => items.as_slice(),
		other => slice::from_ref(other),
	})
}

impl From<&str> for VNode {
	fn from(text: &str) -> Self {
		VNode::text(text)
	}
}

impl From<String> for VNode {
	fn from(text: String) -> Self {
		VNode::text(text)
	}
}

impl From<f64> for VNode {
	fn from(number: f64) -> Self {
		VNode::number(number)
	}
}

impl From<i32> for VNode {
	fn from(number: i32) -> Self {
		VNode::number(number.into())
	}
}

/// Booleans never render visible content.
impl From<bool> for VNode {
	fn from(_: bool) -> Self {
		VNode::Empty
	}
}

impl<T: Into<VNode>> From<Option<T>> for VNode {
	fn from(value: Option<T>) -> Self {
		value.map_or(VNode::Empty, Into::into)
	}
}

impl From<Vec<VNode>> for VNode {
	fn from(items: Vec<VNode>) -> Self {
		VNode::List(items)
	}
}

/// An ordered property map. Later insertions of an existing name replace the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props(Vec<(String, PropValue)>);

impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
		self.insert(name, value);
		self
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
		let name = name.into();
		let value = value.into();
		match self.0.iter_mut().find(|(existing, _)| *existing == name) {
			Some((_, slot)) => *slot = value,
			None => self.0.push((name, value)),
		}
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&PropValue> {
		self.0.iter().find(|(existing, _)| existing == name).map(|(_, value)| value)
	}

	pub fn remove(&mut self, name: &str) -> Option<PropValue> {
		let index = self.0.iter().position(|(existing, _)| existing == name)?;
		Some(self.0.remove(index).1)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// The usable reconciliation key under `key`, if any.
	#[must_use]
	pub fn key(&self) -> Option<String> {
		self.get("key").and_then(PropValue::as_key)
	}

	/// The `children` merged into a component's props.
	#[must_use]
	pub fn children(&self) -> &[VNode] {
		match self.get("children") {
			Some(PropValue::Nodes(nodes)) => nodes,
			_ => &[],
		}
	}
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
	fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
		let mut props = Props::new();
		for (name, value) in iter {
			props.insert(name, value);
		}
		props
	}
}

/// A property value.
///
/// `Null`, `Map` and `Nodes` count as objects and are never serialized into attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
	Null,
	Bool(bool),
	Number(f64),
	Str(String),
	Map(Props),
	Callback(Callback),
	Nodes(Vec<VNode>),
}

impl PropValue {
	#[must_use]
	pub fn is_callable(&self) -> bool {
		matches!(self, PropValue::Callback(_))
	}

	#[must_use]
	pub fn is_object(&self) -> bool {
		matches!(self, PropValue::Null | PropValue::Map(_) | PropValue::Nodes(_))
	}

	/// The string form of a scalar value.
	#[must_use]
	pub fn as_text(&self) -> Option<Cow<'_, str>> {
		match self {
			PropValue::Str(text) => Some(Cow::Borrowed(text)),
			PropValue::Number(number) => Some(Cow::Owned(format_number(*number))),
			PropValue::Bool(true) => Some(Cow::Borrowed("true")),
			PropValue::Bool(false) => Some(Cow::Borrowed("false")),
			PropValue::Null | PropValue::Map(_) | PropValue::Callback(_) | PropValue::Nodes(_) => None,
		}
	}

	/// Keys only count when truthy; `""`, `0`, `NaN`, `false` and objects fall back to positional matching.
	#[must_use]
	pub fn as_key(&self) -> Option<String> {
		match self {
			PropValue::Str(text) if !text.is_empty() => Some(text.clone()),
			PropValue::Number(number) if *number != 0.0 && !number.is_nan() => Some(format_number(*number)),
			PropValue::Bool(true) => Some("true".to_owned()),
			_ => None,
		}
	}
}

impl From<&str> for PropValue {
	fn from(text: &str) -> Self {
		PropValue::Str(text.to_owned())
	}
}

impl From<String> for PropValue {
	fn from(text: String) -> Self {
		PropValue::Str(text)
	}
}

impl From<bool> for PropValue {
	fn from(value: bool) -> Self {
		PropValue::Bool(value)
	}
}

impl From<f64> for PropValue {
	fn from(number: f64) -> Self {
		PropValue::Number(number)
	}
}

impl From<i32> for PropValue {
	fn from(number: i32) -> Self {
		PropValue::Number(number.into())
	}
}

impl From<Props> for PropValue {
	fn from(map: Props) -> Self {
		PropValue::Map(map)
	}
}

impl From<Callback> for PropValue {
	fn from(callback: Callback) -> Self {
		PropValue::Callback(callback)
	}
}

impl From<Vec<VNode>> for PropValue {
	fn from(nodes: Vec<VNode>) -> Self {
		PropValue::Nodes(nodes)
	}
}

/// A shared callable prop: an event handler (`on*`) or a `ref` callback.
///
/// Event handlers receive the host's event value, `ref` callbacks the host node, both as [`Any`].
/// Equality is identity.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&dyn Any)>);

impl Callback {
	pub fn new(f: impl Fn(&dyn Any) + 'static) -> Self {
		Self(Rc::new(f))
	}

	/// A callback that only reacts to arguments of type `T`.
	pub fn typed<T: 'static>(f: impl Fn(&T) + 'static) -> Self {
		Self::new(move |argument| match argument.downcast_ref::<T>() {
			Some(argument) => f(argument),
			None => warn!("Callback expected a `{}` argument; ignoring the call.", type_name::<T>()),
		})
	}

	pub fn call(&self, argument: &dyn Any) {
		(self.0)(argument);
	}
}

impl PartialEq for Callback {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Debug for Callback {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Callback({:p})", Rc::as_ptr(&self.0))
	}
}
