//! A host adapter over a browser document.
//!
//! Event handlers receive the `web_sys::Event` as argument, so they're most conveniently written with
//! [`Callback::typed::<web_sys::Event>`](`Callback::typed`).

use crate::{
	closure_map::ClosureMap,
	host::{HostAdapter, LiveField, NodeKind},
	vnode::{Callback, PropValue},
};
use core::{
	cell::Cell,
	hash::{Hash, Hasher},
};
use js_sys::{Object, Reflect, WeakMap};
use tracing::{trace, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, HtmlElement, Node};

/// A DOM node together with the identity this host assigned to it.
#[derive(Debug, Clone)]
pub struct WebNode {
	id: u32,
	node: Node,
}

impl WebNode {
	#[must_use]
	pub fn as_node(&self) -> &Node {
		&self.node
	}
}

impl PartialEq for WebNode {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for WebNode {}

impl Hash for WebNode {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

#[derive(Debug)]
pub struct WebHost {
	document: Document,
	ids: WeakMap,
	next_id: Cell<u32>,
	closures: ClosureMap,
}

fn not_an_element() -> JsValue {
	JsValue::from_str("Expected an element.")
}

fn to_js(value: &PropValue) -> JsValue {
	match value {
		PropValue::Bool(value) => JsValue::from_bool(*value),
		PropValue::Number(number) => JsValue::from_f64(*number),
		PropValue::Str(text) => JsValue::from_str(text),
		PropValue::Null | PropValue::Map(_) | PropValue::Callback(_) | PropValue::Nodes(_) => JsValue::NULL,
	}
}

impl WebHost {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self {
			document,
			ids: WeakMap::new(),
			next_id: Cell::new(0),
			closures: ClosureMap::default(),
		}
	}

	/// Looks up (or assigns) the identity of `node`.
	///
	/// The same DOM node always maps to equal [`WebNode`]s for the lifetime of this host.
	#[must_use]
	pub fn node(&self, node: Node) -> WebNode {
		let object: &Object = node.as_ref();
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let id = match self.ids.get(object).as_f64() {
			Some(id) => id as u32,
			None => {
				let id = self.next_id.get();
				self.next_id.set(id + 1);
				self.ids.set(object, &JsValue::from(id));
				id
			}
		};
		WebNode { id, node }
	}

	/// How many listener closures are currently kept alive.
	#[must_use]
	pub fn published_listeners(&self) -> usize {
		self.closures.len()
	}

	fn element(node: &WebNode) -> Result<&web_sys::Element, JsValue> {
		node.node.dyn_ref::<web_sys::Element>().ok_or_else(not_an_element)
	}
}

impl HostAdapter for WebHost {
	type Node = WebNode;
	type Error = JsValue;

	fn create_text(&mut self, text: &str) -> Result<WebNode, JsValue> {
		let text = self.document.create_text_node(text);
		Ok(self.node(text.into()))
	}

	fn create_element(&mut self, tag: &str) -> Result<WebNode, JsValue> {
		let element = self.document.create_element(tag)?;
		Ok(self.node(element.into()))
	}

	fn kind(&self, node: &WebNode) -> NodeKind {
		if node.node.node_type() == Node::TEXT_NODE {
			NodeKind::Text(node.node.text_content().unwrap_or_default())
		} else {
			NodeKind::Element(node.node.node_name())
		}
	}

	fn parent(&self, node: &WebNode) -> Option<WebNode> {
		node.node.parent_node().map(|parent| self.node(parent))
	}

	fn children(&self, node: &WebNode) -> Vec<WebNode> {
		let child_nodes = node.node.child_nodes();
		(0..child_nodes.length())
			.filter_map(|i| child_nodes.get(i))
			.map(|child| self.node(child))
			.collect()
	}

	fn append_child(&mut self, parent: &WebNode, child: &WebNode) -> Result<(), JsValue> {
		parent.node.append_child(&child.node).map(drop)
	}

	fn remove_child(&mut self, parent: &WebNode, child: &WebNode) -> Result<(), JsValue> {
		parent.node.remove_child(&child.node).map(drop)
	}

	fn replace_child(&mut self, parent: &WebNode, new_child: &WebNode, old_child: &WebNode) -> Result<(), JsValue> {
		parent.node.replace_child(&new_child.node, &old_child.node).map(drop)
	}

	fn clear_children(&mut self, parent: &WebNode) -> Result<(), JsValue> {
		parent.node.set_text_content(None);
		Ok(())
	}

	fn attribute(&self, node: &WebNode, name: &str) -> Option<String> {
		Self::element(node).ok()?.get_attribute(name)
	}

	fn attribute_names(&self, node: &WebNode) -> Vec<String> {
		match Self::element(node) {
			Ok(element) => element.get_attribute_names().iter().filter_map(|name| name.as_string()).collect(),
			Err(_) => Vec::new(),
		}
	}

	fn set_attribute(&mut self, node: &WebNode, name: &str, value: &str) -> Result<(), JsValue> {
		Self::element(node)?.set_attribute(name, value)
	}

	fn remove_attribute(&mut self, node: &WebNode, name: &str) -> Result<(), JsValue> {
		Self::element(node)?.remove_attribute(name)
	}

	/// Assigns each entry onto the element's style declaration by property name (camel case, as in scripts).
	fn merge_style(&mut self, node: &WebNode, entries: &[(String, String)]) -> Result<(), JsValue> {
		let element = node.node.dyn_ref::<HtmlElement>().ok_or_else(not_an_element)?;
		let style = element.style();
		for (property, value) in entries {
			if !Reflect::set(&style, &JsValue::from_str(property), &JsValue::from_str(value))? {
				warn!(property = property.as_str(), "Style property was not assigned.");
			}
		}
		Ok(())
	}

	fn set_live_field(&mut self, node: &WebNode, field: LiveField, value: &PropValue) -> Result<(), JsValue> {
		Reflect::set(&node.node, &JsValue::from_str(field.prop_name()), &to_js(value)).map(drop)
	}

	fn add_listener(&mut self, node: &WebNode, event_type: &str, handler: &Callback) -> Result<(), JsValue> {
		let (function, previous) = self.closures.publish(node.id, event_type, handler);
		if let Some(previous) = previous {
			node.node
				.remove_event_listener_with_callback(event_type, previous.as_ref().unchecked_ref())?;
		}
		node.node.add_event_listener_with_callback(event_type, &function)
	}

	fn remove_listener(&mut self, node: &WebNode, event_type: &str, _handler: &Callback) -> Result<(), JsValue> {
		match self.closures.unpublish(node.id, event_type) {
			Some(closure) => node
				.node
				.remove_event_listener_with_callback(event_type, closure.as_ref().unchecked_ref()),
			None => {
				trace!(event_type, "No listener to remove.");
				Ok(())
			}
		}
	}

	fn focused(&self) -> Option<WebNode> {
		let active: Node = self.document.active_element()?.into();
		Some(self.node(active))
	}

	fn focus(&mut self, node: &WebNode) -> Result<(), JsValue> {
		match node.node.dyn_ref::<HtmlElement>() {
			Some(element) => element.focus(),
			None => Ok(()),
		}
	}
}
