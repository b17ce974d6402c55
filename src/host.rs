//! The host tree, as seen by the engine.
//!
//! The engine never owns host nodes. It drives an implementation of [`HostAdapter`] supplied by the embedding
//! environment: [`MemoryHost`](`crate::memory::MemoryHost`) for headless use and tests,
//! [`WebHost`](`crate::web::WebHost`) for a browser document.

use crate::vnode::{Callback, PropValue};
use core::{fmt::Debug, hash::Hash};

/// What a host node currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	/// A text node and its current content.
	Text(String),
	/// An element (or any other non-text node) and its node name.
	Element(String),
}

/// Host-node fields that are set directly instead of being serialized into attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveField {
	Checked,
	Value,
	ClassName,
}

impl LiveField {
	#[must_use]
	pub fn from_prop_name(name: &str) -> Option<Self> {
		match name {
			"checked" => Some(LiveField::Checked),
			"value" => Some(LiveField::Value),
			"className" => Some(LiveField::ClassName),
			_ => None,
		}
	}

	#[must_use]
	pub fn prop_name(self) -> &'static str {
		match self {
			LiveField::Checked => "checked",
			LiveField::Value => "value",
			LiveField::ClassName => "className",
		}
	}
}

/// The tree-mutation primitives the engine consumes.
///
/// `Node` is a cheap handle whose equality is node identity.
pub trait HostAdapter {
	type Node: Clone + Eq + Hash + Debug + 'static;
	type Error: Debug;

	fn create_text(&mut self, text: &str) -> Result<Self::Node, Self::Error>;
	fn create_element(&mut self, tag: &str) -> Result<Self::Node, Self::Error>;

	fn kind(&self, node: &Self::Node) -> NodeKind;
	fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
	fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

	/// Appends `child` as last child of `parent`, first detaching it from wherever it currently is.
	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;
	fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;
	/// Puts `new_child` at the position of `old_child`, which is detached.
	fn replace_child(&mut self, parent: &Self::Node, new_child: &Self::Node, old_child: &Self::Node) -> Result<(), Self::Error>;
	/// Removes all content under `parent`.
	fn clear_children(&mut self, parent: &Self::Node) -> Result<(), Self::Error>;
	/// Called once the engine has detached `node` and won't touch its subtree again.
	///
	/// Hosts whose nodes are garbage collected can ignore this.
	fn discard(&mut self, _node: &Self::Node) {}

	fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
	fn attribute_names(&self, node: &Self::Node) -> Vec<String>;
	fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), Self::Error>;
	fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), Self::Error>;

	/// Merges `entries` into the node's style. Properties not listed are kept.
	fn merge_style(&mut self, node: &Self::Node, entries: &[(String, String)]) -> Result<(), Self::Error>;
	fn set_live_field(&mut self, node: &Self::Node, field: LiveField, value: &PropValue) -> Result<(), Self::Error>;

	fn add_listener(&mut self, node: &Self::Node, event_type: &str, handler: &Callback) -> Result<(), Self::Error>;
	fn remove_listener(&mut self, node: &Self::Node, event_type: &str, handler: &Callback) -> Result<(), Self::Error>;

	fn focused(&self) -> Option<Self::Node>;
	fn focus(&mut self, node: &Self::Node) -> Result<(), Self::Error>;
}
