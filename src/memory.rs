//! A host tree that lives entirely in memory.
//!
//! [`MemoryHost`] behaves like a minimal document: nodes have one parent at most, appending a node moves it,
//! and moving or removing the focused node (or an ancestor of it) drops focus, as a browser would.
//! `style` and `class` are ordinary attributes, so clearing attributes clears them too.
//! It also keeps a count of mutations, which makes it convenient for asserting what a patch touched.
//!
//! Discarded detached subtrees are freed. A [`NodeId`] that outlived its node doesn't resolve to whatever
//! reuses its slot.

use crate::{
	host::{HostAdapter, LiveField, NodeKind},
	vnode::{Callback, PropValue},
};
use core::fmt::Write as _;
use hashbrown::HashMap;
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;
use tracing::trace;

new_key_type! {
	/// A node in a [`MemoryHost`].
	pub struct NodeId;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryHostError {
	#[error("Unknown node {0:?}")]
	UnknownNode(NodeId),
	#[error("{0:?} is not an element")]
	NotAnElement(NodeId),
	#[error("{child:?} is not a child of {parent:?}")]
	NotAChild { parent: NodeId, child: NodeId },
	#[error("{child:?} can't be inserted into its own subtree at {parent:?}")]
	HierarchyRequest { parent: NodeId, child: NodeId },
	#[error("Invalid tag name {0:?}")]
	InvalidTagName(String),
}

#[derive(Debug)]
enum Content {
	Text(String),
	Element(String),
}

#[derive(Debug)]
struct NodeData {
	content: Content,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	attributes: Vec<(String, String)>,
	live_fields: HashMap<LiveField, PropValue>,
	listeners: Vec<(String, Callback)>,
}

impl NodeData {
	fn new(content: Content) -> Self {
		Self {
			content,
			parent: None,
			children: Vec::new(),
			attributes: Vec::new(),
			live_fields: HashMap::new(),
			listeners: Vec::new(),
		}
	}

	fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|(attribute, _)| attribute == name)
			.map(|(_, value)| value.as_str())
	}

	fn set_attribute(&mut self, name: &str, value: String) {
		match self.attributes.iter_mut().find(|(attribute, _)| attribute == name) {
			Some((_, existing)) => *existing = value,
			None => self.attributes.push((name.to_owned(), value)),
		}
	}

	fn remove_attribute(&mut self, name: &str) {
		self.attributes.retain(|(attribute, _)| attribute != name);
	}
}

/// Splits a `style` attribute into its declarations.
fn parse_style(style: &str) -> Vec<(String, String)> {
	style
		.split(';')
		.filter_map(|declaration| {
			let (property, value) = declaration.split_once(':')?;
			let property = property.trim();
			(!property.is_empty()).then(|| (property.to_owned(), value.trim().to_owned()))
		})
		.collect()
}

fn serialize_style(declarations: &[(String, String)]) -> String {
	let mut style = String::new();
	for (property, value) in declarations {
		if !style.is_empty() {
			style.push(' ');
		}
		let _ = write!(style, "{}: {};", property, value);
	}
	style
}

#[derive(Debug)]
pub struct MemoryHost {
	nodes: SlotMap<NodeId, NodeData>,
	root: NodeId,
	focused: Option<NodeId>,
	mutations: usize,
}

impl Default for MemoryHost {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryHost {
	/// Creates a host whose document root is a `body` element.
	#[must_use]
	pub fn new() -> Self {
		let mut nodes = SlotMap::with_key();
		let root = nodes.insert(NodeData::new(Content::Element("body".to_owned())));
		Self {
			nodes,
			root,
			focused: None,
			mutations: 0,
		}
	}

	#[must_use]
	pub fn root(&self) -> NodeId {
		self.root
	}

	fn get(&self, id: NodeId) -> Option<&NodeData> {
		self.nodes.get(id)
	}

	fn node(&self, id: NodeId) -> Result<&NodeData, MemoryHostError> {
		self.get(id).ok_or(MemoryHostError::UnknownNode(id))
	}

	fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, MemoryHostError> {
		self.nodes.get_mut(id).ok_or(MemoryHostError::UnknownNode(id))
	}

	fn element_mut(&mut self, id: NodeId) -> Result<&mut NodeData, MemoryHostError> {
		let node = self.node_mut(id)?;
		match node.content {
			Content::Element(_) => Ok(node),
			Content::Text(_) => Err(MemoryHostError::NotAnElement(id)),
		}
	}

	fn insert(&mut self, content: Content) -> NodeId {
		self.mutations += 1;
		self.nodes.insert(NodeData::new(content))
	}

	/// Frees `id` and everything below it.
	fn free(&mut self, id: NodeId) {
		let mut pending = vec![id];
		while let Some(id) = pending.pop() {
			if let Some(data) = self.nodes.remove(id) {
				if self.focused == Some(id) {
					self.focused = None;
				}
				pending.extend(data.children);
			}
		}
	}

	/// How many nodes (the root included) this host currently holds.
	#[must_use]
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Whether `node` is `ancestor` or lies below it.
	#[must_use]
	pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
		let mut current = Some(node);
		while let Some(id) = current {
			if id == ancestor {
				return true;
			}
			current = self.get(id).and_then(|node| node.parent);
		}
		false
	}

	/// Whether `node` is attached (indirectly) to the document root.
	#[must_use]
	pub fn is_connected(&self, node: NodeId) -> bool {
		self.is_inclusive_descendant(node, self.root)
	}

	fn detach(&mut self, child: NodeId) -> Result<(), MemoryHostError> {
		if let Some(parent) = self.node(child)?.parent {
			self.node_mut(parent)?.children.retain(|&sibling| sibling != child);
			self.node_mut(child)?.parent = None;
		}
		if let Some(focused) = self.focused {
			if self.is_inclusive_descendant(focused, child) {
				trace!(?focused, "Focused node detached; dropping focus.");
				self.focused = None;
			}
		}
		Ok(())
	}

	fn check_hierarchy(&self, parent: NodeId, child: NodeId) -> Result<(), MemoryHostError> {
		if self.is_inclusive_descendant(parent, child) {
			Err(MemoryHostError::HierarchyRequest { parent, child })
		} else {
			Ok(())
		}
	}

	#[must_use]
	pub fn text(&self, node: NodeId) -> Option<&str> {
		match &self.get(node)?.content {
			Content::Text(text) => Some(text),
			Content::Element(_) => None,
		}
	}

	#[must_use]
	pub fn tag(&self, node: NodeId) -> Option<&str> {
		match &self.get(node)?.content {
			Content::Element(tag) => Some(tag),
			Content::Text(_) => None,
		}
	}

	#[must_use]
	pub fn child_nodes(&self, node: NodeId) -> &[NodeId] {
		self.get(node).map_or(&[], |node| &node.children)
	}

	#[must_use]
	pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
		self.get(node).map_or(&[], |node| &node.attributes)
	}

	/// The value of one property in the node's `style` attribute.
	#[must_use]
	pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
		parse_style(self.get(node)?.attribute("style")?)
			.into_iter()
			.find(|(name, _)| name == property)
			.map(|(_, value)| value)
	}

	#[must_use]
	pub fn live_field(&self, node: NodeId, field: LiveField) -> Option<&PropValue> {
		self.get(node)?.live_fields.get(&field)
	}

	/// The handlers currently attached to `node` for `event_type`.
	#[must_use]
	pub fn listeners(&self, node: NodeId, event_type: &str) -> Vec<Callback> {
		self.get(node).map_or_else(Vec::new, |node| {
			node.listeners
				.iter()
				.filter(|(attached, _)| attached == event_type)
				.map(|(_, handler)| handler.clone())
				.collect()
		})
	}

	/// How many tree mutations (creations included) this host has performed.
	#[must_use]
	pub fn mutation_count(&self) -> usize {
		self.mutations
	}

	/// Serializes the subtree at `node` as markup, for assertions.
	///
	/// Attributes appear in the order they were first set. Live fields and listeners are not included.
	#[must_use]
	pub fn to_markup(&self, node: NodeId) -> String {
		let mut markup = String::new();
		self.write_markup(node, &mut markup);
		markup
	}

	fn write_markup(&self, node: NodeId, markup: &mut String) {
		let Some(data) = self.get(node) else {
			return;
		};
		match &data.content {
			Content::Text(text) => markup.push_str(text),
			Content::Element(tag) => {
				markup.push('<');
				markup.push_str(tag);
				for (name, value) in &data.attributes {
					let _ = write!(markup, " {}={:?}", name, value);
				}
				markup.push('>');
				for &child in &data.children {
					self.write_markup(child, markup);
				}
				let _ = write!(markup, "</{}>", tag);
			}
		}
	}
}

impl HostAdapter for MemoryHost {
	type Node = NodeId;
	type Error = MemoryHostError;

	fn create_text(&mut self, text: &str) -> Result<NodeId, MemoryHostError> {
		Ok(self.insert(Content::Text(text.to_owned())))
	}

	fn create_element(&mut self, tag: &str) -> Result<NodeId, MemoryHostError> {
		if tag.is_empty() || tag.chars().any(char::is_whitespace) {
			return Err(MemoryHostError::InvalidTagName(tag.to_owned()));
		}
		Ok(self.insert(Content::Element(tag.to_owned())))
	}

	fn kind(&self, node: &NodeId) -> NodeKind {
		match self.get(*node).map(|node| &node.content) {
			Some(Content::Text(text)) => NodeKind::Text(text.clone()),
			Some(Content::Element(tag)) => NodeKind::Element(tag.clone()),
			None => NodeKind::Element(String::new()),
		}
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.get(*node)?.parent
	}

	fn children(&self, node: &NodeId) -> Vec<NodeId> {
		self.child_nodes(*node).to_vec()
	}

	fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), MemoryHostError> {
		self.element_mut(*parent)?;
		self.check_hierarchy(*parent, *child)?;
		self.detach(*child)?;
		self.mutations += 1;
		self.node_mut(*parent)?.children.push(*child);
		self.node_mut(*child)?.parent = Some(*parent);
		Ok(())
	}

	fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), MemoryHostError> {
		if self.node(*child)?.parent != Some(*parent) {
			return Err(MemoryHostError::NotAChild { parent: *parent, child: *child });
		}
		self.mutations += 1;
		self.detach(*child)
	}

	fn replace_child(&mut self, parent: &NodeId, new_child: &NodeId, old_child: &NodeId) -> Result<(), MemoryHostError> {
		if new_child == old_child {
			return Ok(());
		}
		if self.node(*old_child)?.parent != Some(*parent) {
			return Err(MemoryHostError::NotAChild { parent: *parent, child: *old_child });
		}
		self.check_hierarchy(*parent, *new_child)?;
		self.detach(*new_child)?;

		self.mutations += 1;
		let siblings = &mut self.node_mut(*parent)?.children;
		let index = siblings
			.iter()
			.position(|&sibling| sibling == *old_child)
			.ok_or(MemoryHostError::NotAChild { parent: *parent, child: *old_child })?;
		siblings[index] = *new_child;
		self.node_mut(*new_child)?.parent = Some(*parent);
		self.node_mut(*old_child)?.parent = None;
		if let Some(focused) = self.focused {
			if self.is_inclusive_descendant(focused, *old_child) {
				self.focused = None;
			}
		}
		Ok(())
	}

	fn clear_children(&mut self, parent: &NodeId) -> Result<(), MemoryHostError> {
		for child in self.node(*parent)?.children.clone() {
			self.mutations += 1;
			self.detach(child)?;
		}
		Ok(())
	}

	/// Frees `node` and its subtree, unless it is the root or still attached somewhere.
	fn discard(&mut self, node: &NodeId) {
		match self.get(*node) {
			Some(_) if *node == self.root => trace!("Not freeing the document root."),
			Some(data) if data.parent.is_some() => trace!(?node, "Not freeing a node that is still attached."),
			Some(_) => self.free(*node),
			None => (),
		}
	}

	fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
		self.get(*node)?.attribute(name).map(ToOwned::to_owned)
	}

	fn attribute_names(&self, node: &NodeId) -> Vec<String> {
		self.attributes(*node).iter().map(|(name, _)| name.clone()).collect()
	}

	fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), MemoryHostError> {
		self.mutations += 1;
		let element = self.element_mut(*node)?;
		element.set_attribute(name, value.to_owned());
		if name == "class" {
			element.live_fields.insert(LiveField::ClassName, PropValue::Str(value.to_owned()));
		}
		Ok(())
	}

	fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), MemoryHostError> {
		self.mutations += 1;
		let element = self.element_mut(*node)?;
		element.remove_attribute(name);
		if name == "class" {
			element.live_fields.remove(&LiveField::ClassName);
		}
		Ok(())
	}

	fn merge_style(&mut self, node: &NodeId, entries: &[(String, String)]) -> Result<(), MemoryHostError> {
		self.mutations += 1;
		let element = self.element_mut(*node)?;
		let mut declarations = element.attribute("style").map_or_else(Vec::new, parse_style);
		for (property, value) in entries {
			match declarations.iter_mut().find(|(existing, _)| existing == property) {
				Some((_, existing)) => existing.clone_from(value),
				None => declarations.push((property.clone(), value.clone())),
			}
		}
		if !declarations.is_empty() {
			element.set_attribute("style", serialize_style(&declarations));
		}
		Ok(())
	}

	/// Sets a live field. `className` is reflected into the `class` attribute, as in a document.
	fn set_live_field(&mut self, node: &NodeId, field: LiveField, value: &PropValue) -> Result<(), MemoryHostError> {
		self.mutations += 1;
		let element = self.element_mut(*node)?;
		if field == LiveField::ClassName {
			match value.as_text() {
				Some(class) => element.set_attribute("class", class.into_owned()),
				None => element.remove_attribute("class"),
			}
		}
		element.live_fields.insert(field, value.clone());
		Ok(())
	}

	fn add_listener(&mut self, node: &NodeId, event_type: &str, handler: &Callback) -> Result<(), MemoryHostError> {
		self.mutations += 1;
		self.node_mut(*node)?.listeners.push((event_type.to_owned(), handler.clone()));
		Ok(())
	}

	fn remove_listener(&mut self, node: &NodeId, event_type: &str, handler: &Callback) -> Result<(), MemoryHostError> {
		self.mutations += 1;
		let listeners = &mut self.node_mut(*node)?.listeners;
		if let Some(index) = listeners
			.iter()
			.position(|(attached, attached_handler)| attached == event_type && attached_handler == handler)
		{
			listeners.remove(index);
		}
		Ok(())
	}

	fn focused(&self) -> Option<NodeId> {
		self.focused
	}

	/// Focuses `node` if it is a connected element. Otherwise this does nothing, like a browser would.
	fn focus(&mut self, node: &NodeId) -> Result<(), MemoryHostError> {
		if self.tag(*node).is_some() && self.is_connected(*node) {
			self.focused = Some(*node);
		} else {
			trace!(?node, "Ignoring focus on a disconnected or non-element node.");
		}
		Ok(())
	}
}
