//! The engine: mount, patch, keyed child reconciliation and the component runtime glue between them.
//!
//! Host nodes carry no engine state themselves. Reconciliation keys, the component instance rooted at a node and
//! the event handlers bound to it live in a side table keyed by node identity, and are dropped when the engine
//! discards the node.

use crate::{
	component::{ComponentType, Instance, InstanceId, Lifecycle, PendingUpdate, Scheduler},
	diagnostics::{redact, Diagnostic, Diagnostics},
	host::{HostAdapter, NodeKind},
	load,
	vnode::{flatten, Callback, ComponentNode, Element, VNode},
};
use hashbrown::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, instrument, trace, trace_span, warn};

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
	/// How deep mount and patch descend before giving up on a subtree.
	pub depth_limit: usize,
}

impl Default for Options {
	fn default() -> Self {
		Self { depth_limit: 1024 }
	}
}

/// What the engine knows about one host node.
#[derive(Debug, Default)]
pub(crate) struct Annotation {
	pub(crate) key: Option<String>,
	/// The outermost component instance whose base this node is.
	pub(crate) instance: Option<InstanceId>,
	pub(crate) handlers: HashMap<String, Callback>,
}

struct InstanceRecord<N> {
	instance: Rc<dyn Instance>,
	base: Option<N>,
	/// The instance this one rendered directly, which shares its base.
	inner: Option<InstanceId>,
	/// The instance that rendered this one directly.
	outer: Option<InstanceId>,
}

/// A host node now occupying a tree position, and the stateful instance the placed virtual node produced there.
type Placed<N> = (N, Option<InstanceId>);

/// How to bring an existing host node in line with a virtual node.
#[derive(Debug, PartialEq)]
pub(crate) enum Patch<'a> {
	/// Same text: leave the node alone.
	Keep,
	/// Mount the virtual node from scratch and splice it in.
	Replace,
	/// Same tag: reconcile children and reapply props in place.
	Reconcile(&'a Element),
	/// Hand off to the component runtime.
	Component(&'a ComponentNode),
	/// Nothing can be placed.
	Invalid,
}

/// The decision table, evaluated in order.
///
/// `occupied` is whether a stateful instance currently owns `existing` at the level being patched.
pub(crate) fn decide<'a>(existing: &NodeKind, occupied: bool, vnode: &'a VNode) -> Patch<'a> {
	match (existing, vnode) {
		(_, VNode::List(_)) => Patch::Invalid,
		(_, VNode::Component(component)) => Patch::Component(component),
		_ if occupied => Patch::Replace,
		(NodeKind::Text(content), VNode::Leaf(_) | VNode::Empty) => match vnode.text_content() {
			Some(text) if text == content.as_str() => Patch::Keep,
			_ => Patch::Replace,
		},
		(NodeKind::Text(_), VNode::Element(_)) | (NodeKind::Element(_), VNode::Leaf(_) | VNode::Empty) => Patch::Replace,
		(NodeKind::Element(name), VNode::Element(element)) => {
			if name.eq_ignore_ascii_case(&element.tag) {
				Patch::Reconcile(element)
			} else {
				Patch::Replace
			}
		}
	}
}

fn positional_key(index: usize) -> String {
	format!("__index_{}", index)
}

fn is_valid_tag(tag: &str) -> bool {
	!tag.is_empty() && !tag.chars().any(|c| c.is_whitespace() || c == '<' || c == '>')
}

pub(crate) struct Engine<H: HostAdapter> {
	pub(crate) host: H,
	pub(crate) diagnostics: Diagnostics,
	annotations: HashMap<H::Node, Annotation>,
	instances: HashMap<InstanceId, InstanceRecord<H::Node>>,
	next_instance_id: u64,
	options: Options,
	scheduler: Weak<dyn Scheduler>,
}

impl<H: HostAdapter> Engine<H> {
	pub(crate) fn new(host: H, options: Options, scheduler: Weak<dyn Scheduler>) -> Self {
		Self {
			host,
			diagnostics: Diagnostics::default(),
			annotations: HashMap::new(),
			instances: HashMap::new(),
			next_instance_id: 0,
			options,
			scheduler,
		}
	}

	pub(crate) fn annotation_mut(&mut self, node: &H::Node) -> &mut Annotation {
		self.annotations.entry(node.clone()).or_default()
	}

	pub(crate) fn key_of(&self, node: &H::Node) -> Option<String> {
		self.annotations.get(node).and_then(|annotation| annotation.key.clone())
	}

	pub(crate) fn instance_at(&self, node: &H::Node) -> Option<InstanceId> {
		self.annotations.get(node).and_then(|annotation| annotation.instance)
	}

	pub(crate) fn component_at(&self, node: &H::Node) -> Option<&'static str> {
		let id = self.instance_at(node)?;
		self.instances.get(&id).map(|record| record.instance.name())
	}

	pub(crate) fn handler(&self, node: &H::Node, event_type: &str) -> Option<Callback> {
		self.annotations.get(node)?.handlers.get(event_type).cloned()
	}

	pub(crate) fn live_instances(&self) -> usize {
		self.instances.len()
	}

	pub(crate) fn snapshot(&self, node: &H::Node) -> VNode {
		load::load_node(&self.host, node)
	}

	/// Top-level mount. Clears `parent` first (with unmount notification) and appends the result to it.
	#[instrument(skip(self, vnode))]
	pub(crate) fn render(&mut self, vnode: &VNode, parent: Option<&H::Node>) -> Option<H::Node> {
		if let Some(parent) = parent {
			let previous = self.host.children(parent);
			for child in &previous {
				let occupant = self.instance_at(child);
				self.release(child, occupant);
			}
			if let Err(error) = self.host.clear_children(parent) {
				self.diagnostics.host_failure("clear previous content", &error);
			}
			for child in &previous {
				self.host.discard(child);
			}
		}

		let (node, _) = self.mount(vnode, self.options.depth_limit)?;

		if let Some(parent) = parent {
			if let Err(error) = self.host.append_child(parent, &node) {
				self.diagnostics.host_failure("attach the mounted node", &error);
			}
		}
		Some(node)
	}

	/// Top-level patch.
	#[instrument(skip(self, vnode))]
	pub(crate) fn patch(&mut self, node: &H::Node, vnode: &VNode, parent: Option<&H::Node>) -> Option<H::Node> {
		self.patch_node(node, vnode, parent, None, self.options.depth_limit).map(|(node, _)| node)
	}

	/// Top-level reconciliation of an element's children against `element`.
	#[instrument(skip(self, element))]
	pub(crate) fn reconcile(&mut self, node: &H::Node, element: &Element) -> H::Node {
		self.reconcile_children(node, element, self.options.depth_limit)
	}

	/// Removes `node` from its parent, discarding everything the engine knows about its subtree.
	#[instrument(skip(self))]
	pub(crate) fn unmount(&mut self, node: &H::Node) {
		let parent = self.host.parent(node);
		let occupant = self.instance_at(node);
		self.remove(node, parent.as_ref(), occupant);
	}

	/// Creates a detached host subtree for `vnode`.
	fn mount(&mut self, vnode: &VNode, depth_limit: usize) -> Option<Placed<H::Node>> {
		if depth_limit == 0 {
			self.diagnostics.report(Diagnostic::DepthLimitReached { limit: self.options.depth_limit });
			return None;
		}

		match vnode {
			VNode::Leaf(leaf) => {
				let text = leaf.to_text();
				let span = trace_span!("Mounting text", text = redact(&text));
				let _enter = span.enter();
				self.create_text(&text).map(|node| (node, None))
			}
			VNode::Empty => {
				let span = trace_span!("Mounting empty text");
				let _enter = span.enter();
				self.create_text("").map(|node| (node, None))
			}
			VNode::Element(element) => self.mount_element(element, depth_limit).map(|node| (node, None)),
			VNode::Component(component) => self.mount_component(component, depth_limit),
			VNode::List(items) => {
				self.diagnostics.report(Diagnostic::InvalidVirtualNode {
					reason: format!("a nested list of {} node(s) can't be mounted on its own", items.len()),
				});
				None
			}
		}
	}

	fn create_text(&mut self, text: &str) -> Option<H::Node> {
		match self.host.create_text(text) {
			Ok(node) => Some(node),
			Err(error) => {
				self.diagnostics.host_failure("create a text node", &error);
				None
			}
		}
	}

	fn mount_element(&mut self, element: &Element, depth_limit: usize) -> Option<H::Node> {
		let span = trace_span!("Mounting element", tag = element.tag.as_str());
		let _enter = span.enter();

		if !is_valid_tag(&element.tag) {
			self.diagnostics.report(Diagnostic::InvalidVirtualNode {
				reason: format!("{:?} is not a valid tag name", element.tag),
			});
			return None;
		}

		let node = match self.host.create_element(&element.tag) {
			Ok(node) => node,
			Err(error) => {
				self.diagnostics.host_failure("create an element", &error);
				return None;
			}
		};

		for child in flatten(&element.children) {
			if let Some((child_node, _)) = self.mount(child, depth_limit - 1) {
				// Component nodes don't apply their props, so their key is recorded here.
				if let Some(key) = child.key() {
					self.annotation_mut(&child_node).key = Some(key);
				}
				if let Err(error) = self.host.append_child(&node, &child_node) {
					self.diagnostics.host_failure("append a child", &error);
				}
			}
		}

		for (name, value) in element.props.iter() {
			self.apply_prop(&node, name, value);
		}

		Some(node)
	}

	fn mount_component(&mut self, component: &ComponentNode, depth_limit: usize) -> Option<Placed<H::Node>> {
		let span = trace_span!("Mounting component", name = component.component.name());
		let _enter = span.enter();

		let props = component.merged_props();
		match &component.component {
			ComponentType::Functional(functional) => {
				let rendered = functional.call(&props);
				self.mount(&rendered, depth_limit - 1)
			}
			ComponentType::Stateful(stateful) => {
				let id = InstanceId(self.next_instance_id);
				self.next_instance_id += 1;

				let instance = stateful.instantiate(&props, id, Weak::clone(&self.scheduler));
				self.instances.insert(
					id,
					InstanceRecord {
						instance: Rc::clone(&instance),
						base: None,
						inner: None,
						outer: None,
					},
				);

				instance.set_lifecycle(Lifecycle::Mounting);
				instance.will_mount();
				let rendered = instance.render();
				let Some((node, inner)) = self.mount(&rendered, depth_limit - 1) else {
					warn!("`{}` rendered nothing that could be mounted; discarding the instance.", instance.name());
					self.instances.remove(&id);
					instance.set_lifecycle(Lifecycle::Unmounted);
					return None;
				};

				self.rebase(id, &node, inner);
				instance.set_lifecycle(Lifecycle::Mounted);
				instance.did_mount();
				Some((node, Some(id)))
			}
		}
	}

	/// Records `node` as the base of `id` and of every instance rendering it (directly or not), and annotates
	/// the node with the outermost of them.
	fn rebase(&mut self, id: InstanceId, node: &H::Node, inner: Option<InstanceId>) {
		if let Some(record) = self.instances.get_mut(&id) {
			record.base = Some(node.clone());
			record.inner = inner;
		}
		if let Some(inner) = inner.and_then(|inner| self.instances.get_mut(&inner)) {
			inner.outer = Some(id);
		}

		let mut outermost = id;
		while let Some(outer) = self.instances.get(&outermost).and_then(|record| record.outer) {
			match self.instances.get_mut(&outer) {
				Some(record) => record.base = Some(node.clone()),
				None => break,
			}
			outermost = outer;
		}
		self.annotation_mut(node).instance = Some(outermost);
	}

	/// Brings `node` in line with `vnode`, returning whatever now occupies its position.
	///
	/// `owner` is set while patching a stateful instance's own render output.
	fn patch_node(
		&mut self,
		node: &H::Node,
		vnode: &VNode,
		parent: Option<&H::Node>,
		owner: Option<InstanceId>,
		depth_limit: usize,
	) -> Option<Placed<H::Node>> {
		if depth_limit == 0 {
			self.diagnostics.report(Diagnostic::DepthLimitReached { limit: self.options.depth_limit });
			return Some((node.clone(), None));
		}

		let occupant = match owner {
			Some(owner) => self.instances.get(&owner).and_then(|record| record.inner),
			None => self.instance_at(node),
		};

		match decide(&self.host.kind(node), occupant.is_some(), vnode) {
			Patch::Keep => {
				trace!("Text unchanged.");
				Some((node.clone(), None))
			}
			Patch::Replace => self.replace(node, vnode, parent, occupant, depth_limit),
			Patch::Reconcile(element) => Some((self.reconcile_children(node, element, depth_limit), None)),
			Patch::Component(component) => self.patch_component(node, vnode, component, parent, owner, occupant, depth_limit),
			Patch::Invalid => {
				self.diagnostics.report(Diagnostic::InvalidVirtualNode {
					reason: "a nested list can't replace a single node".to_owned(),
				});
				self.remove(node, parent, occupant);
				None
			}
		}
	}

	/// Mounts `vnode` unparented and splices it into `parent` in place of `node`.
	fn replace(
		&mut self,
		node: &H::Node,
		vnode: &VNode,
		parent: Option<&H::Node>,
		occupant: Option<InstanceId>,
		depth_limit: usize,
	) -> Option<Placed<H::Node>> {
		let span = trace_span!("Replacing mismatching node", ?node);
		let _enter = span.enter();

		let key = self.key_of(node);
		let Some(placed) = self.mount(vnode, depth_limit) else {
			self.remove(node, parent, occupant);
			return None;
		};
		if let Some(key) = key {
			self.annotation_mut(&placed.0).key.get_or_insert(key);
		}

		self.release(node, occupant);
		if let Some(parent) = parent {
			if let Err(error) = self.host.replace_child(parent, &placed.0, node) {
				self.diagnostics.host_failure("replace a child", &error);
			}
		}
		self.host.discard(node);
		Some(placed)
	}

	#[allow(clippy::too_many_arguments)]
	fn patch_component(
		&mut self,
		node: &H::Node,
		vnode: &VNode,
		component: &ComponentNode,
		parent: Option<&H::Node>,
		owner: Option<InstanceId>,
		occupant: Option<InstanceId>,
		depth_limit: usize,
	) -> Option<Placed<H::Node>> {
		match &component.component {
			ComponentType::Stateful(stateful) => {
				let same_type = occupant.filter(|id| {
					self.instances
						.get(id)
						.map_or(false, |record| record.instance.component_type() == stateful.type_id())
				});
				match same_type {
					Some(id) => self.update_component(id, node, component, parent, depth_limit),
					None => self.replace(node, vnode, parent, occupant, depth_limit),
				}
			}
			ComponentType::Functional(functional) => {
				if occupant.is_some() {
					return self.replace(node, vnode, parent, occupant, depth_limit);
				}
				let span = trace_span!("Patching function component", name = component.component.name());
				let _enter = span.enter();
				let rendered = functional.call(&component.merged_props());
				self.patch_node(node, &rendered, parent, owner, depth_limit - 1)
			}
		}
	}

	/// Hands new props to a live instance and patches its render output over its base in place.
	fn update_component(
		&mut self,
		id: InstanceId,
		node: &H::Node,
		component: &ComponentNode,
		parent: Option<&H::Node>,
		depth_limit: usize,
	) -> Option<Placed<H::Node>> {
		let instance = Rc::clone(&self.instances.get(&id)?.instance);
		let span = trace_span!("Updating component props", name = instance.name());
		let _enter = span.enter();

		instance.set_lifecycle(Lifecycle::Updating);
		instance.receive_props(component.merged_props());
		let rendered = instance.render();
		let patched = self.patch_node(node, &rendered, parent, Some(id), depth_limit - 1);
		self.settle(id, patched.as_ref());
		if instance.lifecycle() == Lifecycle::Updating {
			instance.set_lifecycle(Lifecycle::Mounted);
		}
		patched.map(|(node, _)| (node, Some(id)))
	}

	/// Follows up on patching the render output of `id`.
	fn settle(&mut self, id: InstanceId, patched: Option<&Placed<H::Node>>) {
		match patched {
			Some((node, inner)) => self.rebase(id, node, *inner),
			None => {
				warn!("A component's render output could not be placed; unmounting it.");
				let mut outermost = id;
				while let Some(outer) = self.instances.get(&outermost).and_then(|record| record.outer) {
					if !self.instances.contains_key(&outer) {
						break;
					}
					outermost = outer;
				}
				self.unmount_chain(Some(outermost));
			}
		}
	}

	/// Runs one accepted-or-not `set_state` against the instance it targets.
	pub(crate) fn apply_update(&mut self, update: PendingUpdate) {
		let PendingUpdate { instance: id, state } = update;
		let Some(record) = self.instances.get(&id) else {
			return debug!("State update for an instance that is gone; dropping it.");
		};
		let instance = Rc::clone(&record.instance);
		let base = record.base.clone();

		let span = trace_span!("Updating component state", name = instance.name());
		let _enter = span.enter();

		let Some(base) = base.filter(|_| instance.lifecycle().accepts_updates()) else {
			trace!("Instance isn't mounted (anymore); assigning state without re-render.");
			return instance.assign_state(state);
		};
		if !instance.should_update(&*state) {
			trace!("Update rejected by `should_update`.");
			return instance.assign_state(state);
		}

		instance.set_lifecycle(Lifecycle::Updating);
		let Some(previous_state) = instance.begin_update(state) else {
			return instance.set_lifecycle(Lifecycle::Mounted);
		};
		let rendered = instance.render();
		let parent = self.host.parent(&base);
		let patched = self.patch_node(&base, &rendered, parent.as_ref(), Some(id), self.options.depth_limit);
		self.settle(id, patched.as_ref());

		if instance.lifecycle() == Lifecycle::Updating {
			instance.set_lifecycle(Lifecycle::Mounted);
			instance.finish_update(previous_state);
		}
	}

	/// Matches the children of `node` against the children of `element` by key, then clears and reapplies
	/// all of `element`'s props. Focus is restored afterwards.
	///
	/// Children without an explicit key match by position only, so inserting or removing unkeyed siblings
	/// anywhere but at the end shifts identity onto the wrong nodes.
	fn reconcile_children(&mut self, node: &H::Node, element: &Element, depth_limit: usize) -> H::Node {
		let span = trace_span!("Reconciling children", tag = element.tag.as_str());
		let _enter = span.enter();

		let focused = self.host.focused();

		let mut pool = HashMap::new();
		let mut shadowed = Vec::new();
		for (index, child) in self.host.children(node).into_iter().enumerate() {
			let key = self.key_of(&child).unwrap_or_else(|| positional_key(index));
			if let Some((_, previous)) = pool.insert(key, (index, child)) {
				warn!("Duplicate key among existing children; the earlier node will be removed.");
				shadowed.push(previous);
			}
		}

		for (index, child) in flatten(&element.children).enumerate() {
			let key = child.key();
			let lookup = key.clone().unwrap_or_else(|| positional_key(index));
			let placed = match pool.remove(&lookup) {
				Some((_, existing)) => {
					trace!("Reusing node for {:?}.", lookup);
					self.patch_node(&existing, child, Some(node), None, depth_limit.saturating_sub(1))
				}
				None => {
					trace!("Mounting new node for {:?}.", lookup);
					self.mount(child, depth_limit.saturating_sub(1))
				}
			};
			if let Some((placed, _)) = placed {
				self.annotation_mut(&placed).key = key;
				if let Err(error) = self.host.append_child(node, &placed) {
					self.diagnostics.host_failure("append a child", &error);
				}
			}
		}

		let mut stale: Vec<_> = pool.into_values().collect();
		stale.sort_by_key(|(index, _)| *index);
		for stale in stale.into_iter().map(|(_, stale)| stale).chain(shadowed) {
			let occupant = self.instance_at(&stale);
			self.remove(&stale, Some(node), occupant);
		}

		for name in self.host.attribute_names(node) {
			if let Err(error) = self.host.remove_attribute(node, &name) {
				self.diagnostics.host_failure("remove an attribute", &error);
			}
		}
		for (name, value) in element.props.iter() {
			self.apply_prop(node, name, value);
		}

		if let Some(focused) = focused {
			if let Err(error) = self.host.focus(&focused) {
				self.diagnostics.host_failure("restore focus", &error);
			}
		}
		node.clone()
	}

	/// Discards `node` (unmount notification first) and detaches it from `parent`.
	fn remove(&mut self, node: &H::Node, parent: Option<&H::Node>, occupant: Option<InstanceId>) {
		self.release(node, occupant);
		if let Some(parent) = parent {
			if let Err(error) = self.host.remove_child(parent, node) {
				self.diagnostics.host_failure("remove a child", &error);
			}
		}
		self.host.discard(node);
	}

	/// Unmounts the instance chain starting at `first`, then everything below `node`, and forgets the subtree.
	/// Doesn't detach anything.
	fn release(&mut self, node: &H::Node, first: Option<InstanceId>) {
		self.unmount_chain(first);

		for child in self.host.children(node) {
			let occupant = self.instance_at(&child);
			self.release(&child, occupant);
		}

		if let Some(annotation) = self.annotations.remove(node) {
			for (event_type, handler) in annotation.handlers {
				if let Err(error) = self.host.remove_listener(node, &event_type, &handler) {
					self.diagnostics.host_failure("remove an event listener", &error);
				}
			}
		}
	}

	fn unmount_chain(&mut self, first: Option<InstanceId>) {
		let mut next = first;
		while let Some(id) = next {
			let Some(record) = self.instances.remove(&id) else {
				break;
			};
			let span = trace_span!("Unmounting component", name = record.instance.name());
			let _enter = span.enter();
			record.instance.set_lifecycle(Lifecycle::Unmounting);
			record.instance.will_unmount();
			record.instance.set_lifecycle(Lifecycle::Unmounted);
			next = record.inner;
		}
	}
}
