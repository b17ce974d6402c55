//! Reading existing host content back into virtual nodes.

use crate::{
	host::{HostAdapter, NodeKind},
	vnode::{Element, PropValue, Props, VNode},
};

/// Builds a virtual tree mirroring the host subtree at `node`.
///
/// Elements keep their (lower-cased) node name and their attributes as string props, `style` and `class` included.
/// Live fields and listeners aren't attributes and aren't captured.
pub fn load_node<H: HostAdapter>(host: &H, node: &H::Node) -> VNode {
	match host.kind(node) {
		NodeKind::Text(text) => VNode::text(text),
		NodeKind::Element(name) => VNode::Element(load_element(host, node, &name)),
	}
}

pub fn load_element<H: HostAdapter>(host: &H, node: &H::Node, name: &str) -> Element {
	Element {
		tag: name.to_ascii_lowercase(),
		props: load_attributes(host, node),
		children: load_child_nodes(host, node),
	}
}

pub fn load_child_nodes<H: HostAdapter>(host: &H, node: &H::Node) -> Vec<VNode> {
	host.children(node).iter().map(|child| load_node(host, child)).collect()
}

pub fn load_attributes<H: HostAdapter>(host: &H, node: &H::Node) -> Props {
	host.attribute_names(node)
		.into_iter()
		.filter_map(|name| {
			let value = host.attribute(node, &name)?;
			Some((name, PropValue::Str(value)))
		})
		.collect()
}
