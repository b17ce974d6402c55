use twig_dom::{
	h,
	host::HostAdapter,
	memory::{MemoryHost, NodeId},
	PropValue, Props, Renderer, VNode,
};

fn setup() -> (Renderer<MemoryHost>, NodeId) {
	let renderer = Renderer::new(MemoryHost::new());
	let root = renderer.host().root();
	(renderer, root)
}

fn item(key: &str, class: &str) -> VNode {
	h("li", Props::new().with("key", key).with("class", class), [VNode::text(key)])
}

fn list(items: impl IntoIterator<Item = VNode>) -> VNode {
	h("ul", Props::new(), items)
}

#[test]
fn keyed_identity_is_preserved() {
	let (renderer, root) = setup();
	let ul = renderer.render(&list([item("a", "old"), item("b", "old")]), Some(&root)).unwrap();
	let (a, b) = match renderer.host().child_nodes(ul) {
		&[a, b] => (a, b),
		other => panic!("Unexpected children {:?}", other),
	};

	assert_eq!(renderer.patch(&ul, &list([item("a", "new"), item("c", "new")])), Some(ul));

	let children = renderer.host().child_nodes(ul).to_vec();
	assert_eq!(children.len(), 2);
	assert_eq!(children[0], a, "`a` was patched, not recreated.");
	assert_ne!(children[1], b);
	assert_eq!(renderer.host().attribute(&a, "class").as_deref(), Some("new"));
	assert_eq!(renderer.host().parent(&b), None);
	assert_eq!(renderer.key_of(&children[1]).as_deref(), Some("c"));
	assert_eq!(renderer.key_of(&b), None, "Removed nodes are forgotten.");
	assert_eq!(
		renderer.host().to_markup(ul),
		r#"<ul><li class="new">a</li><li class="new">c</li></ul>"#
	);
}

#[test]
fn keyed_reorder_moves_nodes() {
	let (renderer, root) = setup();
	let ul = renderer
		.render(&list([item("a", ""), item("b", ""), item("c", "")]), Some(&root))
		.unwrap();
	let before = renderer.host().child_nodes(ul).to_vec();

	renderer.patch(&ul, &list([item("c", ""), item("a", ""), item("b", "")])).unwrap();

	assert_eq!(renderer.host().child_nodes(ul), &[before[2], before[0], before[1]]);
}

/// Unkeyed children match by position only, so an insertion at the front shifts identities.
#[test]
fn unkeyed_children_match_by_position() {
	let (renderer, root) = setup();
	let li = |text: &str| h("li", Props::new(), [VNode::text(text)]);
	let ul = renderer.render(&list([li("a"), li("b")]), Some(&root)).unwrap();
	let before = renderer.host().child_nodes(ul).to_vec();

	renderer.patch(&ul, &list([li("new"), li("a"), li("b")])).unwrap();

	let after = renderer.host().child_nodes(ul).to_vec();
	assert_eq!(after[..2], before[..]);
	assert!(!before.contains(&after[2]));
	assert_eq!(
		renderer.host().to_markup(ul),
		"<ul><li>new</li><li>a</li><li>b</li></ul>"
	);
}

#[test]
fn duplicate_existing_keys_keep_the_last() {
	let (renderer, root) = setup();
	let ul = renderer.render(&list([item("x", ""), item("y", "")]), Some(&root)).unwrap();
	let (first, second) = match renderer.host().child_nodes(ul) {
		&[first, second] => (first, second),
		other => panic!("Unexpected children {:?}", other),
	};
	renderer.apply_prop(&second, "key", &PropValue::from("x"));

	renderer.patch(&ul, &list([item("x", "kept")])).unwrap();

	assert_eq!(renderer.host().child_nodes(ul), &[second]);
	assert_eq!(renderer.host().parent(&first), None);
}

#[test]
fn duplicate_new_keys_mount_fresh_nodes() {
	let (renderer, root) = setup();
	let ul = renderer.render(&list([item("x", ""), item("y", "")]), Some(&root)).unwrap();
	let x = renderer.host().child_nodes(ul)[0];

	renderer.patch(&ul, &list([item("x", "1"), item("x", "2")])).unwrap();

	let children = renderer.host().child_nodes(ul).to_vec();
	assert_eq!(children.len(), 2);
	assert_eq!(children[0], x);
	assert_eq!(
		renderer.host().to_markup(ul),
		r#"<ul><li class="1">x</li><li class="2">x</li></ul>"#
	);
}

#[test]
fn only_truthy_keys_count() {
	let (renderer, _) = setup();
	for (key, expected) in [
		(PropValue::from(""), None),
		(PropValue::from(0), None),
		(PropValue::from(f64::NAN), None),
		(PropValue::from(false), None),
		(PropValue::from(1), Some("1")),
		(PropValue::from("k"), Some("k")),
	] {
		let node = renderer.render(&h("i", Props::new().with("key", key), []), None).unwrap();
		assert_eq!(renderer.key_of(&node).as_deref(), expected);
		assert!(renderer.host().attributes(node).is_empty(), "`key` is never an attribute.");
	}
}
