use twig_dom::{
	h,
	host::HostAdapter,
	memory::{MemoryHost, NodeId},
	Props, Renderer, VNode,
};

fn row(key: &str) -> VNode {
	h(
		"li",
		Props::new().with("key", key),
		[h("input", Props::new().with("value", key), [])],
	)
}

fn setup(keys: &[&str]) -> (Renderer<MemoryHost>, NodeId) {
	let renderer = Renderer::new(MemoryHost::new());
	let root = renderer.host().root();
	let ul = renderer
		.render(&h("ul", Props::new(), keys.iter().map(|key| row(key))), Some(&root))
		.unwrap();
	(renderer, ul)
}

fn input_of(renderer: &Renderer<MemoryHost>, ul: NodeId, index: usize) -> NodeId {
	let host = renderer.host();
	host.child_nodes(host.child_nodes(ul)[index])[0]
}

#[test]
fn focus_survives_keyed_moves() {
	let (renderer, ul) = setup(&["a", "b"]);
	let input = input_of(&renderer, ul, 1);
	renderer.with_host(|host| host.focus(&input)).unwrap();

	renderer
		.patch(&ul, &h("ul", Props::new(), [row("b"), row("a"), row("c")]))
		.unwrap();

	assert_eq!(input_of(&renderer, ul, 0), input);
	assert_eq!(renderer.host().focused(), Some(input));
}

#[test]
fn focus_is_lost_with_its_node() {
	let (renderer, ul) = setup(&["a", "b"]);
	let input = input_of(&renderer, ul, 1);
	renderer.with_host(|host| host.focus(&input)).unwrap();

	renderer.patch(&ul, &h("ul", Props::new(), [row("a")])).unwrap();

	assert_eq!(renderer.host().focused(), None);
}

#[test]
fn nothing_focused_stays_unfocused() {
	let (renderer, ul) = setup(&["a"]);

	renderer.patch(&ul, &h("ul", Props::new(), [row("b")])).unwrap();

	assert_eq!(renderer.host().focused(), None);
}
