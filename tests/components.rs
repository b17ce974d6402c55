use std::cell::RefCell;
use twig_dom::{
	h,
	memory::NodeId,
	Callback, Component, ComponentType, Handle, Lifecycle, PropValue, Props, Renderer, VNode,
};

use logging_host_::{log, take_log, LoggingHost};

thread_local! {
	static COUNTER: RefCell<Option<Handle<Counter>>> = RefCell::new(None);
}

fn counter_handle() -> Handle<Counter> {
	COUNTER.with(|handle| handle.borrow().clone()).expect("No `Counter` was created.")
}

fn setup() -> (Renderer<LoggingHost>, NodeId) {
	let renderer = Renderer::new(LoggingHost::default());
	let root = renderer.host().root();
	(renderer, root)
}

fn text_of(renderer: &Renderer<LoggingHost>, node: NodeId) -> String {
	renderer.host().to_markup(node)
}

/// Logs every hook, and counts clicks on its button.
struct Counter {
	handle: Handle<Counter>,
}

impl Component for Counter {
	type State = u32;

	fn create(_props: &Props, this: &Handle<Self>) -> Self {
		COUNTER.with(|handle| *handle.borrow_mut() = Some(this.clone()));
		Self { handle: this.clone() }
	}

	fn render(&self, _props: &Props, state: &u32) -> VNode {
		log(format!("render {}", state));
		let handle = self.handle.clone();
		h(
			"button",
			Props::new().with("onClick", Callback::new(move |_| handle.update_state(|count| count + 1))),
			[VNode::number(f64::from(*state))],
		)
	}

	fn will_mount(&mut self) {
		log("will_mount");
	}

	fn did_mount(&mut self) {
		log("did_mount");
	}

	fn will_update(&mut self, _next_props: &Props, next_state: &u32) {
		let current = self.handle.state().map_or(0, |state| *state);
		log(format!("will_update {} -> {}", current, next_state));
	}

	fn did_update(&mut self, _previous_props: &Props, previous_state: &u32) {
		log(format!("did_update from {}", previous_state));
	}

	fn will_unmount(&mut self) {
		log("will_unmount");
	}

	fn name() -> &'static str {
		"Counter"
	}
}

#[test]
fn lifecycle_order() {
	let (renderer, root) = setup();

	let button = renderer.render(&VNode::component::<Counter>(Props::new(), []), Some(&root)).unwrap();
	assert_eq!(take_log(), ["will_mount", "render 0", "did_mount"]);
	let handle = counter_handle();
	assert_eq!(handle.lifecycle(), Lifecycle::Mounted);
	assert_eq!(renderer.component_at(&button), Some("Counter"));

	handle.set_state(1);
	assert_eq!(take_log(), ["will_update 0 -> 1", "render 1", "replace", "did_update from 0"]);
	assert_eq!(text_of(&renderer, root), "<body><button>1</button></body>");
	assert_eq!(renderer.host().child_nodes(root), &[button], "The base was patched in place.");

	renderer.unmount(&button);
	assert_eq!(take_log(), ["will_unmount", "detach"]);
	assert_eq!(handle.lifecycle(), Lifecycle::Unmounted);
	assert_eq!(renderer.live_instances(), 0);

	handle.set_state(7);
	assert!(take_log().is_empty(), "Nothing renders after unmounting.");
}

#[test]
fn events_update_state() {
	let (renderer, root) = setup();
	let button = renderer.render(&VNode::component::<Counter>(Props::new(), []), Some(&root)).unwrap();

	assert!(renderer.dispatch_event(&button, "click", &()));
	assert!(renderer.dispatch_event(&button, "click", &()));

	assert_eq!(text_of(&renderer, button), "<button>2</button>");
	assert_eq!(*counter_handle().state().unwrap(), 2);
}

#[test]
fn render_unmounts_previous_content() {
	let (renderer, root) = setup();
	renderer.render(&VNode::component::<Counter>(Props::new(), []), Some(&root)).unwrap();
	take_log();

	renderer.render(&h("p", Props::new(), []), Some(&root)).unwrap();

	assert_eq!(take_log(), ["will_unmount", "detach"]);
	assert_eq!(renderer.live_instances(), 0);
}

/// Sets its state while being constructed.
struct Eager;

impl Component for Eager {
	type State = String;

	fn create(props: &Props, this: &Handle<Self>) -> Self {
		let initial = props.get("initial").and_then(PropValue::as_text).unwrap_or_default();
		this.set_state(initial.into_owned());
		Self
	}

	fn render(&self, _props: &Props, state: &String) -> VNode {
		log(format!("render {}", state));
		VNode::text(state.clone())
	}

	fn will_update(&mut self, _next_props: &Props, _next_state: &String) {
		log("will_update");
	}
}

#[test]
fn set_state_before_mount() {
	let (renderer, _) = setup();

	let node = renderer
		.render(&VNode::component::<Eager>(Props::new().with("initial", "ready"), []), None)
		.unwrap();

	assert_eq!(take_log(), ["render ready"]);
	assert_eq!(renderer.host().text(node), Some("ready"));
}

/// Refuses every state update.
struct Stubborn {
	handle: Handle<Stubborn>,
}

thread_local! {
	static STUBBORN: RefCell<Option<Handle<Stubborn>>> = RefCell::new(None);
}

impl Component for Stubborn {
	type State = u32;

	fn create(_props: &Props, this: &Handle<Self>) -> Self {
		STUBBORN.with(|handle| *handle.borrow_mut() = Some(this.clone()));
		Self { handle: this.clone() }
	}

	fn render(&self, _props: &Props, state: &u32) -> VNode {
		log(format!("render {}", state));
		VNode::number(f64::from(*state))
	}

	fn should_update(&self, _props: &Props, _next_props: &Props, _state: &u32, _next_state: &u32) -> bool {
		false
	}

	fn did_mount(&mut self) {
		assert!(self.handle.is_mounted());
	}
}

#[test]
fn rejected_updates_only_assign_state() {
	let (renderer, root) = setup();
	let node = renderer.render(&VNode::component::<Stubborn>(Props::new(), []), Some(&root)).unwrap();
	take_log();
	let handle = STUBBORN.with(|handle| handle.borrow().clone()).unwrap();

	handle.set_state(5);

	assert!(take_log().is_empty());
	assert_eq!(*handle.state().unwrap(), 5);
	assert_eq!(renderer.host().text(node), Some("0"));

	// A parent-driven patch renders with the assigned state.
	renderer.patch(&node, &VNode::component::<Stubborn>(Props::new(), [])).unwrap();
	assert_eq!(take_log(), ["render 5", "replace"]);
	assert_eq!(text_of(&renderer, root), "<body>5</body>");
}

/// Loads something as soon as it's mounted.
struct Loader {
	handle: Handle<Loader>,
}

impl Component for Loader {
	type State = bool;

	fn create(_props: &Props, this: &Handle<Self>) -> Self {
		Self { handle: this.clone() }
	}

	fn render(&self, _props: &Props, loaded: &bool) -> VNode {
		log(format!("render {}", loaded));
		VNode::text(if *loaded { "loaded" } else { "loading" })
	}

	fn did_mount(&mut self) {
		log("did_mount");
		self.handle.set_state(true);
		log("did_mount returns");
	}

	fn did_update(&mut self, _previous_props: &Props, _previous_state: &bool) {
		log("did_update");
	}
}

#[test]
fn set_state_during_mount_is_deferred() {
	let (renderer, root) = setup();

	let node = renderer.render(&VNode::component::<Loader>(Props::new(), []), Some(&root)).unwrap();

	assert_eq!(
		take_log(),
		["render false", "did_mount", "did_mount returns", "render true", "replace", "did_update"]
	);
	let current = renderer.host().child_nodes(root)[0];
	assert_ne!(current, node, "Text content changes replace the text node.");
	assert_eq!(renderer.host().text(current), Some("loaded"));
	assert_eq!(renderer.component_at(&current), Some(Loader::name()));
}

/// A keyed list item.
struct Item {
	label: String,
}

impl Component for Item {
	type State = ();

	fn create(props: &Props, _this: &Handle<Self>) -> Self {
		Self {
			label: props.get("label").and_then(PropValue::as_text).unwrap_or_default().into_owned(),
		}
	}

	fn render(&self, props: &Props, _state: &()) -> VNode {
		let label = props.get("label").and_then(PropValue::as_text).unwrap_or_default();
		h("li", Props::new(), [VNode::text(label.into_owned())])
	}

	fn will_receive_props(&mut self, _next_props: &Props) {
		log(format!("{} receives props", self.label));
	}

	fn will_unmount(&mut self) {
		log(format!("unmount {}", self.label));
	}
}

fn item(key: &str, label: &str) -> VNode {
	VNode::component::<Item>(Props::new().with("key", key).with("label", label), [])
}

#[test]
fn keyed_components_unmount_once() {
	let (renderer, root) = setup();
	let ul = renderer
		.render(&h("ul", Props::new(), [item("a", "a"), item("b", "b")]), Some(&root))
		.unwrap();
	let a = renderer.host().child_nodes(ul)[0];
	assert_eq!(renderer.key_of(&a).as_deref(), Some("a"));

	renderer.patch(&ul, &h("ul", Props::new(), [item("a", "A")])).unwrap();

	assert_eq!(take_log(), ["a receives props", "replace", "unmount b", "detach"]);
	assert_eq!(renderer.host().child_nodes(ul), &[a]);
	assert_eq!(text_of(&renderer, ul), "<ul><li>A</li></ul>");
	assert_eq!(renderer.live_instances(), 1);
}

#[test]
fn unmount_reaches_components_deep_in_removed_subtrees() {
	let (renderer, root) = setup();
	let row = |key: &str, content: VNode| h("li", Props::new().with("key", key), [h("div", Props::new(), [content])]);
	let ul = renderer
		.render(
			&h(
				"ul",
				Props::new(),
				[row("a", VNode::component::<Counter>(Props::new(), [])), row("b", VNode::text("b"))],
			),
			Some(&root),
		)
		.unwrap();
	take_log();
	let handle = counter_handle();

	renderer
		.patch(&ul, &h("ul", Props::new(), [row("b", VNode::text("b"))]))
		.unwrap();

	assert_eq!(take_log(), ["will_unmount", "detach"]);
	assert_eq!(handle.lifecycle(), Lifecycle::Unmounted);
	assert_eq!(renderer.live_instances(), 0);
	assert_eq!(text_of(&renderer, ul), "<ul><li><div>b</div></li></ul>");
}

#[test]
fn component_type_change_replaces() {
	let (renderer, root) = setup();
	let button = renderer.render(&VNode::component::<Counter>(Props::new(), []), Some(&root)).unwrap();
	take_log();

	let li = renderer.patch(&button, &item("x", "x")).unwrap();

	assert_ne!(li, button);
	assert_eq!(take_log(), ["will_unmount", "replace"]);
	assert_eq!(text_of(&renderer, root), "<body><li>x</li></body>");
	assert_eq!(renderer.live_instances(), 1);
}

#[test]
fn plain_nodes_replace_components() {
	let (renderer, root) = setup();
	let button = renderer.render(&VNode::component::<Counter>(Props::new(), []), Some(&root)).unwrap();
	take_log();

	let plain = renderer.patch(&button, &h("button", Props::new(), [VNode::text("plain")])).unwrap();

	assert_ne!(plain, button, "Even with the same tag, the instance's node is not adopted.");
	assert_eq!(take_log(), ["will_unmount", "replace"]);
	assert_eq!(renderer.component_at(&plain), None);
	assert_eq!(renderer.live_instances(), 0);
}

/// Renders a [`Counter`] directly.
struct Outer;

impl Component for Outer {
	type State = ();

	fn create(_props: &Props, _this: &Handle<Self>) -> Self {
		Self
	}

	fn render(&self, _props: &Props, _state: &()) -> VNode {
		log("render outer");
		VNode::component::<Counter>(Props::new(), [])
	}

	fn will_unmount(&mut self) {
		log("will_unmount outer");
	}

	fn name() -> &'static str {
		"Outer"
	}
}

#[test]
fn nested_components_share_a_node() {
	let (renderer, root) = setup();
	let button = renderer.render(&VNode::component::<Outer>(Props::new(), []), Some(&root)).unwrap();
	assert_eq!(take_log(), ["render outer", "will_mount", "render 0", "did_mount"]);
	assert_eq!(renderer.component_at(&button), Some("Outer"));
	assert_eq!(renderer.live_instances(), 2);

	counter_handle().set_state(3);
	assert_eq!(text_of(&renderer, root), "<body><button>3</button></body>");
	assert_eq!(renderer.host().child_nodes(root), &[button]);
	take_log();

	renderer.patch(&button, &VNode::component::<Outer>(Props::new(), [])).unwrap();
	assert_eq!(take_log(), ["render outer", "render 3"]);
	assert_eq!(renderer.live_instances(), 2);

	renderer.unmount(&button);
	assert_eq!(take_log(), ["will_unmount outer", "will_unmount", "detach"]);
	assert_eq!(renderer.live_instances(), 0);
}

#[test]
fn function_components_patch_in_place() {
	let (renderer, root) = setup();
	let greeting = ComponentType::function("Greeting", |props| {
		let name = props.get("name").and_then(PropValue::as_text).unwrap_or_default();
		h("p", Props::new(), [VNode::text(format!("Hello {}", name))])
	});

	let p = renderer
		.render(&VNode::function(greeting.clone(), Props::new().with("name", "Ann"), []), Some(&root))
		.unwrap();
	let patched = renderer
		.patch(&p, &VNode::function(greeting, Props::new().with("name", "Bob"), []))
		.unwrap();

	assert_eq!(patched, p);
	assert_eq!(text_of(&renderer, p), "<p>Hello Bob</p>");
	assert_eq!(renderer.component_at(&p), None);
}

#[test]
fn children_are_passed_as_props() {
	let (renderer, _) = setup();
	let frame = ComponentType::function("Frame", |props| h("section", Props::new(), props.children().to_vec()));

	let section = renderer
		.render(
			&VNode::function(frame, Props::new(), [VNode::text("a"), h("b", Props::new(), [])]),
			None,
		)
		.unwrap();

	assert_eq!(text_of(&renderer, section), "<section>a<b></b></section>");
}
