use crate::{
	component::{PendingUpdate, Scheduler},
	diagnostics::Diagnostic,
	diff::{Engine, Options},
	host::HostAdapter,
	vnode::{Element, PropValue, VNode},
};
use core::{
	any::Any,
	cell::{Ref, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::{collections::VecDeque, rc::Rc};
use tracing::{error, instrument, trace};

/// Mounts virtual trees into a host tree and keeps them patched.
///
/// Cloning a [`Renderer`] yields another handle to the same engine.
///
/// The renderer isn't re-entrant. Calls made from inside a callback it is currently running (a `ref` callback,
/// a component constructor, hook or render) are ignored and reported as [`Diagnostic::Reentered`].
/// Use [`Handle::set_state`](`crate::Handle::set_state`) there instead, which is deferred until the running
/// operation completes.
pub struct Renderer<H: HostAdapter + 'static> {
	shared: Rc<Shared<H>>,
}

impl<H: HostAdapter + 'static> Clone for Renderer<H> {
	fn clone(&self) -> Self {
		Self { shared: Rc::clone(&self.shared) }
	}
}

impl<H: HostAdapter + 'static> Debug for Renderer<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Renderer")
			.field("pending_updates", &self.shared.pending.borrow().len())
			.finish_non_exhaustive()
	}
}

struct Shared<H: HostAdapter> {
	engine: RefCell<Engine<H>>,
	pending: RefCell<VecDeque<PendingUpdate>>,
	/// Diagnostics raised while `engine` was borrowed.
	rejected: RefCell<Vec<Diagnostic>>,
}

impl<H: HostAdapter + 'static> Scheduler for Shared<H> {
	fn schedule(&self, update: PendingUpdate) {
		self.pending.borrow_mut().push_back(update);
		let idle = self.engine.try_borrow_mut().is_ok();
		if idle {
			self.flush();
		} else {
			trace!("Renderer busy; deferring state update.");
		}
	}
}

impl<H: HostAdapter> Shared<H> {
	fn reject(&self, operation: &'static str) {
		let diagnostic = Diagnostic::Reentered { operation };
		error!("{}", diagnostic);
		self.rejected.borrow_mut().push(diagnostic);
	}

	/// Runs queued state updates one complete pass at a time, in request order.
	fn flush(&self) {
		loop {
			let Some(update) = self.pending.borrow_mut().pop_front() else {
				break;
			};
			match self.engine.try_borrow_mut() {
				Ok(mut engine) => engine.apply_update(update),
				Err(_) => {
					self.pending.borrow_mut().push_front(update);
					break;
				}
			}
		}
	}
}

impl<H: HostAdapter + 'static> Renderer<H> {
	#[must_use]
	pub fn new(host: H) -> Self {
		Self::with_options(host, Options::default())
	}

	#[must_use]
	pub fn with_options(host: H, options: Options) -> Self {
		let shared = Rc::new_cyclic(|shared: &std::rc::Weak<Shared<H>>| {
			let scheduler: std::rc::Weak<dyn Scheduler> = shared.clone();
			Shared {
				engine: RefCell::new(Engine::new(host, options, scheduler)),
				pending: RefCell::new(VecDeque::new()),
				rejected: RefCell::new(Vec::new()),
			}
		});
		Self { shared }
	}

	fn run<R>(&self, operation: &'static str, f: impl FnOnce(&mut Engine<H>) -> R) -> Option<R> {
		let result = match self.shared.engine.try_borrow_mut() {
			Ok(mut engine) => f(&mut engine),
			Err(_) => {
				self.shared.reject(operation);
				return None;
			}
		};
		self.shared.flush();
		Some(result)
	}

	fn read<R>(&self, operation: &'static str, f: impl FnOnce(&Engine<H>) -> R) -> Option<R> {
		match self.shared.engine.try_borrow() {
			Ok(engine) => Some(f(&engine)),
			Err(_) => {
				self.shared.reject(operation);
				None
			}
		}
	}

	/// Mounts `vnode` as a new host subtree.
	///
	/// With a `parent`, its previous content is discarded first and the new subtree is appended to it.
	/// Returns [`None`] if `vnode` couldn't be mounted, in which case a [`Diagnostic`] was reported.
	#[instrument(skip(self, vnode))]
	pub fn render(&self, vnode: &VNode, parent: Option<&H::Node>) -> Option<H::Node> {
		self.run("render", |engine| engine.render(vnode, parent)).flatten()
	}

	/// Patches `node` to match `vnode`, within its current parent.
	///
	/// Returns the node now occupying `node`'s position, which differs from `node` if it had to be replaced.
	pub fn patch(&self, node: &H::Node, vnode: &VNode) -> Option<H::Node> {
		let parent = self.read("patch", |engine| engine.host.parent(node))?;
		self.patch_in(node, vnode, parent.as_ref())
	}

	/// Like [`Renderer::patch`], but replacements are spliced into `parent` (if any) instead.
	#[instrument(skip(self, vnode))]
	pub fn patch_in(&self, node: &H::Node, vnode: &VNode, parent: Option<&H::Node>) -> Option<H::Node> {
		self.run("patch", |engine| engine.patch(node, vnode, parent)).flatten()
	}

	/// Reconciles the children of `node` against those of `element` and reapplies `element`'s props to `node`.
	pub fn reconcile_children(&self, node: &H::Node, element: &Element) -> H::Node {
		self.run("reconcile children", |engine| engine.reconcile(node, element))
			.unwrap_or_else(|| node.clone())
	}

	/// Applies a single prop to `node`, as mounting and patching do.
	pub fn apply_prop(&self, node: &H::Node, name: &str, value: &PropValue) {
		self.run("apply a prop", |engine| engine.apply_prop(node, name, value));
	}

	/// Detaches `node` from its parent after notifying every component instance inside it.
	pub fn unmount(&self, node: &H::Node) {
		self.run("unmount", |engine| engine.unmount(node));
	}

	/// Calls the handler bound to `node` for `event_type`, if any.
	///
	/// This is how hosts without their own event dispatch deliver events.
	pub fn dispatch_event(&self, node: &H::Node, event_type: &str, event: &dyn Any) -> bool {
		let handler = self.read("dispatch an event", |engine| engine.handler(node, event_type)).flatten();
		match handler {
			Some(handler) => {
				handler.call(event);
				self.shared.flush();
				true
			}
			None => false,
		}
	}

	/// Drains the diagnostics reported since the last call.
	#[must_use]
	pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
		let mut diagnostics = self
			.shared
			.engine
			.try_borrow_mut()
			.map(|mut engine| engine.diagnostics.take())
			.unwrap_or_default();
		diagnostics.append(&mut self.shared.rejected.borrow_mut());
		diagnostics
	}

	/// Reads the host subtree at `node` back into a virtual tree.
	#[must_use]
	pub fn snapshot(&self, node: &H::Node) -> VNode {
		self.read("snapshot", |engine| engine.snapshot(node)).unwrap_or(VNode::Empty)
	}

	/// The reconciliation key recorded for `node`.
	#[must_use]
	pub fn key_of(&self, node: &H::Node) -> Option<String> {
		self.read("read a key", |engine| engine.key_of(node)).flatten()
	}

	/// The name of the outermost component whose base `node` is.
	#[must_use]
	pub fn component_at(&self, node: &H::Node) -> Option<&'static str> {
		self.read("look up a component", |engine| engine.component_at(node)).flatten()
	}

	/// How many stateful component instances are currently alive.
	#[must_use]
	pub fn live_instances(&self) -> usize {
		self.read("count instances", Engine::live_instances).unwrap_or_default()
	}

	/// Borrows the host adapter.
	///
	/// # Panics
	///
	/// If the renderer is running an operation, which is the case inside any callback it calls.
	#[must_use]
	pub fn host(&self) -> Ref<'_, H> {
		Ref::map(self.shared.engine.borrow(), |engine| &engine.host)
	}

	/// Mutably borrows the host adapter, for setup outside of rendering.
	///
	/// # Panics
	///
	/// If the renderer is running an operation, which is the case inside any callback it calls.
	pub fn with_host<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
		f(&mut self.shared.engine.borrow_mut().host)
	}
}
