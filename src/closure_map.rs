//! Keeps the JavaScript closures behind attached event listeners alive, and releases them on detach.

use crate::vnode::Callback;
use core::fmt::{self, Debug, Formatter};
use hashbrown::{hash_map::Entry, HashMap};
use js_sys::Function;
use tracing::trace;
use wasm_bindgen::{closure::Closure, JsCast};

pub(crate) type ListenerClosure = Closure<dyn Fn(web_sys::Event)>;

#[derive(Default)]
pub(crate) struct ClosureMap {
	closures: HashMap<(u32, String), ListenerClosure>,
}

impl Debug for ClosureMap {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClosureMap").field("published", &self.closures.len()).finish()
	}
}

impl ClosureMap {
	/// Wraps `handler` into a JavaScript function for `event_type` on node `node`.
	///
	/// Returns the function to register, and the closure previously published for the same slot, if any.
	/// That one must be unregistered by the caller before it's dropped.
	pub(crate) fn publish(&mut self, node: u32, event_type: &str, handler: &Callback) -> (Function, Option<ListenerClosure>) {
		let handler = handler.clone();
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| handler.call(&event)) as Box<dyn Fn(web_sys::Event)>);
		let function = closure.as_ref().unchecked_ref::<Function>().clone();

		let previous = match self.closures.entry((node, event_type.to_owned())) {
			Entry::Occupied(mut occupied) => Some(occupied.insert(closure)),
			Entry::Vacant(vacant) => {
				vacant.insert(closure);
				None
			}
		};
		trace!(node, event_type, replaced = previous.is_some(), "Created Closure.");
		(function, previous)
	}

	/// Takes the closure published for `event_type` on `node` out of the registry.
	pub(crate) fn unpublish(&mut self, node: u32, event_type: &str) -> Option<ListenerClosure> {
		let closure = self.closures.remove(&(node, event_type.to_owned()));
		if closure.is_some() {
			trace!(node, event_type, "Destroyed Closure.");
		}
		closure
	}

	pub(crate) fn len(&self) -> usize {
		self.closures.len()
	}
}
