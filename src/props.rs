use crate::{
	diff::Engine,
	host::{HostAdapter, LiveField},
	vnode::PropValue,
};
use tracing::{trace, trace_span, warn};

impl<H: HostAdapter> Engine<H> {
	/// Maps one prop onto `node`. The first matching rule wins; anything matching none is dropped.
	///
	/// 1. a callable `on*` prop (re)binds the handler for its lower-cased event type,
	/// 2. `checked`, `value` and `className` are set as live fields,
	/// 3. a map-valued `style` is merged into the node's style,
	/// 4. a callable `ref` is called with the node right away,
	/// 5. `key` becomes the node's reconciliation key,
	/// 6. any other scalar becomes a string attribute.
	pub(crate) fn apply_prop(&mut self, node: &H::Node, name: &str, value: &PropValue) {
		let span = trace_span!("Applying prop", prop = name);
		let _enter = span.enter();

		match (value, LiveField::from_prop_name(name)) {
			(PropValue::Callback(handler), _) if name.starts_with("on") => {
				let event_type = name[2..].to_lowercase();
				let previous = self.annotation_mut(node).handlers.insert(event_type.clone(), handler.clone());
				if let Some(previous) = previous {
					trace!("Detaching previous {:?} handler.", event_type);
					if let Err(error) = self.host.remove_listener(node, &event_type, &previous) {
						self.diagnostics.host_failure("remove an event listener", &error);
					}
				}
				if let Err(error) = self.host.add_listener(node, &event_type, handler) {
					self.diagnostics.host_failure("add an event listener", &error);
				}
			}

			(_, Some(field)) => {
				if let Err(error) = self.host.set_live_field(node, field, value) {
					self.diagnostics.host_failure("set a live field", &error);
				}
			}

			(PropValue::Map(style), None) if name == "style" => {
				let entries: Vec<(String, String)> = style
					.iter()
					.filter_map(|(property, value)| match value.as_text() {
						Some(text) => Some((property.to_owned(), text.into_owned())),
						None => {
							warn!("Skipping non-scalar style property {:?}.", property);
							None
						}
					})
					.collect();
				if let Err(error) = self.host.merge_style(node, &entries) {
					self.diagnostics.host_failure("merge a style", &error);
				}
			}

			(PropValue::Callback(callback), None) if name == "ref" => {
				trace!("Calling ref callback.");
				callback.call(node);
			}

			(_, None) if name == "key" => self.annotation_mut(node).key = value.as_key(),

			(_, None) if !value.is_object() && !value.is_callable() => {
				if let Some(text) = value.as_text() {
					if let Err(error) = self.host.set_attribute(node, name, &text) {
						self.diagnostics.host_failure("set an attribute", &error);
					}
				}
			}

			_ => trace!("Dropping prop that maps onto nothing."),
		}
	}
}
