//! Stateful and function components.
//!
//! A stateful component is any type implementing [`Component`]. Every lifecycle hook is optional: the trait's
//! default methods do nothing. A function component is a plain `Fn(&Props) -> VNode` wrapped in a
//! [`ComponentType`], and has no instance, no state and no hooks.
//!
//! # Lifecycle
//!
//! `Unmounted → Mounting → Mounted ⇄ Updating`, then `Unmounting → Unmounted`, after which the instance is dropped.
//!
//! | hook | called |
//! |---|---|
//! | [`will_mount`](`Component::will_mount`) | before the first render |
//! | [`did_mount`](`Component::did_mount`) | after the first render's host node exists |
//! | [`will_receive_props`](`Component::will_receive_props`) | when a parent patch hands in new props, before they replace the old ones |
//! | [`should_update`](`Component::should_update`) | when [`Handle::set_state`] is called on a mounted instance |
//! | [`will_update`](`Component::will_update`) | before an accepted state update is assigned |
//! | [`did_update`](`Component::did_update`) | after an accepted state update was patched into the host tree |
//! | [`will_unmount`](`Component::will_unmount`) | before the instance's host node is detached |

use crate::vnode::{Props, VNode};
use core::{
	any::{type_name, Any, TypeId},
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::rc::{Rc, Weak};
use tracing::{debug, error, trace};

pub trait Component: Sized + 'static {
	type State: PartialEq + Default + 'static;

	/// Constructs the component.
	///
	/// `this` may be stored for later [`set_state`](`Handle::set_state`) calls.
	/// Calling it right away assigns the state the first render will see, without rendering.
	fn create(props: &Props, this: &Handle<Self>) -> Self;

	fn render(&self, props: &Props, state: &Self::State) -> VNode;

	fn will_mount(&mut self) {}
	fn did_mount(&mut self) {}
	fn will_receive_props(&mut self, _next_props: &Props) {}

	/// Decides whether a state update re-renders. By default, any change to props or state does.
	fn should_update(&self, props: &Props, next_props: &Props, state: &Self::State, next_state: &Self::State) -> bool {
		props != next_props || state != next_state
	}

	fn will_update(&mut self, _next_props: &Props, _next_state: &Self::State) {}
	fn did_update(&mut self, _previous_props: &Props, _previous_state: &Self::State) {}
	fn will_unmount(&mut self) {}

	fn name() -> &'static str {
		type_name::<Self>()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	Unmounted,
	Mounting,
	Mounted,
	Updating,
	Unmounting,
}

impl Lifecycle {
	/// Whether `set_state` re-renders (the instance has a base node that isn't being torn down).
	#[must_use]
	pub fn accepts_updates(self) -> bool {
		matches!(self, Lifecycle::Mounted | Lifecycle::Updating)
	}
}

/// Identifies a live component instance within one renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

/// What a component node instantiates or calls.
#[derive(Clone)]
pub enum ComponentType {
	Stateful(StatefulType),
	Functional(FunctionalType),
}

impl ComponentType {
	#[must_use]
	pub fn stateful<C: Component>() -> Self {
		ComponentType::Stateful(StatefulType {
			type_id: TypeId::of::<C>(),
			name: C::name(),
			instantiate: instantiate::<C>,
		})
	}

	pub fn function(name: &'static str, render: impl Fn(&Props) -> VNode + 'static) -> Self {
		ComponentType::Functional(FunctionalType { name, render: Rc::new(render) })
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			ComponentType::Stateful(stateful) => stateful.name,
			ComponentType::Functional(functional) => functional.name,
		}
	}
}

impl PartialEq for ComponentType {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(ComponentType::Stateful(a), ComponentType::Stateful(b)) => a.type_id == b.type_id,
			(ComponentType::Functional(a), ComponentType::Functional(b)) => Rc::ptr_eq(&a.render, &b.render),
			_ => false,
		}
	}
}

impl Debug for ComponentType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			ComponentType::Stateful(stateful) => f.debug_tuple("Stateful").field(&stateful.name).finish(),
			ComponentType::Functional(functional) => f.debug_tuple("Functional").field(&functional.name).finish(),
		}
	}
}

#[derive(Clone, Copy)]
pub struct StatefulType {
	type_id: TypeId,
	name: &'static str,
	instantiate: fn(&Props, InstanceId, Weak<dyn Scheduler>) -> Rc<dyn Instance>,
}

impl StatefulType {
	pub(crate) fn type_id(&self) -> TypeId {
		self.type_id
	}

	pub(crate) fn instantiate(&self, props: &Props, id: InstanceId, scheduler: Weak<dyn Scheduler>) -> Rc<dyn Instance> {
		(self.instantiate)(props, id, scheduler)
	}
}

#[derive(Clone)]
pub struct FunctionalType {
	name: &'static str,
	render: Rc<dyn Fn(&Props) -> VNode>,
}

impl FunctionalType {
	pub(crate) fn call(&self, props: &Props) -> VNode {
		(self.render)(props)
	}
}

/// A queued re-render of one instance with a new state.
pub(crate) struct PendingUpdate {
	pub(crate) instance: InstanceId,
	pub(crate) state: Box<dyn Any>,
}

/// Runs state updates against the engine that owns an instance.
pub(crate) trait Scheduler {
	fn schedule(&self, update: PendingUpdate);
}

/// The engine's type-erased view of a stateful instance.
pub(crate) trait Instance {
	fn component_type(&self) -> TypeId;
	fn name(&self) -> &'static str;
	fn lifecycle(&self) -> Lifecycle;
	fn set_lifecycle(&self, lifecycle: Lifecycle);

	fn render(&self) -> VNode;
	fn will_mount(&self);
	fn did_mount(&self);
	fn will_unmount(&self);
	/// Calls `will_receive_props`, then replaces the props wholesale.
	fn receive_props(&self, props: Props);

	fn assign_state(&self, state: Box<dyn Any>);
	fn should_update(&self, next_state: &dyn Any) -> bool;
	/// Calls `will_update` and assigns `next_state`, returning the previous state for [`Instance::finish_update`].
	fn begin_update(&self, next_state: Box<dyn Any>) -> Option<Box<dyn Any>>;
	fn finish_update(&self, previous_state: Box<dyn Any>);
}

fn instantiate<C: Component>(props: &Props, id: InstanceId, scheduler: Weak<dyn Scheduler>) -> Rc<dyn Instance> {
	let cell = Rc::new(InstanceCell::<C> {
		id,
		component: RefCell::new(None),
		props: RefCell::new(Rc::new(props.clone())),
		state: RefCell::new(Rc::new(C::State::default())),
		lifecycle: Cell::new(Lifecycle::Unmounted),
		scheduler,
	});
	let handle = Handle { cell: Rc::downgrade(&cell) };
	let component = C::create(props, &handle);
	*cell.component.borrow_mut() = Some(component);
	cell
}

struct InstanceCell<C: Component> {
	id: InstanceId,
	component: RefCell<Option<C>>,
	props: RefCell<Rc<Props>>,
	state: RefCell<Rc<C::State>>,
	lifecycle: Cell<Lifecycle>,
	scheduler: Weak<dyn Scheduler>,
}

impl<C: Component> InstanceCell<C> {
	fn with_component(&self, hook: &'static str, f: impl FnOnce(&mut C)) {
		match self.component.try_borrow_mut() {
			Ok(mut component) => match component.as_mut() {
				Some(component) => f(component),
				None => error!("`{}::{}` called before construction finished; skipping.", C::name(), hook),
			},
			Err(_) => error!("`{}::{}` called re-entrantly; skipping.", C::name(), hook),
		}
	}

	fn props(&self) -> Rc<Props> {
		Rc::clone(&self.props.borrow())
	}

	fn state(&self) -> Rc<C::State> {
		Rc::clone(&self.state.borrow())
	}

	fn downcast_state(&self, state: Box<dyn Any>) -> Option<C::State> {
		match state.downcast::<C::State>() {
			Ok(state) => Some(*state),
			Err(_) => {
				error!("State update for `{}` has the wrong type; dropping it.", C::name());
				None
			}
		}
	}
}

impl<C: Component> Instance for InstanceCell<C> {
	fn component_type(&self) -> TypeId {
		TypeId::of::<C>()
	}

	fn name(&self) -> &'static str {
		C::name()
	}

	fn lifecycle(&self) -> Lifecycle {
		self.lifecycle.get()
	}

	fn set_lifecycle(&self, lifecycle: Lifecycle) {
		trace!(component = C::name(), from = ?self.lifecycle.get(), to = ?lifecycle, "Lifecycle transition.");
		self.lifecycle.set(lifecycle);
	}

	fn render(&self) -> VNode {
		let props = self.props();
		let state = self.state();
		match self.component.try_borrow() {
			Ok(component) => match component.as_ref() {
				Some(component) => component.render(&props, &state),
				None => VNode::Empty,
			},
			Err(_) => {
				error!("`{}::render` called re-entrantly; rendering nothing.", C::name());
				VNode::Empty
			}
		}
	}

	fn will_mount(&self) {
		self.with_component("will_mount", C::will_mount);
	}

	fn did_mount(&self) {
		self.with_component("did_mount", C::did_mount);
	}

	fn will_unmount(&self) {
		self.with_component("will_unmount", C::will_unmount);
	}

	fn receive_props(&self, props: Props) {
		self.with_component("will_receive_props", |component| component.will_receive_props(&props));
		*self.props.borrow_mut() = Rc::new(props);
	}

	fn assign_state(&self, state: Box<dyn Any>) {
		if let Some(state) = self.downcast_state(state) {
			*self.state.borrow_mut() = Rc::new(state);
		}
	}

	fn should_update(&self, next_state: &dyn Any) -> bool {
		let Some(next_state) = next_state.downcast_ref::<C::State>() else {
			return false;
		};
		let props = self.props();
		let state = self.state();
		match self.component.try_borrow() {
			Ok(component) => component.as_ref().map_or(true, |component| component.should_update(&props, &props, &state, next_state)),
			Err(_) => true,
		}
	}

	fn begin_update(&self, next_state: Box<dyn Any>) -> Option<Box<dyn Any>> {
		let next_state = self.downcast_state(next_state)?;
		let props = self.props();
		self.with_component("will_update", |component| component.will_update(&props, &next_state));
		let previous = self.state.replace(Rc::new(next_state));
		Some(Box::new(previous))
	}

	fn finish_update(&self, previous_state: Box<dyn Any>) {
		let Ok(previous_state) = previous_state.downcast::<Rc<C::State>>() else {
			return error!("Previous state of `{}` has the wrong type; skipping `did_update`.", C::name());
		};
		let props = self.props();
		self.with_component("did_update", |component| component.did_update(&props, &previous_state));
	}
}

/// A weak handle to a stateful component instance, handed to [`Component::create`].
pub struct Handle<C: Component> {
	cell: Weak<InstanceCell<C>>,
}

impl<C: Component> Clone for Handle<C> {
	fn clone(&self) -> Self {
		Self { cell: Weak::clone(&self.cell) }
	}
}

impl<C: Component> Debug for Handle<C> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Handle")
			.field("component", &C::name())
			.field("lifecycle", &self.lifecycle())
			.finish()
	}
}

impl<C: Component> Handle<C> {
	/// Replaces the instance's state.
	///
	/// While the instance is mounted and [`Component::should_update`] accepts the change, this runs
	/// `will_update`, assigns the state, patches the instance's host node with a fresh render and calls
	/// `did_update`, all before returning. If the renderer is in the middle of another operation (for example
	/// when called from `did_mount`), the update runs as soon as that operation completes.
	///
	/// Otherwise only the state is assigned.
	pub fn set_state(&self, state: C::State) {
		let Some(cell) = self.cell.upgrade() else {
			return debug!("`{}` state set after the instance was dropped; ignoring.", C::name());
		};

		if !cell.lifecycle.get().accepts_updates() {
			trace!(component = C::name(), lifecycle = ?cell.lifecycle.get(), "Assigning state without re-render.");
			*cell.state.borrow_mut() = Rc::new(state);
			return;
		}

		match cell.scheduler.upgrade() {
			Some(scheduler) => {
				let instance = cell.id;
				drop(cell);
				scheduler.schedule(PendingUpdate {
					instance,
					state: Box::new(state),
				});
			}
			None => {
				debug!("Renderer of `{}` is gone; assigning state without re-render.", C::name());
				*cell.state.borrow_mut() = Rc::new(state);
			}
		}
	}

	/// [`set_state`](`Handle::set_state`) with a value derived from the current state.
	pub fn update_state(&self, update: impl FnOnce(&C::State) -> C::State) {
		if let Some(state) = self.state() {
			self.set_state(update(&state));
		}
	}

	#[must_use]
	pub fn state(&self) -> Option<Rc<C::State>> {
		self.cell.upgrade().map(|cell| cell.state())
	}

	#[must_use]
	pub fn lifecycle(&self) -> Lifecycle {
		self.cell.upgrade().map_or(Lifecycle::Unmounted, |cell| cell.lifecycle.get())
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.lifecycle().accepts_updates()
	}
}
