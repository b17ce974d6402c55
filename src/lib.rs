#![doc(html_root_url = "https://docs.rs/twig-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A small keyed virtual-tree renderer.
//!
//! A [`Renderer`] mounts [`VNode`] trees into a host tree through a [`HostAdapter`] and patches them in place
//! afterwards, preserving node identity wherever tags, keys or positions line up.
//! Stateful [`Component`]s and plain function components are layered on top.
//!
//! Two hosts are included: [`MemoryHost`](`memory::MemoryHost`), which keeps its tree in memory, and
//! [`WebHost`](`web::WebHost`), which drives a browser document through `web-sys`.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod closure_map;
mod component;
mod diagnostics;
mod diff;
pub mod host;
pub mod load;
pub mod memory;
mod props;
mod renderer;
pub mod vnode;
pub mod web;

pub use component::{Component, ComponentType, FunctionalType, Handle, InstanceId, Lifecycle, StatefulType};
pub use diagnostics::Diagnostic;
pub use diff::Options;
pub use host::HostAdapter;
pub use renderer::Renderer;
pub use vnode::{h, Callback, PropValue, Props, VNode};
