//! netlayout - 3D graph layout engine.
//!
//! Computes node positions for graph visualization. Cheap placements
//! (circular, grid, random, hierarchical) run inline; force simulations run on
//! a dedicated worker thread behind [`LayoutHost`] so the caller's thread is
//! never blocked. Layouts are looked up by identifier in a [`LayoutRegistry`].

pub mod error;
pub mod host;
pub mod kernel;
pub mod layouts;
pub mod options;
pub mod registry;
pub mod transition;
pub mod types;

pub use error::{ErrorKind, LayoutError, LayoutResult};
pub use host::{HostState, LayoutHost, LayoutRequest};
pub use kernel::{Algorithm, KernelReport};
pub use options::LayoutOptions;
pub use registry::{LayoutDescriptor, LayoutRegistry, LayoutSummary, Strategy};
pub use transition::{Transition, TransitionSink};
pub use types::{EdgeRef, NodePosition, Vec3, index_edges};
