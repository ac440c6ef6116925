//! This module defines the flat [`BvhNode`] layout, the binned SAH [`BvhBuilder`] and the
//! [`MeshBvh`] inspection view.
//!
//! [`BvhNode`]: struct.BvhNode.html
//! [`BvhBuilder`]: struct.BvhBuilder.html
//! [`MeshBvh`]: struct.MeshBvh.html
//!

mod builder;
mod node;
mod view;

pub use self::builder::*;
pub use self::node::*;
pub use self::view::*;
