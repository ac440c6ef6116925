#![cfg_attr(feature = "bench", feature(test))]
//! A crate which builds binary bounding volume hierarchies over triangle soups, laid out
//! for direct upload to a GPU.
//!
//! ## About
//!
//! Ray tracing against a large triangle soup is only practical with an acceleration
//! structure. This crate builds a BVH (Bounding Volume Hierarchy) per mesh with a binned
//! SAH (Surface Area Heuristic) and writes it as a flat array of 32 byte nodes, next to a
//! permutation array which maps leaf slots to triangles. Both arrays are meant to be copied
//! into shader storage buffers as they are; traversal happens in the shader.
//!
//! Trees are built once and rebuilt wholesale when geometry changes. Several meshes share
//! one set of buffers through the [`GeometryPool`], where every node and index value is
//! local to its mesh.
//!
//! ## Example
//!
//! ```
//! use tri_bvh::bvh::{BvhBuilder, MeshBvh};
//! use tri_bvh::triangle::Triangle;
//! use tri_bvh::{Point3, Real};
//!
//! let mut triangles = Vec::new();
//! for i in 0..1000u32 {
//!     let p = Point3::new(i as Real, (i % 10) as Real, (i % 7) as Real);
//!     triangles.push(Triangle::new(
//!         p,
//!         p + tri_bvh::Vector3::new(1.0, 0.0, 0.0),
//!         p + tri_bvh::Vector3::new(0.0, 1.0, 0.0),
//!     ));
//! }
//!
//! let mut nodes = Vec::new();
//! let mut indices = Vec::new();
//! let output = BvhBuilder::new(&triangles, 0, triangles.len())
//!     .unwrap()
//!     .build(&mut nodes, &mut indices);
//!
//! let bvh = MeshBvh::new(&nodes[output.first_node..], &indices, &triangles);
//! assert_eq!(bvh.validate(), Ok(()));
//! let gpu_bytes: &[u8] = bytemuck::cast_slice(&nodes);
//! assert_eq!(gpu_bytes.len(), 32 * output.node_count);
//! ```
//!
//! ## Features
//!
//! - `rayon` (default **enabled**) - builds the trees of [`GeometryPool::add_meshes`] in parallel
//! - `serde` (default **disabled**) - adds `Serialize` and `Deserialize` implementations for some types
//! - `bench` (default **disabled**) - nightly benchmarks of the builder
//!
//! [`GeometryPool`]: pool/struct.GeometryPool.html
//! [`GeometryPool::add_meshes`]: pool/struct.GeometryPool.html#method.add_meshes
//!

#[cfg(all(feature = "bench", test))]
extern crate test;

/// Float type used by this crate. The GPU layout is 32 bit.
pub type Real = f32;

/// Point math type used by this crate. Type alias for [`nalgebra::Point3`].
pub type Point3 = nalgebra::Point3<Real>;

/// Vector math type used by this crate. Type alias for [`nalgebra::Vector3`].
pub type Vector3 = nalgebra::Vector3<Real>;

pub mod aabb;
pub mod axis;
pub mod bvh;
pub mod error;
pub mod pool;
pub mod triangle;
mod utils;

#[cfg(test)]
mod testbase;

pub use crate::error::{BuildError, ValidationError};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
