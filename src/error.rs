//! Error types for building and validating BVHs.

use thiserror::Error;

/// Rejected builder inputs. The build itself cannot fail once a builder exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No BVH can be built over zero triangles.
    #[error("cannot build a BVH over an empty triangle range")]
    EmptyRange,

    /// The requested range does not lie inside the triangle buffer.
    #[error("{count} triangles starting at {first} exceed a buffer of {len} triangles")]
    RangeOutOfBounds {
        first: usize,
        count: usize,
        len: usize,
    },

    /// Node or index offsets would not fit the 32-bit fields of the GPU layout.
    #[error("{0} triangles exceed the 32-bit offsets of the GPU layout")]
    TooManyTriangles(usize),
}

/// A broken structural property found by [`MeshBvh::validate`].
///
/// [`MeshBvh::validate`]: ../bvh/struct.MeshBvh.html#method.validate
///
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("index buffer holds {indices} entries for {triangles} triangles")]
    IndexCountMismatch { indices: usize, triangles: usize },

    #[error("{nodes} nodes is outside 1..={max} for {triangles} triangles")]
    NodeCountOutOfBounds {
        nodes: usize,
        max: usize,
        triangles: usize,
    },

    #[error("internal node {node} points at children {left} and {} of {nodes} nodes", .left + 1)]
    ChildOutOfBounds { node: usize, left: usize, nodes: usize },

    #[error("node {0} is reachable more than once")]
    NodeVisitedTwice(usize),

    #[error("node {0} is not reachable from the root")]
    UnreachableNode(usize),

    #[error("leaf {node} covers slots {first}..{} of {slots}", .first + .count)]
    LeafRangeOutOfBounds {
        node: usize,
        first: usize,
        count: usize,
        slots: usize,
    },

    #[error("index slot {slot} names triangle {triangle}, but the mesh has {triangles}")]
    TriangleIndexOutOfBounds {
        slot: usize,
        triangle: usize,
        triangles: usize,
    },

    #[error("triangle {0} is referenced by more than one leaf slot")]
    DuplicateTriangle(usize),

    #[error("triangle {0} is not referenced by any leaf")]
    MissingTriangle(usize),

    #[error("a vertex of triangle {triangle} lies outside the bounds of node {node}")]
    VertexOutsideNode { node: usize, triangle: usize },

    #[error("child {child} lies outside the bounds of its parent {parent}")]
    ChildOutsideParent { parent: usize, child: usize },
}
