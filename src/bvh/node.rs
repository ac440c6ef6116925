//! The flat [`BvhNode`] shared with the GPU.
//!
//! [`BvhNode`]: struct.BvhNode.html
//!

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::aabb::Aabb;
use crate::Point3;

/// One node of a flat BVH, laid out exactly as the shader's std430 struct:
///
/// ```text
/// vec3 min;                  // 12 bytes
/// uint leftChild_Or_FirstTri; //  4 bytes
/// vec3 max;                  // 12 bytes
/// uint triCount;             //  4 bytes
/// ```
///
/// `tri_count == 0` marks an internal node: `left_child_or_first_tri` is the index of its
/// left child inside the mesh's node range and the right child is always the next node.
/// `tri_count > 0` marks a leaf: `left_child_or_first_tri` is the first slot of the mesh's
/// index range and the leaf covers `tri_count` consecutive slots.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BvhNode {
    /// Minimum corner of the node's bounds.
    pub min: [f32; 3],

    /// Left child index for internal nodes, first index slot for leaves.
    pub left_child_or_first_tri: u32,

    /// Maximum corner of the node's bounds.
    pub max: [f32; 3],

    /// Number of triangles in a leaf, `0` for internal nodes.
    pub tri_count: u32,
}

// The shader reads nodes with a 32 byte stride.
const _: () = assert!(std::mem::size_of::<BvhNode>() == 32);

/// A typed view of the two interpretations of a [`BvhNode`].
///
/// [`BvhNode`]: struct.BvhNode.html
///
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An internal node. The right child is `left + 1`.
    Internal { left: u32 },
    /// A leaf over `count` index slots starting at `first`.
    Leaf { first: u32, count: u32 },
}

impl BvhNode {
    /// Creates a leaf over the index slots `first_tri..first_tri + tri_count` with empty bounds.
    pub fn leaf(first_tri: u32, tri_count: u32) -> BvhNode {
        let mut node = BvhNode {
            left_child_or_first_tri: first_tri,
            tri_count,
            ..BvhNode::default()
        };
        node.set_aabb(&Aabb::empty());
        node
    }

    /// Returns true if this node references triangles directly.
    pub fn is_leaf(&self) -> bool {
        self.tri_count > 0
    }

    /// Returns the interpretation of `left_child_or_first_tri`.
    pub fn kind(&self) -> NodeKind {
        if self.is_leaf() {
            NodeKind::Leaf {
                first: self.left_child_or_first_tri,
                count: self.tri_count,
            }
        } else {
            NodeKind::Internal {
                left: self.left_child_or_first_tri,
            }
        }
    }

    /// Returns the indices of the left and right child, or [`None`] for leaves.
    pub fn children(&self) -> Option<(usize, usize)> {
        match self.kind() {
            NodeKind::Internal { left } => Some((left as usize, left as usize + 1)),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Returns the index slots covered by a leaf, or [`None`] for internal nodes.
    pub fn tri_range(&self) -> Option<Range<usize>> {
        match self.kind() {
            NodeKind::Leaf { first, count } => Some(first as usize..first as usize + count as usize),
            NodeKind::Internal { .. } => None,
        }
    }

    /// Turns this node into an internal node whose left child is `left_child`.
    /// The bounds are kept.
    pub fn make_internal(&mut self, left_child: u32) {
        self.left_child_or_first_tri = left_child;
        self.tri_count = 0;
    }

    /// Returns the bounds of this node as an [`Aabb`].
    ///
    /// [`Aabb`]: ../aabb/struct.Aabb.html
    ///
    pub fn aabb(&self) -> Aabb {
        Aabb::with_bounds(Point3::from(self.min), Point3::from(self.max))
    }

    /// Overwrites the bounds of this node.
    pub fn set_aabb(&mut self, aabb: &Aabb) {
        self.min = [aabb.min.x, aabb.min.y, aabb.min.z];
        self.max = [aabb.max.x, aabb.max.y, aabb.max.z];
    }
}
