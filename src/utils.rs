//! Utilities module.

use crate::aabb::Aabb;
use crate::triangle::Triangle;

/// Defines a Bin utility object. Used to accumulate the triangles whose centroids fall
/// into one interval of the split axis during the SAH split search.
#[derive(Clone, Copy, Debug)]
pub struct Bin {
    /// The number of triangles in this [`Bin`].
    pub tri_count: u32,

    /// The joint [`Aabb`] of the triangles in this [`Bin`].
    pub aabb: Aabb,
}

impl Bin {
    /// Returns an empty bin.
    pub fn empty() -> Bin {
        Bin {
            tri_count: 0,
            aabb: Aabb::empty(),
        }
    }

    /// Extend this [`Bin`] by the three vertices of `triangle`.
    pub fn add_triangle(&mut self, triangle: &Triangle) {
        self.tri_count += 1;
        self.aabb.grow_mut(&triangle.v0);
        self.aabb.grow_mut(&triangle.v1);
        self.aabb.grow_mut(&triangle.v2);
    }

    /// Join the contents of two [`Bin`]s.
    pub fn join_bin(a: Bin, b: &Bin) -> Bin {
        Bin {
            tri_count: a.tri_count + b.tri_count,
            aabb: a.aabb.join(&b.aabb),
        }
    }
}
