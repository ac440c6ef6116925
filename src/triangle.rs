//! This module defines the [`Triangle`] primitive the builder consumes and its GPU upload form.
//!
//! [`Triangle`]: struct.Triangle.html
//!

use bytemuck::{Pod, Zeroable};

use crate::aabb::Aabb;
use crate::{Point3, Real};

/// A triangle in object space. Triangles are immutable once they are in a triangle buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    /// First vertex of the triangle
    pub v0: Point3,
    /// Second vertex of the triangle
    pub v1: Point3,
    /// Third vertex of the triangle
    pub v2: Point3,
}

impl Triangle {
    /// Creates a new triangle from its three vertices.
    pub fn new(v0: Point3, v1: Point3, v2: Point3) -> Triangle {
        Triangle { v0, v1, v2 }
    }

    /// Returns the three vertices in order.
    pub fn vertices(&self) -> [Point3; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Returns the average of the three vertices.
    ///
    /// # Examples
    /// ```
    /// use tri_bvh::triangle::Triangle;
    /// use tri_bvh::Point3;
    ///
    /// let triangle = Triangle::new(
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(3.0, 0.0, 0.0),
    ///     Point3::new(0.0, 3.0, 0.0),
    /// );
    /// assert_eq!(triangle.centroid(), Point3::new(1.0, 1.0, 0.0));
    /// ```
    pub fn centroid(&self) -> Point3 {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Returns the tight [`Aabb`] around the three vertices.
    ///
    /// [`Aabb`]: ../aabb/struct.Aabb.html
    ///
    pub fn aabb(&self) -> Aabb {
        Aabb::empty().grow(&self.v0).grow(&self.v1).grow(&self.v2)
    }
}

/// The std430 layout of a [`Triangle`] in a shader storage buffer: three `vec4`s, 48 bytes.
/// The `w` component of every vertex is padding and always written as `0.0`.
///
/// [`Triangle`]: struct.Triangle.html
///
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuTriangle {
    pub v0: [Real; 4],
    pub v1: [Real; 4],
    pub v2: [Real; 4],
}

const _: () = assert!(std::mem::size_of::<GpuTriangle>() == 48);

impl From<&Triangle> for GpuTriangle {
    fn from(triangle: &Triangle) -> GpuTriangle {
        let pad = |p: &Point3| [p.x, p.y, p.z, 0.0];
        GpuTriangle {
            v0: pad(&triangle.v0),
            v1: pad(&triangle.v1),
            v2: pad(&triangle.v2),
        }
    }
}

impl From<Triangle> for GpuTriangle {
    fn from(triangle: Triangle) -> GpuTriangle {
        GpuTriangle::from(&triangle)
    }
}
