//! Axis Aligned Bounding Boxes.

use std::fmt;

use crate::axis::Axis;
use crate::{Point3, Real, Vector3};

/// An axis aligned bounding box.
///
/// The empty box has `min = +inf` and `max = -inf` on every axis, so growing it by any
/// point yields the box around exactly that point.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Minimum coordinates
    pub min: Point3,

    /// Maximum coordinates
    pub max: Point3,
}

impl fmt::Display for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Min bound: {}; Max bound: {}", self.min, self.max)
    }
}

impl Default for Aabb {
    fn default() -> Aabb {
        Aabb::empty()
    }
}

impl Aabb {
    /// Creates a new [`Aabb`] with the given bounds.
    ///
    /// # Examples
    /// ```
    /// use tri_bvh::aabb::Aabb;
    /// use tri_bvh::Point3;
    ///
    /// let aabb = Aabb::with_bounds(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
    /// assert_eq!(aabb.min.x, -1.0);
    /// assert_eq!(aabb.max.z, 1.0);
    /// ```
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn with_bounds(min: Point3, max: Point3) -> Aabb {
        Aabb { min, max }
    }

    /// Creates a new empty [`Aabb`].
    ///
    /// # Examples
    /// ```
    /// use tri_bvh::aabb::Aabb;
    ///
    /// let aabb = Aabb::empty();
    /// assert!(aabb.is_empty());
    /// ```
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn empty() -> Aabb {
        Aabb {
            min: Point3::new(Real::INFINITY, Real::INFINITY, Real::INFINITY),
            max: Point3::new(Real::NEG_INFINITY, Real::NEG_INFINITY, Real::NEG_INFINITY),
        }
    }

    /// Returns true if the box has not been grown by anything yet, or was built
    /// with inverted bounds.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Returns a new minimal [`Aabb`] which contains both this [`Aabb`] and the point `other`.
    ///
    /// # Examples
    /// ```
    /// use tri_bvh::aabb::Aabb;
    /// use tri_bvh::Point3;
    ///
    /// let point1 = Point3::new(0.0, 0.0, 0.0);
    /// let point2 = Point3::new(1.0, 1.0, 1.0);
    ///
    /// let aabb = Aabb::empty().grow(&point1).grow(&point2);
    /// assert!(aabb.contains(&Point3::new(0.5, 0.5, 0.5)));
    /// ```
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn grow(&self, other: &Point3) -> Aabb {
        Aabb::with_bounds(self.min.inf(other), self.max.sup(other))
    }

    /// Mutable version of [`Aabb::grow`].
    ///
    /// [`Aabb::grow`]: struct.Aabb.html#method.grow
    ///
    pub fn grow_mut(&mut self, other: &Point3) {
        self.min = self.min.inf(other);
        self.max = self.max.sup(other);
    }

    /// Returns a new minimal [`Aabb`] which contains both this [`Aabb`] and `other`.
    /// Joining with an empty [`Aabb`] returns the other box unchanged.
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn join(&self, other: &Aabb) -> Aabb {
        Aabb::with_bounds(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Mutable version of [`Aabb::join`].
    ///
    /// [`Aabb::join`]: struct.Aabb.html#method.join
    ///
    pub fn join_mut(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Returns the size of this [`Aabb`] in all three dimensions.
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    /// Returns the center [`Point3`] of the [`Aabb`].
    ///
    /// [`Aabb`]: struct.Aabb.html
    /// [`Point3`]: ../type.Point3.html
    ///
    pub fn center(&self) -> Point3 {
        self.min + (self.size() / 2.0)
    }

    /// Returns half the surface area of this [`Aabb`], `sx*sy + sy*sz + sz*sx`.
    ///
    /// The SAH only ever compares costs against each other, so the factor of two is
    /// dropped. The result is meaningless for an empty box.
    ///
    /// # Examples
    /// ```
    /// use tri_bvh::aabb::Aabb;
    /// use tri_bvh::Point3;
    ///
    /// let aabb = Aabb::with_bounds(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(aabb.area(), 1.0 * 2.0 + 2.0 * 3.0 + 3.0 * 1.0);
    /// ```
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn area(&self) -> Real {
        let s = self.size();
        s.x * s.y + s.y * s.z + s.z * s.x
    }

    /// Returns the total surface area of this [`Aabb`].
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn surface_area(&self) -> Real {
        2.0 * self.area()
    }

    /// Returns the axis along which the [`Aabb`] is stretched the most.
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn largest_axis(&self) -> Axis {
        let size = self.size();
        if size.x > size.y && size.x > size.z {
            Axis::X
        } else if size.y > size.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Returns true if the [`Point3`] is inside the [`Aabb`], bounds included.
    ///
    /// [`Aabb`]: struct.Aabb.html
    /// [`Point3`]: ../type.Point3.html
    ///
    pub fn contains(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns true if the [`Point3`] is approximately inside the [`Aabb`]
    /// with respect to some `epsilon`.
    ///
    /// [`Aabb`]: struct.Aabb.html
    /// [`Point3`]: ../type.Point3.html
    ///
    pub fn approx_contains_eps(&self, p: &Point3, epsilon: Real) -> bool {
        (p.x - self.min.x) > -epsilon
            && (p.x - self.max.x) < epsilon
            && (p.y - self.min.y) > -epsilon
            && (p.y - self.max.y) < epsilon
            && (p.z - self.min.z) > -epsilon
            && (p.z - self.max.z) < epsilon
    }

    /// Returns true if `other` lies completely inside this [`Aabb`], bounds included.
    /// An empty `other` is contained in every box.
    ///
    /// [`Aabb`]: struct.Aabb.html
    ///
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        other.is_empty() || (self.contains(&other.min) && self.contains(&other.max))
    }
}
