//! This module defines [`BvhBuilder`], the binned SAH construction of a flat BVH over one
//! range of a triangle buffer.
//!
//! [`BvhBuilder`]: struct.BvhBuilder.html
//!

use log::debug;

use crate::aabb::Aabb;
use crate::axis::Axis;
use crate::bvh::node::BvhNode;
use crate::error::BuildError;
use crate::triangle::Triangle;
use crate::utils::Bin;
use crate::{Point3, Real};

/// Number of bins the split search divides a node's centroid range into.
pub const NUM_BINS: usize = 8;

/// The largest triangle count whose worst case of `2n - 1` nodes still fits a `u32`.
pub const MAX_TRIANGLES: usize = (u32::MAX / 2 + 1) as usize;

/// The best split found for a node by [`BvhBuilder::find_best_split_plane`].
///
/// [`BvhBuilder::find_best_split_plane`]: struct.BvhBuilder.html#method.find_best_split_plane
///
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SplitPlane {
    /// The axis the node is split along.
    pub axis: Axis,

    /// Triangles with a centroid below this coordinate go to the left child.
    pub position: Real,

    /// `left_count * left_area + right_count * right_area` of the binned split.
    pub cost: Real,
}

/// Where a build placed its output in the caller's buffers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Offset of the root node in the node buffer.
    pub first_node: usize,

    /// Number of nodes the tree uses, starting at `first_node`.
    pub node_count: usize,

    /// Offset of the mesh's first slot in the index buffer.
    pub first_index: usize,

    /// Number of index slots written, always the triangle count.
    pub index_count: usize,
}

/// Checks that `first_tri..first_tri + tri_count` is a non-empty range of a buffer of
/// `len` triangles whose tree fits the 32-bit node fields.
pub fn validate_range(len: usize, first_tri: usize, tri_count: usize) -> Result<(), BuildError> {
    if tri_count == 0 {
        return Err(BuildError::EmptyRange);
    }
    if first_tri.checked_add(tri_count).map_or(true, |end| end > len) {
        return Err(BuildError::RangeOutOfBounds {
            first: first_tri,
            count: tri_count,
            len,
        });
    }
    if tri_count > MAX_TRIANGLES {
        return Err(BuildError::TooManyTriangles(tri_count));
    }
    Ok(())
}

/// Builds a BVH over `tri_count` triangles of a borrowed triangle buffer, starting at
/// `first_tri`. A builder is created per mesh and discarded after [`BvhBuilder::build`].
///
/// # Examples
/// ```
/// use tri_bvh::bvh::BvhBuilder;
/// use tri_bvh::triangle::Triangle;
/// use tri_bvh::Point3;
///
/// let triangles = vec![
///     Triangle::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)),
///     Triangle::new(Point3::new(9.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), Point3::new(9.0, 1.0, 0.0)),
/// ];
///
/// let mut nodes = Vec::new();
/// let mut indices = Vec::new();
/// let builder = BvhBuilder::new(&triangles, 0, triangles.len()).unwrap();
/// let output = builder.build(&mut nodes, &mut indices);
///
/// assert_eq!(output.node_count, 3);
/// assert!(!nodes[0].is_leaf());
/// ```
///
/// [`BvhBuilder::build`]: struct.BvhBuilder.html#method.build
///
pub struct BvhBuilder<'a> {
    /// The mesh's triangles, already narrowed to the requested range.
    triangles: &'a [Triangle],
    first_tri: usize,
    /// One centroid per triangle, indexed like `triangles`.
    centroids: Vec<Point3>,
}

/// The mesh's windows into the caller's buffers while a build runs.
struct BuildState<'b> {
    nodes: &'b mut [BvhNode],
    indices: &'b mut [u32],
    nodes_used: usize,
}

impl<'a> BvhBuilder<'a> {
    /// Creates a builder over `buffer[first_tri..first_tri + tri_count]` and precomputes the
    /// centroids of those triangles.
    ///
    /// Fails with [`BuildError::EmptyRange`] for `tri_count == 0`, since no tree exists over
    /// zero primitives.
    ///
    /// [`BuildError::EmptyRange`]: ../error/enum.BuildError.html#variant.EmptyRange
    ///
    pub fn new(
        buffer: &'a [Triangle],
        first_tri: usize,
        tri_count: usize,
    ) -> Result<BvhBuilder<'a>, BuildError> {
        validate_range(buffer.len(), first_tri, tri_count)?;
        let triangles = &buffer[first_tri..first_tri + tri_count];
        let centroids = triangles.iter().map(Triangle::centroid).collect();
        Ok(BvhBuilder {
            triangles,
            first_tri,
            centroids,
        })
    }

    /// Offset of the first triangle of the range in the triangle buffer.
    pub fn first_tri(&self) -> usize {
        self.first_tri
    }

    /// Number of triangles in the range.
    pub fn tri_count(&self) -> usize {
        self.triangles.len()
    }

    /// Builds the tree, appending its nodes to `nodes` and one slot per triangle to `indices`.
    ///
    /// All values written are local to this mesh: child indices count from the returned
    /// `first_node` and leaf slots count from `first_index`. Index entries name triangles
    /// relative to [`first_tri`](#method.first_tri). The node buffer grows by the worst case
    /// of `2n - 1` nodes during the build and is truncated to the nodes actually used.
    pub fn build(&self, nodes: &mut Vec<BvhNode>, indices: &mut Vec<u32>) -> BuildOutput {
        let tri_count = self.tri_count();
        let first_node = nodes.len();
        let first_index = indices.len();

        nodes.resize(first_node + 2 * tri_count - 1, BvhNode::default());
        indices.extend(0..tri_count as u32);

        let mut state = BuildState {
            nodes: &mut nodes[first_node..],
            indices: &mut indices[first_index..],
            nodes_used: 1,
        };
        state.nodes[0] = BvhNode::leaf(0, tri_count as u32);
        self.update_aabb(&mut state, 0);

        // Depth first, left before right, so nodes are numbered as a recursive
        // subdivision would number them.
        let mut depth = 0;
        let mut stack = vec![(0, 0)];
        while let Some((node_index, node_depth)) = stack.pop() {
            depth = depth.max(node_depth);
            if let Some(left_child) = self.subdivide(&mut state, node_index) {
                stack.push((left_child + 1, node_depth + 1));
                stack.push((left_child, node_depth + 1));
            }
        }

        let node_count = state.nodes_used;
        nodes.truncate(first_node + node_count);

        debug!(
            "built BVH over triangles {}..{}: {} nodes, {} leaves, depth {}",
            self.first_tri,
            self.first_tri + tri_count,
            node_count,
            (node_count + 1) / 2,
            depth
        );

        BuildOutput {
            first_node,
            node_count,
            first_index,
            index_count: tri_count,
        }
    }

    /// Searches all three axes for the binned split with the lowest SAH cost over the
    /// triangles named by `indices` (range-local triangle indices).
    ///
    /// Returns [`None`] if the centroids coincide on every axis, in which case no split
    /// can separate them.
    pub fn find_best_split_plane(&self, indices: &[u32]) -> Option<SplitPlane> {
        let mut best: Option<SplitPlane> = None;

        for axis in Axis::ALL {
            let (bounds_min, bounds_max) = self.centroid_bounds(indices, axis);
            if bounds_min == bounds_max {
                continue;
            }

            let mut bins = [Bin::empty(); NUM_BINS];
            let scale = NUM_BINS as Real / (bounds_max - bounds_min);
            for &tri in indices {
                let bin = bin_index(self.centroids[tri as usize][axis], bounds_min, scale);
                bins[bin].add_triangle(&self.triangles[tri as usize]);
            }

            // Sweep from both ends at once. Entry `i` describes the split between
            // bin `i` and bin `i + 1`.
            let mut left_area = [0.0; NUM_BINS - 1];
            let mut right_area = [0.0; NUM_BINS - 1];
            let mut left_count = [0; NUM_BINS - 1];
            let mut right_count = [0; NUM_BINS - 1];
            let mut left = Bin::empty();
            let mut right = Bin::empty();
            for i in 0..NUM_BINS - 1 {
                left = Bin::join_bin(left, &bins[i]);
                left_area[i] = left.aabb.area();
                left_count[i] = left.tri_count;

                right = Bin::join_bin(right, &bins[NUM_BINS - 1 - i]);
                right_area[NUM_BINS - 2 - i] = right.aabb.area();
                right_count[NUM_BINS - 2 - i] = right.tri_count;
            }

            // An empty side has an infinite area and a zero count. Its cost is NaN and
            // never wins the comparison.
            let bin_width = (bounds_max - bounds_min) / NUM_BINS as Real;
            for i in 0..NUM_BINS - 1 {
                let cost = left_count[i] as Real * left_area[i]
                    + right_count[i] as Real * right_area[i];
                if cost < best.map_or(Real::INFINITY, |split| split.cost) {
                    best = Some(SplitPlane {
                        axis,
                        position: bounds_min + bin_width * (i + 1) as Real,
                        cost,
                    });
                }
            }
        }

        best
    }

    /// Recomputes the bounds of the leaf at `node_index` from its triangles' vertices.
    fn update_aabb(&self, state: &mut BuildState, node_index: usize) {
        let Some(range) = state.nodes[node_index].tri_range() else {
            return;
        };

        let mut aabb = Aabb::empty();
        for &tri in &state.indices[range] {
            let triangle = &self.triangles[tri as usize];
            aabb.grow_mut(&triangle.v0);
            aabb.grow_mut(&triangle.v1);
            aabb.grow_mut(&triangle.v2);
        }
        state.nodes[node_index].set_aabb(&aabb);
    }

    /// Splits the leaf at `node_index` if the best binned split is cheaper than the leaf.
    /// Returns the index of the new left child; the right child follows it.
    fn subdivide(&self, state: &mut BuildState, node_index: usize) -> Option<usize> {
        let node = state.nodes[node_index];
        let range = node.tri_range()?;
        let tri_count = range.len();
        if tri_count < 2 {
            return None;
        }

        let split = self.find_best_split_plane(&state.indices[range.clone()])?;
        let parent_cost = tri_count as Real * node.aabb().area();
        if split.cost >= parent_cost {
            return None;
        }

        let left_count = self.partition(&mut state.indices[range.clone()], split.axis, split.position);
        // Bin boundaries and the split position can disagree on coincident centroids.
        if left_count == 0 || left_count == tri_count {
            return None;
        }

        let left_child = state.nodes_used;
        state.nodes_used += 2;
        state.nodes[left_child] = BvhNode::leaf(range.start as u32, left_count as u32);
        state.nodes[left_child + 1] = BvhNode::leaf(
            (range.start + left_count) as u32,
            (tri_count - left_count) as u32,
        );
        self.update_aabb(state, left_child);
        self.update_aabb(state, left_child + 1);
        state.nodes[node_index].make_internal(left_child as u32);

        Some(left_child)
    }

    /// Partitions `indices` in place so that triangles whose centroid lies below `position`
    /// on `axis` come first. Returns the size of that group.
    fn partition(&self, indices: &mut [u32], axis: Axis, position: Real) -> usize {
        let mut left = 0;
        // One past the last unclassified slot.
        let mut right = indices.len();
        while left < right {
            if self.centroids[indices[left] as usize][axis] < position {
                left += 1;
            } else {
                right -= 1;
                indices.swap(left, right);
            }
        }
        left
    }

    /// Returns the minimum and maximum centroid coordinate on `axis`.
    fn centroid_bounds(&self, indices: &[u32], axis: Axis) -> (Real, Real) {
        indices.iter().fold(
            (Real::INFINITY, Real::NEG_INFINITY),
            |(bounds_min, bounds_max), &tri| {
                let c = self.centroids[tri as usize][axis];
                (bounds_min.min(c), bounds_max.max(c))
            },
        )
    }
}

/// Maps a centroid coordinate to its bin, `floor((c - min) * scale)` clamped to the bins.
fn bin_index(c: Real, bounds_min: Real, scale: Real) -> usize {
    num_traits::clamp(((c - bounds_min) * scale).floor(), 0.0, (NUM_BINS - 1) as Real) as usize
}


#[cfg(all(feature = "bench", test))]
mod bench {
    use crate::testbase::build_n_triangles;

    #[bench]
    /// Benchmark the construction of a BVH with 1,200 triangles.
    fn bench_build_1200_triangles(b: &mut ::test::Bencher) {
        build_n_triangles(100, b);
    }

    #[bench]
    /// Benchmark the construction of a BVH with 12,000 triangles.
    fn bench_build_12k_triangles(b: &mut ::test::Bencher) {
        build_n_triangles(1_000, b);
    }

    #[bench]
    /// Benchmark the construction of a BVH with 120,000 triangles.
    fn bench_build_120k_triangles(b: &mut ::test::Bencher) {
        build_n_triangles(10_000, b);
    }
}
