//! Read-only inspection of one mesh's BVH, including the structural consistency checks.

use std::ops::Range;

use log::info;

use crate::aabb::Aabb;
use crate::bvh::node::BvhNode;
use crate::error::ValidationError;
use crate::triangle::Triangle;
use crate::Real;

/// A view over the node, index and triangle slices that belong to one mesh.
///
/// All three slices start at the mesh's offsets, so child indices, leaf slots and
/// index entries can be used to address them directly.
///
/// # Examples
/// ```
/// use tri_bvh::bvh::{BvhBuilder, MeshBvh};
/// use tri_bvh::triangle::Triangle;
/// use tri_bvh::Point3;
///
/// let triangles: Vec<Triangle> = (0..16)
///     .map(|i| {
///         let x = i as f32 * 3.0;
///         Triangle::new(
///             Point3::new(x, 0.0, 0.0),
///             Point3::new(x + 1.0, 0.0, 0.0),
///             Point3::new(x, 1.0, 0.0),
///         )
///     })
///     .collect();
///
/// let (mut nodes, mut indices) = (Vec::new(), Vec::new());
/// BvhBuilder::new(&triangles, 0, triangles.len())
///     .unwrap()
///     .build(&mut nodes, &mut indices);
///
/// let bvh = MeshBvh::new(&nodes, &indices, &triangles);
/// assert_eq!(bvh.validate(), Ok(()));
/// assert_eq!(bvh.stats().leaf_count, bvh.leaf_count());
/// ```
#[derive(Debug, Copy, Clone)]
pub struct MeshBvh<'a> {
    nodes: &'a [BvhNode],
    indices: &'a [u32],
    triangles: &'a [Triangle],
}

/// Summary figures of a built tree.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BvhStats {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Number of edges on the longest root to leaf path.
    pub depth: usize,
    pub min_leaf_size: usize,
    pub max_leaf_size: usize,
    pub avg_leaf_size: Real,
    /// Expected traversal cost relative to the root: one unit per internal node visit and
    /// one per triangle test, each weighted by the node's area over the root's area.
    pub sah_cost: Real,
}

impl<'a> MeshBvh<'a> {
    /// Creates a view. `nodes` starts at the mesh's root, `indices` at its first slot and
    /// `triangles` at its first triangle.
    pub fn new(nodes: &'a [BvhNode], indices: &'a [u32], triangles: &'a [Triangle]) -> Self {
        MeshBvh {
            nodes,
            indices,
            triangles,
        }
    }

    pub fn nodes(&self) -> &'a [BvhNode] {
        self.nodes
    }

    pub fn indices(&self) -> &'a [u32] {
        self.indices
    }

    pub fn triangles(&self) -> &'a [Triangle] {
        self.triangles
    }

    /// Returns the root node, or [`None`] if the view holds no nodes.
    pub fn root(&self) -> Option<&'a BvhNode> {
        self.nodes.first()
    }

    pub fn node(&self, node_index: usize) -> Option<&'a BvhNode> {
        self.nodes.get(node_index)
    }

    /// Returns the child indices of an internal node.
    pub fn children(&self, node_index: usize) -> Option<(usize, usize)> {
        self.node(node_index)?.children()
    }

    /// Iterates the triangles of a leaf in slot order. Internal nodes yield nothing.
    ///
    /// # Panics
    /// Panics if `node_index` is out of range or the leaf points outside the index slice.
    pub fn leaf_triangles(&self, node_index: usize) -> impl Iterator<Item = &'a Triangle> + 'a {
        let slots = self.nodes[node_index].tri_range().unwrap_or(0..0);
        let indices = self.indices;
        let triangles = self.triangles;
        indices[slots]
            .iter()
            .map(move |&tri| &triangles[tri as usize])
    }

    /// Returns the index slots covered by the subtree below `node_index`.
    ///
    /// Partitioning keeps every subtree's slots contiguous, so the range runs from the
    /// first slot of the leftmost leaf to the end of the rightmost leaf.
    pub fn subtree_range(&self, node_index: usize) -> Range<usize> {
        let start = self
            .outermost_leaf(node_index, |(left, _)| left)
            .and_then(|leaf| leaf.tri_range())
            .map_or(0, |range| range.start);
        let end = self
            .outermost_leaf(node_index, |(_, right)| right)
            .and_then(|leaf| leaf.tri_range())
            .map_or(0, |range| range.end);
        start..end.max(start)
    }

    /// Follows one side of the tree down to a leaf. Gives up after as many steps as there
    /// are nodes, which only a cyclic tree would need.
    fn outermost_leaf(
        &self,
        node_index: usize,
        side: impl Fn((usize, usize)) -> usize,
    ) -> Option<&'a BvhNode> {
        let mut node = self.node(node_index)?;
        for _ in 0..self.nodes.len() {
            match node.children() {
                Some(children) => node = self.node(side(children))?,
                None => return Some(node),
            }
        }
        None
    }

    /// Returns the number of edges on the longest path from the root to a leaf.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        self.visit_reachable(|_, node_depth| depth = depth.max(node_depth));
        depth
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Collects summary figures over all reachable nodes.
    pub fn stats(&self) -> BvhStats {
        let root_area = self.root().map_or(0.0, |root| root.aabb().area());
        let mut stats = BvhStats {
            node_count: 0,
            leaf_count: 0,
            depth: 0,
            min_leaf_size: usize::MAX,
            max_leaf_size: 0,
            avg_leaf_size: 0.0,
            sah_cost: 0.0,
        };

        let mut weighted_cost: Real = 0.0;
        let mut leaf_triangles = 0;
        self.visit_reachable(|node, depth| {
            stats.node_count += 1;
            stats.depth = stats.depth.max(depth);
            let area = node.aabb().area();
            if node.is_leaf() {
                let size = node.tri_count as usize;
                stats.leaf_count += 1;
                stats.min_leaf_size = stats.min_leaf_size.min(size);
                stats.max_leaf_size = stats.max_leaf_size.max(size);
                leaf_triangles += size;
                weighted_cost += size as Real * area;
            } else {
                weighted_cost += area;
            }
        });

        if stats.leaf_count == 0 {
            stats.min_leaf_size = 0;
        } else {
            stats.avg_leaf_size = leaf_triangles as Real / stats.leaf_count as Real;
        }
        // A flat root has no area to weigh by; every triangle is tested.
        stats.sah_cost = if root_area > 0.0 {
            weighted_cost / root_area
        } else {
            leaf_triangles as Real
        };
        stats
    }

    /// Checks the structural properties every built tree has:
    ///
    /// - the index slice holds one entry per triangle,
    /// - `1 <= nodes <= 2 * triangles - 1`,
    /// - every child index is in range and every node is reached exactly once,
    /// - leaves cover every triangle exactly once,
    /// - every vertex lies inside its leaf and every child inside its parent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let tri_count = self.triangles.len();
        let node_count = self.nodes.len();

        if self.indices.len() != tri_count {
            return Err(ValidationError::IndexCountMismatch {
                indices: self.indices.len(),
                triangles: tri_count,
            });
        }
        let max_nodes = (2 * tri_count).saturating_sub(1);
        if node_count == 0 || node_count > max_nodes {
            return Err(ValidationError::NodeCountOutOfBounds {
                nodes: node_count,
                max: max_nodes,
                triangles: tri_count,
            });
        }

        let mut visited = vec![false; node_count];
        let mut referenced = vec![false; tri_count];
        visited[0] = true;
        let mut stack = vec![0];

        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index];
            let aabb = node.aabb();

            if let Some((left, right)) = node.children() {
                if right >= node_count {
                    return Err(ValidationError::ChildOutOfBounds {
                        node: node_index,
                        left,
                        nodes: node_count,
                    });
                }
                for child in [left, right] {
                    if visited[child] {
                        return Err(ValidationError::NodeVisitedTwice(child));
                    }
                    visited[child] = true;
                    if !aabb.contains_aabb(&self.nodes[child].aabb()) {
                        return Err(ValidationError::ChildOutsideParent {
                            parent: node_index,
                            child,
                        });
                    }
                }
                stack.push(right);
                stack.push(left);
                continue;
            }

            let slots = node.tri_range().unwrap_or(0..0);
            if slots.end > tri_count {
                return Err(ValidationError::LeafRangeOutOfBounds {
                    node: node_index,
                    first: slots.start,
                    count: slots.len(),
                    slots: tri_count,
                });
            }
            for slot in slots {
                let tri = self.indices[slot] as usize;
                if tri >= tri_count {
                    return Err(ValidationError::TriangleIndexOutOfBounds {
                        slot,
                        triangle: tri,
                        triangles: tri_count,
                    });
                }
                if referenced[tri] {
                    return Err(ValidationError::DuplicateTriangle(tri));
                }
                referenced[tri] = true;
                if !self.triangles[tri].vertices().iter().all(|v| aabb.contains(v)) {
                    return Err(ValidationError::VertexOutsideNode {
                        node: node_index,
                        triangle: tri,
                    });
                }
            }
        }

        if let Some(node) = visited.iter().position(|&seen| !seen) {
            return Err(ValidationError::UnreachableNode(node));
        }
        if let Some(tri) = referenced.iter().position(|&seen| !seen) {
            return Err(ValidationError::MissingTriangle(tri));
        }
        Ok(())
    }

    /// Panics with the first broken property if [`validate`](#method.validate) fails.
    pub fn assert_consistent(&self) {
        if let Err(err) = self.validate() {
            panic!("inconsistent BVH: {}", err);
        }
    }

    /// Logs the tree at info level, one line per node, indented by depth.
    pub fn pretty_print(&self) {
        self.visit_reachable(|node, depth| {
            let padding = " ".repeat(depth);
            let aabb: Aabb = node.aabb();
            match node.tri_range() {
                Some(slots) => info!("{}leaf slots={:?} {}", padding, slots, aabb),
                None => info!(
                    "{}node left={} {}",
                    padding, node.left_child_or_first_tri, aabb
                ),
            }
        });
    }

    /// Visits every node reachable from the root in depth-first order, left before right,
    /// with its depth. Child indices outside the slice and revisits are skipped.
    fn visit_reachable(&self, mut visit: impl FnMut(&'a BvhNode, usize)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![(0, 0)];
        while let Some((node_index, depth)) = stack.pop() {
            if visited[node_index] {
                continue;
            }
            visited[node_index] = true;
            let node = &self.nodes[node_index];
            visit(node, depth);
            if let Some((left, right)) = node.children() {
                if right < self.nodes.len() {
                    stack.push((right, depth + 1));
                    stack.push((left, depth + 1));
                }
            }
        }
    }
}
