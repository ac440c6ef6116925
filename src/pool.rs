//! This module defines the [`GeometryPool`], the shared triangle, node and index buffers of
//! all loaded meshes, in the form a renderer uploads them.
//!
//! [`GeometryPool`]: struct.GeometryPool.html
//!

use std::fmt;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use log::info;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::bvh::{validate_range, BuildOutput, BvhBuilder, BvhNode, MeshBvh};
use crate::error::BuildError;
use crate::triangle::{GpuTriangle, Triangle};

/// Identifies a mesh by its position in [`GeometryPool::meshes`].
///
/// [`GeometryPool::meshes`]: struct.GeometryPool.html#method.meshes
///
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(usize);

impl MeshId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Where one mesh lives in the pool's buffers. Uploaded as is, 16 bytes per mesh.
///
/// The index buffer grows in step with the triangle buffer, so a mesh's index slots
/// start at `first_tri` as well. A renderer resolves leaf slot `i` of the mesh to
/// `triangles[first_tri + indices[first_tri + i]]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshRange {
    pub first_tri: u32,
    pub tri_count: u32,
    pub first_node: u32,
    pub node_count: u32,
}

impl MeshRange {
    pub fn tri_range(&self) -> Range<usize> {
        self.first_tri as usize..self.first_tri as usize + self.tri_count as usize
    }

    pub fn node_range(&self) -> Range<usize> {
        self.first_node as usize..self.first_node as usize + self.node_count as usize
    }
}

/// The buffers whose changes a renderer tracks separately.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Triangles = 0,
    Nodes = 1,
    Indices = 2,
    Meshes = 3,
}

impl BufferKind {
    pub const ALL: [BufferKind; 4] = [
        BufferKind::Triangles,
        BufferKind::Nodes,
        BufferKind::Indices,
        BufferKind::Meshes,
    ];
}

/// Owns the triangles, BVH nodes and index permutations of every mesh added to it.
///
/// Every buffer only ever grows until [`clear`](#method.clear). Each change bumps the
/// version of the touched buffers, so a renderer re-uploads a buffer when its
/// [`version`](#method.version) differs from the one it uploaded last.
///
/// # Examples
/// ```
/// use tri_bvh::pool::{BufferKind, GeometryPool};
/// use tri_bvh::triangle::Triangle;
/// use tri_bvh::Point3;
///
/// let quad = vec![
///     Triangle::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)),
///     Triangle::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0), Point3::new(0.0, 1.0, 0.0)),
/// ];
///
/// let mut pool = GeometryPool::new();
/// let id = pool.add_mesh(&quad).unwrap();
///
/// assert_eq!(pool.mesh(id).unwrap().tri_count, 2);
/// assert_eq!(pool.bvh(id).unwrap().validate(), Ok(()));
/// assert_eq!(pool.version(BufferKind::Nodes), 1);
/// assert_eq!(pool.node_bytes().len(), 32 * pool.nodes().len());
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GeometryPool {
    triangles: Vec<Triangle>,
    nodes: Vec<BvhNode>,
    indices: Vec<u32>,
    meshes: Vec<MeshRange>,
    versions: [u32; 4],
}

impl GeometryPool {
    pub fn new() -> GeometryPool {
        GeometryPool::default()
    }

    /// Appends `triangles` as a new mesh and builds its BVH directly into the shared buffers.
    ///
    /// An empty mesh is rejected with [`BuildError::EmptyRange`] and leaves the pool as it was.
    ///
    /// [`BuildError::EmptyRange`]: ../error/enum.BuildError.html#variant.EmptyRange
    ///
    pub fn add_mesh(&mut self, triangles: &[Triangle]) -> Result<MeshId, BuildError> {
        self.check_capacity(triangles.len(), 1)?;

        let first_tri = self.triangles.len();
        self.triangles.extend_from_slice(triangles);
        let builder = BvhBuilder::new(&self.triangles, first_tri, triangles.len())?;
        let output = builder.build(&mut self.nodes, &mut self.indices);

        Ok(self.record_mesh(first_tri, output))
    }

    /// Adds several meshes at once. With the `rayon` feature each tree is built in parallel
    /// into private buffers, which are then appended in order.
    ///
    /// The pool ends up exactly as after calling [`add_mesh`](#method.add_mesh) for each mesh
    /// in turn. If any mesh is rejected, none is added.
    pub fn add_meshes(&mut self, meshes: &[Vec<Triangle>]) -> Result<Vec<MeshId>, BuildError> {
        let total: usize = meshes.iter().map(Vec::len).sum();
        for mesh in meshes {
            validate_range(mesh.len(), 0, mesh.len())?;
        }
        if !meshes.is_empty() {
            self.check_capacity(total, meshes.len())?;
        }

        #[cfg(feature = "rayon")]
        let built = meshes
            .par_iter()
            .map(|mesh| build_private(mesh))
            .collect::<Result<Vec<_>, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let built = meshes
            .iter()
            .map(|mesh| build_private(mesh))
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids = Vec::with_capacity(meshes.len());
        for (mesh, (nodes, indices)) in meshes.iter().zip(built) {
            let first_tri = self.triangles.len();
            let output = BuildOutput {
                first_node: self.nodes.len(),
                node_count: nodes.len(),
                first_index: self.indices.len(),
                index_count: indices.len(),
            };
            self.triangles.extend_from_slice(mesh);
            self.nodes.extend_from_slice(&nodes);
            self.indices.extend_from_slice(&indices);
            ids.push(self.record_mesh(first_tri, output));
        }
        Ok(ids)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshRange> {
        self.meshes.get(id.0)
    }

    pub fn meshes(&self) -> &[MeshRange] {
        &self.meshes
    }

    /// Returns a view of one mesh's tree over its own slices of the shared buffers.
    pub fn bvh(&self, id: MeshId) -> Option<MeshBvh<'_>> {
        let mesh = self.mesh(id)?;
        Some(MeshBvh::new(
            &self.nodes[mesh.node_range()],
            &self.indices[mesh.tri_range()],
            &self.triangles[mesh.tri_range()],
        ))
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The node buffer as uploaded, 32 bytes per node.
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// The index buffer as uploaded, 4 bytes per slot.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// The mesh records as uploaded, 16 bytes per mesh.
    pub fn mesh_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.meshes)
    }

    /// The triangle buffer converted to [`GpuTriangle`]s, 48 bytes per triangle.
    ///
    /// [`GpuTriangle`]: ../triangle/struct.GpuTriangle.html
    ///
    pub fn triangle_bytes(&self) -> Vec<u8> {
        let gpu: Vec<GpuTriangle> = self.triangles.iter().map(GpuTriangle::from).collect();
        bytemuck::cast_slice(&gpu).to_vec()
    }

    /// Returns how often a buffer has changed. Starts at `0` and wraps around.
    pub fn version(&self, kind: BufferKind) -> u32 {
        self.versions[kind as usize]
    }

    /// Removes all meshes. Every buffer counts as changed.
    pub fn clear(&mut self) {
        self.triangles.clear();
        self.nodes.clear();
        self.indices.clear();
        self.meshes.clear();
        for kind in BufferKind::ALL {
            self.mark_updated(kind);
        }
    }

    fn mark_updated(&mut self, kind: BufferKind) {
        let version = &mut self.versions[kind as usize];
        *version = version.wrapping_add(1);
    }

    /// Rejects an empty mesh, and any addition after which the shared buffers would
    /// outgrow the 32-bit offsets of [`MeshRange`].
    fn check_capacity(&self, tri_count: usize, mesh_count: usize) -> Result<(), BuildError> {
        validate_range(tri_count, 0, tri_count)?;
        let triangles = self.triangles.len() + tri_count;
        // Each mesh needs at most `2n - 1` nodes.
        let nodes = self.nodes.len() + 2 * tri_count - mesh_count;
        if triangles > u32::MAX as usize || nodes > u32::MAX as usize {
            return Err(BuildError::TooManyTriangles(triangles));
        }
        Ok(())
    }

    fn record_mesh(&mut self, first_tri: usize, output: BuildOutput) -> MeshId {
        let id = MeshId(self.meshes.len());
        let range = MeshRange {
            first_tri: first_tri as u32,
            tri_count: output.index_count as u32,
            first_node: output.first_node as u32,
            node_count: output.node_count as u32,
        };
        self.meshes.push(range);
        for kind in BufferKind::ALL {
            self.mark_updated(kind);
        }

        info!(
            "added {}: {} triangles at {}, {} BVH nodes at {}",
            id, range.tri_count, range.first_tri, range.node_count, range.first_node
        );
        id
    }
}

/// Builds one mesh's tree into fresh buffers.
fn build_private(triangles: &[Triangle]) -> Result<(Vec<BvhNode>, Vec<u32>), BuildError> {
    let builder = BvhBuilder::new(triangles, 0, triangles.len())?;
    let mut nodes = Vec::new();
    let mut indices = Vec::new();
    builder.build(&mut nodes, &mut indices);
    Ok((nodes, indices))
}

#[cfg(test)]
mod tests {
    use super::{BufferKind, GeometryPool, MeshId, MeshRange};
    use crate::aabb::Aabb;
    use crate::error::BuildError;
    use crate::testbase::{create_n_cubes, default_bounds, random_soup, soup_strategy};
    use crate::triangle::Triangle;

    use proptest::prelude::*;

    fn scene() -> Vec<Vec<Triangle>> {
        vec![
            create_n_cubes(10, &default_bounds()),
            random_soup(7, 300),
            create_n_cubes(1, &default_bounds()),
            random_soup(8, 1),
        ]
    }

    #[test]
    fn test_add_mesh_records_ranges() {
        let meshes = scene();
        let mut pool = GeometryPool::new();
        let ids: Vec<MeshId> = meshes
            .iter()
            .map(|mesh| pool.add_mesh(mesh).unwrap())
            .collect();

        assert_eq!(ids.iter().map(|id| id.index()).collect::<Vec<_>>(), [0, 1, 2, 3]);
        assert_eq!(pool.meshes().len(), 4);
        assert_eq!(pool.triangles().len(), pool.indices().len());

        let mut first_tri = 0;
        let mut first_node = 0;
        for (id, mesh) in ids.iter().zip(&meshes) {
            let range = *pool.mesh(*id).unwrap();
            assert_eq!(range.first_tri as usize, first_tri);
            assert_eq!(range.tri_count as usize, mesh.len());
            assert_eq!(range.first_node as usize, first_node);
            first_tri += mesh.len();
            first_node += range.node_count as usize;

            let bvh = pool.bvh(*id).unwrap();
            assert_eq!(bvh.triangles(), &mesh[..]);
            bvh.assert_consistent();
        }
        assert_eq!(pool.nodes().len(), first_node);
        assert_eq!(pool.mesh(MeshId(4)), None);
        assert!(pool.bvh(MeshId(4)).is_none());
    }

    #[test]
    /// Leaves resolve to the right triangles through the global buffers, as a shader reads them.
    fn test_global_lookup_matches_leaf_bounds() {
        let mut pool = GeometryPool::new();
        pool.add_meshes(&scene()).unwrap();

        for range in pool.meshes() {
            let nodes = &pool.nodes()[range.node_range()];
            for node in nodes.iter().filter(|node| node.is_leaf()) {
                let aabb: Aabb = node.aabb();
                for slot in node.tri_range().unwrap() {
                    let local = pool.indices()[range.first_tri as usize + slot];
                    let triangle = pool.triangles()[range.first_tri as usize + local as usize];
                    assert!(triangle.vertices().iter().all(|v| aabb.contains(v)));
                }
            }
        }
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let mut pool = GeometryPool::new();
        pool.add_mesh(&create_n_cubes(2, &default_bounds())).unwrap();
        let before = pool.clone();

        assert_eq!(pool.add_mesh(&[]), Err(BuildError::EmptyRange));
        assert_eq!(pool, before);

        let meshes = vec![random_soup(1, 10), Vec::new()];
        assert_eq!(pool.add_meshes(&meshes), Err(BuildError::EmptyRange));
        assert_eq!(pool, before);

        assert_eq!(pool.add_meshes(&[]), Ok(Vec::new()));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_versions_and_clear() {
        let mut pool = GeometryPool::new();
        for kind in BufferKind::ALL {
            assert_eq!(pool.version(kind), 0);
        }

        pool.add_mesh(&random_soup(3, 20)).unwrap();
        pool.add_mesh(&random_soup(4, 20)).unwrap();
        for kind in BufferKind::ALL {
            assert_eq!(pool.version(kind), 2);
        }

        pool.clear();
        assert!(pool.meshes().is_empty());
        assert!(pool.triangles().is_empty());
        assert!(pool.nodes().is_empty());
        assert!(pool.indices().is_empty());
        for kind in BufferKind::ALL {
            assert_eq!(pool.version(kind), 3);
        }
    }

    #[test]
    fn test_byte_views() {
        let mut pool = GeometryPool::new();
        pool.add_meshes(&scene()).unwrap();

        assert_eq!(pool.node_bytes().len(), 32 * pool.nodes().len());
        assert_eq!(pool.index_bytes().len(), 4 * pool.indices().len());
        assert_eq!(pool.mesh_bytes().len(), 16 * pool.meshes().len());
        assert_eq!(pool.triangle_bytes().len(), 48 * pool.triangles().len());

        let meshes: &[MeshRange] = bytemuck::cast_slice(pool.mesh_bytes());
        assert_eq!(meshes, pool.meshes());

        let floats: Vec<f32> = pool
            .triangle_bytes()
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let first = pool.triangles()[0];
        assert_eq!(floats[0..4], [first.v0.x, first.v0.y, first.v0.z, 0.0]);
        assert_eq!(floats[8..12], [first.v2.x, first.v2.y, first.v2.z, 0.0]);
    }

    #[test]
    fn test_add_meshes_matches_sequential_adds() {
        let meshes = scene();
        let mut sequential = GeometryPool::new();
        for mesh in &meshes {
            sequential.add_mesh(mesh).unwrap();
        }

        let mut batched = GeometryPool::new();
        let ids = batched.add_meshes(&meshes).unwrap();
        assert_eq!(ids.len(), meshes.len());
        assert_eq!(batched, sequential);
    }

    proptest! {
        // Batched and sequential adds agree on arbitrary soups appended after existing data.
        #[test]
        fn test_batched_adds_agree(
            first in soup_strategy(16),
            second in soup_strategy(16),
            third in soup_strategy(16),
        ) {
            let mut sequential = GeometryPool::new();
            let mut batched = GeometryPool::new();
            sequential.add_mesh(&first).unwrap();
            batched.add_mesh(&first).unwrap();

            sequential.add_mesh(&second).unwrap();
            sequential.add_mesh(&third).unwrap();
            batched.add_meshes(&[second, third]).unwrap();

            prop_assert_eq!(&batched, &sequential);
            for id in 0..3 {
                prop_assert_eq!(batched.bvh(MeshId(id)).unwrap().validate(), Ok(()));
            }
        }
    }
}
