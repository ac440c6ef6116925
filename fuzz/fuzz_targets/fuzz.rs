#![no_main]
use std::fmt::{self, Debug, Formatter};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nalgebra::Point3;
use ordered_float::NotNan;
use tri_bvh::bvh::{BvhBuilder, MeshBvh};
use tri_bvh::pool::GeometryPool;
use tri_bvh::triangle::Triangle;
use tri_bvh::BuildError;

type Float = f32;
const LIMIT: Float = 1_000_000.0;

fuzz_target!(|workload: Workload| {
    workload.fuzz();
});

#[derive(Arbitrary)]
struct ArbitraryPoint {
    coordinates: [NotNan<Float>; 3],
}

impl ArbitraryPoint {
    fn point(&self) -> Point3<Float> {
        let [x, y, z] = self.coordinates.map(|f| f.into_inner().clamp(-LIMIT, LIMIT));
        Point3::new(x, y, z)
    }
}

#[derive(Arbitrary)]
struct ArbitraryTriangle {
    v0: ArbitraryPoint,
    v1: ArbitraryPoint,
    v2: ArbitraryPoint,
}

impl ArbitraryTriangle {
    fn triangle(&self) -> Triangle {
        Triangle::new(self.v0.point(), self.v1.point(), self.v2.point())
    }
}

impl Debug for ArbitraryTriangle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(&self.triangle(), f)
    }
}

#[derive(Debug, Arbitrary)]
struct Workload {
    meshes: Vec<Vec<ArbitraryTriangle>>,
    /// A sub-range of the first mesh to build on its own.
    first_tri: usize,
    tri_count: usize,
}

impl Workload {
    fn fuzz(self) {
        let meshes: Vec<Vec<Triangle>> = self
            .meshes
            .iter()
            .map(|mesh| mesh.iter().map(ArbitraryTriangle::triangle).collect())
            .collect();

        // Building any valid range must produce a consistent tree; invalid ranges must be
        // rejected instead of panicking.
        if let Some(buffer) = meshes.first() {
            match BvhBuilder::new(buffer, self.first_tri, self.tri_count) {
                Ok(builder) => {
                    let mut nodes = Vec::new();
                    let mut indices = Vec::new();
                    let output = builder.build(&mut nodes, &mut indices);
                    let triangles = &buffer[self.first_tri..self.first_tri + self.tri_count];
                    MeshBvh::new(&nodes, &indices, triangles).assert_consistent();
                    assert_eq!(output.node_count, nodes.len());
                }
                Err(BuildError::EmptyRange) => assert_eq!(self.tri_count, 0),
                Err(_) => {}
            }
        }

        // Batched adds must agree with one add per mesh.
        let mut sequential = GeometryPool::new();
        let mut sequential_result = Ok(());
        for mesh in &meshes {
            if let Err(err) = sequential.add_mesh(mesh) {
                sequential_result = Err(err);
                break;
            }
        }

        let mut batched = GeometryPool::new();
        match batched.add_meshes(&meshes) {
            Ok(ids) => {
                assert!(sequential_result.is_ok());
                assert_eq!(batched, sequential);
                for id in ids {
                    batched.bvh(id).unwrap().assert_consistent();
                }
            }
            Err(err) => {
                assert_eq!(Err(err), sequential_result);
                assert!(batched.meshes().is_empty());
            }
        }
    }
}
