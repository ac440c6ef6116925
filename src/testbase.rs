//! Common utilities shared by unit tests.
#![cfg(test)]

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aabb::Aabb;
use crate::bvh::{BuildOutput, BvhBuilder, BvhNode};
use crate::triangle::Triangle;
use crate::{Point3, Real, Vector3};

/// A vector represented as a tuple
pub type TupleVec = (f32, f32, f32);

/// Generate a `TupleVec` for [`proptest::strategy::Strategy`] from -10e10 to 10e10
/// A small enough range to prevent most fp32 errors from breaking certain tests
pub fn tuplevec_small_strategy() -> impl Strategy<Value = TupleVec> {
    (
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
    )
}

/// Convert a `TupleVec` to a [`Point3`].
pub fn tuple_to_point(tpl: &TupleVec) -> Point3 {
    Point3::new(tpl.0, tpl.1, tpl.2)
}

/// Generate a [`Triangle`] with coordinates in -1000..1000, where rounding of the centroid
/// stays far below the tolerances used in tests.
pub fn triangle_strategy() -> impl Strategy<Value = Triangle> {
    let coordinate = || -1000.0_f32..1000.0_f32;
    let point = move || (coordinate(), coordinate(), coordinate()).prop_map(|t| tuple_to_point(&t));
    (point(), point(), point()).prop_map(|(a, b, c)| Triangle::new(a, b, c))
}

/// Generate a non-empty triangle soup of at most `max_len` triangles.
pub fn soup_strategy(max_len: usize) -> impl Strategy<Value = Vec<Triangle>> {
    proptest::collection::vec(triangle_strategy(), 1..=max_len)
}

/// The triangle `(x, 0, 0), (x + 1, 0, 0), (x, 1, 0)`, a unit right triangle in the XY plane.
pub fn unit_triangle_at(x: Real) -> Triangle {
    Triangle::new(
        Point3::new(x, 0.0, 0.0),
        Point3::new(x + 1.0, 0.0, 0.0),
        Point3::new(x, 1.0, 0.0),
    )
}

/// `n` triangles of growing size whose centroids all lie exactly at the origin.
pub fn concentric_triangles(n: usize) -> Vec<Triangle> {
    (1..=n)
        .map(|i| {
            let s = i as Real;
            Triangle::new(
                Point3::new(s, 0.0, 0.0),
                Point3::new(-s, s, 0.0),
                Point3::new(0.0, -s, 0.0),
            )
        })
        .collect()
}

/// `n` small triangles scattered through a 200 unit cube, seeded for reproducibility.
pub fn random_soup(seed: u64, n: usize) -> Vec<Triangle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let vertex = |center: &Point3, rng: &mut StdRng| {
        center
            + Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            )
    };
    (0..n)
        .map(|_| {
            let center = Point3::new(
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            );
            Triangle::new(
                vertex(&center, &mut rng),
                vertex(&center, &mut rng),
                vertex(&center, &mut rng),
            )
        })
        .collect()
}

/// Builds a BVH over all of `triangles` into fresh buffers.
pub fn build_mesh(triangles: &[Triangle]) -> (Vec<BvhNode>, Vec<u32>, BuildOutput) {
    let builder = BvhBuilder::new(triangles, 0, triangles.len()).unwrap();
    let mut nodes = Vec::new();
    let mut indices = Vec::new();
    let output = builder.build(&mut nodes, &mut indices);
    (nodes, indices, output)
}

/// Creates a unit size cube centered at `pos` and pushes the triangles to `shapes`.
pub fn push_cube(pos: Point3, shapes: &mut Vec<Triangle>) {
    let top_front_right = pos + Vector3::new(0.5, 0.5, -0.5);
    let top_back_right = pos + Vector3::new(0.5, 0.5, 0.5);
    let top_back_left = pos + Vector3::new(-0.5, 0.5, 0.5);
    let top_front_left = pos + Vector3::new(-0.5, 0.5, -0.5);
    let bottom_front_right = pos + Vector3::new(0.5, -0.5, -0.5);
    let bottom_back_right = pos + Vector3::new(0.5, -0.5, 0.5);
    let bottom_back_left = pos + Vector3::new(-0.5, -0.5, 0.5);
    let bottom_front_left = pos + Vector3::new(-0.5, -0.5, -0.5);

    let faces = [
        (top_back_right, top_front_right, top_front_left),
        (top_front_left, top_back_left, top_back_right),
        (bottom_front_left, bottom_front_right, bottom_back_right),
        (bottom_back_right, bottom_back_left, bottom_front_left),
        (top_back_left, top_front_left, bottom_front_left),
        (bottom_front_left, bottom_back_left, top_back_left),
        (bottom_front_right, top_front_right, top_back_right),
        (top_back_right, bottom_back_right, bottom_front_right),
        (top_front_left, top_front_right, bottom_front_right),
        (bottom_front_right, bottom_front_left, top_front_left),
        (bottom_back_right, top_back_right, top_back_left),
        (top_back_left, bottom_back_left, bottom_back_right),
    ];
    shapes.extend(faces.iter().map(|&(a, b, c)| Triangle::new(a, b, c)));
}

/// Implementation of splitmix64.
/// For reference see: http://xoroshiro.di.unimi.it/splitmix64.c
fn splitmix64(x: &mut u64) -> u64 {
    *x = x.wrapping_add(0x9E3779B97F4A7C15u64);
    let mut z = *x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9u64);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EBu64);
    z ^ (z >> 31)
}

/// Generates a new `i32` triple. Mutates the seed.
pub fn next_point3_raw(seed: &mut u64) -> (i32, i32, i32) {
    let u = splitmix64(seed);
    let a = ((u >> 32) & 0xFFFFFFFF) as i64 - 0x80000000;
    let b = (u & 0xFFFFFFFF) as i64 - 0x80000000;
    let c = a ^ b.rotate_left(6);
    (a as i32, b as i32, c as i32)
}

/// Generates a new `Point3`, which will lie inside the given `aabb`. Mutates the seed.
pub fn next_point3(seed: &mut u64, aabb: &Aabb) -> Point3 {
    let (a, b, c) = next_point3_raw(seed);
    let float_vector = Vector3::new(
        (a as f32 / i32::MAX as f32) + 1.0,
        (b as f32 / i32::MAX as f32) + 1.0,
        (c as f32 / i32::MAX as f32) + 1.0,
    ) * 0.5;

    let size = aabb.size();
    aabb.min + float_vector.component_mul(&size)
}

/// Returns an `Aabb` which defines the default testing space bounds.
pub fn default_bounds() -> Aabb {
    Aabb::with_bounds(
        Point3::new(-100_000.0, -100_000.0, -100_000.0),
        Point3::new(100_000.0, 100_000.0, 100_000.0),
    )
}

/// Creates `n` deterministic random cubes. Returns the `Vec` of surface `Triangle`s.
pub fn create_n_cubes(n: usize, bounds: &Aabb) -> Vec<Triangle> {
    let mut vec = Vec::new();
    let mut seed = 0;
    for _ in 0..n {
        push_cube(next_point3(&mut seed, bounds), &mut vec);
    }
    vec
}

/// Benchmark the construction of a BVH over `n` cubes, `12 * n` triangles.
#[cfg(feature = "bench")]
pub fn build_n_triangles(n: usize, b: &mut ::test::Bencher) {
    let triangles = create_n_cubes(n, &default_bounds());
    b.iter(|| build_mesh(&triangles));
}

mod tests {
    use super::{concentric_triangles, create_n_cubes, default_bounds, random_soup};

    #[test]
    fn test_fixtures_are_deterministic() {
        let bounds = default_bounds();
        assert_eq!(create_n_cubes(3, &bounds), create_n_cubes(3, &bounds));
        assert_eq!(random_soup(11, 50), random_soup(11, 50));
        assert_ne!(random_soup(11, 50), random_soup(12, 50));
        for triangle in create_n_cubes(10, &bounds) {
            assert!(triangle.vertices().iter().all(|v| bounds.approx_contains_eps(v, 1.0)));
        }
        for triangle in concentric_triangles(5) {
            assert_eq!(triangle.centroid(), crate::Point3::origin());
        }
    }
}
