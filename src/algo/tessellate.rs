// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Tessellation refinement by iterative edge splitting
//!
//! Vertex normals carry the curvature of the underlying surface. An edge
//! whose estimated chord deviation (sag) exceeds the bound is split at its
//! midpoint with an interpolated normal, which quarters the sag of the
//! children. Optional absolute bounds on edge length and normal spread can
//! force further refinement.

use crate::geometry::topology::{edge_key, EdgeKey};
use crate::geometry::{Mesh, Triangle, Vertex};
use crate::scene::{OccurrenceId, Scene};
use ahash::{AHashMap, AHashSet};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellateOptions {
    /// Maximum chord deviation in scene units.
    pub max_sag: f64,
    /// Maximum edge length, `None` for unbounded.
    pub max_length: Option<f64>,
    /// Maximum angle between endpoint normals in degrees, `None` for
    /// unbounded.
    pub max_angle_deg: Option<f64>,
}

impl Default for TessellateOptions {
    fn default() -> Self {
        Self {
            max_sag: 0.1,
            max_length: None,
            max_angle_deg: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TessellateReport {
    pub split_edges: usize,
    pub added_triangles: usize,
    pub passes: usize,
}

// Each pass at least quarters the worst sag, so a handful of passes settles
// any reasonable bound
const MAX_PASSES: usize = 10;

/// Refine all parts under `root` until every edge satisfies the bounds.
pub fn tessellate(
    scene: &mut Scene,
    root: OccurrenceId,
    options: &TessellateOptions,
) -> TessellateReport {
    let mut report = TessellateReport::default();
    for part in scene.parts_under(root) {
        let mesh = scene.part_mesh_mut(part);
        let before = mesh.triangle_count();
        let (splits, passes) = refine_mesh(mesh, options);
        report.split_edges += splits;
        report.added_triangles += mesh.triangle_count() - before;
        report.passes = report.passes.max(passes);
    }
    log::info!(
        "tessellate: split {} edges, added {} triangles",
        report.split_edges,
        report.added_triangles
    );
    report
}

fn refine_mesh(mesh: &mut Mesh, options: &TessellateOptions) -> (usize, usize) {
    let max_angle = options.max_angle_deg.map(|deg| deg.to_radians());
    let mut total_splits = 0;
    let mut passes = 0;

    for _ in 0..MAX_PASSES {
        let to_split = edges_violating_bounds(mesh, options.max_sag, options.max_length, max_angle);
        if to_split.is_empty() {
            break;
        }
        passes += 1;
        total_splits += to_split.len();

        // Shared midpoints so neighbors split the same edge once
        let mut mids: AHashMap<EdgeKey, usize> = AHashMap::with_capacity(to_split.len());
        for &(u, v) in &to_split {
            let position = nalgebra::center(
                &mesh.vertices[u].position,
                &mesh.vertices[v].position,
            );
            let normal = interpolate_normal(&mesh.vertices[u].normal, &mesh.vertices[v].normal);
            let index = mesh.add_vertex(Vertex::new(position, normal));
            mids.insert(edge_key(u, v), index);
        }

        let old_triangles = std::mem::take(&mut mesh.triangles);
        let mut new_triangles = Vec::with_capacity(old_triangles.len() * 2);
        for triangle in &old_triangles {
            subdivide_triangle(triangle, &mids, &mut new_triangles);
        }
        mesh.triangles = new_triangles;
    }

    (total_splits, passes)
}

fn edges_violating_bounds(
    mesh: &Mesh,
    max_sag: f64,
    max_length: Option<f64>,
    max_angle: Option<f64>,
) -> Vec<(usize, usize)> {
    let mut checked: AHashSet<EdgeKey> = AHashSet::new();
    let mut out = Vec::new();

    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.indices;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            let key = edge_key(u, v);
            if !checked.insert(key) {
                continue;
            }
            let length = (mesh.vertices[u].position - mesh.vertices[v].position).norm();
            if length < 1e-12 {
                continue;
            }
            let spread = normal_spread(&mesh.vertices[u].normal, &mesh.vertices[v].normal);
            let sag = (length / 2.0) * (spread / 4.0).tan();

            let needs = sag > max_sag
                || max_length.is_some_and(|bound| length > bound)
                || max_angle.is_some_and(|bound| spread > bound);
            if needs {
                out.push(key);
            }
        }
    }
    out
}

/// Angle in radians between two vertex normals, zero when either is missing.
fn normal_spread(n0: &Vector3<f64>, n1: &Vector3<f64>) -> f64 {
    let (l0, l1) = (n0.norm(), n1.norm());
    if l0 < 1e-12 || l1 < 1e-12 {
        return 0.0;
    }
    (n0.dot(n1) / (l0 * l1)).clamp(-1.0, 1.0).acos()
}

fn interpolate_normal(n0: &Vector3<f64>, n1: &Vector3<f64>) -> Vector3<f64> {
    let sum = n0 + n1;
    if sum.norm() > 1e-12 {
        sum.normalize()
    } else {
        *n0
    }
}

fn subdivide_triangle(
    triangle: &Triangle,
    mids: &AHashMap<EdgeKey, usize>,
    out: &mut Vec<Triangle>,
) {
    let [a, b, c] = triangle.indices;
    let edge_mid = |u: usize, v: usize| mids.get(&edge_key(u, v)).copied();
    let splits = [edge_mid(a, b), edge_mid(b, c), edge_mid(c, a)];
    let count = splits.iter().flatten().count();

    let rotate = |k: usize| -> [usize; 3] {
        let ids = [a, b, c];
        [ids[k], ids[(k + 1) % 3], ids[(k + 2) % 3]]
    };

    match count {
        0 => out.push(*triangle),
        1 => {
            // Rotate the split edge into first position
            let r = splits.iter().position(|s| s.is_some()).unwrap();
            let [a, b, c] = rotate(r);
            let m = edge_mid(a, b).unwrap();
            out.push(Triangle::new([a, m, c]));
            out.push(Triangle::new([m, b, c]));
        }
        2 => {
            // Rotate the unsplit edge into last position
            let r = splits.iter().position(|s| s.is_none()).unwrap();
            let [a, b, c] = rotate((r + 1) % 3);
            let m1 = edge_mid(a, b).unwrap();
            let m2 = edge_mid(b, c).unwrap();
            out.push(Triangle::new([m1, b, m2]));
            out.push(Triangle::new([a, m1, m2]));
            out.push(Triangle::new([a, m2, c]));
        }
        _ => {
            let mab = edge_mid(a, b).unwrap();
            let mbc = edge_mid(b, c).unwrap();
            let mca = edge_mid(c, a).unwrap();
            out.push(Triangle::new([a, mab, mca]));
            out.push(Triangle::new([mab, b, mbc]));
            out.push(Triangle::new([mca, mbc, c]));
            out.push(Triangle::new([mab, mbc, mca]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use nalgebra::Matrix4;

    fn scene_with(mesh: Mesh) -> (Scene, OccurrenceId) {
        let mut scene = Scene::new("tessellate");
        let root = scene.root();
        scene.add_part(root, "part", Matrix4::identity(), mesh);
        (scene, root)
    }

    fn max_edge_length(mesh: &Mesh) -> f64 {
        let mut worst: f64 = 0.0;
        for triangle in &mesh.triangles {
            let [a, b, c] = triangle.indices;
            for (u, v) in [(a, b), (b, c), (c, a)] {
                worst = worst.max((mesh.vertices[u].position - mesh.vertices[v].position).norm());
            }
        }
        worst
    }

    #[test]
    fn test_flat_plane_is_left_alone() {
        let (mut scene, root) = scene_with(primitives::grid_plane(10.0, 10.0, 4));
        let before = scene.polygon_count(root);
        let report = tessellate(&mut scene, root, &TessellateOptions::default());
        assert_eq!(report.split_edges, 0);
        assert_eq!(report.added_triangles, 0);
        assert_eq!(scene.polygon_count(root), before);
    }

    #[test]
    fn test_coarse_sphere_is_refined() {
        let (mut scene, root) = scene_with(primitives::uv_sphere(10.0, 8));
        let before = scene.polygon_count(root);
        let report = tessellate(&mut scene, root, &TessellateOptions::default());
        assert!(report.split_edges > 0);
        assert!(scene.polygon_count(root) > before);

        // Every remaining edge satisfies the sag bound
        let part = scene.parts_under(root)[0];
        let violations =
            edges_violating_bounds(scene.part_mesh(part), 0.1, None, None);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_length_bound_is_enforced() {
        let (mut scene, root) = scene_with(primitives::grid_plane(10.0, 10.0, 2));
        let options = TessellateOptions {
            max_sag: 0.1,
            max_length: Some(2.0),
            max_angle_deg: None,
        };
        tessellate(&mut scene, root, &options);

        let part = scene.parts_under(root)[0];
        assert!(max_edge_length(scene.part_mesh(part)) <= 2.0 + 1e-9);
    }

    #[test]
    fn test_refinement_preserves_winding() {
        let (mut scene, root) = scene_with(primitives::grid_plane(10.0, 10.0, 2));
        let options = TessellateOptions {
            max_sag: 0.1,
            max_length: Some(3.0),
            max_angle_deg: None,
        };
        tessellate(&mut scene, root, &options);

        let part = scene.parts_under(root)[0];
        let mesh = scene.part_mesh(part);
        for i in 0..mesh.triangle_count() {
            let (normal, area) = mesh.triangle_normal_area(i);
            assert!(area > 0.0);
            assert!(normal.z > 0.0, "triangle {i} flipped");
        }
    }

    #[test]
    fn test_sphere_refinement_keeps_closure() {
        let (mut scene, root) = scene_with(primitives::uv_sphere(10.0, 8));
        tessellate(&mut scene, root, &TessellateOptions::default());
        let part = scene.parts_under(root)[0];
        let edges = crate::geometry::EdgeMap::build(scene.part_mesh(part));
        assert!(edges.is_closed());
        assert!(edges.is_manifold());
    }
}
