// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Scene repair: welding, duplicate removal, non-manifold cracking and
//! winding orientation

use crate::geometry::topology::EdgeMap;
use crate::geometry::Mesh;
use crate::scene::{OccurrenceId, Scene};
use serde::{Deserialize, Serialize};

/// Options for the pre-tessellation repair pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairCadOptions {
    /// Sewing tolerance in scene units.
    pub tolerance: f64,
    /// Re-orient faces consistently after sewing.
    pub orient: bool,
}

impl Default for RepairCadOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            orient: false,
        }
    }
}

/// Options for the mesh-level repair pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairMeshOptions {
    /// Welding tolerance in scene units.
    pub tolerance: f64,
    /// Split edges shared by more than two faces.
    pub crack_non_manifold: bool,
    /// Re-orient faces consistently.
    pub orient: bool,
}

impl Default for RepairMeshOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            crack_non_manifold: true,
            orient: false,
        }
    }
}

/// What a repair pass changed, summed over all parts.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RepairReport {
    pub welded_vertices: usize,
    pub removed_triangles: usize,
    pub removed_vertices: usize,
    pub cracked_edges: usize,
    pub flipped_triangles: usize,
}

const DEGENERATE_AREA: f64 = 1e-12;

/// Sew parts under `root`: weld within tolerance, drop degenerate and
/// duplicate faces, optionally re-orient windings.
pub fn repair_cad(
    scene: &mut Scene,
    root: OccurrenceId,
    options: &RepairCadOptions,
) -> RepairReport {
    let mut report = RepairReport::default();
    for part in scene.parts_under(root) {
        let mesh = scene.part_mesh_mut(part);
        report.welded_vertices += mesh.weld_vertices(options.tolerance);
        report.removed_triangles += mesh.remove_degenerate_triangles(DEGENERATE_AREA);
        report.removed_triangles += mesh.remove_duplicate_triangles();
        if options.orient {
            report.flipped_triangles += orient_windings(mesh);
        }
        report.removed_vertices += mesh.remove_orphaned_vertices();
        mesh.recompute_normals();
    }
    log::info!(
        "repair_cad: welded {} vertices, removed {} triangles",
        report.welded_vertices,
        report.removed_triangles
    );
    report
}

/// Repair tessellated parts under `root`. Runs the same cleanup as
/// [`repair_cad`] and additionally cracks non-manifold edges when asked.
pub fn repair_mesh(
    scene: &mut Scene,
    root: OccurrenceId,
    options: &RepairMeshOptions,
) -> RepairReport {
    let mut report = RepairReport::default();
    for part in scene.parts_under(root) {
        let mesh = scene.part_mesh_mut(part);
        report.welded_vertices += mesh.weld_vertices(options.tolerance);
        report.removed_triangles += mesh.remove_degenerate_triangles(DEGENERATE_AREA);
        report.removed_triangles += mesh.remove_duplicate_triangles();
        if options.crack_non_manifold {
            report.cracked_edges += crack_non_manifold_edges(mesh);
        }
        if options.orient {
            report.flipped_triangles += orient_windings(mesh);
        }
        report.removed_vertices += mesh.remove_orphaned_vertices();
        mesh.recompute_normals();
    }
    log::info!(
        "repair_mesh: welded {} vertices, removed {} triangles, cracked {} edges",
        report.welded_vertices,
        report.removed_triangles,
        report.cracked_edges
    );
    report
}

/// Duplicate the endpoints of every edge shared by more than two faces, so
/// that only the first two faces keep the original edge. Returns the number
/// of edges cracked.
fn crack_non_manifold_edges(mesh: &mut Mesh) -> usize {
    let edges = EdgeMap::build(mesh);
    let mut fixes: Vec<(usize, usize, Vec<usize>)> = Vec::new();
    for ((a, b), faces) in edges.non_manifold_edges() {
        fixes.push((a, b, faces[2..].to_vec()));
    }

    for &(a, b, ref surplus) in &fixes {
        for &face in surplus {
            let va = mesh.vertices[a];
            let vb = mesh.vertices[b];
            let na = mesh.add_vertex(va);
            let nb = mesh.add_vertex(vb);
            let triangle = &mut mesh.triangles[face];
            for k in 0..3 {
                if triangle.indices[k] == a {
                    triangle.indices[k] = na;
                } else if triangle.indices[k] == b {
                    triangle.indices[k] = nb;
                }
            }
        }
    }

    fixes.len()
}

/// Propagate a consistent winding across manifold adjacency, then flip whole
/// closed shells that end up inside out. Returns the number of triangles
/// flipped.
fn orient_windings(mesh: &mut Mesh) -> usize {
    if mesh.triangles.is_empty() {
        return 0;
    }

    let edges = EdgeMap::build(mesh);
    // Face pairs across manifold edges, with the shared edge endpoints
    let mut neighbors: Vec<Vec<(usize, usize, usize)>> = vec![Vec::new(); mesh.triangles.len()];
    for ((a, b), kind) in edges.iter() {
        if let crate::geometry::EdgeKind::Manifold([f, g]) = kind {
            neighbors[*f].push((*g, *a, *b));
            neighbors[*g].push((*f, *a, *b));
        }
    }

    let has_directed = |mesh: &Mesh, face: usize, u: usize, v: usize| -> bool {
        let [a, b, c] = mesh.triangles[face].indices;
        (a, b) == (u, v) || (b, c) == (u, v) || (c, a) == (u, v)
    };

    let mut flipped = 0;
    let mut visited = vec![false; mesh.triangles.len()];
    for seed in 0..mesh.triangles.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut queue = std::collections::VecDeque::from([seed]);
        while let Some(face) = queue.pop_front() {
            for &(next, a, b) in &neighbors[face] {
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                // Consistent neighbors traverse a shared edge in opposite
                // directions
                let same_direction =
                    has_directed(mesh, face, a, b) == has_directed(mesh, next, a, b);
                if same_direction {
                    mesh.triangles[next].indices.swap(1, 2);
                    flipped += 1;
                }
                queue.push_back(next);
            }
        }
    }

    // Inside-out closed shells have negative volume
    if edges.is_closed() && mesh.signed_volume() < 0.0 {
        for triangle in &mut mesh.triangles {
            triangle.indices.swap(1, 2);
        }
        flipped += mesh.triangles.len();
    }

    if flipped > 0 {
        mesh.recompute_normals();
    }
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{primitives, Triangle, Vertex};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Point3, Vector3};

    fn scene_with(mesh: Mesh) -> (Scene, OccurrenceId) {
        let mut scene = Scene::new("repair");
        let root = scene.root();
        scene.add_part(root, "part", Matrix4::identity(), mesh);
        (scene, root)
    }

    /// Explode a mesh into unshared triangle soup.
    fn to_soup(mesh: &Mesh) -> Mesh {
        let mut soup = Mesh::new();
        for i in 0..mesh.triangle_count() {
            let [p0, p1, p2] = mesh.triangle_points(i);
            let a = soup.add_vertex(Vertex::at(p0));
            let b = soup.add_vertex(Vertex::at(p1));
            let c = soup.add_vertex(Vertex::at(p2));
            soup.add_triangle(Triangle::new([a, b, c]));
        }
        soup
    }

    #[test]
    fn test_repair_mesh_welds_triangle_soup() {
        let cube = primitives::cube(Vector3::new(10.0, 10.0, 10.0));
        let soup = to_soup(&cube);
        assert_eq!(soup.vertex_count(), 36);

        let (mut scene, root) = scene_with(soup);
        let report = repair_mesh(&mut scene, root, &RepairMeshOptions::default());
        assert_eq!(report.welded_vertices, 28);

        let part = scene.parts_under(root)[0];
        let mesh = scene.part_mesh(part);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        let edges = EdgeMap::build(mesh);
        assert!(edges.is_closed());
        assert!(edges.is_manifold());
    }

    #[test]
    fn test_repair_cad_drops_duplicate_faces() {
        let mut cube = primitives::cube(Vector3::new(4.0, 4.0, 4.0));
        let copy = cube.triangles[0];
        cube.add_triangle(copy);
        let (mut scene, root) = scene_with(cube);

        let report = repair_cad(&mut scene, root, &RepairCadOptions::default());
        assert_eq!(report.removed_triangles, 1);
        let part = scene.parts_under(root)[0];
        assert_eq!(scene.part_mesh(part).triangle_count(), 12);
    }

    #[test]
    fn test_crack_makes_fan_manifold() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, 0.0)));
        let b = mesh.add_vertex(Vertex::at(Point3::new(1.0, 0.0, 0.0)));
        for p in [
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ] {
            let c = mesh.add_vertex(Vertex::at(p));
            mesh.add_triangle(Triangle::new([a, b, c]));
        }
        assert!(!EdgeMap::build(&mesh).is_manifold());

        let (mut scene, root) = scene_with(mesh);
        // Tolerance below the duplicated-vertex distance so the weld cannot
        // undo the crack
        let report = repair_mesh(
            &mut scene,
            root,
            &RepairMeshOptions {
                tolerance: 1e-9,
                crack_non_manifold: true,
                orient: false,
            },
        );
        assert_eq!(report.cracked_edges, 1);

        let part = scene.parts_under(root)[0];
        assert!(EdgeMap::build(scene.part_mesh(part)).is_manifold());
    }

    #[test]
    fn test_orient_fixes_flipped_face() {
        let mut cube = primitives::cube(Vector3::new(2.0, 2.0, 2.0));
        cube.triangles[3].indices.swap(0, 1);
        assert!(cube.signed_volume() < 8.0 - 1e-9);

        let (mut scene, root) = scene_with(cube);
        let report = repair_mesh(
            &mut scene,
            root,
            &RepairMeshOptions {
                tolerance: 1e-9,
                crack_non_manifold: false,
                orient: true,
            },
        );
        assert!(report.flipped_triangles >= 1);

        let part = scene.parts_under(root)[0];
        assert_relative_eq!(scene.part_mesh(part).signed_volume(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_repair_is_idempotent_on_clean_mesh() {
        let (mut scene, root) = scene_with(primitives::uv_sphere(3.0, 12));
        let before = scene.polygon_count(root);
        let report = repair_mesh(&mut scene, root, &RepairMeshOptions::default());
        assert_eq!(report.welded_vertices, 0);
        assert_eq!(report.removed_triangles, 0);
        assert_eq!(report.cracked_edges, 0);
        assert_eq!(scene.polygon_count(root), before);
    }
}
