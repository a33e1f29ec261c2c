// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Hole detection and filling
//!
//! Boundary loops are classified before filling. Loops on sheet-like
//! components (a large share of boundary edges) are surfacic gaps. On
//! solid-like components, two coaxial loops form a through hole and a lone
//! loop is a blind hole. Filling adds a centroid fan that matches the
//! winding of the surrounding faces.

use crate::geometry::topology::{self, EdgeKind, EdgeMap};
use crate::geometry::{Mesh, Triangle, Vertex};
use crate::scene::{OccurrenceId, Scene};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveHolesOptions {
    pub fill_through: bool,
    pub fill_blind: bool,
    pub fill_surfacic: bool,
    /// Holes wider than this stay open. The diameter is estimated from the
    /// loop bounding box.
    pub max_diameter: f64,
}

impl Default for RemoveHolesOptions {
    fn default() -> Self {
        Self {
            fill_through: true,
            fill_blind: false,
            fill_surfacic: false,
            max_diameter: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RemoveHolesReport {
    pub loops_found: usize,
    pub filled_through: usize,
    pub filled_blind: usize,
    pub filled_surfacic: usize,
    pub skipped: usize,
    pub added_triangles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoleKind {
    Through,
    Blind,
    Surfacic,
}

// A component with more boundary than this is a sheet, not a solid with
// openings
const SHEET_BOUNDARY_SHARE: f64 = 0.25;
// Cosine bound for the coaxial test pairing through-hole rims
const COAXIAL_ALIGNMENT: f64 = 0.6;

/// Detect and fill holes on every part under `root`.
pub fn remove_holes(
    scene: &mut Scene,
    root: OccurrenceId,
    options: &RemoveHolesOptions,
) -> RemoveHolesReport {
    let mut report = RemoveHolesReport::default();
    for part in scene.parts_under(root) {
        fill_mesh_holes(scene.part_mesh_mut(part), options, &mut report);
    }
    log::info!(
        "remove_holes: {} loops, filled {} through / {} blind / {} surfacic",
        report.loops_found,
        report.filled_through,
        report.filled_blind,
        report.filled_surfacic
    );
    report
}

fn fill_mesh_holes(mesh: &mut Mesh, options: &RemoveHolesOptions, report: &mut RemoveHolesReport) {
    let loops = topology::boundary_loops(mesh);
    if loops.is_empty() {
        return;
    }
    report.loops_found += loops.len();

    let kinds = classify_loops(mesh, &loops);

    let mut filled_any = false;
    for (cycle, kind) in loops.iter().zip(&kinds) {
        let diameter = loop_diameter(mesh, cycle);
        let enabled = match kind {
            HoleKind::Through => options.fill_through,
            HoleKind::Blind => options.fill_blind,
            HoleKind::Surfacic => options.fill_surfacic,
        };
        if !enabled || diameter > options.max_diameter {
            report.skipped += 1;
            continue;
        }

        fill_loop(mesh, cycle);
        filled_any = true;
        report.added_triangles += cycle.len();
        match kind {
            HoleKind::Through => report.filled_through += 1,
            HoleKind::Blind => report.filled_blind += 1,
            HoleKind::Surfacic => report.filled_surfacic += 1,
        }
    }

    if filled_any {
        mesh.recompute_normals();
    }
}

fn classify_loops(mesh: &Mesh, loops: &[Vec<usize>]) -> Vec<HoleKind> {
    let edges = EdgeMap::build(mesh);
    let components = topology::connected_components(mesh);

    let mut component_of_face = vec![0usize; mesh.triangle_count()];
    for (c, faces) in components.iter().enumerate() {
        for &f in faces {
            component_of_face[f] = c;
        }
    }

    // Boundary share per component decides sheet vs solid
    let mut edge_totals = vec![0usize; components.len()];
    let mut boundary_totals = vec![0usize; components.len()];
    let mut owner_of_boundary_edge: ahash::AHashMap<(usize, usize), usize> =
        ahash::AHashMap::new();
    for (key, kind) in edges.iter() {
        let component = component_of_face[kind.faces()[0]];
        edge_totals[component] += 1;
        if let EdgeKind::Boundary(face) = kind {
            boundary_totals[component] += 1;
            owner_of_boundary_edge.insert(*key, *face);
        }
    }

    let loop_component = |cycle: &[usize]| -> usize {
        let key = topology::edge_key(cycle[0], cycle[1]);
        let face = owner_of_boundary_edge[&key];
        component_of_face[face]
    };

    let centroids: Vec<Point3<f64>> = loops.iter().map(|c| loop_centroid(mesh, c)).collect();
    let normals: Vec<Vector3<f64>> = loops.iter().map(|c| loop_normal(mesh, c)).collect();
    let loop_components: Vec<usize> = loops.iter().map(|c| loop_component(c)).collect();
    let on_sheet: Vec<bool> = loop_components
        .iter()
        .map(|&component| {
            let total = edge_totals[component].max(1);
            boundary_totals[component] as f64 / total as f64 > SHEET_BOUNDARY_SHARE
        })
        .collect();

    let mut kinds = vec![HoleKind::Blind; loops.len()];
    let mut paired = vec![false; loops.len()];
    for i in 0..loops.len() {
        if on_sheet[i] {
            kinds[i] = HoleKind::Surfacic;
            continue;
        }
        if paired[i] {
            kinds[i] = HoleKind::Through;
            continue;
        }
        for j in i + 1..loops.len() {
            if on_sheet[j] || paired[j] || loop_components[i] != loop_components[j] {
                continue;
            }
            let axis = centroids[j] - centroids[i];
            if axis.norm() < 1e-9 {
                continue;
            }
            let axis = axis.normalize();
            if axis.dot(&normals[i]).abs() > COAXIAL_ALIGNMENT
                && axis.dot(&normals[j]).abs() > COAXIAL_ALIGNMENT
            {
                paired[i] = true;
                paired[j] = true;
                kinds[i] = HoleKind::Through;
                break;
            }
        }
    }

    kinds
}

fn loop_centroid(mesh: &Mesh, cycle: &[usize]) -> Point3<f64> {
    let mut sum = Vector3::zeros();
    for &v in cycle {
        sum += mesh.vertices[v].position.coords;
    }
    Point3::from(sum / cycle.len() as f64)
}

/// Newell plane normal of the loop polygon.
fn loop_normal(mesh: &Mesh, cycle: &[usize]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    for i in 0..cycle.len() {
        let p = mesh.vertices[cycle[i]].position;
        let q = mesh.vertices[cycle[(i + 1) % cycle.len()]].position;
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    if normal.norm() > 1e-12 {
        normal.normalize()
    } else {
        Vector3::zeros()
    }
}

fn loop_diameter(mesh: &Mesh, cycle: &[usize]) -> f64 {
    crate::geometry::Aabb::from_points(cycle.iter().map(|&v| &mesh.vertices[v].position))
        .diagonal()
}

/// Fan from the loop centroid. The loop follows the winding of the owning
/// faces, so the reversed edge keeps the cap consistent with them.
fn fill_loop(mesh: &mut Mesh, cycle: &[usize]) {
    let center = mesh.add_vertex(Vertex::at(loop_centroid(mesh, cycle)));
    for i in 0..cycle.len() {
        let a = cycle[i];
        let b = cycle[(i + 1) % cycle.len()];
        mesh.add_triangle(Triangle::new([b, a, center]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use nalgebra::Matrix4;
    use std::f64::consts::PI;

    fn scene_with(mesh: Mesh) -> (Scene, OccurrenceId) {
        let mut scene = Scene::new("holes");
        let root = scene.root();
        scene.add_part(root, "part", Matrix4::identity(), mesh);
        (scene, root)
    }

    /// Tube wall with several rings of quads, so boundary edges are a small
    /// share and the shell classifies as a solid with two openings.
    fn ringed_tube(height: f64, radius: f64, segments: usize, rings: usize) -> Mesh {
        let mut mesh = Mesh::new();
        let mut prev: Vec<usize> = Vec::new();
        for k in 0..=rings {
            let z = height * k as f64 / rings as f64;
            let ring: Vec<usize> = (0..segments)
                .map(|i| {
                    let angle = 2.0 * PI * i as f64 / segments as f64;
                    let (sin, cos) = angle.sin_cos();
                    mesh.add_vertex(Vertex::new(
                        Point3::new(radius * cos, radius * sin, z),
                        Vector3::new(cos, sin, 0.0),
                    ))
                })
                .collect();
            if k > 0 {
                for i in 0..segments {
                    let n = (i + 1) % segments;
                    mesh.add_triangle(Triangle::new([prev[i], ring[i], prev[n]]));
                    mesh.add_triangle(Triangle::new([ring[i], ring[n], prev[n]]));
                }
            }
            prev = ring;
        }
        mesh
    }

    #[test]
    fn test_through_hole_rims_are_paired_and_filled() {
        let segments = 12;
        let tube = ringed_tube(4.0, 1.0, segments, 4);
        let (mut scene, root) = scene_with(tube);

        let report = remove_holes(&mut scene, root, &RemoveHolesOptions::default());
        assert_eq!(report.loops_found, 2);
        assert_eq!(report.filled_through, 2);
        assert_eq!(report.added_triangles, 2 * segments);

        let part = scene.parts_under(root)[0];
        let edges = EdgeMap::build(scene.part_mesh(part));
        assert!(edges.is_closed());
    }

    #[test]
    fn test_through_rims_not_filled_as_blind() {
        let tube = ringed_tube(4.0, 1.0, 12, 4);
        let (mut scene, root) = scene_with(tube);

        let options = RemoveHolesOptions {
            fill_through: false,
            fill_blind: true,
            fill_surfacic: false,
            max_diameter: 10.0,
        };
        let report = remove_holes(&mut scene, root, &options);
        assert_eq!(report.filled_through, 0);
        assert_eq!(report.filled_blind, 0);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_short_tube_is_surfacic() {
        let segments = 12;
        let tube = primitives::open_tube(2.0, 1.0, segments as u32);
        let (mut scene, root) = scene_with(tube);

        // Default options leave surfacic gaps open
        let untouched = remove_holes(&mut scene, root, &RemoveHolesOptions::default());
        assert_eq!(untouched.filled_through, 0);
        assert_eq!(untouched.skipped, 2);

        let options = RemoveHolesOptions {
            fill_through: false,
            fill_blind: false,
            fill_surfacic: true,
            max_diameter: 10.0,
        };
        let report = remove_holes(&mut scene, root, &options);
        assert_eq!(report.filled_surfacic, 2);

        let part = scene.parts_under(root)[0];
        assert!(EdgeMap::build(scene.part_mesh(part)).is_closed());
    }

    #[test]
    fn test_cup_rim_is_blind() {
        // Ringed tube plus a bottom cap: one rim opening remains
        let segments = 12;
        let mut mesh = ringed_tube(4.0, 1.0, segments, 4);
        let bottom: Vec<usize> = (0..segments).collect();
        let center = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, 0.0)));
        for i in 0..segments {
            let n = (i + 1) % segments;
            mesh.add_triangle(Triangle::new([center, bottom[n], bottom[i]]));
        }
        let (mut scene, root) = scene_with(mesh);

        let options = RemoveHolesOptions {
            fill_through: false,
            fill_blind: true,
            fill_surfacic: false,
            max_diameter: 10.0,
        };
        let report = remove_holes(&mut scene, root, &options);
        assert_eq!(report.loops_found, 1);
        assert_eq!(report.filled_blind, 1);

        let part = scene.parts_under(root)[0];
        assert!(EdgeMap::build(scene.part_mesh(part)).is_closed());
    }

    #[test]
    fn test_wide_holes_stay_open() {
        let tube = ringed_tube(4.0, 20.0, 12, 4);
        let (mut scene, root) = scene_with(tube);
        let before = scene.polygon_count(root);

        let report = remove_holes(&mut scene, root, &RemoveHolesOptions::default());
        assert_eq!(report.skipped, 2);
        assert_eq!(report.added_triangles, 0);
        assert_eq!(scene.polygon_count(root), before);
    }
}
