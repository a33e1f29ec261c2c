// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Hidden-geometry removal by multi-view ray casting
//!
//! The scene is flattened into one world-space collision mesh and rendered
//! from a ring of virtual cameras on the scene's bounding sphere. Triangles
//! never hit by any camera ray are occluded from every outside viewpoint and
//! can be discarded, either individually or as whole part occurrences.

use crate::geometry::topology::{edge_key, EdgeKey};
use crate::scene::{OccurrenceId, PartId, Scene};
use ahash::{AHashMap, AHashSet};
use nalgebra::{Point3, Vector3};
use parry3d::query::{Ray, RayCast};
use parry3d::shape::{FeatureId, TriMesh};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// What to discard when geometry is found occluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionLevel {
    /// Remove individual hidden triangles from each part.
    Polygons,
    /// Detach part occurrences with no visible triangle at all.
    Parts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionOptions {
    pub level: SelectionLevel,
    /// Rays per side of the square sampling grid.
    pub resolution: u32,
    /// Number of camera positions on the bounding sphere.
    pub viewpoints: usize,
    pub fov_deg: f64,
    /// Rings of neighbouring triangles kept around every visible one.
    pub adjacency_depth: usize,
}

impl Default for OcclusionOptions {
    fn default() -> Self {
        Self {
            level: SelectionLevel::Polygons,
            resolution: 1024,
            viewpoints: 16,
            fov_deg: 90.0,
            adjacency_depth: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OcclusionReport {
    pub rays_cast: usize,
    pub visible_triangles: usize,
    pub removed_triangles: usize,
    pub detached_occurrences: usize,
}

const RAY_SEED: u64 = 0x6d65_7368;
const MAX_RAY_RANGE: f32 = 1.0e8;

/// Remove geometry under `root` that no outside viewpoint can see.
pub fn remove_occluded_geometry(
    scene: &mut Scene,
    root: OccurrenceId,
    options: &OcclusionOptions,
) -> OcclusionReport {
    let flattened = scene.flattened_parts(root);
    let world = WorldTriangles::gather(scene, &flattened);
    if world.owners.is_empty() {
        return OcclusionReport::default();
    }

    let (center, radius) = scene.bounding_box(root).bounding_sphere();
    if radius <= 0.0 {
        return OcclusionReport::default();
    }

    let collision = TriMesh::new(world.points.clone(), world.indices.clone());
    let mut visible = vec![false; world.owners.len()];

    let fov = options.fov_deg.clamp(1.0, 179.0).to_radians();
    let distance = radius / (fov / 2.0).sin();
    let resolution = options.resolution.max(1);
    let mut rays_cast = 0;

    for (view, direction) in fibonacci_directions(options.viewpoints).iter().enumerate() {
        let eye = center + direction * distance;
        let mut rng = StdRng::seed_from_u64(RAY_SEED ^ view as u64);
        rays_cast += cast_view(
            &collision,
            &mut visible,
            &eye,
            &(center - eye).normalize(),
            fov,
            resolution,
            &mut rng,
        );
    }

    grow_selection(&mut visible, &world.indices, options.adjacency_depth);
    let visible_triangles = visible.iter().filter(|v| **v).count();

    let mut report = OcclusionReport {
        rays_cast,
        visible_triangles,
        ..OcclusionReport::default()
    };

    match options.level {
        SelectionLevel::Polygons => {
            retain_visible_polygons(scene, root, &flattened, &world, &visible, &mut report)
        }
        SelectionLevel::Parts => {
            detach_hidden_parts(scene, &flattened, &world, &visible, &mut report)
        }
    }

    log::info!(
        "occlusion: {} rays, {} visible triangles, removed {}",
        report.rays_cast,
        report.visible_triangles,
        report.removed_triangles
    );
    report
}

/// Evenly spread unit directions from the golden-angle spiral.
fn fibonacci_directions(count: usize) -> Vec<Vector3<f64>> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
            let ring = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden * i as f64;
            Vector3::new(ring * theta.cos(), y, ring * theta.sin())
        })
        .collect()
}

struct WorldTriangles {
    points: Vec<Point3<f32>>,
    indices: Vec<[u32; 3]>,
    /// Flattened entry index and local triangle index per world triangle.
    owners: Vec<(usize, usize)>,
}

impl WorldTriangles {
    fn gather(scene: &Scene, flattened: &[(OccurrenceId, PartId, nalgebra::Matrix4<f64>)]) -> Self {
        let mut points = Vec::new();
        let mut indices = Vec::new();
        let mut owners = Vec::new();

        for (entry, (_, part, world)) in flattened.iter().enumerate() {
            let mesh = scene.part_mesh(*part);
            // Part-local vertex sharing carries over, so edge adjacency
            // between world triangles of one instance stays intact
            let base = points.len() as u32;
            for vertex in &mesh.vertices {
                let wp = world.transform_point(&vertex.position);
                points.push(Point3::new(wp.x as f32, wp.y as f32, wp.z as f32));
            }
            for (local, triangle) in mesh.triangles.iter().enumerate() {
                let [a, b, c] = triangle.indices;
                indices.push([base + a as u32, base + b as u32, base + c as u32]);
                owners.push((entry, local));
            }
        }

        Self {
            points,
            indices,
            owners,
        }
    }
}

fn cast_view(
    collision: &TriMesh,
    visible: &mut [bool],
    eye: &Point3<f64>,
    forward: &Vector3<f64>,
    fov: f64,
    resolution: u32,
    rng: &mut StdRng,
) -> usize {
    let up_hint = if forward.y.abs() > 0.9 {
        Vector3::z()
    } else {
        Vector3::y()
    };
    let right = forward.cross(&up_hint).normalize();
    let up = right.cross(forward);
    let half_extent = (fov / 2.0).tan();

    let origin = Point3::new(eye.x as f32, eye.y as f32, eye.z as f32);
    let triangle_count = visible.len();
    let mut cast = 0;

    for py in 0..resolution {
        for px in 0..resolution {
            // Jittered sampling breaks up grid aliasing against thin features
            let u = ((px as f64 + rng.gen::<f64>()) / resolution as f64) * 2.0 - 1.0;
            let v = ((py as f64 + rng.gen::<f64>()) / resolution as f64) * 2.0 - 1.0;
            let direction = (forward + right * (u * half_extent) + up * (v * half_extent))
                .normalize();
            let ray = Ray::new(
                origin,
                Vector3::new(direction.x as f32, direction.y as f32, direction.z as f32),
            );
            cast += 1;

            if let Some(hit) = collision.cast_local_ray_and_get_normal(&ray, MAX_RAY_RANGE, false) {
                if let FeatureId::Face(fid) = hit.feature {
                    // Back-face hits report ids offset by the triangle count
                    visible[fid as usize % triangle_count] = true;
                }
            }
        }
    }
    cast
}

/// Expand the visible set by `depth` rings of edge neighbours.
fn grow_selection(visible: &mut [bool], indices: &[[u32; 3]], depth: usize) {
    if depth == 0 {
        return;
    }

    let mut incident: AHashMap<EdgeKey, Vec<usize>> = AHashMap::new();
    for (face, tri) in indices.iter().enumerate() {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        for (u, v) in [(a, b), (b, c), (c, a)] {
            incident.entry(edge_key(u, v)).or_default().push(face);
        }
    }

    let mut frontier: Vec<usize> = (0..visible.len()).filter(|&f| visible[f]).collect();
    for _ in 0..depth {
        let mut next = Vec::new();
        for &face in &frontier {
            let tri = indices[face];
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            for (u, v) in [(a, b), (b, c), (c, a)] {
                if let Some(faces) = incident.get(&edge_key(u, v)) {
                    for &neighbour in faces {
                        if !visible[neighbour] {
                            visible[neighbour] = true;
                            next.push(neighbour);
                        }
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
}

fn retain_visible_polygons(
    scene: &mut Scene,
    root: OccurrenceId,
    flattened: &[(OccurrenceId, PartId, nalgebra::Matrix4<f64>)],
    world: &WorldTriangles,
    visible: &[bool],
    report: &mut OcclusionReport,
) {
    let mut visible_by_part: AHashMap<PartId, AHashSet<usize>> = AHashMap::new();
    for (world_index, seen) in visible.iter().enumerate() {
        if *seen {
            let (entry, local) = world.owners[world_index];
            visible_by_part
                .entry(flattened[entry].1)
                .or_default()
                .insert(local);
        }
    }

    for part in scene.parts_under(root) {
        let keep = visible_by_part.remove(&part).unwrap_or_default();
        let mesh = scene.part_mesh_mut(part);
        let before = mesh.triangle_count();
        let mut index = 0;
        mesh.triangles.retain(|_| {
            let kept = keep.contains(&index);
            index += 1;
            kept
        });
        let removed = before - mesh.triangle_count();
        if removed > 0 {
            report.removed_triangles += removed;
            mesh.remove_orphaned_vertices();
            mesh.recompute_normals();
        }
    }
}

fn detach_hidden_parts(
    scene: &mut Scene,
    flattened: &[(OccurrenceId, PartId, nalgebra::Matrix4<f64>)],
    world: &WorldTriangles,
    visible: &[bool],
    report: &mut OcclusionReport,
) {
    let mut seen_entries = vec![false; flattened.len()];
    for (world_index, seen) in visible.iter().enumerate() {
        if *seen {
            seen_entries[world.owners[world_index].0] = true;
        }
    }

    for (entry, &(occurrence, part, _)) in flattened.iter().enumerate() {
        if seen_entries[entry] {
            continue;
        }
        // Only prune leaves so visible children are never dropped with them
        if !scene.occurrence(occurrence).children().is_empty() {
            continue;
        }
        if scene.detach(occurrence) {
            report.detached_occurrences += 1;
            report.removed_triangles += scene.part_mesh(part).triangle_count();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use nalgebra::Matrix4;

    fn fast_options(level: SelectionLevel) -> OcclusionOptions {
        OcclusionOptions {
            level,
            resolution: 96,
            viewpoints: 8,
            fov_deg: 90.0,
            adjacency_depth: 1,
        }
    }

    #[test]
    fn test_lone_cube_keeps_every_face() {
        let mut scene = Scene::new("occlusion");
        let root = scene.root();
        scene.add_part(
            root,
            "cube",
            Matrix4::identity(),
            primitives::cube(Vector3::new(10.0, 10.0, 10.0)),
        );

        let report =
            remove_occluded_geometry(&mut scene, root, &fast_options(SelectionLevel::Polygons));
        assert_eq!(scene.polygon_count(root), 12);
        assert_eq!(report.removed_triangles, 0);
        assert_eq!(report.visible_triangles, 12);
        assert!(report.rays_cast > 0);
    }

    #[test]
    fn test_enclosed_sphere_polygons_removed() {
        let mut scene = Scene::new("occlusion");
        let root = scene.root();
        scene.add_part(
            root,
            "shell",
            Matrix4::identity(),
            primitives::cube(Vector3::new(20.0, 20.0, 20.0)),
        );
        let (_, inner) = scene.add_part(
            root,
            "hidden",
            Matrix4::identity(),
            primitives::uv_sphere(2.0, 12),
        );
        let hidden_triangles = scene.part_mesh(inner).triangle_count();
        let before = scene.polygon_count(root);

        let report =
            remove_occluded_geometry(&mut scene, root, &fast_options(SelectionLevel::Polygons));
        assert_eq!(report.removed_triangles, hidden_triangles);
        assert_eq!(scene.polygon_count(root), before - hidden_triangles);
        assert!(scene.part_mesh(inner).is_empty());
    }

    #[test]
    fn test_enclosed_part_detached() {
        let mut scene = Scene::new("occlusion");
        let root = scene.root();
        scene.add_part(
            root,
            "shell",
            Matrix4::identity(),
            primitives::cube(Vector3::new(20.0, 20.0, 20.0)),
        );
        scene.add_part(
            root,
            "hidden",
            Matrix4::identity(),
            primitives::uv_sphere(2.0, 12),
        );
        assert_eq!(scene.part_count(root), 2);

        let report =
            remove_occluded_geometry(&mut scene, root, &fast_options(SelectionLevel::Parts));
        assert_eq!(report.detached_occurrences, 1);
        assert_eq!(scene.part_count(root), 1);
        assert_eq!(scene.polygon_count(root), 12);
    }

    #[test]
    fn test_empty_scene_is_a_noop() {
        let mut scene = Scene::new("occlusion");
        let root = scene.root();
        let report =
            remove_occluded_geometry(&mut scene, root, &OcclusionOptions::default());
        assert_eq!(report.rays_cast, 0);
        assert_eq!(report.visible_triangles, 0);
    }
}
