// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Binary STL exporter
//!
//! STL has no scene graph, so every part occurrence is flattened into world
//! space and written as one triangle soup.

use crate::scene::Scene;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

pub fn export(scene: &Scene, path: &Path) -> Result<()> {
    let mut triangles = Vec::new();
    for (_, part, world) in scene.flattened_parts(scene.root()) {
        let mesh = scene.part_mesh(part);
        for index in 0..mesh.triangle_count() {
            let [p0, p1, p2] = mesh
                .triangle_points(index)
                .map(|p| world.transform_point(&p));
            let cross = (p1 - p0).cross(&(p2 - p0));
            let normal = if cross.norm() > 0.0 {
                cross.normalize()
            } else {
                cross
            };
            triangles.push(StlTriangle {
                normal: Normal::new([normal.x as f32, normal.y as f32, normal.z as f32]),
                vertices: [
                    StlVertex::new([p0.x as f32, p0.y as f32, p0.z as f32]),
                    StlVertex::new([p1.x as f32, p1.y as f32, p1.z as f32]),
                    StlVertex::new([p2.x as f32, p2.y as f32, p2.z as f32]),
                ],
            });
        }
    }

    let mut file = File::create(path)
        .with_context(|| format!("failed to create STL file: {}", path.display()))?;
    stl_io::write_stl(&mut file, triangles.iter())
        .with_context(|| format!("failed to write STL file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use nalgebra::{Matrix4, Vector3};
    use tempfile::NamedTempFile;

    #[test]
    fn test_instances_are_flattened() -> Result<()> {
        let mut scene = Scene::new("stl");
        let root = scene.root();
        let (_, part) = scene.add_part(
            root,
            "cube",
            Matrix4::identity(),
            primitives::cube(Vector3::new(1.0, 1.0, 1.0)),
        );
        scene.add_instance(
            root,
            "cube_far",
            Matrix4::new_translation(&Vector3::new(100.0, 0.0, 0.0)),
            part,
        );

        let file = NamedTempFile::with_suffix(".stl")?;
        export(&scene, file.path())?;

        let mut reader = File::open(file.path())?;
        let indexed = stl_io::read_stl(&mut reader)?;
        assert_eq!(indexed.faces.len(), 24);

        let max_x = indexed
            .vertices
            .iter()
            .map(|v| v[0])
            .fold(f32::MIN, f32::max);
        assert!((max_x - 100.5).abs() < 1e-4);
        Ok(())
    }
}
