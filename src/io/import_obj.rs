// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Wavefront OBJ importer

use crate::geometry::{Mesh, Triangle, Vertex};
use crate::scene::Scene;
use anyhow::{Context, Result};
use nalgebra::{Matrix4, Point3, Vector3};
use std::path::Path;

/// Import an OBJ file, one part per object group.
pub fn import(path: &Path) -> Result<Scene> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .with_context(|| format!("failed to read OBJ file: {}", path.display()))?;

    let mut scene = Scene::new(&scene_name(path));
    let root = scene.root();

    for (index, model) in models.iter().enumerate() {
        let mesh = convert_model(&model.mesh);
        if mesh.is_empty() {
            continue;
        }
        let name = if model.name.is_empty() {
            format!("object_{index}")
        } else {
            model.name.clone()
        };
        scene.add_part(root, &name, Matrix4::identity(), mesh);
    }

    Ok(scene)
}

fn convert_model(source: &tobj::Mesh) -> Mesh {
    let vertex_count = source.positions.len() / 3;
    let mut mesh = Mesh::with_capacity(vertex_count, source.indices.len() / 3);
    let has_normals = source.normals.len() == source.positions.len();

    for i in 0..vertex_count {
        let position = Point3::new(
            source.positions[i * 3] as f64,
            source.positions[i * 3 + 1] as f64,
            source.positions[i * 3 + 2] as f64,
        );
        if has_normals {
            let normal = Vector3::new(
                source.normals[i * 3] as f64,
                source.normals[i * 3 + 1] as f64,
                source.normals[i * 3 + 2] as f64,
            );
            mesh.add_vertex(Vertex::new(position, normal));
        } else {
            mesh.add_vertex(Vertex::at(position));
        }
    }

    for face in source.indices.chunks_exact(3) {
        let triangle = Triangle::new([face[0] as usize, face[1] as usize, face[2] as usize]);
        if !triangle.is_degenerate() {
            mesh.add_triangle(triangle);
        }
    }

    if !has_normals {
        mesh.recompute_normals();
    }
    mesh
}

pub(super) fn scene_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scene")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_import_two_objects() -> Result<()> {
        let mut file = NamedTempFile::with_suffix(".obj")?;
        writeln!(file, "o quad")?;
        writeln!(file, "v 0 0 0")?;
        writeln!(file, "v 1 0 0")?;
        writeln!(file, "v 1 1 0")?;
        writeln!(file, "v 0 1 0")?;
        writeln!(file, "f 1 2 3 4")?;
        writeln!(file, "o tri")?;
        writeln!(file, "v 2 0 0")?;
        writeln!(file, "v 3 0 0")?;
        writeln!(file, "v 2 1 0")?;
        writeln!(file, "f 5 6 7")?;
        file.flush()?;

        let scene = import(file.path())?;
        let root = scene.root();
        assert_eq!(scene.part_count(root), 2);
        // The quad face triangulates
        assert_eq!(scene.polygon_count(root), 3);
        Ok(())
    }

    #[test]
    fn test_normals_computed_when_absent() -> Result<()> {
        let mut file = NamedTempFile::with_suffix(".obj")?;
        writeln!(file, "v 0 0 0")?;
        writeln!(file, "v 1 0 0")?;
        writeln!(file, "v 0 1 0")?;
        writeln!(file, "f 1 2 3")?;
        file.flush()?;

        let scene = import(file.path())?;
        let part = scene.parts_under(scene.root())[0];
        let normal = scene.part_mesh(part).vertices[0].normal;
        assert!((normal.z - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = import(Path::new("/nonexistent/model.obj")).unwrap_err();
        assert!(err.to_string().contains("model.obj"));
    }
}
