// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! STL importer
//!
//! STL carries one unnamed triangle soup, so the scene gets a single part.
//! `stl_io` deduplicates vertices while reading; face normals are recomputed
//! from the geometry rather than trusted from the file.

use crate::geometry::{Mesh, Triangle, Vertex};
use crate::scene::Scene;
use anyhow::{Context, Result};
use nalgebra::{Matrix4, Point3};
use std::fs::File;
use std::path::Path;

pub fn import(path: &Path) -> Result<Scene> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open STL file: {}", path.display()))?;
    let indexed = stl_io::read_stl(&mut file)
        .with_context(|| format!("failed to read STL file: {}", path.display()))?;

    let mut mesh = Mesh::with_capacity(indexed.vertices.len(), indexed.faces.len());
    for vertex in &indexed.vertices {
        mesh.add_vertex(Vertex::at(Point3::new(
            vertex[0] as f64,
            vertex[1] as f64,
            vertex[2] as f64,
        )));
    }
    for face in &indexed.faces {
        let triangle = Triangle::new(face.vertices);
        if !triangle.is_degenerate() {
            mesh.add_triangle(triangle);
        }
    }
    mesh.recompute_normals();

    let name = super::import_obj::scene_name(path);
    let mut scene = Scene::new(&name);
    let root = scene.root();
    scene.add_part(root, &name, Matrix4::identity(), mesh);
    Ok(scene)
}
