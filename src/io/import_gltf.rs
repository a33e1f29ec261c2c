// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! glTF and GLB importer
//!
//! The node tree maps directly onto occurrences. Nodes sharing a glTF mesh
//! become instances of one part, so assemblies keep their reuse instead of
//! duplicating geometry per placement.

use crate::geometry::{Mesh, Triangle, Vertex};
use crate::scene::{PartId, Scene};
use ahash::AHashMap;
use anyhow::{Context, Result};
use nalgebra::{Matrix4, Point3, Vector3};
use std::path::Path;

pub fn import(path: &Path) -> Result<Scene> {
    let (document, buffers, _images) = gltf::import(path)
        .with_context(|| format!("failed to read glTF file: {}", path.display()))?;

    let source = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .with_context(|| format!("glTF file has no scene: {}", path.display()))?;

    let mut scene = Scene::new(&super::import_obj::scene_name(path));
    let root = scene.root();
    let mut parts: AHashMap<usize, PartId> = AHashMap::new();

    for node in source.nodes() {
        import_node(&mut scene, root, &node, &buffers, &mut parts);
    }
    Ok(scene)
}

fn import_node(
    scene: &mut Scene,
    parent: crate::scene::OccurrenceId,
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parts: &mut AHashMap<usize, PartId>,
) {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));
    let transform = node_matrix(node);

    let id = match node.mesh() {
        Some(mesh) => match parts.get(&mesh.index()) {
            Some(&part) => scene.add_instance(parent, &name, transform, part),
            None => {
                let converted = convert_mesh(&mesh, buffers);
                let (occurrence, part) = scene.add_part(parent, &name, transform, converted);
                parts.insert(mesh.index(), part);
                occurrence
            }
        },
        None => scene.add_occurrence(parent, &name, transform),
    };

    for child in node.children() {
        import_node(scene, id, &child, buffers, parts);
    }
}

fn node_matrix(node: &gltf::Node) -> Matrix4<f64> {
    // glTF matrices are column-major
    let m = node.transform().matrix();
    Matrix4::from_fn(|row, col| m[col][row] as f64)
}

fn convert_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Mesh {
    let mut out = Mesh::new();
    let mut needs_normals = false;

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|iter| iter.collect());
        if normals.is_none() {
            needs_normals = true;
        }

        let base = out.vertex_count();
        for (i, p) in positions.iter().enumerate() {
            let position = Point3::new(p[0] as f64, p[1] as f64, p[2] as f64);
            match normals.as_ref().and_then(|list| list.get(i)) {
                Some(n) => out.add_vertex(Vertex::new(
                    position,
                    Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64),
                )),
                None => out.add_vertex(Vertex::at(position)),
            };
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            // Non-indexed triangle list
            None => (0..positions.len() as u32).collect(),
        };
        for face in indices.chunks_exact(3) {
            let triangle = Triangle::new([
                base + face[0] as usize,
                base + face[1] as usize,
                base + face[2] as usize,
            ]);
            if !triangle.is_degenerate() {
                out.add_triangle(triangle);
            }
        }
    }

    if needs_normals {
        out.recompute_normals();
    }
    out
}
