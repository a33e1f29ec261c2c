// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! glTF 2.0 exporter
//!
//! `.glb` writes the binary container with a JSON chunk and a BIN chunk.
//! `.gltf` writes a single self-contained JSON file with the buffer embedded
//! as a base64 data URI, so the output never needs a sibling `.bin`.
//! Occurrences map one-to-one onto nodes; parts shared by several
//! occurrences are exported once and referenced from each node.

use crate::geometry::Mesh;
use crate::scene::{OccurrenceId, PartId, Scene};
use ahash::AHashMap;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use nalgebra::Matrix4;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Export a scene to glTF or GLB, picked by extension.
pub fn export(scene: &Scene, path: &Path) -> Result<()> {
    let (json, buffer) = build_document(scene);
    let binary = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("glb"))
        .unwrap_or(false);
    if binary {
        write_glb(json, &buffer, path)
    } else {
        write_gltf_embedded(json, &buffer, path)
    }
}

fn build_document(scene: &Scene) -> (serde_json::Value, Vec<u8>) {
    let root = scene.root();
    let mut buffer: Vec<u8> = Vec::new();
    let mut buffer_views = Vec::new();
    let mut accessors = Vec::new();
    let mut meshes = Vec::new();
    let mut mesh_of_part: AHashMap<PartId, usize> = AHashMap::new();

    for part in scene.parts_under(root) {
        let mesh = scene.part_mesh(part);
        if mesh.is_empty() {
            continue;
        }
        let index = append_mesh(mesh, &mut buffer, &mut buffer_views, &mut accessors, &mut meshes);
        mesh_of_part.insert(part, index);
    }

    let occurrences = scene.descendants(root);
    let node_index: AHashMap<OccurrenceId, usize> = occurrences
        .iter()
        .enumerate()
        .map(|(index, &id)| (id, index))
        .collect();

    let mut nodes = Vec::new();
    for &id in &occurrences {
        let occurrence = scene.occurrence(id);
        let mut node = json!({ "name": occurrence.name });
        if occurrence.transform != Matrix4::identity() {
            node["matrix"] = json!(occurrence.transform.as_slice());
        }
        if let Some(mesh) = occurrence.part().and_then(|part| mesh_of_part.get(&part)) {
            node["mesh"] = json!(mesh);
        }
        let children: Vec<usize> = occurrence
            .children()
            .iter()
            .map(|child| node_index[child])
            .collect();
        if !children.is_empty() {
            node["children"] = json!(children);
        }
        nodes.push(node);
    }

    let mut document = json!({
        "asset": {
            "generator": "Meshpress",
            "version": "2.0"
        },
        "scene": 0,
        "scenes": [
            {
                "nodes": [0]
            }
        ],
        "nodes": nodes,
    });
    if !meshes.is_empty() {
        document["meshes"] = json!(meshes);
        document["accessors"] = json!(accessors);
        document["bufferViews"] = json!(buffer_views);
    }

    (document, buffer)
}

/// Append one part's geometry to the shared buffer and return its mesh index.
fn append_mesh(
    mesh: &Mesh,
    buffer: &mut Vec<u8>,
    buffer_views: &mut Vec<serde_json::Value>,
    accessors: &mut Vec<serde_json::Value>,
    meshes: &mut Vec<serde_json::Value>,
) -> usize {
    let position_offset = buffer.len();
    for vertex in &mesh.vertices {
        buffer.extend_from_slice(&(vertex.position.x as f32).to_le_bytes());
        buffer.extend_from_slice(&(vertex.position.y as f32).to_le_bytes());
        buffer.extend_from_slice(&(vertex.position.z as f32).to_le_bytes());
    }
    let position_length = buffer.len() - position_offset;

    let normal_offset = buffer.len();
    for vertex in &mesh.vertices {
        buffer.extend_from_slice(&(vertex.normal.x as f32).to_le_bytes());
        buffer.extend_from_slice(&(vertex.normal.y as f32).to_le_bytes());
        buffer.extend_from_slice(&(vertex.normal.z as f32).to_le_bytes());
    }
    let normal_length = buffer.len() - normal_offset;

    let index_offset = buffer.len();
    for triangle in &mesh.triangles {
        buffer.extend_from_slice(&(triangle.indices[0] as u32).to_le_bytes());
        buffer.extend_from_slice(&(triangle.indices[1] as u32).to_le_bytes());
        buffer.extend_from_slice(&(triangle.indices[2] as u32).to_le_bytes());
    }
    let index_length = buffer.len() - index_offset;

    let view_base = buffer_views.len();
    buffer_views.push(json!({
        "buffer": 0,
        "byteOffset": position_offset,
        "byteLength": position_length,
        "target": 34962
    }));
    buffer_views.push(json!({
        "buffer": 0,
        "byteOffset": normal_offset,
        "byteLength": normal_length,
        "target": 34962
    }));
    buffer_views.push(json!({
        "buffer": 0,
        "byteOffset": index_offset,
        "byteLength": index_length,
        "target": 34963
    }));

    let (min, max) = position_bounds(mesh);
    let accessor_base = accessors.len();
    accessors.push(json!({
        "bufferView": view_base,
        "byteOffset": 0,
        "componentType": 5126,
        "count": mesh.vertices.len(),
        "type": "VEC3",
        "min": [min[0], min[1], min[2]],
        "max": [max[0], max[1], max[2]]
    }));
    accessors.push(json!({
        "bufferView": view_base + 1,
        "byteOffset": 0,
        "componentType": 5126,
        "count": mesh.vertices.len(),
        "type": "VEC3"
    }));
    accessors.push(json!({
        "bufferView": view_base + 2,
        "byteOffset": 0,
        "componentType": 5125,
        "count": mesh.triangles.len() * 3,
        "type": "SCALAR"
    }));

    meshes.push(json!({
        "primitives": [
            {
                "attributes": {
                    "POSITION": accessor_base,
                    "NORMAL": accessor_base + 1
                },
                "indices": accessor_base + 2,
                "mode": 4
            }
        ]
    }));
    meshes.len() - 1
}

fn write_glb(mut json: serde_json::Value, buffer: &[u8], path: &Path) -> Result<()> {
    let has_bin = !buffer.is_empty();
    if has_bin {
        json["buffers"] = json!([{ "byteLength": buffer.len() }]);
    }

    let json_string = serde_json::to_string(&json)?;
    let mut json_length = json_string.len();
    align_to_multiple_of_four(&mut json_length);
    let json_padding = json_length - json_string.len();

    let mut bin_length = buffer.len();
    align_to_multiple_of_four(&mut bin_length);
    let bin_padding = bin_length - buffer.len();

    let total_length = 12 + 8 + json_length + if has_bin { 8 + bin_length } else { 0 };

    let mut file = File::create(path)
        .with_context(|| format!("failed to create GLB file: {}", path.display()))?;

    // GLB header
    file.write_all(&0x4654_6C67u32.to_le_bytes())?; // magic: "glTF"
    file.write_all(&2u32.to_le_bytes())?; // version
    file.write_all(&(total_length as u32).to_le_bytes())?;

    // JSON chunk, space padded
    file.write_all(&(json_length as u32).to_le_bytes())?;
    file.write_all(&0x4E4F_534Au32.to_le_bytes())?;
    file.write_all(json_string.as_bytes())?;
    for _ in 0..json_padding {
        file.write_all(b" ")?;
    }

    // BIN chunk, zero padded
    if has_bin {
        file.write_all(&(bin_length as u32).to_le_bytes())?;
        file.write_all(&0x004E_4942u32.to_le_bytes())?;
        file.write_all(buffer)?;
        for _ in 0..bin_padding {
            file.write_all(&[0])?;
        }
    }

    Ok(())
}

fn write_gltf_embedded(mut json: serde_json::Value, buffer: &[u8], path: &Path) -> Result<()> {
    if !buffer.is_empty() {
        let uri = format!("data:application/octet-stream;base64,{}", STANDARD.encode(buffer));
        json["buffers"] = json!([{ "byteLength": buffer.len(), "uri": uri }]);
    }
    let json_string = serde_json::to_string_pretty(&json)?;
    std::fs::write(path, json_string)
        .with_context(|| format!("failed to write glTF file: {}", path.display()))?;
    Ok(())
}

fn position_bounds(mesh: &Mesh) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX, f32::MAX, f32::MAX];
    let mut max = [f32::MIN, f32::MIN, f32::MIN];

    for vertex in &mesh.vertices {
        min[0] = min[0].min(vertex.position.x as f32);
        min[1] = min[1].min(vertex.position.y as f32);
        min[2] = min[2].min(vertex.position.z as f32);
        max[0] = max[0].max(vertex.position.x as f32);
        max[1] = max[1].max(vertex.position.y as f32);
        max[2] = max[2].max(vertex.position.z as f32);
    }

    (min, max)
}

fn align_to_multiple_of_four(n: &mut usize) {
    *n = (*n + 3) & !3;
}
