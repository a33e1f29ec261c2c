// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Patch cleanup: coincident face groups, slivers and micro shells

use crate::geometry::topology;
use crate::geometry::Mesh;
use crate::scene::{OccurrenceId, Scene};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletePatchesOptions {
    /// Keep one face of each coincident group. When false the whole group
    /// is removed, leaving an opening.
    pub keep_one_face: bool,
}

impl Default for DeletePatchesOptions {
    fn default() -> Self {
        Self {
            keep_one_face: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeletePatchesReport {
    pub removed_duplicates: usize,
    pub removed_slivers: usize,
    pub removed_shells: usize,
    pub removed_shell_triangles: usize,
}

const SLIVER_AREA: f64 = 1e-10;
// Disconnected shells below this share of the part surface are debris
const MICRO_SHELL_SHARE: f64 = 1e-3;

/// Delete redundant patches on every part under `root`.
pub fn delete_patches(
    scene: &mut Scene,
    root: OccurrenceId,
    options: &DeletePatchesOptions,
) -> DeletePatchesReport {
    let mut report = DeletePatchesReport::default();
    for part in scene.parts_under(root) {
        clean_part(scene.part_mesh_mut(part), options, &mut report);
    }
    log::info!(
        "delete_patches: removed {} duplicates, {} slivers, {} micro shells",
        report.removed_duplicates,
        report.removed_slivers,
        report.removed_shells
    );
    report
}

fn clean_part(mesh: &mut Mesh, options: &DeletePatchesOptions, report: &mut DeletePatchesReport) {
    let before = mesh.triangle_count();

    // Coincident groups share a vertex set regardless of winding
    let mut group_sizes: AHashMap<[usize; 3], usize> = AHashMap::new();
    for triangle in &mesh.triangles {
        *group_sizes.entry(triangle.sorted_indices()).or_insert(0) += 1;
    }

    let mut kept = Vec::with_capacity(mesh.triangles.len());
    let mut kept_of_group: AHashSet<[usize; 3]> = AHashSet::new();
    for (i, triangle) in mesh.triangles.iter().enumerate() {
        let key = triangle.sorted_indices();
        if group_sizes[&key] > 1 {
            if !options.keep_one_face || !kept_of_group.insert(key) {
                report.removed_duplicates += 1;
                continue;
            }
        }
        if mesh.triangle_area(i) < SLIVER_AREA {
            report.removed_slivers += 1;
            continue;
        }
        kept.push(*triangle);
    }
    mesh.triangles = kept;

    // Micro shells: disconnected fragments with negligible surface
    let components = topology::connected_components(mesh);
    if components.len() > 1 {
        let areas: Vec<f64> = components
            .iter()
            .map(|faces| faces.iter().map(|&f| mesh.triangle_area(f)).sum())
            .collect();
        let total: f64 = areas.iter().sum();
        let threshold = total * MICRO_SHELL_SHARE;
        let largest = areas
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);

        let mut drop_faces: AHashSet<usize> = AHashSet::new();
        for (c, faces) in components.iter().enumerate() {
            if c != largest && areas[c] < threshold {
                report.removed_shells += 1;
                report.removed_shell_triangles += faces.len();
                drop_faces.extend(faces.iter().copied());
            }
        }
        if !drop_faces.is_empty() {
            let mut index = 0;
            mesh.triangles.retain(|_| {
                let keep = !drop_faces.contains(&index);
                index += 1;
                keep
            });
        }
    }

    if mesh.triangle_count() != before {
        mesh.remove_orphaned_vertices();
        mesh.recompute_normals();
    }
}
