// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Assembly scene: occurrence tree plus the part meshes it references

mod stats;

pub use stats::SceneStats;

use crate::geometry::{Aabb, Mesh};
use nalgebra::Matrix4;

/// Handle to a node in the occurrence tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccurrenceId(usize);

/// Handle to a part mesh. Several occurrences may instance the same part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartId(usize);

/// Node of the assembly tree. An occurrence may carry a part mesh.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub name: String,
    pub transform: Matrix4<f64>,
    part: Option<PartId>,
    parent: Option<OccurrenceId>,
    children: Vec<OccurrenceId>,
}

impl Occurrence {
    pub fn part(&self) -> Option<PartId> {
        self.part
    }

    pub fn parent(&self) -> Option<OccurrenceId> {
        self.parent
    }

    pub fn children(&self) -> &[OccurrenceId] {
        &self.children
    }
}

/// Occurrence arena with slot 0 as the scene root. Detached occurrences keep
/// their slot but are no longer reachable from the root, so traversals and
/// counts skip them.
#[derive(Debug, Clone)]
pub struct Scene {
    occurrences: Vec<Occurrence>,
    parts: Vec<Mesh>,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            occurrences: vec![Occurrence {
                name: name.to_string(),
                transform: Matrix4::identity(),
                part: None,
                parent: None,
                children: Vec::new(),
            }],
            parts: Vec::new(),
        }
    }

    /// Root of the occurrence tree.
    pub fn root(&self) -> OccurrenceId {
        OccurrenceId(0)
    }

    pub fn occurrence(&self, id: OccurrenceId) -> &Occurrence {
        &self.occurrences[id.0]
    }

    pub fn occurrence_mut(&mut self, id: OccurrenceId) -> &mut Occurrence {
        &mut self.occurrences[id.0]
    }

    pub fn add_occurrence(
        &mut self,
        parent: OccurrenceId,
        name: &str,
        transform: Matrix4<f64>,
    ) -> OccurrenceId {
        let id = OccurrenceId(self.occurrences.len());
        self.occurrences.push(Occurrence {
            name: name.to_string(),
            transform,
            part: None,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.occurrences[parent.0].children.push(id);
        id
    }

    /// Add a new part mesh under `parent`, wrapped in its own occurrence.
    pub fn add_part(
        &mut self,
        parent: OccurrenceId,
        name: &str,
        transform: Matrix4<f64>,
        mesh: Mesh,
    ) -> (OccurrenceId, PartId) {
        let part = PartId(self.parts.len());
        self.parts.push(mesh);
        let id = self.add_occurrence(parent, name, transform);
        self.occurrences[id.0].part = Some(part);
        (id, part)
    }

    /// Add an occurrence instancing an existing part.
    pub fn add_instance(
        &mut self,
        parent: OccurrenceId,
        name: &str,
        transform: Matrix4<f64>,
        part: PartId,
    ) -> OccurrenceId {
        let id = self.add_occurrence(parent, name, transform);
        self.occurrences[id.0].part = Some(part);
        id
    }

    pub fn part_mesh(&self, id: PartId) -> &Mesh {
        &self.parts[id.0]
    }

    pub fn part_mesh_mut(&mut self, id: PartId) -> &mut Mesh {
        &mut self.parts[id.0]
    }

    /// Detach an occurrence (and with it the whole subtree) from its parent.
    /// The root cannot be detached.
    pub fn detach(&mut self, id: OccurrenceId) -> bool {
        let Some(parent) = self.occurrences[id.0].parent else {
            return false;
        };
        self.occurrences[parent.0].children.retain(|&c| c != id);
        self.occurrences[id.0].parent = None;
        true
    }

    /// Product of occurrence transforms from the root down to `id`.
    pub fn world_transform(&self, id: OccurrenceId) -> Matrix4<f64> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(occ) = cursor {
            chain.push(occ);
            cursor = self.occurrences[occ.0].parent;
        }
        let mut world = Matrix4::identity();
        for occ in chain.into_iter().rev() {
            world *= self.occurrences[occ.0].transform;
        }
        world
    }

    /// Pre-order traversal of the subtree rooted at `root`, including `root`.
    pub fn descendants(&self, root: OccurrenceId) -> Vec<OccurrenceId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.occurrences[id.0].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Occurrences under `root` that carry a part.
    pub fn part_occurrences(&self, root: OccurrenceId) -> Vec<OccurrenceId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.occurrences[id.0].part.is_some())
            .collect()
    }

    /// Distinct parts referenced under `root`, in first-visit order.
    pub fn parts_under(&self, root: OccurrenceId) -> Vec<PartId> {
        let mut seen = vec![false; self.parts.len()];
        let mut out = Vec::new();
        for id in self.part_occurrences(root) {
            let part = self.occurrences[id.0].part.unwrap();
            if !seen[part.0] {
                seen[part.0] = true;
                out.push(part);
            }
        }
        out
    }

    /// Part-carrying occurrences under `root` with their world transforms.
    /// Instances appear once per occurrence.
    pub fn flattened_parts(
        &self,
        root: OccurrenceId,
    ) -> Vec<(OccurrenceId, PartId, Matrix4<f64>)> {
        let mut out = Vec::new();
        let base = self
            .occurrences[root.0]
            .parent
            .map(|p| self.world_transform(p))
            .unwrap_or_else(Matrix4::identity);
        let mut stack = vec![(root, base)];
        while let Some((id, acc)) = stack.pop() {
            let occ = &self.occurrences[id.0];
            let world = acc * occ.transform;
            if let Some(part) = occ.part {
                out.push((id, part, world));
            }
            for &child in occ.children.iter().rev() {
                stack.push((child, world));
            }
        }
        out
    }

    /// Triangles under `root`, instances counted each time they occur.
    pub fn polygon_count(&self, root: OccurrenceId) -> usize {
        self.part_occurrences(root)
            .iter()
            .map(|&id| {
                let part = self.occurrences[id.0].part.unwrap();
                self.parts[part.0].triangle_count()
            })
            .sum()
    }

    /// Vertices under `root`, instances counted each time they occur.
    pub fn vertex_count(&self, root: OccurrenceId) -> usize {
        self.part_occurrences(root)
            .iter()
            .map(|&id| {
                let part = self.occurrences[id.0].part.unwrap();
                self.parts[part.0].vertex_count()
            })
            .sum()
    }

    pub fn part_count(&self, root: OccurrenceId) -> usize {
        self.part_occurrences(root).len()
    }

    /// World-space bounding box of all parts under `root`.
    pub fn bounding_box(&self, root: OccurrenceId) -> Aabb {
        let mut bbox = Aabb::empty();
        for (_, part, world) in self.flattened_parts(root) {
            for vertex in &self.parts[part.0].vertices {
                bbox.expand_to_include(&world.transform_point(&vertex.position));
            }
        }
        bbox
    }
}
