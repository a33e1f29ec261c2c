// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Mesh decimation by quadric error edge collapse
//!
//! Every vertex accumulates the plane quadrics of its incident faces, area
//! weighted. Boundary edges contribute stiff constraint planes so open
//! borders deviate no further than the lineic tolerance. Candidate collapses
//! are popped cheapest-first from a priority queue with lazy revalidation,
//! and a collapse is applied only while it keeps the weighted RMS deviation
//! inside tolerance, preserves the local edge links and does not rotate any
//! face normal past the bound.

use crate::geometry::topology::{edge_key, EdgeKey, EdgeKind, EdgeMap};
use crate::geometry::{Mesh, Triangle, Vertex};
use crate::scene::{OccurrenceId, Scene};
use ahash::AHashSet;
use nalgebra::{Matrix3, Point3, Vector3};
use ordered_float::NotNan;
use priority_queue::PriorityQueue;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimateOptions {
    /// Allowed RMS deviation of interior vertices, scene units.
    pub surfacic_tolerance: f64,
    /// Allowed RMS deviation of boundary vertices, scene units.
    pub lineic_tolerance: f64,
    /// Maximum rotation of any face normal per collapse, degrees.
    pub normal_tolerance_deg: f64,
    /// Collapse toward this fraction of the original triangle count,
    /// ignoring the deviation tolerances. `None` decimates by tolerance
    /// alone.
    pub target_ratio: Option<f64>,
}

impl Default for DecimateOptions {
    fn default() -> Self {
        Self {
            surfacic_tolerance: 1.0,
            lineic_tolerance: 0.1,
            normal_tolerance_deg: 3.0,
            target_ratio: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DecimateReport {
    pub collapsed_edges: usize,
    pub removed_triangles: usize,
    pub removed_vertices: usize,
}

const BOUNDARY_STIFFNESS: f64 = 100.0;

/// Decimate every part under `root`.
pub fn decimate(scene: &mut Scene, root: OccurrenceId, options: &DecimateOptions) -> DecimateReport {
    let mut report = DecimateReport::default();
    for part in scene.parts_under(root) {
        let mesh = scene.part_mesh_mut(part);
        let before = mesh.triangle_count();
        let collapses = decimate_mesh(mesh, options);
        report.collapsed_edges += collapses;
        report.removed_vertices += collapses;
        report.removed_triangles += before - mesh.triangle_count();
    }
    log::info!(
        "decimate: {} collapses removed {} triangles",
        report.collapsed_edges,
        report.removed_triangles
    );
    report
}

#[derive(Debug, Clone, Copy, Default)]
struct Quadric {
    a: Matrix3<f64>,
    b: Vector3<f64>,
    c: f64,
    weight: f64,
}

impl Quadric {
    fn from_plane(point: &Point3<f64>, normal: &Vector3<f64>, weight: f64) -> Self {
        let d = -normal.dot(&point.coords);
        Self {
            a: normal * normal.transpose() * weight,
            b: normal * (d * weight),
            c: d * d * weight,
            weight,
        }
    }

    fn add(&mut self, other: &Quadric) {
        self.a += other.a;
        self.b += other.b;
        self.c += other.c;
        self.weight += other.weight;
    }

    fn combined(&self, other: &Quadric) -> Quadric {
        let mut q = *self;
        q.add(other);
        q
    }

    fn error(&self, p: &Point3<f64>) -> f64 {
        let x = p.coords;
        (x.dot(&(self.a * x)) + 2.0 * self.b.dot(&x) + self.c).max(0.0)
    }

    /// Weight-normalized deviation estimate in scene units.
    fn rms_deviation(&self, p: &Point3<f64>) -> f64 {
        if self.weight < 1e-12 {
            0.0
        } else {
            (self.error(p) / self.weight).sqrt()
        }
    }

    fn optimal_point(&self) -> Option<Point3<f64>> {
        if self.a.determinant().abs() < 1e-10 {
            return None;
        }
        self.a
            .try_inverse()
            .map(|inv| Point3::from(inv * -self.b))
            .filter(|p| p.coords.iter().all(|v| v.is_finite()))
    }
}

struct CollapseState {
    positions: Vec<Point3<f64>>,
    quadrics: Vec<Quadric>,
    alive_vertex: Vec<bool>,
    on_boundary: Vec<bool>,
    faces: Vec<[usize; 3]>,
    alive_face: Vec<bool>,
    vertex_faces: Vec<AHashSet<usize>>,
    alive_face_count: usize,
}

impl CollapseState {
    fn build(mesh: &Mesh) -> Self {
        let positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        let faces: Vec<[usize; 3]> = mesh.triangles.iter().map(|t| t.indices).collect();

        let mut quadrics = vec![Quadric::default(); positions.len()];
        let mut vertex_faces = vec![AHashSet::new(); positions.len()];
        for (f, face) in faces.iter().enumerate() {
            let (normal, area) = mesh.triangle_normal_area(f);
            if area > 1e-12 {
                let q = Quadric::from_plane(&positions[face[0]], &normal, area);
                for &v in face {
                    quadrics[v].add(&q);
                }
            }
            for &v in face {
                vertex_faces[v].insert(f);
            }
        }

        let mut on_boundary = vec![false; positions.len()];
        let edges = EdgeMap::build(mesh);
        for ((a, b), face) in edges.boundary_edges() {
            on_boundary[a] = true;
            on_boundary[b] = true;
            let edge = positions[b] - positions[a];
            let len = edge.norm();
            let (face_normal, _) = mesh.triangle_normal_area(face);
            let constraint = face_normal.cross(&edge);
            if len > 1e-12 && constraint.norm() > 1e-12 {
                let q = Quadric::from_plane(
                    &positions[a],
                    &constraint.normalize(),
                    len * BOUNDARY_STIFFNESS,
                );
                quadrics[a].add(&q);
                quadrics[b].add(&q);
            }
        }

        let alive_face_count = faces.len();
        Self {
            alive_vertex: vec![true; positions.len()],
            alive_face: vec![true; faces.len()],
            positions,
            quadrics,
            on_boundary,
            faces,
            vertex_faces,
            alive_face_count,
        }
    }

    /// Cheapest placement for collapsing `(u, v)` among the quadric optimum,
    /// the midpoint and both endpoints.
    fn collapse_cost(&self, u: usize, v: usize) -> Option<(f64, Point3<f64>)> {
        let q = self.quadrics[u].combined(&self.quadrics[v]);
        let mut best: Option<(f64, Point3<f64>)> = None;
        let mut consider = |p: Point3<f64>| {
            let err = q.error(&p);
            if err.is_finite() && best.map_or(true, |(e, _)| err < e) {
                best = Some((err, p));
            }
        };
        if let Some(p) = q.optimal_point() {
            consider(p);
        }
        consider(nalgebra::center(&self.positions[u], &self.positions[v]));
        consider(self.positions[u]);
        consider(self.positions[v]);
        best
    }

    fn vertex_neighbors(&self, u: usize) -> AHashSet<usize> {
        let mut out = AHashSet::new();
        for &f in &self.vertex_faces[u] {
            for &v in &self.faces[f] {
                if v != u {
                    out.insert(v);
                }
            }
        }
        out
    }

    fn shared_faces(&self, u: usize, v: usize) -> Vec<usize> {
        self.vertex_faces[u]
            .iter()
            .filter(|&&f| self.faces[f].contains(&v))
            .copied()
            .collect()
    }

    fn face_normal(&self, face: usize, moved: usize, other: usize, at: &Point3<f64>) -> Vector3<f64> {
        let pos = |v: usize| -> Point3<f64> {
            if v == moved || v == other {
                *at
            } else {
                self.positions[v]
            }
        };
        let [a, b, c] = self.faces[face];
        let (p0, p1, p2) = (pos(a), pos(b), pos(c));
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Would moving `u` and `v` to `at` rotate a surviving face's normal by
    /// more than `max_angle`, or degenerate it?
    fn collapse_breaks_normals(
        &self,
        u: usize,
        v: usize,
        at: &Point3<f64>,
        max_angle: f64,
    ) -> bool {
        for &side in &[u, v] {
            for &f in &self.vertex_faces[side] {
                let face = self.faces[f];
                // Faces on the collapsing edge disappear
                if face.contains(&u) && face.contains(&v) {
                    continue;
                }
                let [a, b, c] = face;
                let before = (self.positions[b] - self.positions[a])
                    .cross(&(self.positions[c] - self.positions[a]));
                let after = self.face_normal(f, u, v, at);
                if after.norm() < 1e-12 {
                    return true;
                }
                if before.norm() > 1e-12 {
                    let cos = (before.dot(&after) / (before.norm() * after.norm()))
                        .clamp(-1.0, 1.0);
                    if cos.acos() > max_angle {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn apply_collapse(&mut self, u: usize, v: usize, at: Point3<f64>) {
        self.positions[u] = at;
        let qv = self.quadrics[v];
        self.quadrics[u].add(&qv);
        self.on_boundary[u] |= self.on_boundary[v];

        for f in self.shared_faces(u, v) {
            if self.alive_face[f] {
                self.alive_face[f] = false;
                self.alive_face_count -= 1;
                for &w in &self.faces[f] {
                    self.vertex_faces[w].remove(&f);
                }
            }
        }

        let moved: Vec<usize> = self.vertex_faces[v].iter().copied().collect();
        for f in moved {
            for slot in self.faces[f].iter_mut() {
                if *slot == v {
                    *slot = u;
                }
            }
            self.vertex_faces[u].insert(f);
        }
        self.vertex_faces[v].clear();
        self.alive_vertex[v] = false;
    }

    fn rebuild(&self, mesh: &mut Mesh) {
        let mut remap = vec![usize::MAX; self.positions.len()];
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        for (f, face) in self.faces.iter().enumerate() {
            if !self.alive_face[f] {
                continue;
            }
            let mut indices = [0usize; 3];
            for (k, &v) in face.iter().enumerate() {
                if remap[v] == usize::MAX {
                    remap[v] = vertices.len();
                    vertices.push(Vertex::at(self.positions[v]));
                }
                indices[k] = remap[v];
            }
            triangles.push(Triangle::new(indices));
        }
        mesh.vertices = vertices;
        mesh.triangles = triangles;
        mesh.recompute_normals();
    }
}

fn decimate_mesh(mesh: &mut Mesh, options: &DecimateOptions) -> usize {
    if mesh.triangle_count() < 4 {
        return 0;
    }

    let mut state = CollapseState::build(mesh);
    let target_faces = options
        .target_ratio
        .map(|r| ((mesh.triangle_count() as f64) * r.clamp(0.0, 1.0)).ceil() as usize);
    let max_angle = if target_faces.is_some() {
        std::f64::consts::FRAC_PI_2
    } else {
        options.normal_tolerance_deg.to_radians()
    };

    let mut queue: PriorityQueue<EdgeKey, Reverse<NotNan<f64>>> = PriorityQueue::new();
    let edges = EdgeMap::build(mesh);
    for ((a, b), kind) in edges.iter() {
        if matches!(kind, EdgeKind::NonManifold(_)) {
            continue;
        }
        if let Some((cost, _)) = state.collapse_cost(*a, *b) {
            if let Ok(cost) = NotNan::new(cost) {
                queue.push((*a, *b), Reverse(cost));
            }
        }
    }

    let mut collapses = 0;
    while let Some(((u, v), Reverse(popped))) = queue.pop() {
        if let Some(target) = target_faces {
            if state.alive_face_count <= target {
                break;
            }
        }
        if !state.alive_vertex[u] || !state.alive_vertex[v] {
            continue;
        }

        let Some((cost, at)) = state.collapse_cost(u, v) else {
            continue;
        };
        // Lazy revalidation: requeue entries whose cost drifted
        if (cost - popped.into_inner()).abs() > 1e-9 * popped.into_inner().max(1.0) {
            if let Ok(cost) = NotNan::new(cost) {
                queue.push((u, v), Reverse(cost));
            }
            continue;
        }

        if target_faces.is_none() {
            let tolerance = if state.on_boundary[u] || state.on_boundary[v] {
                options.lineic_tolerance
            } else {
                options.surfacic_tolerance
            };
            let q = state.quadrics[u].combined(&state.quadrics[v]);
            if q.rms_deviation(&at) > tolerance {
                continue;
            }
        }

        let shared = state.shared_faces(u, v);
        if shared.is_empty() || shared.len() > 2 {
            continue;
        }
        // Link condition keeps the collapse manifold
        let common: Vec<usize> = state
            .vertex_neighbors(u)
            .intersection(&state.vertex_neighbors(v))
            .copied()
            .collect();
        if common.len() != shared.len() {
            continue;
        }

        if state.collapse_breaks_normals(u, v, &at, max_angle) {
            continue;
        }

        state.apply_collapse(u, v, at);
        collapses += 1;

        for w in state.vertex_neighbors(u) {
            if let Some((cost, _)) = state.collapse_cost(u, w) {
                if let Ok(cost) = NotNan::new(cost) {
                    queue.push(edge_key(u, w), Reverse(cost));
                }
            }
        }
    }

    if collapses > 0 {
        state.rebuild(mesh);
    }
    collapses
}
