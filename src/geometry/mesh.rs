// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Indexed triangle mesh representation and cleanup utilities

use super::Aabb;
use ahash::AHashMap;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl Vertex {
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { position, normal }
    }

    pub fn at(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
        }
    }

    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        self.position = matrix.transform_point(&self.position);
        // Normals transform by the inverse transpose
        let normal_matrix = matrix
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(*matrix);
        let n = normal_matrix.transform_vector(&self.normal);
        if n.norm() > 0.0 {
            self.normal = n.normalize();
        }
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }

    /// True when two or more indices coincide.
    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = self.indices;
        a == b || b == c || a == c
    }

    /// Indices rotated so the smallest comes first, winding preserved.
    pub fn canonical_indices(&self) -> [usize; 3] {
        let [a, b, c] = self.indices;
        if a <= b && a <= c {
            [a, b, c]
        } else if b <= a && b <= c {
            [b, c, a]
        } else {
            [c, a, b]
        }
    }

    /// Indices sorted ascending, winding discarded.
    pub fn sorted_indices(&self) -> [usize; 3] {
        let mut ids = self.indices;
        ids.sort_unstable();
        ids
    }
}

/// Triangular mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a triangle
    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Transform all vertices by a matrix
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            vertex.transform(matrix);
        }
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Corner positions of triangle `index`.
    pub fn triangle_points(&self, index: usize) -> [Point3<f64>; 3] {
        let t = &self.triangles[index];
        [
            self.vertices[t.indices[0]].position,
            self.vertices[t.indices[1]].position,
            self.vertices[t.indices[2]].position,
        ]
    }

    /// Unit face normal and area of triangle `index`. Degenerate triangles
    /// report a zero normal and zero area.
    pub fn triangle_normal_area(&self, index: usize) -> (Vector3<f64>, f64) {
        let [p0, p1, p2] = self.triangle_points(index);
        let cross = (p1 - p0).cross(&(p2 - p0));
        let doubled = cross.norm();
        if doubled > 0.0 {
            (cross / doubled, doubled * 0.5)
        } else {
            (Vector3::zeros(), 0.0)
        }
    }

    pub fn triangle_area(&self, index: usize) -> f64 {
        self.triangle_normal_area(index).1
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.triangles.len()).map(|i| self.triangle_area(i)).sum()
    }

    /// Signed volume from the divergence theorem. Positive for closed meshes
    /// wound counter-clockwise seen from outside.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for t in &self.triangles {
            let p0 = self.vertices[t.indices[0]].position.coords;
            let p1 = self.vertices[t.indices[1]].position.coords;
            let p2 = self.vertices[t.indices[2]].position.coords;
            volume += p0.dot(&p1.cross(&p2));
        }
        volume / 6.0
    }

    /// Merge with another mesh (index offset, no welding)
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);

        for triangle in &other.triangles {
            self.triangles.push(Triangle::new([
                triangle.indices[0] + offset,
                triangle.indices[1] + offset,
                triangle.indices[2] + offset,
            ]));
        }
    }

    /// Weld vertices that are within `tolerance` of each other and remap
    /// triangle indices. Uses a uniform grid so the pass stays near-linear.
    /// The first vertex of each cluster survives. Returns the number of
    /// vertices removed.
    pub fn weld_vertices(&mut self, tolerance: f64) -> usize {
        if self.vertices.is_empty() {
            return 0;
        }

        let original_count = self.vertices.len();
        let cell_size = tolerance.max(1e-12);
        let cell_of = |p: &Point3<f64>| -> (i64, i64, i64) {
            (
                (p.x / cell_size).floor() as i64,
                (p.y / cell_size).floor() as i64,
                (p.z / cell_size).floor() as i64,
            )
        };

        // Grid cell -> indices into new_vertices
        let mut grid: AHashMap<(i64, i64, i64), Vec<usize>> = AHashMap::new();
        let mut new_vertices: Vec<Vertex> = Vec::with_capacity(original_count);
        let mut remap: Vec<usize> = vec![0; original_count];

        for (i, vertex) in self.vertices.iter().enumerate() {
            let pos = vertex.position;
            let (cx, cy, cz) = cell_of(&pos);
            let mut target = None;

            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(bucket) = grid.get(&(cx + dx, cy + dy, cz + dz)) {
                            for &j in bucket {
                                if (pos - new_vertices[j].position).norm() < tolerance {
                                    target = Some(j);
                                    break 'search;
                                }
                            }
                        }
                    }
                }
            }

            remap[i] = match target {
                Some(j) => j,
                None => {
                    let j = new_vertices.len();
                    new_vertices.push(*vertex);
                    grid.entry((cx, cy, cz)).or_default().push(j);
                    j
                }
            };
        }

        for triangle in &mut self.triangles {
            for k in 0..3 {
                triangle.indices[k] = remap[triangle.indices[k]];
            }
        }

        self.vertices = new_vertices;
        original_count - self.vertices.len()
    }

    /// Remove triangles with repeated indices, out-of-range indices or an
    /// area below `min_area`. Returns the number removed.
    pub fn remove_degenerate_triangles(&mut self, min_area: f64) -> usize {
        let original_count = self.triangles.len();
        let vertex_count = self.vertices.len();
        let vertices = &self.vertices;

        self.triangles.retain(|t| {
            if t.is_degenerate() {
                return false;
            }
            if t.indices.iter().any(|&i| i >= vertex_count) {
                return false;
            }
            let p0 = vertices[t.indices[0]].position;
            let p1 = vertices[t.indices[1]].position;
            let p2 = vertices[t.indices[2]].position;
            (p1 - p0).cross(&(p2 - p0)).norm() * 0.5 > min_area
        });

        original_count - self.triangles.len()
    }

    /// Remove triangles that repeat an earlier triangle with the same winding.
    /// Returns the number removed.
    pub fn remove_duplicate_triangles(&mut self) -> usize {
        let original_count = self.triangles.len();
        let mut seen: AHashMap<[usize; 3], ()> = AHashMap::with_capacity(original_count);

        self.triangles
            .retain(|t| seen.insert(t.canonical_indices(), ()).is_none());

        original_count - self.triangles.len()
    }

    /// Remove vertices not referenced by any triangle and remap indices.
    /// Returns the number removed.
    pub fn remove_orphaned_vertices(&mut self) -> usize {
        if self.triangles.is_empty() {
            let removed = self.vertices.len();
            self.vertices.clear();
            return removed;
        }

        let mut used = vec![false; self.vertices.len()];
        for triangle in &self.triangles {
            for &i in &triangle.indices {
                used[i] = true;
            }
        }

        let mut remap = vec![0usize; self.vertices.len()];
        let mut new_vertices = Vec::new();
        for (old_index, &keep) in used.iter().enumerate() {
            if keep {
                remap[old_index] = new_vertices.len();
                new_vertices.push(self.vertices[old_index]);
            }
        }

        for triangle in &mut self.triangles {
            for k in 0..3 {
                triangle.indices[k] = remap[triangle.indices[k]];
            }
        }

        let removed = self.vertices.len() - new_vertices.len();
        self.vertices = new_vertices;
        removed
    }

    /// Recompute vertex normals as the area-weighted average of incident
    /// face normals.
    pub fn recompute_normals(&mut self) {
        if self.vertices.is_empty() || self.triangles.is_empty() {
            return;
        }

        let mut normal_sums: Vec<Vector3<f64>> = vec![Vector3::zeros(); self.vertices.len()];

        for triangle in &self.triangles {
            let v0 = &self.vertices[triangle.indices[0]];
            let v1 = &self.vertices[triangle.indices[1]];
            let v2 = &self.vertices[triangle.indices[2]];

            let cross = (v1.position - v0.position).cross(&(v2.position - v0.position));
            if cross.norm() > 1e-10 {
                for &idx in &triangle.indices {
                    // Cross product length is twice the area, which gives
                    // the area weighting for free
                    normal_sums[idx] += cross;
                }
            }
        }

        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            if normal_sums[i].norm() > 1e-10 {
                vertex.normal = normal_sums[i].normalize();
            } else {
                vertex.normal = Vector3::new(0.0, 0.0, 1.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;

    #[test]
    fn test_weld_merges_coincident_corners() {
        // Two triangles sharing an edge, stored with duplicated vertices
        let mut mesh = Mesh::new();
        let quad = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        for &[a, b, c] in &[[0usize, 1, 2], [0, 2, 3]] {
            let i0 = mesh.add_vertex(Vertex::at(quad[a]));
            let i1 = mesh.add_vertex(Vertex::at(quad[b]));
            let i2 = mesh.add_vertex(Vertex::at(quad[c]));
            mesh.add_triangle(Triangle::new([i0, i1, i2]));
        }
        assert_eq!(mesh.vertex_count(), 6);

        let removed = mesh.weld_vertices(1e-6);
        assert_eq!(removed, 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_weld_then_degenerate_removal() {
        // A sliver whose corners collapse under a coarse tolerance
        let mut mesh = Mesh::new();
        let i0 = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, 0.0)));
        let i1 = mesh.add_vertex(Vertex::at(Point3::new(0.001, 0.0, 0.0)));
        let i2 = mesh.add_vertex(Vertex::at(Point3::new(0.0, 5.0, 0.0)));
        mesh.add_triangle(Triangle::new([i0, i1, i2]));

        mesh.weld_vertices(0.01);
        assert_eq!(mesh.vertex_count(), 2);
        let removed = mesh.remove_degenerate_triangles(1e-12);
        assert_eq!(removed, 1);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_remove_duplicate_triangles_ignores_rotation() {
        let mut mesh = Mesh::new();
        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ] {
            mesh.add_vertex(Vertex::at(p));
        }
        mesh.add_triangle(Triangle::new([0, 1, 2]));
        mesh.add_triangle(Triangle::new([1, 2, 0]));
        mesh.add_triangle(Triangle::new([2, 0, 1]));
        // Opposite winding is a different face and must survive
        mesh.add_triangle(Triangle::new([0, 2, 1]));

        let removed = mesh.remove_duplicate_triangles();
        assert_eq!(removed, 2);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_remove_orphaned_vertices() {
        let mut mesh = Mesh::new();
        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(9.0, 9.0, 9.0),
        ] {
            mesh.add_vertex(Vertex::at(p));
        }
        mesh.add_triangle(Triangle::new([0, 1, 2]));

        let removed = mesh.remove_orphaned_vertices();
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangles[0].indices, [0, 1, 2]);
    }

    #[test]
    fn test_signed_volume_of_cube() {
        let cube = primitives::cube(Vector3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(cube.signed_volume(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recompute_normals_flat_plane() {
        let mut plane = primitives::grid_plane(4.0, 4.0, 3);
        plane.recompute_normals();
        for v in &plane.vertices {
            assert_relative_eq!(v.normal.z, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_transform_translates_bounding_box() {
        let mut cube = primitives::cube(Vector3::new(2.0, 2.0, 2.0));
        let shift = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0));
        cube.transform(&shift);
        let bbox = cube.bounding_box();
        assert_relative_eq!(bbox.center().x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.center().y, 0.0, epsilon = 1e-9);
    }
}
