// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Procedural primitive meshes, mainly used as pipeline test fixtures

use super::{Mesh, Triangle, Vertex};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Axis-aligned box centered at the origin. Shared corner vertices, so the
/// result is closed and manifold.
pub fn cube(size: Vector3<f64>) -> Mesh {
    let mut mesh = Mesh::with_capacity(8, 12);

    let (hx, hy, hz) = (size.x / 2.0, size.y / 2.0, size.z / 2.0);
    let positions = [
        Point3::new(-hx, -hy, -hz),
        Point3::new(hx, -hy, -hz),
        Point3::new(hx, hy, -hz),
        Point3::new(-hx, hy, -hz),
        Point3::new(-hx, -hy, hz),
        Point3::new(hx, -hy, hz),
        Point3::new(hx, hy, hz),
        Point3::new(-hx, hy, hz),
    ];
    for position in positions {
        mesh.add_vertex(Vertex::at(position));
    }

    // Outward winding
    let faces = [
        [4, 5, 6],
        [4, 6, 7],
        [1, 0, 3],
        [1, 3, 2],
        [5, 1, 2],
        [5, 2, 6],
        [0, 4, 7],
        [0, 7, 3],
        [7, 6, 2],
        [7, 2, 3],
        [0, 1, 5],
        [0, 5, 4],
    ];
    for indices in faces {
        mesh.add_triangle(Triangle::new(indices));
    }

    mesh.recompute_normals();
    mesh
}

/// UV sphere centered at the origin with welded poles and seam. Closed and
/// manifold for `segments >= 3`.
pub fn uv_sphere(radius: f64, segments: u32) -> Mesh {
    let segments = segments.max(3);
    let stacks = segments;
    let slices = segments as usize;
    let mut mesh = Mesh::new();

    let north = mesh.add_vertex(Vertex::new(
        Point3::new(0.0, 0.0, radius),
        Vector3::new(0.0, 0.0, 1.0),
    ));

    let mut rings: Vec<Vec<usize>> = Vec::new();
    for i in 1..stacks {
        let phi = PI * i as f64 / stacks as f64;
        let z = radius * phi.cos();
        let ring_radius = radius * phi.sin();
        let mut ring = Vec::with_capacity(slices);
        for j in 0..slices {
            let theta = 2.0 * PI * j as f64 / slices as f64;
            let position = Point3::new(
                ring_radius * theta.cos(),
                ring_radius * theta.sin(),
                z,
            );
            let normal = position.coords.normalize();
            ring.push(mesh.add_vertex(Vertex::new(position, normal)));
        }
        rings.push(ring);
    }

    let south = mesh.add_vertex(Vertex::new(
        Point3::new(0.0, 0.0, -radius),
        Vector3::new(0.0, 0.0, -1.0),
    ));

    // Pole fans
    let first = &rings[0];
    let last = &rings[rings.len() - 1];
    for j in 0..slices {
        let next = (j + 1) % slices;
        mesh.add_triangle(Triangle::new([north, first[j], first[next]]));
        mesh.add_triangle(Triangle::new([south, last[next], last[j]]));
    }

    // Quad strips between rings
    for i in 0..rings.len() - 1 {
        let upper = &rings[i];
        let lower = &rings[i + 1];
        for j in 0..slices {
            let next = (j + 1) % slices;
            mesh.add_triangle(Triangle::new([upper[j], lower[j], lower[next]]));
            mesh.add_triangle(Triangle::new([upper[j], lower[next], upper[next]]));
        }
    }

    mesh
}

/// Closed cylinder from z=0 to z=height. Rim vertices are shared between
/// caps and wall.
pub fn cylinder(height: f64, radius: f64, segments: u32) -> Mesh {
    let segments = segments.max(3) as usize;
    let mut mesh = Mesh::new();

    let bottom_center = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, 0.0)));
    let top_center = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, height)));

    let mut bottom = Vec::with_capacity(segments);
    let mut top = Vec::with_capacity(segments);
    for i in 0..segments {
        let angle = 2.0 * PI * i as f64 / segments as f64;
        let (sin, cos) = angle.sin_cos();
        bottom.push(mesh.add_vertex(Vertex::at(Point3::new(radius * cos, radius * sin, 0.0))));
        top.push(mesh.add_vertex(Vertex::at(Point3::new(radius * cos, radius * sin, height))));
    }

    for i in 0..segments {
        let next = (i + 1) % segments;
        mesh.add_triangle(Triangle::new([bottom_center, bottom[next], bottom[i]]));
        mesh.add_triangle(Triangle::new([top_center, top[i], top[next]]));
        mesh.add_triangle(Triangle::new([bottom[i], top[i], bottom[next]]));
        mesh.add_triangle(Triangle::new([top[i], top[next], bottom[next]]));
    }

    mesh.recompute_normals();
    mesh
}

/// Cylinder wall without caps, z=0 to z=height. Has two rim boundary loops.
pub fn open_tube(height: f64, radius: f64, segments: u32) -> Mesh {
    let segments = segments.max(3) as usize;
    let mut mesh = Mesh::new();

    let mut bottom = Vec::with_capacity(segments);
    let mut top = Vec::with_capacity(segments);
    for i in 0..segments {
        let angle = 2.0 * PI * i as f64 / segments as f64;
        let (sin, cos) = angle.sin_cos();
        let normal = Vector3::new(cos, sin, 0.0);
        bottom.push(mesh.add_vertex(Vertex::new(
            Point3::new(radius * cos, radius * sin, 0.0),
            normal,
        )));
        top.push(mesh.add_vertex(Vertex::new(
            Point3::new(radius * cos, radius * sin, height),
            normal,
        )));
    }

    for i in 0..segments {
        let next = (i + 1) % segments;
        mesh.add_triangle(Triangle::new([bottom[i], top[i], bottom[next]]));
        mesh.add_triangle(Triangle::new([top[i], top[next], bottom[next]]));
    }

    mesh
}

/// Flat subdivided plane in the z=0 plane, centered at the origin, normal +z.
pub fn grid_plane(width: f64, depth: f64, subdivisions: u32) -> Mesh {
    let n = subdivisions.max(1) as usize;
    let mut mesh = Mesh::with_capacity((n + 1) * (n + 1), 2 * n * n);

    for i in 0..=n {
        let y = -depth / 2.0 + depth * i as f64 / n as f64;
        for j in 0..=n {
            let x = -width / 2.0 + width * j as f64 / n as f64;
            mesh.add_vertex(Vertex::new(
                Point3::new(x, y, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
            ));
        }
    }

    let at = |i: usize, j: usize| i * (n + 1) + j;
    for i in 0..n {
        for j in 0..n {
            let a = at(i, j);
            let b = at(i, j + 1);
            let c = at(i + 1, j + 1);
            let d = at(i + 1, j);
            mesh.add_triangle(Triangle::new([a, b, c]));
            mesh.add_triangle(Triangle::new([a, c, d]));
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::topology::EdgeMap;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_closed_manifold() {
        let mesh = cube(Vector3::new(10.0, 10.0, 10.0));
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        let edges = EdgeMap::build(&mesh);
        assert!(edges.is_closed());
        assert!(edges.is_manifold());
        assert_relative_eq!(mesh.signed_volume(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sphere_closed_manifold() {
        let mesh = uv_sphere(5.0, 16);
        let edges = EdgeMap::build(&mesh);
        assert!(edges.is_closed());
        assert!(edges.is_manifold());

        // Inscribed volume approaches 4/3 pi r^3 from below
        let exact = 4.0 / 3.0 * PI * 125.0;
        let volume = mesh.signed_volume();
        assert!(volume > 0.9 * exact && volume < exact);
    }

    #[test]
    fn test_cylinder_rim_vertices_shared() {
        let segments = 16;
        let mesh = cylinder(10.0, 5.0, segments);
        assert_eq!(mesh.vertex_count(), 2 + 2 * segments as usize);
        let edges = EdgeMap::build(&mesh);
        assert!(edges.is_closed());
        assert!(edges.is_manifold());
    }

    #[test]
    fn test_open_tube_counts() {
        let segments = 12usize;
        let mesh = open_tube(4.0, 1.0, segments as u32);
        assert_eq!(mesh.vertex_count(), 2 * segments);
        assert_eq!(mesh.triangle_count(), 2 * segments);
        let edges = EdgeMap::build(&mesh);
        assert!(!edges.is_closed());
    }

    #[test]
    fn test_grid_plane_counts() {
        let mesh = grid_plane(2.0, 2.0, 4);
        assert_eq!(mesh.vertex_count(), 25);
        assert_eq!(mesh.triangle_count(), 32);
        assert_relative_eq!(mesh.surface_area(), 4.0, epsilon = 1e-9);
    }
}
