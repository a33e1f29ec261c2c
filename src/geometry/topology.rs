// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Edge classification, boundary loops and connectivity queries

use super::Mesh;
use ahash::{AHashMap, AHashSet};

/// Undirected edge key, smaller index first.
pub type EdgeKey = (usize, usize);

pub fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// How many faces share an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// One incident face
    Boundary(usize),
    /// Exactly two incident faces
    Manifold([usize; 2]),
    /// Three or more incident faces
    NonManifold(Vec<usize>),
}

impl EdgeKind {
    pub fn faces(&self) -> &[usize] {
        match self {
            EdgeKind::Boundary(f) => std::slice::from_ref(f),
            EdgeKind::Manifold(fs) => fs,
            EdgeKind::NonManifold(fs) => fs,
        }
    }
}

/// Classified edges of a mesh.
#[derive(Debug, Default)]
pub struct EdgeMap {
    edges: AHashMap<EdgeKey, EdgeKind>,
}

impl EdgeMap {
    pub fn build(mesh: &Mesh) -> Self {
        let mut incident: AHashMap<EdgeKey, Vec<usize>> = AHashMap::new();
        for (face, triangle) in mesh.triangles.iter().enumerate() {
            let [a, b, c] = triangle.indices;
            for (u, v) in [(a, b), (b, c), (c, a)] {
                incident.entry(edge_key(u, v)).or_default().push(face);
            }
        }

        let edges = incident
            .into_iter()
            .map(|(key, faces)| {
                let kind = match faces.as_slice() {
                    [f] => EdgeKind::Boundary(*f),
                    [f, g] => EdgeKind::Manifold([*f, *g]),
                    _ => EdgeKind::NonManifold(faces),
                };
                (key, kind)
            })
            .collect();

        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn kind(&self, a: usize, b: usize) -> Option<&EdgeKind> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EdgeKey, &EdgeKind)> {
        self.edges.iter()
    }

    pub fn boundary_edges(&self) -> impl Iterator<Item = (EdgeKey, usize)> + '_ {
        self.edges.iter().filter_map(|(key, kind)| match kind {
            EdgeKind::Boundary(face) => Some((*key, *face)),
            _ => None,
        })
    }

    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (EdgeKey, &[usize])> + '_ {
        self.edges.iter().filter_map(|(key, kind)| match kind {
            EdgeKind::NonManifold(faces) => Some((*key, faces.as_slice())),
            _ => None,
        })
    }

    pub fn boundary_edge_count(&self) -> usize {
        self.boundary_edges().count()
    }

    /// No boundary edges: every edge has at least two faces.
    pub fn is_closed(&self) -> bool {
        self.edges
            .values()
            .all(|kind| !matches!(kind, EdgeKind::Boundary(_)))
    }

    /// No edge with more than two incident faces.
    pub fn is_manifold(&self) -> bool {
        self.edges
            .values()
            .all(|kind| !matches!(kind, EdgeKind::NonManifold(_)))
    }
}

/// Ordered boundary loops as vertex index cycles. Loop order follows the
/// winding of the owning faces, so a fill triangle `(loop[i+1], loop[i], apex)`
/// matches the surrounding orientation.
pub fn boundary_loops(mesh: &Mesh) -> Vec<Vec<usize>> {
    // Directed occurrence of each edge, kept only while the edge is boundary
    let mut count: AHashMap<EdgeKey, (u32, (usize, usize))> = AHashMap::new();
    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.indices;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            let entry = count.entry(edge_key(u, v)).or_insert((0, (u, v)));
            entry.0 += 1;
        }
    }

    let mut successors: AHashMap<usize, Vec<usize>> = AHashMap::new();
    let mut directed: Vec<(usize, usize)> = Vec::new();
    for (_, (n, (u, v))) in &count {
        if *n == 1 {
            successors.entry(*u).or_default().push(*v);
            directed.push((*u, *v));
        }
    }
    directed.sort_unstable();

    let mut used: AHashSet<(usize, usize)> = AHashSet::new();
    let mut loops = Vec::new();

    for &(start, first) in &directed {
        if used.contains(&(start, first)) {
            continue;
        }

        let mut cycle = vec![start];
        let (mut cur, mut next) = (start, first);
        let budget = directed.len() + 1;
        for _ in 0..budget {
            used.insert((cur, next));
            if next == start {
                break;
            }
            cycle.push(next);
            let candidate = successors
                .get(&next)
                .and_then(|cands| cands.iter().find(|&&t| !used.contains(&(next, t))));
            match candidate {
                Some(&t) => {
                    cur = next;
                    next = t;
                }
                // Open chain, ragged input
                None => break,
            }
        }

        if cycle.len() >= 3 {
            loops.push(cycle);
        }
    }

    loops
}

/// Triangle indices grouped into edge-connected components, each sorted.
pub fn connected_components(mesh: &Mesh) -> Vec<Vec<usize>> {
    let face_count = mesh.triangles.len();
    if face_count == 0 {
        return Vec::new();
    }

    let adjacency = face_adjacency(mesh);
    let mut visited = vec![false; face_count];
    let mut components = Vec::new();

    for seed in 0..face_count {
        if visited[seed] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![seed];
        visited[seed] = true;
        while let Some(face) = stack.pop() {
            component.push(face);
            for &next in &adjacency[face] {
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }

    components
}

/// For each triangle, the triangles sharing at least one edge with it.
pub fn face_adjacency(mesh: &Mesh) -> Vec<Vec<usize>> {
    let mut incident: AHashMap<EdgeKey, Vec<usize>> = AHashMap::new();
    for (face, triangle) in mesh.triangles.iter().enumerate() {
        let [a, b, c] = triangle.indices;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            incident.entry(edge_key(u, v)).or_default().push(face);
        }
    }

    let mut adjacency = vec![Vec::new(); mesh.triangles.len()];
    for faces in incident.values() {
        for &f in faces {
            for &g in faces {
                if f != g && !adjacency[f].contains(&g) {
                    adjacency[f].push(g);
                }
            }
        }
    }
    adjacency
}
