// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Scene statistics snapshots

use super::{OccurrenceId, Scene};
use serde::{Deserialize, Serialize};

/// Triangle, vertex and part totals for a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneStats {
    pub triangles: usize,
    pub vertices: usize,
    pub parts: usize,
}

impl SceneStats {
    pub fn capture(scene: &Scene, root: OccurrenceId) -> Self {
        Self {
            triangles: scene.polygon_count(root),
            vertices: scene.vertex_count(root),
            parts: scene.part_count(root),
        }
    }

    /// Triangle reduction against `before`, in percent. Zero when `before`
    /// had no triangles.
    pub fn reduction_percent(&self, before: &SceneStats) -> f64 {
        if before.triangles == 0 {
            return 0.0;
        }
        let kept = self.triangles as f64 / before.triangles as f64;
        (1.0 - kept) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector3};

    #[test]
    fn test_capture_counts_parts() {
        let mut scene = Scene::new("stats");
        let root = scene.root();
        scene.add_part(
            root,
            "cube",
            Matrix4::identity(),
            primitives::cube(Vector3::new(1.0, 1.0, 1.0)),
        );
        let stats = SceneStats::capture(&scene, root);
        assert_eq!(stats.triangles, 12);
        assert_eq!(stats.vertices, 8);
        assert_eq!(stats.parts, 1);
    }

    #[test]
    fn test_reduction_percent() {
        let before = SceneStats {
            triangles: 200,
            vertices: 100,
            parts: 1,
        };
        let after = SceneStats {
            triangles: 50,
            vertices: 30,
            parts: 1,
        };
        assert_relative_eq!(after.reduction_percent(&before), 75.0, epsilon = 1e-12);

        let empty = SceneStats {
            triangles: 0,
            vertices: 0,
            parts: 0,
        };
        assert_eq!(empty.reduction_percent(&empty), 0.0);
    }
}
