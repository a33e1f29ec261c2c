// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Meshpress
//!
//! CAD scene import, repair and mesh optimization in Rust. Scenes come in
//! as OBJ, STL or glTF, run through a fixed pipeline of repair and
//! reduction passes, and leave as compact glTF. Feature tokens from a
//! license file gate each stage group.

pub mod algo;
pub mod cli;
pub mod geometry;
pub mod io;
pub mod license;
pub mod pipeline;
pub mod scene;
pub mod session;

pub use geometry::Mesh;
pub use io::{export_scene, import_scene};
pub use pipeline::{PipelineConfig, PipelineReport};
pub use scene::{Scene, SceneStats};
pub use session::{Session, SessionConfig};

use anyhow::Result;
use std::path::Path;

/// Optimize one file with default options through an existing session.
pub fn optimize_file(session: &mut Session, input: &Path) -> Result<PipelineReport> {
    pipeline::run(session, &PipelineConfig::default(), input, None)
}
