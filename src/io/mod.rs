// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Scene import and export
//!
//! Formats are picked by file extension. Import builds a [`Scene`] with one
//! part per source mesh; export writes the whole occurrence tree, flattening
//! only where the target format has no scene graph of its own.

mod export_gltf;
mod export_stl;
mod import_gltf;
mod import_obj;
mod import_stl;

pub use export_gltf::export as export_gltf;
pub use export_stl::export as export_stl;
pub use import_gltf::import as import_gltf;
pub use import_obj::import as import_obj;
pub use import_stl::import as import_stl;

use crate::scene::Scene;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// File extensions [`import_scene`] understands.
pub const IMPORT_EXTENSIONS: &[&str] = &["obj", "stl", "glb", "gltf"];

/// Import a scene, picking the reader from the file extension.
pub fn import_scene(path: &Path) -> Result<Scene> {
    let scene = match extension_of(path)?.as_str() {
        "obj" => import_obj(path)?,
        "stl" => import_stl(path)?,
        "glb" | "gltf" => import_gltf(path)?,
        other => bail!("unsupported import format: .{other}"),
    };
    log::info!(
        "imported {} ({} parts, {} triangles)",
        path.display(),
        scene.part_count(scene.root()),
        scene.polygon_count(scene.root())
    );
    Ok(scene)
}

/// Export a scene, picking the writer from the file extension.
pub fn export_scene(scene: &Scene, path: &Path) -> Result<()> {
    match extension_of(path)?.as_str() {
        "glb" | "gltf" => export_gltf(scene, path)?,
        "stl" => export_stl(scene, path)?,
        other => bail!("unsupported export format: .{other}"),
    }
    log::info!("exported {}", path.display());
    Ok(())
}

fn extension_of(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("no file extension on {}", path.display()))?;
    Ok(ext.to_ascii_lowercase())
}

/// Output path next to `input`, its stem extended with `suffix`.
///
/// `model.glb` with suffix `_new.glb` becomes `model_new.glb` in the same
/// directory.
pub fn derive_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scene");
    let name = format!("{stem}{suffix}");
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_output_path_keeps_directory() {
        let out = derive_output_path(Path::new("/data/models/bracket.glb"), "_opt.glb");
        assert_eq!(out, PathBuf::from("/data/models/bracket_opt.glb"));
    }

    #[test]
    fn test_derive_output_path_bare_filename() {
        let out = derive_output_path(Path::new("bracket.stl"), "_opt.glb");
        assert_eq!(out, PathBuf::from("bracket_opt.glb"));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = import_scene(Path::new("/tmp/model.step")).unwrap_err();
        assert!(err.to_string().contains("unsupported import format"));
    }

    #[test]
    fn test_missing_extension_is_rejected() {
        assert!(import_scene(Path::new("/tmp/model")).is_err());
    }
}
