// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Cross-format import and export through the front-door dispatchers

use anyhow::Result;
use meshpress::geometry::primitives;
use meshpress::{io, Scene};
use nalgebra::{Matrix4, Vector3};
use std::io::Write;

fn two_part_scene() -> Scene {
    let mut scene = Scene::new("assembly");
    let root = scene.root();
    let (_, cube) = scene.add_part(
        root,
        "cube",
        Matrix4::identity(),
        primitives::cube(Vector3::new(2.0, 2.0, 2.0)),
    );
    scene.add_part(
        root,
        "sphere",
        Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)),
        primitives::uv_sphere(1.0, 8),
    );
    scene.add_instance(
        root,
        "cube_copy",
        Matrix4::new_translation(&Vector3::new(-10.0, 0.0, 0.0)),
        cube,
    );
    scene
}

#[test]
fn test_glb_round_trip_preserves_counts_and_extent() -> Result<()> {
    let scene = two_part_scene();
    let root = scene.root();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("assembly.glb");
    io::export_scene(&scene, &path)?;

    let back = io::import_scene(&path)?;
    let back_root = back.root();

    // Two meshes, three placements
    assert_eq!(back.part_count(back_root), 3);
    assert_eq!(back.polygon_count(back_root), scene.polygon_count(root));
    assert_eq!(back.vertex_count(back_root), scene.vertex_count(root));

    // Instance transforms survive: the copies sit 20 units apart
    let bbox = back.bounding_box(back_root);
    let original = scene.bounding_box(root);
    assert!((bbox.min.x - original.min.x).abs() < 1e-3);
    assert!((bbox.max.x - original.max.x).abs() < 1e-3);

    Ok(())
}

#[test]
fn test_embedded_gltf_round_trip() -> Result<()> {
    let scene = two_part_scene();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("assembly.gltf");
    io::export_scene(&scene, &path)?;

    // Single self-contained file, no .bin sidecar
    assert!(!dir.path().join("assembly.bin").exists());
    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("data:application/octet-stream;base64,"));

    let back = io::import_scene(&path)?;
    assert_eq!(back.part_count(back.root()), 3);
    assert_eq!(
        back.polygon_count(back.root()),
        scene.polygon_count(scene.root())
    );
    Ok(())
}

#[test]
fn test_stl_round_trip_flattens_instances() -> Result<()> {
    let scene = two_part_scene();
    let root = scene.root();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("assembly.stl");
    io::export_scene(&scene, &path)?;

    // STL has no scene graph; everything lands in one part, world-placed
    let back = io::import_scene(&path)?;
    let back_root = back.root();
    assert_eq!(back.part_count(back_root), 1);
    assert_eq!(back.polygon_count(back_root), scene.polygon_count(root));

    let bbox = back.bounding_box(back_root);
    assert!(bbox.min.x < -10.0, "instanced cube missing from STL");
    assert!(bbox.max.x > 10.0, "translated sphere missing from STL");
    Ok(())
}

#[test]
fn test_obj_import_through_dispatcher() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("plate.obj");
    let mut f = std::fs::File::create(&path)?;
    f.write_all(
        b"o plate\n\
          v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
          f 1 2 3 4\n",
    )?;
    drop(f);

    let scene = io::import_scene(&path)?;
    let root = scene.root();
    assert_eq!(scene.part_count(root), 1);
    // The quad arrives triangulated
    assert_eq!(scene.polygon_count(root), 2);
    Ok(())
}

#[test]
fn test_unsupported_extension_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("model.step");
    std::fs::write(&path, b"ISO-10303-21;")?;

    let err = io::import_scene(&path).unwrap_err();
    assert!(err.to_string().contains("step"), "unexpected error: {err:#}");

    let scene = Scene::new("empty");
    let err = io::export_scene(&scene, &dir.path().join("model.xyz")).unwrap_err();
    assert!(err.to_string().contains("xyz"), "unexpected error: {err:#}");
    Ok(())
}
