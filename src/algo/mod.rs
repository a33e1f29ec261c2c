// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Scene optimization passes
//!
//! Each pass walks the parts under an occurrence, rewrites their meshes in
//! place and returns a report of what changed. Passes never fail on damaged
//! input; unusable geometry just limits how much work gets done.

mod decimate;
mod holes;
mod occlusion;
mod patches;
mod repair;
mod tessellate;

pub use decimate::{decimate, DecimateOptions, DecimateReport};
pub use holes::{remove_holes, RemoveHolesOptions, RemoveHolesReport};
pub use occlusion::{
    remove_occluded_geometry, OcclusionOptions, OcclusionReport, SelectionLevel,
};
pub use patches::{delete_patches, DeletePatchesOptions, DeletePatchesReport};
pub use repair::{repair_cad, repair_mesh, RepairCadOptions, RepairMeshOptions, RepairReport};
pub use tessellate::{tessellate, TessellateOptions, TessellateReport};
