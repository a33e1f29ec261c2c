// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! The optimization pipeline: import, repair, tessellate, optimize, export
//!
//! [`run`] drives one scene through the fixed stage order. Each stage group
//! is gated on a feature token, timed and summarized into a
//! [`PipelineReport`]. Progress lines and the two stats snapshots go through
//! the CLI reporter; engine chatter is silenced around the snapshots so they
//! read as plain blocks.

use crate::algo::{
    self, DecimateOptions, DeletePatchesOptions, OcclusionOptions, RemoveHolesOptions,
    RepairCadOptions, RepairMeshOptions, TessellateOptions,
};
use crate::cli::Reporter;
use crate::io;
use crate::license::{self, LicenseServerConfig};
use crate::scene::SceneStats;
use crate::session::{Session, SessionConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DEFAULT_CONFIG_FILE: &str = "meshpress.toml";

/// Pipeline configuration
///
/// Scalar keys first so the struct serializes to valid TOML ahead of the
/// stage tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Appended to the input file stem to derive the output path.
    pub output_suffix: String,
    /// Print progress lines and stats blocks while running.
    pub verbose: bool,
    /// Explicit license file, bypassing discovery.
    pub license_file: Option<PathBuf>,
    pub repair_cad: RepairCadOptions,
    pub repair_mesh: RepairMeshOptions,
    pub tessellate: TessellateOptions,
    pub remove_holes: RemoveHolesOptions,
    pub delete_patches: DeletePatchesOptions,
    pub decimate: DecimateOptions,
    pub occlusion: OcclusionOptions,
    pub license_server: Option<LicenseServerConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_suffix: "_new.glb".to_string(),
            verbose: true,
            license_file: None,
            repair_cad: RepairCadOptions::default(),
            repair_mesh: RepairMeshOptions::default(),
            tessellate: TessellateOptions::default(),
            remove_holes: RemoveHolesOptions::default(),
            delete_patches: DeletePatchesOptions::default(),
            decimate: DecimateOptions::default(),
            occlusion: OcclusionOptions::default(),
            license_server: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Self::default()
        };

        if let Ok(suffix) = std::env::var("MESHPRESS_OUTPUT_SUFFIX") {
            config.output_suffix = suffix;
        }

        if let Ok(verbose) = std::env::var("MESHPRESS_VERBOSE") {
            config.verbose = verbose.parse().unwrap_or(true);
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Session options matching this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            license_file: self.license_file.clone(),
            license_server: self.license_server.clone(),
        }
    }
}

/// Timing and counters for one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub duration_ms: u64,
    /// Stage-specific counters, straight from the pass report.
    pub detail: serde_json::Value,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub engine_version: String,
    pub started_at: String,
    pub completed_at: String,
    pub before: SceneStats,
    pub after: SceneStats,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn reduction_percent(&self) -> f64 {
        self.after.reduction_percent(&self.before)
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.stages.iter().map(|s| s.duration_ms).sum()
    }
}

fn record<T: Serialize>(stages: &mut Vec<StageReport>, name: &str, start: Instant, detail: &T) {
    stages.push(StageReport {
        name: name.to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        detail: serde_json::to_value(detail).unwrap_or_default(),
    });
}

/// Run the whole pipeline on `input`.
///
/// The output path is the input stem plus the configured suffix unless
/// `output_override` names one. Every stage group checks its feature token
/// up front, so an under-licensed session fails before touching the file.
pub fn run(
    session: &mut Session,
    config: &PipelineConfig,
    input: &Path,
    output_override: Option<&Path>,
) -> Result<PipelineReport> {
    let started_at = chrono::Utc::now();
    let output = match output_override {
        Some(path) => path.to_path_buf(),
        None => io::derive_output_path(input, &config.output_suffix),
    };
    let mut stages = Vec::new();

    session.require_token(license::tokens::IMPORT)?;
    if config.verbose {
        Reporter::progress(&format!("Importing {}", input.display()));
    }
    let start = Instant::now();
    let mut scene = io::import_scene(input)?;
    let root = scene.root();
    record(
        &mut stages,
        "import",
        start,
        &SceneStats::capture(&scene, root),
    );

    session.require_token(license::tokens::REPAIR)?;
    if config.verbose {
        Reporter::progress("Repairing CAD");
    }
    let start = Instant::now();
    let repaired = algo::repair_cad(&mut scene, root, &config.repair_cad);
    record(&mut stages, "repair_cad", start, &repaired);

    if config.verbose {
        Reporter::progress("Repairing Meshes");
    }
    let start = Instant::now();
    let repaired = algo::repair_mesh(&mut scene, root, &config.repair_mesh);
    record(&mut stages, "repair_mesh", start, &repaired);

    session.require_token(license::tokens::TESSELLATE)?;
    if config.verbose {
        Reporter::progress("Tessellating Meshes");
    }
    let start = Instant::now();
    let tessellated = algo::tessellate(&mut scene, root, &config.tessellate);
    record(&mut stages, "tessellate", start, &tessellated);

    let before = session.with_quiet_interface(|| SceneStats::capture(&scene, root));
    if config.verbose {
        Reporter::stats("Before optimization:", &before);
    }

    session.require_token(license::tokens::OPTIMIZE)?;
    if config.verbose {
        Reporter::progress("Removing Holes");
    }
    let start = Instant::now();
    let holes = algo::remove_holes(&mut scene, root, &config.remove_holes);
    record(&mut stages, "remove_holes", start, &holes);

    if config.verbose {
        Reporter::progress("Deleting Patches");
    }
    let start = Instant::now();
    let patches = algo::delete_patches(&mut scene, root, &config.delete_patches);
    record(&mut stages, "delete_patches", start, &patches);

    if config.verbose {
        Reporter::progress("Decimating");
    }
    let start = Instant::now();
    let decimated = algo::decimate(&mut scene, root, &config.decimate);
    record(&mut stages, "decimate", start, &decimated);

    if config.verbose {
        Reporter::progress("Removing Hidden Geometries");
    }
    let start = Instant::now();
    let occlusion = algo::remove_occluded_geometry(&mut scene, root, &config.occlusion);
    record(&mut stages, "remove_occluded_geometry", start, &occlusion);

    let after = session.with_quiet_interface(|| SceneStats::capture(&scene, root));
    if config.verbose {
        Reporter::stats("Optimized:", &after);
    }

    session.require_token(license::tokens::EXPORT)?;
    if config.verbose {
        Reporter::progress(&format!("Exporting {}", output.display()));
    }
    let start = Instant::now();
    io::export_scene(&scene, &output)?;
    record(
        &mut stages,
        "export",
        start,
        &serde_json::json!({ "path": &output }),
    );

    let report = PipelineReport {
        input: input.to_path_buf(),
        output,
        engine_version: session.version().to_string(),
        started_at: started_at.to_rfc3339(),
        completed_at: chrono::Utc::now().to_rfc3339(),
        before,
        after,
        stages,
    };
    log::info!(
        "pipeline finished: {} -> {} ({:.1}% triangle reduction)",
        report.input.display(),
        report.output.display(),
        report.reduction_percent()
    );
    Ok(report)
}
