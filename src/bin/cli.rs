// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Meshpress CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use meshpress::cli::Reporter;
use meshpress::pipeline::{self, PipelineConfig};
use meshpress::scene::SceneStats;
use meshpress::session::Session;
use meshpress::{io, license};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "meshpress")]
#[command(about = "Meshpress - CAD scene import, repair and mesh optimization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input CAD file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (defaults to the input stem plus the configured suffix)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Pipeline configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// License file
    #[arg(short, long, value_name = "FILE")]
    license: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full optimization pipeline on a CAD file
    Optimize {
        /// Input CAD file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the run report as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Print model stats for files or directory trees
    Stats {
        /// Files or directories to inspect
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Recurse into directories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show license status and feature tokens
    License,

    /// Write a default configuration file
    Init {
        /// Destination path
        #[arg(default_value = pipeline::DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Optimize {
            input,
            output,
            report,
        }) => {
            optimize_command(
                input,
                output.as_deref().or(cli.output.as_deref()),
                report.as_deref(),
                &cli,
            )?;
        }
        Some(Commands::Stats { inputs, recursive }) => {
            stats_command(inputs, *recursive)?;
        }
        Some(Commands::License) => {
            license_command(&cli)?;
        }
        Some(Commands::Init { path }) => {
            init_command(path)?;
        }
        Some(Commands::Version) => {
            println!("Meshpress v{}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            // Default behavior: optimize the bare input argument
            if let Some(input) = &cli.input {
                optimize_command(input, cli.output.as_deref(), None, &cli)?;
            } else {
                eprintln!("Error: Input file required");
                eprintln!("Usage: meshpress <INPUT> [--output <OUTPUT>]");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::load()?,
    };
    if cli.quiet {
        config.verbose = false;
    }
    if let Some(license) = &cli.license {
        config.license_file = Some(license.clone());
    }
    Ok(config)
}

/// Bring up a session and settle the license, falling back to the shared
/// license server when local discovery finds nothing.
fn licensed_session(config: &PipelineConfig) -> Session {
    let mut session = Session::initialize(config.session_config());
    if !session.check_license() {
        match &config.license_server {
            Some(server) => {
                session.configure_license_server(&server.host, server.port, server.flexible)
            }
            None => session.configure_license_server(
                license::DEFAULT_SERVER_HOST,
                license::DEFAULT_SERVER_PORT,
                true,
            ),
        }
    }
    session
}

fn optimize_command(
    input: &Path,
    output: Option<&Path>,
    report_path: Option<&Path>,
    cli: &Cli,
) -> Result<()> {
    if !input.exists() {
        Reporter::report_error(&format!("Input file not found: {}", input.display()));
        std::process::exit(1);
    }

    let config = load_config(cli)?;
    let mut session = licensed_session(&config);

    if !session.check_license() {
        println!("No License Available");
        std::process::exit(0);
    }
    println!("License Available");
    session.acquire_default_tokens();

    let report = pipeline::run(&mut session, &config, input, output)?;
    if config.verbose {
        Reporter::summary(&report);
    }

    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        Reporter::report_info(&format!("Report written to {}", path.display()));
    }

    Ok(())
}

fn stats_command(inputs: &[PathBuf], recursive: bool) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let files = collect_inputs(inputs, recursive)?;
    if files.is_empty() {
        Reporter::report_warning("No importable files found");
        return Ok(());
    }

    let progress = if files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut results = Vec::new();
    let mut errors = 0usize;
    for path in &files {
        if let Some(ref pb) = progress {
            pb.set_message(path.display().to_string());
        }
        match io::import_scene(path) {
            Ok(scene) => {
                let root = scene.root();
                results.push((path.clone(), SceneStats::capture(&scene, root)));
            }
            Err(e) => {
                errors += 1;
                eprintln!("Error: {}: {e:#}", path.display());
            }
        }
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    for (path, stats) in &results {
        Reporter::stats(&path.display().to_string(), stats);
    }
    if results.len() > 1 {
        let total = results.iter().fold(
            SceneStats {
                triangles: 0,
                vertices: 0,
                parts: 0,
            },
            |acc, (_, s)| SceneStats {
                triangles: acc.triangles + s.triangles,
                vertices: acc.vertices + s.vertices,
                parts: acc.parts + s.parts,
            },
        );
        Reporter::stats("Total:", &total);
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    use walkdir::WalkDir;

    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            if !recursive {
                Reporter::report_warning(&format!(
                    "{} is a directory (use --recursive)",
                    input.display()
                ));
                continue;
            }
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && is_importable(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn is_importable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| io::IMPORT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn license_command(cli: &Cli) -> Result<()> {
    use colored::Colorize;

    let config = load_config(cli)?;
    let session = licensed_session(&config);

    let Some(license) = session.license() else {
        println!("No License Available");
        std::process::exit(1);
    };

    println!("\n{}", "━".repeat(80).bright_black());
    println!("{} {}", "License:".bold(), license.source.display().to_string().cyan());
    println!("{}", "━".repeat(80).bright_black());
    println!("  {} {}", "Product:".bright_black(), license.product.cyan());
    if let Some(customer) = &license.customer {
        println!("  {} {}", "Customer:".bright_black(), customer.cyan());
    }
    let expiry = match license.expiry {
        Some(date) => date.to_string(),
        None => "perpetual".to_string(),
    };
    let expiry_colored = if session.check_license() {
        expiry.green()
    } else {
        expiry.red()
    };
    println!("  {} {}", "Expires:".bright_black(), expiry_colored);
    if let Some(seats) = license.seats {
        println!("  {} {}", "Seats:".bright_black(), seats.to_string().cyan());
    }
    println!(
        "  {} {}",
        "Tokens:".bright_black(),
        license.tokens.join(", ").cyan()
    );
    println!("{}", "━".repeat(80).bright_black());

    Ok(())
}

fn init_command(path: &Path) -> Result<()> {
    if path.exists() {
        Reporter::report_error(&format!("{} already exists", path.display()));
        std::process::exit(1);
    }
    PipelineConfig::default().save(path)?;
    Reporter::success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}
