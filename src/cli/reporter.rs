// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! CLI output reporter with colored formatting

use crate::pipeline::PipelineReport;
use crate::scene::SceneStats;
use colored::*;
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    /// Print a stage announcement
    pub fn progress(message: &str) {
        println!("{} {}...", "⏳".bright_blue(), message.bright_black());
    }

    /// Print success message
    pub fn success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("\n{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Print a stats snapshot under a heading
    pub fn stats(heading: &str, stats: &SceneStats) {
        println!("\n{}", heading.bold());
        println!("{}", "Model stats:".bold());
        println!(
            "  {} {}",
            "Triangles:".bright_black(),
            stats.triangles.to_string().cyan()
        );
        println!(
            "  {} {}",
            "Vertices:".bright_black(),
            stats.vertices.to_string().cyan()
        );
        println!(
            "  {} {}",
            "Parts:".bright_black(),
            stats.parts.to_string().cyan()
        );
    }

    /// Print the final summary block for a finished run
    pub fn summary(report: &PipelineReport) {
        println!("\n{}", "━".repeat(80).bright_black());
        println!(
            "{} {}",
            "File:".bold(),
            report.input.display().to_string().cyan()
        );
        println!("{}", "━".repeat(80).bright_black());
        println!(
            "  {} {}",
            "Output:".bright_black(),
            report.output.display().to_string().cyan()
        );
        Self::print_counts("Triangles", report.before.triangles, report.after.triangles);
        Self::print_counts("Vertices", report.before.vertices, report.after.vertices);
        Self::print_counts("Parts", report.before.parts, report.after.parts);

        let reduction = report.reduction_percent();
        let value = format!("{reduction:.1}%");
        let colored_value = if reduction >= 50.0 {
            value.green()
        } else if reduction > 0.0 {
            value.yellow()
        } else {
            value.red()
        };
        println!("  {} {}", "Reduction:".bright_black(), colored_value);
        println!(
            "  {} {}",
            "Time:".bright_black(),
            Self::format_duration(Duration::from_millis(report.total_duration_ms())).yellow()
        );
        println!("{}", "━".repeat(80).bright_black());
    }

    fn print_counts(name: &str, before: usize, after: usize) {
        println!(
            "  {} {} {} {}",
            format!("{name}:").bright_black(),
            before.to_string().yellow(),
            "→".bright_black(),
            after.to_string().green()
        );
    }

    /// Format duration for display
    fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(
            Reporter::format_duration(Duration::from_micros(500)),
            "500µs"
        );
        assert_eq!(
            Reporter::format_duration(Duration::from_millis(5)),
            "5.00ms"
        );
        assert_eq!(Reporter::format_duration(Duration::from_secs(2)), "2.00s");
    }
}
