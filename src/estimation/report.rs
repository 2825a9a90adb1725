//! Report generation for bandwidth estimation runs.
//!
//! Generates both JSON and human-readable text reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use super::regression::median;
use super::types::*;

/// Generate JSON report
pub fn generate_json_report(report: &EstimationReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Median of the valid estimates in bit/s
pub fn median_estimate_bits(estimates: &ExperimentEstimates) -> Option<f64> {
    let mut values: Vec<f64> = estimates
        .links
        .iter()
        .filter_map(LinkObservationFit::estimated_abw_bits)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(median(&mut values))
    }
}

/// Render the text report
pub fn render_text_report(report: &EstimationReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    // Header
    lines.push("=".repeat(80));
    lines.push("                 PROBE-GAP AVAILABLE BANDWIDTH ESTIMATION".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    // Metadata
    lines.push(format!("Analysis Date: {}", report.metadata.analysis_timestamp));
    lines.push(format!("Measurement Store: {}", report.metadata.store_path));
    lines.push(format!("Fit Method: {}", report.metadata.method));
    lines.push(format!("Experiments: {}", report.experiments.len()));
    lines.push(String::new());

    for exp in &report.experiments {
        lines.push("=".repeat(80));
        lines.push(format!("  {} (id {})", exp.experiment_name, exp.experiment_id));
        lines.push("=".repeat(80));
        lines.push(String::new());

        lines.push(format!(
            "Physical capacity bound: {:.3} Mbit/s",
            exp.phy_cap * 8.0 / 1e6
        ));
        lines.push(format!(
            "Samples: {} fetched, {} used in regression ({:.2}%)",
            exp.total_samples,
            exp.used_samples,
            exp.used_ratio() * 100.0
        ));
        lines.push(format!("Link observations attempted: {}", exp.links.len()));
        lines.push(format!("  Valid estimates: {}", exp.valid_count()));
        for status in [
            FitStatus::FitFailure,
            FitStatus::DegenerateSlope,
            FitStatus::OutOfBounds,
        ] {
            lines.push(format!("  {:<16} {}", format!("{}:", status), exp.count_status(status)));
        }
        lines.push(format!(
            "Missing estimates: {:.1}%",
            exp.missing_ratio() * 100.0
        ));

        match median_estimate_bits(exp) {
            Some(median) => lines.push(format!("Median estimate: {:.3} Mbit/s", median / 1e6)),
            None => lines.push("Median estimate: n/a".to_string()),
        }
        lines.push(String::new());
    }

    // Footer
    lines.push("=".repeat(80));

    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(report: &EstimationReport, output_path: &Path) -> Result<()> {
    let content = render_text_report(report);
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(report: &EstimationReport) {
    println!("\n=== AVAILABLE BANDWIDTH ESTIMATION SUMMARY ===\n");
    println!("Method: {}", report.metadata.method);

    for exp in &report.experiments {
        println!("\n{}:", exp.experiment_name);
        println!(
            "  Links: {} attempted, {} valid",
            exp.links.len(),
            exp.valid_count()
        );
        println!("  Missing: {:.1}%", exp.missing_ratio() * 100.0);
        if let Some(median) = median_estimate_bits(exp) {
            println!("  Median estimate: {:.3} Mbit/s", median / 1e6);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: LinkStateId, abw: Option<f64>, status: FitStatus) -> LinkObservationFit {
        LinkObservationFit {
            link_state_id: id,
            experiment_id: 1,
            samples: 10,
            intercept_b0: None,
            slope_b1: None,
            estimated_abw: abw,
            status,
            reason: None,
        }
    }

    fn report() -> EstimationReport {
        EstimationReport {
            metadata: ReportMetadata {
                analysis_timestamp: "2025-05-01T12:00:00Z".to_string(),
                store_path: "measurements.json".to_string(),
                method: FitMethod::Robust,
                workers: 0,
            },
            experiments: vec![ExperimentEstimates {
                experiment_name: "exp2".to_string(),
                experiment_id: 2,
                method: FitMethod::Robust,
                phy_cap: 625_000.0,
                total_samples: 40,
                used_samples: 30,
                links: vec![
                    link(1, Some(250_000.0), FitStatus::Valid),
                    link(2, None, FitStatus::OutOfBounds),
                    link(3, Some(125_000.0), FitStatus::Valid),
                    link(4, None, FitStatus::FitFailure),
                ],
            }],
        }
    }

    #[test]
    fn test_median_estimate_bits() {
        let report = report();
        assert_eq!(median_estimate_bits(&report.experiments[0]), Some(1_500_000.0));
    }

    #[test]
    fn test_text_report_content() {
        let text = render_text_report(&report());
        assert!(text.contains("exp2 (id 2)"));
        assert!(text.contains("Missing estimates: 50.0%"));
        assert!(text.contains("used in regression (75.00%)"));
        assert!(text.contains("Median estimate: 1.500 Mbit/s"));
    }

    #[test]
    fn test_json_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        generate_json_report(&report(), &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let links = &json["experiments"][0]["links"];
        assert_eq!(links[1]["status"], "out_of_bounds");
        assert!(links[1]["estimated_abw"].is_null());
        assert_eq!(links[0]["estimated_abw"], 250_000.0);
    }
}
