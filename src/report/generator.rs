//! Report assembly and rendering.
//!
//! This module bundles the aggregation tables for the selected frames into
//! an [`AggregationReport`] and renders it as JSON (for plotting) or as a
//! Markdown summary (for people).

use crate::analysis::Aggregation;
use crate::binning::ValueBinConfig;
use crate::frames::SequenceWarning;
use crate::models::{
    AggregationReport, GroupSeries, RenderedFrame, ReportDiagnostics, ReportMetadata, TimeAxis,
};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;

/// Inputs to [`assemble_report`] besides the aggregation itself.
pub struct ReportContext<'a> {
    pub metadata: ReportMetadata,
    pub value_bins: &'a ValueBinConfig,
    pub time_axis: &'a TimeAxis,
    pub frames: &'a [usize],
    pub sequence_warning: Option<SequenceWarning>,
    pub show_progress: bool,
}

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames";

/// Collect the selected frames and the full average series into a report.
pub fn assemble_report(
    aggregation: &Aggregation,
    context: ReportContext<'_>,
) -> AggregationReport {
    let progress_bar = context.show_progress.then(|| {
        let pb = ProgressBar::new(context.frames.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    let mut frames = Vec::with_capacity(context.frames.len());
    for &t in context.frames {
        frames.push(RenderedFrame {
            time_idx: t,
            time_label: context.time_axis.label(t),
            joint_counts: aggregation.joint.frame(t),
            value_counts: aggregation.values.row(t).to_vec(),
            mean_age_by_value_bin: aggregation.age_profile.row(t).to_vec(),
            dropped: aggregation.dropped.at(t),
        });

        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Frames assembled");
    }

    let averages = aggregation
        .group_labels
        .iter()
        .enumerate()
        .map(|(g, label)| GroupSeries {
            label: label.clone(),
            means: aggregation.averages.series(g),
            population: aggregation.averages.population_series(g),
        })
        .collect();

    AggregationReport {
        metadata: context.metadata,
        age_group_labels: aggregation.group_labels.clone(),
        value_bin_labels: context.value_bins.index_labels(),
        value_bin_centers: context.value_bins.centers(),
        time_labels: (0..context.time_axis.len())
            .map(|t| context.time_axis.label(t))
            .collect(),
        frames,
        averages,
        density_map: aggregation.values.density_map(),
        diagnostics: ReportDiagnostics {
            dropped: aggregation.dropped.per_timestep().to_vec(),
            total_dropped: aggregation.dropped.total(),
            sequence_warning: context.sequence_warning,
        },
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AggregationReport) -> String {
    let mut output = String::new();

    output.push_str("# Opinion Tables Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_frames_section(report));
    output.push_str(&generate_averages_section(report));
    output.push_str(&generate_diagnostics_section(&report.diagnostics));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Attribute:** `{}`\n", metadata.attribute));
    section.push_str(&format!("- **Users:** {}\n", metadata.users));
    section.push_str(&format!("- **Timesteps:** {}\n", metadata.timesteps));
    if metadata.user_ageing {
        section.push_str(&format!(
            "- **Life Cycle:** {} steps per year\n",
            metadata.life_cycle
        ));
    } else {
        section.push_str("- **User Ageing:** off\n");
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

/// One table per frame: value bins down, age groups across.
fn generate_frames_section(report: &AggregationReport) -> String {
    let mut section = String::new();

    section.push_str("## Frames\n\n");

    if report.frames.is_empty() {
        section.push_str("No frames selected.\n\n");
        return section;
    }

    for frame in &report.frames {
        section.push_str(&format!(
            "### {} (index {})\n\n",
            frame.time_label, frame.time_idx
        ));

        section.push_str("| Value |");
        for label in &report.age_group_labels {
            section.push_str(&format!(" {} |", label));
        }
        section.push_str(" Total |\n|:---|");
        for _ in &report.age_group_labels {
            section.push_str(":---:|");
        }
        section.push_str(":---:|\n");

        for (b, row) in frame.joint_counts.iter().enumerate() {
            let total: u64 = row.iter().sum();
            if total == 0 {
                continue;
            }
            let label = report.value_bin_labels.get(b).copied().unwrap_or_default();
            section.push_str(&format!("| {:.3} |", label));
            for count in row {
                section.push_str(&format!(" {} |", count));
            }
            section.push_str(&format!(" **{}** |\n", total));
        }
        section.push('\n');

        if !frame.dropped.is_empty() {
            section.push_str(&format!("> Not shown: {}\n\n", frame.dropped));
        }
    }

    section
}

/// Final mean and population per age group.
fn generate_averages_section(report: &AggregationReport) -> String {
    let mut section = String::new();

    section.push_str("## Average by Age Group\n\n");
    section.push_str("| Age Group | Final Mean | Final Population | Timesteps Without Users |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");

    for series in &report.averages {
        let final_mean = series
            .means
            .last()
            .copied()
            .flatten()
            .map_or_else(|| "n/a".to_string(), |m| format!("{:.4}", m));
        let final_population = series.population.last().copied().unwrap_or(0);
        let empty = series.means.iter().filter(|m| m.is_none()).count();

        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            series.label, final_mean, final_population, empty
        ));
    }
    section.push('\n');

    section
}

/// Dropped users and sequencing warnings.
fn generate_diagnostics_section(diagnostics: &ReportDiagnostics) -> String {
    let mut section = String::new();

    section.push_str("## Diagnostics\n\n");

    if let Some(ref warning) = diagnostics.sequence_warning {
        section.push_str(&format!("> ⚠️ {}\n\n", warning));
    }

    if diagnostics.total_dropped == 0 {
        section.push_str("All users fell inside the configured value range and age groups.\n\n");
        return section;
    }

    section.push_str(&format!(
        "{} user records were left out of the joint tables.\n\n",
        diagnostics.total_dropped
    ));
    section.push_str("| Timestep | Value Out of Range | Age Out of Range | Dropped |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");

    for (t, dropped) in diagnostics.dropped.iter().enumerate() {
        if dropped.is_empty() {
            continue;
        }
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            t, dropped.value, dropped.age, dropped.total
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by opinion-tables v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AggregationReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write a report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
