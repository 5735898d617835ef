use crate::error::Result;
use crate::models::{Segment, TrafficTable};
use crate::processors::{FusionStats, HarmonizeStats, TimeCorrection};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub rows: usize,
    pub working_sensors: u32,
    pub normalized: bool,
}

impl SegmentSummary {
    pub fn from_segment(segment: &Segment, table: &TrafficTable) -> Self {
        let timestamps = table.timestamps();
        Self {
            start_time: timestamps[segment.start],
            end_time: timestamps[segment.end - 1],
            rows: segment.len(),
            working_sensors: segment.working_sensors,
            normalized: segment.normalized,
        }
    }
}

/// Everything a run changed, stage by stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub input_files: Vec<String>,
    pub raw_rows: usize,
    pub raw_columns: usize,
    pub harmonized: HarmonizeStats,
    pub time_correction: TimeCorrection,
    pub masked_values: usize,
    pub fusion: FusionStats,
    pub trimmed_rows: usize,
    pub outliers_removed: usize,
    pub output_rows: usize,
    pub station_columns: Vec<String>,
    pub segments: Vec<SegmentSummary>,
}

impl PipelineReport {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn skipped_segments(&self) -> usize {
        self.segments.iter().filter(|s| !s.normalized).count()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Normalization Run Report ===\n");
        summary.push_str(&format!("Input Files: {}\n", self.input_files.len()));
        summary.push_str(&format!(
            "Raw Table: {} rows x {} columns\n",
            self.raw_rows, self.raw_columns
        ));
        summary.push_str(&format!(
            "Columns: {} renamed, {} dropped, {} derived\n",
            self.harmonized.renamed, self.harmonized.dropped, self.harmonized.derived
        ));
        summary.push_str(&format!(
            "Time Base: {} fallback rows shifted",
            self.time_correction.shifted_rows()
        ));
        if let Some(cadence) = self.time_correction.reference_cadence_minutes {
            summary.push_str(&format!(" (cadence {} min)", cadence));
        }
        summary.push('\n');
        summary.push_str(&format!("Outage Mask: {} values voided\n", self.masked_values));
        summary.push_str(&format!(
            "Generation Fusion: {} values voided, {} fused columns\n",
            self.fusion.voided_values, self.fusion.fused_columns
        ));
        summary.push_str(&format!("Observation Window: {} rows trimmed\n", self.trimmed_rows));
        summary.push_str(&format!("Outliers Removed: {}\n", self.outliers_removed));
        summary.push_str(&format!(
            "Output: {} rows, {} station columns\n",
            self.output_rows,
            self.station_columns.len()
        ));
        summary.push_str(&format!(
            "\nSegments: {} ({} too short to normalize)\n",
            self.segment_count(),
            self.skipped_segments()
        ));

        for (i, segment) in self.segments.iter().take(10).enumerate() {
            summary.push_str(&format!(
                "  {}. {} .. {}: {} rows, {} working sensors{}\n",
                i + 1,
                segment.start_time,
                segment.end_time,
                segment.rows,
                segment.working_sensors,
                if segment.normalized { "" } else { " (unscaled)" }
            ));
        }
        if self.segments.len() > 10 {
            summary.push_str(&format!("  ... {} more\n", self.segments.len() - 10));
        }

        summary
    }
}
