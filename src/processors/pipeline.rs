use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{Segment, SensorTable, TrafficTable};
use crate::processors::{
    ColumnHarmonizer, GenerationFuser, HarmonizeStats, MetricCalculator, OutageMasker,
    OutlierFilter, PipelineReport, SegmentNormalizer, SegmentSummary, TimeCorrector,
};
use crate::readers::{ConcurrentReader, ExportFile, ExportReader};
use crate::utils::progress::ProgressReporter;
use std::path::Path;
use tracing::info;

/// Number of progress steps reported by [`Pipeline::run`].
pub const PIPELINE_STAGES: u64 = 8;

/// Result of a full run: the table handed to consumers, its segments and the report.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: TrafficTable,
    pub segments: Vec<Segment>,
    pub report: PipelineReport,
}

/// Strictly ordered batch transform from raw exports to the normalized traffic table.
pub struct Pipeline {
    config: PipelineConfig,
    max_workers: usize,
    use_mmap: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            max_workers: num_cpus::get(),
            use_mmap: false,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read every export under `input` and run all stages.
    pub fn run(&self, input: &Path, progress: Option<&ProgressReporter>) -> Result<PipelineOutput> {
        if let Some(p) = progress {
            p.set_message("Reading exports...");
        }

        let reader = ExportReader::new(&self.config).with_mmap(self.use_mmap);
        let exports = ConcurrentReader::new(self.max_workers).read_exports(input, &reader)?;

        self.process_exports(exports, progress)
    }

    /// Harmonize each export on its own, concatenate, then run the row stages.
    pub fn process_exports(
        &self,
        exports: Vec<ExportFile>,
        progress: Option<&ProgressReporter>,
    ) -> Result<PipelineOutput> {
        advance(progress, "Harmonizing columns...");

        let harmonizer = ColumnHarmonizer::new(&self.config.columns);
        let mut report = PipelineReport::default();
        let mut tables = Vec::with_capacity(exports.len());

        for mut export in exports {
            let stats: HarmonizeStats = harmonizer.harmonize(&mut export.table)?;
            report.harmonized.merge(stats);
            report.input_files.push(export.name);
            tables.push(export.table);
        }

        let table = SensorTable::concat(tables);
        info!(
            files = report.input_files.len(),
            rows = table.len(),
            columns = table.columns().len(),
            "Exports concatenated"
        );

        self.process_table(table, report, progress)
    }

    /// Stages 2-7 on an already harmonized table.
    pub fn process_table(
        &self,
        mut table: SensorTable,
        mut report: PipelineReport,
        progress: Option<&ProgressReporter>,
    ) -> Result<PipelineOutput> {
        report.raw_rows = table.len();
        report.raw_columns = table.columns().len();

        // Step 2
        advance(progress, "Correcting time base...");
        report.time_correction = TimeCorrector::new().correct(&mut table)?;

        // Step 3
        advance(progress, "Masking outages...");
        report.masked_values = OutageMasker::new(&self.config.outage_mask).apply(&mut table)?;

        // Step 4, with the observation window trimmed between voiding and merging
        advance(progress, "Fusing sensor generations...");
        let fuser = GenerationFuser::new(&self.config.generations);
        report.fusion.voided_values = fuser.void_overlaps(&mut table)?;
        if let Some(start) = self.config.observation_start {
            report.trimmed_rows = table.retain_rows(|t| t >= start);
            info!(trimmed = report.trimmed_rows, %start, "Observation window applied");
        }
        report.fusion.fused_columns = fuser.merge(&mut table)?;

        // Step 5
        advance(progress, "Suppressing outliers...");
        report.outliers_removed = OutlierFilter::new(self.config.outlier_ceiling).apply(&mut table);

        // Step 6
        advance(progress, "Computing traffic metrics...");
        let mut traffic = MetricCalculator::new(&self.config).compute(table);

        // Step 7
        advance(progress, "Normalizing segments...");
        let segments = SegmentNormalizer::new(self.config.min_segment_rows).normalize(&mut traffic);

        report.output_rows = traffic.len();
        report.station_columns = traffic
            .stations
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        report.segments = segments
            .iter()
            .map(|s| SegmentSummary::from_segment(s, &traffic))
            .collect();

        advance(progress, "Pipeline complete");
        info!(
            rows = report.output_rows,
            segments = report.segment_count(),
            skipped = report.skipped_segments(),
            "Pipeline finished"
        );

        Ok(PipelineOutput {
            table: traffic,
            segments,
            report,
        })
    }
}

fn advance(progress: Option<&ProgressReporter>, message: &str) {
    if let Some(p) = progress {
        p.advance(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FusedStation, Generation, InstallCutoff};
    use crate::models::{Metric, SensorColumn};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(h: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 7, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(h)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            outage_mask: vec![InstallCutoff {
                cutoff: at(0),
                columns: vec!["Gfäll IN".to_string(), "Gfäll OUT".to_string()],
            }],
            generations: vec![FusedStation {
                station: "Lusen 1".to_string(),
                cutover: at(2),
                older: Generation {
                    name: "EVO".to_string(),
                    in_column: "Lusen 1 EVO IN".to_string(),
                    out_column: "Lusen 1 EVO OUT".to_string(),
                    auxiliary_columns: vec![],
                },
                newer: Generation {
                    name: "PYRO".to_string(),
                    in_column: "Lusen 1 PYRO IN".to_string(),
                    out_column: "Lusen 1 PYRO OUT".to_string(),
                    auxiliary_columns: vec![],
                },
            }],
            observation_start: Some(at(0)),
            ..PipelineConfig::default()
        }
    }

    fn raw_table() -> SensorTable {
        let counts = |v: [f64; 5]| v.iter().map(|x| Some(*x)).collect::<Vec<_>>();
        SensorTable::with_columns(
            (-1..4).map(at).collect(),
            vec![
                SensorColumn::new("Lusen 1 EVO IN", counts([1.0, 2.0, 3.0, 4.0, 5.0])),
                SensorColumn::new("Lusen 1 EVO OUT", counts([1.0, 1.0, 1.0, 1.0, 1.0])),
                SensorColumn::new("Lusen 1 PYRO IN", counts([9.0, 9.0, 9.0, 9.0, 7.0])),
                SensorColumn::new("Lusen 1 PYRO OUT", counts([2.0, 2.0, 2.0, 2.0, 2.0])),
                SensorColumn::new("Gfäll IN", counts([0.0, 0.0, 6.0, 6.0, 900.0])),
                SensorColumn::new("Gfäll OUT", counts([0.0, 0.0, 3.0, 3.0, 3.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_stages_run_in_order() {
        let output = Pipeline::new(config())
            .process_table(raw_table(), PipelineReport::default(), None)
            .unwrap();
        let table = &output.table;

        assert_eq!(output.report.trimmed_rows, 1);
        assert_eq!(output.report.masked_values, 4);
        assert_eq!(output.report.outliers_removed, 1);
        assert_eq!(table.timestamps(), &[at(0), at(1), at(2), at(3)]);
        assert_eq!(
            table.stations.column_names(),
            vec!["Gfäll IN", "Gfäll OUT", "Lusen 1 MERGED IN", "Lusen 1 MERGED OUT"]
        );
        assert_eq!(
            table.stations.column("Lusen 1 MERGED IN").unwrap().values,
            vec![Some(2.0), Some(3.0), Some(4.0), Some(7.0)]
        );
        assert_eq!(table.working_sensors, vec![1, 2, 2, 2]);
        assert_eq!(
            table.absolute.get(Metric::Traffic),
            &[Some(3.0), Some(13.0), Some(14.0), Some(12.0)]
        );
        assert_eq!(output.segments.len(), 2);
        assert!(!output.segments[0].normalized);
    }

    #[test]
    fn test_rerun_is_identical() {
        let pipeline = Pipeline::new(config());
        let first = pipeline
            .process_table(raw_table(), PipelineReport::default(), None)
            .unwrap();
        let second = pipeline
            .process_table(raw_table(), PipelineReport::default(), None)
            .unwrap();

        assert_eq!(first.table, second.table);
        assert_eq!(first.report, second.report);
    }
}
