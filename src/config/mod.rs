pub mod tables;

pub use tables::{ColumnMapping, ColumnRename, DerivedColumn, FusedStation, Generation, InstallCutoff};

use chrono::NaiveDateTime;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    DEFAULT_MIN_SEGMENT_ROWS, DEFAULT_OUTLIER_CEILING, ENV_PREFIX, EXPORT_PREAMBLE_LINES,
    TIME_COLUMN,
};
use crate::utils::datetime::deserialize_optional_timestamp;

/// Built-in tables for the Bavarian Forest counting network.
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingSensorUnit {
    /// Count logical stations with any non-null direction.
    #[default]
    Station,
    /// Count individual non-null channels.
    Column,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct PipelineConfig {
    #[serde(default = "default_time_column")]
    #[validate(length(min = 1))]
    pub time_column: String,

    #[serde(default = "default_preamble_lines")]
    pub preamble_lines: usize,

    #[serde(default)]
    pub columns: ColumnMapping,

    #[serde(default)]
    pub outage_mask: Vec<InstallCutoff>,

    #[serde(default)]
    pub generations: Vec<FusedStation>,

    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub observation_start: Option<NaiveDateTime>,

    #[serde(default = "default_outlier_ceiling")]
    #[validate(range(min = 1.0))]
    pub outlier_ceiling: f64,

    #[serde(default = "default_min_segment_rows")]
    #[validate(range(min = 1))]
    pub min_segment_rows: usize,

    #[serde(default)]
    pub subsplit_markers: Vec<String>,

    #[serde(default)]
    pub working_sensor_unit: WorkingSensorUnit,
}

fn default_time_column() -> String {
    TIME_COLUMN.to_string()
}

fn default_preamble_lines() -> usize {
    EXPORT_PREAMBLE_LINES
}

fn default_outlier_ceiling() -> f64 {
    DEFAULT_OUTLIER_CEILING
}

fn default_min_segment_rows() -> usize {
    DEFAULT_MIN_SEGMENT_ROWS
}

impl Default for PipelineConfig {
    /// Empty tables with default tuning; useful as a base for ad-hoc networks.
    fn default() -> Self {
        Self {
            time_column: default_time_column(),
            preamble_lines: default_preamble_lines(),
            columns: ColumnMapping::default(),
            outage_mask: Vec::new(),
            generations: Vec::new(),
            observation_start: None,
            outlier_ceiling: default_outlier_ceiling(),
            min_segment_rows: default_min_segment_rows(),
            subsplit_markers: Vec::new(),
            working_sensor_unit: WorkingSensorUnit::default(),
        }
    }
}

impl PipelineConfig {
    /// The built-in configuration, without file or environment overrides.
    pub fn builtin() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()?
            .try_deserialize::<PipelineConfig>()?;
        config.check()?;
        Ok(config)
    }

    /// Built-in tables, overridden by an optional TOML file, then by
    /// `TRAILCOUNT__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading pipeline configuration");
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<PipelineConfig>()?;

        config.check()?;
        Ok(config)
    }

    /// Field rules plus cross-table consistency.
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        for rename in &self.columns.rename {
            rename.validate()?;
        }
        for derived in &self.columns.derived {
            derived.validate()?;
        }
        for cutoff in &self.outage_mask {
            cutoff.validate()?;
        }

        let mut stations = HashSet::new();
        let mut claimed_columns = HashSet::new();
        for fused in &self.generations {
            fused.validate()?;
            fused.older.validate()?;
            fused.newer.validate()?;

            if !stations.insert(fused.station.as_str()) {
                return Err(ProcessingError::Config(format!(
                    "Station '{}' appears twice in the generation map",
                    fused.station
                )));
            }

            for column in fused.older.voided_columns().chain(fused.newer.voided_columns()) {
                if !claimed_columns.insert(column) {
                    return Err(ProcessingError::Config(format!(
                        "Column '{}' is claimed by more than one generation",
                        column
                    )));
                }
            }
        }

        if !self.outlier_ceiling.is_finite() {
            return Err(ProcessingError::Config(
                "outlier_ceiling must be a finite number".to_string(),
            ));
        }

        Ok(())
    }
}
