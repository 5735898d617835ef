use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::SensorTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Traffic,
    SumIn,
    SumOut,
    Diff,
    Occupancy,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Traffic,
        Metric::SumIn,
        Metric::SumOut,
        Metric::Diff,
        Metric::Occupancy,
    ];

    pub fn index(&self) -> usize {
        match self {
            Metric::Traffic => 0,
            Metric::SumIn => 1,
            Metric::SumOut => 2,
            Metric::Diff => 3,
            Metric::Occupancy => 4,
        }
    }

    pub fn abs_column(&self) -> &'static str {
        match self {
            Metric::Traffic => "traffic_abs",
            Metric::SumIn => "sum_IN_abs",
            Metric::SumOut => "sum_OUT_abs",
            Metric::Diff => "diff_abs",
            Metric::Occupancy => "occupancy_abs",
        }
    }

    pub fn norm_column(&self) -> &'static str {
        match self {
            Metric::Traffic => "traffic_norm",
            Metric::SumIn => "sum_IN_norm",
            Metric::SumOut => "sum_OUT_norm",
            Metric::Diff => "diff_norm",
            Metric::Occupancy => "occupancy_norm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::Traffic => "Total traffic",
            Metric::SumIn => "Inbound",
            Metric::SumOut => "Outbound",
            Metric::Diff => "Net flow",
            Metric::Occupancy => "Occupancy",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The five traffic metrics as parallel nullable series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricColumns {
    values: [Vec<Option<f64>>; 5],
}

impl MetricColumns {
    pub fn with_len(len: usize) -> Self {
        Self {
            values: std::array::from_fn(|_| vec![None; len]),
        }
    }

    pub fn len(&self) -> usize {
        self.values[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, metric: Metric) -> &[Option<f64>] {
        &self.values[metric.index()]
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut [Option<f64>] {
        &mut self.values[metric.index()]
    }

    /// All five metric values of one row, in [`Metric::ALL`] order.
    pub fn row(&self, row: usize) -> [Option<f64>; 5] {
        std::array::from_fn(|i| self.values[i][row])
    }
}

/// Pipeline output: retained station columns plus absolute and normalized metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficTable {
    pub stations: SensorTable,
    pub working_sensors: Vec<u32>,
    pub absolute: MetricColumns,
    pub normalized: MetricColumns,
}

impl TrafficTable {
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        self.stations.timestamps()
    }

    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let timestamps = self.timestamps();
        Some((*timestamps.first()?, *timestamps.last()?))
    }
}
