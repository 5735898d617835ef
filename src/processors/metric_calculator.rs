use crate::config::{PipelineConfig, WorkingSensorUnit};
use crate::models::{
    station_of_column, Direction, Metric, MetricColumns, SensorTable, TrafficTable,
};
use tracing::{debug, info};

/// Network-wide aggregates over the retained station columns.
pub struct MetricCalculator {
    subsplit_markers: Vec<String>,
    unit: WorkingSensorUnit,
}

impl MetricCalculator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            subsplit_markers: config.subsplit_markers.clone(),
            unit: config.working_sensor_unit,
        }
    }

    pub fn with_unit(mut self, unit: WorkingSensorUnit) -> Self {
        self.unit = unit;
        self
    }

    fn is_subsplit(&self, column: &str) -> bool {
        self.subsplit_markers
            .iter()
            .any(|marker| column.contains(marker.as_str()))
    }

    /// Drop sub-split channels, then compute working sensors and the five absolute metrics.
    pub fn compute(&self, mut stations: SensorTable) -> TrafficTable {
        let subsplits: Vec<String> = stations
            .column_names()
            .into_iter()
            .filter(|name| self.is_subsplit(name))
            .map(str::to_string)
            .collect();
        for name in &subsplits {
            stations.remove_column(name);
        }
        debug!(dropped = subsplits.len(), "Dropped sub-split channels");

        let rows = stations.len();
        let mut absolute = MetricColumns::with_len(rows);

        let in_columns = self.direction_indices(&stations, Direction::In);
        let out_columns = self.direction_indices(&stations, Direction::Out);
        let all_columns: Vec<usize> = (0..stations.columns().len()).collect();

        for row in 0..rows {
            let traffic = row_sum(&stations, &all_columns, row);
            let sum_in = row_sum(&stations, &in_columns, row);
            let sum_out = row_sum(&stations, &out_columns, row);
            let diff = match (sum_in, sum_out) {
                (Some(i), Some(o)) => Some(i - o),
                _ => None,
            };

            absolute.get_mut(Metric::Traffic)[row] = traffic;
            absolute.get_mut(Metric::SumIn)[row] = sum_in;
            absolute.get_mut(Metric::SumOut)[row] = sum_out;
            absolute.get_mut(Metric::Diff)[row] = diff;
        }

        let occupancy = cumulative_occupancy(absolute.get(Metric::Diff));
        absolute
            .get_mut(Metric::Occupancy)
            .copy_from_slice(&occupancy);

        let working_sensors = self.working_sensors(&stations);

        info!(
            rows,
            station_columns = stations.columns().len(),
            max_working_sensors = working_sensors.iter().max().copied().unwrap_or(0),
            "Traffic metrics computed"
        );

        TrafficTable {
            stations,
            working_sensors,
            absolute,
            normalized: MetricColumns::with_len(rows),
        }
    }

    fn direction_indices(&self, table: &SensorTable, direction: Direction) -> Vec<usize> {
        table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| Direction::of_column(&c.name) == Some(direction))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Active stations (or channels) per row.
    pub fn working_sensors(&self, table: &SensorTable) -> Vec<u32> {
        let groups: Vec<Vec<usize>> = match self.unit {
            WorkingSensorUnit::Column => (0..table.columns().len()).map(|i| vec![i]).collect(),
            WorkingSensorUnit::Station => {
                let mut keys: Vec<&str> = Vec::new();
                let mut groups: Vec<Vec<usize>> = Vec::new();
                for (idx, column) in table.columns().iter().enumerate() {
                    let station = station_of_column(&column.name);
                    match keys.iter().position(|k| *k == station) {
                        Some(pos) => groups[pos].push(idx),
                        None => {
                            keys.push(station);
                            groups.push(vec![idx]);
                        }
                    }
                }
                groups
            }
        };

        let columns = table.columns();
        (0..table.len())
            .map(|row| {
                groups
                    .iter()
                    .filter(|group| group.iter().any(|&idx| columns[idx].values[row].is_some()))
                    .count() as u32
            })
            .collect()
    }
}

/// Sum of the non-null values; null when every contributor is null.
fn row_sum(table: &SensorTable, indices: &[usize], row: usize) -> Option<f64> {
    indices
        .iter()
        .filter_map(|&idx| table.columns()[idx].values[row])
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Running total of net flow from the start of the series; null contributes zero.
pub fn cumulative_occupancy(diff: &[Option<f64>]) -> Vec<Option<f64>> {
    diff.iter()
        .scan(0.0, |total, d| {
            *total += d.unwrap_or(0.0);
            Some(Some(*total))
        })
        .collect()
}
