use crate::error::Result;
use crate::models::{Metric, TrafficTable};
use chrono::NaiveDateTime;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct StationCoverage {
    pub column: String,
    pub non_null: usize,
    pub total: usize,
}

impl StationCoverage {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.non_null as f64 / self.total as f64) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricStats {
    pub metric: Metric,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub non_null: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficStatistics {
    pub total_rows: usize,
    pub time_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub stations: Vec<StationCoverage>,
    pub segment_count: usize,
    pub max_working_sensors: u32,
    pub metrics: Vec<MetricStats>,
}

pub struct TrafficAnalyzer;

impl TrafficAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_parquet(&self, path: &Path) -> Result<TrafficStatistics> {
        self.analyze_parquet_with_limit(path, None)
    }

    pub fn analyze_parquet_with_limit(
        &self,
        path: &Path,
        limit: Option<usize>,
    ) -> Result<TrafficStatistics> {
        let writer = crate::writers::ParquetWriter::new();
        let table = writer.read_table(path, limit)?;
        Ok(self.analyze(&table))
    }

    pub fn analyze(&self, table: &TrafficTable) -> TrafficStatistics {
        let total_rows = table.len();

        let stations = table
            .stations
            .columns()
            .iter()
            .map(|column| StationCoverage {
                column: column.name.clone(),
                non_null: column.non_null_count(),
                total: total_rows,
            })
            .collect();

        // Segments restart wherever the working-sensor count changes
        let segment_count = if table.working_sensors.is_empty() {
            0
        } else {
            1 + table
                .working_sensors
                .windows(2)
                .filter(|w| w[0] != w[1])
                .count()
        };

        let metrics = Metric::ALL
            .iter()
            .map(|&metric| {
                let values: Vec<f64> = table.absolute.get(metric).iter().flatten().copied().collect();
                MetricStats {
                    metric,
                    min: values.iter().copied().reduce(f64::min),
                    max: values.iter().copied().reduce(f64::max),
                    non_null: values.len(),
                }
            })
            .collect();

        TrafficStatistics {
            total_rows,
            time_range: table.time_range(),
            stations,
            segment_count,
            max_working_sensors: table.working_sensors.iter().max().copied().unwrap_or(0),
            metrics,
        }
    }
}

impl Default for TrafficAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficStatistics {
    pub fn summary(&self) -> String {
        let range = match self.time_range {
            Some((start, end)) => format!(
                "{} to {} ({} days)",
                start,
                end,
                end.signed_duration_since(start).num_days()
            ),
            None => "No rows".to_string(),
        };

        format!(
            "Rows: {} hourly records\n\
            Time Range: {}\n\
            Station Columns: {}\n\
            Segments: {} (up to {} working sensors)",
            self.total_rows,
            range,
            self.stations.len(),
            self.segment_count,
            self.max_working_sensors
        )
    }

    pub fn detailed_summary(&self) -> String {
        let mut summary = self.summary();

        summary.push_str("\n\nAbsolute Metrics:\n");
        for stats in &self.metrics {
            match (stats.min, stats.max) {
                (Some(min), Some(max)) => summary.push_str(&format!(
                    "- {}: {:.1} to {:.1} ({} values)\n",
                    stats.metric, min, max, stats.non_null
                )),
                _ => summary.push_str(&format!("- {}: no values\n", stats.metric)),
            }
        }

        summary.push_str("\nStation Coverage:\n");
        for station in &self.stations {
            summary.push_str(&format!(
                "- {}: {:.1}% ({}/{})\n",
                station.column,
                station.percentage(),
                station.non_null,
                station.total
            ));
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricColumns, SensorColumn, SensorTable};
    use chrono::{Duration, NaiveDate};

    fn table() -> TrafficTable {
        let t0 = NaiveDate::from_ymd_opt(2018, 8, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let stations = SensorTable::with_columns(
            (0..4).map(|h| t0 + Duration::hours(h)).collect(),
            vec![SensorColumn::new("Scheuereck IN", vec![Some(1.0), None, Some(5.0), Some(2.0)])],
        )
        .unwrap();
        let mut absolute = MetricColumns::with_len(4);
        absolute
            .get_mut(Metric::Traffic)
            .copy_from_slice(&[Some(1.0), None, Some(5.0), Some(2.0)]);

        TrafficTable {
            stations,
            working_sensors: vec![1, 0, 1, 1],
            absolute,
            normalized: MetricColumns::with_len(4),
        }
    }

    #[test]
    fn test_analyze_table() {
        let stats = TrafficAnalyzer::new().analyze(&table());

        assert_eq!(stats.total_rows, 4);
        assert_eq!(stats.segment_count, 3);
        assert_eq!(stats.max_working_sensors, 1);
        assert_eq!(stats.stations[0].non_null, 3);
        assert_eq!(stats.stations[0].percentage(), 75.0);

        let traffic = &stats.metrics[Metric::Traffic.index()];
        assert_eq!((traffic.min, traffic.max), (Some(1.0), Some(5.0)));
        assert_eq!(stats.metrics[Metric::Diff.index()].min, None);
    }

    #[test]
    fn test_summary_mentions_range() {
        let stats = TrafficAnalyzer::new().analyze(&table());
        let text = stats.detailed_summary();
        assert!(text.contains("2018-08-01 00:00:00 to 2018-08-01 03:00:00"));
        assert!(text.contains("Scheuereck IN: 75.0%"));
        assert!(text.contains("Occupancy: no values"));
    }
}
