use crate::models::{Metric, MetricColumns, Segment, TrafficTable};
use crate::utils::constants::{NORMALIZED_MAX, NORMALIZED_MIN};
use tracing::{debug, info};

/// Running min/max of one metric within the open segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct MetricRange {
    bounds: Option<(f64, f64)>,
}

impl MetricRange {
    fn observe(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.bounds = Some(match self.bounds {
                Some((min, max)) => (min.min(v), max.max(v)),
                None => (v, v),
            });
        }
    }

    fn rescale(&self, value: f64) -> Option<f64> {
        let (min, max) = self.bounds?;
        let span = max - min;
        if span > 0.0 {
            Some(NORMALIZED_MIN + (value - min) / span * (NORMALIZED_MAX - NORMALIZED_MIN))
        } else {
            Some(NORMALIZED_MIN)
        }
    }
}

/// State of the open segment: `Accumulating(working_sensors)`.
#[derive(Debug)]
struct SegmentAccumulator {
    working_sensors: u32,
    start: usize,
    ranges: [MetricRange; 5],
}

impl SegmentAccumulator {
    fn open(working_sensors: u32, start: usize) -> Self {
        Self {
            working_sensors,
            start,
            ranges: [MetricRange::default(); 5],
        }
    }

    fn observe(&mut self, values: [Option<f64>; 5]) {
        for (range, value) in self.ranges.iter_mut().zip(values) {
            range.observe(value);
        }
    }
}

/// Splits the series at every change of `working_sensors` and min-max scales each run to 0..100.
pub struct SegmentNormalizer {
    min_segment_rows: usize,
}

impl SegmentNormalizer {
    pub fn new(min_segment_rows: usize) -> Self {
        Self {
            min_segment_rows: min_segment_rows.max(1),
        }
    }

    /// Single forward pass; fills `table.normalized` and returns the segments in order.
    pub fn normalize(&self, table: &mut TrafficTable) -> Vec<Segment> {
        let rows = table.len();
        table.normalized = MetricColumns::with_len(rows);

        let mut segments = Vec::new();
        let mut open: Option<SegmentAccumulator> = None;

        for row in 0..rows {
            let working_sensors = table.working_sensors[row];

            let continues = open
                .as_ref()
                .is_some_and(|acc| acc.working_sensors == working_sensors);
            if !continues {
                if let Some(acc) = open.take() {
                    segments.push(self.close(acc, row, table));
                }
                open = Some(SegmentAccumulator::open(working_sensors, row));
            }

            if let Some(acc) = open.as_mut() {
                acc.observe(table.absolute.row(row));
            }
        }

        if let Some(acc) = open.take() {
            segments.push(self.close(acc, rows, table));
        }

        info!(
            segments = segments.len(),
            skipped = segments.iter().filter(|s| !s.normalized).count(),
            "Per-segment normalization complete"
        );

        segments
    }

    fn close(&self, acc: SegmentAccumulator, end: usize, table: &mut TrafficTable) -> Segment {
        let mut segment = Segment {
            working_sensors: acc.working_sensors,
            start: acc.start,
            end,
            normalized: false,
        };

        if segment.len() < self.min_segment_rows {
            info!(
                start = %table.timestamps()[segment.start],
                rows = segment.len(),
                working_sensors = segment.working_sensors,
                "Segment too short to normalize, left unscaled"
            );
            return segment;
        }

        for metric in Metric::ALL {
            let range = acc.ranges[metric.index()];
            let absolute = table.absolute.get(metric);
            let normalized = table.normalized.get_mut(metric);

            for row in segment.range() {
                normalized[row] = absolute[row].and_then(|v| range.rescale(v));
            }
        }

        debug!(
            start = segment.start,
            end = segment.end,
            working_sensors = segment.working_sensors,
            "Normalized segment"
        );

        segment.normalized = true;
        segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SensorColumn, SensorTable};
    use chrono::{Duration, NaiveDate};

    fn traffic_table(working_sensors: Vec<u32>, traffic: Vec<Option<f64>>) -> TrafficTable {
        let t0 = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let rows = working_sensors.len();
        let stations = SensorTable::with_columns(
            (0..rows as i64).map(|h| t0 + Duration::hours(h)).collect(),
            vec![SensorColumn::new("Gfäll IN", traffic.clone())],
        )
        .unwrap();

        let mut absolute = MetricColumns::with_len(rows);
        absolute.get_mut(Metric::Traffic).copy_from_slice(&traffic);

        TrafficTable {
            stations,
            working_sensors,
            absolute,
            normalized: MetricColumns::with_len(rows),
        }
    }

    #[test]
    fn test_segments_partition_rows() {
        let mut table = traffic_table(
            vec![3, 3, 4, 4, 4, 3],
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)],
        );
        let segments = SegmentNormalizer::new(2).normalize(&mut table);

        let ranges: Vec<(usize, usize, u32)> = segments
            .iter()
            .map(|s| (s.start, s.end, s.working_sensors))
            .collect();
        assert_eq!(ranges, vec![(0, 2, 3), (2, 5, 4), (5, 6, 3)]);
        assert!(!segments[2].normalized);
    }

    #[test]
    fn test_min_max_per_segment() {
        let mut table = traffic_table(
            vec![1, 1, 1, 2, 2],
            vec![Some(10.0), Some(20.0), Some(30.0), Some(100.0), Some(50.0)],
        );
        SegmentNormalizer::new(2).normalize(&mut table);

        assert_eq!(
            table.normalized.get(Metric::Traffic),
            &[Some(0.0), Some(50.0), Some(100.0), Some(100.0), Some(0.0)]
        );
    }

    #[test]
    fn test_single_row_segment_stays_null() {
        let mut table = traffic_table(vec![1, 2, 2], vec![Some(5.0), Some(1.0), Some(3.0)]);
        let segments = SegmentNormalizer::new(2).normalize(&mut table);

        assert_eq!(segments.len(), 2);
        assert_eq!(table.normalized.get(Metric::Traffic)[0], None);
        assert_eq!(table.normalized.get(Metric::Traffic)[2], Some(100.0));
    }

    #[test]
    fn test_raised_row_threshold_skips_short_segments() {
        let mut table = traffic_table(
            vec![2, 2, 3, 3, 3],
            vec![Some(4.0), Some(8.0), Some(1.0), Some(2.0), Some(3.0)],
        );
        let segments = SegmentNormalizer::new(3).normalize(&mut table);

        let flags: Vec<(usize, bool)> = segments.iter().map(|s| (s.len(), s.normalized)).collect();
        assert_eq!(flags, vec![(2, false), (3, true)]);
        assert_eq!(
            table.normalized.get(Metric::Traffic),
            &[None, None, Some(0.0), Some(50.0), Some(100.0)]
        );
    }

    #[test]
    fn test_flat_and_null_metrics() {
        let mut table = traffic_table(vec![2, 2, 2], vec![Some(7.0), None, Some(7.0)]);
        SegmentNormalizer::new(2).normalize(&mut table);

        assert_eq!(
            table.normalized.get(Metric::Traffic),
            &[Some(0.0), None, Some(0.0)]
        );
        assert!(table.normalized.get(Metric::Diff).iter().all(Option::is_none));
    }

    #[test]
    fn test_empty_table_has_no_segments() {
        let mut table = traffic_table(vec![], vec![]);
        assert!(SegmentNormalizer::new(2).normalize(&mut table).is_empty());
    }
}
