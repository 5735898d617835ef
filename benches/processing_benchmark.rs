use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trailcount_processor::config::PipelineConfig;
use trailcount_processor::models::{SensorColumn, SensorTable};
use trailcount_processor::processors::{
    MetricCalculator, Pipeline, PipelineReport, SegmentNormalizer,
};

// Hourly counts for `stations` IN/OUT pairs with staggered outages
fn create_test_network(stations: usize, hours: usize) -> SensorTable {
    let start = NaiveDate::from_ymd_opt(2016, 5, 10)
        .unwrap()
        .and_hms_opt(3, 0, 0)
        .unwrap();
    let timestamps = (0..hours as i64).map(|h| start + Duration::hours(h)).collect();

    let mut columns = Vec::with_capacity(stations * 2);
    for station in 0..stations {
        for (direction, offset) in [("IN", 0usize), ("OUT", 3usize)] {
            let values = (0..hours)
                .map(|hour| {
                    let offline = (hour / (500 + station * 37)) % 5 == 0;
                    if offline {
                        None
                    } else {
                        Some(((hour * 7 + station * 11 + offset) % 120) as f64)
                    }
                })
                .collect();
            columns.push(SensorColumn::new(
                format!("Station {} {}", station, direction),
                values,
            ));
        }
    }

    SensorTable::with_columns(timestamps, columns).unwrap()
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let pipeline = Pipeline::new(PipelineConfig::default());

    for hours in [24 * 30, 24 * 365] {
        let table = create_test_network(25, hours);
        group.bench_with_input(BenchmarkId::new("process_table", hours), &table, |b, table| {
            b.iter(|| {
                pipeline
                    .process_table(black_box(table.clone()), PipelineReport::default(), None)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn benchmark_metrics_and_segments(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let table = create_test_network(25, 24 * 365);

    c.bench_function("metric_calculation", |b| {
        let calculator = MetricCalculator::new(&config);
        b.iter(|| calculator.compute(black_box(table.clone())))
    });

    c.bench_function("segment_normalization", |b| {
        let traffic = MetricCalculator::new(&config).compute(table.clone());
        let normalizer = SegmentNormalizer::new(config.min_segment_rows);
        b.iter(|| {
            let mut traffic = traffic.clone();
            normalizer.normalize(black_box(&mut traffic))
        })
    });
}

criterion_group!(
    benches,
    benchmark_full_pipeline,
    benchmark_metrics_and_segments
);
criterion_main!(benches);
