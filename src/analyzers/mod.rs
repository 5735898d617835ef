pub mod table_analyzer;

pub use table_analyzer::{MetricStats, StationCoverage, TrafficAnalyzer, TrafficStatistics};
