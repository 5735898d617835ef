pub mod column_harmonizer;
pub mod generation_fuser;
pub mod metric_calculator;
pub mod outage_masker;
pub mod outlier_filter;
pub mod pipeline;
pub mod report;
pub mod segment_normalizer;
pub mod time_corrector;

pub use column_harmonizer::{ColumnHarmonizer, HarmonizeStats};
pub use generation_fuser::{FusionStats, GenerationFuser};
pub use metric_calculator::{cumulative_occupancy, MetricCalculator};
pub use outage_masker::OutageMasker;
pub use outlier_filter::OutlierFilter;
pub use pipeline::{Pipeline, PipelineOutput, PIPELINE_STAGES};
pub use report::{PipelineReport, SegmentSummary};
pub use segment_normalizer::SegmentNormalizer;
pub use time_corrector::{TimeCorrection, TimeCorrector};
