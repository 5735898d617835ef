pub mod metrics;
pub mod observation;
pub mod segment;
pub mod table;

pub use metrics::{Metric, MetricColumns, TrafficTable};
pub use observation::{station_of_column, Direction, RawObservation};
pub use segment::Segment;
pub use table::{SensorColumn, SensorTable};
