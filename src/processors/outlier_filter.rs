use crate::models::SensorTable;
use tracing::{debug, info};

/// Removes physically implausible hourly counts.
pub struct OutlierFilter {
    ceiling: f64,
}

impl OutlierFilter {
    pub fn new(ceiling: f64) -> Self {
        Self { ceiling }
    }

    /// Null every value strictly above the ceiling. Values are removed, never clipped.
    pub fn apply(&self, table: &mut SensorTable) -> usize {
        let mut removed = 0;

        for column in table.columns_mut() {
            let mut column_removed = 0;
            for value in column.values.iter_mut() {
                if value.is_some_and(|v| v > self.ceiling) {
                    *value = None;
                    column_removed += 1;
                }
            }
            if column_removed > 0 {
                debug!(column = %column.name, removed = column_removed, "Outliers removed");
            }
            removed += column_removed;
        }

        info!(removed, ceiling = self.ceiling, "Outlier suppression complete");
        removed
    }
}
