use crate::error::{ProcessingError, Result};
use crate::models::SensorTable;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info};

/// What the time-base correction changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeCorrection {
    pub reference_cadence_minutes: Option<i64>,
    pub shifted: Vec<NaiveDateTime>,
}

impl TimeCorrection {
    pub fn shifted_rows(&self) -> usize {
        self.shifted.len()
    }
}

/// Repairs the daylight-saving fallback artifacts of the exports and sorts the table.
#[derive(Debug, Default)]
pub struct TimeCorrector;

impl TimeCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Correct timestamps in raw row order, then sort and require unique timestamps.
    pub fn correct(&self, table: &mut SensorTable) -> Result<TimeCorrection> {
        if table.len() < 2 {
            return Ok(TimeCorrection::default());
        }

        let original: Vec<NaiveDateTime> = table.timestamps().to_vec();
        let reference = original[1] - original[0];
        if reference <= Duration::zero() {
            return Err(ProcessingError::timestamp_anomaly(
                1,
                format!(
                    "first interval {} -> {} is not a positive cadence",
                    original[0], original[1]
                ),
            ));
        }

        let mut correction = TimeCorrection {
            reference_cadence_minutes: Some(reference.num_minutes()),
            shifted: Vec::new(),
        };
        let mut previous_shifted = false;

        for row in 1..original.len() {
            let delta = original[row] - original[row - 1];

            if delta == reference {
                previous_shifted = false;
            } else if delta == reference * 2 {
                if previous_shifted {
                    return Err(ProcessingError::timestamp_anomaly(
                        row,
                        format!("consecutive fallback duplicates around {}", original[row]),
                    ));
                }
                if row + 1 == original.len() {
                    return Err(ProcessingError::timestamp_anomaly(
                        row,
                        format!(
                            "fallback duplicate at {} is the last row, nothing to copy from",
                            original[row]
                        ),
                    ));
                }

                // The next row still holds its pre-correction values: it cannot have been shifted yet.
                let next = table.row_values(row + 1);
                table.set_row_values(row, &next);
                let corrected = original[row] - reference;
                table.set_timestamp(row, corrected);

                debug!(row, from = %original[row], to = %corrected, "Shifted fallback duplicate");
                correction.shifted.push(corrected);
                previous_shifted = true;
            } else if delta.is_zero() && previous_shifted {
                // Second report of the repeated hour
                previous_shifted = false;
            } else {
                return Err(ProcessingError::timestamp_anomaly(
                    row,
                    format!(
                        "unexpected interval of {} minutes between {} and {}",
                        delta.num_minutes(),
                        original[row - 1],
                        original[row]
                    ),
                ));
            }
        }

        table.sort_by_timestamp();

        if let Some(pos) = table.timestamps().windows(2).position(|w| w[0] == w[1]) {
            return Err(ProcessingError::timestamp_anomaly(
                pos + 1,
                format!("duplicate timestamp {} after correction", table.timestamps()[pos]),
            ));
        }

        info!(
            rows = table.len(),
            cadence_minutes = reference.num_minutes(),
            shifted = correction.shifted_rows(),
            "Time base corrected"
        );

        Ok(correction)
    }
}
