use crate::config::InstallCutoff;
use crate::error::Result;
use crate::models::SensorTable;
use tracing::{debug, info};

/// Voids readings of stations before their sensor was installed.
pub struct OutageMasker<'a> {
    cutoffs: &'a [InstallCutoff],
}

impl<'a> OutageMasker<'a> {
    pub fn new(cutoffs: &'a [InstallCutoff]) -> Self {
        Self { cutoffs }
    }

    /// Null every configured column at or before its cutoff. Returns the number of voided values.
    pub fn apply(&self, table: &mut SensorTable) -> Result<usize> {
        // Resolve every column first so a bad table leaves the data untouched
        let mut targets = Vec::new();
        for entry in self.cutoffs {
            for column in &entry.columns {
                let idx = table.require_column(column, "outage mask")?;
                targets.push((idx, entry.cutoff));
            }
        }

        let mut masked = 0;
        for (idx, cutoff) in targets {
            let voided = table.void_where(idx, |t| t <= cutoff);
            debug!(column = %table.columns()[idx].name, %cutoff, voided, "Masked pre-install readings");
            masked += voided;
        }

        info!(masked, "Outage mask applied");
        Ok(masked)
    }
}
