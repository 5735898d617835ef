use crate::config::FusedStation;
use crate::error::Result;
use crate::models::{Direction, SensorColumn, SensorTable};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FusionStats {
    pub voided_values: usize,
    pub fused_columns: usize,
}

/// Fuses hardware generations of one logical station into a single column per direction.
pub struct GenerationFuser<'a> {
    stations: &'a [FusedStation],
}

impl<'a> GenerationFuser<'a> {
    pub fn new(stations: &'a [FusedStation]) -> Self {
        Self { stations }
    }

    /// Void overlaps and merge in one go.
    pub fn fuse(&self, table: &mut SensorTable) -> Result<FusionStats> {
        let voided_values = self.void_overlaps(table)?;
        let fused_columns = self.merge(table)?;
        Ok(FusionStats {
            voided_values,
            fused_columns,
        })
    }

    /// Void the newer generation at or before cut-over and the older one after it.
    pub fn void_overlaps(&self, table: &mut SensorTable) -> Result<usize> {
        let mut targets = Vec::new();
        for fused in self.stations {
            let context = format!("generation map for '{}'", fused.station);
            for column in fused.newer.voided_columns() {
                targets.push((table.require_column(column, &context)?, fused.cutover, true));
            }
            for column in fused.older.voided_columns() {
                targets.push((table.require_column(column, &context)?, fused.cutover, false));
            }
        }

        let mut voided = 0;
        for (idx, cutover, is_newer) in targets {
            voided += if is_newer {
                table.void_where(idx, |t| t <= cutover)
            } else {
                table.void_where(idx, |t| t > cutover)
            };
        }

        info!(voided, stations = self.stations.len(), "Generation overlaps voided");
        Ok(voided)
    }

    /// Replace each station's generation columns by `<station> MERGED IN/OUT`.
    pub fn merge(&self, table: &mut SensorTable) -> Result<usize> {
        let mut fused_columns = 0;

        for fused in self.stations {
            let context = format!("generation map for '{}'", fused.station);

            for direction in [Direction::In, Direction::Out] {
                let older_name = fused.older.column(direction);
                let newer_name = fused.newer.column(direction);
                table.require_column(older_name, &context)?;
                table.require_column(newer_name, &context)?;

                let older = table
                    .remove_column(older_name)
                    .map(|c| c.values)
                    .unwrap_or_default();
                let newer = table
                    .remove_column(newer_name)
                    .map(|c| c.values)
                    .unwrap_or_default();

                let values = older
                    .into_iter()
                    .zip(newer)
                    .map(|(old, new)| old.or(new))
                    .collect();

                let name = fused.fused_column(direction);
                debug!(station = %fused.station, column = %name, "Fused generations");
                table.insert_column(SensorColumn::new(name, values))?;
                fused_columns += 1;
            }
        }

        info!(fused_columns, "Generations merged");
        Ok(fused_columns)
    }
}
