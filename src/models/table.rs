use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{ProcessingError, Result};
use crate::models::RawObservation;

/// One nullable count series, aligned with the owning table's timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl SensorColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn non_null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Wide hourly table: one row per timestamp, one column per sensor channel.
///
/// Rows are kept in insertion order until [`SensorTable::sort_by_timestamp`]
/// runs, so the time corrector can see the raw export order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorTable {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<SensorColumn>,
}

impl SensorTable {
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    pub fn with_columns(timestamps: Vec<NaiveDateTime>, columns: Vec<SensorColumn>) -> Result<Self> {
        let mut table = Self::new(timestamps);
        for column in columns {
            table.insert_column(column)?;
        }
        Ok(table)
    }

    /// Pivot long-format observations into a sorted wide table.
    pub fn from_observations<I>(observations: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawObservation>,
    {
        let mut column_order: Vec<String> = Vec::new();
        let mut cells: BTreeMap<NaiveDateTime, HashMap<String, Option<f64>>> = BTreeMap::new();

        for observation in observations {
            if !column_order.contains(&observation.column) {
                column_order.push(observation.column.clone());
            }

            let row = cells.entry(observation.timestamp).or_default();
            if row
                .insert(observation.column.clone(), observation.count)
                .is_some()
            {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Duplicate observation for '{}' at {}",
                    observation.column, observation.timestamp
                )));
            }
        }

        let timestamps: Vec<NaiveDateTime> = cells.keys().copied().collect();
        let columns = column_order
            .into_iter()
            .map(|name| {
                let values = cells
                    .values()
                    .map(|row| row.get(&name).copied().flatten())
                    .collect();
                SensorColumn::new(name, values)
            })
            .collect();

        Self::with_columns(timestamps, columns)
    }

    /// Long-format view of every cell, row-major.
    pub fn observations(&self) -> impl Iterator<Item = RawObservation> + '_ {
        self.timestamps
            .iter()
            .enumerate()
            .flat_map(move |(row, timestamp)| {
                self.columns.iter().map(move |column| RawObservation {
                    timestamp: *timestamp,
                    column: column.name.clone(),
                    count: column.values[row],
                })
            })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[SensorColumn] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [SensorColumn] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&SensorColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut SensorColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Index of a column the configuration depends on.
    pub fn require_column(&self, name: &str, context: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| ProcessingError::missing_column(name, context))
    }

    pub fn insert_column(&mut self, column: SensorColumn) -> Result<()> {
        if column.values.len() != self.timestamps.len() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Column '{}' has {} values but the table has {} rows",
                column.name,
                column.values.len(),
                self.timestamps.len()
            )));
        }
        if self.contains_column(&column.name) {
            return Err(ProcessingError::InvalidFormat(format!(
                "Column '{}' already exists",
                column.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<SensorColumn> {
        self.column_index(name).map(|idx| self.columns.remove(idx))
    }

    /// Rename a column in place. Returns false when `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<bool> {
        if from == to {
            return Ok(self.contains_column(from));
        }
        if self.contains_column(to) && self.contains_column(from) {
            return Err(ProcessingError::InvalidFormat(format!(
                "Cannot rename '{}' to '{}': target column already exists",
                from, to
            )));
        }
        match self.column_mut(from) {
            Some(column) => {
                column.name = to.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn row_values(&self, row: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|c| c.values[row]).collect()
    }

    pub fn set_row_values(&mut self, row: usize, values: &[Option<f64>]) {
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.values[row] = *value;
        }
    }

    pub fn set_timestamp(&mut self, row: usize, timestamp: NaiveDateTime) {
        self.timestamps[row] = timestamp;
    }

    /// Null every value of column `idx` whose row timestamp satisfies `predicate`.
    /// Returns how many non-null values were voided.
    pub fn void_where<F>(&mut self, idx: usize, predicate: F) -> usize
    where
        F: Fn(NaiveDateTime) -> bool,
    {
        let timestamps = &self.timestamps;
        let column = &mut self.columns[idx];
        let mut voided = 0;

        for (value, timestamp) in column.values.iter_mut().zip(timestamps) {
            if predicate(*timestamp) && value.take().is_some() {
                voided += 1;
            }
        }

        voided
    }

    /// Stable sort of all rows by timestamp.
    pub fn sort_by_timestamp(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);

        if order.iter().enumerate().all(|(pos, &i)| pos == i) {
            return;
        }

        self.timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }

    /// Keep only rows whose timestamp satisfies `predicate`. Returns the number removed.
    pub fn retain_rows<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(NaiveDateTime) -> bool,
    {
        let keep: Vec<bool> = self.timestamps.iter().map(|t| predicate(*t)).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }

        let mut flags = keep.iter();
        self.timestamps.retain(|_| *flags.next().unwrap_or(&false));
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.values.retain(|_| *flags.next().unwrap_or(&false));
        }

        removed
    }

    /// Row-wise concatenation over the union of columns, in first-seen order.
    pub fn concat(tables: Vec<SensorTable>) -> SensorTable {
        let mut names: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !names.contains(&column.name) {
                    names.push(column.name.clone());
                }
            }
        }

        let total_rows = tables.iter().map(|t| t.len()).sum();
        let mut timestamps = Vec::with_capacity(total_rows);
        let mut columns: Vec<SensorColumn> = names
            .iter()
            .map(|name| SensorColumn::new(name.clone(), Vec::with_capacity(total_rows)))
            .collect();

        for table in tables {
            let rows = table.len();
            timestamps.extend(table.timestamps);

            let mut by_name: HashMap<String, Vec<Option<f64>>> = table
                .columns
                .into_iter()
                .map(|c| (c.name, c.values))
                .collect();

            for column in &mut columns {
                match by_name.remove(&column.name) {
                    Some(values) => column.values.extend(values),
                    None => column.values.extend(std::iter::repeat(None).take(rows)),
                }
            }
        }

        SensorTable {
            timestamps,
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_insert_rejects_length_mismatch() {
        let mut table = SensorTable::new(vec![hour(0), hour(1)]);
        assert!(table
            .insert_column(SensorColumn::new("Gfäll IN", vec![Some(1.0)]))
            .is_err());
        assert!(table
            .insert_column(SensorColumn::new("Gfäll IN", vec![Some(1.0), None]))
            .is_ok());
        assert!(table
            .insert_column(SensorColumn::new("Gfäll IN", vec![None, None]))
            .is_err());
    }

    #[test]
    fn test_sort_moves_values_with_timestamps() {
        let mut table = SensorTable::with_columns(
            vec![hour(2), hour(0), hour(1)],
            vec![SensorColumn::new("A IN", vec![Some(2.0), Some(0.0), Some(1.0)])],
        )
        .unwrap();

        table.sort_by_timestamp();

        assert_eq!(table.timestamps(), &[hour(0), hour(1), hour(2)]);
        assert_eq!(
            table.column("A IN").unwrap().values,
            vec![Some(0.0), Some(1.0), Some(2.0)]
        );
    }

    #[test]
    fn test_concat_fills_missing_columns_with_null() {
        let first = SensorTable::with_columns(
            vec![hour(0)],
            vec![SensorColumn::new("A IN", vec![Some(1.0)])],
        )
        .unwrap();
        let second = SensorTable::with_columns(
            vec![hour(1)],
            vec![SensorColumn::new("B IN", vec![Some(5.0)])],
        )
        .unwrap();

        let combined = SensorTable::concat(vec![first, second]);

        assert_eq!(combined.len(), 2);
        assert_eq!(combined.column_names(), vec!["A IN", "B IN"]);
        assert_eq!(combined.column("A IN").unwrap().values, vec![Some(1.0), None]);
        assert_eq!(combined.column("B IN").unwrap().values, vec![None, Some(5.0)]);
    }

    #[test]
    fn test_observation_pivot() {
        let observations = vec![
            RawObservation::new(hour(1), "A IN", Some(3.0)),
            RawObservation::new(hour(0), "A IN", Some(1.0)),
            RawObservation::new(hour(0), "A OUT", None),
        ];

        let table = SensorTable::from_observations(observations).unwrap();

        assert_eq!(table.timestamps(), &[hour(0), hour(1)]);
        assert_eq!(table.column("A IN").unwrap().values, vec![Some(1.0), Some(3.0)]);
        assert_eq!(table.column("A OUT").unwrap().values, vec![None, None]);
        assert_eq!(table.observations().count(), 4);
    }

    #[test]
    fn test_duplicate_observation_rejected() {
        let observations = vec![
            RawObservation::new(hour(0), "A IN", Some(1.0)),
            RawObservation::new(hour(0), "A IN", Some(2.0)),
        ];
        assert!(SensorTable::from_observations(observations).is_err());
    }

    #[test]
    fn test_void_and_retain() {
        let mut table = SensorTable::with_columns(
            vec![hour(0), hour(1), hour(2)],
            vec![SensorColumn::new("A IN", vec![Some(1.0), None, Some(3.0)])],
        )
        .unwrap();

        let voided = table.void_where(0, |t| t <= hour(1));
        assert_eq!(voided, 1);

        let removed = table.retain_rows(|t| t >= hour(1));
        assert_eq!(removed, 1);
        assert_eq!(table.column("A IN").unwrap().values, vec![None, Some(3.0)]);
    }
}
