use chrono::NaiveDateTime;
use serde::Deserialize;
use validator::Validate;

use crate::models::Direction;
use crate::utils::constants::MERGED_MARKER;
use crate::utils::datetime::deserialize_timestamp;

/// Legacy column name to canonical name.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct ColumnRename {
    #[validate(length(min = 1))]
    pub from: String,

    #[validate(length(min = 1))]
    pub to: String,
}

/// Composite column computed as the sum of existing columns.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct DerivedColumn {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub sum_of: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub rename: Vec<ColumnRename>,

    #[serde(default)]
    pub drop: Vec<String>,

    #[serde(default)]
    pub derived: Vec<DerivedColumn>,
}

/// Columns of a station whose sensor was installed after the export window began.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct InstallCutoff {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub cutoff: NaiveDateTime,

    #[validate(length(min = 1))]
    pub columns: Vec<String>,
}

/// One hardware generation of a logical station.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct Generation {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub in_column: String,

    #[validate(length(min = 1))]
    pub out_column: String,

    /// Finer sub-split channels voided together with the generation.
    #[serde(default)]
    pub auxiliary_columns: Vec<String>,
}

impl Generation {
    pub fn column(&self, direction: Direction) -> &str {
        match direction {
            Direction::In => &self.in_column,
            Direction::Out => &self.out_column,
        }
    }

    /// Every column voided when this generation is not authoritative.
    pub fn voided_columns(&self) -> impl Iterator<Item = &str> {
        [self.in_column.as_str(), self.out_column.as_str()]
            .into_iter()
            .chain(self.auxiliary_columns.iter().map(String::as_str))
    }
}

/// A logical station measured by an older and a newer generation.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct FusedStation {
    #[validate(length(min = 1))]
    pub station: String,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub cutover: NaiveDateTime,

    pub older: Generation,
    pub newer: Generation,
}

impl FusedStation {
    pub fn fused_column(&self, direction: Direction) -> String {
        format!("{} {} {}", self.station, MERGED_MARKER, direction.suffix())
    }
}
