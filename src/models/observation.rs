use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::constants::{DIRECTION_IN, DIRECTION_OUT};

/// A single hourly count from one physical sensor channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub timestamp: NaiveDateTime,
    pub column: String,
    pub count: Option<f64>,
}

impl RawObservation {
    pub fn new(timestamp: NaiveDateTime, column: impl Into<String>, count: Option<f64>) -> Self {
        Self {
            timestamp,
            column: column.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Direction of a channel, judged by its trailing `IN` / `OUT`.
    pub fn of_column(name: &str) -> Option<Self> {
        let trimmed = name.trim_end();
        if ends_with_word(trimmed, DIRECTION_OUT) {
            Some(Direction::Out)
        } else if ends_with_word(trimmed, DIRECTION_IN) {
            Some(Direction::In)
        } else {
            None
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::In => DIRECTION_IN,
            Direction::Out => DIRECTION_OUT,
        }
    }
}

fn ends_with_word(name: &str, word: &str) -> bool {
    name.strip_suffix(word)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with(char::is_whitespace))
}

/// Logical station a channel belongs to: the column name without its direction.
pub fn station_of_column(name: &str) -> &str {
    let trimmed = name.trim_end();
    match Direction::of_column(trimmed) {
        Some(direction) => trimmed[..trimmed.len() - direction.suffix().len()].trim_end(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_column() {
        assert_eq!(Direction::of_column("Lusen 2 IN"), Some(Direction::In));
        assert_eq!(Direction::of_column("Bucina MERGED OUT"), Some(Direction::Out));
        assert_eq!(Direction::of_column("Racheldiensthütte Fahrräder"), None);
        assert_eq!(Direction::of_column("Gsenget IN.1"), None);
        assert_eq!(Direction::of_column("BERGWALDCABIN"), None);
    }

    #[test]
    fn test_station_of_column() {
        assert_eq!(station_of_column("Lusen 2 IN"), "Lusen 2");
        assert_eq!(station_of_column("Falkenstein 1 MERGED OUT"), "Falkenstein 1 MERGED");
        assert_eq!(station_of_column("Schwarzbachbrücke"), "Schwarzbachbrücke");
    }
}
