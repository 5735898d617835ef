use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Maximal run of rows sharing one working-sensor count. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub working_sensors: u32,
    pub start: usize,
    pub end: usize,
    pub normalized: bool,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}
