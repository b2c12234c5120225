use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Target rows are 1-based, as shown to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressLedger {
    files: BTreeMap<String, BTreeMap<usize, usize>>,
}

impl ProgressLedger {
    pub fn is_empty(&self) -> bool {
        self.files.values().all(BTreeMap::is_empty)
    }

    pub fn has(&self, file: &str, source_row: usize) -> bool {
        self.target_of(file, source_row).is_some()
    }

    pub fn target_of(&self, file: &str, source_row: usize) -> Option<usize> {
        self.files.get(file)?.get(&source_row).copied()
    }

    pub fn record(&mut self, file: &str, source_row: usize, target_row: usize) {
        self.files
            .entry(file.to_string())
            .or_default()
            .insert(source_row, target_row);
    }

    pub fn missing(&self, file: &str, total_rows: usize) -> Vec<usize> {
        (1..total_rows)
            .filter(|row| !self.has(file, *row))
            .collect()
    }

    pub fn progress(&self, file: &str, total_rows: usize) -> Progress {
        let data_rows = total_rows.saturating_sub(1);
        let merged = self
            .files
            .get(file)
            .map(|rows| rows.range(1..total_rows.max(1)).count())
            .unwrap_or(0);
        Progress {
            merged,
            total: data_rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub merged: usize,
    pub total: usize,
}

impl Progress {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.merged)
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        100.0 * self.merged as f64 / self.total as f64
    }
}
