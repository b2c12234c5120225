use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetTable {
    rows: Vec<Vec<String>>,
}

impl TargetTable {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self> {
        let table = Self { rows };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let Some(header) = self.rows.first() else {
            bail!("target table has no header row");
        };
        if header.iter().all(|name| name.trim().is_empty()) {
            bail!("target table header is blank");
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    // Includes the header, so it is also the highest row an operator may pick.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn width(&self) -> usize {
        self.header().len()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, row)| (index, row.as_slice()))
    }

    pub fn field(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|fields| fields.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn push_empty(&mut self) -> usize {
        self.rows.push(Vec::new());
        self.rows.len() - 1
    }

    pub fn discard_empty_tail(&mut self) -> bool {
        if self.rows.len() > 1 && self.rows.last().is_some_and(|row| row.is_empty()) {
            self.rows.pop();
            return true;
        }
        false
    }

    pub fn working_row(&self, index: usize, width: usize) -> Vec<String> {
        let mut working = self.rows.get(index).cloned().unwrap_or_default();
        if working.len() < width {
            working.resize(width, String::new());
        }
        working
    }

    pub fn replace(&mut self, index: usize, row: Vec<String>) {
        if let Some(slot) = self.rows.get_mut(index) {
            *slot = row;
        }
    }
}

pub fn display_row(row: &[String]) -> String {
    if row.iter().all(|field| field.is_empty()) {
        return "(empty)".to_string();
    }
    row.join(", ")
}
