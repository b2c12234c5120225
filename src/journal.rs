use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const JOURNAL_FILE: &str = "merge_log.jsonl";
const MAX_ENTRIES: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeAction {
    Merged,
    NewRow,
}

impl MergeAction {
    pub fn label(self) -> &'static str {
        match self {
            MergeAction::Merged => "merged",
            MergeAction::NewRow => "new-row",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: String,
    pub file: String,
    pub source_row: usize,
    pub target_row: usize,
    pub action: MergeAction,
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(
        &self,
        file: &str,
        source_row: usize,
        target_row: usize,
        action: MergeAction,
    ) -> Result<()> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        let entry = JournalEntry {
            timestamp,
            file: file.to_string(),
            source_row,
            target_row,
            action,
        };
        let json = serde_json::to_string(&entry)?;
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(file, "{json}")?;
        truncate_journal(&self.path)?;
        Ok(())
    }

    pub fn read_recent(&self, tail: usize) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let lines = read_lines(&self.path)?;
        let start = lines.len().saturating_sub(tail);
        Ok(lines[start..]
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn read_recent_since(
        &self,
        tail: usize,
        since: Option<OffsetDateTime>,
    ) -> Result<Vec<JournalEntry>> {
        let mut entries = self.read_recent(tail)?;
        if let Some(min) = since {
            entries.retain(|entry| {
                OffsetDateTime::parse(&entry.timestamp, &Rfc3339).is_ok_and(|ts| ts >= min)
            });
        }
        Ok(entries)
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let lines = BufReader::new(file).lines().collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

fn truncate_journal(path: &Path) -> Result<()> {
    let lines = read_lines(path)?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}
