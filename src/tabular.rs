use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::encoding::{DecodedSource, SourceDecoder};

pub struct SourceRecords {
    pub rows: Vec<Vec<String>>,
    pub decoded: DecodedSource,
}

pub fn read_records(path: &Path, decoder: &SourceDecoder) -> Result<SourceRecords> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded = decoder.decode(&bytes);
    let rows =
        parse_records(&decoded.text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(SourceRecords { rows, decoded })
}

pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

pub fn render_records(rows: &[Vec<String>], width: usize) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        let padding = width.saturating_sub(row.len());
        writer.write_record(
            row.iter()
                .map(String::as_str)
                .chain(std::iter::repeat_n("", padding)),
        )?;
    }

    writer
        .into_inner()
        .map_err(|err| anyhow!("flushing csv output: {}", err.error()))
}
