use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::ledger::ProgressLedger;
use crate::table::TargetTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDecl {
    pub name: String,
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fuzz_columns: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<SourceDecl>,
    #[serde(
        rename = "generated_records",
        default,
        skip_serializing_if = "TargetTable::is_empty"
    )]
    pub records: TargetTable,
    #[serde(
        rename = "generated_record_map",
        default,
        skip_serializing_if = "ProgressLedger::is_empty"
    )]
    pub ledger: ProgressLedger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn for_path(path: &Path) -> Self {
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        if is_yaml {
            DocumentFormat::Yaml
        } else {
            DocumentFormat::Json
        }
    }
}

impl Document {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("reading document {}", path.display()))?;
        Self::parse(&data, DocumentFormat::for_path(path))
            .with_context(|| format!("parsing document {}", path.display()))
    }

    pub fn parse(data: &[u8], format: DocumentFormat) -> Result<Self> {
        let document = match format {
            DocumentFormat::Json => serde_json::from_slice(data)?,
            DocumentFormat::Yaml => serde_yaml::from_slice(data)?,
        };
        Ok(document)
    }

    pub fn render(&self, format: DocumentFormat) -> Result<Vec<u8>> {
        match format {
            DocumentFormat::Json => {
                let mut out = Vec::new();
                let formatter = PrettyFormatter::with_indent(b"    ");
                let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
                self.serialize(&mut serializer)?;
                out.push(b'\n');
                Ok(out)
            }
            DocumentFormat::Yaml => Ok(serde_yaml::to_string(self)?.into_bytes()),
        }
    }
}
