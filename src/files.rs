use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use globset::{Glob, GlobMatcher};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct SourceListing {
    pub path: PathBuf,
    pub name: String,
    pub len: u64,
}

pub fn list_sources(dir: &Path, pattern: &str) -> Result<Vec<SourceListing>> {
    let matcher = build_matcher(pattern)?;
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut listings = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        if !entry.file_type().is_file() || is_hidden(&entry) {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !matcher.is_match(&name) {
            continue;
        }
        let len = entry
            .metadata()
            .with_context(|| format!("metadata for {}", entry.path().display()))?
            .len();
        listings.push(SourceListing {
            path: entry.into_path(),
            name,
            len,
        });
    }
    Ok(listings)
}

fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|err| anyhow!("invalid file pattern '{pattern}': {err}"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
