use std::path::Path;

use anyhow::{Context, Result};

use crate::encoding::SourceDecoder;
use crate::files::{self, SourceListing};
use crate::prompt::{self, Prompter};
use crate::report::Sink;
use crate::tabular;

const PICKS: usize = 2;

pub fn compare_columns(
    dir: &Path,
    pattern: &str,
    decoder: &SourceDecoder,
    prompter: &mut dyn Prompter,
    sink: &mut dyn Sink,
) -> Result<()> {
    let listings = files::list_sources(dir, pattern)?;
    if listings.is_empty() {
        sink.info(&format!(
            "no files matching '{pattern}' in {}",
            dir.display()
        ));
        return Ok(());
    }

    sink.info("here are the files:");
    for (index, listing) in listings.iter().enumerate() {
        sink.info(&format!("{index}: {} ({} bytes)", listing.name, listing.len));
    }

    let mut picked: Vec<&SourceListing> = Vec::with_capacity(PICKS);
    for ordinal in 1..=PICKS {
        let question = format!("pick file {ordinal} of {PICKS}");
        let Some(index) = prompt::ask_index(prompter, &question, listings.len())? else {
            return Ok(());
        };
        picked.push(&listings[index]);
    }

    for listing in picked {
        print_columns(listing, decoder, sink)?;
    }
    Ok(())
}

fn print_columns(listing: &SourceListing, decoder: &SourceDecoder, sink: &mut dyn Sink) -> Result<()> {
    let records = tabular::read_records(&listing.path, decoder)
        .with_context(|| format!("reading header of {}", listing.name))?;
    let Some(header) = records.rows.first() else {
        sink.warn(&format!("{} is empty", listing.name));
        return Ok(());
    };
    for (index, column) in header.iter().enumerate() {
        sink.info(&format!("{} {index}: {column}", listing.name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::prompt::LinePrompter;
    use crate::report::{MemorySink, Tag};
    use tempfile::tempdir;

    #[test]
    fn prints_columns_of_both_picks() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("hr.csv"), "id,phone\n1,555\n").expect("hr");
        fs::write(dir.path().join("ldap.csv"), "cn,mail\n").expect("ldap");
        let mut prompter = LinePrompter::new("1\n7\n0\n".as_bytes(), Vec::new());
        let mut sink = MemorySink::default();

        compare_columns(
            dir.path(),
            "*.csv",
            &SourceDecoder::default(),
            &mut prompter,
            &mut sink,
        )
        .expect("inspects");

        let info = sink.messages(Tag::Info);
        assert!(info.contains(&"0: hr.csv (15 bytes)"));
        let columns: Vec<_> = info
            .iter()
            .filter(|line| line.contains(".csv ") && !line.contains("bytes"))
            .copied()
            .collect();
        assert_eq!(
            columns,
            vec!["ldap.csv 0: cn", "ldap.csv 1: mail", "hr.csv 0: id", "hr.csv 1: phone"]
        );
    }

    #[test]
    fn empty_directory_asks_nothing() {
        let dir = tempdir().expect("temp dir");
        let mut prompter = LinePrompter::new("".as_bytes(), Vec::new());
        let mut sink = MemorySink::default();
        compare_columns(
            dir.path(),
            "*.csv",
            &SourceDecoder::default(),
            &mut prompter,
            &mut sink,
        )
        .expect("inspects");
        assert!(sink.messages(Tag::Info)[0].starts_with("no files matching"));
    }
}
