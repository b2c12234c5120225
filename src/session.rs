use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use time::OffsetDateTime;

use crate::document::{Document, DocumentFormat, SourceDecl};
use crate::encoding::SourceDecoder;
use crate::journal::Journal;
use crate::position::{CanonicalColumns, merge_width};
use crate::prompt::Prompter;
use crate::reconcile::{self, CONTROLS_HELP, FileContext, FileOutcome, Reconciler};
use crate::report::{Sink, Tag};
use crate::store;
use crate::suggest::SuggestOptions;
use crate::table::TargetTable;
use crate::tabular;

const MERGED_FILE: &str = "combined.csv";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub document: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub decoder: SourceDecoder,
    pub suggest: SuggestOptions,
    pub snapshots: bool,
}

impl RunConfig {
    pub fn merged_path(&self) -> PathBuf {
        self.output_dir.join(MERGED_FILE)
    }

    pub fn journal(&self) -> Journal {
        Journal::in_dir(&self.output_dir)
    }
}

pub struct Workspace {
    pub document: Document,
    pub table: TargetTable,
    pub contexts: Vec<FileContext>,
    pub width: usize,
}

impl Workspace {
    pub fn context(&self, name: &str) -> Option<&FileContext> {
        self.contexts.iter().find(|ctx| ctx.name == name)
    }
}

pub fn prepare(config: &RunConfig, sink: &mut dyn Sink) -> Result<Workspace> {
    let mut document = Document::load(&config.document)?;

    let table = if document.records.is_empty() {
        load_target(config, &document.name, sink)?
    } else {
        let table = std::mem::take(&mut document.records);
        table
            .validate()
            .with_context(|| format!("checking target rows in {}", config.document.display()))?;
        table
    };

    let canonical = CanonicalColumns::from_header(table.header());
    let contexts: Vec<FileContext> = document
        .files
        .iter()
        .map(|decl| FileContext::build(decl, load_source(config, decl, sink), &canonical))
        .collect();
    let width = merge_width(contexts.iter().map(|ctx| &ctx.positions));

    Ok(Workspace {
        document,
        table,
        contexts,
        width,
    })
}

fn load_target(config: &RunConfig, name: &str, sink: &mut dyn Sink) -> Result<TargetTable> {
    let path = config.source_dir.join(name);
    let records = tabular::read_records(&path, &config.decoder)
        .with_context(|| format!("loading target table {}", path.display()))?;
    if records.decoded.had_errors {
        sink.warn(&format!("{name}: {}", records.decoded.describe()));
    }
    TargetTable::from_rows(records.rows)
        .with_context(|| format!("loading target table {}", path.display()))
}

fn load_source(config: &RunConfig, decl: &SourceDecl, sink: &mut dyn Sink) -> Vec<Vec<String>> {
    let path = config.source_dir.join(&decl.name);
    match tabular::read_records(&path, &config.decoder) {
        Ok(records) => {
            if records.decoded.had_errors {
                sink.warn(&format!("{}: {}", decl.name, records.decoded.describe()));
            }
            records.rows
        }
        Err(err) => {
            sink.warn(&format!("{err:#}; treating {} as empty", decl.name));
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub merged: usize,
    pub new_rows: usize,
    pub interrupted: bool,
    pub saved: bool,
}

impl RunSummary {
    fn absorb(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::SkippedFile => self.files_skipped += 1,
            other => {
                let stats = other.stats();
                self.files_processed += 1;
                self.merged += stats.merged;
                self.new_rows += stats.new_rows;
                self.interrupted |= other.stops_run();
            }
        }
    }
}

pub struct Persistence {
    document_path: PathBuf,
    format: DocumentFormat,
    merged_path: PathBuf,
    snapshots: bool,
}

impl Persistence {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            document_path: config.document.clone(),
            format: DocumentFormat::for_path(&config.document),
            merged_path: config.merged_path(),
            snapshots: config.snapshots,
        }
    }

    pub fn checkpoint(&self, document: &Document, sink: &mut dyn Sink) -> bool {
        match rendered("document", document.render(self.format), sink) {
            Some(bytes) => save(&self.document_path, &bytes, sink),
            None => false,
        }
    }

    pub fn finish(&self, document: &Document, sink: &mut dyn Sink, at: OffsetDateTime) -> bool {
        let stamp = store::snapshot_stamp(at);
        let outputs = [
            (
                &self.document_path,
                self.document_snapshot_base(),
                rendered("document", document.render(self.format), sink),
            ),
            (
                &self.merged_path,
                self.merged_path.clone(),
                rendered(
                    "merged table",
                    tabular::render_records(document.records.rows(), document.records.width()),
                    sink,
                ),
            ),
        ];

        let mut saved = true;
        for (path, snapshot_base, bytes) in outputs {
            let Some(bytes) = bytes else {
                saved = false;
                continue;
            };
            saved &= save(path, &bytes, sink);
            if self.snapshots {
                let snapshot = store::snapshot_path(&snapshot_base, &stamp);
                if snapshot.exists() {
                    sink.warn(&format!(
                        "{} already exists; keeping the earlier snapshot",
                        snapshot.display()
                    ));
                } else {
                    saved &= save(&snapshot, &bytes, sink);
                }
            }
        }
        saved
    }

    fn document_snapshot_base(&self) -> PathBuf {
        let name = self
            .document_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data.json"));
        self.merged_path
            .parent()
            .map(|dir| dir.join(&name))
            .unwrap_or(name)
    }
}

fn rendered(what: &str, result: Result<Vec<u8>>, sink: &mut dyn Sink) -> Option<Vec<u8>> {
    match result {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            sink.warn(&format!("failed to render the {what}: {err:#}"));
            None
        }
    }
}

fn save(path: &Path, bytes: &[u8], sink: &mut dyn Sink) -> bool {
    match store::write_via_temp(path, bytes) {
        Ok(()) => {
            sink.emit(Tag::Saved, &path.display().to_string());
            true
        }
        Err(err) => {
            sink.warn(&format!("failed to save {}: {err:#}", path.display()));
            false
        }
    }
}

pub fn run_merge(
    config: &RunConfig,
    prompter: &mut dyn Prompter,
    sink: &mut dyn Sink,
) -> Result<RunSummary> {
    let Workspace {
        mut document,
        table,
        contexts,
        width,
    } = prepare(config, sink)?;
    let ledger = std::mem::take(&mut document.ledger);
    let persistence = Persistence::new(config);
    let mut summary = RunSummary::default();

    let mut reconciler = Reconciler::new(table, ledger, width, config.suggest, prompter, sink)
        .with_journal(config.journal());

    for ctx in &contexts {
        ctx.report_mappings(reconciler.sink());
        reconciler.sink().info(CONTROLS_HELP);

        let outcome = reconciler.run(ctx)?;
        summary.absorb(outcome);
        if outcome == FileOutcome::SkippedFile {
            continue;
        }

        let line = outcome.stats().summary(&ctx.name);
        reconciler.sink().info(&line);
        document.records = reconciler.table().clone();
        document.ledger = reconciler.ledger().clone();
        persistence.checkpoint(&document, reconciler.sink());

        if outcome.stops_run() {
            break;
        }
    }

    let (table, ledger) = reconciler.into_parts();
    document.records = table;
    document.ledger = ledger;
    summary.saved = persistence.finish(&document, sink, OffsetDateTime::now_utc());
    if !summary.saved {
        sink.warn("not everything was saved; see the warnings above");
    }
    Ok(summary)
}

pub fn report_status(config: &RunConfig, sink: &mut dyn Sink) -> Result<()> {
    let workspace = prepare(config, sink)?;
    for ctx in &workspace.contexts {
        reconcile::report_progress(&workspace.document.ledger, ctx, sink);
    }
    Ok(())
}

pub fn report_missing(config: &RunConfig, file: &str, sink: &mut dyn Sink) -> Result<()> {
    let workspace = prepare(config, sink)?;
    let ctx = workspace.context(file).ok_or_else(|| {
        anyhow!(
            "{file} is not declared in {}",
            config.document.display()
        )
    })?;
    reconcile::report_progress(&workspace.document.ledger, ctx, sink);
    reconcile::report_missing(&workspace.document.ledger, ctx, sink);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::prompt::LinePrompter;
    use crate::report::MemorySink;
    use tempfile::{TempDir, tempdir};

    const DOCUMENT: &str = r#"{
        "name": "people.csv",
        "files": [
            {
                "name": "ldap.csv",
                "columns": {"cn": "Name", "mail": "Email"},
                "fuzz_columns": {"cn": "Name"}
            },
            {"name": "gone.csv", "columns": {"tel": "Phone"}}
        ]
    }"#;

    fn fixture() -> (TempDir, RunConfig) {
        let dir = tempdir().expect("temp dir");
        let sources = dir.path().join("csv");
        let output = dir.path().join("remapped");
        fs::create_dir_all(&sources).expect("source dir");
        fs::create_dir_all(&output).expect("output dir");
        fs::write(sources.join("people.csv"), "Name,Email,Phone\nAlice,,\nBob,,\n")
            .expect("target csv");
        fs::write(sources.join("ldap.csv"), "cn,mail\nAlice,a@x.com\nBobby,b@x.com\n")
            .expect("ldap csv");
        fs::write(output.join("data.json"), DOCUMENT).expect("document");

        let config = RunConfig {
            document: output.join("data.json"),
            source_dir: sources,
            output_dir: output,
            decoder: SourceDecoder::default(),
            suggest: SuggestOptions::default(),
            snapshots: true,
        };
        (dir, config)
    }

    fn run(config: &RunConfig, answers: &'static str) -> (Result<RunSummary>, MemorySink) {
        let mut prompter = LinePrompter::new(answers.as_bytes(), Vec::new());
        let mut sink = MemorySink::default();
        let result = run_merge(config, &mut prompter, &mut sink);
        (result, sink)
    }

    fn files_starting_with(dir: &Path, prefix: &str) -> usize {
        fs::read_dir(dir)
            .expect("list output")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
            .count()
    }

    // ldap.csv: three default answers, row 1 -> target row 2 (default yes),
    // row 2 -> target row 3 (explicit yes); gone.csv: three default answers.
    const FIRST_RUN: &str = "\n\n\n2\n\n3\ny\n\n\n\n";

    #[test]
    fn full_run_merges_and_persists_everything() {
        let (_dir, config) = fixture();
        let (result, sink) = run(&config, FIRST_RUN);
        let summary = result.expect("run succeeds");

        assert_eq!(summary.merged, 2);
        assert_eq!(summary.files_processed, 2);
        assert!(summary.saved);

        let merged = fs::read_to_string(config.merged_path()).expect("merged csv");
        assert_eq!(merged, "Name,Email,Phone\nAlice,a@x.com,\nBobby,b@x.com,\n");

        let document = Document::load(&config.document).expect("document reloads");
        assert_eq!(document.ledger.target_of("ldap.csv", 1), Some(2));
        assert_eq!(document.ledger.target_of("ldap.csv", 2), Some(3));
        assert_eq!(document.records.row(2).unwrap(), ["Bobby", "b@x.com", ""]);

        assert_eq!(files_starting_with(&config.output_dir, "combined-"), 1);
        assert_eq!(files_starting_with(&config.output_dir, "data-"), 1);
        assert_eq!(config.journal().read_recent(10).expect("journal").len(), 2);

        assert!(sink.messages(Tag::Warning).iter().any(|m| m.contains("gone.csv")));
        assert!(sink.count(Tag::Mapped) >= 3);
    }

    #[test]
    fn second_run_skips_rows_merged_before() {
        let (_dir, config) = fixture();
        run(&config, FIRST_RUN).0.expect("first run");

        let (result, sink) = run(&config, "\n\n\n\n\n\n");
        let summary = result.expect("second run");

        assert_eq!(summary.merged, 0);
        assert_eq!(sink.count(Tag::Skipped), 2);
        assert_eq!(sink.count(Tag::Editing), 0);
        let document = Document::load(&config.document).expect("document reloads");
        assert_eq!(document.records.len(), 3);
    }

    #[test]
    fn closed_input_still_saves_committed_rows() {
        let (_dir, config) = fixture();
        let (result, _sink) = run(&config, "\n\n\n2\n\n");
        let summary = result.expect("run ends cleanly");

        assert!(summary.interrupted);
        let document = Document::load(&config.document).expect("document reloads");
        assert!(document.ledger.has("ldap.csv", 1));
        assert!(!document.ledger.has("ldap.csv", 2));
        assert!(config.merged_path().exists());
    }

    #[test]
    fn missing_document_is_fatal() {
        let (_dir, mut config) = fixture();
        config.document = config.output_dir.join("absent.json");
        let (result, _sink) = run(&config, "");
        assert!(result.is_err());
    }

    #[test]
    fn unreadable_target_on_first_run_is_fatal() {
        let (_dir, config) = fixture();
        fs::remove_file(config.source_dir.join("people.csv")).expect("remove target");
        let (result, _sink) = run(&config, "");
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("loading target table"));
    }

    struct DiskCheckingPrompter {
        answers: std::vec::IntoIter<&'static str>,
        document: PathBuf,
        files_started: usize,
        saved_before_second_file: Option<Document>,
    }

    impl Prompter for DiskCheckingPrompter {
        fn ask(&mut self, question: &str) -> Result<Option<String>> {
            if question.starts_with("print missing records?") {
                self.files_started += 1;
                if self.files_started == 2 {
                    self.saved_before_second_file = Some(Document::load(&self.document)?);
                }
            }
            Ok(self.answers.next().map(str::to_string))
        }
    }

    #[test]
    fn document_is_saved_before_the_next_file_starts() {
        let (_dir, config) = fixture();
        let mut prompter = DiskCheckingPrompter {
            answers: vec!["", "", "", "2", "", "3", "y", "", "", ""].into_iter(),
            document: config.document.clone(),
            files_started: 0,
            saved_before_second_file: None,
        };
        let mut sink = MemorySink::default();
        run_merge(&config, &mut prompter, &mut sink).expect("run succeeds");

        let saved = prompter
            .saved_before_second_file
            .expect("second file was started");
        assert_eq!(saved.ledger.target_of("ldap.csv", 1), Some(2));
        assert_eq!(saved.ledger.target_of("ldap.csv", 2), Some(3));
        assert_eq!(saved.records.row(1).unwrap(), ["Alice", "a@x.com", ""]);
    }

    #[test]
    fn snapshots_from_the_same_instant_are_never_overwritten() {
        let (_dir, config) = fixture();
        let persistence = Persistence::new(&config);
        let at = OffsetDateTime::from_unix_timestamp(0).expect("epoch");
        let mut document = Document::load(&config.document).expect("document");

        document.records =
            TargetTable::from_rows(vec![vec!["Name".into()], vec!["first".into()]]).expect("rows");
        let mut sink = MemorySink::default();
        assert!(persistence.finish(&document, &mut sink, at));

        document.records =
            TargetTable::from_rows(vec![vec!["Name".into()], vec!["second".into()]]).expect("rows");
        let mut sink = MemorySink::default();
        persistence.finish(&document, &mut sink, at);

        let snapshot = config.output_dir.join("combined-19700101T000000000Z.csv");
        assert_eq!(fs::read_to_string(&snapshot).expect("snapshot"), "Name\nfirst\n");
        assert_eq!(
            fs::read_to_string(config.merged_path()).expect("merged"),
            "Name\nsecond\n"
        );
        let kept = sink
            .messages(Tag::Warning)
            .into_iter()
            .filter(|m| m.contains("keeping the earlier snapshot"))
            .count();
        assert_eq!(kept, 2);
    }

    #[test]
    fn failed_writes_warn_but_do_not_abort() {
        let (_dir, mut config) = fixture();
        let blocker = config.output_dir.join("blocked");
        fs::write(&blocker, "not a directory").expect("blocker file");
        config.output_dir = blocker;
        config.snapshots = false;

        let (result, sink) = run(&config, "\n\n\n\n\n\n\n");
        let summary = result.expect("run still completes");

        assert!(!summary.saved);
        assert!(
            sink.messages(Tag::Warning)
                .iter()
                .any(|m| m.starts_with("failed to save"))
        );
    }

    #[test]
    fn status_and_missing_reports_need_no_input() {
        let (_dir, config) = fixture();
        run(&config, FIRST_RUN).0.expect("first run");

        let mut sink = MemorySink::default();
        report_status(&config, &mut sink).expect("status");
        let info = sink.messages(Tag::Info);
        assert!(info[0].starts_with("100.00% records from ldap.csv"));
        assert!(info[1].starts_with("100.00% records from gone.csv"));

        let mut sink = MemorySink::default();
        report_missing(&config, "ldap.csv", &mut sink).expect("missing");
        assert_eq!(sink.count(Tag::Missing), 0);
        assert!(report_missing(&config, "nope.csv", &mut sink).is_err());
    }
}
