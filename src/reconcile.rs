use anyhow::{Result, anyhow, bail};
use regex::Regex;

use crate::document::SourceDecl;
use crate::journal::{Journal, MergeAction};
use crate::ledger::ProgressLedger;
use crate::position::{CanonicalColumns, PositionMap};
use crate::prompt::{self, Decision, Prompter};
use crate::report::{Sink, Tag};
use crate::suggest::{self, SuggestOptions};
use crate::table::{TargetTable, display_row};

const CHOICE_PROMPT: &str = "Choose row to insert into";
const SEARCH_LIMIT: usize = 20;

pub const CONTROLS_HELP: &str = "When choosing a row to insert, press enter to skip, -2 to go back, \
     -3 for a new row, -4 to skip the rest of the file and save, /text to search target rows";

#[derive(Debug, Clone)]
pub struct FileContext {
    pub name: String,
    pub rows: Vec<Vec<String>>,
    pub positions: PositionMap,
    pub fuzzy: PositionMap,
}

impl FileContext {
    pub fn build(
        decl: &SourceDecl,
        rows: Vec<Vec<String>>,
        canonical: &CanonicalColumns,
    ) -> Self {
        let header = rows.first().map(Vec::as_slice).unwrap_or(&[]);
        let positions = PositionMap::derive(canonical, header, &decl.columns);
        let fuzzy = PositionMap::derive(canonical, header, &decl.fuzz_columns);
        Self {
            name: decl.name.clone(),
            rows,
            positions,
            fuzzy,
        }
    }

    pub fn report_mappings(&self, sink: &mut dyn Sink) {
        for column in self.positions.columns() {
            sink.emit(
                Tag::Mapped,
                &format!(
                    "{}: {} -> {} ({} -> {})",
                    self.name,
                    column.source_name,
                    column.target_name,
                    column.source_index,
                    column.target_index
                ),
            );
        }
        for column in self.fuzzy.columns() {
            sink.emit(
                Tag::Mapped,
                &format!(
                    "{}: fuzzy suggest {} -> {} ({} -> {})",
                    self.name,
                    column.source_name,
                    column.target_name,
                    column.source_index,
                    column.target_index
                ),
            );
        }
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub merged: usize,
    pub skipped: usize,
    pub already: usize,
    pub new_rows: usize,
}

impl FileStats {
    pub fn summary(&self, name: &str) -> String {
        format!(
            "{name} summary: merged={}, skipped={}, already={}, new-rows={}",
            self.merged, self.skipped, self.already, self.new_rows
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    SkippedFile,
    Completed(FileStats),
    Aborted(FileStats),
    InputClosed(FileStats),
}

impl FileOutcome {
    pub fn stops_run(&self) -> bool {
        matches!(self, FileOutcome::InputClosed(_))
    }

    pub fn stats(&self) -> FileStats {
        match self {
            FileOutcome::SkippedFile => FileStats::default(),
            FileOutcome::Completed(stats)
            | FileOutcome::Aborted(stats)
            | FileOutcome::InputClosed(stats) => *stats,
        }
    }
}

enum MergeResult {
    Written,
    NothingMapped,
    Declined,
    Closed,
}

// Returns the number of fields written; with none, the target row is untouched.
pub fn merge_row(
    table: &mut TargetTable,
    source: &[String],
    positions: &PositionMap,
    target: usize,
    width: usize,
) -> usize {
    let mut working = table.working_row(target, width);
    let mut written = 0;
    for (source_index, value) in source.iter().enumerate() {
        let Some(target_index) = positions.target_of(source_index) else {
            continue;
        };
        if working.len() <= target_index {
            working.resize(target_index + 1, String::new());
        }
        working[target_index] = value.clone();
        written += 1;
    }
    if written > 0 {
        table.replace(target, working);
    }
    written
}

pub fn report_progress(ledger: &ProgressLedger, ctx: &FileContext, sink: &mut dyn Sink) {
    let progress = ledger.progress(&ctx.name, ctx.total_rows());
    sink.info(&format!(
        "{:.2}% records from {} have been imported, there are {} records missing",
        progress.percent(),
        ctx.name,
        progress.remaining()
    ));
}

pub fn report_missing(ledger: &ProgressLedger, ctx: &FileContext, sink: &mut dyn Sink) {
    for row in ledger.missing(&ctx.name, ctx.total_rows()) {
        sink.emit(
            Tag::Missing,
            &format!("row {}: {}", row + 1, ctx.rows[row].join(", ")),
        );
    }
}

pub struct Reconciler<'a> {
    table: TargetTable,
    ledger: ProgressLedger,
    width: usize,
    suggest: SuggestOptions,
    journal: Option<Journal>,
    prompter: &'a mut dyn Prompter,
    sink: &'a mut dyn Sink,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        table: TargetTable,
        ledger: ProgressLedger,
        width: usize,
        suggest: SuggestOptions,
        prompter: &'a mut dyn Prompter,
        sink: &'a mut dyn Sink,
    ) -> Self {
        Self {
            table,
            ledger,
            width,
            suggest,
            journal: None,
            prompter,
            sink,
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn table(&self) -> &TargetTable {
        &self.table
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn sink(&mut self) -> &mut dyn Sink {
        &mut *self.sink
    }

    pub fn into_parts(self) -> (TargetTable, ProgressLedger) {
        (self.table, self.ledger)
    }

    pub fn report_progress(&mut self, ctx: &FileContext) {
        report_progress(&self.ledger, ctx, self.sink);
    }

    pub fn report_missing(&mut self, ctx: &FileContext) {
        report_missing(&self.ledger, ctx, self.sink);
    }

    pub fn run(&mut self, ctx: &FileContext) -> Result<FileOutcome> {
        self.report_progress(ctx);

        let Some(print_missing) =
            prompt::ask_confirm(self.prompter, "print missing records?", false)?
        else {
            return Ok(FileOutcome::InputClosed(FileStats::default()));
        };
        if print_missing {
            self.report_missing(ctx);
        }

        let Some(skip_file) = prompt::ask_confirm(self.prompter, "skip this file?", false)? else {
            return Ok(FileOutcome::InputClosed(FileStats::default()));
        };
        if skip_file {
            return Ok(FileOutcome::SkippedFile);
        }

        let Some(skip_merged) =
            prompt::ask_confirm(self.prompter, "skip already added records?", true)?
        else {
            return Ok(FileOutcome::InputClosed(FileStats::default()));
        };

        self.run_rows(ctx, skip_merged)
    }

    pub fn run_rows(&mut self, ctx: &FileContext, skip_merged: bool) -> Result<FileOutcome> {
        let mut stats = FileStats::default();
        if let Some(header) = ctx.rows.first() {
            self.sink.emit(Tag::Header, &header.join(", "));
        }

        let mut cursor = 1;
        // Set when the row at `cursor` must be offered even if already merged:
        // after a back step or when the same row is asked again.
        let mut reoffer = false;

        while cursor < ctx.rows.len() {
            let source = &ctx.rows[cursor];

            if skip_merged && !reoffer && self.ledger.has(&ctx.name, cursor) {
                self.sink.emit(Tag::Skipped, &source.join(", "));
                stats.already += 1;
                cursor += 1;
                continue;
            }
            reoffer = false;

            self.sink.emit(Tag::Editing, &source.join(", "));
            self.show_suggestions(ctx, source);

            let Some(decision) = prompt::ask_decision(self.prompter, CHOICE_PROMPT)? else {
                self.sink.warn("input closed; stopping after saving progress");
                return Ok(FileOutcome::InputClosed(stats));
            };

            match decision {
                Decision::Skip => {
                    stats.skipped += 1;
                    cursor += 1;
                }
                Decision::Back => {
                    cursor = cursor.saturating_sub(1).max(1);
                    reoffer = true;
                }
                Decision::AbortFile => return Ok(FileOutcome::Aborted(stats)),
                Decision::Search(pattern) => {
                    self.search(&pattern);
                    reoffer = true;
                }
                Decision::Invalid(raw) => {
                    self.sink.emit(
                        Tag::Error,
                        &format!("'{raw}' is not a row number; choose again"),
                    );
                    reoffer = true;
                }
                Decision::NewRow => {
                    let target = self.table.push_empty();
                    match self.confirm_and_merge(ctx, cursor, target, MergeAction::NewRow)? {
                        MergeResult::Written => {
                            stats.merged += 1;
                            stats.new_rows += 1;
                            cursor += 1;
                        }
                        MergeResult::NothingMapped => {
                            self.table.discard_empty_tail();
                            stats.skipped += 1;
                            cursor += 1;
                        }
                        MergeResult::Declined => {
                            self.table.discard_empty_tail();
                            reoffer = true;
                        }
                        MergeResult::Closed => {
                            self.table.discard_empty_tail();
                            return Ok(FileOutcome::InputClosed(stats));
                        }
                    }
                }
                Decision::InsertAt(row) => {
                    if let Err(err) = self.check_target(row) {
                        self.sink.emit(Tag::Error, &err.to_string());
                        reoffer = true;
                        continue;
                    }
                    match self.confirm_and_merge(ctx, cursor, row - 1, MergeAction::Merged)? {
                        MergeResult::Written => {
                            stats.merged += 1;
                            cursor += 1;
                        }
                        MergeResult::NothingMapped => {
                            stats.skipped += 1;
                            cursor += 1;
                        }
                        MergeResult::Declined => reoffer = true,
                        MergeResult::Closed => return Ok(FileOutcome::InputClosed(stats)),
                    }
                }
            }
        }

        Ok(FileOutcome::Completed(stats))
    }

    fn check_target(&self, row: usize) -> Result<()> {
        if row > self.table.len() {
            bail!("{row} is greater than the allowed {}", self.table.len());
        }
        if row == 1 {
            bail!("row 1 is the header and cannot be merged into");
        }
        Ok(())
    }

    fn confirm_and_merge(
        &mut self,
        ctx: &FileContext,
        source_row: usize,
        target: usize,
        action: MergeAction,
    ) -> Result<MergeResult> {
        let current = self.table.row(target).unwrap_or(&[]);
        self.sink.emit(
            Tag::Confirm,
            &format!("row {}: {}", target + 1, display_row(current)),
        );
        match prompt::ask_confirm(self.prompter, "Confirm insert?", true)? {
            None => return Ok(MergeResult::Closed),
            Some(false) => return Ok(MergeResult::Declined),
            Some(true) => {}
        }

        let source = &ctx.rows[source_row];
        let written = merge_row(&mut self.table, source, &ctx.positions, target, self.width);
        if written == 0 {
            self.sink.warn(&format!(
                "{} row {} has no mapped columns; nothing was written",
                ctx.name,
                source_row + 1
            ));
            return Ok(MergeResult::NothingMapped);
        }

        self.ledger.record(&ctx.name, source_row, target + 1);
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.record(&ctx.name, source_row, target + 1, action) {
                self.sink.warn(&format!(
                    "failed to append to {}: {err:#}",
                    journal.path().display()
                ));
            }
        }

        let merged = self.table.row(target).unwrap_or(&[]);
        self.sink.emit(
            Tag::Inserted,
            &format!("row {}: {}", target + 1, display_row(merged)),
        );
        Ok(MergeResult::Written)
    }

    fn show_suggestions(&mut self, ctx: &FileContext, source: &[String]) {
        let sets = suggest::for_row(&self.table, source, &ctx.fuzzy, &self.suggest);
        for set in sets {
            for suggestion in set.suggestions {
                let row = self.table.row(suggestion.row).unwrap_or(&[]);
                self.sink.emit(
                    Tag::Suggest,
                    &format!(
                        "Row {} for {} ({:.2}): {}",
                        suggestion.row + 1,
                        suggestion.value,
                        suggestion.score,
                        row.join(", ")
                    ),
                );
            }
        }
    }

    fn search(&mut self, pattern: &str) {
        let regex = match build_search(pattern) {
            Ok(regex) => regex,
            Err(err) => {
                self.sink.emit(Tag::Error, &err.to_string());
                return;
            }
        };
        let hits: Vec<(usize, String)> = self
            .table
            .data_rows()
            .filter(|(_, row)| row.iter().any(|field| regex.is_match(field)))
            .take(SEARCH_LIMIT)
            .map(|(index, row)| (index, row.join(", ")))
            .collect();
        if hits.is_empty() {
            self.sink.info(&format!("no target rows match '{pattern}'"));
            return;
        }
        for (index, row) in hits {
            self.sink.emit(Tag::Found, &format!("Row {}: {row}", index + 1));
        }
    }
}

fn build_search(pattern: &str) -> Result<Regex> {
    if let Some(rest) = pattern.strip_prefix("re:") {
        let trimmed = rest.trim();
        if trimmed.is_empty() {
            bail!("regex pattern cannot be empty");
        }
        return Regex::new(trimmed).map_err(|err| anyhow!("invalid regex: {err}"));
    }
    if pattern.is_empty() {
        bail!("search text cannot be empty");
    }
    Regex::new(&format!("(?i){}", regex::escape(pattern)))
        .map_err(|err| anyhow!("unable to build search: {err}"))
}
