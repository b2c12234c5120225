use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

mod document;
mod encoding;
mod files;
mod inspect;
mod journal;
mod ledger;
mod position;
mod prompt;
mod reconcile;
mod report;
mod session;
mod store;
mod suggest;
mod table;
mod tabular;
use encoding::SourceDecoder;
use journal::Journal;
use prompt::LinePrompter;
use report::{ColorChoice, ConsoleSink, Sink};
use session::{RunConfig, RunSummary};
use suggest::SuggestOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Merge(cmd) => handle_merge(cmd)?,
        Command::Status(cmd) => handle_status(cmd)?,
        Command::Missing(cmd) => handle_missing(cmd)?,
        Command::Columns(cmd) => handle_columns(cmd)?,
        Command::Log(cmd) => handle_log(cmd)?,
    }

    Ok(())
}

fn handle_merge(cmd: MergeCommand) -> Result<()> {
    let suggest = cmd.suggest_options()?;
    let config = cmd.common.run_config(suggest, !cmd.no_snapshot)?;
    let mut sink = ConsoleSink::new(cmd.common.color);
    let mut prompter = LinePrompter::stdio();

    let summary = session::run_merge(&config, &mut prompter, &mut sink)?;
    sink.info(&describe_summary(&summary));
    Ok(())
}

fn describe_summary(summary: &RunSummary) -> String {
    let mut line = format!(
        "run finished: files={}, skipped-files={}, merged={}, new-rows={}",
        summary.files_processed, summary.files_skipped, summary.merged, summary.new_rows
    );
    if summary.interrupted {
        line.push_str(" (input closed early)");
    }
    line
}

fn handle_status(cmd: StatusCommand) -> Result<()> {
    let config = cmd.common.run_config(SuggestOptions::default(), false)?;
    let mut sink = ConsoleSink::new(cmd.common.color);
    session::report_status(&config, &mut sink)
}

fn handle_missing(cmd: MissingCommand) -> Result<()> {
    let config = cmd.common.run_config(SuggestOptions::default(), false)?;
    let mut sink = ConsoleSink::new(cmd.common.color);
    session::report_missing(&config, &cmd.file, &mut sink)
}

fn handle_columns(cmd: ColumnsCommand) -> Result<()> {
    let decoder = SourceDecoder::new(cmd.encoding.as_deref())?;
    let mut sink = ConsoleSink::new(cmd.color);
    let mut prompter = LinePrompter::stdio();
    inspect::compare_columns(
        &cmd.source_dir,
        &cmd.pattern,
        &decoder,
        &mut prompter,
        &mut sink,
    )
}

fn handle_log(cmd: LogCommand) -> Result<()> {
    let journal = Journal::in_dir(&cmd.output_dir);
    let since = if let Some(ref raw) = cmd.since {
        let parsed = OffsetDateTime::parse(raw, &Rfc3339)
            .with_context(|| format!("parsing --since '{raw}' as RFC3339 timestamp"))?;
        Some(parsed)
    } else {
        None
    };

    let entries = journal.read_recent_since(cmd.tail, since)?;
    if entries.is_empty() {
        println!("merge log is empty.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "[{}] {:<8} {:<20} row {:>5} -> row {}",
            entry.timestamp,
            entry.action.label(),
            entry.file,
            entry.source_row + 1,
            entry.target_row
        );
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "remap",
    version,
    about = "Merge rows of several CSV exports into one table, one confirmed row at a time"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Merge(MergeCommand),
    Status(StatusCommand),
    Missing(MissingCommand),
    Columns(ColumnsCommand),
    Log(LogCommand),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    #[arg(
        long,
        value_name = "FILE",
        default_value = "remapped/data.json",
        value_hint = ValueHint::FilePath
    )]
    document: PathBuf,
    #[arg(
        long = "source-dir",
        value_name = "DIR",
        default_value = "csv",
        value_hint = ValueHint::DirPath
    )]
    source_dir: PathBuf,
    #[arg(long = "output-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,
    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,
}

impl CommonArgs {
    fn run_config(&self, suggest: SuggestOptions, snapshots: bool) -> Result<RunConfig> {
        Ok(RunConfig {
            document: self.document.clone(),
            source_dir: self.source_dir.clone(),
            output_dir: self.output_dir(),
            decoder: SourceDecoder::new(self.encoding.as_deref())?,
            suggest,
            snapshots,
        })
    }

    fn output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        document_dir(&self.document)
    }
}

fn document_dir(document: &Path) -> PathBuf {
    document
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Args)]
struct MergeCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long = "max-suggestions", default_value_t = 5)]
    max_suggestions: usize,
    #[arg(long = "min-score", default_value_t = 0.5)]
    min_score: f32,
    #[arg(long = "no-snapshot", action = ArgAction::SetTrue)]
    no_snapshot: bool,
}

impl MergeCommand {
    fn suggest_options(&self) -> Result<SuggestOptions> {
        if !(0.0..=1.0).contains(&self.min_score) {
            bail!("--min-score must be between 0 and 1, got {}", self.min_score);
        }
        Ok(SuggestOptions {
            limit: self.max_suggestions,
            min_score: self.min_score,
        })
    }
}

#[derive(Debug, Args)]
struct StatusCommand {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct MissingCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_name = "NAME")]
    file: String,
}

#[derive(Debug, Args)]
struct ColumnsCommand {
    #[arg(
        long = "source-dir",
        value_name = "DIR",
        default_value = "csv",
        value_hint = ValueHint::DirPath
    )]
    source_dir: PathBuf,
    #[arg(long, value_name = "GLOB", default_value = "*.csv")]
    pattern: String,
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,
    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Debug, Args)]
struct LogCommand {
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = "remapped",
        value_hint = ValueHint::DirPath
    )]
    output_dir: PathBuf,
    #[arg(long = "tail", default_value_t = 20)]
    tail: usize,
    #[arg(long = "since", value_name = "RFC3339")]
    since: Option<String>,
}
