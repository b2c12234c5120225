use std::io;

use is_terminal::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Info,
    Mapped,
    Header,
    Skipped,
    Editing,
    Suggest,
    Found,
    Confirm,
    Inserted,
    Missing,
    Saved,
    Warning,
    Error,
}

impl Tag {
    pub fn label(self) -> &'static str {
        match self {
            Tag::Info => "INFO",
            Tag::Mapped => "MAPPED",
            Tag::Header => "HEADER",
            Tag::Skipped => "SKIPPED",
            Tag::Editing => "EDITING",
            Tag::Suggest => "SUGGEST",
            Tag::Found => "FOUND",
            Tag::Confirm => "CONFIRM",
            Tag::Inserted => "INSERTED",
            Tag::Missing => "MISSING",
            Tag::Saved => "SAVED",
            Tag::Warning => "WARNING",
            Tag::Error => "ERROR",
        }
    }

    fn ansi(self) -> &'static str {
        match self {
            Tag::Editing | Tag::Header => "1",
            Tag::Suggest | Tag::Found => "36",
            Tag::Inserted | Tag::Saved => "32",
            Tag::Warning | Tag::Confirm => "33",
            Tag::Error | Tag::Missing => "31",
            Tag::Info | Tag::Mapped | Tag::Skipped => "2",
        }
    }
}

pub trait Sink {
    fn emit(&mut self, tag: Tag, message: &str);

    fn info(&mut self, message: &str) {
        self.emit(Tag::Info, message);
    }

    fn warn(&mut self, message: &str) {
        self.emit(Tag::Warning, message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

pub struct ConsoleSink {
    colorize: bool,
}

impl ConsoleSink {
    pub fn new(color: ColorChoice) -> Self {
        Self {
            colorize: color.should_color(),
        }
    }
}

impl Sink for ConsoleSink {
    fn emit(&mut self, tag: Tag, message: &str) {
        let label = format!("{}:", tag.label());
        if self.colorize {
            println!("\x1b[{}m{label:<9}\x1b[0m {message}", tag.ansi());
        } else {
            println!("{label:<9} {message}");
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<(Tag, String)>,
}

#[cfg(test)]
impl MemorySink {
    pub fn count(&self, tag: Tag) -> usize {
        self.lines.iter().filter(|(t, _)| *t == tag).count()
    }

    pub fn messages(&self, tag: Tag) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(t, _)| *t == tag)
            .map(|(_, message)| message.as_str())
            .collect()
    }
}

#[cfg(test)]
impl Sink for MemorySink {
    fn emit(&mut self, tag: Tag, message: &str) {
        self.lines.push((tag, message.to_string()));
    }
}
