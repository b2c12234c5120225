use std::io::{self, BufRead, Stdin, Stdout, Write};

use anyhow::{Context, Result};

pub trait Prompter {
    fn ask(&mut self, question: &str) -> Result<Option<String>>;
}

pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompter<io::StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        let bytes = self
            .input
            .read_line(&mut line)
            .context("reading operator input")?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Back,
    NewRow,
    AbortFile,
    InsertAt(usize),
    Search(String),
    Invalid(String),
}

impl Decision {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Decision::Skip;
        }
        if let Some(pattern) = trimmed.strip_prefix('/') {
            return Decision::Search(pattern.trim().to_string());
        }
        match trimmed.parse::<i64>() {
            Ok(-2) => Decision::Back,
            Ok(-3) => Decision::NewRow,
            Ok(-4) => Decision::AbortFile,
            Ok(value) if value > 0 => usize::try_from(value)
                .map(Decision::InsertAt)
                .unwrap_or_else(|_| Decision::Invalid(trimmed.to_string())),
            _ => Decision::Invalid(trimmed.to_string()),
        }
    }
}

pub fn ask_decision(prompter: &mut dyn Prompter, message: &str) -> Result<Option<Decision>> {
    Ok(prompter
        .ask(&format!("{message}: "))?
        .map(|answer| Decision::parse(&answer)))
}

pub fn ask_index(
    prompter: &mut dyn Prompter,
    message: &str,
    bound: usize,
) -> Result<Option<usize>> {
    loop {
        let Some(answer) = prompter.ask(&format!("{message}: "))? else {
            return Ok(None);
        };
        match answer.trim().parse::<usize>() {
            Ok(index) if index < bound => return Ok(Some(index)),
            _ => println!("Please enter a number from 0 to {}.", bound.saturating_sub(1)),
        }
    }
}

pub fn ask_confirm(
    prompter: &mut dyn Prompter,
    message: &str,
    default_yes: bool,
) -> Result<Option<bool>> {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    loop {
        let Some(answer) = prompter.ask(&format!("{message} {hint}: "))? else {
            return Ok(None);
        };
        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(Some(default_yes)),
            "y" | "yes" => return Ok(Some(true)),
            "n" | "no" => return Ok(Some(false)),
            _ => println!("Please enter y or n."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(answers: &'static str) -> LinePrompter<&'static [u8], Vec<u8>> {
        LinePrompter::new(answers.as_bytes(), Vec::new())
    }

    #[test]
    fn decisions_decode_once() {
        assert_eq!(Decision::parse(""), Decision::Skip);
        assert_eq!(Decision::parse("   "), Decision::Skip);
        assert_eq!(Decision::parse("-2"), Decision::Back);
        assert_eq!(Decision::parse("-3"), Decision::NewRow);
        assert_eq!(Decision::parse("-4"), Decision::AbortFile);
        assert_eq!(Decision::parse(" 12 "), Decision::InsertAt(12));
        assert_eq!(Decision::parse("/smith"), Decision::Search("smith".into()));
    }

    #[test]
    fn unusable_numbers_are_invalid_not_skips() {
        assert_eq!(Decision::parse("-1"), Decision::Invalid("-1".into()));
        assert_eq!(Decision::parse("0"), Decision::Invalid("0".into()));
        assert_eq!(Decision::parse("-7"), Decision::Invalid("-7".into()));
        assert_eq!(Decision::parse("row 3"), Decision::Invalid("row 3".into()));
    }

    #[test]
    fn confirm_blank_takes_stated_default() {
        let mut prompter = scripted("\n\n");
        assert_eq!(ask_confirm(&mut prompter, "ok?", true).unwrap(), Some(true));
        assert_eq!(ask_confirm(&mut prompter, "ok?", false).unwrap(), Some(false));
    }

    #[test]
    fn confirm_asks_again_on_unrecognised_answer() {
        let mut prompter = scripted("maybe\nN\n");
        assert_eq!(ask_confirm(&mut prompter, "ok?", true).unwrap(), Some(false));
    }

    #[test]
    fn closed_input_is_reported() {
        let mut prompter = scripted("");
        assert_eq!(ask_confirm(&mut prompter, "ok?", true).unwrap(), None);
        assert_eq!(ask_decision(&mut prompter, "row").unwrap(), None);
    }

    #[test]
    fn index_requires_a_number_in_range() {
        let mut prompter = scripted("x\n9\n1\n");
        assert_eq!(ask_index(&mut prompter, "pick", 3).unwrap(), Some(1));
    }

    #[test]
    fn questions_are_written_with_hints() {
        let mut prompter = scripted("y\r\n");
        ask_confirm(&mut prompter, "Confirm insert?", true).unwrap();
        let shown = String::from_utf8(prompter.output.clone()).unwrap();
        assert_eq!(shown, "Confirm insert? [Y/n]: ");
    }
}
