//! Interactive form selection

use chrono::{Local, TimeZone};
use std::io::{self, BufRead, Write};
use thiserror::Error;

use crate::registry::FormRecord;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Input closed before a form was selected")]
    Closed,

    #[error("Cannot read selection: {0}")]
    Io(#[from] io::Error),
}

/// What the operator asked to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Zero-based index into the registry.
    One(usize),
    All,
}

impl Selection {
    /// Records to build, in registry order.
    pub fn apply(self, records: &[FormRecord]) -> &[FormRecord] {
        match self {
            Selection::One(i) => records.get(i).map(std::slice::from_ref).unwrap_or(&[]),
            Selection::All => records,
        }
    }
}

/// Highest valid menu number. The "all" entry exists only for more than one record.
pub fn max_choice(count: usize) -> usize {
    if count > 1 {
        count + 1
    } else {
        count
    }
}

/// Menu lines, one per record plus the "all" entry.
pub fn render_menu(records: &[FormRecord]) -> Vec<String> {
    let mut lines: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("  [{}] {}  (updated {})", i + 1, r.name(), format_updated(r.updated_at())))
        .collect();
    if records.len() > 1 {
        lines.push(format!("  [{}] Build ALL forms", records.len() + 1));
    }
    lines
}

fn format_updated(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0).single() {
        Some(t) => t.format("%b %-d, %Y %-I:%M %p").to_string(),
        None => "unknown".to_string(),
    }
}

/// Map a typed menu number to a selection.
pub fn parse_choice(input: &str, count: usize) -> Result<Selection, ChoiceError> {
    let n: usize = input.trim().parse().map_err(|_| ChoiceError::NotANumber)?;
    let max = max_choice(count);
    if n < 1 || n > max {
        return Err(ChoiceError::OutOfRange { max });
    }
    if count > 1 && n == count + 1 {
        Ok(Selection::All)
    } else {
        Ok(Selection::One(n - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceError {
    NotANumber,
    OutOfRange { max: usize },
}

/// Prompt on `output` until `input` yields a valid choice.
pub fn prompt_selection<R, W>(input: &mut R, output: &mut W, count: usize) -> Result<Selection, SelectionError>
where
    R: BufRead,
    W: Write,
{
    let max = max_choice(count);
    let mut line = String::new();
    loop {
        write!(output, "Select a form to build (1-{}): ", max)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Err(SelectionError::Closed);
        }
        match parse_choice(&line, count) {
            Ok(selection) => return Ok(selection),
            Err(ChoiceError::NotANumber) => writeln!(output, "  Please enter a number.")?,
            Err(ChoiceError::OutOfRange { max }) => {
                writeln!(output, "  Please enter a number between 1 and {}.", max)?
            }
        }
    }
}
