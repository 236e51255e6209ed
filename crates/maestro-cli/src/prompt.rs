//! Interactive questions. Every helper takes its input and output streams so
//! it can be driven from tests.

use anyhow::{bail, Context};
use maestro_core::agents;
use maestro_core::ConflictDecision;
use std::collections::HashSet;
use std::io::{BufRead, Write};

fn read_answer<R: BufRead>(input: &mut R) -> anyhow::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).context("reading input")?;
    Ok(line.trim().to_ascii_lowercase())
}

/// Ask once how to treat every conflicting directory.
///
/// Anything other than an overwrite or backup answer, including empty input
/// and end of input, is a cancel.
pub fn prompt_conflict_resolution<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    conflicting: &[String],
) -> anyhow::Result<ConflictDecision> {
    if conflicting.is_empty() {
        return Ok(ConflictDecision::Cancel);
    }

    if let [only] = conflicting {
        writeln!(output, "{only} already exists. What would you like to do?")?;
    } else {
        writeln!(output, "The following directories already exist:")?;
        for dir in conflicting {
            writeln!(output, "  - {dir}")?;
        }
        writeln!(output, "\nWhat would you like to do?")?;
    }
    writeln!(output, "  [o] Overwrite existing files")?;
    writeln!(output, "  [b] Backup existing and reinitialize")?;
    writeln!(output, "  [c] Cancel (default)")?;
    write!(output, "Choice [o/b/c]: ")?;
    output.flush()?;

    let answer = read_answer(input)?;
    Ok(answer
        .parse::<ConflictDecision>()
        .unwrap_or(ConflictDecision::Cancel))
}

/// Offer `available` agent directories as a numbered list and return the
/// chosen ones in the order first picked. Empty input selects nothing.
pub fn prompt_agent_selection<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    available: &[String],
) -> anyhow::Result<Vec<String>> {
    if available.is_empty() {
        return Ok(Vec::new());
    }

    writeln!(output, "The following agent config directories are available:")?;
    for (i, dir) in available.iter().enumerate() {
        writeln!(output, "  [{}] {dir}  ({})", i + 1, agents::agent_description(dir))?;
    }
    writeln!(output)?;
    write!(output, "Enter numbers to install (e.g. 1 2), or press Enter to skip: ")?;
    output.flush()?;

    let answer = read_answer(input)?;
    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    for part in answer.split_whitespace() {
        let num: usize = part
            .parse()
            .with_context(|| format!("invalid number '{part}'"))?;
        if num < 1 || num > available.len() {
            bail!("number {num} is out of range (1-{})", available.len());
        }
        if seen.insert(num) {
            selected.push(available[num - 1].clone());
        }
    }
    Ok(selected)
}

/// `[y/N]` question; only `y` or `yes` confirms.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> anyhow::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let answer = read_answer(input)?;
    Ok(matches!(answer.as_str(), "y" | "yes"))
}
