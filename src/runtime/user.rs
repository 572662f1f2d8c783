//! User interaction operations (confirmation, text input, selection).

use anyhow::{Result, bail};

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// One entry of a numbered selection list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectChoice {
    pub label: String,
    pub enabled: bool,
}

impl SelectChoice {
    pub fn new(label: impl Into<String>, enabled: bool) -> Self {
        Self {
            label: label.into(),
            enabled,
        }
    }
}

/// Core, testable implementation that reads from any BufRead and writes to any Write.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let response = line.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}

pub(crate) fn input_with_io<R: BufRead, W: Write>(
    prompt: &str,
    default: &str,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    if default.is_empty() {
        write!(output, "{} ", prompt)?;
    } else {
        write!(output, "{} ({}) ", prompt, default)?;
    }
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let answer = line.trim();
    if answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}

pub(crate) fn select_with_io<R: BufRead, W: Write>(
    prompt: &str,
    choices: &[SelectChoice],
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    if !choices.iter().any(|c| c.enabled) {
        bail!("Nothing to select: every choice is unavailable");
    }

    writeln!(output, "{}", prompt)?;
    for (i, choice) in choices.iter().enumerate() {
        if choice.enabled {
            writeln!(output, "  {}) {}", i + 1, choice.label)?;
        } else {
            writeln!(output, "  -) {} (unavailable)", choice.label)?;
        }
    }

    loop {
        write!(output, "Enter a number: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("No selection made");
        }

        match line.trim().parse::<usize>() {
            Ok(n) if (1..=choices.len()).contains(&n) && choices[n - 1].enabled => {
                return Ok(n - 1);
            }
            _ => writeln!(output, "Invalid choice '{}'.", line.trim())?,
        }
    }
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        confirm_with_io(prompt, &mut stdin.lock(), &mut stdout)
    }

    pub(crate) fn input_impl(&self, prompt: &str, default: &str) -> Result<String> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        input_with_io(prompt, default, &mut stdin.lock(), &mut stdout)
    }

    pub(crate) fn select_impl(&self, prompt: &str, choices: &[SelectChoice]) -> Result<usize> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        select_with_io(prompt, choices, &mut stdin.lock(), &mut stdout)
    }
}
