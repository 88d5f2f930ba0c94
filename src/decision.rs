//! Decision collaborators: who picks the canonical member of a group.
//!
//! The engine only sees [`DecisionMaker`]. Closures implement it directly,
//! which keeps scripted decisions in tests trivial; [`AutoPolicy`] covers
//! unattended runs and [`TerminalPrompt`] asks a person.

use std::io::{BufRead, Write};

use itertools::Itertools;
use log::warn;

use crate::{cli::AutoPolicy, engine::SimilarityGroup};

const MAX_INVALID_ANSWERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Use this member as the canonical value.
    Canonical(String),
    /// Leave the group un-normalized for this run.
    Skip,
    /// Leave this and every remaining group un-normalized.
    Abort,
}

pub trait DecisionMaker {
    fn decide(&mut self, column: &str, group: &SimilarityGroup) -> Decision;
}

impl<F> DecisionMaker for F
where
    F: FnMut(&str, &SimilarityGroup) -> Decision,
{
    fn decide(&mut self, column: &str, group: &SimilarityGroup) -> Decision {
        self(column, group)
    }
}

impl DecisionMaker for AutoPolicy {
    fn decide(&mut self, _column: &str, group: &SimilarityGroup) -> Decision {
        let choice = match self {
            AutoPolicy::FirstSeen => group.members.first(),
            // max_by_key keeps the last maximum, so walk in reverse to favour
            // the earliest member on ties.
            AutoPolicy::MostFrequent => group
                .members
                .iter()
                .zip(group.occurrences.iter())
                .rev()
                .max_by_key(|(_, count)| **count)
                .map(|(member, _)| member),
        };
        choice.map_or(Decision::Skip, |member| Decision::Canonical(member.clone()))
    }
}

/// Line-oriented prompt: numbered members on `output`, answers from `input`.
///
/// A number picks that member, an empty line or `s` skips the group, `q`
/// stops asking. End of input stops asking as well.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn show(&mut self, column: &str, group: &SimilarityGroup) -> std::io::Result<()> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "Anomalies found in column '{column}'. Similar values: {}",
            group.members.iter().map(|member| format!("{member:?}")).join(", ")
        )?;
        for (idx, (member, count)) in group.members_with_counts().enumerate() {
            let noun = if count == 1 { "row" } else { "rows" };
            writeln!(self.output, "  {}) {member:?} ({count} {noun})", idx + 1)?;
        }
        Ok(())
    }

    fn ask(&mut self, members: usize) -> std::io::Result<Option<String>> {
        write!(
            self.output,
            "Select the correct value [1-{members}], Enter to skip, q to stop: "
        )?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> DecisionMaker for TerminalPrompt<R, W> {
    fn decide(&mut self, column: &str, group: &SimilarityGroup) -> Decision {
        if let Err(err) = self.show(column, group) {
            warn!("Cannot display prompt: {err}");
            return Decision::Abort;
        }
        for _ in 0..MAX_INVALID_ANSWERS {
            let answer = match self.ask(group.members.len()) {
                Ok(Some(answer)) => answer,
                Ok(None) => return Decision::Abort,
                Err(err) => {
                    warn!("Cannot read answer: {err}");
                    return Decision::Abort;
                }
            };
            match answer.to_ascii_lowercase().as_str() {
                "" | "s" | "skip" => return Decision::Skip,
                "q" | "quit" => return Decision::Abort,
                _ => {}
            }
            if let Ok(choice) = answer.parse::<usize>()
                && let Some(member) = choice.checked_sub(1).and_then(|idx| group.members.get(idx))
            {
                return Decision::Canonical(member.clone());
            }
            let _ = writeln!(self.output, "'{answer}' is not one of the listed choices");
        }
        Decision::Skip
    }
}
