//! Operator-facing merge decisions.
//!
//! [`ConsolePrompt`] asks on the terminal whenever a learned schema is
//! already catalogued. [`decider_for`] turns the configured `on_match` mode
//! into a [`MergeDecider`].

use anyhow::Result;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::warn;

use squid_core::learner::{FixedPolicy, MergeDecider, MultiDecision, SingleDecision};
use squid_core::models::{CatalogRecord, ProgramIdentity};

/// Unanswerable questions give up after this many invalid replies.
const MAX_ATTEMPTS: usize = 3;

/// Interactive [`MergeDecider`] reading answers line by line.
pub struct ConsolePrompt<R, W> {
    io: Mutex<(R, W)>,
}

impl ConsolePrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    /// Print `question` and read one trimmed, lowercased reply. `None` on
    /// end of input or an I/O error.
    fn ask(&self, question: &str) -> Option<String> {
        let mut guard = self.io.lock().ok()?;
        let (input, output) = &mut *guard;
        write!(output, "{} ", question).ok()?;
        output.flush().ok()?;

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_lowercase()),
        }
    }

    fn say(&self, text: &str) {
        if let Ok(mut guard) = self.io.lock() {
            let _ = writeln!(guard.1, "{}", text);
        }
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        match self.io.into_inner() {
            Ok((_, output)) => output,
            Err(poisoned) => poisoned.into_inner().1,
        }
    }
}

impl<R, W> MergeDecider for ConsolePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn decide_single(&self, existing: &CatalogRecord, identity: &ProgramIdentity) -> SingleDecision {
        self.say(&format!(
            "This schema is already catalogued for {} (versions {}).",
            existing.program_name,
            existing.program_versions.join(", ")
        ));
        let question = format!(
            "Add {} {} to that entry? [y]es / [n]ew entry / [s]kip:",
            identity.program_name, identity.program_version
        );

        for _ in 0..MAX_ATTEMPTS {
            match self.ask(&question).as_deref() {
                Some("y" | "yes") => return SingleDecision::Merge,
                Some("n" | "new") => return SingleDecision::CreateNew,
                Some("s" | "skip") | None => return SingleDecision::Skip,
                Some(_) => self.say("Please answer y, n, or s."),
            }
        }
        SingleDecision::Skip
    }

    fn decide_multi(&self, existing: &[CatalogRecord], identity: &ProgramIdentity) -> MultiDecision {
        self.say("This schema is catalogued for several programs:");
        for (i, record) in existing.iter().enumerate() {
            self.say(&format!(
                "  {}) {} (versions {})",
                i + 1,
                record.program_name,
                record.program_versions.join(", ")
            ));
        }
        let question = format!(
            "Add {} {} to which entry? [1-{}] / [s]kip:",
            identity.program_name,
            identity.program_version,
            existing.len()
        );

        for _ in 0..MAX_ATTEMPTS {
            let reply = match self.ask(&question) {
                Some(reply) => reply,
                None => return MultiDecision::Skip,
            };
            if reply == "s" || reply == "skip" {
                return MultiDecision::Skip;
            }
            match reply.parse::<usize>() {
                Ok(n) if (1..=existing.len()).contains(&n) => return MultiDecision::MergeInto(n - 1),
                _ => self.say(&format!("Please enter a number from 1 to {}, or s.", existing.len())),
            }
        }
        MultiDecision::Skip
    }
}

/// Build the decider for an `on_match` mode: `ask`, `merge`, `new`, or
/// `skip`. `ask` falls back to skipping when stdin is not a terminal.
pub fn decider_for(mode: &str) -> Result<Box<dyn MergeDecider>> {
    if mode == "ask" {
        if atty::is(atty::Stream::Stdin) {
            return Ok(Box::new(ConsolePrompt::stdio()));
        }
        warn!("stdin is not a terminal; already catalogued schemas will be skipped");
        return Ok(Box::new(FixedPolicy::Skip));
    }
    Ok(Box::new(FixedPolicy::from_str(mode)?))
}
