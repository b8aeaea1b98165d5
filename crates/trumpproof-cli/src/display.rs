//! Terminal rendering for receipts, hash chains and scenario steps

use std::fmt::Display;
use std::io::Write;

use colored::*;
use serde::Serialize;
use trumpproof_types::{CycleState, Domain, ReceiptType};

const RULE_WIDTH: usize = 72;
const LABEL_WIDTH: usize = 12;

/// Outcome marker for a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Pass,
    Fail,
    Caution,
}

impl Mark {
    fn glyph(self) -> ColoredString {
        match self {
            Mark::Pass => "✓".green().bold(),
            Mark::Fail => "✗".red().bold(),
            Mark::Caution => "!".yellow().bold(),
        }
    }
}

pub fn heading(title: &str) {
    println!();
    println!("{} {}", "▌".blue(), title.bold());
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}

/// A marked line; failures and cautions are colored through
pub fn status(mark: Mark, message: &str) {
    let message = match mark {
        Mark::Pass => message.normal(),
        Mark::Fail => message.red(),
        Mark::Caution => message.yellow(),
    };
    println!(" {} {}", mark.glyph(), message);
}

/// An aligned label and value at block level
pub fn field(label: &str, value: impl Display) {
    println!("   {:<width$} {}", label.dimmed(), value, width = LABEL_WIDTH);
}

/// A field one level under the line above it
pub fn detail(label: &str, value: impl Display) {
    println!("       {:<width$} {}", label.dimmed(), value.to_string().cyan(), width = LABEL_WIDTH);
}

/// A `"<sha256>:<blake3>"` digest, one half per line
pub fn digest(label: &str, dual: &str) {
    match dual.split_once(':') {
        Some((sha256, blake3)) => {
            field(label, format!("{} {}", "sha256".dimmed(), sha256));
            field("", format!("{} {}", "blake3".dimmed(), blake3));
        }
        None => field(label, dual.red()),
    }
}

/// `#12 death_rate_receipt [border]`
pub fn receipt_ref(sequence_no: u64, receipt_type: ReceiptType, domain: Domain) -> String {
    format!(
        "{} {} {}",
        format!("#{sequence_no}").bold(),
        receipt_type.as_str(),
        format!("[{domain}]").dimmed()
    )
}

pub fn cycle_state(state: CycleState) -> ColoredString {
    let label = state.as_str();
    match state {
        CycleState::Completed | CycleState::Running => label.green(),
        CycleState::Review | CycleState::Escalated => label.yellow(),
        CycleState::Halted | CycleState::RolledBack => label.red().bold(),
    }
}

/// Verdict over a hash chain: intact, or broken at a sequence number
pub fn chain_status(receipts: usize, broken_at: Option<(u64, &str)>) {
    match broken_at {
        None => status(Mark::Pass, &format!("chain intact over {receipts} receipts")),
        Some((sequence_no, reason)) => {
            status(Mark::Fail, &format!("chain broken at #{sequence_no}"));
            detail("reason", reason);
        }
    }
}

/// Pretty JSON on stdout, for `--json`
pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
