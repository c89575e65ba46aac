use clap::{Parser, Subcommand};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::SynthesizerKind;
use crate::domain::Sport;
use crate::persistence::ResultsLedger;
use crate::pipeline::RunReport;

#[derive(Parser)]
#[command(name = "algorhythm")]
#[command(author = "Algorhythm Team")]
#[command(version = "0.1.0")]
#[command(about = "Multi-agent consensus picks for college football and NFL games", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration directory (default.toml plus an ALGO_ENV overlay)
    #[arg(short, long, global = true, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Produce, publish and record picks for one week of games
    Run {
        /// Sport to run (cfb, nfl)
        #[arg(short, long, default_value = "cfb")]
        sport: Sport,
        /// Scheduling period; selects the schedule and ledger files
        #[arg(short, long)]
        week: u32,
        /// Only games kicking off today (local date)
        #[arg(long)]
        today_only: bool,
        /// Experts per panel (3-5), overrides pipeline.expert_count
        #[arg(short, long)]
        experts: Option<usize>,
        /// Log messages instead of posting them
        #[arg(long)]
        dry_run: bool,
        /// Small search model and a two-expert panel
        #[arg(long)]
        testing: bool,
        /// Consensus implementation (llm, voting)
        #[arg(long)]
        synthesizer: Option<SynthesizerKind>,
    },
    /// Show the recorded picks for one week
    Ledger {
        /// Sport to show (cfb, nfl)
        #[arg(short, long, default_value = "cfb")]
        sport: Sport,
        /// Scheduling period
        #[arg(short, long)]
        week: u32,
    },
}

#[derive(Tabled)]
struct LedgerLine {
    #[tabled(rename = "Game")]
    game: String,
    #[tabled(rename = "Kickoff")]
    kickoff: String,
    #[tabled(rename = "Moneyline")]
    moneyline: String,
    #[tabled(rename = "Spread")]
    spread: String,
    #[tabled(rename = "Total")]
    total: String,
}

/// Render recorded picks as a table
pub fn ledger_table(ledger: &ResultsLedger) -> String {
    let lines: Vec<LedgerLine> = ledger
        .rows()
        .iter()
        .map(|row| LedgerLine {
            game: format!("{} at {}", row.away, row.home),
            kickoff: row.kickoff.clone(),
            moneyline: row.ml_pick.clone(),
            spread: row.spread_pick.clone(),
            total: row.total_pick.clone(),
        })
        .collect();
    Table::new(lines).with(Style::modern()).to_string()
}

pub fn show_ledger(ledger: &ResultsLedger) {
    if ledger.is_empty() {
        println!("No picks recorded in {}", ledger.path().display());
        return;
    }
    println!("\n=== {} ({} games) ===\n", ledger.path().display(), ledger.len());
    println!("{}", ledger_table(ledger));
}

pub fn print_report(report: &RunReport) {
    println!("\n=== Run Summary ===");
    println!("  Completed: {}", report.completed.len());
    for game in &report.completed {
        println!("    \x1b[32m✓\x1b[0m {}", game);
    }
    println!("  Skipped (already recorded): {}", report.skipped.len());
    for game in &report.skipped {
        println!("    - {}", game);
    }
    println!("  Failed: {}", report.failed.len());
    for failure in &report.failed {
        println!(
            "    \x1b[31m✗\x1b[0m {} [{}] {}",
            failure.game, failure.stage, failure.error
        );
    }
}
