//! Output formatting utilities

use chrono::Local;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

use scriptledger_core::ports::Severity;
use scriptledger_core::{LedgerRecord, MigrationPlan, Reporter, RevisionId, RunEvent, RunSummary, ScriptStatus};

/// Number of revision characters shown to operators
const SHORT_REVISION_LEN: usize = 8;

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn line(symbol: colored::ColoredString, msg: &str) -> String {
    format!("{} {} {}", format!("[{}]", timestamp()).cyan(), symbol, msg)
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", line("✗ ERROR:".red().bold(), msg));
}

/// Print a section header
pub fn header(msg: &str) {
    println!();
    println!("{}", format!("═══ {} ═══", msg).cyan().bold());
    println!();
}

/// First characters of a revision id
pub fn short_revision(rev: &RevisionId) -> &str {
    let id = rev.as_str();
    match id.char_indices().nth(SHORT_REVISION_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Colored, timestamped console reporter
///
/// In JSON mode progress goes to stderr so stdout carries only the document.
pub struct ConsoleReporter {
    json: bool,
}

impl ConsoleReporter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print a success message
    pub fn success(&self, msg: &str) {
        self.emit(line("✓".green(), msg));
    }

    fn emit(&self, text: String) {
        if self.json {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, msg: &str) {
        self.emit(line("ℹ".blue(), msg));
    }

    fn warn(&self, msg: &str) {
        self.emit(line("⚠".yellow(), msg));
    }

    fn error(&self, msg: &str) {
        eprintln!("{}", line("✗ ERROR:".red().bold(), msg));
    }

    fn script_status(&self, name: &str, status: ScriptStatus) {
        let symbol = match status {
            ScriptStatus::Executing => "▶".yellow(),
            ScriptStatus::Succeeded => "✓".green(),
            ScriptStatus::Failed => "✗".red(),
            ScriptStatus::Skipped => "○".blue(),
            ScriptStatus::Pending => "•".white(),
        };
        self.emit(line(symbol, name));
    }

    fn summary(&self, summary: &RunSummary) {
        if self.json {
            match serde_json::to_string_pretty(summary) {
                Ok(doc) => println!("{}", doc),
                Err(e) => error(&format!("failed to encode summary: {}", e)),
            }
            return;
        }
        header("Migration Summary");
        println!("{}", summary_table(summary));
        println!();
    }

    fn event(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Checkpoint(rev) => {
                self.info(&format!("Last successful migration at revision: {}", short_revision(rev)))
            }
            RunEvent::CurrentRevision(rev) => self.info(&format!("Current revision: {}", short_revision(rev))),
            RunEvent::NoPendingScripts | RunEvent::UnfinishedBatchResumable | RunEvent::Completed => {
                self.success(&event.to_string())
            }
            other => {
                let msg = other.to_string();
                match other.severity() {
                    Severity::Info => self.info(&msg),
                    Severity::Warn => self.warn(&msg),
                    Severity::Error => self.error(&msg),
                }
            }
        }
    }
}

/// Key/value table of run counts
pub fn summary_table(summary: &RunSummary) -> Table {
    let mut table = create_table();
    table.add_row(vec![Cell::new("Total scripts"), Cell::new(summary.discovered)]);
    table.add_row(vec![Cell::new("Successful"), Cell::new(summary.succeeded).fg(Color::Green)]);
    let failed = Cell::new(summary.failed);
    table.add_row(vec![
        Cell::new("Failed"),
        if summary.failed > 0 { failed.fg(Color::Red) } else { failed },
    ]);
    table.add_row(vec![Cell::new("Skipped"), Cell::new(summary.skipped).fg(Color::Blue)]);
    if summary.missed_applied > 0 || summary.missed_skipped > 0 {
        table.add_row(vec![Cell::new("Missed scripts applied"), Cell::new(summary.missed_applied)]);
        table.add_row(vec![Cell::new("Missed scripts skipped"), Cell::new(summary.missed_skipped)]);
    }
    table
}

/// Ledger audit trail, one row per attempt
pub fn history_table(records: &[LedgerRecord]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["#", "Script", "Status", "Batch end", "Revision", "Executed at"]);
    for rec in records {
        let status = if rec.completed {
            Cell::new("completed").fg(Color::Green)
        } else {
            Cell::new("FAILED").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(rec.ordinal),
            Cell::new(&rec.script_name),
            status,
            Cell::new(if rec.is_batch_terminator { "yes" } else { "" }),
            Cell::new(rec.revision_id.as_ref().map(short_revision).unwrap_or("-")),
            Cell::new(rec.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    table
}

/// Scripts a dry run would execute
pub fn plan_table(plan: &MigrationPlan) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Order", "Script", "Path", "Introduced at"]);
    for (i, script) in plan.pending.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&script.name),
            Cell::new(&script.path),
            Cell::new(script.introduced_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_revision() {
        let rev = RevisionId::new("0123456789abcdef0123456789abcdef01234567");
        assert_eq!(short_revision(&rev), "01234567");
        assert_eq!(short_revision(&RevisionId::new("abc")), "abc");
    }

    #[test]
    fn test_summary_table_lists_missed_counts_only_when_used() {
        let summary = RunSummary {
            discovered: 3,
            succeeded: 2,
            failed: 1,
            ..Default::default()
        };
        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("Total scripts"));
        assert!(!rendered.contains("Missed scripts"));

        let summary = RunSummary {
            missed_applied: 1,
            ..Default::default()
        };
        assert!(summary_table(&summary).to_string().contains("Missed scripts applied"));
    }
}
