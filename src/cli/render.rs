//! Terminal rendering of the aggregate progress view.

use std::time::Duration;

use console::{style, Term};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::format::format_bytes;
use crate::progress::{display_order, EntryView, ProgressTracker};

const BAR_WIDTH: usize = 28;
const DEFAULT_ROW_BUDGET: usize = 10;

/// How the progress view reaches the user. The scheduler only talks to the
/// tracker; swapping the renderer never touches download logic.
pub trait ProgressRenderer {
    /// Redraws the view from a fresh snapshot.
    fn render(&mut self, entries: &[EntryView]);

    /// Draws the terminal state once all entries have settled.
    fn finish(&mut self, entries: &[EntryView]);
}

/// Renderer that discards everything; used when stdout is not a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentRenderer;

impl ProgressRenderer for SilentRenderer {
    fn render(&mut self, _entries: &[EntryView]) {}
    fn finish(&mut self, _entries: &[EntryView]) {}
}

/// Live redrawing renderer over a terminal.
pub struct TermRenderer {
    term: Term,
    last_lines: usize,
}

impl TermRenderer {
    /// Creates a renderer writing to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            last_lines: 0,
        }
    }

    fn row_budget(&self) -> usize {
        let (rows, _) = self.term.size();
        if rows == 0 {
            DEFAULT_ROW_BUDGET
        } else {
            // Leave room for the footer, a shell prompt and one spare row.
            (rows as usize).saturating_sub(3).clamp(1, 32)
        }
    }

    fn redraw(&mut self, lines: &[String]) {
        let _ = self.term.clear_last_lines(self.last_lines);
        for line in lines {
            let _ = self.term.write_line(line);
        }
        self.last_lines = lines.len();
    }
}

impl Default for TermRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRenderer for TermRenderer {
    fn render(&mut self, entries: &[EntryView]) {
        let lines = compose(entries, self.row_budget());
        self.redraw(&lines);
    }

    fn finish(&mut self, entries: &[EntryView]) {
        let _ = self.term.clear_last_lines(self.last_lines);
        for entry in entries {
            let mark = if entry.finished {
                style("done").green()
            } else {
                style("FAILED").red()
            };
            let _ = self.term.write_line(&format!("  {mark}  {}", entry.description));
        }
        let _ = self.term.write_line(&footer(entries));
        self.last_lines = 0;
    }
}

fn entry_line(entry: &EntryView) -> String {
    entry.percent().map_or_else(
        || {
            format!(
                "  [{}] {:>7} {}",
                style("╌".repeat(BAR_WIDTH)).dim(),
                format_bytes(entry.completed),
                entry.description,
            )
        },
        |pct| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let filled = ((pct / 100.0 * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
            let bar = format!(
                "{}{}",
                "━".repeat(filled),
                "╌".repeat(BAR_WIDTH - filled)
            );
            let sizes = entry.total.map_or_else(String::new, |t| {
                format!(" {}/{}", format_bytes(entry.completed), format_bytes(t))
            });
            format!(
                "  [{}] {pct:>5.1}%{sizes} {}",
                style(bar).cyan(),
                entry.description,
            )
        },
    )
}

fn footer(entries: &[EntryView]) -> String {
    let total = entries.len();
    let finished = entries.iter().filter(|e| e.finished).count();
    let failed = entries.iter().filter(|e| e.failed).count();
    let mut line = format!(
        "{finished}/{total} finished, {} remaining",
        total - finished - failed
    );
    if failed > 0 {
        line.push_str(&format!(", {failed} failed"));
    }
    line
}

/// Lays out one frame: unfinished entries by descending completion, cut to
/// the row budget with a truncation marker and the single lowest-progress
/// entry, then the footer.
fn compose(entries: &[EntryView], budget: usize) -> Vec<String> {
    let mut unfinished: Vec<EntryView> = entries
        .iter()
        .filter(|e| !e.is_settled())
        .cloned()
        .collect();
    display_order(&mut unfinished);

    let mut lines = Vec::new();
    if unfinished.len() <= budget {
        lines.extend(unfinished.iter().map(entry_line));
    } else {
        let shown = budget.saturating_sub(2).max(1);
        lines.extend(unfinished[..shown].iter().map(entry_line));
        lines.push(format!("  … {} more …", unfinished.len() - shown - 1));
        if let Some(lowest) = unfinished.last() {
            lines.push(entry_line(lowest));
        }
    }
    lines.push(footer(entries));
    lines
}

/// Polls the tracker on a fixed tick and redraws until the scheduler task
/// completes, then draws the terminal state and returns the scheduler's
/// result.
///
/// # Errors
///
/// Returns the scheduler's error, or a transfer error if the scheduler
/// task panicked.
pub async fn run_render_loop(
    tracker: &ProgressTracker,
    renderer: &mut dyn ProgressRenderer,
    tick: Duration,
    scheduler: JoinHandle<Result<()>>,
) -> Result<()> {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        renderer.render(&tracker.snapshot());
        // The scheduler only returns after every task has settled.
        if scheduler.is_finished() {
            break;
        }
    }
    renderer.finish(&tracker.snapshot());
    match scheduler.await {
        Ok(result) => result,
        Err(e) => Err(Error::Transfer {
            name: "download batch".to_string(),
            reason: e.to_string(),
        }),
    }
}
