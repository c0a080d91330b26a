//! Terminal rendering of conversation snapshots and analysis results.

use chrono::Local;
use colored::Colorize;
use derma_core::conversation::{ConversationSnapshot, Speaker, Turn, TurnId};
use derma_core::notification::{NotificationLevel, NotificationQueue};
use derma_core::prediction::{ConfidenceLevel, DISCLAIMER, PredictionResult};
use derma_core::scroll::ScrollViewport;
use std::collections::HashMap;

const BAR_WIDTH: usize = 30;

/// Line-oriented view of the conversation.
///
/// Each turn renders to one or more lines; the anchor of a turn is the index
/// of its first line. Scrolling moves the print cursor to an anchor so the
/// next [`print`](Transcript::print) starts at that turn.
#[derive(Debug, Default)]
pub struct Transcript {
    lines: Vec<String>,
    anchors: HashMap<TurnId, usize>,
    cursor: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-lays out the transcript from a snapshot. The cursor is kept.
    pub fn render(&mut self, snapshot: &ConversationSnapshot) {
        self.lines.clear();
        self.anchors.clear();
        for turn in &snapshot.turns {
            self.anchors.insert(turn.id, self.lines.len());
            self.lines.extend(turn_lines(turn));
        }
    }

    /// Prints every line from the cursor onward and moves the cursor to the end.
    pub fn print(&mut self) {
        let start = self.cursor.min(self.lines.len());
        for line in &self.lines[start..] {
            println!("{}", line);
        }
        self.cursor = self.lines.len();
    }
}

impl ScrollViewport for Transcript {
    fn anchor_top(&self, id: TurnId) -> Option<f32> {
        self.anchors.get(&id).map(|line| *line as f32)
    }

    fn scroll_to(&mut self, top: f32) {
        self.cursor = top.max(0.0) as usize;
    }
}

fn turn_lines(turn: &Turn) -> Vec<String> {
    let time = turn.created_at.with_timezone(&Local).format("%H:%M");
    let header = match turn.speaker {
        Speaker::User => format!("{} {}", "You".cyan().bold(), time.to_string().dimmed()),
        Speaker::Assistant => format!("{} {}", "Assistant".green().bold(), time.to_string().dimmed()),
    };

    let mut lines = vec![header];
    if turn.is_pending() {
        lines.push(format!("  {}", turn.display_text().italic().dimmed()));
    } else {
        lines.extend(turn.display_text().lines().map(|line| format!("  {}", line)));
    }
    lines.push(String::new());
    lines
}

/// Prints the analysis results panel.
pub fn print_prediction(result: &PredictionResult) {
    let level = result.confidence_level();
    let label = match level {
        ConfidenceLevel::High => level.label().green(),
        ConfidenceLevel::Moderate => level.label().yellow(),
        ConfidenceLevel::Low => level.label().red(),
    };
    let filled = ((result.confidence * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);

    println!("{}", "Analysis Results".bold());
    println!("  Detected Condition: {}", result.disease.bold());
    println!(
        "  Confidence Level:   {} [{}{}] {}",
        label,
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        result.confidence_percent()
    );
    println!("  Description:        {}", result.description);
    println!("  {}", DISCLAIMER.dimmed());
    println!();
}

/// Prints and clears queued notifications.
pub fn print_notifications(queue: &NotificationQueue) {
    for notification in queue.drain() {
        match notification.level {
            NotificationLevel::Success => println!("{} {}", "✓".green(), notification.message),
            NotificationLevel::Error => eprintln!("{} {}", "✗".red(), notification.message),
        }
    }
}
