//! Display utilities for formatted output

use tabled::{Table, Tabled, settings::Style};

use crate::{
    app::{EntryView, QueueKind},
    domain::{
        event::EventType,
        mutation::{JournalEntry, MoodEntry, Task}
    },
    service::offline_queue::{QueueStatus, SkipReason, SyncOutcome}
};

/// One line of `meh queue status`
#[derive(Debug, Clone, Tabled)]
pub struct QueueRow {
    #[tabled(rename = "Queue")]
    pub queue:        String,
    #[tabled(rename = "Namespace")]
    pub namespace:    String,
    #[tabled(rename = "Pending")]
    pub pending:      usize,
    #[tabled(rename = "Dead Letters")]
    pub dead_letters: usize
}

impl QueueRow {
    pub fn new(kind: QueueKind, namespace: &str, status: QueueStatus) -> Self {
        Self {
            queue:        kind.as_str().to_string(),
            namespace:    namespace.to_string(),
            pending:      status.pending,
            dead_letters: status.dead_letters
        }
    }
}

/// One line of `meh queue list`
#[derive(Debug, Clone, Tabled)]
pub struct EntryRow {
    #[tabled(rename = "Key")]
    pub key:         u64,
    #[tabled(rename = "Kind")]
    pub kind:        String,
    #[tabled(rename = "Summary")]
    pub summary:     String,
    #[tabled(rename = "Attempts")]
    pub attempts:    u32,
    #[tabled(rename = "Last Error")]
    pub last_error:  String,
    #[tabled(rename = "Queued At")]
    pub enqueued_at: String
}

impl From<EntryView> for EntryRow {
    fn from(view: EntryView) -> Self {
        Self {
            key:         view.key,
            kind:        view.kind.to_string(),
            summary:     view.summary,
            attempts:    view.attempts,
            last_error:  view.last_error.unwrap_or_else(|| "-".to_string()),
            enqueued_at: view.enqueued_at.format("%Y-%m-%d %H:%M:%S").to_string()
        }
    }
}

pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

pub fn show_queue_status(rows: Vec<QueueRow>, storage_available: bool) {
    if !storage_available {
        println!("⚠️  Queue storage is unavailable; offline mutations are not kept.");
    }
    println!("{}", render_table(rows));
}

pub fn show_entries(kind: QueueKind, dead: bool, entries: Vec<EntryView>) {
    let label = if dead { "dead letters" } else { "pending mutations" };
    if entries.is_empty() {
        println!("No {} in {}.", label, kind.as_str());
        return;
    }
    println!("{} {} in {}:", entries.len(), label, kind.as_str());
    println!("{}", render_table(entries.into_iter().map(EntryRow::from).collect()));
}

/// Describe how a sync pass ended, in one line
pub fn describe_outcome(kind: QueueKind, outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Skipped(SkipReason::Offline) => format!("{}: skipped, backend unreachable", kind.as_str()),
        SyncOutcome::Skipped(SkipReason::InFlight) => format!("{}: skipped, already syncing", kind.as_str()),
        SyncOutcome::Skipped(SkipReason::StorageUnavailable) => format!("{}: skipped, no queue storage", kind.as_str()),
        SyncOutcome::Completed(report) => {
            let mut line = format!("{}: {} replayed, {} remaining", kind.as_str(), report.replayed, report.remaining);
            if report.dead_lettered > 0 {
                line.push_str(&format!(", {} dead-lettered", report.dead_lettered));
            }
            if let Some(error) = &report.error {
                line.push_str(&format!(" (stopped: {})", error));
            }
            line
        }
    }
}

/// Summarize the writes the backend confirmed during this run
pub fn show_confirmed_events(counts: &[(EventType, u64)]) {
    if counts.is_empty() {
        println!("No writes were confirmed.");
        return;
    }
    let summary: Vec<String> = counts.iter().map(|(event_type, n)| format!("{} x{}", event_type, n)).collect();
    println!("Confirmed: {}", summary.join(", "));
}

pub fn show_task(task: Option<&Task>) {
    match task {
        Some(task) => println!("✅ Created task #{}: {}", task.id, task.title),
        None => println!("📥 Task queued; it will be sent once the backend is reachable.")
    }
}

pub fn show_mood_entry(entry: Option<&MoodEntry>) {
    match entry {
        Some(entry) => println!("✅ Recorded mood {} for {} (#{})", entry.score, entry.date, entry.id),
        None => println!("📥 Mood entry queued; it will be sent once the backend is reachable.")
    }
}

pub fn show_journal_entry(entry: Option<&JournalEntry>, updated: bool) {
    let verb = if updated { "Updated" } else { "Saved" };
    match entry {
        Some(entry) => println!("✅ {} journal entry #{} for {}", verb, entry.id, entry.date),
        None => println!("📥 Journal change queued; it will be sent once the backend is reachable.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::error::MehError, service::offline_queue::SyncReport};

    #[test]
    fn test_status_table_has_headers() {
        let rows = vec![QueueRow::new(QueueKind::Tasks, "meh-trics.tasks", QueueStatus {
            pending:      2,
            syncing:      false,
            dead_letters: 1
        })];
        let table = render_table(rows);

        assert!(table.contains("Dead Letters"));
        assert!(table.contains("meh-trics.tasks"));
    }

    #[test]
    fn test_stalled_outcome_mentions_the_error() {
        let outcome = SyncOutcome::Completed(SyncReport {
            replayed:      1,
            dead_lettered: 0,
            remaining:     2,
            error:         Some(MehError::Network("connection reset".to_string()))
        });

        let line = describe_outcome(QueueKind::Moods, &outcome);
        assert_eq!(line, "moods: 1 replayed, 2 remaining (stopped: connection reset)");
    }
}
