//! Parsing of `app.log` access lines for the admin dashboard.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    #[serde(rename = "Security Alert")]
    SecurityAlert,
    Transaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryStatus {
    Success,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub message: &'static str,
    pub status: EntryStatus,
}

impl LogEntry {
    fn from_status_code(timestamp: String, code: u16) -> Self {
        let (kind, message, status) = match code {
            403 => (
                EntryKind::SecurityAlert,
                "Security threat detected - Transaction blocked",
                EntryStatus::Blocked,
            ),
            200 => (
                EntryKind::Transaction,
                "New blockchain transaction processed",
                EntryStatus::Success,
            ),
            _ => (
                EntryKind::Transaction,
                "Transaction failed to process",
                EntryStatus::Failed,
            ),
        };
        Self {
            timestamp,
            kind,
            message,
            status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total_transactions: usize,
    pub successful_transactions: usize,
    pub blocked_transactions: usize,
    pub failed_transactions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_predictions: usize,
    pub attack_predictions: usize,
    pub safe_predictions: usize,
}

/// Entries for every `/predict` access line; other lines are skipped.
pub fn parse_predict_entries(contents: &str) -> Vec<LogEntry> {
    contents.lines().filter_map(parse_predict_line).collect()
}

/// Parses from the end of the line: `... [ts] "POST /predict HTTP/1.1" <code> -`.
/// Only the trailing request counts, whatever precedes it.
fn parse_predict_line(line: &str) -> Option<LogEntry> {
    let rest = line.trim_end().strip_suffix(" -")?;
    let (rest, code) = rest.rsplit_once(' ')?;
    let code = code.parse::<u16>().ok()?;
    if !rest.ends_with('"') {
        return None;
    }

    let request_start = rest.rfind("\"POST /predict")?;
    let request = &rest[request_start + 1..rest.len() - 1];
    if request.contains('"') {
        return None;
    }
    let timestamp = last_bracketed(&rest[..request_start])?;

    Some(LogEntry::from_status_code(timestamp.to_string(), code))
}

fn last_bracketed(s: &str) -> Option<&str> {
    let close = s.rfind(']')?;
    let open = s[..close].rfind('[')?;
    Some(&s[open + 1..close])
}

pub fn summarize(entries: &[LogEntry]) -> LogStats {
    let count = |status: EntryStatus| entries.iter().filter(|e| e.status == status).count();
    LogStats {
        total_transactions: entries.len(),
        successful_transactions: count(EntryStatus::Success),
        blocked_transactions: count(EntryStatus::Blocked),
        failed_transactions: count(EntryStatus::Failed),
    }
}

pub fn dashboard(entries: &[LogEntry]) -> DashboardStats {
    let stats = summarize(entries);
    DashboardStats {
        total_predictions: stats.total_transactions,
        attack_predictions: stats.blocked_transactions,
        safe_predictions: stats.successful_transactions,
    }
}
