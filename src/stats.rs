use crate::history::summarize;
use crate::models::{HistoryRecord, HistorySummary, Trend};

pub const DEFAULT_TREND_WINDOW: usize = 7;

/// Compares the oldest and newest net inside the most recent `window` days.
/// `nets` is newest-first, as history is listed.
pub fn trend(nets: &[i64], window: usize) -> Trend {
    let mut recent: Vec<i64> = nets.iter().take(window).copied().collect();
    if recent.len() < 2 {
        return Trend::InsufficientData;
    }
    recent.reverse();

    let first = recent[0];
    let last = recent[recent.len() - 1];
    if last > first {
        Trend::Increasing
    } else if last < first {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

pub fn build_history_stats(
    record: &HistoryRecord,
    trend_window: Option<usize>,
) -> (HistorySummary, Option<Trend>) {
    let summary = summarize(record);
    let direction = trend_window.map(|window| {
        let nets: Vec<i64> = summary.rows.iter().map(|row| row.net).collect();
        trend(&nets, window)
    });
    (summary, direction)
}
