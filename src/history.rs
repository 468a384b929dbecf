use crate::models::{Classification, Entry, HistoryRecord, HistoryRow, HistorySummary};
use chrono::NaiveDate;

/// Net calories for one day's entries. Empty input nets to zero.
pub fn finalize_day<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> i64 {
    let (consumed, burnt) = entries.into_iter().fold((0i64, 0i64), |(c, b), entry| {
        (c + i64::from(entry.consumed), b + i64::from(entry.burnt))
    });
    consumed - burnt
}

pub fn upsert(mut record: HistoryRecord, day: NaiveDate, net: i64) -> HistoryRecord {
    record.days.insert(day, net);
    record
}

/// Newest day first, with the overall total classified.
pub fn summarize(record: &HistoryRecord) -> HistorySummary {
    let rows: Vec<HistoryRow> = record
        .days
        .iter()
        .rev()
        .map(|(date, net)| HistoryRow {
            date: *date,
            net: *net,
            classification: Classification::of_net(*net),
        })
        .collect();
    let total_net = rows.iter().map(|row| row.net).sum();

    HistorySummary {
        rows,
        total_net,
        classification: Classification::of_net(total_net),
    }
}
