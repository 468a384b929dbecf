//! Daily calorie ledger: entries for the current day, the running balance
//! against BMR, and the reset that carries finished days into history.
//!
//! Every operation reads the whole document from the store, changes it in
//! memory and writes it back. Two processes sharing one store can lose
//! updates; callers serialize access within a process.

use crate::errors::LedgerError;
use crate::history::{finalize_day, upsert};
use crate::models::{
    DailySummary, Entry, EntryIdentity, FinalizedDay, HistoryRecord, ResetOutcome, TodayRow,
    TodayView,
};
use crate::storage::DocumentStore;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_BMR: i64 = 1668;

const ENTRIES_KEY: &str = "calorie_entries";
const RESET_MARKER_KEY: &str = "last_reset_at";
const FINALIZED_KEY: &str = "finalized_through";
const HISTORY_KEY: &str = "daily_history";
const TOKEN_KEY: &str = "github_token";
const RECORD_ID_KEY: &str = "gist_id";
const NOTICES_KEY: &str = "pending_notices";

#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    pub bmr: i64,
    pub reset_at: NaiveTime,
    pub identity: EntryIdentity,
    pub finalize_on_reset: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            bmr: DEFAULT_BMR,
            reset_at: default_reset_time(),
            identity: EntryIdentity::Timestamp,
            finalize_on_reset: true,
        }
    }
}

pub fn default_reset_time() -> NaiveTime {
    NaiveTime::from_hms_opt(5, 30, 0).unwrap_or_default()
}

pub struct DailyLedger {
    store: Arc<dyn DocumentStore>,
    policy: LedgerPolicy,
}

impl DailyLedger {
    pub fn new(store: Arc<dyn DocumentStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub async fn entries(&self) -> Result<Vec<Entry>, LedgerError> {
        self.load_json(ENTRIES_KEY).await
    }

    async fn save_entries(&self, entries: &[Entry]) -> Result<(), LedgerError> {
        self.store
            .set(ENTRIES_KEY, serde_json::to_string(entries)?)
            .await
    }

    pub async fn add_entry(
        &self,
        date: &str,
        consumed: Option<i64>,
        burnt: Option<i64>,
    ) -> Result<Entry, LedgerError> {
        self.add_entry_at(Utc::now(), date, consumed, burnt).await
    }

    pub async fn add_entry_at(
        &self,
        now: DateTime<Utc>,
        date: &str,
        consumed: Option<i64>,
        burnt: Option<i64>,
    ) -> Result<Entry, LedgerError> {
        let entry = Entry {
            timestamp: now,
            date: parse_entry_date(date)?,
            consumed: parse_kcal("consumed", consumed)?,
            burnt: parse_kcal("burnt", burnt)?,
        };

        let mut entries = self.entries().await?;
        let existing = match self.policy.identity {
            EntryIdentity::Timestamp => None,
            EntryIdentity::Date => entries.iter().position(|e| e.date == entry.date),
        };
        match existing {
            Some(index) => entries[index] = entry.clone(),
            None => entries.push(entry.clone()),
        }
        self.save_entries(&entries).await?;

        Ok(entry)
    }

    /// Removes the first entry matching `id`. Returns whether one was removed.
    pub async fn delete_entry(&self, id: &str) -> Result<bool, LedgerError> {
        let mut entries = self.entries().await?;
        let position = match self.policy.identity {
            EntryIdentity::Timestamp => {
                let target = DateTime::parse_from_rfc3339(id.trim())
                    .map_err(|_| LedgerError::validation(format!("invalid entry id: {id}")))?
                    .with_timezone(&Utc);
                entries.iter().position(|e| e.timestamp == target)
            }
            EntryIdentity::Date => {
                let target = parse_entry_date(id)?;
                entries.iter().position(|e| e.date == target)
            }
        };

        let Some(index) = position else {
            return Ok(false);
        };
        entries.remove(index);
        self.save_entries(&entries).await?;
        Ok(true)
    }

    pub async fn today_view(&self) -> Result<TodayView, LedgerError> {
        self.today_view_at(Local::now().date_naive()).await
    }

    pub async fn today_view_at(&self, today: NaiveDate) -> Result<TodayView, LedgerError> {
        let entries = self.entries().await?;
        Ok(today_view(&entries, today, self.policy.identity, self.policy.bmr))
    }

    /// Clears the ledger once per day after the reset boundary, carrying
    /// finished days into the local history first.
    pub async fn check_and_apply_reset(
        &self,
        now: DateTime<Local>,
    ) -> Result<ResetOutcome, LedgerError> {
        let last_reset = self.reset_marker().await?;
        if !reset_due(last_reset, now, self.policy.reset_at) {
            return Ok(ResetOutcome::Unchanged);
        }

        let entries = self.entries().await?;
        let finalized = if self.policy.finalize_on_reset {
            self.finalize_past_days(&entries, now.date_naive()).await?
        } else {
            Vec::new()
        };

        self.store.remove(ENTRIES_KEY).await?;
        self.store
            .set(
                RESET_MARKER_KEY,
                now.with_timezone(&Utc).to_rfc3339(),
            )
            .await?;

        info!(
            cleared = entries.len(),
            finalized = finalized.len(),
            "daily ledger reset"
        );
        Ok(ResetOutcome::Applied {
            cleared: entries.len(),
            finalized,
        })
    }

    async fn finalize_past_days(
        &self,
        entries: &[Entry],
        today: NaiveDate,
    ) -> Result<Vec<FinalizedDay>, LedgerError> {
        let already_through = self.finalized_through().await?;
        let finalized: Vec<FinalizedDay> = group_by_day(entries, self.policy.identity)
            .range(..today)
            .filter(|(day, _)| already_through.is_none_or(|through| **day > through))
            .map(|(day, day_entries)| FinalizedDay {
                date: *day,
                net: finalize_day(day_entries.iter().copied()),
            })
            .collect();

        let Some(latest) = finalized.last().map(|day| day.date) else {
            return Ok(finalized);
        };

        let mut history = self.history().await?;
        for day in &finalized {
            history = upsert(history, day.date, day.net);
        }
        self.save_history(&history).await?;
        self.store.set(FINALIZED_KEY, latest.to_string()).await?;

        Ok(finalized)
    }

    /// Local copy of the daily history.
    pub async fn history(&self) -> Result<HistoryRecord, LedgerError> {
        self.load_json(HISTORY_KEY).await
    }

    async fn save_history(&self, history: &HistoryRecord) -> Result<(), LedgerError> {
        self.store
            .set(HISTORY_KEY, serde_json::to_string(history)?)
            .await
    }

    pub async fn record_day(&self, day: NaiveDate, net: i64) -> Result<HistoryRecord, LedgerError> {
        let history = upsert(self.history().await?, day, net);
        self.save_history(&history).await?;
        Ok(history)
    }

    pub async fn reset_marker(&self) -> Result<Option<DateTime<Local>>, LedgerError> {
        let Some(raw) = self.store.get(RESET_MARKER_KEY).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Ok(Some(at.with_timezone(&Local))),
            Err(err) => {
                warn!("ignoring unreadable reset marker {raw:?}: {err}");
                Ok(None)
            }
        }
    }

    async fn finalized_through(&self) -> Result<Option<NaiveDate>, LedgerError> {
        Ok(self
            .store
            .get(FINALIZED_KEY)
            .await?
            .and_then(|raw| raw.parse().ok()))
    }

    pub async fn credential(&self) -> Result<Option<String>, LedgerError> {
        Ok(self
            .store
            .get(TOKEN_KEY)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    pub async fn set_credential(&self, token: &str) -> Result<(), LedgerError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(LedgerError::validation("Please enter a GitHub token"));
        }
        self.store.set(TOKEN_KEY, token.to_string()).await
    }

    pub async fn record_id(&self) -> Result<Option<String>, LedgerError> {
        self.store.get(RECORD_ID_KEY).await
    }

    pub async fn set_record_id(&self, id: &str) -> Result<(), LedgerError> {
        self.store.set(RECORD_ID_KEY, id.to_string()).await
    }

    /// Keeps a message for the next request that can show it to the user.
    pub async fn queue_notice(&self, notice: impl Into<String>) -> Result<(), LedgerError> {
        let mut notices: Vec<String> = self.load_json(NOTICES_KEY).await?;
        notices.push(notice.into());
        self.store
            .set(NOTICES_KEY, serde_json::to_string(&notices)?)
            .await
    }

    /// Drains queued messages, joined into one line.
    pub async fn take_notices(&self) -> Result<Option<String>, LedgerError> {
        let notices: Vec<String> = self.load_json(NOTICES_KEY).await?;
        if notices.is_empty() {
            return Ok(None);
        }
        self.store.remove(NOTICES_KEY).await?;
        Ok(Some(notices.join("; ")))
    }

    async fn load_json<T>(&self, key: &str) -> Result<T, LedgerError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(T::default()),
        }
    }
}

/// Fires when no reset happened yet, or on a later calendar day once the
/// local time has reached `boundary`.
pub fn reset_due(
    last_reset: Option<DateTime<Local>>,
    now: DateTime<Local>,
    boundary: NaiveTime,
) -> bool {
    match last_reset {
        None => true,
        Some(last) => last.date_naive() != now.date_naive() && now.time() >= boundary,
    }
}

/// Today's entries oldest first, each with the balance left after it.
pub fn today_view(
    entries: &[Entry],
    today: NaiveDate,
    identity: EntryIdentity,
    bmr: i64,
) -> TodayView {
    let mut todays: Vec<&Entry> = entries
        .iter()
        .filter(|entry| entry.day(identity) == today)
        .collect();
    todays.sort_by_key(|entry| entry.timestamp);

    let mut remaining = bmr;
    let rows = todays
        .into_iter()
        .map(|entry| {
            let net = entry.net();
            remaining = remaining.saturating_sub(net);
            TodayRow {
                id: entry.id(identity),
                entry: entry.clone(),
                net,
                remaining_after: remaining,
            }
        })
        .collect();

    TodayView {
        date: today,
        rows,
        remaining,
    }
}

pub fn daily_summary<'a>(entries: impl IntoIterator<Item = &'a Entry>, bmr: i64) -> DailySummary {
    let mut count = 0usize;
    let mut total_consumed = 0i64;
    let mut total_burnt = 0i64;
    for entry in entries {
        count += 1;
        total_consumed += i64::from(entry.consumed);
        total_burnt += i64::from(entry.burnt);
    }

    if count == 0 {
        return DailySummary::NoEntries { bmr };
    }

    let net_intake = total_consumed - total_burnt;
    DailySummary::Totals {
        bmr,
        total_consumed,
        total_burnt,
        net_intake,
        remaining: bmr.saturating_sub(net_intake),
    }
}

fn group_by_day(entries: &[Entry], identity: EntryIdentity) -> BTreeMap<NaiveDate, Vec<&Entry>> {
    let mut days: BTreeMap<NaiveDate, Vec<&Entry>> = BTreeMap::new();
    for entry in entries {
        days.entry(entry.day(identity)).or_default().push(entry);
    }
    days
}

fn parse_entry_date(raw: &str) -> Result<NaiveDate, LedgerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LedgerError::validation("date is required"));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| LedgerError::validation(format!("date must be YYYY-MM-DD, got {raw:?}")))
}

fn parse_kcal(field: &str, value: Option<i64>) -> Result<u32, LedgerError> {
    let value = value.ok_or_else(|| {
        LedgerError::validation(format!("{field} must be a number (use 0 if needed)"))
    })?;
    u32::try_from(value)
        .map_err(|_| LedgerError::validation(format!("{field} must be a non-negative whole number")))
}
