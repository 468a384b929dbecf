use crate::errors::LedgerError;
use crate::history::upsert;
use crate::ledger::DailyLedger;
use crate::models::{FinalizedDay, HistoryRecord};
use crate::remote::{HistoryStore, RemoteRecord};
use tracing::{info, warn};

async fn credential(ledger: &DailyLedger) -> Result<String, LedgerError> {
    ledger.credential().await?.ok_or_else(|| {
        LedgerError::StoreUnavailable("Please set up GitHub token first".to_string())
    })
}

async fn open_record(
    ledger: &DailyLedger,
    remote: &dyn HistoryStore,
    credential: &str,
) -> Result<RemoteRecord, LedgerError> {
    let cached_id = ledger.record_id().await?;
    let remote_record = remote.fetch_record(credential, cached_id.as_deref()).await?;
    if remote_record.created {
        ledger.set_record_id(&remote_record.id).await?;
    }
    Ok(remote_record)
}

/// Reads the remote history, creating the remote record on first use.
pub async fn fetch_history(
    ledger: &DailyLedger,
    remote: &dyn HistoryStore,
) -> Result<HistoryRecord, LedgerError> {
    let credential = credential(ledger).await?;
    Ok(open_record(ledger, remote, &credential).await?.record)
}

/// Upserts finalized days into the remote history and writes it back whole.
/// Concurrent pushes race; the last write to land wins.
pub async fn push_days(
    ledger: &DailyLedger,
    remote: &dyn HistoryStore,
    days: &[FinalizedDay],
) -> Result<HistoryRecord, LedgerError> {
    let credential = credential(ledger).await?;
    let RemoteRecord { id, record, .. } = open_record(ledger, remote, &credential).await?;

    let record = days
        .iter()
        .fold(record, |record, day| upsert(record, day.date, day.net));
    remote.replace_record(&credential, &id, &record).await?;

    info!(days = days.len(), record_id = %id, "pushed daily history");
    Ok(record)
}

/// Pushes days carried over by a reset. A failure is logged and queued on
/// the ledger as a notice; local history already holds the days.
pub async fn push_finalized(
    ledger: &DailyLedger,
    remote: &dyn HistoryStore,
    days: &[FinalizedDay],
) -> Result<(), LedgerError> {
    if days.is_empty() {
        return Ok(());
    }
    if let Err(err) = push_days(ledger, remote, days).await {
        warn!("failed to save previous days: {err}");
        ledger
            .queue_notice(format!("Failed to save daily result: {err}"))
            .await?;
    }
    Ok(())
}
