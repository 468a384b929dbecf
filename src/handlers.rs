use crate::errors::{AppError, LedgerError};
use crate::history::finalize_day;
use crate::ledger::{daily_summary, DailyLedger};
use crate::models::{
    AddEntryRequest, DeleteEntryRequest, DeleteEntryResponse, Entry, EntryForm, FinalizedDay,
    HistoryResponse, HistorySource, ResetOutcome, ResetResponse, SaveResultResponse,
    TodayResponse, TokenRequest,
};
use crate::state::AppState;
use crate::stats::build_history_stats;
use crate::sync;
use crate::ui::{render_index, IndexPage};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use chrono::Local;
use tracing::{info, warn};

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    let view = ledger.today_view().await?;
    let summary = daily_summary(view.rows.iter().map(|row| &row.entry), ledger.policy().bmr);
    let history = load_history(&state, &ledger).await?;
    let token_configured = ledger.credential().await?.is_some();
    let notice = ledger.take_notices().await?;

    Ok(Html(render_index(&IndexPage {
        view: &view,
        summary: &summary,
        history: &history,
        remote_enabled: state.remote.is_some(),
        token_configured,
        notice: notice.as_deref(),
    })))
}

pub async fn get_today(State(state): State<AppState>) -> Result<Json<TodayResponse>, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    let view = ledger.today_view().await?;
    let summary = daily_summary(view.rows.iter().map(|row| &row.entry), ledger.policy().bmr);
    let notice = ledger.take_notices().await?;

    Ok(Json(TodayResponse {
        view,
        summary,
        notice,
    }))
}

pub async fn add_entry(
    State(state): State<AppState>,
    Json(payload): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<Entry>), AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    let entry = ledger
        .add_entry(&payload.date, payload.consumed, payload.burnt)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn add_entry_form(
    State(state): State<AppState>,
    Form(form): Form<EntryForm>,
) -> Result<Redirect, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    ledger
        .add_entry(&form.date, parse_kcal_field(&form.consumed), parse_kcal_field(&form.burnt))
        .await?;
    Ok(Redirect::to("/"))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Json(payload): Json<DeleteEntryRequest>,
) -> Result<Json<DeleteEntryResponse>, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    let removed = ledger.delete_entry(&payload.id).await?;
    Ok(Json(DeleteEntryResponse { removed }))
}

pub async fn delete_entry_form(
    State(state): State<AppState>,
    Form(form): Form<DeleteEntryRequest>,
) -> Result<Redirect, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    ledger.delete_entry(&form.id).await?;
    Ok(Redirect::to("/"))
}

pub async fn reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, AppError> {
    let ledger = state.ledger.lock().await;
    let outcome = run_reset_check(&state, &ledger).await?;
    let notice = ledger.take_notices().await?;
    Ok(Json(ResetResponse { outcome, notice }))
}

pub async fn get_history(State(state): State<AppState>) -> Result<Json<HistoryResponse>, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    let mut history = load_history(&state, &ledger).await?;
    history.notice = join_notices(ledger.take_notices().await?, history.notice);
    Ok(Json(history))
}

pub async fn save_result(
    State(state): State<AppState>,
) -> Result<Json<SaveResultResponse>, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    let mut saved = save_today(&state, &ledger).await?;
    saved.notice = join_notices(ledger.take_notices().await?, saved.notice);
    Ok(Json(saved))
}

pub async fn save_result_form(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let ledger = state.ledger.lock().await;
    run_reset_check(&state, &ledger).await?;
    let saved = save_today(&state, &ledger).await?;
    if let Some(notice) = saved.notice {
        return Err(AppError::bad_gateway(notice));
    }
    Ok(Redirect::to("/"))
}

pub async fn save_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<StatusCode, AppError> {
    let ledger = state.ledger.lock().await;
    ledger.set_credential(&payload.token).await?;
    info!("history token saved");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn save_token_form(
    State(state): State<AppState>,
    Form(form): Form<TokenRequest>,
) -> Result<Redirect, AppError> {
    let ledger = state.ledger.lock().await;
    ledger.set_credential(&form.token).await?;
    info!("history token saved");
    Ok(Redirect::to("/"))
}

/// Applies the daily reset if it is due and pushes any carried-over days to
/// the remote history. A failed push is queued as a notice for the next page
/// or read, never retried.
async fn run_reset_check(state: &AppState, ledger: &DailyLedger) -> Result<ResetOutcome, AppError> {
    let outcome = ledger.check_and_apply_reset(Local::now()).await?;
    if let (ResetOutcome::Applied { finalized, .. }, Some(remote)) =
        (&outcome, state.remote.as_deref())
    {
        sync::push_finalized(ledger, remote, finalized).await?;
    }
    Ok(outcome)
}

fn join_notices(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(first), Some(second)) => Some(format!("{first}; {second}")),
        (first, second) => first.or(second),
    }
}

async fn load_history(state: &AppState, ledger: &DailyLedger) -> Result<HistoryResponse, AppError> {
    let (source, record, notice) = match state.remote.as_deref() {
        None => (HistorySource::Local, ledger.history().await?, None),
        Some(remote) => match sync::fetch_history(ledger, remote).await {
            Ok(record) => (HistorySource::Remote, record, None),
            Err(LedgerError::StoreUnavailable(_)) => (
                HistorySource::Local,
                ledger.history().await?,
                Some("Set up GitHub token to view history".to_string()),
            ),
            Err(err @ LedgerError::Network(_)) => {
                warn!("error loading history: {err}");
                (
                    HistorySource::Local,
                    ledger.history().await?,
                    Some(format!("Error loading history: {err}")),
                )
            }
            Err(err) => return Err(err.into()),
        },
    };

    let (summary, trend) = build_history_stats(&record, state.options.trend_window);
    Ok(HistoryResponse {
        source,
        summary,
        trend,
        notice,
    })
}

async fn save_today(state: &AppState, ledger: &DailyLedger) -> Result<SaveResultResponse, AppError> {
    let view = ledger.today_view().await?;
    if view.rows.is_empty() {
        return Err(LedgerError::validation("No entries to save for today").into());
    }

    let net = finalize_day(view.rows.iter().map(|row| &row.entry));
    ledger.record_day(view.date, net).await?;

    let (synced, notice) = match state.remote.as_deref() {
        None => (false, None),
        Some(remote) => {
            let day = FinalizedDay { date: view.date, net };
            match sync::push_days(ledger, remote, &[day]).await {
                Ok(_) => (true, None),
                Err(err) => {
                    warn!("failed to save daily result: {err}");
                    (false, Some(format!("Failed to save daily result: {err}")))
                }
            }
        }
    };

    info!(date = %view.date, net, synced, "saved daily result");
    Ok(SaveResultResponse {
        date: view.date,
        net,
        synced,
        notice,
    })
}

fn parse_kcal_field(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}
