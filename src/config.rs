use crate::ledger::{default_reset_time, LedgerPolicy, DEFAULT_BMR};
use crate::models::EntryIdentity;
use crate::remote::GIST_API_BASE;
use crate::stats::DEFAULT_TREND_WINDOW;
use chrono::NaiveTime;
use std::{env, path::PathBuf, str::FromStr};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub port: u16,
    pub policy: LedgerPolicy,
    pub remote_history: bool,
    pub trend: bool,
    pub trend_window: usize,
    pub gist_api_base: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    pub trend_window: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/state.json"));

        let policy = LedgerPolicy {
            bmr: parse_or(&lookup, "CALORIE_BMR", DEFAULT_BMR),
            reset_at: lookup("CALORIE_RESET_TIME")
                .and_then(|raw| parse_setting("CALORIE_RESET_TIME", &raw, parse_reset_time))
                .unwrap_or_else(default_reset_time),
            identity: lookup("CALORIE_ENTRY_IDENTITY")
                .and_then(|raw| parse_setting("CALORIE_ENTRY_IDENTITY", &raw, parse_identity))
                .unwrap_or(EntryIdentity::Timestamp),
            finalize_on_reset: parse_flag(&lookup, "CALORIE_FINALIZE_ON_RESET", true),
        };

        Self {
            data_path,
            port: parse_or(&lookup, "PORT", 8080),
            policy,
            remote_history: parse_flag(&lookup, "CALORIE_REMOTE_HISTORY", true),
            trend: parse_flag(&lookup, "CALORIE_TREND", false),
            trend_window: parse_or(&lookup, "CALORIE_TREND_WINDOW", DEFAULT_TREND_WINDOW),
            gist_api_base: lookup("GIST_API_BASE").unwrap_or_else(|| GIST_API_BASE.to_string()),
        }
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            trend_window: self.trend.then_some(self.trend_window),
        }
    }
}

fn parse_setting<T>(key: &str, raw: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("ignoring invalid {key}={raw:?}, using default");
    }
    parsed
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|raw| parse_setting(key, &raw, |value| value.parse().ok()))
        .unwrap_or(default)
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .and_then(|raw| {
            parse_setting(key, &raw, |value| match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
        })
        .unwrap_or(default)
}

fn parse_reset_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

fn parse_identity(raw: &str) -> Option<EntryIdentity> {
    match raw.to_ascii_lowercase().as_str() {
        "timestamp" => Some(EntryIdentity::Timestamp),
        "date" => Some(EntryIdentity::Date),
        _ => None,
    }
}
