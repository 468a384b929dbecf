pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod ledger;
pub mod models;
pub mod remote;
pub mod state;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod ui;

pub use app::router;
pub use config::AppConfig;
pub use ledger::{DailyLedger, LedgerPolicy};
pub use state::AppState;
pub use storage::{DocumentStore, FileDocumentStore, MemoryDocumentStore};
