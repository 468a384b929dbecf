use crate::config::ViewOptions;
use crate::ledger::DailyLedger;
use crate::remote::HistoryStore;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<DailyLedger>>,
    pub remote: Option<Arc<dyn HistoryStore>>,
    pub options: ViewOptions,
}

impl AppState {
    pub fn new(
        ledger: DailyLedger,
        remote: Option<Arc<dyn HistoryStore>>,
        options: ViewOptions,
    ) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            remote,
            options,
        }
    }
}
