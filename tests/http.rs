use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct EntryResponse {
    date: String,
    consumed: u32,
    burnt: u32,
}

#[derive(Debug, Deserialize)]
struct TodayRow {
    id: String,
    net: i64,
    remaining_after: i64,
}

#[derive(Debug, Deserialize)]
struct TodayView {
    date: String,
    rows: Vec<TodayRow>,
    remaining: i64,
}

#[derive(Debug, Deserialize)]
struct TodayResponse {
    view: TodayView,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    date: String,
    net: i64,
}

#[derive(Debug, Deserialize)]
struct HistorySummary {
    rows: Vec<HistoryRow>,
    classification: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    source: String,
    summary: HistorySummary,
    trend: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteEntryResponse {
    removed: bool,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("calorie_ledger_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/today")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_calorie_ledger"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("CALORIE_REMOTE_HISTORY", "false")
        .env("CALORIE_TREND", "true")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn today(client: &Client, server: &TestServer) -> TodayResponse {
    client
        .get(format!("{}/api/today", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_add_entry_updates_running_balance() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let before = today(&client, &server).await;

    let response = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&serde_json::json!({ "date": before.view.date, "consumed": 2000, "burnt": 300 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let entry: EntryResponse = response.json().await.unwrap();
    assert_eq!(entry.date, before.view.date);
    assert_eq!((entry.consumed, entry.burnt), (2000, 300));

    let after = today(&client, &server).await;
    assert_eq!(after.view.rows.len(), before.view.rows.len() + 1);
    let last = after.view.rows.last().unwrap();
    assert_eq!(last.net, 1700);
    assert_eq!(last.remaining_after, after.view.remaining);
    assert_eq!(after.view.remaining, before.view.remaining - 1700);
}

#[tokio::test]
async fn http_invalid_entry_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let before = today(&client, &server).await;

    let response = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&serde_json::json!({ "date": before.view.date, "consumed": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&serde_json::json!({ "date": "", "consumed": 100, "burnt": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let non_numeric = [
        (serde_json::json!("abc"), serde_json::json!(0)),
        (serde_json::json!(100), serde_json::json!(12.5)),
    ];
    for (consumed, burnt) in non_numeric {
        let response = client
            .post(format!("{}/api/entries", server.base_url))
            .json(&serde_json::json!({ "date": before.view.date, "consumed": consumed, "burnt": burnt }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.text().await.unwrap().contains("must be a number"));
    }

    let response = client
        .post(format!("{}/entries/add", server.base_url))
        .form(&[("date", before.view.date.as_str()), ("consumed", "abc"), ("burnt", "0")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "consumed must be a number (use 0 if needed)");

    let after = today(&client, &server).await;
    assert_eq!(after.view.rows.len(), before.view.rows.len());
}

#[tokio::test]
async fn http_delete_removes_one_entry() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let date = today(&client, &server).await.view.date;
    for consumed in [111, 222] {
        client
            .post(format!("{}/api/entries", server.base_url))
            .json(&serde_json::json!({ "date": date, "consumed": consumed, "burnt": 0 }))
            .send()
            .await
            .unwrap();
    }

    let before = today(&client, &server).await;
    let target = &before.view.rows[before.view.rows.len() - 2];
    let response: DeleteEntryResponse = client
        .post(format!("{}/api/entries/delete", server.base_url))
        .json(&serde_json::json!({ "id": target.id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(response.removed);

    let after = today(&client, &server).await;
    let before_ids: Vec<&str> = before
        .view
        .rows
        .iter()
        .map(|row| row.id.as_str())
        .filter(|id| *id != target.id)
        .collect();
    let after_ids: Vec<&str> = after.view.rows.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(after_ids, before_ids);
}

#[tokio::test]
async fn http_save_result_lands_in_local_history() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let date = today(&client, &server).await.view.date;
    client
        .post(format!("{}/api/entries", server.base_url))
        .json(&serde_json::json!({ "date": date, "consumed": 400, "burnt": 0 }))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/history/save", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let expected: i64 = today(&client, &server)
        .await
        .view
        .rows
        .iter()
        .map(|row| row.net)
        .sum();

    let history: HistoryResponse = client
        .get(format!("{}/api/history", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.source, "local");
    let row = history
        .summary
        .rows
        .iter()
        .find(|row| row.date == date)
        .expect("today saved");
    assert_eq!(row.net, expected);
    assert_eq!(history.summary.classification, if expected > 0 { "excess" } else { "deficit" });
    assert_eq!(history.trend.as_deref(), Some("insufficient_data"));
}

#[tokio::test]
async fn http_index_renders_today() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let date = today(&client, &server).await.view.date;
    let html = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Calorie Ledger"));
    assert!(html.contains(&date));
}
