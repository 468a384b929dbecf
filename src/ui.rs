use crate::models::{
    Classification, DailySummary, HistoryResponse, HistorySource, TodayView, Trend,
};
use std::fmt::Write;

pub struct IndexPage<'a> {
    pub view: &'a TodayView,
    pub summary: &'a DailySummary,
    pub history: &'a HistoryResponse,
    pub remote_enabled: bool,
    pub token_configured: bool,
    pub notice: Option<&'a str>,
}

pub fn render_index(page: &IndexPage<'_>) -> String {
    INDEX_HTML
        .replace("{{DATE}}", &page.view.date.to_string())
        .replace("{{NOTICE}}", &render_notice(page.notice))
        .replace("{{TOKEN}}", &render_token_section(page))
        .replace("{{REMAINING}}", &render_remaining(page.view.remaining))
        .replace("{{ROWS}}", &render_rows(page.view))
        .replace("{{SUMMARY}}", &render_summary(page.summary))
        .replace("{{HISTORY}}", &render_history(page.history))
}

fn status_class(ok: bool) -> &'static str {
    if ok { "positive" } else { "negative" }
}

fn render_notice(notice: Option<&str>) -> String {
    notice
        .map(|text| format!(r#"<p class="notice">{}</p>"#, escape(text)))
        .unwrap_or_default()
}

fn render_token_section(page: &IndexPage<'_>) -> String {
    if !page.remote_enabled || page.token_configured {
        return String::new();
    }
    r#"<section class="card">
      <h2>History storage</h2>
      <form method="post" action="/token">
        <input type="password" name="token" placeholder="GitHub token (gist scope)" />
        <button type="submit">Save token</button>
      </form>
    </section>"#
        .to_string()
}

fn render_remaining(remaining: i64) -> String {
    format!(
        r#"<strong class="{}">{remaining} kcal</strong>"#,
        status_class(remaining >= 0)
    )
}

fn render_rows(view: &TodayView) -> String {
    let mut html = String::new();
    for row in &view.rows {
        let _ = write!(
            html,
            r#"<tr>
          <td>{time}</td>
          <td>{consumed} kcal</td>
          <td>{burnt} kcal</td>
          <td>{net} kcal</td>
          <td class="{class}">{remaining} kcal</td>
          <td><form method="post" action="/entries/delete"><input type="hidden" name="id" value="{id}" /><button class="delete" type="submit">Delete</button></form></td>
        </tr>"#,
            time = row
                .entry
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%H:%M"),
            consumed = row.entry.consumed,
            burnt = row.entry.burnt,
            net = row.net,
            class = status_class(row.remaining_after >= 0),
            remaining = row.remaining_after,
            id = escape(&row.id),
        );
    }
    html
}

fn render_summary(summary: &DailySummary) -> String {
    match summary {
        DailySummary::NoEntries { bmr } => {
            format!("<p>BMR: <strong>{bmr} kcal</strong></p><p>No entries yet today</p>")
        }
        DailySummary::Totals {
            bmr,
            total_consumed,
            total_burnt,
            net_intake,
            remaining,
        } => format!(
            r#"<p>BMR: <strong>{bmr} kcal</strong></p>
        <p>Total Consumed: <strong>{total_consumed} kcal</strong></p>
        <p>Total Burnt: <strong>{total_burnt} kcal</strong></p>
        <p>Net Intake: <strong class="{net_class}">{net_intake} kcal</strong></p>
        <p>Remaining: <strong class="{remaining_class}">{remaining} kcal</strong></p>"#,
            net_class = status_class(*net_intake <= 0),
            remaining_class = status_class(*remaining >= 0),
        ),
    }
}

fn render_history(history: &HistoryResponse) -> String {
    let mut html = render_notice(history.notice.as_deref());
    let summary = &history.summary;

    if summary.rows.is_empty() {
        html.push_str("<p>No history available</p>");
    } else {
        html.push_str(
            "<table><thead><tr><th>Date</th><th>Net Calories</th><th>Status</th></tr></thead><tbody>",
        );
        for row in &summary.rows {
            let deficit = row.classification == Classification::Deficit;
            let _ = write!(
                html,
                r#"<tr><td>{date}</td><td>{sign}{net} kcal</td><td class="{class}">{label}</td></tr>"#,
                date = row.date.format("%b %-d, %Y"),
                sign = if row.net > 0 { "+" } else { "" },
                net = row.net,
                class = status_class(deficit),
                label = if deficit { "Deficit" } else { "Excess" },
            );
        }
        html.push_str("</tbody></table>");
    }

    let _ = write!(
        html,
        r#"<p class="total">Total: <strong>{}</strong> kcal <span class="{}">{}</span></p>"#,
        summary.total_net.abs(),
        status_class(summary.classification == Classification::Deficit),
        summary.classification.as_str(),
    );

    if let Some(trend) = history.trend {
        let label = match trend {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::InsufficientData => "not enough data",
        };
        let _ = write!(html, r#"<p class="trend">Trend: {label}</p>"#);
    }

    if history.source == HistorySource::Local {
        html.push_str(r#"<p class="hint">Showing history saved on this machine.</p>"#);
    }
    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Calorie Ledger</title>
  <style>
    body {
      margin: 0;
      background: #f4f6f3;
      color: #22301f;
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    main {
      width: min(860px, 100%);
      display: grid;
      gap: 20px;
    }

    .card {
      background: white;
      border-radius: 18px;
      padding: 20px 24px;
      box-shadow: 0 12px 32px rgba(34, 48, 31, 0.1);
    }

    h1, h2 {
      margin: 0 0 12px;
    }

    table {
      width: 100%;
      border-collapse: collapse;
    }

    th, td {
      text-align: left;
      padding: 6px 8px;
      border-bottom: 1px solid #e3e8e1;
    }

    form.entry {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(150px, 1fr));
      gap: 12px;
    }

    input, button {
      font: inherit;
      padding: 8px 12px;
      border-radius: 10px;
      border: 1px solid #c9d3c5;
    }

    button {
      background: #3d7a45;
      color: white;
      border: none;
      cursor: pointer;
    }

    button.delete {
      background: #b5473a;
    }

    .positive {
      color: #2d7a4b;
    }

    .negative {
      color: #c63b2b;
    }

    .notice {
      color: #c63b2b;
    }

    .hint {
      color: #6f7a6b;
      font-size: 0.9rem;
    }
  </style>
</head>
<body>
  <main>
    <header>
      <h1>Calorie Ledger</h1>
      <p class="hint">Today: {{DATE}}. Entries reset each morning at the configured time.</p>
      {{NOTICE}}
    </header>

    {{TOKEN}}

    <section class="card">
      <h2>Add entry</h2>
      <form class="entry" method="post" action="/entries/add">
        <input type="date" name="date" value="{{DATE}}" required />
        <input type="number" name="consumed" min="0" placeholder="Consumed kcal" />
        <input type="number" name="burnt" min="0" placeholder="Burnt kcal" />
        <button type="submit">Add</button>
      </form>
    </section>

    <section class="card">
      <h2>Today</h2>
      <p>Remaining: {{REMAINING}}</p>
      <table>
        <thead>
          <tr><th>Time</th><th>Consumed</th><th>Burnt</th><th>Net</th><th>Remaining</th><th></th></tr>
        </thead>
        <tbody>
        {{ROWS}}
        </tbody>
      </table>
    </section>

    <section class="card">
      <h2>Daily summary</h2>
      {{SUMMARY}}
      <form method="post" action="/history/save">
        <button type="submit">Save today's result</button>
      </form>
    </section>

    <section class="card">
      <h2>History</h2>
      {{HISTORY}}
    </section>
  </main>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{summarize, upsert};
    use crate::ledger::today_view;
    use crate::models::{Entry, EntryIdentity, HistoryRecord};
    use chrono::{NaiveDate, Utc};

    fn history(record: &HistoryRecord, trend: Option<Trend>) -> HistoryResponse {
        HistoryResponse {
            source: HistorySource::Remote,
            summary: summarize(record),
            trend,
            notice: None,
        }
    }

    #[test]
    fn renders_rows_with_delete_buttons() {
        let today = Utc::now();
        let entry = Entry {
            timestamp: today,
            date: today.date_naive(),
            consumed: 2000,
            burnt: 300,
        };
        let day = entry.day(EntryIdentity::Timestamp);
        let view = today_view(&[entry.clone()], day, EntryIdentity::Timestamp, 1668);
        let summary = crate::ledger::daily_summary([&entry], 1668);
        let history = history(&HistoryRecord::default(), None);

        let html = render_index(&IndexPage {
            view: &view,
            summary: &summary,
            history: &history,
            remote_enabled: true,
            token_configured: true,
            notice: None,
        });

        assert!(html.contains(r#"<td class="negative">-32 kcal</td>"#));
        assert!(html.contains(&format!(r#"value="{}""#, entry.id(EntryIdentity::Timestamp))));
        assert!(html.contains("Net Intake: <strong class=\"negative\">1700 kcal</strong>"));
        assert!(html.contains("No history available"));
        assert!(!html.contains("Save token"));
    }

    #[test]
    fn history_panel_shows_total_and_trend() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 6, d).unwrap();
        let record = upsert(upsert(HistoryRecord::default(), day(1), 300), day(2), -500);
        let html = render_history(&history(&record, Some(Trend::Decreasing)));

        assert!(html.contains("+300 kcal"));
        assert!(html.contains("Total: <strong>200</strong> kcal <span class=\"positive\">deficit</span>"));
        assert!(html.contains("Trend: decreasing"));
    }

    #[test]
    fn notices_are_escaped() {
        assert_eq!(
            render_notice(Some("<b>boom</b>")),
            r#"<p class="notice">&lt;b&gt;boom&lt;/b&gt;</p>"#
        );
    }
}
