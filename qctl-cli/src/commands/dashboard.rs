//! Read-only web dashboard.
//!
//! Polls the store through the admin façade; never mutates state. One
//! HTML page with auto-refresh plus JSON endpoints for scripting.

use std::net::SocketAddr;
use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use tracing::info;

use crate::commands::open_store;
use qctl::prelude::{Admin, Job, JobFilter, QueueMetrics, StoreError};
use qctl_sqlite::SqliteStore;

/// Arguments for the dashboard
#[derive(Debug, Args)]
pub struct DashboardArgs {
    /// Address to serve the dashboard on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,
}

type Dash = Admin<SqliteStore>;

/// Execute the dashboard command
pub async fn execute(args: &DashboardArgs, db: &Path) -> anyhow::Result<()> {
    let admin = Admin::new(open_store(db).await?);
    let app = Router::new()
        .route("/", get(index))
        .route("/api/jobs", get(api_jobs))
        .route("/api/status", get(api_status))
        .with_state(admin);

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!("Dashboard listening on http://{}", args.addr);
    axum::serve(listener, app).await?;
    Ok(())
}

struct DashError(StoreError);

impl From<StoreError> for DashError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for DashError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

async fn api_jobs(State(admin): State<Dash>) -> Result<Json<Vec<Job>>, DashError> {
    Ok(Json(admin.list(JobFilter::default()).await?))
}

async fn api_status(State(admin): State<Dash>) -> Result<Json<serde_json::Value>, DashError> {
    let counts = admin.counts().await?;
    let metrics = admin.metrics().await?;
    Ok(Json(serde_json::json!({
        "counts": counts,
        "metrics": metrics,
    })))
}

async fn index(State(admin): State<Dash>) -> Result<Html<String>, DashError> {
    let metrics = admin.metrics().await?;
    let jobs = admin.list(JobFilter::default()).await?;
    Ok(Html(render(&metrics, &jobs)))
}

fn render(metrics: &QueueMetrics, jobs: &[Job]) -> String {
    let mut rows = String::new();
    for job in jobs {
        rows.push_str(&format!(
            "<tr><td>{id}</td><td>{cmd}</td>\
             <td><span class=\"badge {state}\">{state}</span></td>\
             <td>{attempts}</td><td>{priority}</td><td>{updated}</td></tr>\n",
            id = escape(&job.id),
            cmd = escape(&job.command),
            state = job.state,
            attempts = job.attempts,
            priority = job.priority,
            updated = job.updated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta http-equiv="refresh" content="5">
<title>qctl dashboard</title>
<style>
body {{ font-family: sans-serif; margin: 40px; color: #333; }}
table {{ border-collapse: collapse; width: 100%; margin-top: 20px; }}
th {{ background: #00853f; color: white; padding: 10px; text-align: left; }}
td {{ border-bottom: 1px solid #ddd; padding: 8px; }}
tr:nth-child(even) {{ background: #f2f2f2; }}
.stats {{ display: flex; gap: 16px; }}
.stat-box {{ background: #e9f8ee; border: 1px solid #b3e6c2; border-radius: 8px; padding: 10px 20px; }}
.badge {{ padding: 4px 10px; border-radius: 8px; font-size: 13px; color: white; }}
.completed {{ background: #22c55e; }}
.processing {{ background: #facc15; color: black; }}
.pending {{ background: #9ca3af; }}
.dead {{ background: #ef4444; }}
</style>
</head>
<body>
<h1>qctl dashboard</h1>
<div class="stats">
<div class="stat-box">Total: {total}</div>
<div class="stat-box">Completed: {completed}</div>
<div class="stat-box">Failed: {failed}</div>
<div class="stat-box">Dead: {dead}</div>
</div>
<table>
<tr><th>ID</th><th>Command</th><th>State</th><th>Attempts</th><th>Priority</th><th>Updated</th></tr>
{rows}</table>
</body>
</html>
"#,
        total = metrics.total,
        completed = metrics.completed,
        failed = metrics.failed,
        dead = metrics.dead,
        rows = rows,
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use qctl::prelude::{JobState, Utc};

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn render_includes_jobs_and_stats() {
        let job = Job {
            id: "render-me".into(),
            command: "echo <hi>".into(),
            state: JobState::Pending,
            priority: 0,
            attempts: 0,
            max_retries: 3,
            timeout_seconds: 30,
            run_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            claimed_by: None,
            last_error: None,
            exit_code: None,
        };
        let metrics = QueueMetrics {
            total: 1,
            ..Default::default()
        };

        let html = render(&metrics, &[job]);
        assert!(html.contains("render-me"));
        assert!(html.contains("echo &lt;hi&gt;"));
        assert!(html.contains("Total: 1"));
        assert!(!html.contains("<hi>"));
    }
}
