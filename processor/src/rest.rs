use crate::metrics::{DASHBOARD_QUERY_FAILURES_TOTAL, DASHBOARD_REQUESTS_TOTAL};
use crate::model::{EventsResponse, StoredRow};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::MySqlPool;
use std::fmt::Write;
use tracing::error;

#[derive(Debug, Clone)]
struct AppState {
    pool: MySqlPool,
    table: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    device_id: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// `table` must already have passed `params::validate_identifier`.
pub fn create_router(pool: MySqlPool, table: String) -> Router {
    let state = AppState { pool, table };

    Router::new()
        .route("/", get(index))
        .route("/api/v1/events", get(get_events))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    DASHBOARD_REQUESTS_TOTAL.with_label_values(&["index"]).inc();
    let query = format!(
        "SELECT id, device_id, event_type, value, value_celsius, timestamp FROM {} ORDER BY id DESC",
        state.table
    );
    let rows = sqlx::query_as::<_, StoredRow>(&query)
        .fetch_all(&state.pool)
        .await?;

    Ok(Html(render_table(&rows)))
}

async fn get_events(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, AppError> {
    DASHBOARD_REQUESTS_TOTAL.with_label_values(&["events"]).inc();
    let limit = params.limit.unwrap_or(100).min(1000);
    let offset = params.offset.unwrap_or(0);

    let where_clause = if params.device_id.is_some() {
        "WHERE device_id = ?"
    } else {
        ""
    };

    let query = format!(
        "SELECT id, device_id, event_type, value, value_celsius, timestamp
         FROM {}
         {}
         ORDER BY id DESC
         LIMIT {} OFFSET {}",
        state.table, where_clause, limit, offset
    );

    let mut query_builder = sqlx::query_as::<_, StoredRow>(&query);
    if let Some(device_id) = &params.device_id {
        query_builder = query_builder.bind(device_id);
    }

    let rows = query_builder.fetch_all(&state.pool).await?;

    Ok(Json(EventsResponse {
        total: rows.len(),
        data: rows,
        limit,
        offset,
    }))
}

pub fn render_table(rows: &[StoredRow]) -> String {
    let mut html = String::from(
        "<h2>Event Data</h2><table border=\"1\"><tr><th>ID</th><th>Device ID</th>\
         <th>Event Type</th><th>Value</th><th>Celsius</th><th>Timestamp</th></tr>",
    );

    for row in rows {
        let celsius = row
            .value_celsius
            .map(|c| c.to_string())
            .unwrap_or_default();
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            row.id,
            escape_html(&row.device_id),
            escape_html(&row.event_type),
            row.value,
            celsius,
            row.timestamp
        );
    }

    html.push_str("</table>");
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        DASHBOARD_QUERY_FAILURES_TOTAL.inc();
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
