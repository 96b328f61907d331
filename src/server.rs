//! HTTP surface over the freshness cache.
//!
//! Every data route reads through [`FreshnessCache::get`]; `?refresh=true`
//! forces a collection and `/refresh` always does. Responses carry an
//! `X-Cache` header (`HIT`, `MISS` or `STALE`).

use crate::cache::{CacheResponse, FreshnessCache};
use crate::config::FeedConfig;
use crate::error::ExportError;
use crate::outputs::{csv, feed, json};
use axum::extract::{Query, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FreshnessCache>,
    pub feed: Arc<FeedConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshParams {
    #[serde(default)]
    refresh: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/rss", get(rss))
        .route("/atom", get(atom))
        .route("/json", get(json_records))
        .route("/csv", get(csv_records))
        .route("/status", get(status))
        .route("/refresh", get(refresh).post(refresh))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Serving breach feed");
    axum::serve(listener, router(state)).await
}

fn respond(data: &CacheResponse, content_type: &'static str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type),
            (X_CACHE.clone(), data.cache_status()),
        ],
        body,
    )
        .into_response()
}

fn render_failed(e: ExportError) -> Response {
    error!(error = %e, "Rendering failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

fn status_body(app: &AppState, data: &CacheResponse) -> serde_json::Value {
    json!({
        "cache": {
            "status": data.cache_status(),
            "stale": data.stale,
            "refreshed_at": data.refreshed_at,
            "ttl_secs": app.cache.ttl().as_secs(),
            "records": data.records.len(),
        },
        "report": data.report.as_ref(),
    })
}

#[instrument(level = "info", skip_all)]
async fn index(State(app): State<AppState>) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"UTF-8\"><title>{title}</title></head>\n\
         <body><h1>{title}</h1><p>{description}</p><ul>\n\
         <li><a href=\"/rss\">RSS</a></li>\n\
         <li><a href=\"/atom\">Atom</a></li>\n\
         <li><a href=\"/json\">JSON</a></li>\n\
         <li><a href=\"/csv\">CSV</a></li>\n\
         <li><a href=\"/status\">Source status</a></li>\n\
         </ul><p>Append <code>?refresh=true</code> to force a collection.</p></body></html>\n",
        title = html_escape(&app.feed.title),
        description = html_escape(&app.feed.description),
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[instrument(level = "info", skip_all, fields(refresh = params.refresh))]
async fn rss(State(app): State<AppState>, Query(params): Query<RefreshParams>) -> Response {
    let data = app.cache.get(params.refresh).await;
    let generated_at = data.refreshed_at.unwrap_or_else(Utc::now);
    match feed::render_rss(&data.records, &app.feed, generated_at) {
        Ok(body) => respond(&data, "application/rss+xml; charset=utf-8", body),
        Err(e) => render_failed(e),
    }
}

#[instrument(level = "info", skip_all, fields(refresh = params.refresh))]
async fn atom(State(app): State<AppState>, Query(params): Query<RefreshParams>) -> Response {
    let data = app.cache.get(params.refresh).await;
    let generated_at = data.refreshed_at.unwrap_or_else(Utc::now);
    match feed::render_atom(&data.records, &app.feed, generated_at) {
        Ok(body) => respond(&data, "application/atom+xml; charset=utf-8", body),
        Err(e) => render_failed(e),
    }
}

#[instrument(level = "info", skip_all, fields(refresh = params.refresh))]
async fn json_records(State(app): State<AppState>, Query(params): Query<RefreshParams>) -> Response {
    let data = app.cache.get(params.refresh).await;
    match json::render_records(&data.records) {
        Ok(body) => respond(&data, "application/json", body),
        Err(e) => render_failed(e),
    }
}

#[instrument(level = "info", skip_all, fields(refresh = params.refresh))]
async fn csv_records(State(app): State<AppState>, Query(params): Query<RefreshParams>) -> Response {
    let data = app.cache.get(params.refresh).await;
    match csv::render_records(&data.records) {
        Ok(body) => respond(&data, "text/csv; charset=utf-8", body),
        Err(e) => render_failed(e),
    }
}

#[instrument(level = "info", skip_all, fields(refresh = params.refresh))]
async fn status(State(app): State<AppState>, Query(params): Query<RefreshParams>) -> Response {
    let data = app.cache.get(params.refresh).await;
    let body = status_body(&app, &data);
    ([(X_CACHE.clone(), data.cache_status())], Json(body)).into_response()
}

#[instrument(level = "info", skip_all)]
async fn refresh(State(app): State<AppState>) -> Response {
    let data = app.cache.get(true).await;
    let body = status_body(&app, &data);
    ([(X_CACHE.clone(), data.cache_status())], Json(body)).into_response()
}
