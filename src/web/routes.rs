use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use super::locale::Locale;
use super::views;
use super::AppState;
use crate::constants::FEED_PAGE_SIZE;
use crate::error::FeedError;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
        .route("/api/post", get(api_posts))
        .route("/api/ingest", get(api_ingest).post(api_ingest))
        .route("/:locale", get(locale_home))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    page: Option<String>,
}

impl PageParams {
    /// Requested page. Absent or non-numeric values mean page 1; numeric
    /// values are passed through so that `0` or negatives are rejected.
    fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn root() -> Redirect {
    Redirect::temporary(&format!("/{}", Locale::default().as_str()))
}

async fn health() -> &'static str {
    "ok"
}

// ========== API Routes ==========

async fn api_posts(State(state): State<AppState>, Query(params): Query<PageParams>) -> Response {
    match state
        .feed
        .get_page(params.page(), i64::from(FEED_PAGE_SIZE))
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e @ FeedError::InvalidArgument(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            tracing::error!("Failed to fetch posts: {e:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch posts")
        }
    }
}

async fn api_ingest(State(state): State<AppState>) -> Response {
    let Some(ingestor) = state.ingestor.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Ingestion is not configured",
        );
    };

    match ingestor.run_once().await {
        Ok(report) => Json(report).into_response(),
        Err(e @ FeedError::UpstreamFetch(_)) => {
            tracing::warn!("Ingestion upstream failure: {e}");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
        Err(e) => {
            tracing::error!("Ingestion failed: {e:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Ingestion failed")
        }
    }
}

// ========== HTML Routes ==========

async fn locale_home(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Query(params): Query<PageParams>,
) -> Response {
    let Some(locale) = Locale::from_segment(&segment) else {
        return Redirect::temporary(&format!("/{}", Locale::default().as_str())).into_response();
    };
    if locale.as_str() != segment {
        return Redirect::permanent(&format!("/{}", locale.as_str())).into_response();
    }

    let page_number = params.page().max(1);
    match state
        .feed
        .get_page(page_number, i64::from(FEED_PAGE_SIZE))
        .await
    {
        Ok(page) => {
            let next = page.has_more.then_some(page_number + 1);
            Html(views::render_feed(locale, &page, next).into_string()).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to render feed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(views::render_unavailable(locale).into_string()),
            )
                .into_response()
        }
    }
}
