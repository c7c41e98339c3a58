use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use podium_aoc::FetchError;
use podium_store::StoreError;
use podium_types::Problem;

use crate::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize, Default)]
struct PersistQuery {
    #[serde(rename = "viewKey")]
    view_key: Option<String>,
}

pub fn main_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/getLocalScoreHistory/{eventYear}/{leaderboardId}",
            get(get_history),
        )
        .route(
            "/persistCurrentLocalScores/{eventYear}/{leaderboardId}",
            post(persist_current_scores),
        )
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .with_state(state)
}

pub fn health_router() -> Router {
    Router::new().route("/healthz", get(health))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "msg": "ok" }))
}

async fn get_history(
    State(state): State<AppState>,
    Path((event_year, leaderboard_id)): Path<(String, String)>,
) -> Response {
    match state.store.read(&event_year, &leaderboard_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(StoreError::NotFound) => problem_response(
            StatusCode::NOT_FOUND,
            Problem::new(StatusCode::NOT_FOUND.as_u16()).with_title("leaderboard not found"),
        ),
        Err(err @ StoreError::InvalidId(_)) => problem_response(
            StatusCode::BAD_REQUEST,
            Problem::new(StatusCode::BAD_REQUEST.as_u16())
                .with_title("invalid leaderboard identifier")
                .with_detail(err.to_string()),
        ),
        Err(err) => {
            error!(%event_year, %leaderboard_id, error = %err, "history read failed");
            problem_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                Problem::new(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
                    .with_title("failed fetching historic scores")
                    .with_detail(err.to_string()),
            )
        }
    }
}

async fn persist_current_scores(
    State(state): State<AppState>,
    Path((event_year, leaderboard_id)): Path<(String, String)>,
    Query(query): Query<PersistQuery>,
) -> Response {
    let view_key = query.view_key.unwrap_or_default();

    let snapshot = match state
        .source
        .fetch(&event_year, &leaderboard_id, &view_key)
        .await
    {
        Ok(snapshot) => snapshot,
        Err(FetchError::Unauthorized) => {
            // Status only; nothing about the key leaves the process.
            return problem_response(
                StatusCode::UNAUTHORIZED,
                Problem::new(StatusCode::UNAUTHORIZED.as_u16()),
            );
        }
        Err(err) => {
            error!(%event_year, %leaderboard_id, error = %err, "leaderboard fetch failed");
            return problem_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                Problem::new(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
                    .with_title("failed fetching current leaderboard status")
                    .with_detail(err.to_string()),
            );
        }
    };

    if let Err(err) = state.store.append_snapshot(&snapshot).await {
        error!(%event_year, %leaderboard_id, error = %err, "persisting scores failed");
        return problem_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Problem::new(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
                .with_title("failed persisting current leaderboard status")
                .with_detail(err.to_string()),
        );
    }

    info!(
        %event_year,
        owner_id = snapshot.owner_id,
        members = snapshot.members.len(),
        "scores persisted"
    );
    StatusCode::CREATED.into_response()
}

fn problem_response(status: StatusCode, body: Problem) -> Response {
    (status, Json(body)).into_response()
}
