//! HTTP API over the timer engine.
//!
//! Engine calls are synchronous SQLite transactions, so every handler hops
//! onto the blocking pool.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use clap::Args;
use habitimer_core::{Clock, Config, CoreError, HabitId, NewHabit, TimerEngine, TimerStatus};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use super::{open_engine, CmdResult};

#[derive(Args)]
pub struct ServeArgs {
    /// Bind host (defaults to server.host)
    #[arg(long)]
    pub host: Option<String>,
    /// Bind port (defaults to server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub struct AppState<C: Clock> {
    engine: Arc<TimerEngine<C>>,
    default_target_minutes: u32,
}

impl<C: Clock> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            default_target_minutes: self.default_target_minutes,
        }
    }
}

impl<C: Clock> AppState<C> {
    pub fn new(engine: Arc<TimerEngine<C>>, default_target_minutes: u32) -> Self {
        Self {
            engine,
            default_target_minutes,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        C: 'static,
        T: Send + 'static,
        F: FnOnce(&TimerEngine<C>) -> habitimer_core::Result<T> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| ApiError(CoreError::Custom(format!("handler task failed: {e}"))))?
            .map_err(ApiError)
    }
}

pub struct ApiError(CoreError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TimerRequest {
    #[serde(default)]
    pub habit_id: Option<HabitId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionsQuery {
    pub habit_id: Option<HabitId>,
    pub limit: Option<usize>,
}

pub fn router<C: Clock + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/api/habits", get(list_habits::<C>).post(create_habit::<C>))
        .route("/api/habits/{id}", delete(delete_habit::<C>))
        .route("/api/habits/{id}/remaining", get(habit_remaining::<C>))
        .route("/api/timer", get(timer_status::<C>).post(timer_toggle::<C>))
        .route("/api/timer/stop", post(timer_stop::<C>))
        .route("/api/timer/reset/{id}", post(timer_reset::<C>))
        .route("/api/sessions", get(list_sessions::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_habits<C: Clock + 'static>(State(state): State<AppState<C>>) -> Result<Response, ApiError> {
    let views = state.blocking(|engine| engine.overview()).await?;
    Ok(Json(views).into_response())
}

async fn create_habit<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Json(input): Json<NewHabit>,
) -> Result<Response, ApiError> {
    let default_target = state.default_target_minutes;
    let habit = state
        .blocking(move |engine| {
            let now = engine.clock().now();
            engine.database()?.create_habit(&input, default_target, now)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(habit)).into_response())
}

async fn delete_habit<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<HabitId>,
) -> Result<StatusCode, ApiError> {
    state
        .blocking(move |engine| engine.database()?.delete_habit(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn habit_remaining<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<HabitId>,
) -> Result<Response, ApiError> {
    let remaining = state.blocking(move |engine| engine.daily_remaining(id)).await?;
    Ok(Json(serde_json::json!({ "habit_id": id, "remaining_seconds": remaining })).into_response())
}

async fn timer_status<C: Clock + 'static>(State(state): State<AppState<C>>) -> Result<Response, ApiError> {
    let status = state.blocking(|engine| engine.status()).await?;
    Ok(Json(status).into_response())
}

/// Start or switch to `habit_id`; with no habit, stop whatever is running.
async fn timer_toggle<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Json(req): Json<TimerRequest>,
) -> Result<Response, ApiError> {
    match req.habit_id {
        Some(id) => {
            let status = state
                .blocking(move |engine| {
                    let slot = engine.start(id)?;
                    Ok(TimerStatus::derive(slot, engine.clock().now()))
                })
                .await?;
            Ok(Json(status).into_response())
        }
        None => {
            let outcome = state.blocking(|engine| engine.stop(None)).await?;
            Ok(Json(outcome).into_response())
        }
    }
}

async fn timer_stop<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Query(req): Query<TimerRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.blocking(move |engine| engine.stop(req.habit_id)).await?;
    Ok(Json(outcome).into_response())
}

async fn timer_reset<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<HabitId>,
) -> Result<Response, ApiError> {
    let row = state.blocking(move |engine| engine.reset(id)).await?;
    Ok(Json(row).into_response())
}

async fn list_sessions<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Query(q): Query<SessionsQuery>,
) -> Result<Response, ApiError> {
    let limit = q.limit.unwrap_or(50);
    let sessions = state
        .blocking(move |engine| engine.database()?.list_sessions(q.habit_id, limit))
        .await?;
    Ok(Json(sessions).into_response())
}

pub fn run(args: ServeArgs) -> CmdResult {
    let config = Config::load()?;
    let engine = Arc::new(open_engine(&config)?);
    let mut server = config.server.clone();
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    let addr = server.bind_addr();
    let app = router(AppState::new(engine, config.habits.default_target_minutes));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
        tracing::info!("habitimer listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down");
            })
            .await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
