//! HTTP surface of the worker: health checking and job dispatch.
//!
//! The hosting side (a LiveKit webhook, a console, a dispatcher) posts a
//! job naming a room; the worker spawns one session task per job and
//! acknowledges immediately.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::session::{JobContext, run_session};
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct DispatchRequest {
    pub room_name: String,
}

#[derive(Serialize, Debug)]
pub struct DispatchResponse {
    pub session_id: Uuid,
    pub room_name: String,
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Creates the worker router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/jobs", post(dispatch_job))
        .with_state(app_state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Accepts a job and spawns its agent session.
pub(crate) async fn dispatch_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DispatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room_name = request.room_name.trim().to_string();
    if room_name.is_empty() {
        return Err(ApiError::BadRequest("room_name is required".to_string()));
    }

    let job = JobContext {
        session_id: Uuid::new_v4(),
        room_name: room_name.clone(),
    };
    let session_id = job.session_id;

    let span = info_span!("agent_session", %session_id, room = %job.room_name);
    tokio::spawn(
        async move {
            if let Err(error) = run_session(state, job).await {
                error!(?error, "agent session terminated with error");
            } else {
                info!("agent session finished");
            }
        }
        .instrument(span),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            session_id,
            room_name,
        }),
    ))
}
