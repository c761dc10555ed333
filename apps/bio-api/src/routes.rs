use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use bio_service::{Error, RecommendRequest, RecommendResponse, ResumeRequest};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/recommend", post(recommend))
		.route("/v1/recommend/resume", post(resume))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// A paused search answers 200 with `needs_clarification` set.
async fn recommend(
	State(state): State<AppState>,
	payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
	let Json(payload) = payload?;
	let outcome = state.service.recommend(payload).await?;

	Ok(Json(outcome.into_response()))
}

async fn resume(
	State(state): State<AppState>,
	payload: Result<Json<ResumeRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.resume(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
		Self { status, error_code, message: message.into(), fields: None }
	}

	fn with_fields(mut self, fields: Vec<String>) -> Self {
		self.fields = Some(fields);

		self
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match &err {
			Error::InvalidInput { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_input", err.to_string()),
			Error::SessionNotFound { .. } =>
				Self::new(StatusCode::NOT_FOUND, "session_not_found", err.to_string())
					.with_fields(vec!["session_id".to_string()]),
			Error::Provider { .. } | Error::EncoderFailure { .. } | Error::Qdrant { .. } => {
				tracing::error!(error = %err, "Upstream dependency failed.");

				Self::new(StatusCode::BAD_GATEWAY, "upstream_error", err.to_string())
			},
			_ => {
				tracing::error!(error = %err, "Request failed.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string())
			},
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "invalid_input", rejection.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code.to_string(),
			message: self.message,
			fields: self.fields,
		};

		(self.status, Json(body)).into_response()
	}
}
