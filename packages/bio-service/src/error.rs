use uuid::Uuid;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Collection unavailable: {collection}")]
	CollectionUnavailable { collection: String },
	#[error("Encoder failure for {modality}: {message}")]
	EncoderFailure { modality: String, message: String },
	#[error("Bridge generation failed: {message}")]
	BridgeGenerationFailed { message: String },
	#[error("Search on {collection} timed out after {timeout_ms} ms.")]
	SearchTimeout { collection: String, timeout_ms: u64 },
	#[error("Clarification window for session {session_id} expired.")]
	ClarificationExpired { session_id: Uuid },
	#[error("Session not found: {session_id}")]
	SessionNotFound { session_id: Uuid },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
}
impl From<bio_storage::Error> for Error {
	fn from(err: bio_storage::Error) -> Self {
		match err {
			bio_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			bio_storage::Error::CollectionUnavailable(collection) =>
				Self::CollectionUnavailable { collection },
			bio_storage::Error::InvalidArgument(message) => Self::InvalidInput { message },
			bio_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}

impl From<bio_domain::Error> for Error {
	fn from(err: bio_domain::Error) -> Self {
		match err {
			bio_domain::Error::DimensionMismatch { kind, .. } =>
				Self::EncoderFailure { modality: kind.to_string(), message: err.to_string() },
			other => Self::InvalidInput { message: other.to_string() },
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Storage { message: format!("Failed to encode search state: {err}") }
	}
}
