pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{kind} vector must have {expected} dimensions, got {actual}.")]
	DimensionMismatch { kind: &'static str, expected: usize, actual: usize },
	#[error("Unknown collection {name:?}.")]
	UnknownCollection { name: String },
	#[error("Unknown choice {value:?}.")]
	UnknownChoice { value: String },
}
