pub mod db;
pub mod payload;
pub mod qdrant;
pub mod schema;
pub mod sessions;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
