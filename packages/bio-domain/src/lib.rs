pub mod article;
pub mod collection;
pub mod entities;
pub mod hit;
pub mod modality;
pub mod query;
pub mod track;

mod error;

pub use error::{Error, Result};
