use serde::{Deserialize, Serialize};

use crate::{collection::CollectionName, modality::SparseVector};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryVector {
	Dense(Vec<f32>),
	Sparse(SparseVector),
}

/// Keeps points whose `field` holds at least one of `any_of`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayloadMatch {
	pub field: String,
	pub any_of: Vec<String>,
}

/// One nearest-neighbour retrieval against a single named slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
	pub collection: CollectionName,
	pub slot: String,
	pub vector: QueryVector,
	/// Every entry must match.
	pub filter: Vec<PayloadMatch>,
	pub limit: usize,
}

/// A point to write into a collection.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedPoint {
	pub id: String,
	pub dense: Vec<(String, Vec<f32>)>,
	pub sparse: Option<(String, SparseVector)>,
	pub payload: serde_json::Map<String, serde_json::Value>,
}
