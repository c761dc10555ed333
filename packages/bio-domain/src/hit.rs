use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{collection::NORMALIZED_BRIDGE_FIELD, entities::NormalizedBridge};

/// A point returned by the vector store, already carrying its fused or raw score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
	pub id: String,
	pub score: f32,
	pub payload: Map<String, Value>,
}
impl RawHit {
	pub fn normalized_bridge(&self) -> NormalizedBridge {
		self.payload
			.get(NORMALIZED_BRIDGE_FIELD)
			.cloned()
			.and_then(|value| serde_json::from_value(value).ok())
			.unwrap_or_default()
	}

	pub fn str_field(&self, key: &str) -> Option<&str> {
		self.payload.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
	}

	/// Field rendered as a string whether it is stored as a string or a number.
	pub fn text_field(&self, key: &str) -> Option<String> {
		match self.payload.get(key)? {
			Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
			Value::Number(number) => Some(number.to_string()),
			_ => None,
		}
	}

	pub fn list_field(&self, key: &str) -> Vec<String> {
		match self.payload.get(key) {
			Some(Value::Array(items)) =>
				items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
			Some(Value::String(raw)) if !raw.trim().is_empty() => vec![raw.trim().to_string()],
			_ => Vec::new(),
		}
	}

	/// First naming field present, in protein, article, image, structure order.
	pub fn display_name(&self) -> Option<&str> {
		["protein_name", "title", "caption", "pdb_id"].into_iter().find_map(|key| self.str_field(key))
	}

	/// Genes declared directly on the payload, falling back to the normalized bridge.
	pub fn genes(&self) -> Vec<String> {
		let direct = self.list_field("gene_names");

		if direct.is_empty() { self.normalized_bridge().genes } else { direct }
	}
}
