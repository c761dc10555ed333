use serde::{Deserialize, Serialize};

use crate::{Error, Result, collection::CollectionName};

/// Vector families produced by the encoders. Each lives in its own space and is never mixed with
/// another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
	Text,
	Sequence,
	Image,
	Structure,
}
impl Modality {
	/// Non-text modalities in primary-selection order.
	pub const PRECEDENCE: [Self; 3] = [Self::Sequence, Self::Structure, Self::Image];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Text => "text",
			Self::Sequence => "sequence",
			Self::Image => "image",
			Self::Structure => "structure",
		}
	}

	pub fn dimension(self) -> usize {
		let dims = match self {
			Self::Text => bio_config::TEXT_DIMENSIONS,
			Self::Sequence => bio_config::SEQUENCE_DIMENSIONS,
			Self::Image => bio_config::IMAGE_DIMENSIONS,
			Self::Structure => bio_config::STRUCTURE_DIMENSIONS,
		};

		dims as usize
	}

	/// The collection whose dense slot shares this modality's vector space. Text has none.
	pub fn native_collection(self) -> Option<CollectionName> {
		match self {
			Self::Text => None,
			Self::Sequence => Some(CollectionName::Proteins),
			Self::Image => Some(CollectionName::Images),
			Self::Structure => Some(CollectionName::Structures),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
	pub indices: Vec<u32>,
	pub values: Vec<f32>,
}
impl SparseVector {
	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredVector")]
pub struct ModalityVector {
	kind: Modality,
	values: Vec<f32>,
	sparse: Option<SparseVector>,
}
impl ModalityVector {
	pub fn new(kind: Modality, values: Vec<f32>) -> Result<Self> {
		let expected = kind.dimension();

		if values.len() != expected {
			return Err(Error::DimensionMismatch {
				kind: kind.as_str(),
				expected,
				actual: values.len(),
			});
		}

		Ok(Self { kind, values, sparse: None })
	}

	/// Attaches the sparse term weights. Only text vectors carry them.
	pub fn with_sparse(mut self, sparse: SparseVector) -> Self {
		if self.kind == Modality::Text && !sparse.is_empty() {
			self.sparse = Some(sparse);
		}

		self
	}

	pub fn kind(&self) -> Modality {
		self.kind
	}

	pub fn values(&self) -> &[f32] {
		&self.values
	}

	pub fn sparse(&self) -> Option<&SparseVector> {
		self.sparse.as_ref()
	}
}

/// Wire shape of a persisted vector; converting it re-checks the width.
#[derive(Deserialize)]
struct StoredVector {
	kind: Modality,
	values: Vec<f32>,
	#[serde(default)]
	sparse: Option<SparseVector>,
}
impl TryFrom<StoredVector> for ModalityVector {
	type Error = Error;

	fn try_from(stored: StoredVector) -> Result<Self> {
		let vector = Self::new(stored.kind, stored.values)?;

		Ok(match stored.sparse {
			Some(sparse) => vector.with_sparse(sparse),
			None => vector,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_wrong_width() {
		let err = ModalityVector::new(Modality::Image, vec![0.0; 768])
			.expect_err("Expected dimension mismatch.");

		assert!(err.to_string().contains("image vector must have 512 dimensions, got 768."));
	}

	#[test]
	fn sparse_terms_only_attach_to_text() {
		let sparse = SparseVector { indices: vec![1], values: vec![1.0] };
		let sequence = ModalityVector::new(Modality::Sequence, vec![0.0; 1_280])
			.expect("Sequence width must be accepted.")
			.with_sparse(sparse.clone());
		let text = ModalityVector::new(Modality::Text, vec![0.0; 768])
			.expect("Text width must be accepted.")
			.with_sparse(sparse);

		assert!(sequence.sparse().is_none());
		assert!(text.sparse().is_some());
	}

	#[test]
	fn restored_vectors_are_width_checked() {
		let short = vec![0.0_f32; 768];
		let err = serde_json::from_value::<ModalityVector>(serde_json::json!({
			"kind": "sequence",
			"values": short,
			"sparse": null,
		}))
		.expect_err("A stored vector of the wrong width must be rejected.");

		assert!(err.to_string().contains("sequence vector must have 1280 dimensions, got 768."));

		let text = ModalityVector::new(Modality::Text, vec![0.5; 768])
			.expect("Text width must be accepted.")
			.with_sparse(SparseVector { indices: vec![7], values: vec![1.0] });
		let restored: ModalityVector = serde_json::from_value(
			serde_json::to_value(&text).expect("Failed to serialize vector."),
		)
		.expect("A valid stored vector must restore.");

		assert_eq!(restored, text);
	}
}
