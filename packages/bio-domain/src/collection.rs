//! Immutable registry of the five searchable collections.
//!
//! Each collection declares its named dense slots, its single sparse slot, and the payload fields
//! the store indexes for filtering. The registry is process-wide and read-only.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, modality::Modality};

/// Payload path holding the per-point entity sets used for filtering and overlap scoring.
pub const NORMALIZED_BRIDGE_FIELD: &str = "normalized_bridge";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
	Proteins,
	Articles,
	Images,
	Experiments,
	Structures,
}
impl CollectionName {
	pub const ALL: [Self; 5] =
		[Self::Proteins, Self::Articles, Self::Images, Self::Experiments, Self::Structures];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Proteins => "proteins",
			Self::Articles => "articles",
			Self::Images => "images",
			Self::Experiments => "experiments",
			Self::Structures => "structures",
		}
	}

	/// Singular label used for graph node types.
	pub fn singular(self) -> &'static str {
		match self {
			Self::Proteins => "protein",
			Self::Articles => "article",
			Self::Images => "image",
			Self::Experiments => "experiment",
			Self::Structures => "structure",
		}
	}

	pub fn spec(self) -> &'static CollectionSpec {
		match self {
			Self::Proteins => &PROTEINS,
			Self::Articles => &ARTICLES,
			Self::Images => &IMAGES,
			Self::Experiments => &EXPERIMENTS,
			Self::Structures => &STRUCTURES,
		}
	}

	/// Dense slot that holds text embeddings for this collection.
	pub fn text_slot(self) -> &'static str {
		self.spec().text_slot
	}

	pub fn sparse_slot(self) -> &'static str {
		self.spec().sparse_slot
	}

	/// Whether Phase-3 searches may constrain this collection by bridge entities.
	pub fn accepts_entity_filter(self) -> bool {
		!matches!(self, Self::Articles)
	}

	/// Default query used when the bridge cannot produce one and there is no user text.
	pub fn fallback_query(self) -> &'static str {
		match self {
			Self::Proteins => "protein structure",
			Self::Articles => "protein function",
			Self::Images => "pathway diagram",
			Self::Experiments => "gene expression",
			Self::Structures => "protein 3D structure",
		}
	}

	pub fn others(self) -> impl Iterator<Item = Self> {
		Self::ALL.into_iter().filter(move |name| *name != self)
	}
}
impl fmt::Display for CollectionName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for CollectionName {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|name| name.as_str().eq_ignore_ascii_case(raw.trim()))
			.ok_or_else(|| Error::UnknownCollection { name: raw.to_string() })
	}
}

#[derive(Debug)]
pub struct DenseSlot {
	pub name: &'static str,
	pub modality: Modality,
}

#[derive(Debug)]
pub struct CollectionSpec {
	pub name: CollectionName,
	pub dense_slots: &'static [DenseSlot],
	pub text_slot: &'static str,
	pub sparse_slot: &'static str,
	pub payload_indexes: &'static [&'static str],
}
impl CollectionSpec {
	pub fn dense_slot(&self, name: &str) -> Option<&DenseSlot> {
		self.dense_slots.iter().find(|slot| slot.name == name)
	}

	/// Slot that accepts vectors of `modality`, if the collection has one.
	pub fn slot_for(&self, modality: Modality) -> Option<&DenseSlot> {
		self.dense_slots.iter().find(|slot| slot.modality == modality)
	}
}

static PROTEINS: CollectionSpec = CollectionSpec {
	name: CollectionName::Proteins,
	dense_slots: &[
		DenseSlot { name: "text", modality: Modality::Text },
		DenseSlot { name: "sequence", modality: Modality::Sequence },
	],
	text_slot: "text",
	sparse_slot: "text_sparse",
	payload_indexes: &["gene_names", "organism", "diseases"],
};
static ARTICLES: CollectionSpec = CollectionSpec {
	name: CollectionName::Articles,
	dense_slots: &[DenseSlot { name: "text", modality: Modality::Text }],
	text_slot: "text",
	sparse_slot: "text_sparse",
	payload_indexes: &["pmid", "year", "journal"],
};
static IMAGES: CollectionSpec = CollectionSpec {
	name: CollectionName::Images,
	dense_slots: &[
		DenseSlot { name: "image", modality: Modality::Image },
		DenseSlot { name: "caption", modality: Modality::Text },
	],
	text_slot: "caption",
	sparse_slot: "caption_sparse",
	payload_indexes: &["source", "image_type", "gene_name"],
};
static EXPERIMENTS: CollectionSpec = CollectionSpec {
	name: CollectionName::Experiments,
	dense_slots: &[DenseSlot { name: "text", modality: Modality::Text }],
	text_slot: "text",
	sparse_slot: "text_sparse",
	payload_indexes: &["accession", "data_type", "organism"],
};
static STRUCTURES: CollectionSpec = CollectionSpec {
	name: CollectionName::Structures,
	dense_slots: &[
		DenseSlot { name: "text", modality: Modality::Text },
		DenseSlot { name: "structure", modality: Modality::Structure },
	],
	text_slot: "text",
	sparse_slot: "text_sparse",
	payload_indexes: &["pdb_id", "method", "resolution"],
};
