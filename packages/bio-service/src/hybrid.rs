//! Dense plus sparse retrieval fused with Reciprocal Rank Fusion.
//!
//! Each side runs as its own top-`multiplier × limit` query against one named slot. The lists are
//! fused by `Σ 1/(k + rank)` over 1-based ranks, ties broken by the lower rank sum (a document
//! missing from a list counts as `len + 1` there) and then by id. Stored scores are the RRF value
//! scaled by `(k + 1) / lists`, so a document ranked first everywhere scores 1.0. With a single
//! list the store's own score is kept.

use std::collections::HashMap;

use bio_domain::{
	collection::CollectionName,
	hit::RawHit,
	modality::{ModalityVector, SparseVector},
	query::{PayloadMatch, QueryVector, VectorQuery},
};

use crate::{Result, VectorStore, diversity::cmp_f32_desc};

#[derive(Clone, Debug)]
pub struct HybridQuery {
	pub collection: CollectionName,
	pub dense: Option<(String, Vec<f32>)>,
	pub sparse: Option<(String, SparseVector)>,
	pub filter: Vec<PayloadMatch>,
	pub limit: usize,
}
impl HybridQuery {
	/// Text dense and sparse slots of `collection`.
	pub fn text(collection: CollectionName, vector: &ModalityVector, limit: usize) -> Self {
		Self {
			collection,
			dense: Some((collection.text_slot().to_string(), vector.values().to_vec())),
			sparse: vector
				.sparse()
				.filter(|sparse| !sparse.is_empty())
				.map(|sparse| (collection.sparse_slot().to_string(), sparse.clone())),
			filter: Vec::new(),
			limit,
		}
	}

	/// The dense slot sharing `vector`'s space, with no sparse side.
	pub fn native(collection: CollectionName, vector: &ModalityVector, limit: usize) -> Option<Self> {
		let slot = collection.spec().slot_for(vector.kind())?;

		Some(Self {
			collection,
			dense: Some((slot.name.to_string(), vector.values().to_vec())),
			sparse: None,
			filter: Vec::new(),
			limit,
		})
	}

	pub fn with_filter(mut self, filter: Vec<PayloadMatch>) -> Self {
		self.filter = filter;

		self
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct FusedHit {
	pub hit: RawHit,
	pub rrf_score: f32,
	pub rank_sum: usize,
}

pub fn rrf_fuse(lists: &[Vec<RawHit>], k: f32, limit: usize) -> Vec<FusedHit> {
	let mut fused: HashMap<&str, FusedHit> = HashMap::new();
	let mut ranks: HashMap<&str, Vec<Option<usize>>> = HashMap::new();

	for (list_idx, list) in lists.iter().enumerate() {
		for (pos, hit) in list.iter().enumerate() {
			let rank = pos + 1;
			let entry = fused.entry(hit.id.as_str()).or_insert_with(|| FusedHit {
				hit: hit.clone(),
				rrf_score: 0.0,
				rank_sum: 0,
			});

			entry.rrf_score += 1.0 / (k + rank as f32);

			let slots = ranks.entry(hit.id.as_str()).or_insert_with(|| vec![None; lists.len()]);

			if slots[list_idx].is_none() {
				slots[list_idx] = Some(rank);
			}
		}
	}

	let mut out: Vec<FusedHit> = fused
		.into_iter()
		.map(|(id, mut entry)| {
			if let Some(slots) = ranks.get(id) {
				entry.rank_sum = slots
					.iter()
					.zip(lists)
					.map(|(rank, list)| rank.unwrap_or(list.len() + 1))
					.sum();
			}

			entry
		})
		.collect();

	out.sort_by(|a, b| {
		cmp_f32_desc(a.rrf_score, b.rrf_score)
			.then_with(|| a.rank_sum.cmp(&b.rank_sum))
			.then_with(|| a.hit.id.cmp(&b.hit.id))
	});
	out.truncate(limit);

	out
}

pub async fn search(
	store: &dyn VectorStore,
	query: &HybridQuery,
	multiplier: usize,
	k: f32,
) -> Result<Vec<RawHit>> {
	let candidate_limit = query.limit.saturating_mul(multiplier.max(1));
	let dense = query.dense.as_ref().map(|(slot, values)| VectorQuery {
		collection: query.collection,
		slot: slot.clone(),
		vector: QueryVector::Dense(values.clone()),
		filter: query.filter.clone(),
		limit: candidate_limit,
	});
	let sparse = query.sparse.as_ref().map(|(slot, sparse)| VectorQuery {
		collection: query.collection,
		slot: slot.clone(),
		vector: QueryVector::Sparse(sparse.clone()),
		filter: query.filter.clone(),
		limit: candidate_limit,
	});

	match (dense, sparse) {
		(Some(dense), Some(sparse)) => {
			let (dense_hits, sparse_hits) =
				futures::try_join!(store.query(&dense), store.query(&sparse))?;
			let lists = [dense_hits, sparse_hits];
			let scale = (k + 1.0) / lists.len() as f32;

			tracing::debug!(
				collection = %query.collection,
				dense = lists[0].len(),
				sparse = lists[1].len(),
				"Fusing hybrid lists."
			);

			Ok(rrf_fuse(&lists, k, query.limit)
				.into_iter()
				.map(|fused| RawHit { score: fused.rrf_score * scale, ..fused.hit })
				.collect())
		},
		(Some(single), None) | (None, Some(single)) => {
			let mut single = single;

			single.limit = query.limit;

			store.query(&single).await
		},
		(None, None) => Ok(Vec::new()),
	}
}
