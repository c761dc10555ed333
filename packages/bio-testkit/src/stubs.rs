//! In-process stand-ins for the vector store and the model providers.

use std::{
	collections::{HashMap, HashSet},
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use color_eyre::eyre;
use serde_json::Value;

use bio_config::{EmbeddingProviderConfig, LlmProviderConfig};
use bio_domain::{
	collection::CollectionName,
	hit::RawHit,
	modality::SparseVector,
	query::{IndexedPoint, PayloadMatch, QueryVector, VectorQuery},
};
use bio_providers::sparse;
use bio_service::{BoxFuture, EmbeddingProvider, Error, LlmProvider, VectorStore};

/// Deterministic unit-range vector for `input`. Equal inputs give equal vectors.
pub fn vector_for(input: &str, dims: usize) -> Vec<f32> {
	let mut reader = blake3::Hasher::new().update(input.as_bytes()).finalize_xof();
	let mut bytes = vec![0_u8; dims];

	reader.fill(&mut bytes);

	bytes.into_iter().map(|byte| byte as f32 / 127.5 - 1.0).collect()
}

/// A point whose dense slots are seeded by text and whose sparse slot holds `text`'s terms.
pub fn seeded_point(
	collection: CollectionName,
	id: &str,
	seeds: &[(&str, &str)],
	text: Option<&str>,
	payload: Value,
) -> IndexedPoint {
	let spec = collection.spec();
	let dense = seeds
		.iter()
		.filter_map(|(slot, seed)| {
			let declared = spec.dense_slot(slot)?;

			Some((slot.to_string(), vector_for(seed, declared.modality.dimension())))
		})
		.collect();
	let sparse = text.map(|text| {
		let (indices, values) = sparse::encode(text).into_iter().unzip();

		(spec.sparse_slot.to_string(), SparseVector { indices, values })
	});

	IndexedPoint {
		id: id.to_string(),
		dense,
		sparse,
		payload: payload.as_object().cloned().unwrap_or_default(),
	}
}

#[derive(Default)]
struct StoreInner {
	points: HashMap<CollectionName, Vec<IndexedPoint>>,
	queries: Vec<VectorQuery>,
	unavailable: HashSet<CollectionName>,
	delays: HashMap<CollectionName, Duration>,
}

/// Brute-force vector store: cosine for dense slots, dot product for sparse ones.
#[derive(Clone, Default)]
pub struct MemoryVectorStore {
	inner: Arc<Mutex<StoreInner>>,
}
impl MemoryVectorStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, collection: CollectionName, point: IndexedPoint) {
		self.lock().points.entry(collection).or_default().push(point);
	}

	pub fn mark_unavailable(&self, collection: CollectionName) {
		self.lock().unavailable.insert(collection);
	}

	/// Every query against `collection` sleeps this long before answering.
	pub fn delay(&self, collection: CollectionName, delay: Duration) {
		self.lock().delays.insert(collection, delay);
	}

	pub fn queries(&self) -> Vec<VectorQuery> {
		self.lock().queries.clone()
	}

	pub fn queries_for(&self, collection: CollectionName) -> Vec<VectorQuery> {
		self.lock().queries.iter().filter(|query| query.collection == collection).cloned().collect()
	}

	fn lock(&self) -> MutexGuard<'_, StoreInner> {
		self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn answer(&self, query: &VectorQuery) -> Vec<RawHit> {
		let inner = self.lock();
		let Some(points) = inner.points.get(&query.collection) else {
			return Vec::new();
		};
		let mut hits: Vec<RawHit> = points
			.iter()
			.filter(|point| query.filter.iter().all(|matcher| matches_filter(point, matcher)))
			.filter_map(|point| {
				let score = score_point(point, query)?;

				Some(RawHit { id: point.id.clone(), score, payload: point.payload.clone() })
			})
			.collect();

		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
		hits.truncate(query.limit);

		hits
	}
}
impl VectorStore for MemoryVectorStore {
	fn query<'a>(
		&'a self,
		query: &'a VectorQuery,
	) -> BoxFuture<'a, bio_service::Result<Vec<RawHit>>> {
		Box::pin(async move {
			let (unavailable, delay) = {
				let mut inner = self.lock();

				inner.queries.push(query.clone());

				(
					inner.unavailable.contains(&query.collection),
					inner.delays.get(&query.collection).copied(),
				)
			};

			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}
			if unavailable {
				return Err(Error::CollectionUnavailable {
					collection: query.collection.to_string(),
				});
			}

			Ok(self.answer(query))
		})
	}
}

fn score_point(point: &IndexedPoint, query: &VectorQuery) -> Option<f32> {
	match &query.vector {
		QueryVector::Dense(values) => {
			let (_, stored) = point.dense.iter().find(|(slot, _)| *slot == query.slot)?;

			Some(cosine(values, stored))
		},
		QueryVector::Sparse(sparse) => {
			let (slot, stored) = point.sparse.as_ref()?;

			if *slot != query.slot {
				return None;
			}

			let weights: HashMap<u32, f32> =
				stored.indices.iter().copied().zip(stored.values.iter().copied()).collect();
			let score: f32 = sparse
				.indices
				.iter()
				.zip(&sparse.values)
				.filter_map(|(index, value)| weights.get(index).map(|weight| weight * value))
				.sum();

			(score > 0.0).then_some(score)
		},
	}
}

fn cosine(lhs: &[f32], rhs: &[f32]) -> f32 {
	let dot: f32 = lhs.iter().zip(rhs).map(|(a, b)| a * b).sum();
	let lhs_norm = lhs.iter().map(|a| a * a).sum::<f32>().sqrt();
	let rhs_norm = rhs.iter().map(|b| b * b).sum::<f32>().sqrt();
	let norm = lhs_norm * rhs_norm;

	if norm == 0.0 { 0.0 } else { dot / norm }
}

fn matches_filter(point: &IndexedPoint, matcher: &PayloadMatch) -> bool {
	let mut parts = matcher.field.split('.');
	let Some(first) = parts.next() else {
		return false;
	};
	let mut current = point.payload.get(first);

	for part in parts {
		current = current.and_then(|value| value.get(part));
	}

	match current {
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(Value::as_str)
			.any(|item| matcher.any_of.iter().any(|wanted| wanted == item)),
		Some(Value::String(raw)) => matcher.any_of.iter().any(|wanted| wanted == raw),
		_ => false,
	}
}

#[derive(Default)]
struct EncoderInner {
	calls: Vec<(String, String)>,
	failing: HashSet<String>,
}

/// Embeds by hashing, so a query and a point seeded with the same text score 1.0.
#[derive(Clone, Default)]
pub struct StubEncoder {
	inner: Arc<Mutex<EncoderInner>>,
}
impl StubEncoder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every call with this input type fails.
	pub fn fail_on(&self, input_type: &str) {
		self.lock().failing.insert(input_type.to_string());
	}

	/// `(input_type, input)` pairs in call order.
	pub fn calls(&self) -> Vec<(String, String)> {
		self.lock().calls.clone()
	}

	pub fn inputs_for(&self, input_type: &str) -> Vec<String> {
		self.lock()
			.calls
			.iter()
			.filter(|(kind, _)| kind == input_type)
			.map(|(_, input)| input.clone())
			.collect()
	}

	fn lock(&self) -> MutexGuard<'_, EncoderInner> {
		self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
impl EmbeddingProvider for StubEncoder {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		input_type: &'a str,
		inputs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			let failing = {
				let mut inner = self.lock();

				for input in inputs {
					inner.calls.push((input_type.to_string(), input.clone()));
				}

				inner.failing.contains(input_type)
			};

			if failing {
				return Err(eyre::eyre!("{input_type} encoder is unavailable."));
			}

			Ok(inputs.iter().map(|input| vector_for(input, cfg.dimensions as usize)).collect())
		})
	}
}

#[derive(Clone)]
enum Script {
	Reply(Value),
	Fail,
}

/// Answers chat completions by matching a needle against the concatenated message contents.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
	scripts: Vec<(String, Script)>,
	calls: Arc<Mutex<Vec<String>>>,
}
impl ScriptedLlm {
	pub fn new() -> Self {
		Self::default()
	}

	/// First matching needle wins.
	pub fn on(mut self, needle: &str, reply: Value) -> Self {
		self.scripts.push((needle.to_string(), Script::Reply(reply)));

		self
	}

	pub fn failing(mut self, needle: &str) -> Self {
		self.scripts.push((needle.to_string(), Script::Fail));

		self
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
	}

	pub fn calls_matching(&self, needle: &str) -> usize {
		self.calls().iter().filter(|prompt| prompt.contains(needle)).count()
	}
}
impl LlmProvider for ScriptedLlm {
	fn complete_json<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(async move {
			let prompt = messages
				.iter()
				.filter_map(|message| message.get("content").and_then(Value::as_str))
				.collect::<Vec<_>>()
				.join("\n");

			self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(prompt.clone());

			match self.scripts.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
				Some((_, Script::Reply(reply))) => Ok(reply.clone()),
				Some((needle, Script::Fail)) => Err(eyre::eyre!("Scripted failure for {needle:?}.")),
				None => Err(eyre::eyre!("No scripted reply for this prompt.")),
			}
		})
	}
}
