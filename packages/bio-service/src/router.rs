//! Three-case search strategy.
//!
//! * Text only: one text encoding searches all five collections.
//! * Modality only: the modality searches its own collection, the bridge turns those hits into text
//!   queries, and the queries search the remaining collections.
//! * Text and modality: as above, but the remaining collections are searched with the user's own
//!   text vector and the bridge judges whether the two tracks agree.
//!
//! Vectors are never fused. Every per-collection search is isolated: a timeout or an unavailable
//! collection yields an empty list and a note.

use std::{collections::BTreeMap, time::Duration};

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use bio_domain::{
	collection::{CollectionName, NORMALIZED_BRIDGE_FIELD},
	hit::RawHit,
	modality::ModalityVector,
	query::PayloadMatch,
	track::{Track, UserChoice},
};

use crate::{
	BioService, Error,
	bridge::BridgeOutput,
	classify::SearchCase,
	encode::EncodedInputs,
	hybrid::{self, HybridQuery},
};

/// Per-request switches carried across a clarification pause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
	pub top_k: usize,
	pub include_graph: bool,
	pub include_evidence: bool,
	pub include_summary: bool,
	pub include_design_candidates: bool,
	pub filter_by_genes: bool,
	pub filter_by_diseases: bool,
	pub user_choice: Option<UserChoice>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggedHit {
	pub hit: RawHit,
	pub track: Track,
}

/// Everything gathered before the merge step. This is what a paused session persists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchState {
	pub options: SearchOptions,
	pub text: Option<String>,
	pub input_type: String,
	pub case: SearchCase,
	pub text_vector: Option<ModalityVector>,
	pub bridge: Option<BridgeOutput>,
	pub results: BTreeMap<CollectionName, Vec<TaggedHit>>,
	pub notes: Vec<String>,
}
impl SearchState {
	/// The collection searched natively by the primary modality.
	pub fn modal_collection(&self) -> Option<CollectionName> {
		self.case.primary().and_then(|modality| modality.native_collection())
	}

	pub fn hits_for(&self, track: Track) -> impl Iterator<Item = &RawHit> {
		self.results
			.values()
			.flatten()
			.filter(move |tagged| tagged.track == track)
			.map(|tagged| &tagged.hit)
	}

	pub fn total_hits(&self) -> usize {
		self.results.values().map(Vec::len).sum()
	}
}

pub(crate) struct SearchSeed {
	pub options: SearchOptions,
	pub text: Option<String>,
	pub input_type: String,
	pub notes: Vec<String>,
}

pub(crate) struct CollectionOutcome {
	pub collection: CollectionName,
	pub hits: Vec<RawHit>,
	pub note: Option<String>,
}

impl BioService {
	pub(crate) async fn route(
		&self,
		case: SearchCase,
		encoded: EncodedInputs,
		seed: SearchSeed,
	) -> SearchState {
		tracing::info!(case = ?case, "Routing search.");

		let mut state = SearchState {
			options: seed.options,
			text: seed.text,
			input_type: seed.input_type,
			case,
			text_vector: encoded.text.clone(),
			bridge: None,
			results: BTreeMap::new(),
			notes: seed.notes,
		};

		match case {
			SearchCase::TextOnly => self.text_only(&mut state).await,
			SearchCase::ModalOnly { .. } => self.modal_only(&mut state, &encoded).await,
			SearchCase::TextAndModal { .. } => self.text_and_modal(&mut state, &encoded).await,
		}

		state
	}

	/// Retrieval depth per collection: enough for the MMR pool and the requested page.
	pub(crate) fn retrieval_limit(&self, top_k: usize) -> usize {
		top_k.max(self.cfg.ranking.mmr_pool)
	}

	async fn text_only(&self, state: &mut SearchState) {
		let Some(vector) = state.text_vector.clone() else {
			return;
		};
		let limit = self.retrieval_limit(state.options.top_k);
		let queries = CollectionName::ALL
			.into_iter()
			.map(|collection| HybridQuery::text(collection, &vector, limit))
			.collect();

		for outcome in self.fan_out(queries).await {
			record(state, outcome, Track::Text);
		}
	}

	async fn modal_only(&self, state: &mut SearchState, encoded: &EncodedInputs) {
		let Some(primary) = self.phase_one(state, encoded).await else {
			return;
		};
		let primary_hits: Vec<RawHit> =
			state.results.get(&primary).map(|hits| untag(hits)).unwrap_or_default();
		let bridge = self.bridge(None, primary, &primary_hits).await;
		let filter = self.phase_three_filter(&state.options, &bridge);
		let limit = self.retrieval_limit(state.options.top_k);
		let targets: Vec<(CollectionName, String)> = bridge
			.queries
			.iter()
			.filter(|(collection, _)| !state.results.contains_key(*collection))
			.map(|(collection, query)| (*collection, query.clone()))
			.collect();
		let encodings = futures::future::join_all(
			targets.iter().map(|(_, query)| self.encode_text(query)),
		)
		.await;
		let mut queries = Vec::new();

		for ((collection, query), encoding) in targets.into_iter().zip(encodings) {
			match encoding {
				Ok(vector) => queries.push(
					HybridQuery::text(collection, &vector, limit)
						.with_filter(filter_for(collection, &filter)),
				),
				Err(err) => {
					tracing::warn!(
						collection = %collection,
						query = %query,
						error = %err,
						"Bridge query could not be encoded."
					);
					state.notes.push(format!("{collection}: bridge query could not be encoded."));
					state.results.insert(collection, Vec::new());
				},
			}
		}

		if bridge.fallback {
			state.notes.push("Bridge generation failed; default queries were used.".to_string());
		}

		state.bridge = Some(bridge);

		for outcome in self.fan_out(queries).await {
			record(state, outcome, Track::Bridge);
		}
	}

	async fn text_and_modal(&self, state: &mut SearchState, encoded: &EncodedInputs) {
		let Some(primary) = self.phase_one(state, encoded).await else {
			return;
		};
		let Some(text_vector) = state.text_vector.clone() else {
			return;
		};
		let primary_hits: Vec<RawHit> =
			state.results.get(&primary).map(|hits| untag(hits)).unwrap_or_default();
		let bridge = self.bridge(state.text.as_deref(), primary, &primary_hits).await;
		let filter = self.phase_three_filter(&state.options, &bridge);
		let limit = self.retrieval_limit(state.options.top_k);
		let queries = CollectionName::ALL
			.into_iter()
			.filter(|collection| !state.results.contains_key(collection))
			.map(|collection| {
				HybridQuery::text(collection, &text_vector, limit)
					.with_filter(filter_for(collection, &filter))
			})
			.collect();

		if bridge.fallback {
			state.notes.push("Bridge generation failed; default queries were used.".to_string());
		}

		state.bridge = Some(bridge);

		for outcome in self.fan_out(queries).await {
			record(state, outcome, Track::Text);
		}
	}

	/// Searches each encoded modality's own collection with its own vector alone. Returns the
	/// primary modality's collection.
	async fn phase_one(
		&self,
		state: &mut SearchState,
		encoded: &EncodedInputs,
	) -> Option<CollectionName> {
		let primary = state.case.primary()?.native_collection()?;
		let limit = self.retrieval_limit(state.options.top_k);
		let queries = encoded
			.modal
			.iter()
			.filter_map(|vector| {
				let collection = vector.kind().native_collection()?;

				HybridQuery::native(collection, vector, limit)
			})
			.collect();

		for outcome in self.fan_out(queries).await {
			record(state, outcome, Track::Modal);
		}

		Some(primary)
	}

	fn phase_three_filter(
		&self,
		options: &SearchOptions,
		bridge: &BridgeOutput,
	) -> Vec<PayloadMatch> {
		let mut filter = Vec::new();

		if options.filter_by_genes && !bridge.filters.genes.is_empty() {
			filter.push(PayloadMatch {
				field: format!("{NORMALIZED_BRIDGE_FIELD}.genes"),
				any_of: bridge.filters.genes.clone(),
			});
		}
		if options.filter_by_diseases && !bridge.filters.diseases.is_empty() {
			filter.push(PayloadMatch {
				field: format!("{NORMALIZED_BRIDGE_FIELD}.diseases"),
				any_of: bridge.filters.diseases.clone(),
			});
		}

		filter
	}

	/// Runs the queries with bounded concurrency. Outcomes come back in collection order.
	pub(crate) async fn fan_out(&self, queries: Vec<HybridQuery>) -> Vec<CollectionOutcome> {
		let mut outcomes: Vec<CollectionOutcome> = futures::stream::iter(queries)
			.map(|query| self.search_collection(query))
			.buffer_unordered(self.cfg.search.max_concurrency.max(1))
			.collect()
			.await;

		outcomes.sort_by_key(|outcome| outcome.collection);

		outcomes
	}

	/// One collection, bounded by the per-collection timeout. A filtered search that finds nothing
	/// is retried once without the filter.
	pub(crate) async fn search_collection(&self, query: HybridQuery) -> CollectionOutcome {
		let collection = query.collection;
		let result = match self.timed_search(&query).await {
			Ok(hits) if hits.is_empty() && !query.filter.is_empty() => {
				tracing::info!(
					collection = %collection,
					"Filtered search was empty. Retrying unfiltered."
				);

				self.timed_search(&query.with_filter(Vec::new())).await
			},
			other => other,
		};

		match result {
			Ok(hits) => {
				tracing::info!(collection = %collection, hits = hits.len(), "Collection searched.");

				CollectionOutcome { collection, hits, note: None }
			},
			Err(err) => {
				tracing::warn!(collection = %collection, error = %err, "Collection search degraded.");

				let note = match &err {
					Error::SearchTimeout { timeout_ms, .. } =>
						format!("{collection}: search timed out after {timeout_ms} ms."),
					Error::CollectionUnavailable { .. } =>
						format!("{collection}: collection unavailable."),
					_ => format!("{collection}: search failed."),
				};

				CollectionOutcome { collection, hits: Vec::new(), note: Some(note) }
			},
		}
	}

	async fn timed_search(&self, query: &HybridQuery) -> crate::Result<Vec<RawHit>> {
		let timeout_ms = self.cfg.search.collection_timeout_ms;
		let search = hybrid::search(
			self.store.as_ref(),
			query,
			self.cfg.search.candidate_multiplier as usize,
			self.cfg.search.rrf_k,
		);

		match tokio::time::timeout(Duration::from_millis(timeout_ms), search).await {
			Ok(result) => result,
			Err(_) => Err(Error::SearchTimeout {
				collection: query.collection.to_string(),
				timeout_ms,
			}),
		}
	}
}

pub(crate) fn untag(hits: &[TaggedHit]) -> Vec<RawHit> {
	hits.iter().map(|tagged| tagged.hit.clone()).collect()
}

pub(crate) fn tag(hits: Vec<RawHit>, track: Track) -> Vec<TaggedHit> {
	hits.into_iter().map(|hit| TaggedHit { hit, track }).collect()
}

fn record(state: &mut SearchState, outcome: CollectionOutcome, track: Track) {
	if let Some(note) = outcome.note {
		state.notes.push(note);
	}

	state.results.insert(outcome.collection, tag(outcome.hits, track));
}

fn filter_for(collection: CollectionName, filter: &[PayloadMatch]) -> Vec<PayloadMatch> {
	if collection.accepts_entity_filter() { filter.to_vec() } else { Vec::new() }
}
