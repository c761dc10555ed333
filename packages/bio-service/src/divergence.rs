//! Divergence detection and the four merge strategies for text-and-modality requests.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use bio_domain::{
	collection::CollectionName,
	entities::jaccard,
	hit::RawHit,
	track::{Alignment, Track, UserChoice},
};

use crate::{
	BioService,
	classify::SearchCase,
	hybrid::HybridQuery,
	router::{SearchState, TaggedHit, tag},
};

const CLARIFICATION_MESSAGE: &str =
	"Your inputs seem to be about different topics. How would you like to search?";
const CONTEXT_ITEMS: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
	pub message: String,
	pub options: Vec<UserChoice>,
	pub default_choice: UserChoice,
	pub timeout_seconds: u64,
	pub context_modal: Vec<String>,
	pub context_text: Vec<String>,
}

/// What the merge step reports back to the response.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MergeReport {
	pub choice: Option<UserChoice>,
	pub intersection_empty: bool,
}

/// Bridge filter entities plus the entities of every modal-track hit.
pub fn modal_entities(state: &SearchState) -> BTreeSet<String> {
	let mut entities =
		state.bridge.as_ref().map(|bridge| bridge.filters.entity_set()).unwrap_or_default();

	for hit in state.hits_for(Track::Modal) {
		entities.extend(hit.normalized_bridge().entity_set());
	}

	entities
}

pub fn text_entities(state: &SearchState) -> BTreeSet<String> {
	state.hits_for(Track::Text).flat_map(|hit| hit.normalized_bridge().entity_set()).collect()
}

/// Jaccard overlap between the two tracks' entity sets.
pub fn track_overlap(state: &SearchState) -> f32 {
	jaccard(&modal_entities(state), &text_entities(state))
}

pub fn needs_clarification(alignment: Alignment, overlap: f32, threshold: f32) -> bool {
	match alignment {
		Alignment::Aligned => false,
		Alignment::Divergent => true,
		Alignment::Partial => overlap < threshold,
	}
}

pub fn clarification_request(
	state: &SearchState,
	default_choice: UserChoice,
	timeout_seconds: u64,
) -> ClarificationRequest {
	let names = |track: Track| -> Vec<String> {
		state
			.hits_for(track)
			.take(CONTEXT_ITEMS)
			.map(|hit| hit.display_name().unwrap_or(&hit.id).to_string())
			.collect()
	};

	ClarificationRequest {
		message: CLARIFICATION_MESSAGE.to_string(),
		options: UserChoice::ALL.to_vec(),
		default_choice,
		timeout_seconds,
		context_modal: names(Track::Modal),
		context_text: names(Track::Text),
	}
}

impl BioService {
	/// Whether this state must pause for the user before merging.
	pub fn should_pause(&self, state: &SearchState) -> bool {
		if !matches!(state.case, SearchCase::TextAndModal { .. }) {
			return false;
		}

		let Some(bridge) = state.bridge.as_ref() else {
			return false;
		};

		needs_clarification(
			bridge.alignment,
			track_overlap(state),
			self.cfg.clarification.partial_overlap_threshold,
		)
	}

	/// Re-shapes the gathered results according to `choice`. Only this step runs on resume.
	pub async fn apply_choice(&self, state: &mut SearchState, choice: UserChoice) -> MergeReport {
		tracing::info!(choice = choice.as_str(), "Applying merge strategy.");

		match choice {
			UserChoice::Intersection => {
				let intersection_empty = intersect(state);

				if intersection_empty {
					state
						.notes
						.push("No entities are shared by the text and modality results.".to_string());
				}

				MergeReport { choice: Some(choice), intersection_empty }
			},
			UserChoice::TextPriority => {
				if let Some((collection, hits)) = self.text_search_of_modal_collection(state).await {
					state.results.insert(collection, tag(hits, Track::Text));
				}

				MergeReport { choice: Some(choice), intersection_empty: false }
			},
			UserChoice::ModalPriority =>
				MergeReport { choice: Some(choice), intersection_empty: false },
			UserChoice::MultiTrack => {
				if let Some((collection, text_hits)) =
					self.text_search_of_modal_collection(state).await
				{
					let modal_hits = state.results.remove(&collection).unwrap_or_default();
					let merged = multi_track(modal_hits, tag(text_hits, Track::Text));

					state.results.insert(collection, merged);
				}

				MergeReport { choice: Some(choice), intersection_empty: false }
			},
		}
	}

	async fn text_search_of_modal_collection(
		&self,
		state: &mut SearchState,
	) -> Option<(CollectionName, Vec<RawHit>)> {
		let collection = state.modal_collection()?;
		let vector = state.text_vector.as_ref()?;
		let limit = self.retrieval_limit(state.options.top_k);
		let outcome = self.search_collection(HybridQuery::text(collection, vector, limit)).await;

		if let Some(note) = outcome.note {
			state.notes.push(note);
		}

		Some((collection, outcome.hits))
	}
}

/// Keeps hits whose entities touch the shared set. Returns whether nothing survived.
fn intersect(state: &mut SearchState) -> bool {
	let modal = modal_entities(state);
	let text = text_entities(state);
	let common: BTreeSet<String> = modal.intersection(&text).cloned().collect();

	for hits in state.results.values_mut() {
		if common.is_empty() {
			hits.clear();

			continue;
		}

		hits.retain(|tagged| {
			tagged.hit.normalized_bridge().entity_set().intersection(&common).next().is_some()
		});
	}

	state.results.values().all(Vec::is_empty)
}

/// Union of both tracks with each track's scores scaled by its own maximum. Modal hits win
/// duplicate ids.
fn multi_track(modal: Vec<TaggedHit>, text: Vec<TaggedHit>) -> Vec<TaggedHit> {
	let mut merged: Vec<TaggedHit> = Vec::with_capacity(modal.len() + text.len());
	let mut seen = HashSet::new();

	for track in [normalize_track(modal), normalize_track(text)] {
		for tagged in track {
			if seen.insert(tagged.hit.id.clone()) {
				merged.push(tagged);
			}
		}
	}

	merged.sort_by(|a, b| crate::diversity::cmp_f32_desc(a.hit.score, b.hit.score));

	merged
}

fn normalize_track(mut hits: Vec<TaggedHit>) -> Vec<TaggedHit> {
	let max = hits.iter().map(|tagged| tagged.hit.score).fold(0.0_f32, f32::max);

	if max > 0.0 {
		for tagged in &mut hits {
			tagged.hit.score /= max;
		}
	}

	hits
}
