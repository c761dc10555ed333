//! Request entry points and the two-call clarification protocol.
//!
//! `begin` runs classification, encoding, and routing. A text-and-modality request whose tracks
//! disagree is paused: its gathered state is stored under a fresh session id and the caller gets a
//! clarification request. `resume` loads that state and re-runs only the merge, falling back to
//! the configured default choice once the decision window has passed.

use std::{collections::BTreeMap, time::Instant};

use base64::Engine;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use bio_domain::{
	article,
	collection::CollectionName,
	modality::Modality,
	track::{Alignment, UserChoice},
};

use crate::{
	BioService, Error, Result,
	aggregate::{self, DesignCandidate, ExtractedEntities, NeighborGraph, RankedResult},
	classify::{self, SearchCase},
	divergence::{self, ClarificationRequest, MergeReport},
	diversity::{self, RerankedHit},
	encode::RawInputs,
	router::{SearchOptions, SearchSeed, SearchState},
	session::PendingSearch,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendRequest {
	pub text: Option<String>,
	pub sequence: Option<String>,
	/// Base64 image bytes, optionally as a `data:` URL.
	#[serde(alias = "image")]
	pub image_base64: Option<String>,
	/// Structure file content (PDB or mmCIF text).
	pub structure: Option<String>,
	/// Article full text. Its title and abstract are prepended to `text`.
	pub article: Option<String>,
	pub top_k: Option<u32>,
	pub include_graph: bool,
	pub include_evidence: bool,
	pub include_summary: bool,
	pub include_design_candidates: bool,
	pub filter_by_genes: bool,
	pub filter_by_diseases: bool,
	pub user_choice: Option<UserChoice>,
	/// With `user_choice`, resumes a paused search instead of starting one.
	pub session_id: Option<Uuid>,
}
impl Default for RecommendRequest {
	fn default() -> Self {
		Self {
			text: None,
			sequence: None,
			image_base64: None,
			structure: None,
			article: None,
			top_k: None,
			include_graph: false,
			include_evidence: true,
			include_summary: true,
			include_design_candidates: true,
			filter_by_genes: true,
			filter_by_diseases: false,
			user_choice: None,
			session_id: None,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResumeRequest {
	pub session_id: Uuid,
	/// Absent means the client gave up waiting; the default choice applies.
	#[serde(default)]
	pub user_choice: Option<UserChoice>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
	pub query_id: Uuid,
	pub input_type: String,
	pub search_strategy: String,
	pub divergence_level: Option<Alignment>,
	pub needs_clarification: bool,
	pub session_id: Option<Uuid>,
	pub clarification_request: Option<ClarificationRequest>,
	pub results: BTreeMap<CollectionName, Vec<RankedResult>>,
	pub extracted_entities: ExtractedEntities,
	pub bridge_interpretation: Option<String>,
	pub choice_applied: Option<UserChoice>,
	pub intersection_empty: bool,
	pub neighbor_graph: Option<NeighborGraph>,
	pub summary: Option<String>,
	pub design_candidates: Vec<DesignCandidate>,
	pub notes: Vec<String>,
	pub processing_time_ms: u64,
}

#[derive(Clone, Debug)]
pub struct PendingReply {
	pub session_id: Uuid,
	pub clarification_request: ClarificationRequest,
	pub response: RecommendResponse,
}

#[derive(Clone, Debug)]
pub enum Outcome {
	Complete(Box<RecommendResponse>),
	Pending(Box<PendingReply>),
}
impl Outcome {
	pub fn into_response(self) -> RecommendResponse {
		match self {
			Self::Complete(response) => *response,
			Self::Pending(pending) => pending.response,
		}
	}
}

impl BioService {
	/// Starts a search, or resumes one when both `session_id` and `user_choice` are set.
	pub async fn recommend(&self, req: RecommendRequest) -> Result<Outcome> {
		if let (Some(session_id), Some(choice)) = (req.session_id, req.user_choice) {
			let response =
				self.resume(ResumeRequest { session_id, user_choice: Some(choice) }).await?;

			return Ok(Outcome::Complete(Box::new(response)));
		}

		self.begin(req).await
	}

	pub async fn begin(&self, req: RecommendRequest) -> Result<Outcome> {
		let started = Instant::now();
		let query_id = Uuid::new_v4();
		let (options, inputs, mut notes) = self.prepare(&req)?;
		let encoded = self.encode_inputs(&inputs).await?;

		for failure in &encoded.failures {
			notes.push(format!("{failure}; continuing without this input."));
		}

		let modalities = encoded.modalities();
		let has_text = encoded.text.is_some();
		let case = classify::classify(has_text, &modalities)?;
		let seed = SearchSeed {
			options,
			text: inputs.text.clone().filter(|_| has_text),
			input_type: classify::input_type_label(has_text, &modalities),
			notes,
		};
		let mut state = self.route(case, encoded, seed).await;

		if !self.should_pause(&state) {
			let response = self.finish(query_id, state, MergeReport::default(), started).await;

			return Ok(Outcome::Complete(Box::new(response)));
		}

		if let Some(choice) = state.options.user_choice {
			let report = self.apply_choice(&mut state, choice).await;
			let response = self.finish(query_id, state, report, started).await;

			return Ok(Outcome::Complete(Box::new(response)));
		}

		self.pause(query_id, state, started).await
	}

	pub async fn resume(&self, req: ResumeRequest) -> Result<RecommendResponse> {
		let started = Instant::now();
		let now = OffsetDateTime::now_utc();
		let Some(pending) = self.sessions.take(req.session_id, now).await? else {
			return Err(Error::SessionNotFound { session_id: req.session_id });
		};
		let mut state = pending.state;
		let default_choice = self.default_choice();
		let choice = if now > pending.decide_by {
			let expired = Error::ClarificationExpired { session_id: pending.session_id };

			tracing::warn!(
				error = %expired,
				choice = default_choice.as_str(),
				"Applying default choice."
			);
			state.notes.push(format!("{expired} The default choice {default_choice} was applied."));

			default_choice
		} else {
			req.user_choice.unwrap_or(default_choice)
		};
		let report = self.apply_choice(&mut state, choice).await;

		Ok(self.finish(pending.session_id, state, report, started).await)
	}

	fn prepare(&self, req: &RecommendRequest) -> Result<(SearchOptions, RawInputs, Vec<String>)> {
		let search = &self.cfg.search;
		let top_k = req.top_k.unwrap_or(search.default_top_k);

		if top_k == 0 || top_k > search.max_top_k {
			return Err(Error::InvalidInput {
				message: format!("top_k must be between 1 and {}.", search.max_top_k),
			});
		}

		let mut notes = Vec::new();
		let mut modal = Vec::new();

		if let Some(sequence) = non_blank(req.sequence.as_deref()) {
			let residues: String = sequence.chars().filter(|ch| !ch.is_whitespace()).collect();

			if residues.chars().count() < search.min_sequence_len {
				notes.push(format!(
					"Sequence shorter than {} residues was ignored.",
					search.min_sequence_len
				));
			} else {
				modal.push((Modality::Sequence, residues.to_uppercase()));
			}
		}
		if let Some(image) = non_blank(req.image_base64.as_deref()) {
			let encoded = image.split_once("base64,").map(|(_, data)| data).unwrap_or(image).trim();

			if base64::engine::general_purpose::STANDARD.decode(encoded).is_err() {
				return Err(Error::InvalidInput {
					message: "image_base64 must be valid base64.".to_string(),
				});
			}

			modal.push((Modality::Image, encoded.to_string()));
		}
		if let Some(structure) = non_blank(req.structure.as_deref()) {
			modal.push((Modality::Structure, structure.to_string()));
		}

		let mut text = non_blank(req.text.as_deref()).map(str::to_string);

		if let Some(article_text) = non_blank(req.article.as_deref()) {
			let summary = article::extract(article_text);

			match article::enhance_query(&summary, text.as_deref()) {
				Some(enhanced) if !summary.is_empty() => text = Some(enhanced),
				_ => notes
					.push("No title or abstract could be extracted from the article.".to_string()),
			}
		}

		if text.is_none() && modal.is_empty() {
			return Err(Error::InvalidInput {
				message: "Provide at least one of text, sequence, image, structure, or article."
					.to_string(),
			});
		}

		let options = SearchOptions {
			top_k: top_k as usize,
			include_graph: req.include_graph,
			include_evidence: req.include_evidence,
			include_summary: req.include_summary,
			include_design_candidates: req.include_design_candidates,
			filter_by_genes: req.filter_by_genes,
			filter_by_diseases: req.filter_by_diseases,
			user_choice: req.user_choice,
		};

		Ok((options, RawInputs { text, modal }, notes))
	}

	async fn pause(&self, query_id: Uuid, state: SearchState, started: Instant) -> Result<Outcome> {
		let clarification = &self.cfg.clarification;
		let created_at = OffsetDateTime::now_utc();
		let decide_by = created_at + time::Duration::seconds(clarification.timeout_seconds as i64);
		let expires_at = decide_by + time::Duration::seconds(clarification.grace_seconds as i64);
		let session_id = query_id;
		let request = divergence::clarification_request(
			&state,
			self.default_choice(),
			clarification.timeout_seconds,
		);
		let response = RecommendResponse {
			query_id,
			input_type: state.input_type.clone(),
			search_strategy: state.case.strategy().to_string(),
			divergence_level: state.bridge.as_ref().map(|bridge| bridge.alignment),
			needs_clarification: true,
			session_id: Some(session_id),
			clarification_request: Some(request.clone()),
			results: BTreeMap::new(),
			extracted_entities: ExtractedEntities::default(),
			bridge_interpretation: state.bridge.as_ref().map(|bridge| bridge.interpretation.clone()),
			choice_applied: None,
			intersection_empty: false,
			neighbor_graph: None,
			summary: None,
			design_candidates: Vec::new(),
			notes: state.notes.clone(),
			processing_time_ms: elapsed_ms(started),
		};
		let pending = PendingSearch { session_id, state, created_at, decide_by, expires_at };

		self.sessions.put(&pending).await?;

		tracing::info!(session_id = %session_id, "Search paused for clarification.");

		Ok(Outcome::Pending(Box::new(PendingReply {
			session_id,
			clarification_request: request,
			response,
		})))
	}

	/// Reranks each collection and assembles the enriched response.
	async fn finish(
		&self,
		query_id: Uuid,
		state: SearchState,
		report: MergeReport,
		started: Instant,
	) -> RecommendResponse {
		let alignment = state.bridge.as_ref().map(|bridge| bridge.alignment);
		let lambda = diversity::lambda_for(alignment, &self.cfg.ranking);
		let options = &state.options;
		let reranked: BTreeMap<CollectionName, Vec<RerankedHit>> = state
			.results
			.iter()
			.map(|(collection, hits)| {
				let pool = self.cfg.ranking.mmr_pool;
				let ranked = diversity::rerank(hits.clone(), lambda, pool, options.top_k);

				(*collection, ranked)
			})
			.collect();
		let neighbor_graph =
			options.include_graph.then(|| aggregate::neighbor_graph(&reranked, &self.cfg.graph));
		let results: BTreeMap<CollectionName, Vec<RankedResult>> = reranked
			.into_iter()
			.map(|(collection, hits)| {
				let ranked = hits
					.into_iter()
					.map(|hit| aggregate::ranked_result(collection, hit, options.include_evidence))
					.collect();

				(collection, ranked)
			})
			.collect();
		let summary = if options.include_summary {
			Some(self.summarize(state.bridge.as_ref(), &results).await)
		} else {
			None
		};
		let design_candidates = if options.include_design_candidates
			&& self.design_candidates_apply(state.case, state.text.as_deref(), &results)
		{
			let context = state
				.text
				.clone()
				.or_else(|| state.bridge.as_ref().map(|bridge| bridge.interpretation.clone()))
				.unwrap_or_default();

			self.design_candidates(&context, &results).await
		} else {
			Vec::new()
		};
		let extracted_entities = match state.case {
			SearchCase::TextOnly => aggregate::extracted_entities(None, state.text.as_deref()),
			_ => aggregate::extracted_entities(state.bridge.as_ref(), None),
		};

		tracing::info!(
			query_id = %query_id,
			case = ?state.case,
			results = results.values().map(Vec::len).sum::<usize>(),
			"Search completed."
		);

		RecommendResponse {
			query_id,
			input_type: state.input_type.clone(),
			search_strategy: state.case.strategy().to_string(),
			divergence_level: alignment,
			needs_clarification: false,
			session_id: None,
			clarification_request: None,
			results,
			extracted_entities,
			bridge_interpretation: state.bridge.as_ref().map(|bridge| bridge.interpretation.clone()),
			choice_applied: report.choice,
			intersection_empty: report.intersection_empty,
			neighbor_graph,
			summary,
			design_candidates,
			notes: state.notes.clone(),
			processing_time_ms: elapsed_ms(started),
		}
	}

	fn default_choice(&self) -> UserChoice {
		self.cfg.clarification.default_choice.parse().unwrap_or_default()
	}
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}

fn elapsed_ms(started: Instant) -> u64 {
	u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
