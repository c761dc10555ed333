//! Metadata-to-query bridge.
//!
//! Modality vectors cannot be compared with text vectors, so the bridge reads the metadata of the
//! primary modality's best hits and asks the LLM for one text query per remaining collection,
//! plus entity filters and, when the user also typed text, an alignment verdict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bio_domain::{
	collection::CollectionName,
	entities::{EntityFilters, dedup_entities},
	hit::RawHit,
	track::Alignment,
};

use crate::{BioService, Error, Result};

const MAX_FILTER_GENES: usize = 5;
const MAX_FILTER_DISEASES: usize = 3;
const MAX_FILTER_PATHWAYS: usize = 3;
const DESCRIPTION_CHARS: usize = 200;
const DEFAULT_INTERPRETATION: &str = "Results found for the given modality.";
const FALLBACK_INTERPRETATION: &str = "Search results found.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeOutput {
	pub interpretation: String,
	pub queries: BTreeMap<CollectionName, String>,
	pub filters: EntityFilters,
	pub alignment: Alignment,
	/// Set when the LLM output was unusable and the queries came from the fallback.
	#[serde(default)]
	pub fallback: bool,
}

impl BioService {
	/// Never fails: an unusable completion degrades to [`fallback_bridge`].
	pub async fn bridge(
		&self,
		user_text: Option<&str>,
		primary: CollectionName,
		hits: &[RawHit],
	) -> BridgeOutput {
		let targets: Vec<CollectionName> = primary.others().collect();
		let metadata = hit_metadata(hits, self.cfg.search.bridge_top_n);
		let messages = bridge_messages(user_text, primary, &metadata, &targets);
		let completion = self
			.providers
			.llm
			.complete_json(&self.cfg.providers.llm, &messages)
			.await
			.map_err(|err| Error::BridgeGenerationFailed { message: err.to_string() })
			.and_then(|value| parse_bridge(&value, user_text, &targets));

		match completion {
			Ok(output) => {
				tracing::info!(
					primary = %primary,
					alignment = output.alignment.as_str(),
					"Bridge queries generated."
				);

				output
			},
			Err(err) => {
				tracing::warn!(
					primary = %primary,
					error = %err,
					"Bridge fell back to default queries."
				);

				fallback_bridge(user_text, hits, &targets, self.cfg.search.bridge_top_n)
			},
		}
	}
}

/// Bounded per-hit summary handed to the LLM.
pub fn hit_metadata(hits: &[RawHit], top_n: usize) -> Vec<Value> {
	hits.iter()
		.take(top_n)
		.map(|hit| {
			let bridge = hit.normalized_bridge();
			let description = ["function", "abstract", "description", "caption"]
				.into_iter()
				.find_map(|key| hit.str_field(key))
				.map(|text| truncate_chars(text, DESCRIPTION_CHARS));
			let genes: Vec<String> = hit.genes().into_iter().take(MAX_FILTER_GENES).collect();

			serde_json::json!({
				"name": hit.display_name().unwrap_or(&hit.id),
				"score": hit.score,
				"genes": genes,
				"diseases": bridge.diseases.iter().take(MAX_FILTER_DISEASES).collect::<Vec<_>>(),
				"pathways": bridge.pathways.iter().take(MAX_FILTER_PATHWAYS).collect::<Vec<_>>(),
				"function": description,
			})
		})
		.collect()
}

pub fn bridge_messages(
	user_text: Option<&str>,
	primary: CollectionName,
	metadata: &[Value],
	targets: &[CollectionName],
) -> Vec<Value> {
	let queries: serde_json::Map<String, Value> = targets
		.iter()
		.map(|name| (name.as_str().to_string(), Value::String("string".to_string())))
		.collect();
	let mut schema = serde_json::json!({
		"interpretation": "one sentence describing what the results are about",
		"queries": queries,
		"filters": { "genes": "string[]", "diseases": "string[]", "pathways": "string[]" },
	});
	let system_prompt = "You bridge biomedical search results into text queries. \
Output must be valid JSON only and must match the provided schema exactly. \
Write one concise keyword query per target collection, grounded in the given result metadata. \
Only list genes, diseases, and pathways that appear in the metadata.";
	let metadata_json = Value::Array(metadata.to_vec());
	let user_prompt = match user_text {
		Some(text) => {
			if let Some(object) = schema.as_object_mut() {
				object.insert(
					"alignment".to_string(),
					Value::String("aligned|partial|divergent".to_string()),
				);
			}

			format!(
				"Return JSON matching this exact schema:\n{schema}\nThe user searched {primary} and also wrote:\n{text}\nJudge whether the text and the results describe the same topic.\nResult metadata:\n{metadata_json}"
			)
		},
		None => format!(
			"Return JSON matching this exact schema:\n{schema}\nThe user searched {primary}.\nResult metadata:\n{metadata_json}"
		),
	};

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

pub fn parse_bridge(
	value: &Value,
	user_text: Option<&str>,
	targets: &[CollectionName],
) -> Result<BridgeOutput> {
	let Some(raw_queries) = value.get("queries").and_then(Value::as_object) else {
		return Err(Error::BridgeGenerationFailed {
			message: "Bridge output is missing the queries object.".to_string(),
		});
	};
	let mut queries = BTreeMap::new();

	for target in targets {
		let generated = raw_queries
			.get(target.as_str())
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|query| !query.is_empty());
		let query = match generated {
			Some(query) => query.to_string(),
			None => default_query(user_text, *target),
		};

		queries.insert(*target, query);
	}

	let filters = value.get("filters");
	let list = |key: &str, limit: usize| {
		let items: Vec<String> = filters
			.and_then(|filters| filters.get(key))
			.and_then(Value::as_array)
			.map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
			.unwrap_or_else(Vec::new);

		dedup_entities(items, limit)
	};
	let interpretation = value
		.get("interpretation")
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.unwrap_or(DEFAULT_INTERPRETATION)
		.to_string();
	let alignment = match user_text {
		Some(_) => value
			.get("alignment")
			.and_then(Value::as_str)
			.map(Alignment::from_label)
			.unwrap_or_default(),
		None => Alignment::Aligned,
	};

	Ok(BridgeOutput {
		interpretation,
		queries,
		filters: EntityFilters {
			genes: list("genes", MAX_FILTER_GENES),
			diseases: list("diseases", MAX_FILTER_DISEASES),
			pathways: list("pathways", MAX_FILTER_PATHWAYS),
		},
		alignment,
		fallback: false,
	})
}

/// User text (or a per-collection default) everywhere, genes taken from the hits themselves.
pub fn fallback_bridge(
	user_text: Option<&str>,
	hits: &[RawHit],
	targets: &[CollectionName],
	top_n: usize,
) -> BridgeOutput {
	let queries =
		targets.iter().map(|target| (*target, default_query(user_text, *target))).collect();
	let genes = dedup_entities(hits.iter().take(top_n).flat_map(RawHit::genes), MAX_FILTER_GENES);

	BridgeOutput {
		interpretation: FALLBACK_INTERPRETATION.to_string(),
		queries,
		filters: EntityFilters { genes, ..Default::default() },
		alignment: Alignment::Aligned,
		fallback: true,
	}
}

fn default_query(user_text: Option<&str>, target: CollectionName) -> String {
	match user_text.map(str::trim).filter(|text| !text.is_empty()) {
		Some(text) => text.to_string(),
		None => target.fallback_query().to_string(),
	}
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
	match text.char_indices().nth(max) {
		Some((idx, _)) => text[..idx].to_string(),
		None => text.to_string(),
	}
}
