//! Final result shaping and read-only enrichment: evidence links, the neighbor graph, the summary,
//! and design candidates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bio_config::Graph;
use bio_domain::{
	collection::CollectionName,
	entities::{canonical_set, dedup_entities},
	hit::RawHit,
	track::Track,
};
use bio_providers::sparse;

use crate::{
	BioService,
	bridge::{BridgeOutput, truncate_chars},
	classify::SearchCase,
	diversity::RerankedHit,
	hybrid::HybridQuery,
};

const DESCRIPTION_CHARS: usize = 300;
const LABEL_CHARS: usize = 40;
const EVIDENCE_BOOST: f32 = 1.2;
const GENE_EDGE_WEIGHT: f32 = 0.25;
const DISEASE_EDGE_WEIGHT: f32 = 0.3;
const SUMMARY_ITEMS_PER_COLLECTION: usize = 3;
const EXPLORATORY_TERMS: &[&str] = &[
	"discover", "explore", "novel", "new", "potential", "target", "candidate", "suggest", "find",
	"identify", "what", "which",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
	pub id: String,
	pub collection: CollectionName,
	pub name: String,
	pub description: String,
	pub score: f32,
	pub diversity_score: f32,
	pub novelty_score: f32,
	pub final_score: f32,
	pub track: Track,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub evidence: Option<EvidenceData>,
	pub payload: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceData {
	pub source: String,
	pub identifier: String,
	pub links: Vec<String>,
	pub confidence: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborGraph {
	pub nodes: Vec<GraphNode>,
	pub edges: Vec<GraphEdge>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
	pub id: String,
	pub label: String,
	#[serde(rename = "type")]
	pub node_type: String,
	pub score: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
	pub source: String,
	pub target: String,
	pub relation: String,
	pub shared: Vec<String>,
	pub strength: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignCandidate {
	pub name: String,
	pub justification: String,
	pub research_suggestion: String,
	/// `established`, `emerging`, or `exploratory`.
	pub confidence: String,
	pub supporting_articles: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub genes: Vec<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub diseases: Vec<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub pathways: Vec<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub concepts: Vec<String>,
}

pub fn ranked_result(
	collection: CollectionName,
	reranked: RerankedHit,
	include_evidence: bool,
) -> RankedResult {
	let (name, description) = describe(collection, &reranked.tagged.hit);
	let evidence =
		include_evidence.then(|| evidence_for(collection, &reranked.tagged.hit, reranked.relevance));
	let hit = reranked.tagged.hit;

	RankedResult {
		id: hit.id,
		collection,
		name,
		description,
		score: reranked.relevance,
		diversity_score: reranked.diversity_score,
		novelty_score: reranked.novelty_score,
		final_score: reranked.final_score,
		track: reranked.tagged.track,
		evidence,
		payload: hit.payload,
	}
}

/// Display name and short description, read from the fields each collection carries.
pub fn describe(collection: CollectionName, hit: &RawHit) -> (String, String) {
	let pick = |keys: &[&str]| keys.iter().find_map(|key| hit.str_field(key)).map(str::to_string);
	let name = match collection {
		CollectionName::Proteins => pick(&["protein_name", "uniprot_id"]),
		CollectionName::Articles => pick(&["title", "pmid"]),
		CollectionName::Images => pick(&["caption", "title"]),
		CollectionName::Experiments => pick(&["title", "accession"]),
		CollectionName::Structures => pick(&["title", "pdb_id"]),
	}
	.or_else(|| hit.display_name().map(str::to_string))
	.unwrap_or_else(|| hit.id.clone());
	let description = match collection {
		CollectionName::Proteins => pick(&["function", "description"]),
		CollectionName::Articles => pick(&["abstract", "journal"]),
		CollectionName::Images => pick(&["description", "image_type"]),
		CollectionName::Experiments => pick(&["summary", "description"]),
		CollectionName::Structures => {
			let method = hit.text_field("method");
			let resolution = hit.text_field("resolution");

			match (method, resolution) {
				(Some(method), Some(resolution)) => Some(format!("{method}, {resolution} Å")),
				(Some(method), None) => Some(method),
				(None, Some(resolution)) => Some(format!("{resolution} Å")),
				(None, None) => None,
			}
		},
	}
	.map(|text| truncate_chars(&text, DESCRIPTION_CHARS))
	.unwrap_or_default();

	(name, description)
}

pub fn evidence_for(collection: CollectionName, hit: &RawHit, relevance: f32) -> EvidenceData {
	let field = |keys: &[&str]| keys.iter().find_map(|key| hit.text_field(key));
	let mut links = Vec::new();
	let (source, identifier) = match collection {
		CollectionName::Proteins => {
			let id = field(&["uniprot_id", "accession"]).unwrap_or_else(|| hit.id.clone());

			links.push(format!("https://www.uniprot.org/uniprotkb/{id}"));

			("UniProt".to_string(), id)
		},
		CollectionName::Articles => {
			let pmid = field(&["pmid"]);
			let doi = field(&["doi"]);

			if let Some(pmid) = &pmid {
				links.push(format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}"));
			}
			if let Some(doi) = &doi {
				links.push(format!("https://doi.org/{doi}"));
			}

			("PubMed".to_string(), pmid.or(doi).unwrap_or_else(|| hit.id.clone()))
		},
		CollectionName::Images => {
			if let Some(url) = field(&["image_url", "url"]) {
				links.push(url);
			}
			if let Some(pmid) = field(&["pmid"]) {
				links.push(format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}"));
			}

			(field(&["source"]).unwrap_or_else(|| "Image".to_string()), hit.id.clone())
		},
		CollectionName::Experiments => {
			let id = field(&["geo_id", "accession"]).unwrap_or_else(|| hit.id.clone());

			links.push(format!("https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc={id}"));

			("GEO".to_string(), id)
		},
		CollectionName::Structures => {
			let id = field(&["pdb_id"]).unwrap_or_else(|| hit.id.clone());

			links.push(format!("https://www.rcsb.org/structure/{id}"));

			("PDB".to_string(), id)
		},
	};

	EvidenceData { source, identifier, links, confidence: (EVIDENCE_BOOST * relevance).min(1.0) }
}

/// Nodes are results scoring at least the threshold, capped per collection. Edges join nodes
/// sharing at least one gene or disease when the strength reaches the edge threshold.
pub fn neighbor_graph(
	results: &BTreeMap<CollectionName, Vec<RerankedHit>>,
	cfg: &Graph,
) -> NeighborGraph {
	struct Member {
		node: GraphNode,
		genes: BTreeSet<String>,
		diseases: BTreeSet<String>,
	}

	let mut members: Vec<Member> = Vec::new();

	for (collection, hits) in results {
		let kept = hits
			.iter()
			.filter(|entry| entry.relevance >= cfg.score_threshold)
			.take(cfg.max_nodes_per_collection);

		for entry in kept {
			let hit = &entry.tagged.hit;
			let bridge = hit.normalized_bridge();
			let label = hit
				.display_name()
				.map(|name| truncate_chars(name, LABEL_CHARS))
				.unwrap_or_else(|| "Unknown".to_string());
			let mut diseases = bridge.disease_set();

			diseases.extend(canonical_set(&hit.list_field("diseases")));
			members.push(Member {
				node: GraphNode {
					id: format!("{collection}:{}", hit.id),
					label,
					node_type: collection.singular().to_string(),
					score: entry.relevance,
				},
				genes: canonical_set(&hit.genes()),
				diseases,
			});
		}
	}

	let mut edges = Vec::new();

	for (idx, lhs) in members.iter().enumerate() {
		for rhs in &members[idx + 1..] {
			let shared_genes: Vec<String> = lhs.genes.intersection(&rhs.genes).cloned().collect();
			let shared_diseases: Vec<String> =
				lhs.diseases.intersection(&rhs.diseases).cloned().collect();

			if shared_genes.is_empty() && shared_diseases.is_empty() {
				continue;
			}

			let gene_strength = (GENE_EDGE_WEIGHT * shared_genes.len() as f32).min(1.0);
			let disease_strength = (DISEASE_EDGE_WEIGHT * shared_diseases.len() as f32).min(1.0);
			let strength = (gene_strength + disease_strength).min(1.0);

			if strength < cfg.edge_threshold {
				continue;
			}

			let relation =
				if gene_strength >= disease_strength { "shared_genes" } else { "shared_diseases" };

			edges.push(GraphEdge {
				source: lhs.node.id.clone(),
				target: rhs.node.id.clone(),
				relation: relation.to_string(),
				shared: shared_genes.into_iter().chain(shared_diseases).collect(),
				strength,
			});
		}
	}

	NeighborGraph { nodes: members.into_iter().map(|member| member.node).collect(), edges }
}

/// Bridge filters when a bridge ran; otherwise the heaviest terms of the text as concepts.
pub fn extracted_entities(bridge: Option<&BridgeOutput>, text: Option<&str>) -> ExtractedEntities {
	match (bridge, text) {
		(Some(bridge), _) => ExtractedEntities {
			genes: dedup_entities(bridge.filters.genes.iter().cloned(), 10),
			diseases: dedup_entities(bridge.filters.diseases.iter().cloned(), 5),
			pathways: dedup_entities(bridge.filters.pathways.iter().cloned(), 5),
			concepts: Vec::new(),
		},
		(None, Some(text)) => ExtractedEntities {
			concepts: sparse::term_weights(text).into_iter().take(10).map(|(term, _)| term).collect(),
			..Default::default()
		},
		(None, None) => ExtractedEntities::default(),
	}
}

pub fn is_exploratory(text: &str) -> bool {
	let lowered = text.to_lowercase();

	lowered
		.split(|ch: char| !ch.is_alphanumeric())
		.any(|word| EXPLORATORY_TERMS.contains(&word))
}

/// At least five results overall and at least two collections holding two or more.
pub fn results_are_rich<T>(results: &BTreeMap<CollectionName, Vec<T>>) -> bool {
	let total: usize = results.values().map(Vec::len).sum();
	let populated = results.values().filter(|hits| hits.len() >= 2).count();

	total >= 5 && populated >= 2
}

pub fn confidence_label(supporting_articles: usize) -> &'static str {
	match supporting_articles {
		0 => "exploratory",
		1..=2 => "emerging",
		_ => "established",
	}
}

pub fn fallback_summary(results: &BTreeMap<CollectionName, Vec<RankedResult>>) -> String {
	let total: usize = results.values().map(Vec::len).sum();
	let collections = results.values().filter(|hits| !hits.is_empty()).count();

	format!("Found {total} results across {collections} collections.")
}

impl BioService {
	/// Bridge interpretation when one exists, otherwise an LLM summary of the top results.
	pub(crate) async fn summarize(
		&self,
		bridge: Option<&BridgeOutput>,
		results: &BTreeMap<CollectionName, Vec<RankedResult>>,
	) -> String {
		if let Some(bridge) = bridge {
			return bridge.interpretation.clone();
		}

		let digest: Map<String, Value> = results
			.iter()
			.map(|(collection, hits)| {
				let names: Vec<&str> = hits
					.iter()
					.take(SUMMARY_ITEMS_PER_COLLECTION)
					.map(|result| result.name.as_str())
					.collect();

				(collection.to_string(), serde_json::json!(names))
			})
			.collect();
		let system_prompt = "You summarize biomedical search results in two sentences. \
Output must be valid JSON only, shaped as {\"summary\": \"string\"}.";
		let user_prompt = format!("Top results per collection:\n{}", Value::Object(digest));
		let messages = vec![
			serde_json::json!({ "role": "system", "content": system_prompt }),
			serde_json::json!({ "role": "user", "content": user_prompt }),
		];
		let completion = self.providers.llm.complete_json(&self.cfg.providers.llm, &messages).await;

		match completion {
			Ok(value) => match value.get("summary").and_then(Value::as_str).map(str::trim) {
				Some(summary) if !summary.is_empty() => summary.to_string(),
				_ => fallback_summary(results),
			},
			Err(err) => {
				tracing::warn!(error = %err, "Summary generation failed.");

				fallback_summary(results)
			},
		}
	}

	pub(crate) fn design_candidates_apply(
		&self,
		case: SearchCase,
		text: Option<&str>,
		results: &BTreeMap<CollectionName, Vec<RankedResult>>,
	) -> bool {
		case.is_multimodal()
			|| text.map(is_exploratory).unwrap_or(false)
			|| results_are_rich(results)
	}

	/// Proposed research directions, each checked against the article collection.
	pub(crate) async fn design_candidates(
		&self,
		context: &str,
		results: &BTreeMap<CollectionName, Vec<RankedResult>>,
	) -> Vec<DesignCandidate> {
		let names: Vec<&str> =
			results.values().flatten().take(10).map(|result| result.name.as_str()).collect();
		let limit = self.cfg.enrichment.design_candidates;
		let system_prompt = "You propose research directions from biomedical search results. \
Output must be valid JSON only, shaped as \
{\"candidates\": [{\"name\": \"string\", \"justification\": \"string\", \"research_suggestion\": \"string\"}]}. \
Each name must be a short gene, protein, pathway, or compound name.";
		let user_prompt = format!(
			"Propose at most {limit} candidates.\nQuery context:\n{context}\nTop results:\n{}",
			serde_json::json!(names)
		);
		let messages = vec![
			serde_json::json!({ "role": "system", "content": system_prompt }),
			serde_json::json!({ "role": "user", "content": user_prompt }),
		];
		let value = match self.providers.llm.complete_json(&self.cfg.providers.llm, &messages).await
		{
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(error = %err, "Design candidate generation failed.");

				return Vec::new();
			},
		};
		let proposals: Vec<(String, String, String)> = value
			.get("candidates")
			.and_then(Value::as_array)
			.map(|items| {
				items
					.iter()
					.filter_map(|item| {
						let text = |key: &str| {
							item.get(key)
								.and_then(Value::as_str)
								.unwrap_or_default()
								.trim()
								.to_string()
						};
						let name = text("name");

						(!name.is_empty())
							.then(|| (name, text("justification"), text("research_suggestion")))
					})
					.take(limit)
					.collect()
			})
			.unwrap_or_default();
		let supports = futures::future::join_all(
			proposals.iter().map(|(name, _, _)| self.supporting_articles(name)),
		)
		.await;

		proposals
			.into_iter()
			.zip(supports)
			.map(|((name, justification, research_suggestion), supporting_articles)| {
				DesignCandidate {
					name,
					justification,
					research_suggestion,
					confidence: confidence_label(supporting_articles).to_string(),
					supporting_articles,
				}
			})
			.collect()
	}

	/// Article titles mentioning `name`. Any failure counts as no support.
	async fn supporting_articles(&self, name: &str) -> usize {
		let vector = match self.encode_text(name).await {
			Ok(vector) => vector,
			Err(err) => {
				tracing::warn!(
					candidate = name,
					error = %err,
					"Candidate probe could not be encoded."
				);

				return 0;
			},
		};
		let query = HybridQuery::text(
			CollectionName::Articles,
			&vector,
			self.cfg.enrichment.evidence_probe_limit as usize,
		);
		let outcome = self.search_collection(query).await;
		let needle = name.to_lowercase();

		outcome
			.hits
			.iter()
			.filter_map(|hit| hit.str_field("title"))
			.filter(|title| title.to_lowercase().contains(&needle))
			.count()
	}
}
