use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub clarification: Clarification,
	#[serde(default)]
	pub graph: Graph,
	#[serde(default)]
	pub enrichment: Enrichment,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub api_key: Option<String>,
	/// Prepended to each logical collection name, e.g. "bio_" gives "bio_proteins".
	#[serde(default)]
	pub collection_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub text_embedding: EmbeddingProviderConfig,
	pub sequence_embedding: EmbeddingProviderConfig,
	pub image_embedding: EmbeddingProviderConfig,
	pub structure_embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_top_k: u32,
	pub max_top_k: u32,
	/// Each side of a hybrid query retrieves `candidate_multiplier * limit` points.
	pub candidate_multiplier: u32,
	pub rrf_k: f32,
	pub collection_timeout_ms: u64,
	pub max_concurrency: usize,
	pub bridge_top_n: usize,
	pub min_sequence_len: usize,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_top_k: 5,
			max_top_k: 50,
			candidate_multiplier: 2,
			rrf_k: 60.0,
			collection_timeout_ms: 5_000,
			max_concurrency: 5,
			bridge_top_n: 5,
			min_sequence_len: 10,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub mmr_pool: usize,
	pub mmr_lambda_aligned: f32,
	pub mmr_lambda_partial: f32,
	pub mmr_lambda_divergent: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			mmr_pool: 10,
			mmr_lambda_aligned: 0.7,
			mmr_lambda_partial: 0.5,
			mmr_lambda_divergent: 0.3,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Clarification {
	/// Partial alignment asks the user when the entity Jaccard between the modal and text
	/// tracks falls below this value.
	pub partial_overlap_threshold: f32,
	pub timeout_seconds: u64,
	pub default_choice: String,
	pub grace_seconds: u64,
	pub store: String,
}
impl Default for Clarification {
	fn default() -> Self {
		Self {
			partial_overlap_threshold: 0.2,
			timeout_seconds: 10,
			default_choice: "multi_track".to_string(),
			grace_seconds: 300,
			store: "postgres".to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Graph {
	pub score_threshold: f32,
	pub edge_threshold: f32,
	pub max_nodes_per_collection: usize,
}
impl Default for Graph {
	fn default() -> Self {
		Self { score_threshold: 0.5, edge_threshold: 0.2, max_nodes_per_collection: 5 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Enrichment {
	pub design_candidates: usize,
	pub evidence_probe_limit: u32,
}
impl Default for Enrichment {
	fn default() -> Self {
		Self { design_candidates: 3, evidence_probe_limit: 10 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub max_entries: usize,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, max_entries: 1_024 }
	}
}
