mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Clarification, Config, EmbeddingProviderConfig, Enrichment, Graph, LlmProviderConfig,
	Postgres, Providers, Qdrant, Ranking, Search, Service, Storage,
};

use std::{fs, path::Path};

/// Output width of the text encoder.
pub const TEXT_DIMENSIONS: u32 = 768;
/// Output width of the protein-sequence encoder.
pub const SEQUENCE_DIMENSIONS: u32 = 1_280;
/// Output width of the image encoder.
pub const IMAGE_DIMENSIONS: u32 = 512;
/// Output width of the 3-D structure encoder.
pub const STRUCTURE_DIMENSIONS: u32 = 768;

const CHOICES: [&str; 4] = ["intersection", "text_priority", "modal_priority", "multi_track"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}

	for (label, provider, expected) in [
		("text_embedding", &cfg.providers.text_embedding, TEXT_DIMENSIONS),
		("sequence_embedding", &cfg.providers.sequence_embedding, SEQUENCE_DIMENSIONS),
		("image_embedding", &cfg.providers.image_embedding, IMAGE_DIMENSIONS),
		("structure_embedding", &cfg.providers.structure_embedding, STRUCTURE_DIMENSIONS),
	] {
		if provider.dimensions != expected {
			return Err(Error::Validation {
				message: format!("providers.{label}.dimensions must be {expected}."),
			});
		}
		if provider.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.providers.llm.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider llm api_key must be non-empty.".to_string(),
		});
	}
	if cfg.search.default_top_k == 0 {
		return Err(Error::Validation {
			message: "search.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_top_k > cfg.search.max_top_k {
		return Err(Error::Validation {
			message: "search.default_top_k must be at most search.max_top_k.".to_string(),
		});
	}
	if cfg.search.candidate_multiplier == 0 {
		return Err(Error::Validation {
			message: "search.candidate_multiplier must be greater than zero.".to_string(),
		});
	}
	if !cfg.search.rrf_k.is_finite() || cfg.search.rrf_k <= 0.0 {
		return Err(Error::Validation {
			message: "search.rrf_k must be a finite number greater than zero.".to_string(),
		});
	}
	if cfg.search.collection_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.collection_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "search.max_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.search.bridge_top_n == 0 {
		return Err(Error::Validation {
			message: "search.bridge_top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.mmr_pool == 0 {
		return Err(Error::Validation {
			message: "ranking.mmr_pool must be greater than zero.".to_string(),
		});
	}

	for (label, lambda) in [
		("ranking.mmr_lambda_aligned", cfg.ranking.mmr_lambda_aligned),
		("ranking.mmr_lambda_partial", cfg.ranking.mmr_lambda_partial),
		("ranking.mmr_lambda_divergent", cfg.ranking.mmr_lambda_divergent),
		("clarification.partial_overlap_threshold", cfg.clarification.partial_overlap_threshold),
		("graph.score_threshold", cfg.graph.score_threshold),
		("graph.edge_threshold", cfg.graph.edge_threshold),
	] {
		if !lambda.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&lambda) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.clarification.timeout_seconds == 0 {
		return Err(Error::Validation {
			message: "clarification.timeout_seconds must be greater than zero.".to_string(),
		});
	}
	if !CHOICES.contains(&cfg.clarification.default_choice.as_str()) {
		return Err(Error::Validation {
			message: "clarification.default_choice must be one of intersection, text_priority, modal_priority, or multi_track."
				.to_string(),
		});
	}
	if !matches!(cfg.clarification.store.as_str(), "postgres" | "memory") {
		return Err(Error::Validation {
			message: "clarification.store must be one of postgres or memory.".to_string(),
		});
	}
	if cfg.graph.max_nodes_per_collection == 0 {
		return Err(Error::Validation {
			message: "graph.max_nodes_per_collection must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.enabled && cfg.cache.max_entries == 0 {
		return Err(Error::Validation {
			message: "cache.max_entries must be greater than zero when enabled.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}

	cfg.storage.qdrant.collection_prefix = cfg.storage.qdrant.collection_prefix.trim().to_string();
	cfg.clarification.default_choice =
		cfg.clarification.default_choice.trim().to_ascii_lowercase();
	cfg.clarification.store = cfg.clarification.store.trim().to_ascii_lowercase();
}
