//! Shared fixtures for orchestrator tests: stub providers and a wired service.

pub mod stubs;

mod error;

pub use error::{Error, Result};
pub use stubs::{MemoryVectorStore, ScriptedLlm, StubEncoder, seeded_point, vector_for};

use std::sync::Arc;

use bio_config::Config;
use bio_service::{BioService, MemorySessions, Providers};

const TEST_CONFIG_TOML: &str =
	include_str!("../../bio-config/tests/fixtures/sample_config.template.toml");

/// The sample config with in-memory sessions, already validated.
pub fn test_config() -> Result<Config> {
	let cfg: Config =
		toml::from_str(TEST_CONFIG_TOML).map_err(|err| Error::Config(err.to_string()))?;

	bio_config::validate(&cfg).map_err(|err| Error::Config(err.to_string()))?;

	Ok(cfg)
}

/// A service wired to in-memory collaborators, with handles kept for inspection.
pub struct Harness {
	pub service: BioService,
	pub store: MemoryVectorStore,
	pub encoder: StubEncoder,
	pub llm: ScriptedLlm,
	pub sessions: MemorySessions,
}
impl Harness {
	pub fn new(llm: ScriptedLlm) -> Result<Self> {
		Self::with_config(test_config()?, llm)
	}

	pub fn with_config(cfg: Config, llm: ScriptedLlm) -> Result<Self> {
		let store = MemoryVectorStore::new();
		let encoder = StubEncoder::new();
		let sessions = MemorySessions::new();
		let providers = Providers::new(Arc::new(encoder.clone()), Arc::new(llm.clone()));
		let service = BioService::with_providers(
			cfg,
			Arc::new(store.clone()),
			Arc::new(sessions.clone()),
			providers,
		);

		Ok(Self { service, store, encoder, llm, sessions })
	}
}
