pub mod aggregate;
pub mod bridge;
pub mod cache;
pub mod classify;
pub mod divergence;
pub mod diversity;
pub mod encode;
pub mod hybrid;
pub mod recommend;
pub mod router;
pub mod session;

mod error;

pub use error::{Error, Result};
pub use recommend::{
	Outcome, PendingReply, RecommendRequest, RecommendResponse, ResumeRequest,
};
pub use session::{MemorySessions, PendingSearch, PgSessions};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use bio_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use bio_domain::{hit::RawHit, query::VectorQuery};
use bio_providers::{embedding, llm};
use bio_storage::qdrant::QdrantStore;

use crate::cache::EncodingCache;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		input_type: &'a str,
		inputs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

/// Nearest-neighbour retrieval against one named slot of one collection.
pub trait VectorStore
where
	Self: Send + Sync,
{
	fn query<'a>(&'a self, query: &'a VectorQuery) -> BoxFuture<'a, Result<Vec<RawHit>>>;
}

/// Keeps paused searches between the clarification prompt and the user's answer.
pub trait SessionStore
where
	Self: Send + Sync,
{
	fn put<'a>(&'a self, pending: &'a PendingSearch) -> BoxFuture<'a, Result<()>>;

	/// Removes and returns the session unless it has fully expired.
	fn take<'a>(
		&'a self,
		session_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<PendingSearch>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub llm: Arc<dyn LlmProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, llm: Arc<dyn LlmProvider>) -> Self {
		Self { embedding, llm }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), llm: provider }
	}
}

pub struct BioService {
	pub cfg: Config,
	pub store: Arc<dyn VectorStore>,
	pub sessions: Arc<dyn SessionStore>,
	pub providers: Providers,
	pub(crate) cache: EncodingCache,
}
impl BioService {
	pub fn new(cfg: Config, store: Arc<dyn VectorStore>, sessions: Arc<dyn SessionStore>) -> Self {
		Self::with_providers(cfg, store, sessions, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		store: Arc<dyn VectorStore>,
		sessions: Arc<dyn SessionStore>,
		providers: Providers,
	) -> Self {
		let cache = EncodingCache::new(cfg.cache.enabled, cfg.cache.max_entries);

		Self { cfg, store, sessions, providers, cache }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		input_type: &'a str,
		inputs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, input_type, inputs))
	}
}
impl LlmProvider for DefaultProviders {
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(llm::complete_json(cfg, messages))
	}
}

impl VectorStore for QdrantStore {
	fn query<'a>(&'a self, query: &'a VectorQuery) -> BoxFuture<'a, Result<Vec<RawHit>>> {
		Box::pin(async move { QdrantStore::query(self, query).await.map_err(Error::from) })
	}
}
