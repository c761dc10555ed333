use std::sync::Arc;

use bio_service::{BioService, MemorySessions, PgSessions, SessionStore};
use bio_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BioService>,
}
impl AppState {
	/// Connects to Qdrant, bootstraps missing collections, and picks the session backend.
	pub async fn new(config: bio_config::Config) -> color_eyre::Result<Self> {
		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collections().await?;

		let sessions: Arc<dyn SessionStore> = match config.clarification.store.as_str() {
			"postgres" => {
				let db = Db::connect(&config.storage.postgres).await?;

				db.ensure_schema().await?;

				Arc::new(PgSessions::new(db.pool))
			},
			_ => Arc::new(MemorySessions::new()),
		};

		tracing::info!(store = %config.clarification.store, "Clarification sessions ready.");

		let service = BioService::new(config, Arc::new(qdrant), sessions);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: BioService) -> Self {
		Self { service: Arc::new(service) }
	}
}
