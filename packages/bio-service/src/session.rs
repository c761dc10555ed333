use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use bio_storage::sessions::{self, SessionRow};

use crate::{BoxFuture, Result, SessionStore, router::SearchState};

/// A search paused at the merge step, waiting for the user's choice.
#[derive(Clone, Debug)]
pub struct PendingSearch {
	pub session_id: Uuid,
	pub state: SearchState,
	pub created_at: OffsetDateTime,
	/// After this instant the default choice applies.
	pub decide_by: OffsetDateTime,
	/// After this instant the session is gone.
	pub expires_at: OffsetDateTime,
}
impl PendingSearch {
	fn to_row(&self) -> Result<SessionRow> {
		Ok(SessionRow {
			session_id: self.session_id,
			state: serde_json::to_value(&self.state)?,
			created_at: self.created_at,
			decide_by: self.decide_by,
			expires_at: self.expires_at,
		})
	}

	fn from_row(row: SessionRow) -> Result<Self> {
		Ok(Self {
			session_id: row.session_id,
			state: serde_json::from_value(row.state)?,
			created_at: row.created_at,
			decide_by: row.decide_by,
			expires_at: row.expires_at,
		})
	}
}

/// Sessions in the `search_sessions` table.
pub struct PgSessions {
	pool: PgPool,
}
impl PgSessions {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl SessionStore for PgSessions {
	fn put<'a>(&'a self, pending: &'a PendingSearch) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let row = pending.to_row()?;

			sessions::insert_session(&self.pool, &row).await?;

			Ok(())
		})
	}

	fn take<'a>(
		&'a self,
		session_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<PendingSearch>>> {
		Box::pin(async move {
			let purged = sessions::purge_expired(&self.pool, now).await?;

			if purged > 0 {
				tracing::debug!(purged, "Purged expired search sessions.");
			}

			match sessions::take_session(&self.pool, session_id, now).await? {
				Some(row) => Ok(Some(PendingSearch::from_row(row)?)),
				None => Ok(None),
			}
		})
	}
}

/// Process-local sessions for single-instance deployments and tests. Expired entries are dropped
/// on every insert and lookup.
#[derive(Clone, Default)]
pub struct MemorySessions {
	inner: Arc<Mutex<HashMap<Uuid, PendingSearch>>>,
}
impl MemorySessions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, PendingSearch>> {
		self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
impl SessionStore for MemorySessions {
	fn put<'a>(&'a self, pending: &'a PendingSearch) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut sessions = self.lock();

			sessions.retain(|_, stored| stored.expires_at > now);
			sessions.insert(pending.session_id, pending.clone());

			Ok(())
		})
	}

	fn take<'a>(
		&'a self,
		session_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<PendingSearch>>> {
		Box::pin(async move {
			let mut sessions = self.lock();

			sessions.retain(|_, pending| pending.expires_at > now);

			Ok(sessions.remove(&session_id))
		})
	}
}
