//! Pending clarification sessions.
//!
//! A row holds the serialized partial search state between the first call and the user's choice.
//! `take_session` deletes as it reads, so a session resumes at most once.

use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct SessionRow {
	pub session_id: Uuid,
	pub state: Value,
	pub created_at: OffsetDateTime,
	/// Past this instant the default choice applies.
	pub decide_by: OffsetDateTime,
	/// Past this instant the row is gone.
	pub expires_at: OffsetDateTime,
}

pub async fn insert_session<'e, E>(executor: E, row: &SessionRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO search_sessions (session_id, state, created_at, decide_by, expires_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (session_id) DO UPDATE
SET state = EXCLUDED.state,
	decide_by = EXCLUDED.decide_by,
	expires_at = EXCLUDED.expires_at",
	)
	.bind(row.session_id)
	.bind(&row.state)
	.bind(row.created_at)
	.bind(row.decide_by)
	.bind(row.expires_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn take_session<'e, E>(
	executor: E,
	session_id: Uuid,
	now: OffsetDateTime,
) -> Result<Option<SessionRow>>
where
	E: PgExecutor<'e>,
{
	let row: Option<(Uuid, Value, OffsetDateTime, OffsetDateTime, OffsetDateTime)> =
		sqlx::query_as(
			"\
DELETE FROM search_sessions
WHERE session_id = $1 AND expires_at > $2
RETURNING session_id, state, created_at, decide_by, expires_at",
		)
		.bind(session_id)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row.map(|(session_id, state, created_at, decide_by, expires_at)| SessionRow {
		session_id,
		state,
		created_at,
		decide_by,
		expires_at,
	}))
}

pub async fn purge_expired<'e, E>(executor: E, now: OffsetDateTime) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM search_sessions WHERE expires_at <= $1")
		.bind(now)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}
