use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use intake_core::domain::session::{Session, SessionId};
use intake_core::flows::FlowState;

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

/// Sessions as one row each; form, transcript and counters are JSON columns.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, phase, form_json, transcript_json, counters_json, created_at, updated_at
            FROM intake_session
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| session_from_row(&r)).transpose()
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let form_json = encode_json("form_json", &session.form)?;
        let transcript_json = encode_json("transcript_json", &session.transcript)?;
        let counters_json = encode_json("counters_json", &session.counters)?;

        sqlx::query(
            r#"
            INSERT INTO intake_session
                (id, phase, form_json, transcript_json, counters_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                phase = excluded.phase,
                form_json = excluded.form_json,
                transcript_json = excluded.transcript_json,
                counters_json = excluded.counters_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.id.0)
        .bind(session.phase.as_str())
        .bind(&form_json)
        .bind(&transcript_json)
        .bind(&counters_json)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(
            event_name = "session.saved",
            session_id = %session.id,
            phase = session.phase.as_str(),
            "session persisted"
        );
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM intake_session WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM intake_session ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(SessionId).collect())
    }
}

fn session_from_row(row: &SqliteRow) -> Result<Session, RepositoryError> {
    let id: String = row.try_get("id")?;
    let phase: String = row.try_get("phase")?;
    let form_json: String = row.try_get("form_json")?;
    let transcript_json: String = row.try_get("transcript_json")?;
    let counters_json: String = row.try_get("counters_json")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Session {
        id: SessionId(id),
        form: decode_json("form_json", &form_json)?,
        transcript: decode_json("transcript_json", &transcript_json)?,
        phase: FlowState::parse(&phase)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown session phase `{phase}`")))?,
        counters: decode_json("counters_json", &counters_json)?,
        created_at: parse_timestamp("created_at", created_at)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}

fn encode_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Encode(format!("could not encode `{column}`: {e}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("invalid json in `{column}`: {e}")))
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}
