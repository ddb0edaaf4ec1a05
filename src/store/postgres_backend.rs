//! PostgreSQL message store.
//!
//! Rows live in the `ldn_message` table (see `migrations/`). Status changes
//! are single conditional `UPDATE ... RETURNING` statements, so the guard
//! check and the write happen in one round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::message::{QueueMessage, QueueState, QueueStatus};

use super::backend::{MessageStore, StatusCounts, StoreError, TransitionGuard};

const SELECT_COLUMNS: &str = r#"
    id, object_id, context_id, origin_id, target_id, in_reply_to,
    message, message_type, queue_status, queue_attempts,
    queue_last_start_time, queue_timeout, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    object_id: String,
    context_id: Option<String>,
    origin_id: Option<String>,
    target_id: Option<String>,
    in_reply_to: Option<String>,
    message: String,
    message_type: String,
    queue_status: i16,
    queue_attempts: i32,
    queue_last_start_time: Option<DateTime<Utc>>,
    queue_timeout: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for QueueMessage {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let queue_status = QueueStatus::from_code(row.queue_status).ok_or_else(|| {
            StoreError::Corrupt {
                id: row.id.clone(),
                reason: format!("unknown queue_status code {}", row.queue_status),
            }
        })?;
        let queue_attempts = u32::try_from(row.queue_attempts).map_err(|_| StoreError::Corrupt {
            id: row.id.clone(),
            reason: format!("negative queue_attempts {}", row.queue_attempts),
        })?;

        Ok(QueueMessage {
            id: row.id,
            object: row.object_id,
            context: row.context_id,
            origin: row.origin_id,
            target: row.target_id,
            in_reply_to: row.in_reply_to,
            message: row.message,
            message_type: row.message_type,
            queue_status,
            queue_attempts,
            queue_last_start_time: row.queue_last_start_time,
            queue_timeout: row.queue_timeout,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_messages(rows: Vec<MessageRow>) -> Result<Vec<QueueMessage>, StoreError> {
    rows.into_iter().map(QueueMessage::try_from).collect()
}

/// PostgreSQL-backed message store.
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, message: &QueueMessage) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO ldn_message (
                id, object_id, context_id, origin_id, target_id, in_reply_to,
                message, message_type, queue_status, queue_attempts,
                queue_last_start_time, queue_timeout, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&message.id)
        .bind(&message.object)
        .bind(&message.context)
        .bind(&message.origin)
        .bind(&message.target)
        .bind(&message.in_reply_to)
        .bind(&message.message)
        .bind(&message.message_type)
        .bind(message.queue_status.code())
        .bind(message.queue_attempts as i32)
        .bind(message.queue_last_start_time)
        .bind(message.queue_timeout)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(message.id.clone()));
        }

        tracing::trace!(message_id = %message.id, "Message stored in PostgreSQL");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<QueueMessage>, StoreError> {
        let sql = format!("SELECT {} FROM ldn_message WHERE id = $1", SELECT_COLUMNS);
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(QueueMessage::try_from).transpose()
    }

    async fn find_oldest_queued(&self) -> Result<Option<QueueMessage>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ldn_message WHERE queue_status = $1 \
             ORDER BY created_at ASC, seq ASC LIMIT 1",
            SELECT_COLUMNS
        );
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(QueueStatus::Queued.code())
            .fetch_optional(&self.pool)
            .await?;

        row.map(QueueMessage::try_from).transpose()
    }

    async fn find_timed_out(&self, now: DateTime<Utc>) -> Result<Vec<QueueMessage>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ldn_message WHERE queue_status = $1 AND queue_timeout < $2 \
             ORDER BY created_at ASC, seq ASC",
            SELECT_COLUMNS
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(QueueStatus::Processing.code())
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        into_messages(rows)
    }

    async fn find_replies(&self, id: &str) -> Result<Vec<QueueMessage>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ldn_message WHERE in_reply_to = $1 ORDER BY created_at ASC, seq ASC",
            SELECT_COLUMNS
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        into_messages(rows)
    }

    async fn transition(
        &self,
        id: &str,
        guard: TransitionGuard,
        next: QueueState,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueMessage>, StoreError> {
        let sql = format!(
            r#"
            UPDATE ldn_message
            SET queue_status = $2,
                queue_attempts = $3,
                queue_last_start_time = $4,
                queue_timeout = $5,
                updated_at = $6
            WHERE id = $1
              AND queue_status = $7
              AND ($8::timestamptz IS NULL OR queue_last_start_time = $8)
              AND ($9::timestamptz IS NULL OR queue_timeout < $9)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        );
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(next.status.code())
            .bind(next.attempts as i32)
            .bind(next.last_start_time)
            .bind(next.timeout)
            .bind(now)
            .bind(guard.status.code())
            .bind(guard.claimed_at)
            .bind(guard.timed_out_before)
            .fetch_optional(&self.pool)
            .await?;

        row.map(QueueMessage::try_from).transpose()
    }

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        let rows: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT queue_status, COUNT(*) FROM ldn_message GROUP BY queue_status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tally_status_counts(rows))
    }
}

/// Fold `(queue_status, COUNT(*))` pairs; unknown codes are logged and dropped.
fn tally_status_counts(rows: Vec<(i16, i64)>) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for (code, count) in rows {
        match QueueStatus::from_code(code) {
            Some(status) => counts.add(status, count.max(0) as u64),
            None => tracing::warn!(code, count, "Ignoring rows with unknown queue_status"),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(queue_status: i16, queue_attempts: i32) -> MessageRow {
        let created = Utc::now();
        MessageRow {
            id: "urn:uuid:0001".to_string(),
            object_id: "item-1".to_string(),
            context_id: Some("https://doi.org/10.1234/ctx".to_string()),
            origin_id: None,
            target_id: Some("review".to_string()),
            in_reply_to: None,
            message: r#"{"type":["Announce"]}"#.to_string(),
            message_type: "Announce,coar-notify:ReleaseAction".to_string(),
            queue_status,
            queue_attempts,
            queue_last_start_time: None,
            queue_timeout: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_row_maps_to_message() {
        let started = Utc::now();
        let mut processing = row(2, 3);
        processing.queue_last_start_time = Some(started);
        processing.queue_timeout = Some(started + chrono::Duration::minutes(60));

        let message = QueueMessage::try_from(processing).unwrap();
        assert_eq!(message.id, "urn:uuid:0001");
        assert_eq!(message.object, "item-1");
        assert_eq!(message.target.as_deref(), Some("review"));
        assert_eq!(message.queue_status, QueueStatus::Processing);
        assert_eq!(message.queue_attempts, 3);
        assert_eq!(message.queue_last_start_time, Some(started));
        assert_eq!(message.types(), vec!["Announce", "coar-notify:ReleaseAction"]);
        assert!(message.timing_consistent());
    }

    #[test]
    fn test_unknown_status_code_is_corrupt() {
        let err = QueueMessage::try_from(row(9, 0)).unwrap_err();
        match err {
            StoreError::Corrupt { id, reason } => {
                assert_eq!(id, "urn:uuid:0001");
                assert!(reason.contains("queue_status"));
            }
            other => panic!("expected Corrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_attempts_is_corrupt() {
        let err = QueueMessage::try_from(row(1, -1)).unwrap_err();
        assert!(
            matches!(&err, StoreError::Corrupt { reason, .. } if reason.contains("queue_attempts")),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_one_corrupt_row_fails_the_batch() {
        let result = into_messages(vec![row(1, 0), row(0, 0)]);
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_tally_skips_unknown_codes() {
        let counts = tally_status_counts(vec![(1, 4), (2, 1), (3, 7), (4, 2), (42, 100), (1, -3)]);
        assert_eq!(counts.queued, 4);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.processed, 7);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.total(), 14);
    }
}
