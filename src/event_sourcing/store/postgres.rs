use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use super::event_store::{EventStore, Page};
use super::snapshot::Snapshot;
use crate::error::EventStoreError;
use crate::event_sourcing::core::RecordedEvent;

// ============================================================================
// Postgres Event Store
// ============================================================================
//
// Append-only writes against the `events` table; the UNIQUE constraint on
// (aggregate_id, version) turns a lost race between concurrent writers into
// a ConcurrencyConflict instead of a corrupted stream. Snapshots live in a
// parallel `snapshots` table and are never authoritative.
//
// ============================================================================

const EVENT_COLUMNS: &str = "id, aggregate_id, aggregate_type, event_type, event_data, \
     metadata, version, timestamp, user_id, correlation_id, causation_id";

#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: &PgRow) -> Result<RecordedEvent, EventStoreError> {
        let metadata: sqlx::types::Json<HashMap<String, String>> = row.try_get("metadata")?;
        Ok(RecordedEvent {
            id: row.try_get("id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            event_type: row.try_get("event_type")?,
            data: row.try_get("event_data")?,
            metadata: metadata.0,
            version: row.try_get("version")?,
            timestamp: row.try_get("timestamp")?,
            user_id: row.try_get("user_id")?,
            correlation_id: row.try_get("correlation_id")?,
            causation_id: row.try_get("causation_id")?,
        })
    }

    fn rows_to_events(rows: Vec<PgRow>) -> Result<Vec<RecordedEvent>, EventStoreError> {
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn insert_event<'e, E>(
        executor: E,
        event: &RecordedEvent,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            "INSERT INTO events (id, aggregate_id, aggregate_type, event_type, event_data, \
             metadata, version, timestamp, user_id, correlation_id, causation_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(event.id)
        .bind(event.aggregate_id)
        .bind(&event.aggregate_type)
        .bind(&event.event_type)
        .bind(&event.data)
        .bind(sqlx::types::Json(&event.metadata))
        .bind(event.version)
        .bind(event.timestamp)
        .bind(event.user_id)
        .bind(event.correlation_id)
        .bind(event.causation_id)
        .execute(executor)
        .await
        .map(|_| ())
    }

    fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
        match err {
            sqlx::Error::Database(db) => db.constraint(),
            _ => None,
        }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn events_from_version(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE aggregate_id = $1 AND version > $2 ORDER BY version ASC"
        ))
        .bind(aggregate_id)
        .bind(from_version)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_events(rows)
    }

    async fn events_from_timestamp(
        &self,
        aggregate_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE aggregate_id = $1 AND timestamp >= $2 ORDER BY timestamp ASC"
        ))
        .bind(aggregate_id)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_events(rows)
    }

    async fn events_by_type(
        &self,
        event_type: &str,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE event_type = $1 ORDER BY timestamp DESC LIMIT $2 OFFSET $3"
        ))
        .bind(event_type)
        .bind(page.size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_events(rows)
    }

    async fn events_by_aggregate_type(
        &self,
        aggregate_type: &str,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE aggregate_type = $1 ORDER BY timestamp DESC LIMIT $2 OFFSET $3"
        ))
        .bind(aggregate_type)
        .bind(page.size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_events(rows)
    }

    async fn events_by_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE user_id = $1 ORDER BY timestamp DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_events(rows)
    }

    async fn events_by_correlation(
        &self,
        correlation_id: Uuid,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE correlation_id = $1 ORDER BY timestamp ASC"
        ))
        .bind(correlation_id)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_events(rows)
    }

    async fn append(
        &self,
        aggregate_id: Uuid,
        events: &[RecordedEvent],
        expected_version: i64,
    ) -> Result<i64, EventStoreError> {
        if events.is_empty() {
            return Ok(expected_version);
        }

        let mut tx = self.pool.begin().await?;

        // Fast-path rejection; the unique constraint below is the real gate.
        let current: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id)
                .fetch_one(&mut *tx)
                .await?;

        if current != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                current,
            });
        }

        let mut new_version = expected_version;
        for event in events {
            new_version = event.version;
            if let Err(err) = Self::insert_event(&mut *tx, event).await {
                drop(tx);
                return Err(match Self::violated_constraint(&err) {
                    Some("events_aggregate_id_version_key") => {
                        // Lost the race after the fast-path check passed.
                        let current = self.latest_version(aggregate_id).await?;
                        EventStoreError::ConcurrencyConflict {
                            aggregate_id,
                            expected: expected_version,
                            current,
                        }
                    }
                    Some("events_pkey") => EventStoreError::DuplicateEvent(event.id),
                    _ => err.into(),
                });
            }
        }

        tx.commit().await?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            new_version = new_version,
            event_count = events.len(),
            "appended events to event store"
        );

        Ok(new_version)
    }

    async fn append_one(&self, event: &RecordedEvent) -> Result<(), EventStoreError> {
        Self::insert_event(&self.pool, event).await.map_err(|err| {
            match Self::violated_constraint(&err) {
                Some("events_pkey") => EventStoreError::DuplicateEvent(event.id),
                _ => err.into(),
            }
        })
    }

    async fn latest_snapshot(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let row = sqlx::query(
            "SELECT id, aggregate_id, aggregate_type, data, version, timestamp \
             FROM snapshots WHERE aggregate_id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Snapshot {
                id: row.try_get("id")?,
                aggregate_id: row.try_get("aggregate_id")?,
                aggregate_type: row.try_get("aggregate_type")?,
                data: row.try_get("data")?,
                version: row.try_get("version")?,
                timestamp: row.try_get("timestamp")?,
            })
        })
        .transpose()
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        sqlx::query(
            "INSERT INTO snapshots (id, aggregate_id, aggregate_type, data, version, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (aggregate_id, version) \
             DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(snapshot.id)
        .bind(snapshot.aggregate_id)
        .bind(&snapshot.aggregate_type)
        .bind(&snapshot.data)
        .bind(snapshot.version)
        .bind(snapshot.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            aggregate_id = %snapshot.aggregate_id,
            version = snapshot.version,
            "saved snapshot"
        );

        Ok(())
    }

    async fn event_exists(&self, event_id: Uuid) -> Result<bool, EventStoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn latest_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }
}

// Store behavior is exercised against the in-memory implementation; the
// queries above require a live Postgres and are covered by integration
// runs against a provisioned database.
