use sqlx::PgPool;

use crate::error::EventStoreError;

// ============================================================================
// Relational Schema
// ============================================================================
//
// The UNIQUE constraints on (aggregate_id, version) are not an optimization:
// they are the correctness backbone of optimistic concurrency. The
// read-compare step in the store is only a fast-path early rejection.
//
// ============================================================================

pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id UUID PRIMARY KEY,
        aggregate_id UUID NOT NULL,
        aggregate_type TEXT NOT NULL,
        event_type TEXT NOT NULL,
        event_data JSONB NOT NULL,
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
        version BIGINT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        user_id UUID,
        correlation_id UUID NOT NULL,
        causation_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT events_aggregate_id_version_key UNIQUE (aggregate_id, version)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS events_event_type_timestamp_idx ON events (event_type, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS events_aggregate_type_timestamp_idx ON events (aggregate_type, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS events_user_id_timestamp_idx ON events (user_id, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS events_correlation_id_timestamp_idx ON events (correlation_id, timestamp ASC)",
    r#"
    CREATE TABLE IF NOT EXISTS snapshots (
        id UUID PRIMARY KEY,
        aggregate_id UUID NOT NULL,
        aggregate_type TEXT NOT NULL,
        data JSONB NOT NULL,
        version BIGINT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT snapshots_aggregate_id_version_key UNIQUE (aggregate_id, version)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS snapshots_aggregate_id_version_idx ON snapshots (aggregate_id, version DESC)",
];

/// Create the event and snapshot tables if they do not exist. Run once at
/// startup, before the store takes traffic.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), EventStoreError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("event store schema ensured");
    Ok(())
}
