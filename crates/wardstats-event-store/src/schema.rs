//! Event store database schema.
//!
//! Mirrors `migrations/20260101000000_create_domain_events.sql` for callers
//! that bootstrap the table without running sqlx migrations.

/// SQL to create the events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS domain_events (
    event_id        UUID PRIMARY KEY,
    entity_id       VARCHAR(255) NOT NULL,
    entity_type     VARCHAR(255) NOT NULL,
    event_type      VARCHAR(255) NOT NULL,
    payload         JSONB NOT NULL,
    sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
    occurred_at     TIMESTAMPTZ NOT NULL,
    actor_id        VARCHAR(255),
    UNIQUE (entity_id, sequence_number)
);

CREATE INDEX IF NOT EXISTS idx_domain_events_entity_occurred_at
    ON domain_events (entity_id, occurred_at);

CREATE INDEX IF NOT EXISTS idx_domain_events_entity_type
    ON domain_events (entity_type, entity_id);
";
