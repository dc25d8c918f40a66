//! PostgreSQL GroupStore.
//!
//! Writes run inside a transaction that row-locks the target group, so a
//! concurrent ingest upsert and a resolve / summary write on the same cluster
//! key cannot interleave. Dropping an uncommitted transaction rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::raw_sql::raw_sql;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgPoolOptions, PgRow, Postgres};

use super::GroupStore;
use crate::error::GroupError;
use crate::summary;
use crate::types::*;

const SCHEMA: &str = include_str!("../../schema.sql");

const GROUP_COLUMNS: &str = "id, cluster_key, service, error_type, title, status, count, \
  first_seen, last_seen, severity, ai_summary, summarized_at, resolution_reason, resolved_at";

const EVENT_COLUMNS: &str = "id, service, error_type, message, timestamp, env, path, trace_id";

#[derive(Clone)]
pub struct PgGroupStore {
  pool: PgPool,
}

impl PgGroupStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> Result<Self, GroupError> {
    let pool = PgPoolOptions::new()
      .max_connections(10)
      .connect(database_url)
      .await?;
    Ok(Self::new(pool))
  }

  /// Create tables and indexes if missing.
  pub async fn ensure_schema(&self) -> Result<(), GroupError> {
    raw_sql(SCHEMA).execute(&self.pool).await?;
    Ok(())
  }
}

fn group_from_row(row: &PgRow) -> Result<ErrorGroup, GroupError> {
  let status: String = row.try_get("status")?;
  let raw_summary: Option<String> = row.try_get("ai_summary")?;
  Ok(ErrorGroup {
    id: row.try_get("id")?,
    cluster_key: row.try_get("cluster_key")?,
    service: row.try_get("service")?,
    error_type: row.try_get("error_type")?,
    title: row.try_get("title")?,
    status: GroupStatus::from_str_loose(&status),
    count: row.try_get("count")?,
    first_seen: row.try_get("first_seen")?,
    last_seen: row.try_get("last_seen")?,
    severity: row.try_get("severity")?,
    ai_summary: summary::decode_lenient(raw_summary.as_deref()),
    summarized_at: row.try_get("summarized_at")?,
    resolution_reason: row.try_get("resolution_reason")?,
    resolved_at: row.try_get("resolved_at")?,
  })
}

fn event_from_row(row: &PgRow) -> Result<ErrorEvent, GroupError> {
  Ok(ErrorEvent {
    id: row.try_get("id")?,
    service: row.try_get("service")?,
    error_type: row.try_get("error_type")?,
    message: row.try_get("message")?,
    timestamp: row.try_get("timestamp")?,
    env: row.try_get("env")?,
    path: row.try_get("path")?,
    trace_id: row.try_get("trace_id")?,
  })
}

#[async_trait]
impl GroupStore for PgGroupStore {
  async fn get(&self, id: i64) -> Result<ErrorGroup, GroupError> {
    let sql = format!("SELECT {} FROM error_groups WHERE id = $1", GROUP_COLUMNS);
    let row = query::<Postgres>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| GroupError::group_not_found(id))?;
    group_from_row(&row)
  }

  async fn get_by_cluster_key(&self, cluster_key: &str) -> Result<ErrorGroup, GroupError> {
    let sql = format!("SELECT {} FROM error_groups WHERE cluster_key = $1", GROUP_COLUMNS);
    let row = query::<Postgres>(&sql)
      .bind(cluster_key)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| GroupError::cluster_not_found(cluster_key))?;
    group_from_row(&row)
  }

  async fn list_recent(&self, limit: i64) -> Result<Vec<ErrorGroup>, GroupError> {
    let sql = format!(
      "SELECT {} FROM error_groups ORDER BY last_seen DESC NULLS LAST, id DESC LIMIT $1",
      GROUP_COLUMNS
    );
    let rows = query::<Postgres>(&sql)
      .bind(limit.max(0))
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(group_from_row).collect()
  }

  async fn list_recent_events(&self, limit: i64) -> Result<Vec<ErrorEvent>, GroupError> {
    let sql = format!(
      "SELECT {} FROM errors ORDER BY timestamp DESC, id DESC LIMIT $1",
      EVENT_COLUMNS
    );
    let rows = query::<Postgres>(&sql)
      .bind(limit.max(0))
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(event_from_row).collect()
  }

  async fn resolve(&self, id: i64, reason: &str) -> Result<ErrorGroup, GroupError> {
    let mut tx = self.pool.begin().await?;

    let select = format!("SELECT {} FROM error_groups WHERE id = $1 FOR UPDATE", GROUP_COLUMNS);
    let current = query::<Postgres>(&select)
      .bind(id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or_else(|| GroupError::group_not_found(id))?;
    let current = group_from_row(&current)?;

    if current.status == GroupStatus::Resolved {
      tx.commit().await?;
      return Ok(current);
    }

    let update = format!(
      r#"
      UPDATE error_groups
      SET status = 'RESOLVED',
          resolution_reason = $2,
          resolved_at = NOW()
      WHERE id = $1
      RETURNING {}
      "#,
      GROUP_COLUMNS
    );
    let row = query::<Postgres>(&update)
      .bind(id)
      .bind(reason)
      .fetch_one(&mut *tx)
      .await?;
    let resolved = group_from_row(&row)?;
    tx.commit().await?;
    Ok(resolved)
  }

  async fn apply_summary(
    &self,
    cluster_key: &str,
    summary: &AiSummary,
  ) -> Result<ErrorGroup, GroupError> {
    let encoded = summary::encode(summary)?;
    let update = format!(
      r#"
      UPDATE error_groups
      SET ai_summary = $2,
          summarized_at = NOW()
      WHERE cluster_key = $1
      RETURNING {}
      "#,
      GROUP_COLUMNS
    );
    let row = query::<Postgres>(&update)
      .bind(cluster_key)
      .bind(encoded)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| GroupError::cluster_not_found(cluster_key))?;
    group_from_row(&row)
  }

  async fn record_event(&self, event: &NewEvent) -> Result<Ingested, GroupError> {
    let mut tx = self.pool.begin().await?;

    let insert = format!(
      r#"
      INSERT INTO errors (service, error_type, message, timestamp, env, path, trace_id)
      VALUES ($1, $2, $3, $4, $5, $6, $7)
      RETURNING {}
      "#,
      EVENT_COLUMNS
    );
    let row = query::<Postgres>(&insert)
      .bind(&event.service)
      .bind(&event.error_type)
      .bind(&event.message)
      .bind(event.timestamp)
      .bind(&event.env)
      .bind(&event.path)
      .bind(&event.trace_id)
      .fetch_one(&mut *tx)
      .await?;
    let stored = event_from_row(&row)?;

    // A new event always reopens the group; resolution fields go with it.
    let upsert = format!(
      r#"
      INSERT INTO error_groups
        (cluster_key, service, error_type, title, status, count, first_seen, last_seen)
      VALUES ($1, $2, $3, $4, 'OPEN', 1, $5, $5)
      ON CONFLICT (cluster_key) DO UPDATE SET
        count = error_groups.count + 1,
        first_seen = COALESCE(error_groups.first_seen, EXCLUDED.first_seen),
        last_seen = GREATEST(error_groups.last_seen, EXCLUDED.last_seen),
        status = 'OPEN',
        resolution_reason = NULL,
        resolved_at = NULL
      RETURNING {}
      "#,
      GROUP_COLUMNS
    );
    let row = query::<Postgres>(&upsert)
      .bind(&event.cluster_key)
      .bind(&event.service)
      .bind(&event.error_type)
      .bind(format!("{} - {}", event.service, event.error_type))
      .bind(event.timestamp)
      .fetch_one(&mut *tx)
      .await?;
    let group = group_from_row(&row)?;

    tx.commit().await?;
    Ok(Ingested {
      event: stored,
      group,
    })
  }

  async fn mark_quiet(&self, cutoff: DateTime<Utc>) -> Result<u64, GroupError> {
    let result = query::<Postgres>(
      "UPDATE error_groups SET status = 'QUIET' WHERE status = 'OPEN' AND last_seen < $1",
    )
    .bind(cutoff)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected())
  }
}
