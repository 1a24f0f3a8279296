//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Agent ingestion and monitoring reads do not block each other
//! - **Migrations**: Schema versioning with sqlx (`./migrations`)
//!
//! Timestamps are stored as unix milliseconds. Enum columns are stored in
//! their lower-case text form and parsed back case-insensitively, so rows
//! written by older tooling with upper-case values still load.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{
    Alarm, AlarmDraft, DiskUsage, NewMetricSample, NewRule, ServiceWorker, SystemMetricSample,
    ThresholdRule, WorkerReport, WorkerStatus,
};

const RULE_COLUMNS: &str = "id, name, description, metric_type, condition, threshold_value, \
     duration_minutes, severity, enabled, source_filter, cooldown_minutes, created_at, updated_at";

const METRIC_COLUMNS: &str =
    "id, timestamp, cpu_percent, memory_percent, memory_available, disk_usage";

const WORKER_COLUMNS: &str = "id, name, status, monitoring, enabled, last_updated, created_at";

const ALARM_COLUMNS: &str = "id, title, description, severity, status, source, source_id, \
     is_active, triggered_at, acknowledged_at, resolved_at";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use threshold_monitor::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./monitoring.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::InvalidData(format!("timestamp out of range: {}", millis)))
    }

    fn optional_timestamp(millis: Option<i64>) -> StorageResult<Option<DateTime<Utc>>> {
        millis.map(Self::millis_to_timestamp).transpose()
    }

    fn minutes_column(row: &SqliteRow, column: &str) -> StorageResult<u32> {
        let raw: i64 = row.try_get(column)?;
        u32::try_from(raw)
            .map_err(|_| StorageError::InvalidData(format!("{} out of range: {}", column, raw)))
    }

    fn rule_from_row(row: &SqliteRow) -> StorageResult<ThresholdRule> {
        Ok(ThresholdRule {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            metric_type: row.try_get::<String, _>("metric_type")?.parse()?,
            condition: row.try_get::<String, _>("condition")?.parse()?,
            threshold_value: row.try_get("threshold_value")?,
            duration_minutes: Self::minutes_column(row, "duration_minutes")?,
            severity: row.try_get::<String, _>("severity")?.parse()?,
            enabled: row.try_get("enabled")?,
            source_filter: row.try_get("source_filter")?,
            cooldown_minutes: Self::minutes_column(row, "cooldown_minutes")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?)?,
            updated_at: Self::millis_to_timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn sample_from_row(row: &SqliteRow) -> StorageResult<SystemMetricSample> {
        let disk_usage: Option<String> = row.try_get("disk_usage")?;

        Ok(SystemMetricSample {
            id: row.try_get("id")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?)?,
            cpu_percent: row.try_get("cpu_percent")?,
            memory_percent: row.try_get("memory_percent")?,
            memory_available: row
                .try_get::<Option<i64>, _>("memory_available")?
                .map(|v| v as u64),
            disk_usage: disk_usage
                .as_deref()
                .map(DiskUsage::parse)
                .unwrap_or_default(),
        })
    }

    fn worker_from_row(row: &SqliteRow) -> StorageResult<ServiceWorker> {
        Ok(ServiceWorker {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            status: WorkerStatus::from(row.try_get::<String, _>("status")?),
            monitoring: row.try_get("monitoring")?,
            enabled: row.try_get("enabled")?,
            last_updated: Self::millis_to_timestamp(row.try_get("last_updated")?)?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?)?,
        })
    }

    fn alarm_from_row(row: &SqliteRow) -> StorageResult<Alarm> {
        Ok(Alarm {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            severity: row.try_get::<String, _>("severity")?.parse()?,
            status: row.try_get::<String, _>("status")?.parse()?,
            source: row.try_get::<String, _>("source")?.parse()?,
            source_id: row.try_get("source_id")?,
            is_active: row.try_get("is_active")?,
            triggered_at: Self::millis_to_timestamp(row.try_get("triggered_at")?)?,
            acknowledged_at: Self::optional_timestamp(row.try_get("acknowledged_at")?)?,
            resolved_at: Self::optional_timestamp(row.try_get("resolved_at")?)?,
        })
    }

    /// Load an alarm, apply a lifecycle transition and write it back in one
    /// transaction.
    async fn update_alarm<F>(&self, id: i64, transition: F) -> StorageResult<Alarm>
    where
        F: FnOnce(&mut Alarm) -> StorageResult<()> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {} FROM alarms WHERE id = ?", ALARM_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("alarm {}", id)))?;

        let mut alarm = Self::alarm_from_row(&row)?;
        transition(&mut alarm)?;

        sqlx::query(
            r#"
            UPDATE alarms
            SET status = ?, is_active = ?, acknowledged_at = ?, resolved_at = ?
            WHERE id = ?
            "#,
        )
        .bind(alarm.status.as_str())
        .bind(alarm.is_active)
        .bind(alarm.acknowledged_at.as_ref().map(Self::timestamp_to_millis))
        .bind(alarm.resolved_at.as_ref().map(Self::timestamp_to_millis))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(alarm)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, rule), fields(name = %rule.name))]
    async fn insert_rule(
        &self,
        rule: NewRule,
        now: DateTime<Utc>,
    ) -> StorageResult<ThresholdRule> {
        let now_millis = Self::timestamp_to_millis(&now);

        let result = sqlx::query(
            r#"
            INSERT INTO threshold_rules (
                name, description, metric_type, condition, threshold_value,
                duration_minutes, severity, enabled, source_filter, cooldown_minutes,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.metric_type.as_str())
        .bind(rule.condition.as_str())
        .bind(rule.threshold_value)
        .bind(i64::from(rule.duration_minutes))
        .bind(rule.severity.as_str())
        .bind(rule.enabled)
        .bind(&rule.source_filter)
        .bind(i64::from(rule.cooldown_minutes))
        .bind(now_millis)
        .bind(now_millis)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("inserted rule {}", id);
        Ok(rule.into_rule(id, now))
    }

    #[instrument(skip(self))]
    async fn list_rules(&self) -> StorageResult<Vec<ThresholdRule>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM threshold_rules ORDER BY id ASC",
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::rule_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn list_enabled_rules(&self) -> StorageResult<Vec<ThresholdRule>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM threshold_rules
            WHERE enabled = 1
            ORDER BY
                CASE LOWER(severity)
                    WHEN 'critical' THEN 4
                    WHEN 'high' THEN 3
                    WHEN 'medium' THEN 2
                    WHEN 'low' THEN 1
                    ELSE 0
                END DESC,
                id ASC
            "#,
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let rules: StorageResult<Vec<ThresholdRule>> =
            rows.iter().map(Self::rule_from_row).collect();
        let rules = rules?;

        debug!("loaded {} enabled rules", rules.len());
        Ok(rules)
    }

    #[instrument(skip(self))]
    async fn get_rule(&self, id: i64) -> StorageResult<Option<ThresholdRule>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM threshold_rules WHERE id = ?",
            RULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::rule_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn set_rule_enabled(
        &self,
        id: i64,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> StorageResult<ThresholdRule> {
        let result =
            sqlx::query("UPDATE threshold_rules SET enabled = ?, updated_at = ? WHERE id = ?")
                .bind(enabled)
                .bind(Self::timestamp_to_millis(&now))
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("rule {}", id)));
        }

        self.get_rule(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("rule {}", id)))
    }

    #[instrument(skip(self, sample), fields(timestamp = %sample.timestamp))]
    async fn insert_metric(&self, sample: NewMetricSample) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO system_metrics (
                timestamp, cpu_percent, memory_percent, memory_available, disk_usage
            )
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Self::timestamp_to_millis(&sample.timestamp))
        .bind(sample.cpu_percent)
        .bind(sample.memory_percent)
        .bind(sample.memory_available.map(|v| v as i64))
        .bind(sample.disk_usage.to_json_string())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self), fields(since = %since))]
    async fn query_metrics_since(
        &self,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<SystemMetricSample>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM system_metrics
            WHERE timestamp >= ?
            ORDER BY timestamp DESC, id DESC
            "#,
            METRIC_COLUMNS
        ))
        .bind(Self::timestamp_to_millis(&since))
        .fetch_all(&self.pool)
        .await?;

        let samples: StorageResult<Vec<SystemMetricSample>> =
            rows.iter().map(Self::sample_from_row).collect();
        let samples = samples?;

        debug!("query returned {} samples", samples.len());
        Ok(samples)
    }

    async fn count_metrics_since(&self, since: DateTime<Utc>) -> StorageResult<usize> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM system_metrics WHERE timestamp >= ?")
            .bind(Self::timestamp_to_millis(&since))
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0.max(0) as usize)
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_old_metrics(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        info!("cleaning up metric samples older than {}", before);

        let result = sqlx::query("DELETE FROM system_metrics WHERE timestamp < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        info!("deleted {} old metric samples", deleted);

        Ok(deleted)
    }

    #[instrument(skip(self, report), fields(worker = %report.name))]
    async fn upsert_worker(
        &self,
        report: WorkerReport,
        at: DateTime<Utc>,
    ) -> StorageResult<ServiceWorker> {
        let at_millis = Self::timestamp_to_millis(&at);
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM service_workers WHERE name = ?",
            WORKER_COLUMNS
        ))
        .bind(&report.name)
        .fetch_optional(&mut *tx)
        .await?;

        let worker = match existing {
            Some(row) => {
                let mut worker = Self::worker_from_row(&row)?;
                if report.changes(&worker) {
                    sqlx::query(
                        "UPDATE service_workers SET status = ?, enabled = ?, last_updated = ? WHERE id = ?",
                    )
                    .bind(report.status.as_str())
                    .bind(report.enabled)
                    .bind(at_millis)
                    .bind(worker.id)
                    .execute(&mut *tx)
                    .await?;

                    worker.status = report.status;
                    worker.enabled = report.enabled;
                    worker.last_updated = at;
                }
                worker
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO service_workers (name, status, monitoring, enabled, last_updated, created_at)
                    VALUES (?, ?, 1, ?, ?, ?)
                    "#,
                )
                .bind(&report.name)
                .bind(report.status.as_str())
                .bind(report.enabled)
                .bind(at_millis)
                .bind(at_millis)
                .execute(&mut *tx)
                .await?;

                ServiceWorker {
                    id: result.last_insert_rowid(),
                    name: report.name,
                    status: report.status,
                    monitoring: true,
                    enabled: report.enabled,
                    last_updated: at,
                    created_at: at,
                }
            }
        };

        tx.commit().await?;
        Ok(worker)
    }

    async fn list_workers(&self) -> StorageResult<Vec<ServiceWorker>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM service_workers ORDER BY id ASC",
            WORKER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::worker_from_row).collect()
    }

    #[instrument(skip(self), fields(cutoff = %cutoff))]
    async fn query_inactive_workers(
        &self,
        cutoff: DateTime<Utc>,
        name: Option<&str>,
    ) -> StorageResult<Vec<ServiceWorker>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM service_workers
            WHERE monitoring = 1
              AND LOWER(status) = 'inactive'
              AND last_updated < ?
              AND (? IS NULL OR name = ?)
            ORDER BY id ASC
            "#,
            WORKER_COLUMNS
        ))
        .bind(Self::timestamp_to_millis(&cutoff))
        .bind(name)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::worker_from_row).collect()
    }

    #[instrument(skip(self, draft), fields(source_id = %draft.source_id))]
    async fn create_alarm(&self, draft: AlarmDraft) -> StorageResult<Alarm> {
        let result = sqlx::query(
            r#"
            INSERT INTO alarms (
                title, description, severity, status, source, source_id,
                is_active, triggered_at
            )
            VALUES (?, ?, ?, 'active', ?, ?, 1, ?)
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.severity.as_str())
        .bind(draft.source.as_str())
        .bind(&draft.source_id)
        .bind(Self::timestamp_to_millis(&draft.triggered_at))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("created alarm {}", id);
        Ok(Alarm::from_draft(id, draft))
    }

    async fn list_alarms(&self, active_only: bool) -> StorageResult<Vec<Alarm>> {
        let filter = if active_only { "WHERE is_active = 1" } else { "" };

        let rows = sqlx::query(&format!(
            "SELECT {} FROM alarms {} ORDER BY triggered_at DESC, id DESC",
            ALARM_COLUMNS, filter
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::alarm_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn acknowledge_alarm(&self, id: i64, at: DateTime<Utc>) -> StorageResult<Alarm> {
        self.update_alarm(id, |alarm| alarm.acknowledge(at)).await
    }

    #[instrument(skip(self))]
    async fn resolve_alarm(&self, id: i64, at: DateTime<Utc>) -> StorageResult<Alarm> {
        self.update_alarm(id, |alarm| alarm.resolve(at)).await
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (rules, metrics, workers, alarms): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM threshold_rules),
                (SELECT COUNT(*) FROM system_metrics),
                (SELECT COUNT(*) FROM service_workers),
                (SELECT COUNT(*) FROM alarms)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(format!(
            "SQLite: {} rules, {} metric samples, {} workers, {} alarms, {:.2} MB on disk",
            rules,
            metrics,
            workers,
            alarms,
            file_size as f64 / 1_000_000.0
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
