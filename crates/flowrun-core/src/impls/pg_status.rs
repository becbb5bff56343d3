//! PostgresStatusStore - `tests_runs` / `organizations_analyses` への書き込み
//!
//! 各操作は自前のトランザクションで実行し、影響行数で結果を判定します。
//! status の更新は更新前の値も返します（遷移チェック用）。
//! 論理削除（`deleted_at IS NOT NULL`）された行は対象外です。

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument, warn};

use crate::domain::{OrganizationId, RunStatus, RunSummary, TestRunSlug, TestVersionSlug};
use crate::ports::{InsertOutcome, StatusStore, StoreError, UpdateOutcome};

#[derive(Debug, Clone)]
pub struct PostgresStatusStore {
    pool: PgPool,
}

impl PostgresStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StatusStore for PostgresStatusStore {
    #[instrument(skip_all, fields(slug = %slug, status = %status))]
    async fn update_status(
        &self,
        slug: &TestRunSlug,
        status: RunStatus,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "WITH prev AS ( \
                 SELECT id, status FROM tests_runs \
                 WHERE slug = $2 AND deleted_at IS NULL \
                 FOR UPDATE) \
             UPDATE tests_runs AS tr \
             SET status = $1, updated_at = CURRENT_TIMESTAMP \
             FROM prev \
             WHERE tr.id = prev.id \
             RETURNING prev.status::text AS previous",
        )
        .bind(status.as_str())
        .bind(slug.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(rows = rows.len(), "status update committed");
        let Some(row) = rows.first() else {
            return Ok(UpdateOutcome::NoMatchingRow);
        };
        let previous: Option<String> = row.try_get("previous")?;
        let previous = previous.and_then(|raw| match raw.parse::<RunStatus>() {
            Ok(previous) => Some(previous),
            Err(err) => {
                warn!(error = %err, "stored status is not a known run status");
                None
            }
        });
        Ok(UpdateOutcome::Updated { previous })
    }

    #[instrument(skip_all, fields(organization_id = %organization_id, analysis_url = %analysis_url))]
    async fn insert_analysis(
        &self,
        organization_id: &OrganizationId,
        analysis_url: &str,
    ) -> Result<InsertOutcome, StoreError> {
        // organizations.id is a bigint; ids sent as JSON strings are cast server-side.
        let organization_id = organization_id.to_string();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO organizations_analyses \
                 (organization_id, analysis_url, created_at, updated_at) \
             SELECT $1::text::bigint, $2, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM organizations_analyses \
                 WHERE organization_id = $1::text::bigint \
                   AND analysis_url = $2 \
                   AND deleted_at IS NULL)",
        )
        .bind(&organization_id)
        .bind(analysis_url)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyRecorded)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    #[instrument(skip_all, fields(version = %version))]
    async fn latest_successful_run(
        &self,
        version: &TestVersionSlug,
    ) -> Result<Option<RunSummary>, StoreError> {
        let row = sqlx::query(
            "SELECT tr.slug, tr.results_url, tr.model_slug, tr.model_provider, \
                    tr.created_at, tr.updated_at \
             FROM tests_runs tr \
             JOIN tests_versions tv ON tr.version_id = tv.id \
             WHERE tv.slug = $1 \
               AND tr.status = 'succeeded' \
               AND tr.deleted_at IS NULL \
             ORDER BY tr.updated_at DESC \
             LIMIT 1",
        )
        .bind(version.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let slug: String = row.try_get("slug")?;
        let slug = TestRunSlug::parse(slug)
            .map_err(|err| StoreError::Unavailable(format!("stored run slug is invalid: {err}")))?;
        Ok(Some(RunSummary {
            slug,
            results_url: row.try_get("results_url")?,
            model_slug: row.try_get("model_slug")?,
            model_provider: row.try_get("model_provider")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }
}
