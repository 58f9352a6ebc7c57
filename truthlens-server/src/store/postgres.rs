//! PostgreSQL implementation of the detection store.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    Detection, DetectionPage, EnrichmentUpdate, InsertOutcome, NewDetection, PageAssignment,
    PageView, StoreError,
};

/// PostgreSQL-backed detection store.
///
/// Runs migrations automatically on connection.
#[derive(Clone)]
pub struct PostgresDetectionStore {
    pool: PgPool,
}

impl PostgresDetectionStore {
    /// Connect and apply migrations.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Detection store connected and migrations applied");

        Ok(Self { pool })
    }

    /// Create a store from an existing pool (for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn check_health(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_detection(
        &self,
        input: NewDetection,
    ) -> Result<InsertOutcome, StoreError> {
        let status = input.effective_status();

        let inserted: Option<Detection> = sqlx::query_as(
            r#"
            INSERT INTO detections (
                source_event_id, source_handle, image_url, image_blob,
                image_content_type, ai_probability, oracle_confidence, oracle_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_event_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&input.source_event_id)
        .bind(&input.source_handle)
        .bind(&input.image_url)
        .bind(&input.image_blob)
        .bind(&input.image_content_type)
        .bind(input.ai_probability)
        .bind(input.oracle_confidence)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(detection) = inserted {
            return Ok(InsertOutcome {
                detection,
                created: true,
            });
        }

        // Lost the idempotency race: re-read the winner.
        let event_id = input.source_event_id.as_deref().ok_or_else(|| {
            StoreError::Query("insert returned no row without a source_event_id conflict".into())
        })?;
        let winner = self.find_by_source_event(event_id).await?.ok_or_else(|| {
            StoreError::Query("idempotency conflict but winner row not found".into())
        })?;

        tracing::debug!(source_event_id = event_id, "Reusing existing detection");

        Ok(InsertOutcome {
            detection: winner,
            created: false,
        })
    }

    pub async fn find_detection(&self, id: Uuid) -> Result<Option<Detection>, StoreError> {
        let row: Option<Detection> = sqlx::query_as(
            r#"
            SELECT * FROM detections WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn find_by_source_event(
        &self,
        source_event_id: &str,
    ) -> Result<Option<Detection>, StoreError> {
        let row: Option<Detection> = sqlx::query_as(
            r#"
            SELECT * FROM detections WHERE source_event_id = $1
            "#,
        )
        .bind(source_event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub(crate) async fn try_insert_page(
        &self,
        detection_id: Uuid,
        page_id: &str,
    ) -> Result<PageAssignment, StoreError> {
        let result: Result<DetectionPage, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO detection_pages (page_id, detection_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(page_id)
        .bind(detection_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(page) => Ok(PageAssignment::Created(page)),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                // Which constraint lost decides the caller's next move:
                // a page_id collision is retried, a detection_id conflict
                // means another task already assigned this detection.
                if db.constraint() == Some("detection_pages_pkey") {
                    Ok(PageAssignment::IdTaken)
                } else {
                    Ok(PageAssignment::AlreadyAssigned)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn page_for_detection(
        &self,
        detection_id: Uuid,
    ) -> Result<Option<DetectionPage>, StoreError> {
        let row: Option<DetectionPage> = sqlx::query_as(
            r#"
            SELECT * FROM detection_pages WHERE detection_id = $1
            "#,
        )
        .bind(detection_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_page(&self, page_id: &str) -> Result<Option<PageView>, StoreError> {
        let page: Option<DetectionPage> = sqlx::query_as(
            r#"
            SELECT * FROM detection_pages WHERE page_id = $1
            "#,
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(page) = page else {
            return Ok(None);
        };

        let detection = self.find_detection(page.detection_id).await?.ok_or_else(|| {
            StoreError::Query(format!("page {page_id} references a missing detection"))
        })?;

        Ok(Some(PageView { detection, page }))
    }

    pub async fn record_probability(
        &self,
        id: Uuid,
        probability: f64,
        confidence: Option<f64>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE detections
            SET ai_probability = $2,
                oracle_confidence = $3,
                oracle_status = 'scored',
                updated_at = NOW()
            WHERE id = $1
              AND ai_probability IS NULL
              AND oracle_status <> 'unsupported'
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(probability)
        .bind(confidence)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_unsupported(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE detections
            SET oracle_status = 'unsupported', updated_at = NOW()
            WHERE id = $1 AND ai_probability IS NULL AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_enrichment(
        &self,
        id: Uuid,
        update: EnrichmentUpdate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE detections
            SET image_description = COALESCE($2, image_description),
                meta_description = COALESCE($3, meta_description),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&update.image_description)
        .bind(&update.meta_description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn cache_image_blob(
        &self,
        id: Uuid,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE detections
            SET image_blob = $2, image_content_type = $3, updated_at = NOW()
            WHERE id = $1 AND image_blob IS NULL AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&data)
        .bind(content_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE detections
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_view(&self, page_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE detection_pages
            SET view_count = view_count + 1, last_viewed_at = NOW()
            WHERE page_id = $1
            "#,
        )
        .bind(page_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
