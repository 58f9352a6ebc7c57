//! Detection storage module
//!
//! Persists detections and their pages behind one facade with two backends:
//!
//! - **PostgreSQL** (production): schema under `migrations/`, applied on
//!   connect. Unique constraints on `source_event_id`, `page_id`, and
//!   `detection_id` are the authoritative guards for every race in the
//!   pipeline.
//! - **Memory** (development fallback and tests): `DashMap`-backed, same
//!   semantics including constraint emulation.
//!
//! If `DATABASE_URL` is not set, falls back to in-memory storage (useful
//! for development, but records are lost on restart).

mod memory;
mod postgres;

pub use memory::MemoryDetectionStore;
pub use postgres::PostgresDetectionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{debug, warn};
use uuid::Uuid;

use truthlens_core::{draw_candidate, is_clean, Verdict};

/// Bound on page-id allocation attempts before giving up.
pub const MAX_PAGE_ID_ATTEMPTS: u32 = 5;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Page id space exhausted after {attempts} attempts")]
    PageIdExhausted { attempts: u32 },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

/// Where a detection stands with the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleStatus {
    /// Not yet scored; eligible for asynchronous re-scoring.
    Pending,
    /// Probability recorded. Terminal.
    Scored,
    /// The oracle refused the image. Terminal, never retried.
    Unsupported,
}

impl OracleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scored => "scored",
            Self::Unsupported => "unsupported",
        }
    }
}

impl TryFrom<String> for OracleStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(Self::Pending),
            "scored" => Ok(Self::Scored),
            "unsupported" => Ok(Self::Unsupported),
            other => Err(format!("unknown oracle status: {other}")),
        }
    }
}

impl std::fmt::Display for OracleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Detection {
    pub id: Uuid,
    pub source_event_id: Option<String>,
    pub source_handle: String,
    pub image_url: Option<String>,
    pub image_blob: Option<Vec<u8>>,
    pub image_content_type: Option<String>,
    pub ai_probability: Option<f64>,
    pub oracle_confidence: Option<f64>,
    #[sqlx(try_from = "String")]
    pub oracle_status: OracleStatus,
    pub image_description: Option<String>,
    pub meta_description: Option<String>,
    pub robots_index: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Detection {
    /// The derived categorical result; absent while the probability is null.
    pub fn verdict(&self) -> Option<Verdict> {
        self.ai_probability.map(Verdict::from_probability)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Detection page entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DetectionPage {
    pub page_id: String,
    pub detection_id: Uuid,
    pub view_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A page joined with its owning detection, as served by the page routes.
#[derive(Debug, Clone)]
pub struct PageView {
    pub detection: Detection,
    pub page: DetectionPage,
}

/// DTO for creating a new detection
#[derive(Debug, Clone, Default)]
pub struct NewDetection {
    pub source_event_id: Option<String>,
    pub source_handle: String,
    pub image_url: Option<String>,
    pub image_blob: Option<Vec<u8>>,
    pub image_content_type: Option<String>,
    pub ai_probability: Option<f64>,
    pub oracle_confidence: Option<f64>,
    pub oracle_status: Option<OracleStatus>,
}

impl NewDetection {
    /// Status to persist: explicit, or derived from the probability.
    fn effective_status(&self) -> OracleStatus {
        self.oracle_status.unwrap_or(if self.ai_probability.is_some() {
            OracleStatus::Scored
        } else {
            OracleStatus::Pending
        })
    }
}

/// Result of an idempotent insert.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub detection: Detection,
    /// False when an existing record for the same `source_event_id` won.
    pub created: bool,
}

/// Optional enrichment fields; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentUpdate {
    pub image_description: Option<String>,
    pub meta_description: Option<String>,
}

/// Outcome of one page-insert attempt.
pub(crate) enum PageAssignment {
    Created(DetectionPage),
    /// Another page already holds the candidate id.
    IdTaken,
    /// The detection already owns a page (concurrent assignment).
    AlreadyAssigned,
}

/// Storage backend
enum Backend {
    /// PostgreSQL storage (production)
    Postgres(PostgresDetectionStore),
    /// In-memory storage (development fallback and tests)
    Memory(MemoryDetectionStore),
}

/// Unified detection storage
pub struct DetectionStore {
    backend: Backend,
}

impl DetectionStore {
    /// Create storage with PostgreSQL backend, applying migrations.
    pub async fn with_postgres(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pg = PostgresDetectionStore::new(database_url, max_connections, min_connections).await?;
        Ok(Self {
            backend: Backend::Postgres(pg),
        })
    }

    /// Create storage with in-memory backend (development and tests only)
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryDetectionStore::new()),
        }
    }

    /// Create storage from environment
    ///
    /// Uses PostgreSQL if `DATABASE_URL` is set, otherwise falls back to in-memory.
    pub async fn from_env(
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => {
                tracing::info!("Using PostgreSQL detection storage");
                Self::with_postgres(&url, max_connections, min_connections).await
            }
            _ => {
                tracing::warn!("DATABASE_URL not set, using in-memory storage - records will be lost on restart!");
                Ok(Self::in_memory())
            }
        }
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, Backend::Postgres(_))
    }

    /// Check storage health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.check_health().await,
            Backend::Memory(_) => Ok(()),
        }
    }

    /// Insert a detection, collapsing duplicate `source_event_id`s onto the
    /// existing record. The unique constraint is the tie-break for
    /// concurrent duplicates; the loser re-reads the winner.
    pub async fn insert_detection(&self, input: NewDetection) -> Result<InsertOutcome, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.insert_detection(input).await,
            Backend::Memory(mem) => mem.insert_detection(input),
        }
    }

    /// Find a detection by id.
    pub async fn find_detection(&self, id: Uuid) -> Result<Option<Detection>, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.find_detection(id).await,
            Backend::Memory(mem) => Ok(mem.find_detection(id)),
        }
    }

    /// Find a detection by its originating event id.
    pub async fn find_by_source_event(
        &self,
        source_event_id: &str,
    ) -> Result<Option<Detection>, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.find_by_source_event(source_event_id).await,
            Backend::Memory(mem) => Ok(mem.find_by_source_event(source_event_id)),
        }
    }

    /// Allocate a page id for a detection and commit the page.
    ///
    /// Generate-check-retry with a bounded number of attempts; the unique
    /// constraint on `page_id` is the authoritative collision guard, the
    /// denylist screen runs before any candidate reaches storage.
    /// Re-assigning a detection that already owns a page returns the
    /// existing page.
    pub async fn assign_page(&self, detection_id: Uuid) -> Result<DetectionPage, StoreError> {
        self.assign_page_with(detection_id, draw_candidate).await
    }

    /// [`Self::assign_page`] with an injectable candidate source, so tests
    /// can force collisions and exhaustion.
    pub async fn assign_page_with(
        &self,
        detection_id: Uuid,
        mut candidates: impl FnMut() -> String + Send,
    ) -> Result<DetectionPage, StoreError> {
        if let Some(existing) = self.page_for_detection(detection_id).await? {
            return Ok(existing);
        }

        for attempt in 1..=MAX_PAGE_ID_ATTEMPTS {
            let candidate = candidates();

            if !is_clean(&candidate) {
                debug!(attempt, "Page id candidate hit the denylist, redrawing");
                continue;
            }

            match self.try_insert_page(detection_id, &candidate).await? {
                PageAssignment::Created(page) => {
                    debug!(page_id = %page.page_id, attempt, "Page assigned");
                    return Ok(page);
                }
                PageAssignment::IdTaken => {
                    warn!(attempt, "Page id collision, redrawing");
                }
                PageAssignment::AlreadyAssigned => {
                    // Lost a concurrent assignment race; reuse the winner.
                    if let Some(existing) = self.page_for_detection(detection_id).await? {
                        return Ok(existing);
                    }
                    return Err(StoreError::Query(
                        "page assignment race left no page behind".to_string(),
                    ));
                }
            }
        }

        Err(StoreError::PageIdExhausted {
            attempts: MAX_PAGE_ID_ATTEMPTS,
        })
    }

    async fn try_insert_page(
        &self,
        detection_id: Uuid,
        page_id: &str,
    ) -> Result<PageAssignment, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.try_insert_page(detection_id, page_id).await,
            Backend::Memory(mem) => Ok(mem.try_insert_page(detection_id, page_id)),
        }
    }

    /// The page owned by a detection, if one has been assigned.
    pub async fn page_for_detection(
        &self,
        detection_id: Uuid,
    ) -> Result<Option<DetectionPage>, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.page_for_detection(detection_id).await,
            Backend::Memory(mem) => Ok(mem.page_for_detection(detection_id)),
        }
    }

    /// Resolve a page id to the page and its detection.
    pub async fn get_page(&self, page_id: &str) -> Result<Option<PageView>, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.get_page(page_id).await,
            Backend::Memory(mem) => Ok(mem.get_page(page_id)),
        }
    }

    /// Record the oracle's probability. The null → non-null transition
    /// happens at most once; a second write is a no-op returning false.
    pub async fn record_probability(
        &self,
        id: Uuid,
        probability: f64,
        confidence: Option<f64>,
    ) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.record_probability(id, probability, confidence).await,
            Backend::Memory(mem) => Ok(mem.record_probability(id, probability, confidence)),
        }
    }

    /// Terminally mark a detection's image as unsupported by the oracle.
    pub async fn mark_unsupported(&self, id: Uuid) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.mark_unsupported(id).await,
            Backend::Memory(mem) => {
                mem.mark_unsupported(id);
                Ok(())
            }
        }
    }

    /// Apply enrichment text fields.
    pub async fn update_enrichment(
        &self,
        id: Uuid,
        update: EnrichmentUpdate,
    ) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.update_enrichment(id, update).await,
            Backend::Memory(mem) => {
                mem.update_enrichment(id, update);
                Ok(())
            }
        }
    }

    /// Opportunistically cache fetched image bytes. Never overwrites an
    /// existing blob.
    pub async fn cache_image_blob(
        &self,
        id: Uuid,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.cache_image_blob(id, data, content_type).await,
            Backend::Memory(mem) => {
                mem.cache_image_blob(id, data, content_type);
                Ok(())
            }
        }
    }

    /// Soft-delete a detection. One-way: returns false when already deleted.
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.soft_delete(id).await,
            Backend::Memory(mem) => Ok(mem.soft_delete(id)),
        }
    }

    /// Bump a page's view counter and last-viewed timestamp.
    ///
    /// Callers treat failures as best-effort: a broken counter must never
    /// fail the read path.
    pub async fn increment_view(&self, page_id: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.increment_view(page_id).await,
            Backend::Memory(mem) => {
                mem.increment_view(page_id);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for DetectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Postgres(_) => "PostgreSQL",
            Backend::Memory(_) => "Memory",
        };
        f.debug_struct("DetectionStore")
            .field("backend", &backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(event: Option<&str>) -> NewDetection {
        NewDetection {
            source_event_id: event.map(String::from),
            source_handle: "alice".to_string(),
            image_url: Some("https://example.com/a.jpg".to_string()),
            ..NewDetection::default()
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_event() {
        let store = DetectionStore::in_memory();

        let first = store.insert_detection(sample(Some("ev-1"))).await.unwrap();
        let second = store.insert_detection(sample(Some("ev-1"))).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.detection.id, second.detection.id);
    }

    #[tokio::test]
    async fn test_null_event_ids_do_not_collide() {
        let store = DetectionStore::in_memory();

        let first = store.insert_detection(sample(None)).await.unwrap();
        let second = store.insert_detection(sample(None)).await.unwrap();

        assert!(first.created);
        assert!(second.created);
        assert_ne!(first.detection.id, second.detection.id);
    }

    #[tokio::test]
    async fn test_assign_page_is_idempotent() {
        let store = DetectionStore::in_memory();
        let det = store
            .insert_detection(sample(Some("ev-2")))
            .await
            .unwrap()
            .detection;

        let first = store.assign_page(det.id).await.unwrap();
        let second = store.assign_page(det.id).await.unwrap();

        assert_eq!(first.page_id, second.page_id);
    }

    #[tokio::test]
    async fn test_assign_page_retries_collisions() {
        let store = DetectionStore::in_memory();
        let a = store
            .insert_detection(sample(Some("ev-3")))
            .await
            .unwrap()
            .detection;
        let b = store
            .insert_detection(sample(Some("ev-4")))
            .await
            .unwrap()
            .detection;

        let taken = store.assign_page(a.id).await.unwrap();

        // First candidate collides with a's page, second is fresh.
        let mut drawn = vec![taken.page_id.clone(), "fresh234".to_string()].into_iter();
        let page = store
            .assign_page_with(b.id, move || drawn.next().unwrap())
            .await
            .unwrap();

        assert_eq!(page.page_id, "fresh234");
    }

    #[tokio::test]
    async fn test_assign_page_exhaustion() {
        let store = DetectionStore::in_memory();
        let a = store
            .insert_detection(sample(Some("ev-5")))
            .await
            .unwrap()
            .detection;
        let b = store
            .insert_detection(sample(Some("ev-6")))
            .await
            .unwrap()
            .detection;

        let taken = store.assign_page(a.id).await.unwrap();

        // Every candidate collides: the bounded loop must give up.
        let stuck = taken.page_id.clone();
        let err = store
            .assign_page_with(b.id, move || stuck.clone())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::PageIdExhausted {
                attempts: MAX_PAGE_ID_ATTEMPTS
            }
        ));
    }

    #[tokio::test]
    async fn test_probability_transitions_once() {
        let store = DetectionStore::in_memory();
        let det = store
            .insert_detection(sample(Some("ev-7")))
            .await
            .unwrap()
            .detection;

        assert!(store.record_probability(det.id, 0.9, Some(0.95)).await.unwrap());
        assert!(!store.record_probability(det.id, 0.1, None).await.unwrap());

        let stored = store.find_detection(det.id).await.unwrap().unwrap();
        assert_eq!(stored.ai_probability, Some(0.9));
        assert_eq!(stored.oracle_status, OracleStatus::Scored);
        assert_eq!(stored.verdict(), Some(Verdict::AiGenerated));
    }

    #[tokio::test]
    async fn test_mark_unsupported_is_terminal() {
        let store = DetectionStore::in_memory();
        let det = store
            .insert_detection(sample(Some("ev-12")))
            .await
            .unwrap()
            .detection;
        assert_eq!(det.oracle_status, OracleStatus::Pending);

        store.mark_unsupported(det.id).await.unwrap();

        // A terminal record is never scored afterwards.
        assert!(!store.record_probability(det.id, 0.5, None).await.unwrap());

        let stored = store.find_detection(det.id).await.unwrap().unwrap();
        assert_eq!(stored.oracle_status, OracleStatus::Unsupported);
        assert!(stored.ai_probability.is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_is_one_way() {
        let store = DetectionStore::in_memory();
        let det = store
            .insert_detection(sample(Some("ev-8")))
            .await
            .unwrap()
            .detection;

        assert!(store.soft_delete(det.id).await.unwrap());
        assert!(!store.soft_delete(det.id).await.unwrap());

        let stored = store.find_detection(det.id).await.unwrap().unwrap();
        assert!(stored.is_deleted());
    }

    #[tokio::test]
    async fn test_view_counter_increments() {
        let store = DetectionStore::in_memory();
        let det = store
            .insert_detection(sample(Some("ev-9")))
            .await
            .unwrap()
            .detection;
        let page = store.assign_page(det.id).await.unwrap();

        store.increment_view(&page.page_id).await.unwrap();
        store.increment_view(&page.page_id).await.unwrap();

        let view = store.get_page(&page.page_id).await.unwrap().unwrap();
        assert_eq!(view.page.view_count, 2);
        assert!(view.page.last_viewed_at.is_some());
    }

    #[tokio::test]
    async fn test_blob_cache_is_opportunistic() {
        let store = DetectionStore::in_memory();
        let det = store
            .insert_detection(sample(Some("ev-10")))
            .await
            .unwrap()
            .detection;

        store
            .cache_image_blob(det.id, vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        // A second write must not clobber the cached bytes.
        store
            .cache_image_blob(det.id, vec![9, 9, 9], "image/png")
            .await
            .unwrap();

        let stored = store.find_detection(det.id).await.unwrap().unwrap();
        assert_eq!(stored.image_blob, Some(vec![1, 2, 3]));
        assert_eq!(stored.image_content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_enrichment_update() {
        let store = DetectionStore::in_memory();
        let det = store
            .insert_detection(sample(Some("ev-11")))
            .await
            .unwrap()
            .detection;

        store
            .update_enrichment(
                det.id,
                EnrichmentUpdate {
                    image_description: Some("a cat".to_string()),
                    meta_description: None,
                },
            )
            .await
            .unwrap();

        let stored = store.find_detection(det.id).await.unwrap().unwrap();
        assert_eq!(stored.image_description.as_deref(), Some("a cat"));
        assert!(stored.meta_description.is_none());
    }
}
