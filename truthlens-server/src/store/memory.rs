//! In-memory implementation of the detection store.
//!
//! Emulates the PostgreSQL backend's constraint semantics (unique
//! `source_event_id`, unique `page_id`, one page per detection) so tests
//! and keyless development runs exercise the same race behavior.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    Detection, DetectionPage, EnrichmentUpdate, InsertOutcome, NewDetection, PageAssignment,
    PageView, StoreError,
};

#[derive(Default)]
pub struct MemoryDetectionStore {
    detections: DashMap<Uuid, Detection>,
    /// source_event_id → detection id (the unique-constraint stand-in)
    by_event: DashMap<String, Uuid>,
    /// page_id → page (primary-key stand-in)
    pages: DashMap<String, DetectionPage>,
    /// detection id → page_id (detection_id unique-constraint stand-in)
    page_by_detection: DashMap<Uuid, String>,
}

impl MemoryDetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_detection(&self, input: NewDetection) -> Result<InsertOutcome, StoreError> {
        let now = Utc::now();
        let detection = Detection {
            id: Uuid::new_v4(),
            source_event_id: input.source_event_id.clone(),
            source_handle: input.source_handle.clone(),
            image_url: input.image_url.clone(),
            image_blob: input.image_blob.clone(),
            image_content_type: input.image_content_type.clone(),
            ai_probability: input.ai_probability,
            oracle_confidence: input.oracle_confidence,
            oracle_status: input.effective_status(),
            image_description: None,
            meta_description: None,
            robots_index: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        match input.source_event_id {
            Some(event_id) => match self.by_event.entry(event_id) {
                Entry::Occupied(existing) => {
                    let winner_id = *existing.get();
                    let winner = self
                        .detections
                        .get(&winner_id)
                        .map(|d| d.clone())
                        .ok_or_else(|| {
                            StoreError::Query("idempotency conflict but winner row not found".into())
                        })?;
                    Ok(InsertOutcome {
                        detection: winner,
                        created: false,
                    })
                }
                Entry::Vacant(slot) => {
                    // Insert the row before releasing the event-id slot so a
                    // concurrent loser always finds the winner on re-read.
                    self.detections.insert(detection.id, detection.clone());
                    slot.insert(detection.id);
                    Ok(InsertOutcome {
                        detection,
                        created: true,
                    })
                }
            },
            None => {
                self.detections.insert(detection.id, detection.clone());
                Ok(InsertOutcome {
                    detection,
                    created: true,
                })
            }
        }
    }

    pub fn find_detection(&self, id: Uuid) -> Option<Detection> {
        self.detections.get(&id).map(|d| d.clone())
    }

    pub fn find_by_source_event(&self, source_event_id: &str) -> Option<Detection> {
        let id = *self.by_event.get(source_event_id)?;
        self.find_detection(id)
    }

    pub(crate) fn try_insert_page(&self, detection_id: Uuid, page_id: &str) -> PageAssignment {
        // The detection-id slot is the write guard: concurrent assignments
        // for one detection serialize here, mirroring the SQL unique
        // constraint on detection_id.
        match self.page_by_detection.entry(detection_id) {
            Entry::Occupied(_) => PageAssignment::AlreadyAssigned,
            Entry::Vacant(detection_slot) => match self.pages.entry(page_id.to_string()) {
                Entry::Occupied(_) => PageAssignment::IdTaken,
                Entry::Vacant(page_slot) => {
                    let page = DetectionPage {
                        page_id: page_id.to_string(),
                        detection_id,
                        view_count: 0,
                        last_viewed_at: None,
                        created_at: Utc::now(),
                    };
                    page_slot.insert(page.clone());
                    detection_slot.insert(page_id.to_string());
                    PageAssignment::Created(page)
                }
            },
        }
    }

    pub fn page_for_detection(&self, detection_id: Uuid) -> Option<DetectionPage> {
        let page_id = self.page_by_detection.get(&detection_id)?.clone();
        self.pages.get(&page_id).map(|p| p.clone())
    }

    pub fn get_page(&self, page_id: &str) -> Option<PageView> {
        let page = self.pages.get(page_id)?.clone();
        let detection = self.find_detection(page.detection_id)?;
        Some(PageView { detection, page })
    }

    pub fn record_probability(
        &self,
        id: Uuid,
        probability: f64,
        confidence: Option<f64>,
    ) -> bool {
        match self.detections.get_mut(&id) {
            Some(mut det)
                if det.ai_probability.is_none()
                    && det.oracle_status != super::OracleStatus::Unsupported
                    && det.deleted_at.is_none() =>
            {
                det.ai_probability = Some(probability);
                det.oracle_confidence = confidence;
                det.oracle_status = super::OracleStatus::Scored;
                det.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn mark_unsupported(&self, id: Uuid) {
        if let Some(mut det) = self.detections.get_mut(&id) {
            if det.ai_probability.is_none() && det.deleted_at.is_none() {
                det.oracle_status = super::OracleStatus::Unsupported;
                det.updated_at = Utc::now();
            }
        }
    }

    pub fn update_enrichment(&self, id: Uuid, update: EnrichmentUpdate) {
        if let Some(mut det) = self.detections.get_mut(&id) {
            if det.deleted_at.is_some() {
                return;
            }
            if update.image_description.is_some() {
                det.image_description = update.image_description;
            }
            if update.meta_description.is_some() {
                det.meta_description = update.meta_description;
            }
            det.updated_at = Utc::now();
        }
    }

    pub fn cache_image_blob(&self, id: Uuid, data: Vec<u8>, content_type: &str) {
        if let Some(mut det) = self.detections.get_mut(&id) {
            if det.image_blob.is_none() && det.deleted_at.is_none() {
                det.image_blob = Some(data);
                det.image_content_type = Some(content_type.to_string());
                det.updated_at = Utc::now();
            }
        }
    }

    pub fn soft_delete(&self, id: Uuid) -> bool {
        match self.detections.get_mut(&id) {
            Some(mut det) if det.deleted_at.is_none() => {
                let now = Utc::now();
                det.deleted_at = Some(now);
                det.updated_at = now;
                true
            }
            _ => false,
        }
    }

    pub fn increment_view(&self, page_id: &str) {
        if let Some(mut page) = self.pages.get_mut(page_id) {
            page.view_count += 1;
            page.last_viewed_at = Some(Utc::now());
        }
    }
}

impl std::fmt::Debug for MemoryDetectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDetectionStore")
            .field("detections", &self.detections.len())
            .field("pages", &self.pages.len())
            .finish()
    }
}
