use crate::core::error::ReviewError;
use crate::core::queue::{QueuedCandidate, ReviewQueue};
use crate::core::undo::{UndoBuffer, UndoEntry};
use crate::models::{CandidateId, MatchResults, ValidationLabel};
use crate::services::MatchingService;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Queue, undo slot and in-flight markers for one review session
#[derive(Debug, Default)]
struct ReviewState {
    queue: ReviewQueue,
    undo: UndoBuffer,
    submitting: HashSet<CandidateId>,
    /// Bumped by `seed` and `reset`; requests from an older cycle leave state alone
    generation: u64,
}

impl ReviewState {
    fn start_cycle(&mut self) {
        self.undo.clear();
        self.submitting.clear();
        self.generation += 1;
    }
}

/// Result of a validation request
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The service acknowledged the decision and the row left the queue
    Committed {
        id: CandidateId,
        label: ValidationLabel,
        /// Position the row had at commit time
        position: usize,
        remaining: usize,
    },
    /// A request for this row is still in flight; nothing was sent
    AlreadySubmitting(CandidateId),
}

/// One row of a rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub global_index: usize,
    pub entry: QueuedCandidate,
    pub submitting: bool,
}

/// Owned snapshot of a page, safe to hold across awaits
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub number: usize,
    pub total_pages: usize,
    pub total_entries: usize,
    pub rows: Vec<ReviewRow>,
    pub undo_available: bool,
}

/// Applies validation decisions and undo against the review queue
///
/// Each operation takes the state lock only for synchronous bookkeeping and
/// releases it before calling the service. A row's position is looked up
/// again after the service answers, never carried across the await.
pub struct ValidationCoordinator<S> {
    service: Arc<S>,
    state: Mutex<ReviewState>,
}

impl<S: MatchingService> ValidationCoordinator<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            state: Mutex::new(ReviewState::default()),
        }
    }

    /// Start a fresh review: seed the queue, drop any undo entry
    pub async fn seed(&self, results: MatchResults) {
        let mut state = self.state.lock().await;
        state.queue.seed(results.ambiguous, results.confident);
        state.start_cycle();
    }

    /// Discard everything from the previous cycle
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.queue.clear();
        state.start_cycle();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.queue.is_empty()
    }

    pub async fn undo_available(&self) -> bool {
        !self.state.lock().await.undo.is_empty()
    }

    pub async fn last_validated(&self) -> Option<UndoEntry> {
        self.state.lock().await.undo.peek().cloned()
    }

    pub async fn is_submitting(&self, id: CandidateId) -> bool {
        self.state.lock().await.submitting.contains(&id)
    }

    pub async fn position_of(&self, id: CandidateId) -> Option<usize> {
        self.state.lock().await.queue.position_of(id)
    }

    pub async fn id_at(&self, global_index: usize) -> Option<CandidateId> {
        self.state.lock().await.queue.id_at(global_index)
    }

    /// Every queued entry, in order
    pub async fn entries(&self) -> Vec<QueuedCandidate> {
        self.state.lock().await.queue.as_slice().to_vec()
    }

    /// Render a page from the live queue
    pub async fn page(&self, page_number: usize, page_size: usize) -> Result<PageView, ReviewError> {
        let state = self.state.lock().await;
        let page = state.queue.page(page_number, page_size)?;

        let rows = page
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| ReviewRow {
                global_index: page.offset + i,
                entry: entry.clone(),
                submitting: state.submitting.contains(&entry.id),
            })
            .collect();

        Ok(PageView {
            number: page.number,
            total_pages: page.total_pages,
            total_entries: state.queue.len(),
            rows,
            undo_available: !state.undo.is_empty(),
        })
    }

    /// Validate the row currently shown at `local_index` on a page
    pub async fn validate_visible(
        &self,
        page_number: usize,
        page_size: usize,
        local_index: usize,
        label: ValidationLabel,
    ) -> Result<ValidationOutcome, ReviewError> {
        let id = self
            .state
            .lock()
            .await
            .queue
            .resolve(page_number, page_size, local_index)?;
        self.validate(id, label).await
    }

    /// Send a decision for `id` and, once acknowledged, move the row to the undo slot
    pub async fn validate(&self, id: CandidateId, label: ValidationLabel) -> Result<ValidationOutcome, ReviewError> {
        let (candidate, generation) = {
            let mut state = self.state.lock().await;
            if state.submitting.contains(&id) {
                tracing::debug!("Ignoring repeat validation for {} while in flight", id);
                return Ok(ValidationOutcome::AlreadySubmitting(id));
            }
            let candidate = state
                .queue
                .get(id)
                .map(|e| e.candidate.clone())
                .ok_or(ReviewError::UnknownCandidate(id))?;
            state.submitting.insert(id);
            (candidate, state.generation)
        };

        tracing::debug!("Submitting {} for {}", label, id);
        let result = self.service.submit_validation(&candidate, label).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::warn!("Validation of {} finished after the queue was replaced", id);
            return Err(result.err().map_or(ReviewError::UnknownCandidate(id), ReviewError::Client));
        }
        state.submitting.remove(&id);

        if let Err(e) = result {
            tracing::warn!("Validation of {} rejected: {}", id, e);
            return Err(ReviewError::Client(e));
        }

        // Resolve the row again: other rows may have left the queue meanwhile.
        let Some((position, entry)) = state.queue.remove(id) else {
            tracing::warn!("Validated {} but it is no longer queued", id);
            return Err(ReviewError::UnknownCandidate(id));
        };

        if let Some(previous) = state.undo.push(UndoEntry::new(entry, label, position)) {
            tracing::debug!("Undo for {} is no longer available", previous.entry.id);
        }

        let remaining = state.queue.len();
        tracing::info!("Validated {} as {} ({} left in queue)", id, label, remaining);

        Ok(ValidationOutcome::Committed {
            id,
            label,
            position,
            remaining,
        })
    }

    /// Revert the most recent validation
    ///
    /// The entry goes back to the head of the queue straight away. If the
    /// service refuses the undo, the entry is taken out again and the undo
    /// slot refilled, unless a newer validation has claimed it. A new cycle
    /// started meanwhile is left untouched either way.
    pub async fn undo(&self) -> Result<QueuedCandidate, ReviewError> {
        let (undo, generation) = {
            let mut state = self.state.lock().await;
            let undo = state.undo.take().ok_or(ReviewError::EmptyUndo)?;
            state.queue.insert_at_head(undo.pending_entry());
            // Block validation of the restored row until the service answers.
            state.submitting.insert(undo.entry.id);
            (undo, state.generation)
        };

        let id = undo.entry.id;
        tracing::debug!("Undoing {} for {}", undo.label, id);
        let result = self.service.undo_validation(&undo.entry.candidate).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::warn!("Undo of {} finished after the queue was replaced", id);
            return result.map(|_| undo.pending_entry()).map_err(ReviewError::Client);
        }
        state.submitting.remove(&id);

        match result {
            Ok(_) => {
                tracing::info!("Undid validation of {} ({} in queue)", id, state.queue.len());
                Ok(undo.pending_entry())
            }
            Err(e) => {
                tracing::warn!("Undo of {} rejected: {}", id, e);
                state.queue.remove(id);
                if !state.undo.restore(undo) {
                    tracing::debug!("Newer validation holds the undo slot; dropping {}", id);
                }
                Err(ReviewError::Client(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ack, JobHandle, JobProgress, MatchCandidate, UploadResponse};
    use crate::services::ClientError;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct ReviewService {
        validations: AtomicUsize,
        undos: AtomicUsize,
        reject_validation: AtomicBool,
        reject_undo: AtomicBool,
    }

    impl MatchingService for ReviewService {
        async fn upload_spreadsheet(&self, _f: &Path, _t: &str) -> Result<UploadResponse, ClientError> {
            Err(ClientError::Upload("not used".into()))
        }
        async fn recommend_columns(&self, _t: &str) -> Result<Vec<String>, ClientError> {
            Ok(vec![])
        }
        async fn combine_columns(&self, _c: &[String]) -> Result<Vec<String>, ClientError> {
            Ok(vec![])
        }
        async fn start_match(&self) -> Result<JobHandle, ClientError> {
            Ok(JobHandle { job_id: None, started_at: chrono::Utc::now() })
        }
        async fn get_progress(&self) -> Result<JobProgress, ClientError> {
            Ok(JobProgress::new(1, 1))
        }
        async fn get_match_results(&self) -> Result<MatchResults, ClientError> {
            Ok(MatchResults::default())
        }
        async fn submit_validation(&self, _c: &MatchCandidate, _l: ValidationLabel) -> Result<Ack, ClientError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.reject_validation.load(Ordering::SeqCst) {
                return Err(ClientError::Conflict("already validated".into()));
            }
            Ok(Ack::default())
        }
        async fn undo_validation(&self, _c: &MatchCandidate) -> Result<Ack, ClientError> {
            self.undos.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.reject_undo.load(Ordering::SeqCst) {
                return Err(ClientError::Api { status: 500, message: "boom".into() });
            }
            Ok(Ack::default())
        }
        async fn export_results(&self) -> Result<Vec<u8>, ClientError> {
            Ok(vec![])
        }
    }

    fn results(ambiguous: usize, confident: usize) -> MatchResults {
        let make = |prefix: &str, n: usize| {
            (0..n)
                .map(|i| MatchCandidate::new(format!("{prefix}{i}"), format!("{prefix}{i}'"), i as f64, 70.0))
                .collect::<Vec<_>>()
        };
        MatchResults {
            ambiguous: make("a", ambiguous),
            confident: make("c", confident),
        }
    }

    async fn coordinator(ambiguous: usize) -> (Arc<ReviewService>, ValidationCoordinator<ReviewService>) {
        let service = Arc::new(ReviewService::default());
        let coordinator = ValidationCoordinator::new(Arc::clone(&service));
        coordinator.seed(results(ambiguous, 0)).await;
        (service, coordinator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_moves_row_to_undo_slot() {
        let (_, coordinator) = coordinator(5).await;
        let id = coordinator.id_at(2).await.unwrap();

        let outcome = coordinator.validate(id, ValidationLabel::Match).await.unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Committed { id, label: ValidationLabel::Match, position: 2, remaining: 4 }
        );
        assert_eq!(coordinator.position_of(id).await, None);

        let last = coordinator.last_validated().await.unwrap();
        assert_eq!(last.entry.id, id);
        assert_eq!(last.entry.candidate.user_validation, Some(ValidationLabel::Match));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_submit_is_ignored() {
        let (service, coordinator) = coordinator(3).await;
        let id = coordinator.id_at(0).await.unwrap();

        let (first, second) = tokio::join!(
            coordinator.validate(id, ValidationLabel::Match),
            coordinator.validate(id, ValidationLabel::Match),
        );

        assert!(matches!(first.unwrap(), ValidationOutcome::Committed { .. }));
        assert_eq!(second.unwrap(), ValidationOutcome::AlreadySubmitting(id));
        assert_eq!(service.validations.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_rows_remove_the_right_entries() {
        let (_, coordinator) = coordinator(6).await;
        let first = coordinator.id_at(1).await.unwrap();
        let second = coordinator.id_at(4).await.unwrap();
        let survivor = coordinator.id_at(5).await.unwrap();

        let (a, b) = tokio::join!(
            coordinator.validate(first, ValidationLabel::Match),
            coordinator.validate(second, ValidationLabel::NonMatch),
        );
        a.unwrap();
        b.unwrap();

        let remaining: Vec<_> = coordinator.entries().await.into_iter().map(|e| e.id).collect();
        assert_eq!(remaining.len(), 4);
        assert!(!remaining.contains(&first));
        assert!(!remaining.contains(&second));
        assert_eq!(coordinator.position_of(survivor).await, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_validation_leaves_state_untouched() {
        let (service, coordinator) = coordinator(4).await;
        let earlier = coordinator.id_at(0).await.unwrap();
        coordinator.validate(earlier, ValidationLabel::Match).await.unwrap();

        service.reject_validation.store(true, Ordering::SeqCst);
        let id = coordinator.id_at(1).await.unwrap();
        let err = coordinator.validate(id, ValidationLabel::NonMatch).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(coordinator.len().await, 3);
        assert_eq!(coordinator.position_of(id).await, Some(1));
        assert!(!coordinator.is_submitting(id).await);
        assert_eq!(coordinator.last_validated().await.unwrap().entry.id, earlier);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_restores_at_head_once() {
        let (_, coordinator) = coordinator(10).await;
        let id = coordinator.id_at(7).await.unwrap();
        coordinator.validate(id, ValidationLabel::NonMatch).await.unwrap();

        let restored = coordinator.undo().await.unwrap();
        assert_eq!(restored.id, id);
        assert_eq!(restored.candidate.user_validation, None);
        assert_eq!(coordinator.len().await, 10);
        assert_eq!(coordinator.position_of(id).await, Some(0));
        assert!(!coordinator.undo_available().await);

        assert!(matches!(coordinator.undo().await, Err(ReviewError::EmptyUndo)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_undo_rolls_back() {
        let (service, coordinator) = coordinator(3).await;
        let id = coordinator.id_at(1).await.unwrap();
        coordinator.validate(id, ValidationLabel::Match).await.unwrap();

        service.reject_undo.store(true, Ordering::SeqCst);
        assert!(coordinator.undo().await.is_err());

        assert_eq!(coordinator.len().await, 2);
        assert_eq!(coordinator.position_of(id).await, None);
        assert_eq!(coordinator.last_validated().await.unwrap().entry.id, id);
        assert_eq!(service.undos.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_undo_after_reseed_stays_in_old_cycle() {
        let (service, coordinator) = coordinator(3).await;
        let id = coordinator.id_at(1).await.unwrap();
        coordinator.validate(id, ValidationLabel::Match).await.unwrap();

        service.reject_undo.store(true, Ordering::SeqCst);
        let (undone, ()) = tokio::join!(coordinator.undo(), async {
            tokio::task::yield_now().await;
            coordinator.seed(results(2, 0)).await;
        });

        assert!(undone.is_err());
        assert_eq!(coordinator.len().await, 2);
        assert_eq!(coordinator.position_of(id).await, None);
        assert!(!coordinator.undo_available().await);
        assert!(matches!(coordinator.undo().await, Err(ReviewError::EmptyUndo)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_acked_after_reset_is_dropped() {
        let (_, coordinator) = coordinator(3).await;
        let id = coordinator.id_at(0).await.unwrap();

        let (outcome, ()) = tokio::join!(coordinator.validate(id, ValidationLabel::Match), async {
            tokio::task::yield_now().await;
            coordinator.seed(results(4, 0)).await;
        });

        assert!(matches!(outcome, Err(ReviewError::UnknownCandidate(missing)) if missing == id));
        assert_eq!(coordinator.len().await, 4);
        assert!(!coordinator.undo_available().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_visible_resolves_against_live_queue() {
        let (_, coordinator) = coordinator(12).await;
        let target = coordinator.id_at(11).await.unwrap();

        // Page 2 of size 10 starts at global index 10; row 1 is index 11.
        let outcome = coordinator
            .validate_visible(2, 10, 1, ValidationLabel::Match)
            .await
            .unwrap();
        assert!(matches!(outcome, ValidationOutcome::Committed { id, position: 11, .. } if id == target));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_marks_rows_in_flight() {
        let (_, coordinator) = coordinator(3).await;
        let id = coordinator.id_at(0).await.unwrap();

        let (outcome, view) = tokio::join!(coordinator.validate(id, ValidationLabel::Match), async {
            tokio::task::yield_now().await;
            coordinator.page(1, 10).await.unwrap()
        });

        outcome.unwrap();
        assert!(view.rows[0].submitting);
        assert!(!view.rows[1].submitting);
    }
}
