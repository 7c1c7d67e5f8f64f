use crate::core::coordinator::{PageView, ValidationCoordinator, ValidationOutcome};
use crate::core::error::ReviewError;
use crate::core::progress::{CancelHandle, JobProgressTracker, TrackerSnapshot, TrackerState, DEFAULT_POLL_INTERVAL};
use crate::core::queue::QueuedCandidate;
use crate::core::workflow::{WorkflowEvent, WorkflowState};
use crate::models::{CandidateId, JobHandle, JobProgress, ValidationLabel};
use crate::services::{workbook, ClientError, MatchingService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Tunables for a review session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub page_size: usize,
    pub poll_interval: Duration,
    /// File name the service export is saved under
    pub remote_export_filename: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            poll_interval: DEFAULT_POLL_INTERVAL,
            remote_export_filename: "matching_results.xlsx".to_string(),
        }
    }
}

/// What a finished match run produced
#[derive(Debug, Clone)]
pub struct MatchSummary {
    pub job: JobHandle,
    pub progress: JobProgress,
    pub ambiguous: usize,
    pub confident: usize,
}

/// One upload → match → review cycle against the matching service
///
/// The session owns the workflow state, the progress tracker and the
/// validation coordinator. Uploading a new file or starting a new match
/// throws away the previous queue and undo slot.
pub struct ReviewSession<S: MatchingService> {
    service: Arc<S>,
    options: SessionOptions,
    workflow: WorkflowState,
    tracker: JobProgressTracker<S>,
    coordinator: ValidationCoordinator<S>,
}

impl<S: MatchingService> ReviewSession<S> {
    pub fn new(service: Arc<S>, options: SessionOptions) -> Self {
        let tracker = JobProgressTracker::new(Arc::clone(&service), options.poll_interval);
        let coordinator = ValidationCoordinator::new(Arc::clone(&service));
        Self {
            service,
            options,
            workflow: WorkflowState::default(),
            tracker,
            coordinator,
        }
    }

    pub fn workflow(&self) -> &WorkflowState {
        &self.workflow
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn coordinator(&self) -> &ValidationCoordinator<S> {
        &self.coordinator
    }

    pub fn progress(&self) -> TrackerSnapshot {
        self.tracker.snapshot()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<TrackerSnapshot> {
        self.tracker.subscribe()
    }

    fn apply(&mut self, event: WorkflowEvent) {
        self.workflow = std::mem::take(&mut self.workflow).reduce(event);
    }

    /// Upload a spreadsheet, starting a new cycle on success
    pub async fn upload(&mut self, file: &Path, table_name: &str) -> Result<Vec<String>, ReviewError> {
        self.apply(WorkflowEvent::UploadStarted);

        match self.service.upload_spreadsheet(file, table_name).await {
            Ok(upload) => {
                self.tracker.cancel();
                self.coordinator.reset().await;
                tracing::info!("Uploaded {} with {} columns", file.display(), upload.columns.len());
                self.apply(WorkflowEvent::UploadFinished {
                    table_name: table_name.to_string(),
                    columns: upload.columns,
                });
                Ok(self.workflow.columns.clone())
            }
            Err(e) => {
                tracing::error!("Upload of {} failed: {}", file.display(), e);
                self.apply(WorkflowEvent::UploadFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Ask the service which columns make a good matching key
    pub async fn recommend(&mut self) -> Result<Vec<String>, ReviewError> {
        let table_name = self
            .workflow
            .table_name
            .clone()
            .ok_or_else(|| ClientError::Validation("upload a spreadsheet first".into()))?;

        self.apply(WorkflowEvent::RecommendStarted);
        match self.service.recommend_columns(&table_name).await {
            Ok(columns) => {
                if columns.is_empty() {
                    tracing::info!("No column recommendation available for {}", table_name);
                }
                self.apply(WorkflowEvent::RecommendationsReceived(columns));
                Ok(self.workflow.recommended_columns.clone())
            }
            Err(e) => {
                tracing::error!("Column recommendation failed: {}", e);
                self.apply(WorkflowEvent::RecommendFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    pub fn toggle_column(&mut self, column: &str, checked: bool) {
        self.apply(WorkflowEvent::ColumnToggled {
            column: column.to_string(),
            checked,
        });
    }

    /// Add every recommended column to the selection
    pub fn apply_recommendations(&mut self) {
        self.apply(WorkflowEvent::RecommendationsApplied);
    }

    /// Combine the selected columns and return the service's preview
    pub async fn combine(&mut self) -> Result<Vec<String>, ReviewError> {
        if self.workflow.selected_columns.is_empty() {
            return Err(ClientError::Validation("select at least one column".into()).into());
        }

        self.apply(WorkflowEvent::CombineStarted);
        let columns = self.workflow.selected_columns.clone();
        match self.service.combine_columns(&columns).await {
            Ok(preview) => {
                tracing::info!("Combined {:?} ({} preview rows)", columns, preview.len());
                self.apply(WorkflowEvent::CombineFinished(preview));
                Ok(self.workflow.combined_preview.clone())
            }
            Err(e) => {
                tracing::error!("Combining {:?} failed: {}", columns, e);
                self.apply(WorkflowEvent::CombineFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Run a match: poll progress until done, then seed a fresh review queue
    pub async fn run_match(&mut self) -> Result<MatchSummary, ReviewError> {
        self.coordinator.reset().await;
        self.apply(WorkflowEvent::MatchStarted);
        self.tracker.start();

        let job = match self.service.start_match().await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Match request failed: {}", e);
                self.tracker.cancel();
                self.apply(WorkflowEvent::MatchFailed(e.to_string()));
                return Err(e.into());
            }
        };

        let snapshot = self.tracker.wait().await;
        self.apply(WorkflowEvent::ProgressSampled(snapshot.progress));

        match snapshot.state {
            TrackerState::Completed => {}
            TrackerState::Failed(message) => {
                self.apply(WorkflowEvent::MatchFailed(message.clone()));
                return Err(ReviewError::PollingFailed(message));
            }
            TrackerState::Idle | TrackerState::Polling => {
                self.apply(WorkflowEvent::MatchFailed("progress polling cancelled".into()));
                return Err(ReviewError::PollingCancelled);
            }
        }

        let results = match self.service.get_match_results().await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("Fetching match results failed: {}", e);
                self.apply(WorkflowEvent::MatchFailed(e.to_string()));
                return Err(e.into());
            }
        };

        let ambiguous = results.ambiguous.len();
        let confident = results.confident.len();
        self.coordinator.seed(results).await;
        self.apply(WorkflowEvent::MatchFinished { ambiguous, confident });

        tracing::info!("Review queue ready: {} ambiguous, {} confident", ambiguous, confident);

        Ok(MatchSummary {
            job,
            progress: snapshot.progress,
            ambiguous,
            confident,
        })
    }

    /// Stop progress polling without touching the remote job
    pub fn cancel_polling(&mut self) -> bool {
        self.tracker.cancel()
    }

    /// Handle for stopping a `run_match` that is waiting on progress
    ///
    /// `run_match` borrows the session for its whole duration, so this is
    /// the way to cancel from another task. The match then fails with
    /// `ReviewError::PollingCancelled`.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.tracker.cancel_handle()
    }

    pub async fn page(&self, page_number: usize) -> Result<PageView, ReviewError> {
        self.coordinator.page(page_number, self.options.page_size).await
    }

    pub async fn validate(&self, id: CandidateId, label: ValidationLabel) -> Result<ValidationOutcome, ReviewError> {
        self.coordinator.validate(id, label).await
    }

    /// Validate the row shown at `local_index` of page `page_number`
    pub async fn validate_visible(
        &self,
        page_number: usize,
        local_index: usize,
        label: ValidationLabel,
    ) -> Result<ValidationOutcome, ReviewError> {
        self.coordinator
            .validate_visible(page_number, self.options.page_size, local_index, label)
            .await
    }

    pub async fn undo(&self) -> Result<QueuedCandidate, ReviewError> {
        self.coordinator.undo().await
    }

    /// Download the service's export into `directory`
    pub async fn export_remote(&mut self, directory: &Path) -> Result<PathBuf, ReviewError> {
        self.apply(WorkflowEvent::ExportStarted);

        let result = async {
            let bytes = self.service.export_results().await?;
            let path = directory.join(&self.options.remote_export_filename);
            tokio::fs::write(&path, &bytes).await.map_err(ClientError::from)?;
            Ok::<_, ClientError>((path, bytes.len()))
        }
        .await;

        match result {
            Ok((path, size)) => {
                tracing::info!("Saved export to {} ({} bytes)", path.display(), size);
                self.apply(WorkflowEvent::ExportFinished);
                Ok(path)
            }
            Err(e) => {
                tracing::error!("Export failed: {}", e);
                self.apply(WorkflowEvent::ExportFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Write the current review queue to a local workbook
    pub async fn export_queue(&mut self, path: &Path) -> Result<usize, ReviewError> {
        self.apply(WorkflowEvent::ExportStarted);
        let entries = self.coordinator.entries().await;

        match workbook::write_queue_workbook(&entries, path) {
            Ok(()) => {
                self.apply(WorkflowEvent::ExportFinished);
                Ok(entries.len())
            }
            Err(e) => {
                tracing::error!("Writing {} failed: {}", path.display(), e);
                self.apply(WorkflowEvent::ExportFailed(e.to_string()));
                Err(e.into())
            }
        }
    }
}
