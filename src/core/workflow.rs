use crate::models::JobProgress;
use serde::{Deserialize, Serialize};

/// Where a session is in the upload → match → review cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    #[default]
    Empty,
    Uploaded,
    Combined,
    Matching,
    Reviewing,
}

/// Everything the session shows outside the review queue itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub phase: WorkflowPhase,
    pub table_name: Option<String>,
    pub columns: Vec<String>,
    pub selected_columns: Vec<String>,
    pub recommended_columns: Vec<String>,
    pub combined_preview: Vec<String>,
    pub progress: JobProgress,
    pub ambiguous_count: usize,
    pub confident_count: usize,
    pub uploading: bool,
    pub recommending: bool,
    pub combining: bool,
    pub exporting: bool,
    pub last_error: Option<String>,
}

/// Inputs that move the workflow state
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    UploadStarted,
    UploadFinished { table_name: String, columns: Vec<String> },
    UploadFailed(String),
    RecommendStarted,
    RecommendationsReceived(Vec<String>),
    RecommendFailed(String),
    ColumnToggled { column: String, checked: bool },
    RecommendationsApplied,
    CombineStarted,
    CombineFinished(Vec<String>),
    CombineFailed(String),
    MatchStarted,
    ProgressSampled(JobProgress),
    MatchFinished { ambiguous: usize, confident: usize },
    MatchFailed(String),
    ExportStarted,
    ExportFinished,
    ExportFailed(String),
    Reset,
}

impl WorkflowState {
    pub fn is_matching(&self) -> bool {
        self.phase == WorkflowPhase::Matching
    }

    pub fn is_busy(&self) -> bool {
        self.uploading || self.recommending || self.combining || self.exporting || self.is_matching()
    }

    /// Apply `event`, producing the next state
    pub fn reduce(self, event: WorkflowEvent) -> Self {
        let mut next = self;
        match event {
            WorkflowEvent::UploadStarted => {
                next.uploading = true;
                next.last_error = None;
            }
            WorkflowEvent::UploadFinished { table_name, columns } => {
                // A new upload starts a new cycle.
                next = WorkflowState {
                    phase: WorkflowPhase::Uploaded,
                    table_name: Some(table_name),
                    columns,
                    ..WorkflowState::default()
                };
            }
            WorkflowEvent::UploadFailed(message) => {
                next.uploading = false;
                next.last_error = Some(message);
            }
            WorkflowEvent::RecommendStarted => {
                next.recommending = true;
                next.last_error = None;
            }
            WorkflowEvent::RecommendationsReceived(columns) => {
                next.recommending = false;
                next.recommended_columns = columns
                    .into_iter()
                    .filter(|c| next.columns.contains(c))
                    .collect();
            }
            WorkflowEvent::RecommendFailed(message) => {
                next.recommending = false;
                next.last_error = Some(message);
            }
            WorkflowEvent::ColumnToggled { column, checked } => {
                if checked {
                    if next.columns.contains(&column) && !next.selected_columns.contains(&column) {
                        next.selected_columns.push(column);
                    }
                } else {
                    next.selected_columns.retain(|c| c != &column);
                }
            }
            WorkflowEvent::RecommendationsApplied => {
                for column in &next.recommended_columns {
                    if !next.selected_columns.contains(column) {
                        next.selected_columns.push(column.clone());
                    }
                }
            }
            WorkflowEvent::CombineStarted => {
                next.combining = true;
                next.last_error = None;
            }
            WorkflowEvent::CombineFinished(preview) => {
                next.combining = false;
                next.combined_preview = preview;
                next.phase = WorkflowPhase::Combined;
            }
            WorkflowEvent::CombineFailed(message) => {
                next.combining = false;
                next.last_error = Some(message);
            }
            WorkflowEvent::MatchStarted => {
                next.phase = WorkflowPhase::Matching;
                next.progress = JobProgress::default();
                next.ambiguous_count = 0;
                next.confident_count = 0;
                next.last_error = None;
            }
            WorkflowEvent::ProgressSampled(progress) => {
                if progress.current >= next.progress.current {
                    next.progress = progress;
                }
            }
            WorkflowEvent::MatchFinished { ambiguous, confident } => {
                next.phase = WorkflowPhase::Reviewing;
                next.ambiguous_count = ambiguous;
                next.confident_count = confident;
            }
            WorkflowEvent::MatchFailed(message) => {
                next.phase = WorkflowPhase::Combined;
                next.last_error = Some(message);
            }
            WorkflowEvent::ExportStarted => {
                next.exporting = true;
                next.last_error = None;
            }
            WorkflowEvent::ExportFinished => {
                next.exporting = false;
            }
            WorkflowEvent::ExportFailed(message) => {
                next.exporting = false;
                next.last_error = Some(message);
            }
            WorkflowEvent::Reset => {
                next = WorkflowState::default();
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded() -> WorkflowState {
        WorkflowState::default()
            .reduce(WorkflowEvent::UploadStarted)
            .reduce(WorkflowEvent::UploadFinished {
                table_name: "people".into(),
                columns: vec!["name".into(), "city".into(), "phone".into()],
            })
    }

    #[test]
    fn test_upload_resets_previous_cycle() {
        let state = uploaded()
            .reduce(WorkflowEvent::ColumnToggled { column: "name".into(), checked: true })
            .reduce(WorkflowEvent::CombineFinished(vec!["ann jakarta".into()]))
            .reduce(WorkflowEvent::UploadFinished {
                table_name: "other".into(),
                columns: vec!["id".into()],
            });

        assert_eq!(state.phase, WorkflowPhase::Uploaded);
        assert!(state.selected_columns.is_empty());
        assert!(state.combined_preview.is_empty());
        assert!(!state.uploading);
    }

    #[test]
    fn test_column_toggle_keeps_order_and_ignores_unknown() {
        let state = uploaded()
            .reduce(WorkflowEvent::ColumnToggled { column: "phone".into(), checked: true })
            .reduce(WorkflowEvent::ColumnToggled { column: "name".into(), checked: true })
            .reduce(WorkflowEvent::ColumnToggled { column: "name".into(), checked: true })
            .reduce(WorkflowEvent::ColumnToggled { column: "email".into(), checked: true });
        assert_eq!(state.selected_columns, vec!["phone", "name"]);

        let state = state.reduce(WorkflowEvent::ColumnToggled { column: "phone".into(), checked: false });
        assert_eq!(state.selected_columns, vec!["name"]);
    }

    #[test]
    fn test_recommendations_applied_to_selection() {
        let state = uploaded()
            .reduce(WorkflowEvent::RecommendStarted)
            .reduce(WorkflowEvent::RecommendationsReceived(vec!["city".into(), "ghost".into()]))
            .reduce(WorkflowEvent::RecommendationsApplied);

        assert!(!state.recommending);
        assert_eq!(state.recommended_columns, vec!["city"]);
        assert_eq!(state.selected_columns, vec!["city"]);
    }

    #[test]
    fn test_match_lifecycle() {
        let state = uploaded()
            .reduce(WorkflowEvent::CombineFinished(vec![]))
            .reduce(WorkflowEvent::MatchStarted);
        assert!(state.is_matching());
        assert!(state.is_busy());

        let state = state
            .reduce(WorkflowEvent::ProgressSampled(JobProgress::new(3, 10)))
            .reduce(WorkflowEvent::ProgressSampled(JobProgress::new(2, 10)))
            .reduce(WorkflowEvent::MatchFinished { ambiguous: 12, confident: 3 });

        assert_eq!(state.progress, JobProgress::new(3, 10));
        assert_eq!(state.phase, WorkflowPhase::Reviewing);
        assert_eq!(state.ambiguous_count, 12);
        assert!(!state.is_busy());
    }

    #[test]
    fn test_match_failure_returns_to_combined() {
        let state = uploaded()
            .reduce(WorkflowEvent::CombineFinished(vec![]))
            .reduce(WorkflowEvent::MatchStarted)
            .reduce(WorkflowEvent::MatchFailed("timeout".into()));
        assert_eq!(state.phase, WorkflowPhase::Combined);
        assert_eq!(state.last_error.as_deref(), Some("timeout"));
    }
}
