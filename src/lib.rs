//! Match Review - client-side review workflow for a spreadsheet matching service
//!
//! This library drives a remote similarity-matching service: it uploads a
//! spreadsheet, combines columns into a matching key, tracks the match job,
//! and runs the review of ambiguous pairs with single-step undo.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use core::{JobProgressTracker, ReviewError, ReviewQueue, ReviewSession, SessionOptions, UndoBuffer, ValidationCoordinator, ValidationOutcome};
pub use models::{CandidateId, JobProgress, MatchCandidate, MatchResults, ValidationLabel};
pub use services::{ClientError, MatchingService, RemoteMatchingClient};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let progress = JobProgress::new(3, 3);
        assert!(progress.is_complete());
        assert!(ReviewQueue::new().is_empty());
    }
}
