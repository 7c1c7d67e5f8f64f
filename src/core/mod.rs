// Review workflow exports
pub mod coordinator;
pub mod error;
pub mod progress;
pub mod queue;
pub mod session;
pub mod undo;
pub mod workflow;

pub use coordinator::{PageView, ReviewRow, ValidationCoordinator, ValidationOutcome};
pub use error::ReviewError;
pub use progress::{CancelHandle, JobProgressTracker, TrackerSnapshot, TrackerState, DEFAULT_POLL_INTERVAL};
pub use queue::{Page, QueuedCandidate, ReviewQueue};
pub use session::{MatchSummary, ReviewSession, SessionOptions};
pub use undo::{UndoBuffer, UndoEntry};
pub use workflow::{WorkflowEvent, WorkflowPhase, WorkflowState};
