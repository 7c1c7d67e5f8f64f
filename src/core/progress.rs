use crate::models::JobProgress;
use crate::services::MatchingService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default spacing between progress samples
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of the polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Polling,
    Completed,
    Failed(String),
}

impl TrackerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerState::Completed | TrackerState::Failed(_))
    }
}

/// What observers of the tracker see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub state: TrackerState,
    pub progress: JobProgress,
    /// Bumped on every start/cancel; a loop only writes while its epoch is current
    pub epoch: u64,
    pub samples: u64,
}

impl Default for TrackerSnapshot {
    fn default() -> Self {
        Self {
            state: TrackerState::Idle,
            progress: JobProgress::default(),
            epoch: 0,
            samples: 0,
        }
    }
}

/// Samples job progress from the matching service until the job is done
///
/// At most one polling task exists per tracker. `start` replaces a running
/// loop and `cancel` stops it; neither touches the job on the service,
/// which has no cancellation endpoint.
pub struct JobProgressTracker<S> {
    service: Arc<S>,
    interval: Duration,
    status: Arc<watch::Sender<TrackerSnapshot>>,
    task: Option<JoinHandle<()>>,
}

impl<S: MatchingService> JobProgressTracker<S> {
    pub fn new(service: Arc<S>, interval: Duration) -> Self {
        let (status, _) = watch::channel(TrackerSnapshot::default());
        Self {
            service,
            interval,
            status: Arc::new(status),
            task: None,
        }
    }

    /// Begin polling. Any loop already running is stopped first.
    pub fn start(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::debug!("Replacing running progress loop");
            task.abort();
        }

        let mut epoch = 0;
        self.status.send_modify(|snapshot| {
            snapshot.epoch += 1;
            snapshot.state = TrackerState::Polling;
            snapshot.progress = JobProgress::default();
            snapshot.samples = 0;
            epoch = snapshot.epoch;
        });

        tracing::info!("Polling job progress every {:?}", self.interval);

        self.task = Some(tokio::spawn(poll_until_done(
            Arc::clone(&self.service),
            Arc::clone(&self.status),
            self.interval,
            epoch,
        )));
    }

    /// Stop sampling. Returns true if a running loop was stopped.
    pub fn cancel(&mut self) -> bool {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        stop_polling(&self.status)
    }

    /// Handle that can stop polling while the tracker itself is borrowed
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            status: Arc::clone(&self.status),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> TrackerState {
        self.status.borrow().state.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.status.borrow().state == TrackerState::Polling
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.status.subscribe()
    }

    /// Wait until the loop is no longer polling and return the final snapshot
    pub async fn wait(&self) -> TrackerSnapshot {
        let mut receiver = self.status.subscribe();
        let result = receiver
            .wait_for(|snapshot| snapshot.state != TrackerState::Polling)
            .await
            .map(|snapshot| snapshot.clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }
}

/// Cloneable way to stop a tracker's current loop
///
/// The loop notices the cancellation straight away, even mid-interval.
/// A sample already in flight is dropped when it returns.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    status: Arc<watch::Sender<TrackerSnapshot>>,
}

impl CancelHandle {
    /// Same contract as [`JobProgressTracker::cancel`]
    pub fn cancel(&self) -> bool {
        stop_polling(&self.status)
    }
}

/// Retire the current epoch and move `Polling` to `Idle`
fn stop_polling(status: &watch::Sender<TrackerSnapshot>) -> bool {
    let mut stopped = false;
    status.send_if_modified(|snapshot| {
        snapshot.epoch += 1;
        if snapshot.state == TrackerState::Polling {
            snapshot.state = TrackerState::Idle;
            stopped = true;
        }
        stopped
    });

    if stopped {
        tracing::info!("Progress polling cancelled");
    }
    stopped
}

impl<S> Drop for JobProgressTracker<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum SampleOutcome {
    Continue,
    Finished,
    Superseded,
}

async fn poll_until_done<S: MatchingService>(
    service: Arc<S>,
    status: Arc<watch::Sender<TrackerSnapshot>>,
    period: Duration,
    epoch: u64,
) {
    // First sample after one full period, so a match request issued right
    // after `start` has reset the service's counters.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut updates = status.subscribe();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = async {
                let _ = updates.wait_for(|snapshot| snapshot.epoch != epoch).await;
            } => break,
        }

        let sample = service.get_progress().await;
        let mut outcome = SampleOutcome::Continue;

        status.send_if_modified(|snapshot| {
            if snapshot.epoch != epoch {
                outcome = SampleOutcome::Superseded;
                return false;
            }

            match &sample {
                Ok(progress) => {
                    snapshot.samples += 1;
                    if progress.current < snapshot.progress.current {
                        tracing::warn!(
                            "Discarding regressed progress sample {}/{} (last {}/{})",
                            progress.current,
                            progress.total,
                            snapshot.progress.current,
                            snapshot.progress.total
                        );
                        return false;
                    }

                    snapshot.progress = *progress;
                    if progress.is_complete() {
                        snapshot.state = TrackerState::Completed;
                        outcome = SampleOutcome::Finished;
                    }
                    true
                }
                Err(e) => {
                    snapshot.state = TrackerState::Failed(e.to_string());
                    outcome = SampleOutcome::Finished;
                    true
                }
            }
        });

        match outcome {
            SampleOutcome::Continue => {
                if let Ok(progress) = &sample {
                    tracing::debug!("Job progress {}/{}", progress.current, progress.total);
                }
            }
            SampleOutcome::Finished => {
                match &sample {
                    Ok(progress) => tracing::info!("Match job complete ({}/{})", progress.current, progress.total),
                    Err(e) => tracing::error!("Progress polling failed: {}", e),
                }
                break;
            }
            SampleOutcome::Superseded => break,
        }
    }
}
