//! Background training jobs with cancellation and progress

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::model::artifact::TrainedModel;
use crate::training::pipeline::{TrainingPipeline, TrainingReport};
use crate::{Fixture, FixtureStatistics, FootyError, Result};

/// Cooperative cancellation flag shared with a running job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainingState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Snapshot of a training job
#[derive(Debug, Clone, Serialize)]
pub struct TrainingProgress {
    pub state: TrainingState,
    pub epoch: usize,
    pub total_epochs: usize,
    pub last_val_loss: Option<f64>,
    pub best_val_loss: Option<f64>,
    pub message: Option<String>,
}

impl Default for TrainingProgress {
    fn default() -> Self {
        TrainingProgress {
            state: TrainingState::Pending,
            epoch: 0,
            total_epochs: 0,
            last_val_loss: None,
            best_val_loss: None,
            message: None,
        }
    }
}

/// Write side of a progress snapshot
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter(Arc<Mutex<TrainingProgress>>);

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TrainingProgress {
        match self.0.lock() {
            Ok(progress) => progress.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut TrainingProgress)) {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut *guard);
    }

    pub fn set_state(&self, state: TrainingState, message: Option<String>) {
        self.update(|p| {
            p.state = state;
            p.message = message;
        });
    }

    pub fn epoch_finished(&self, epoch: usize, total_epochs: usize, val_loss: f64, best_val_loss: f64) {
        self.update(|p| {
            p.state = TrainingState::Running;
            p.epoch = epoch;
            p.total_epochs = total_epochs;
            p.last_val_loss = Some(val_loss);
            p.best_val_loss = Some(best_val_loss);
        });
    }
}

/// Runs a training pipeline on a background thread
pub struct TrainingJob;

impl TrainingJob {
    /// Start training on owned copies of the corpus
    pub fn spawn(
        pipeline: TrainingPipeline,
        fixtures: Vec<Fixture>,
        statistics: Vec<FixtureStatistics>,
    ) -> TrainingHandle {
        let cancel = CancelToken::new();
        let progress = ProgressReporter::new();

        let thread_cancel = cancel.clone();
        let thread_progress = progress.clone();
        let handle = std::thread::spawn(move || {
            thread_progress.set_state(TrainingState::Running, None);
            let result = pipeline.train_with(&fixtures, &statistics, thread_cancel, Some(thread_progress.clone()));
            match &result {
                Ok((_, report)) => thread_progress.set_state(
                    TrainingState::Completed,
                    Some(format!("Trained on {} samples", report.sample_count)),
                ),
                Err(FootyError::Cancelled) => thread_progress.set_state(TrainingState::Cancelled, None),
                Err(e) => thread_progress.set_state(TrainingState::Failed, Some(e.to_string())),
            }
            result
        });

        TrainingHandle {
            cancel,
            progress,
            handle,
        }
    }
}

/// Handle to a spawned training job
pub struct TrainingHandle {
    cancel: CancelToken,
    progress: ProgressReporter,
    handle: JoinHandle<Result<(TrainedModel, TrainingReport)>>,
}

impl TrainingHandle {
    /// Request cancellation; the job stops at the next batch boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn progress(&self) -> TrainingProgress {
        self.progress.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to finish
    pub fn join(self) -> Result<(TrainedModel, TrainingReport)> {
        self.handle
            .join()
            .map_err(|_| FootyError::Model("Training thread panicked".to_string()))?
    }
}
