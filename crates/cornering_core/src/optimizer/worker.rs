//! Runs an optimization on its own thread and streams progress back.

use super::progress::ProgressReporter;
use super::{CancellationToken, GeneticOptimizer, OptimizationResult, RunOptions};
use crate::error::ConfigError;
use crate::settings::{OptimizerSettings, SolverSettings};
use crate::vehicle::VehicleParameters;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Messages a background run sends to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerEvent {
    /// Integer percentage, non-decreasing.
    Progress(u8),
    /// Terminal message; nothing follows it.
    Finished(OptimizationResult),
}

/// Owner side of a background run.
pub struct OptimizerHandle {
    event_rx: Receiver<OptimizerEvent>,
    cancel: CancellationToken,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Validates the configuration and starts the run on a named thread.
///
/// Invalid input is reported here, synchronously, and no thread is started.
pub fn spawn(
    vehicle: VehicleParameters,
    solver: SolverSettings,
    settings: OptimizerSettings,
    options: RunOptions,
) -> Result<OptimizerHandle, ConfigError> {
    let optimizer = GeneticOptimizer::new(vehicle, solver, settings)?;
    let cancel = options.cancel.clone();
    let (event_tx, event_rx) = channel();

    let thread_handle = thread::Builder::new()
        .name("cornering-optimizer".to_string())
        .spawn(move || {
            let progress_tx = Mutex::new(event_tx.clone());
            let reporter = ProgressReporter::with_callback(Box::new(move |percent| {
                if let Ok(tx) = progress_tx.lock() {
                    tx.send(OptimizerEvent::Progress(percent)).ok();
                }
            }));
            let result = optimizer.run_with_progress(&options, &reporter);
            if event_tx.send(OptimizerEvent::Finished(result)).is_err() {
                debug!("optimizer handle dropped before the run finished");
            }
        })
        .map_err(|e| ConfigError::Spawn(e.to_string()))?;

    Ok(OptimizerHandle {
        event_rx,
        cancel,
        thread_handle: Some(thread_handle),
    })
}

impl OptimizerHandle {
    /// Next pending event, without blocking.
    pub fn try_recv(&self) -> Option<OptimizerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks for the next event; `None` once the run has ended and every
    /// event was drained.
    pub fn recv(&self) -> Option<OptimizerEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<OptimizerEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Asks the run to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drains events until the run finishes and returns its result.
    ///
    /// Progress events still queued are discarded.
    pub fn join(mut self) -> Option<OptimizationResult> {
        let mut result = None;
        while let Ok(event) = self.event_rx.recv() {
            if let OptimizerEvent::Finished(r) = event {
                result = Some(r);
                break;
            }
        }
        self.join_thread();
        result
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("optimizer thread panicked");
            }
        }
    }
}

impl Drop for OptimizerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.join_thread();
    }
}
