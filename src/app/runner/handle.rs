//! Run handles
//!
//! A [`RunHandle`] is the consumer side of one launched job: a stream of
//! [`RunEvent`]s that ends with exactly one [`RunEvent::Finished`], plus a
//! [`CancelHandle`] to ask the job to stop. The producer side is a
//! [`RunReporter`], owned by whatever drives the job (the process supervisor
//! in production, scripted launchers in tests).

use std::future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};

use super::progress::ProgressEvent;
use crate::app::models::JobId;

/// Terminal result of one run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Exit code 0
    Success { output_path: Option<PathBuf> },
    /// Non-zero exit or abnormal termination
    Failure {
        exit_code: Option<i32>,
        error: String,
    },
    /// Stopped on request; `forced` when the grace period ran out
    Cancelled { forced: bool },
}

/// Item of a run's event stream
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress(ProgressEvent),
    Finished(RunOutcome),
}

/// Stop request levels, in increasing severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StopRequest {
    None,
    /// Ask the process to exit, force after the grace period
    Terminate,
    /// Kill immediately
    Kill,
}

/// Cloneable handle that requests a run to stop
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<StopRequest>>,
}

impl CancelHandle {
    /// Request a graceful stop
    pub fn terminate(&self) {
        self.escalate(StopRequest::Terminate);
    }

    /// Request an immediate kill
    pub fn kill(&self) {
        self.escalate(StopRequest::Kill);
    }

    /// Current request level
    pub fn requested(&self) -> StopRequest {
        *self.tx.borrow()
    }

    fn escalate(&self, level: StopRequest) {
        self.tx.send_if_modified(|current| {
            if level > *current {
                *current = level;
                true
            } else {
                false
            }
        });
    }
}

/// Producer side of a run
#[derive(Debug)]
pub struct RunReporter {
    job_id: JobId,
    events: mpsc::Sender<RunEvent>,
    stop: watch::Receiver<StopRequest>,
}

impl RunReporter {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Forward a progress event; `false` once the consumer is gone
    pub async fn progress(&self, event: ProgressEvent) -> bool {
        self.events.send(RunEvent::Progress(event)).await.is_ok()
    }

    /// Report the terminal outcome, consuming the reporter
    pub async fn finish(self, outcome: RunOutcome) {
        let _ = self.events.send(RunEvent::Finished(outcome)).await;
    }

    /// Current stop request level
    pub fn stop_requested(&self) -> StopRequest {
        *self.stop.borrow()
    }

    /// Independent receiver for stop requests
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            rx: self.stop.clone(),
        }
    }
}

/// Awaitable view of stop requests
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<StopRequest>,
}

impl StopSignal {
    /// Resolve once a request of at least `level` is made
    pub async fn at_least(&mut self, level: StopRequest) -> StopRequest {
        loop {
            let current = *self.rx.borrow_and_update();
            if current >= level && current != StopRequest::None {
                return current;
            }
            if self.rx.changed().await.is_err() {
                // Every cancel handle dropped: no request can arrive
                return future::pending().await;
            }
        }
    }

    /// Resolve on any stop request
    pub async fn requested(&mut self) -> StopRequest {
        self.at_least(StopRequest::Terminate).await
    }
}

/// Consumer side of a run
#[derive(Debug)]
pub struct RunHandle {
    job_id: JobId,
    events: mpsc::Receiver<RunEvent>,
    cancel: CancelHandle,
    finished: bool,
}

impl RunHandle {
    /// Create a connected handle/reporter pair
    pub fn channel(job_id: JobId, buffer: usize) -> (RunHandle, RunReporter) {
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        let (stop_tx, stop_rx) = watch::channel(StopRequest::None);

        let handle = RunHandle {
            job_id: job_id.clone(),
            events: event_rx,
            cancel: CancelHandle {
                tx: Arc::new(stop_tx),
            },
            finished: false,
        };
        let reporter = RunReporter {
            job_id,
            events: event_tx,
            stop: stop_rx,
        };
        (handle, reporter)
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drain the stream and return the outcome
    pub async fn wait(mut self) -> RunOutcome {
        use futures::StreamExt;

        while let Some(event) = self.next().await {
            if let RunEvent::Finished(outcome) = event {
                return outcome;
            }
        }
        lost_outcome()
    }
}

impl Stream for RunHandle {
    type Item = RunEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if matches!(event, RunEvent::Finished(_)) {
                    this.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                // Producer vanished without an outcome
                this.finished = true;
                Poll::Ready(Some(RunEvent::Finished(lost_outcome())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn lost_outcome() -> RunOutcome {
    RunOutcome::Failure {
        exit_code: None,
        error: "runner stopped without reporting an outcome".to_string(),
    }
}
