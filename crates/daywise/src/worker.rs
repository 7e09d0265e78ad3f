//! Background task worker.
//!
//! Heavy consumers of the event iterator (aggregations, suggestions) run on
//! a dedicated thread against a cache snapshot. The worker only reads the
//! snapshot it is handed; results come back over a oneshot channel.

use daywise_core::cache::{collect_events, CacheState};
use daywise_core::event::{CalendarGroupId, EventEntity};
use daywise_core::period::Period;
use daywise_core::query::QueryFilter;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, StoreError};

/// Description of one background task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// Free-form task type, passed through to the handler.
    pub kind: String,
    pub group: CalendarGroupId,
    pub query: QueryFilter,
    pub period: Period,
}

impl TaskSpec {
    pub fn new(
        kind: impl Into<String>,
        group: impl Into<CalendarGroupId>,
        query: QueryFilter,
        period: Period,
    ) -> Self {
        Self {
            kind: kind.into(),
            group: group.into(),
            query,
            period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<R> {
    /// Part of the period was not loaded in the snapshot.
    NotReady,
    Done(R),
}

struct TaskRequest<R> {
    snapshot: CacheState,
    spec: TaskSpec,
    response_tx: oneshot::Sender<TaskOutcome<R>>,
}

/// A dedicated worker thread running one kind of handler.
pub struct TaskWorker<R> {
    request_tx: mpsc::Sender<TaskRequest<R>>,
}

impl<R: Send + 'static> TaskWorker<R> {
    /// Spawns the worker thread. `handler` receives the visible events of
    /// the task's period, each exactly once.
    pub fn spawn<F>(capacity: usize, handler: F) -> Self
    where
        F: Fn(&TaskSpec, &[EventEntity]) -> R + Send + 'static,
    {
        let (request_tx, mut request_rx) = mpsc::channel::<TaskRequest<R>>(capacity.max(1));

        std::thread::spawn(move || {
            tracing::debug!("Task worker started");

            while let Some(req) = request_rx.blocking_recv() {
                let spec = &req.spec;
                let events = collect_events(&req.snapshot, &spec.group, &spec.period, &spec.query);
                let outcome = match events {
                    Some(events) => TaskOutcome::Done(handler(spec, &events)),
                    None => {
                        tracing::debug!(
                            kind = %spec.kind,
                            group = %spec.group,
                            period = %spec.period,
                            "Task period not loaded"
                        );
                        TaskOutcome::NotReady
                    }
                };

                // Send result back, ignoring if receiver dropped
                let _ = req.response_tx.send(outcome);
            }

            tracing::debug!("Task worker shutting down");
        });

        Self { request_tx }
    }

    /// Check if the worker has capacity for more requests.
    pub fn has_capacity(&self) -> bool {
        self.request_tx.capacity() > 0
    }

    /// Runs `spec` against `snapshot` and waits for the outcome.
    pub async fn run(&self, snapshot: CacheState, spec: TaskSpec) -> Result<TaskOutcome<R>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(TaskRequest {
                snapshot,
                spec,
                response_tx,
            })
            .await
            .map_err(|_| StoreError::WorkerUnavailable)?;
        response_rx.await.map_err(|_| StoreError::WorkerUnavailable)
    }
}
