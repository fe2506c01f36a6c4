/// Event emission methods
use super::core::{EventSystem, Registration};
use crate::events::{DomainEvent, EventKind};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// How a single handler task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerOutcome {
    Completed,
    Failed,
}

/// Handles to the handler tasks started by one [`EventSystem::emit`] call.
///
/// Dropping the handle detaches the tasks; they keep running. Await
/// [`EmitHandle::settled`] to wait until every handler has finished.
#[derive(Debug)]
pub struct EmitHandle {
    kind: EventKind,
    tasks: Vec<JoinHandle<HandlerOutcome>>,
}

/// Outcome of an emission once every handler has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Handlers that returned `Ok`
    pub completed: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

impl EmitHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Number of handlers this emission started.
    pub fn handler_count(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every handler started by this emission to finish.
    pub async fn settled(self) -> EmitReport {
        let mut report = EmitReport::default();
        for task in self.tasks {
            match task.await {
                Ok(HandlerOutcome::Completed) => report.completed += 1,
                Ok(HandlerOutcome::Failed) => report.failed += 1,
                Err(join_error) => {
                    error!("❌ Handler task for {} did not finish: {}", self.kind, join_error);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl EventSystem {
    /// Emits a domain event to every handler registered for its kind.
    ///
    /// Each handler is started as its own task, in registration order, and
    /// this method returns as soon as they are started. Handler errors and
    /// panics are logged here and never propagate to the caller.
    pub async fn emit(&self, event: impl Into<DomainEvent>) -> EmitHandle {
        let event = Arc::new(event.into());
        let kind = event.kind();

        let (registrations, detached) = self.take_registrations(kind);

        {
            let mut stats = self.stats.write().await;
            stats.events_emitted += 1;
            stats.handlers_started += registrations.len() as u64;
            stats.total_handlers = stats.total_handlers.saturating_sub(detached);
        }

        if registrations.is_empty() {
            debug!("⚠️ No handlers for event: {} (user {})", kind, event.user_id());
            return EmitHandle {
                kind,
                tasks: Vec::new(),
            };
        }

        debug!("📤 Emitting {} to {} handlers", kind, registrations.len());

        let tasks = registrations
            .into_iter()
            .map(|registration| {
                let event = event.clone();
                let stats = self.stats.clone();
                let handler = registration.handler;

                tokio::spawn(async move {
                    let handler_name = handler.handler_name().to_string();
                    let result = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;

                    let outcome = match result {
                        Ok(Ok(())) => HandlerOutcome::Completed,
                        Ok(Err(e)) => {
                            error!("❌ Handler {} failed: {}", handler_name, e);
                            HandlerOutcome::Failed
                        }
                        Err(_) => {
                            error!("❌ Handler {} panicked", handler_name);
                            HandlerOutcome::Failed
                        }
                    };

                    if outcome == HandlerOutcome::Failed {
                        stats.write().await.handler_failures += 1;
                    }
                    outcome
                })
            })
            .collect();

        EmitHandle { kind, tasks }
    }

    /// Snapshots the registrations for `kind` and detaches single-fire ones
    /// under the same shard lock. Returns the snapshot and the number of
    /// registrations detached.
    fn take_registrations(&self, kind: EventKind) -> (Vec<Registration>, usize) {
        match self.handlers.get_mut(&kind) {
            Some(mut entry) => {
                let snapshot = entry.value().clone();
                let before = snapshot.len();
                entry.value_mut().retain(|registration| !registration.once);
                let detached = before - entry.value().len();
                (snapshot, detached)
            }
            None => (Vec::new(), 0),
        }
    }
}
