//! Cancellable deferred tasks for reconnect timers.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::event::{EventSender, ManagerEvent};

/// A scheduled event that has not fired yet
pub trait DeferredTask: Send {
    /// Cancel the task. The event will not be delivered afterwards.
    fn cancel(self: Box<Self>);
}

/// Schedules an event to be delivered to the manager after a delay
pub trait Scheduler: Send + Sync {
    /// Deliver `event` through `events` once `delay` has elapsed
    fn schedule(
        &self,
        delay: Duration,
        event: ManagerEvent,
        events: &EventSender,
    ) -> Box<dyn DeferredTask>;
}

/// Scheduler backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(
        &self,
        delay: Duration,
        event: ManagerEvent,
        events: &EventSender,
    ) -> Box<dyn DeferredTask> {
        let events = events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.send(event);
        });
        Box::new(TokioDeferredTask(handle))
    }
}

struct TokioDeferredTask(JoinHandle<()>);

impl DeferredTask for TokioDeferredTask {
    fn cancel(self: Box<Self>) {
        self.0.abort();
    }
}
