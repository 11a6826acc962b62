//! Per-workload work queue
//!
//! Events for the same workload are handled strictly one after another in
//! delivery order; events for different workloads are handled concurrently,
//! bounded by the number of workers.

use async_trait::async_trait;
use expose_api::{WorkloadEvent, WorkloadKey};
use expose_core::{Outcome, ReconcileEngine, ResourceStore};
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: WorkloadEvent);
}

#[async_trait]
impl<S: ResourceStore + 'static> EventHandler for ReconcileEngine<S> {
    async fn handle(&self, event: WorkloadEvent) {
        let key = event.key();
        let kind = event.kind();
        match ReconcileEngine::handle(self, &event).await {
            Outcome::Skipped(reason) => debug!("{} {} skipped: {:?}", kind, key, reason),
            _ => debug!("{} {} reconciled", kind, key),
        }
    }
}

#[derive(Error, Debug)]
#[error("work queue is closed")]
pub struct QueueClosed;

struct Shared<H> {
    handler: Arc<H>,
    /// A key is present while a drain task owns it
    pending: Mutex<HashMap<WorkloadKey, VecDeque<WorkloadEvent>>>,
    workers: Semaphore,
}

impl<H: EventHandler> Shared<H> {
    async fn drain(&self, key: WorkloadKey) {
        loop {
            let event = {
                let mut pending = self.pending.lock().await;
                let Some(queue) = pending.get_mut(&key) else {
                    return;
                };
                match queue.pop_front() {
                    Some(event) => event,
                    None => {
                        pending.remove(&key);
                        return;
                    }
                }
            };

            let Ok(_permit) = self.workers.acquire().await else {
                self.pending.lock().await.remove(&key);
                return;
            };
            // a panicking handler must not strand the events queued behind it
            if AssertUnwindSafe(self.handler.handle(event))
                .catch_unwind()
                .await
                .is_err()
            {
                error!("Handler panicked on an event for {}", key);
            }
        }
    }
}

pub struct WorkQueue<H> {
    shared: Arc<Shared<H>>,
    tasks: JoinSet<()>,
    closed: bool,
}

impl<H: EventHandler> WorkQueue<H> {
    pub fn new(handler: Arc<H>, workers: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                handler,
                pending: Mutex::new(HashMap::new()),
                workers: Semaphore::new(workers.max(1)),
            }),
            tasks: JoinSet::new(),
            closed: false,
        }
    }

    /// Queue an event behind earlier events of the same workload
    pub async fn push(&mut self, event: WorkloadEvent) -> Result<(), QueueClosed> {
        if self.closed {
            return Err(QueueClosed);
        }

        let key = event.key();
        let start_drain = {
            let mut pending = self.shared.pending.lock().await;
            match pending.get_mut(&key) {
                Some(queue) => {
                    queue.push_back(event);
                    false
                }
                None => {
                    pending.insert(key.clone(), VecDeque::from([event]));
                    true
                }
            }
        };

        if start_drain {
            let shared = self.shared.clone();
            self.tasks.spawn(async move { shared.drain(key).await });
        }

        self.reap();
        Ok(())
    }

    /// Stop accepting events
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Close the queue and wait until every queued event has been handled
    pub async fn shutdown(mut self) {
        self.close();
        info!("Waiting for {} workloads in flight", self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!("Work queue task failed: {}", e);
            }
        }
        info!("Work queue drained");
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                error!("Work queue task failed: {}", e);
            }
        }
    }
}
