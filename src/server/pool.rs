//! # Pool de Workers
//! src/server/pool.rs
//!
//! N threads idénticos que sacan requests de la cola y llaman al handler.
//! Un error o un panic del handler se registra y el worker sigue atendiendo:
//! un request malo nunca mata un thread.

use super::pending::PendingRequest;
use super::queue::WorkQueue;
use super::signal::StopSignal;
use super::stats::ServerStats;
use crate::dispatcher::Handler;
use crate::error::ServerError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

pub(crate) struct WorkerPool {
    workers: Vec<Worker>,
}

struct Worker {
    id: usize,
    handle: JoinHandle<()>,
}

impl WorkerPool {
    /// Lanza exactamente `count` workers
    ///
    /// Si algún thread no se puede crear, detiene y espera a los ya lanzados.
    pub(crate) fn spawn<H: Handler>(
        count: usize,
        handler: Arc<H>,
        queue: Arc<WorkQueue<PendingRequest>>,
        stop: &StopSignal,
        stats: &ServerStats,
    ) -> Result<Self, ServerError> {
        let mut workers = Vec::with_capacity(count);

        for id in 0..count {
            let handler = Arc::clone(&handler);
            let worker_queue = Arc::clone(&queue);
            let worker_stop = stop.clone();
            let worker_stats = stats.clone();

            let spawned = thread::Builder::new()
                .name(format!("notifier-worker-{}", id))
                .spawn(move || worker_loop(id, handler, worker_queue, worker_stop, worker_stats));

            match spawned {
                Ok(handle) => workers.push(Worker { id, handle }),
                Err(source) => {
                    stop.trigger();
                    queue.wake_all();
                    WorkerPool { workers }.join();
                    return Err(ServerError::Spawn {
                        thread: format!("worker-{}", id),
                        source,
                    });
                }
            }
        }

        Ok(Self { workers })
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    /// Espera a que todos los workers terminen
    pub(crate) fn join(self) {
        for worker in self.workers {
            if worker.handle.join().is_err() {
                error!(worker = worker.id, "worker thread panicked");
            }
        }
    }
}

fn worker_loop<H: Handler>(
    id: usize,
    handler: Arc<H>,
    queue: Arc<WorkQueue<PendingRequest>>,
    stop: StopSignal,
    stats: ServerStats,
) {
    debug!(worker = id, "worker started");

    while let Some(pending) = queue.next(&stop) {
        let request_id = pending.id();
        let waited = pending.age();

        match panic::catch_unwind(AssertUnwindSafe(|| handler.process(pending))) {
            Ok(Ok(())) => {
                stats.record_processed();
                debug!(worker = id, request_id, ?waited, "request processed");
            }
            Ok(Err(e)) => {
                stats.record_failed();
                warn!(worker = id, request_id, error = %e, "handler failed");
            }
            Err(payload) => {
                stats.record_failed();
                error!(worker = id, request_id, panic = panic_message(payload.as_ref()), "handler panicked");
            }
        }
    }

    debug!(worker = id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
