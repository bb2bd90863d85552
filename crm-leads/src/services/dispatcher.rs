//! Background task dispatcher
//!
//! Fire-and-forget execution off the request path. Jobs go into an unbounded
//! queue drained by a fixed number of worker tasks, so at most `workers` jobs
//! run at once and the rest wait. There is no admission control: under
//! sustained overload the queue grows and latency is unbounded.
//!
//! A dispatcher starts unbound. [`TaskDispatcher::bind`] hands it the context
//! every job receives (store handles, classifier) and starts the workers.
//! Submitting before that is a programming error and returns
//! [`DispatchError::NotBound`] instead of dropping the job.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Dispatcher errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Background task dispatcher used before being bound to an execution context")]
    NotBound,

    #[error("Background task dispatcher is already bound")]
    AlreadyBound,

    #[error("Background task dispatcher workers have stopped")]
    Closed,
}

type Job<C> = Box<dyn FnOnce(C) -> BoxFuture<'static, ()> + Send>;

/// Fixed-size worker pool with an unbounded FIFO queue
pub struct TaskDispatcher<C> {
    workers: usize,
    sender: OnceLock<mpsc::UnboundedSender<Job<C>>>,
    /// Queued plus running jobs
    in_flight: Arc<AtomicUsize>,
}

impl<C> TaskDispatcher<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Create an unbound dispatcher with `workers` concurrent workers (minimum 1)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            sender: OnceLock::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs submitted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Bind the execution context and start the workers
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(&self, context: C) -> Result<(), DispatchError> {
        let (tx, rx) = mpsc::unbounded_channel::<Job<C>>();
        self.sender
            .set(tx)
            .map_err(|_| DispatchError::AlreadyBound)?;

        let queue = Arc::new(Mutex::new(rx));
        for worker_id in 0..self.workers {
            tokio::spawn(worker_loop(
                worker_id,
                context.clone(),
                Arc::clone(&queue),
                Arc::clone(&self.in_flight),
            ));
        }

        tracing::info!(workers = self.workers, "Background task dispatcher started");
        Ok(())
    }

    /// Queue `task` for execution; returns immediately
    ///
    /// The task's output is discarded; its effects are observed elsewhere.
    pub fn submit<F, Fut>(&self, task: F) -> Result<(), DispatchError>
    where
        F: FnOnce(C) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(sender) = self.sender.get() else {
            tracing::error!("Background task submitted before dispatcher was bound");
            return Err(DispatchError::NotBound);
        };

        let job: Job<C> = Box::new(move |context| task(context).boxed());

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if sender.send(job).is_err() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::error!("Background task dropped: dispatcher workers have stopped");
            return Err(DispatchError::Closed);
        }

        Ok(())
    }
}

async fn worker_loop<C>(
    worker_id: usize,
    context: C,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Job<C>>>>,
    in_flight: Arc<AtomicUsize>,
) where
    C: Clone + Send + Sync + 'static,
{
    loop {
        let job = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };

        // Own task, so a panicking job doesn't take the worker with it
        if let Err(e) = tokio::spawn(job(context.clone())).await {
            tracing::error!(worker = worker_id, error = %e, "Background task panicked");
        }
        in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    tracing::debug!(worker = worker_id, "Dispatcher worker stopped");
}
