//! Per-chat serial work queue.
//!
//! Each chat owns one worker task.  Operations are boxed into jobs, sent
//! over an unbounded mpsc channel and run strictly one after another, so a
//! chat never has two remote calls in flight.  Different chats have
//! different workers and run in parallel on the runtime's thread pool.
//!
//! A job runs whether or not its [`Pending`] handle is awaited.  Each job
//! runs on its own task so a panic fails that job alone; its caller sees
//! [`SyncError::WorkerGone`] and the queue moves on.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use groupmirror_net::SyncError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Clone)]
pub struct SerialQueue {
    label: Arc<str>,
    jobs: mpsc::UnboundedSender<Job>,
    queued: Arc<AtomicUsize>,
}

impl SerialQueue {
    /// Spawn the worker.  Must be called from within a Tokio runtime.
    pub fn spawn(label: impl Into<Arc<str>>) -> Self {
        let label: Arc<str> = label.into();
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let queued = Arc::new(AtomicUsize::new(0));

        let worker_label = Arc::clone(&label);
        let worker_queued = Arc::clone(&queued);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = tokio::spawn(job).await {
                    if e.is_panic() {
                        error!(chat = %worker_label, "Queued operation panicked");
                    }
                }
                worker_queued.fetch_sub(1, Ordering::SeqCst);
            }
            debug!(chat = %worker_label, "Serial queue closed");
        });

        Self {
            label,
            jobs,
            queued,
        }
    }

    /// Enqueue `work` behind everything already submitted.
    pub fn submit<T, F>(&self, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // The caller may have dropped its handle; the work still ran.
            let _ = reply.send(work.await);
        });

        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.jobs.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            warn!(chat = %self.label, "Serial queue worker is gone");
        }
        Pending { rx }
    }

    /// Jobs submitted but not yet finished, including the running one.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .field("queued", &self.queued())
            .finish()
    }
}

/// Awaitable result of a queued operation.
#[must_use = "the operation runs anyway; await the handle to see its result"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, SyncError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, SyncError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or(Err(SyncError::WorkerGone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let queue = SerialQueue::spawn("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5u64 {
            let log = Arc::clone(&log);
            handles.push(queue.submit(async move {
                // Later jobs sleep less; only serial execution keeps the order.
                tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                log.lock().unwrap().push(i);
                Ok(i)
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i as u64);
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.queued(), 0);
    }

    #[tokio::test]
    async fn test_errors_reach_the_caller() {
        let queue = SerialQueue::spawn("test");
        let err = queue
            .submit(async { Err::<(), _>(SyncError::EmptyResponse("probe")) })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::EmptyResponse("probe")));
    }

    #[tokio::test]
    async fn test_dropped_handle_still_runs() {
        let queue = SerialQueue::spawn("test");
        let flag = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&flag);
        drop(queue.submit(async move {
            seen.store(1, Ordering::SeqCst);
            Ok(())
        }));
        queue.submit(async { Ok(()) }).await.unwrap();
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_the_queue() {
        let queue = SerialQueue::spawn("test");
        let err = queue
            .submit(async {
                if true {
                    panic!("boom");
                }
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::WorkerGone));

        assert_eq!(queue.submit(async { Ok(7u32) }).await.unwrap(), 7);
        assert_eq!(queue.queued(), 0);
    }
}
