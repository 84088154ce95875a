use metrics::counter;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::ingest_error;
use crate::metrics::{INLET_JOB_FAILURES_TOTAL, INLET_JOBS_EXECUTED_TOTAL, WORKER_ID_LABEL};
use crate::workers::base::BoxedJob;

/// A worker's private job inbox, as registered in the ready queue.
///
/// Each idle worker publishes a sender to its own mailbox into the shared
/// ready channel; the dispatcher pops one handle per job and forwards the job
/// through it. The ready channel's length is therefore the number of idle
/// workers.
type Mailbox = mpsc::Sender<BoxedJob>;

/// One execution unit of the pool.
///
/// A worker is either registered idle in the ready queue or executing a job,
/// never both; between two jobs it always passes through the idle state again.
#[derive(Debug)]
struct Worker {
    id: usize,
    mailbox_tx: Mailbox,
    mailbox_rx: mpsc::Receiver<BoxedJob>,
    ready_tx: mpsc::Sender<Mailbox>,
    errors_tx: mpsc::Sender<IngestError>,
    shutdown_rx: ShutdownRx,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker_id = self.id, "worker started");

        loop {
            // Register as idle. Fails only when the dispatcher is gone.
            if self.ready_tx.send(self.mailbox_tx.clone()).await.is_err() {
                break;
            }

            tokio::select! {
                // A job already in the mailbox is executed even when the
                // shutdown signal is pending, so a dispatched job is never
                // dropped.
                biased;
                maybe_job = self.mailbox_rx.recv() => {
                    let Some(job) = maybe_job else {
                        break;
                    };

                    self.execute(job).await;
                }
                _ = self.shutdown_rx.wait_for_shutdown() => {
                    break;
                }
            }
        }

        debug!(worker_id = self.id, "worker stopped");
    }

    async fn execute(&self, job: BoxedJob) {
        debug!(worker_id = self.id, job = %job.name(), "executing job");

        counter!(
            INLET_JOBS_EXECUTED_TOTAL,
            WORKER_ID_LABEL => self.id.to_string()
        )
        .increment(1);

        if let Err(err) = job.execute(self.id).await {
            counter!(
                INLET_JOB_FAILURES_TOTAL,
                WORKER_ID_LABEL => self.id.to_string()
            )
            .increment(1);

            // Error reporting must not block the worker; the dispatcher drains
            // the channel and one report per failed job is enough.
            if self.errors_tx.try_send(err).is_err() {
                warn!(
                    worker_id = self.id,
                    job = %job.name(),
                    "error channel full, dropping job error report"
                );
            }
        }
    }
}

/// The pool's single logical controller.
///
/// Matches submitted jobs with idle workers and reacts to worker errors,
/// external cancellation, and stop requests.
struct Dispatcher {
    jobs_rx: mpsc::Receiver<BoxedJob>,
    ready_rx: mpsc::Receiver<Mailbox>,
    errors_rx: mpsc::Receiver<IngestError>,
    cancel_rx: ShutdownRx,
    quit_rx: ShutdownRx,
    worker_shutdown_tx: ShutdownTx,
    workers: JoinSet<()>,
}

impl Dispatcher {
    async fn run(mut self) {
        info!("starting blob worker pool dispatch loop");

        loop {
            tokio::select! {
                Some(err) = self.errors_rx.recv() => {
                    // A failed job is logged and forgotten; it never stops
                    // ingestion.
                    error!(error = %err, "job execution failed");
                }
                _ = self.cancel_rx.wait_for_shutdown() => {
                    info!("cancellation signal received, stopping blob worker pool");
                    break;
                }
                _ = self.quit_rx.wait_for_shutdown() => {
                    info!("stop requested, shutting down blob worker pool");
                    break;
                }
                maybe_job = self.jobs_rx.recv() => {
                    let Some(job) = maybe_job else {
                        break;
                    };

                    if !self.dispatch(job).await {
                        break;
                    }
                }
            }
        }

        self.shutdown_workers().await;
    }

    /// Forwards one job to the next idle worker.
    ///
    /// This is where submission backpressure actually applies: when no worker
    /// is idle, the dispatcher blocks here and the submission channel fills
    /// up behind it. Returns `false` when the pool should shut down instead.
    async fn dispatch(&mut self, job: BoxedJob) -> bool {
        tokio::select! {
            biased;
            maybe_mailbox = self.ready_rx.recv() => {
                match maybe_mailbox {
                    Some(mailbox) => {
                        if let Err(failed) = mailbox.send(job).await {
                            warn!(
                                job = %failed.0.name(),
                                "worker exited before handoff, job dropped"
                            );
                        }
                        true
                    }
                    None => false,
                }
            }
            _ = self.quit_rx.wait_for_shutdown() => {
                warn!(job = %job.name(), "pool stopping, job dropped before dispatch");
                false
            }
            _ = self.cancel_rx.wait_for_shutdown() => {
                warn!(job = %job.name(), "pool canceled, job dropped before dispatch");
                false
            }
        }
    }

    /// Stops every worker and waits for their tasks to finish.
    async fn shutdown_workers(mut self) {
        let _ = self.worker_shutdown_tx.shutdown();

        while let Some(result) = self.workers.join_next().await {
            if let Err(join_err) = result {
                if join_err.is_cancelled() {
                    debug!("worker task was cancelled");
                } else {
                    let err = ingest_error!(ErrorKind::WorkerPanic, "Worker panicked", join_err);
                    error!(error = %err, "worker task panicked");
                }
            }
        }

        // Surface errors reported by the final jobs after the loop exited.
        while let Ok(err) = self.errors_rx.try_recv() {
            error!(error = %err, "job execution failed");
        }

        info!("blob worker pool stopped");
    }
}

/// Channel halves and workers handed to the dispatcher on start.
#[derive(Debug)]
struct PoolParts {
    jobs_rx: mpsc::Receiver<BoxedJob>,
    ready_rx: mpsc::Receiver<Mailbox>,
    errors_rx: mpsc::Receiver<IngestError>,
    cancel_rx: ShutdownRx,
    worker_shutdown_tx: ShutdownTx,
    workers: Vec<Worker>,
}

/// Fixed-size worker pool coordinating ingestion job execution.
///
/// [`BlobWorkerPool`] owns `max_workers` workers and a job submission queue.
/// An external enumerator submits one job per discovered blob; the pool
/// guarantees that at most `max_workers` jobs run concurrently and that
/// [`BlobWorkerPool::submit`] blocks once every worker is busy, throttling
/// discovery to the pool's actual throughput.
///
/// The shutdown receiver passed at construction ties the pool to the input's
/// lifecycle: when it fires, the dispatcher runs the same shutdown sequence as
/// [`BlobWorkerPool::stop`]. In-flight jobs are not interrupted; they complete
/// before their worker exits.
#[derive(Debug)]
pub struct BlobWorkerPool {
    max_workers: usize,
    jobs_tx: mpsc::Sender<BoxedJob>,
    ready_tx: mpsc::Sender<Mailbox>,
    quit_tx: ShutdownTx,
    parts: Mutex<Option<PoolParts>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl BlobWorkerPool {
    /// Creates a pool with `max_workers` workers tied to the given
    /// cancellation signal.
    ///
    /// The pool is inert until [`BlobWorkerPool::start`] is called.
    pub fn new(max_workers: usize, cancel_rx: ShutdownRx) -> Self {
        let max_workers = max_workers.max(1);

        let (jobs_tx, jobs_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = mpsc::channel(max_workers);
        let (errors_tx, errors_rx) = mpsc::channel(max_workers);
        let (quit_tx, _) = create_shutdown_channel();
        let (worker_shutdown_tx, _) = create_shutdown_channel();

        let workers = (0..max_workers)
            .map(|id| {
                let (mailbox_tx, mailbox_rx) = mpsc::channel(1);

                Worker {
                    id,
                    mailbox_tx,
                    mailbox_rx,
                    ready_tx: ready_tx.clone(),
                    errors_tx: errors_tx.clone(),
                    shutdown_rx: worker_shutdown_tx.subscribe(),
                }
            })
            .collect();

        Self {
            max_workers,
            jobs_tx,
            ready_tx,
            quit_tx,
            parts: Mutex::new(Some(PoolParts {
                jobs_rx,
                ready_rx,
                errors_rx,
                cancel_rx,
                worker_shutdown_tx,
                workers,
            })),
            dispatcher: Mutex::new(None),
        }
    }

    /// Launches the workers and the dispatch loop.
    ///
    /// Every worker registers itself as idle before accepting jobs. Calling
    /// `start` a second time is a logged no-op.
    pub async fn start(&self) {
        let Some(parts) = self.parts.lock().await.take() else {
            warn!("blob worker pool already started");
            return;
        };

        let mut workers = JoinSet::new();
        for worker in parts.workers {
            workers.spawn(worker.run());
        }

        let dispatcher = Dispatcher {
            jobs_rx: parts.jobs_rx,
            ready_rx: parts.ready_rx,
            errors_rx: parts.errors_rx,
            cancel_rx: parts.cancel_rx,
            quit_rx: self.quit_tx.subscribe(),
            worker_shutdown_tx: parts.worker_shutdown_tx,
            workers,
        };

        *self.dispatcher.lock().await = Some(tokio::spawn(dispatcher.run()));
    }

    /// Submits a job for execution, applying backpressure.
    ///
    /// Blocks until the dispatcher has capacity for the job; returns before
    /// the job completes. Fails once the pool has stopped.
    pub async fn submit(&self, job: BoxedJob) -> IngestResult<()> {
        if self.jobs_tx.send(job).await.is_err() {
            crate::bail!(
                ErrorKind::InvalidState,
                "Worker pool is not running",
                "The job submission channel is closed because the pool has stopped"
            );
        }

        Ok(())
    }

    /// Non-blocking snapshot of how many workers are currently idle.
    ///
    /// Enumerators use this to pace discovery. Only meaningful while the pool
    /// is running.
    pub fn available_workers(&self) -> usize {
        self.ready_tx.max_capacity() - self.ready_tx.capacity()
    }

    /// The number of workers this pool was built with.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Signals shutdown and waits for the dispatcher and every worker to exit.
    ///
    /// Jobs already handed to a worker complete first; jobs still queued for
    /// dispatch are dropped with a warning. Calling `stop` again, or after
    /// cancellation already tore the pool down, only waits for that teardown
    /// to finish.
    pub async fn stop(&self) {
        let _ = self.quit_tx.shutdown();

        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(join_err) = handle.await {
                error!(error = %join_err, "dispatch loop terminated abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::base::Job;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use inlet_config::shared::SourceConfig;
    use tokio::sync::Semaphore;
    use tokio::time::sleep;

    fn test_source() -> SourceConfig {
        SourceConfig {
            container_name: "telemetry".to_owned(),
            account_name: "acme".to_owned(),
            max_workers: 2,
            poll: false,
            poll_interval_secs: 300,
        }
    }

    /// Job instrumented to observe pool scheduling behavior.
    struct TestJob {
        name: String,
        source: SourceConfig,
        active: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
        completed: Arc<AtomicUsize>,
        gate: Option<Arc<Semaphore>>,
        work: Duration,
        fail: bool,
    }

    #[derive(Clone, Default)]
    struct Instruments {
        active: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
        completed: Arc<AtomicUsize>,
    }

    impl Instruments {
        fn job(&self, name: &str) -> TestJob {
            TestJob {
                name: name.to_owned(),
                source: test_source(),
                active: self.active.clone(),
                max_seen: self.max_seen.clone(),
                completed: self.completed.clone(),
                gate: None,
                work: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Job for TestJob {
        async fn execute(&self, _worker_id: usize) -> IngestResult<()> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now_active, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.expect("gate closed");
                permit.forget();
            }
            if !self.work.is_zero() {
                sleep(self.work).await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                crate::bail!(ErrorKind::DownloadFailed, "Simulated download failure");
            }

            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn timestamp(&self) -> Option<DateTime<Utc>> {
            None
        }

        fn source(&self) -> &SourceConfig {
            &self.source
        }
    }

    async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrency_never_exceeds_max_workers() {
        let (_cancel_tx, cancel_rx) = create_shutdown_channel();
        let pool = BlobWorkerPool::new(3, cancel_rx);
        pool.start().await;

        let instruments = Instruments::default();
        for index in 0..20 {
            let mut job = instruments.job(&format!("blob-{index}"));
            job.work = Duration::from_millis(10);
            pool.submit(Box::new(job)).await.unwrap();
        }

        let completed = instruments.completed.clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                completed.load(Ordering::SeqCst) == 20
            })
            .await,
            "jobs did not finish in time"
        );
        assert!(instruments.max_seen.load(Ordering::SeqCst) <= 3);

        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_blocks_while_no_worker_is_idle() {
        let (_cancel_tx, cancel_rx) = create_shutdown_channel();
        let pool = Arc::new(BlobWorkerPool::new(1, cancel_rx));
        pool.start().await;

        let instruments = Instruments::default();
        let gate = Arc::new(Semaphore::new(0));

        let mut blocked = instruments.job("blob-0");
        blocked.gate = Some(gate.clone());
        pool.submit(Box::new(blocked)).await.unwrap();

        let active = instruments.active.clone();
        assert!(
            wait_until(Duration::from_secs(1), || {
                active.load(Ordering::SeqCst) == 1
            })
            .await
        );
        assert_eq!(pool.available_workers(), 0);

        // With the only worker busy, the dispatcher holds one job and the
        // submission channel buffers one more; the next submit must block.
        let submitter = {
            let pool = pool.clone();
            let instruments = instruments.clone();
            tokio::spawn(async move {
                for index in 1..=3 {
                    let job = instruments.job(&format!("blob-{index}"));
                    pool.submit(Box::new(job)).await.unwrap();
                }
            })
        };

        sleep(Duration::from_millis(100)).await;
        assert!(!submitter.is_finished(), "submit did not apply backpressure");

        gate.add_permits(10);
        submitter.await.unwrap();

        let completed = instruments.completed.clone();
        assert!(
            wait_until(Duration::from_secs(2), || {
                completed.load(Ordering::SeqCst) == 4
            })
            .await
        );

        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn available_workers_tracks_idle_count() {
        let (_cancel_tx, cancel_rx) = create_shutdown_channel();
        let pool = BlobWorkerPool::new(2, cancel_rx);
        assert_eq!(pool.available_workers(), 0);

        pool.start().await;
        assert!(wait_until(Duration::from_secs(1), || pool.available_workers() == 2).await);

        let instruments = Instruments::default();
        let gate = Arc::new(Semaphore::new(0));
        for index in 0..2 {
            let mut job = instruments.job(&format!("blob-{index}"));
            job.gate = Some(gate.clone());
            pool.submit(Box::new(job)).await.unwrap();
        }

        assert!(wait_until(Duration::from_secs(1), || pool.available_workers() == 0).await);

        gate.add_permits(2);
        assert!(wait_until(Duration::from_secs(1), || pool.available_workers() == 2).await);

        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn throughput_shows_real_parallelism() {
        let (_cancel_tx, cancel_rx) = create_shutdown_channel();
        let pool = BlobWorkerPool::new(2, cancel_rx);
        pool.start().await;

        let instruments = Instruments::default();
        let started = Instant::now();
        for index in 0..5 {
            let mut job = instruments.job(&format!("blob-{index}"));
            job.work = Duration::from_millis(50);
            pool.submit(Box::new(job)).await.unwrap();
        }

        let completed = instruments.completed.clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                completed.load(Ordering::SeqCst) == 5
            })
            .await
        );
        let elapsed = started.elapsed();

        // ceil(5/2) batches of 50ms each; serialization would take 250ms and
        // unbounded concurrency 50ms.
        assert!(elapsed >= Duration::from_millis(140), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");

        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_waits_for_workers_and_rejects_new_jobs() {
        let (_cancel_tx, cancel_rx) = create_shutdown_channel();
        let pool = BlobWorkerPool::new(2, cancel_rx);
        pool.start().await;

        let instruments = Instruments::default();
        for index in 0..4 {
            pool.submit(Box::new(instruments.job(&format!("blob-{index}"))))
                .await
                .unwrap();
        }

        let completed = instruments.completed.clone();
        assert!(
            wait_until(Duration::from_secs(2), || {
                completed.load(Ordering::SeqCst) == 4
            })
            .await
        );

        pool.stop().await;

        let err = pool
            .submit(Box::new(instruments.job("blob-late")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancellation_tears_the_pool_down() {
        let (cancel_tx, cancel_rx) = create_shutdown_channel();
        let pool = BlobWorkerPool::new(2, cancel_rx);
        pool.start().await;

        cancel_tx.shutdown().unwrap();

        let instruments = Instruments::default();
        assert!(
            wait_until(Duration::from_secs(2), || pool.jobs_tx.is_closed()).await,
            "dispatcher did not observe cancellation"
        );

        let err = pool
            .submit(Box::new(instruments.job("blob-0")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        // stop() after cancellation only waits for the teardown to finish.
        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_failing_job_does_not_stop_the_pool() {
        let (_cancel_tx, cancel_rx) = create_shutdown_channel();
        let pool = BlobWorkerPool::new(1, cancel_rx);
        pool.start().await;

        let instruments = Instruments::default();
        let mut failing = instruments.job("blob-bad");
        failing.fail = true;
        pool.submit(Box::new(failing)).await.unwrap();
        pool.submit(Box::new(instruments.job("blob-good")))
            .await
            .unwrap();

        let completed = instruments.completed.clone();
        assert!(
            wait_until(Duration::from_secs(2), || {
                completed.load(Ordering::SeqCst) == 2
            })
            .await,
            "pool stopped processing after a job error"
        );

        pool.stop().await;
    }
}
