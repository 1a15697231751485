use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crossbeam::channel::{self, select, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, warn};

use super::config::PoolConfig;
use super::job::Job;
use super::lock;
use super::worker::{Worker, WorkerHandle};

/// How often shutdown re-checks the live worker count while collecting
/// workers that are about to register.
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Counters shared between the pool, the dispatcher and every worker.
pub(super) struct Counters {
    /// Submitted jobs that have not finished yet, queued or running.
    pending: AtomicUsize,
    /// Live workers.
    workers: AtomicUsize,
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl Counters {
    pub(super) fn new() -> Self {
        Counters {
            pending: AtomicUsize::new(0),
            workers: AtomicUsize::new(0),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
        }
    }

    pub(super) fn add(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn done(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _guard = lock(&self.drain_lock);
            self.drained.notify_all();
        }
    }

    pub(super) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Blocks until no job is pending.
    pub(super) fn wait(&self) {
        let mut guard = lock(&self.drain_lock);
        while self.pending() > 0 {
            guard = self
                .drained
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn worker_add(&self) {
        self.workers.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn worker_sub(&self) {
        self.workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub(super) fn worker_count(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }
}

/// Routes queued jobs to free workers, growing the worker set on demand.
///
/// The routing loop runs on a single thread and is the only place that
/// spawns workers, which keeps the `worker_max_open` check race free.
pub(super) struct Dispatcher {
    jobs: Receiver<Job>,
    stop: Receiver<()>,
    free_tx: Sender<Arc<WorkerHandle>>,
    free_rx: Receiver<Arc<WorkerHandle>>,
    // Never sent on. Dropping the dispatcher disconnects every worker's
    // receiver, so workers that register after shutdown still exit.
    _released_tx: Sender<()>,
    released_rx: Receiver<()>,
    counters: Arc<Counters>,
    max_open: usize,
    life_time: Duration,
    next_id: usize,
}

impl Dispatcher {
    /// `config` must already be resolved.
    pub(super) fn new(
        config: &PoolConfig,
        jobs: Receiver<Job>,
        stop: Receiver<()>,
        counters: Arc<Counters>,
    ) -> Self {
        let (free_tx, free_rx) = channel::bounded(config.get_worker_max_open());
        let (released_tx, released_rx) = channel::bounded(0);
        Dispatcher {
            jobs,
            stop,
            free_tx,
            free_rx,
            _released_tx: released_tx,
            released_rx,
            counters,
            max_open: config.get_worker_max_open(),
            life_time: config.get_worker_life_time(),
            next_id: 0,
        }
    }

    /// Starts `count` permanent workers.
    pub(super) fn spawn_idle(&mut self, count: usize) -> io::Result<()> {
        for _ in 0..count {
            self.spawn_worker(None, None).map_err(|(e, _)| e)?;
        }
        Ok(())
    }

    pub(super) fn run(mut self) {
        loop {
            let job = select! {
                recv(self.jobs) -> job => job.ok(),
                recv(self.stop) -> _ => None,
            };
            match job {
                Some(job) => self.route(job),
                None => break,
            }
        }
        self.shutdown();
    }

    fn route(&mut self, mut job: Job) {
        loop {
            if self.free_rx.is_empty() && self.counters.worker_count() < self.max_open {
                match self.spawn_worker(Some(self.life_time), Some(job)) {
                    Ok(()) => return,
                    Err((e, returned)) => {
                        error!("Failed to spawn worker: {e}");
                        match returned {
                            Some(returned) if self.counters.worker_count() > 0 => job = returned,
                            _ => {
                                error!("No worker available, dropping job");
                                self.counters.done();
                                return;
                            }
                        }
                    }
                }
            }

            // Free-queue senders include our own `free_tx`, so this only
            // blocks until some busy worker registers.
            let Ok(worker) = self.free_rx.recv() else {
                self.counters.done();
                return;
            };

            match worker.deliver(job) {
                Ok(()) => return,
                Err(returned) => {
                    debug!("Worker {} expired before assignment", worker.id());
                    job = returned;
                }
            }
        }
    }

    fn spawn_worker(
        &mut self,
        life_time: Option<Duration>,
        job: Option<Job>,
    ) -> Result<(), (io::Error, Option<Job>)> {
        let id = self.next_id;
        self.next_id += 1;

        let worker = Worker::new(
            id,
            self.free_tx.clone(),
            self.released_rx.clone(),
            self.counters.clone(),
            life_time,
        );
        if let Some(job) = job {
            // A fresh single-slot inbox always has room.
            let _ = worker.handle().deliver(job);
        }
        self.counters.worker_add();

        let handle = worker.handle().clone();
        worker.start().inspect_err(|_| handle.close())
    }

    pub(super) fn shutdown(&self) {
        let mut dropped = 0;
        for _job in self.jobs.try_iter() {
            self.counters.done();
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Dispatcher released with {dropped} queued jobs, dropping them");
        }

        let mut stopped = 0;
        loop {
            let worker = if self.counters.pending() == 0 {
                // Nothing is running, so every live worker is registered or
                // about to be.
                if self.counters.worker_count() == 0 {
                    break;
                }
                match self.free_rx.recv_timeout(SHUTDOWN_POLL) {
                    Ok(worker) => worker,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.free_rx.try_recv() {
                    Ok(worker) => worker,
                    Err(_) => break,
                }
            };

            if !worker.is_closed() {
                worker.stop();
                stopped += 1;
            }
        }

        debug!(
            "Dispatcher stopped {stopped} workers, {} still busy",
            self.counters.worker_count()
        );
    }
}
