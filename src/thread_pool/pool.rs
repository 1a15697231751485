use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, warn};

use super::config::PoolConfig;
use super::dispatcher::{Counters, Dispatcher};
use super::job::Job;
use super::{lock, ThreadPool};
use crate::common::PoolStats;
use crate::{PoolError, Result};

/// A worker pool with a bounded job queue and a bounded, elastic set of
/// worker threads.
///
/// `worker_idle` permanent workers start with the pool. When every worker
/// is busy the dispatcher starts more, up to `worker_max_open`; those extra
/// workers exit after `worker_life_time` without a job. Once the job queue
/// holds `pool_size` jobs, [`job_queue`](Pool::job_queue) blocks.
///
/// The safe way to shut down is [`graceful_stop`](Pool::graceful_stop).
/// Dropping the pool releases it without waiting for queued jobs.
pub struct Pool {
    jobs: Sender<Job>,
    // Keeps the queue connected after the dispatcher is gone, so jobs that
    // land late can still be drained and uncounted.
    queued: Receiver<Job>,
    stop: Sender<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
    alive: Mutex<bool>,
    config: PoolConfig,
}

impl Pool {
    /// Creates a pool and starts its idle workers and dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned.
    pub fn new(config: PoolConfig) -> Result<Self> {
        let config = config.resolved();
        let (jobs_tx, jobs_rx) = channel::bounded(config.get_pool_size());
        let (stop_tx, stop_rx) = channel::bounded(1);
        let counters = Arc::new(Counters::new());

        let mut dispatcher =
            Dispatcher::new(&config, jobs_rx.clone(), stop_rx, counters.clone());
        if let Err(e) = dispatcher.spawn_idle(config.get_worker_idle()) {
            dispatcher.shutdown();
            return Err(e.into());
        }

        let handle = thread::Builder::new()
            .name("jobpool-dispatcher".to_owned())
            .spawn(move || dispatcher.run())?;

        debug!(
            "Pool started: pool_size={} worker_max_open={} worker_idle={} worker_life_time={:?}",
            config.get_pool_size(),
            config.get_worker_max_open(),
            config.get_worker_idle(),
            config.get_worker_life_time()
        );

        Ok(Pool {
            jobs: jobs_tx,
            queued: jobs_rx,
            stop: stop_tx,
            dispatcher: Mutex::new(Some(handle)),
            counters,
            alive: Mutex::new(true),
            config,
        })
    }

    /// Queues a job, blocking while the queue is full.
    ///
    /// Does nothing once the pool has stopped accepting jobs.
    pub fn job_queue(&self, job: Job) {
        if !self.is_alive() {
            return;
        }

        self.counters.add();
        // Never fails while `queued` is held.
        let _ = self.jobs.send(job);

        // The send may have waited out a concurrent `release`.
        if lock(&self.dispatcher).is_none() {
            self.drop_queued();
        }
    }

    /// Queues a job without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolClosed`] once the pool stopped accepting
    /// jobs and [`PoolError::QueueFull`] if the queue is at capacity.
    pub fn job_queue_not_wait(&self, job: Job) -> Result<()> {
        let alive = lock(&self.alive);
        if !*alive {
            return Err(PoolError::PoolClosed);
        }

        self.counters.add();
        // With `queued` held the queue never disconnects, so the only
        // failure is a full queue.
        self.jobs.try_send(job).map_err(|_| {
            self.counters.done();
            PoolError::QueueFull
        })
    }

    /// Stops accepting new jobs. Queued and running jobs still complete.
    pub fn stop_add_job(&self) {
        *lock(&self.alive) = false;
    }

    /// Blocks until every submitted job has finished.
    pub fn wait(&self) {
        self.counters.wait();
    }

    /// Shuts the dispatcher down and stops idle workers.
    ///
    /// Jobs still in the queue are dropped and running jobs are left to
    /// finish, so call [`wait`](Pool::wait) first to lose nothing. The pool
    /// accepts no jobs afterwards. Calling this more than once is a no-op.
    pub fn release(&self) {
        self.stop_add_job();

        let Some(handle) = lock(&self.dispatcher).take() else {
            return;
        };
        let _ = self.stop.send(());
        if handle.join().is_err() {
            error!("Dispatcher thread panicked");
        }
        self.drop_queued();
    }

    /// Drops jobs left in the queue once the dispatcher is gone.
    fn drop_queued(&self) {
        let mut dropped = 0;
        for _job in self.queued.try_iter() {
            self.counters.done();
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Dropped {dropped} jobs queued after release");
        }
    }

    /// Stops accepting jobs, waits for the outstanding ones and releases
    /// the pool.
    pub fn graceful_stop(&self) {
        self.stop_add_job();
        self.wait();
        self.release();
    }

    /// Number of jobs waiting in the queue.
    pub fn job_queue_len(&self) -> usize {
        self.jobs.len()
    }

    /// Number of submitted jobs that have not finished, queued or running.
    pub fn working_job_count(&self) -> usize {
        self.counters.pending()
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.counters.worker_count()
    }

    /// Whether the pool still accepts jobs.
    pub fn is_alive(&self) -> bool {
        *lock(&self.alive)
    }

    /// The resolved configuration the pool runs with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Snapshot of all gauges.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            alive: self.is_alive(),
            job_queue_len: self.job_queue_len(),
            working_job_count: self.working_job_count(),
            worker_count: self.worker_count(),
        }
    }
}

impl ThreadPool for Pool {
    fn new(threads: u32) -> Result<Self> {
        let threads = threads as usize;
        Pool::new(
            PoolConfig::default()
                .worker_max_open(threads)
                .worker_idle(threads),
        )
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.job_queue(Job::new(job));
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.release();
    }
}
