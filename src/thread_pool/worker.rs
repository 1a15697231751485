use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, select, Receiver, Sender};
use log::{debug, error};

use super::dispatcher::Counters;
use super::job::Job;
use super::lock;

/// The dispatcher's side of a worker.
///
/// Handles sit in the free-worker queue while their worker waits for a job.
/// Delivery and closing both take `closed`, so a job is never handed to a
/// worker that has already exited.
pub(super) struct WorkerHandle {
    id: usize,
    inbox: Sender<Job>,
    stop: Sender<()>,
    ack: Receiver<()>,
    closed: Mutex<bool>,
    counters: Arc<Counters>,
}

impl WorkerHandle {
    pub(super) fn id(&self) -> usize {
        self.id
    }

    pub(super) fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }

    /// Puts `job` into the worker's inbox, or hands it back if the worker
    /// has closed in the meantime.
    pub(super) fn deliver(&self, job: Job) -> Result<(), Job> {
        let closed = lock(&self.closed);
        if *closed {
            return Err(job);
        }
        self.inbox.try_send(job).map_err(|e| e.into_inner())
    }

    /// Asks the worker to exit and blocks until it has.
    pub(super) fn stop(&self) {
        if self.stop.send(()).is_ok() {
            // Disconnects instead if the worker expired on its own.
            let _ = self.ack.recv();
        }
    }

    pub(super) fn close(&self) {
        let mut closed = lock(&self.closed);
        if !*closed {
            *closed = true;
            self.counters.worker_sub();
        }
    }

    /// Closes the worker only if no job reached its inbox.
    fn expire(&self, inbox: &Receiver<Job>) -> bool {
        let mut closed = lock(&self.closed);
        if *closed {
            return true;
        }
        if !inbox.is_empty() {
            return false;
        }
        *closed = true;
        self.counters.worker_sub();
        true
    }
}

/// A worker that has been created but whose thread has not started yet.
pub(super) struct Worker {
    handle: Arc<WorkerHandle>,
    inbox: Receiver<Job>,
    stop: Receiver<()>,
    ack: Sender<()>,
    free: Sender<Arc<WorkerHandle>>,
    /// Disconnects when the dispatcher is dropped.
    released: Receiver<()>,
    life_time: Option<Duration>,
}

impl Worker {
    /// Creates a worker that registers itself on `free` whenever it is idle.
    ///
    /// `life_time` of `None` makes a permanent worker.
    pub(super) fn new(
        id: usize,
        free: Sender<Arc<WorkerHandle>>,
        released: Receiver<()>,
        counters: Arc<Counters>,
        life_time: Option<Duration>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = channel::bounded(1);
        let (stop_tx, stop_rx) = channel::bounded(1);
        let (ack_tx, ack_rx) = channel::bounded(1);

        let handle = Arc::new(WorkerHandle {
            id,
            inbox: inbox_tx,
            stop: stop_tx,
            ack: ack_rx,
            closed: Mutex::new(false),
            counters,
        });

        Worker {
            handle,
            inbox: inbox_rx,
            stop: stop_rx,
            ack: ack_tx,
            free,
            released,
            life_time,
        }
    }

    pub(super) fn handle(&self) -> &Arc<WorkerHandle> {
        &self.handle
    }

    /// Spawns the worker thread.
    ///
    /// On failure the job already delivered to the inbox, if any, is
    /// returned alongside the error.
    pub(super) fn start(self) -> Result<(), (io::Error, Option<Job>)> {
        let id = self.handle.id;
        let inbox = self.inbox.clone();
        thread::Builder::new()
            .name(format!("jobpool-worker-{id}"))
            .spawn(move || self.run())
            .map(|_| ())
            .map_err(|e| (e, inbox.try_recv().ok()))
    }

    fn run(self) {
        let id = self.handle.id;
        debug!("Worker {id} started (life time {:?})", self.life_time);

        loop {
            if self.inbox.is_empty() && self.free.send(self.handle.clone()).is_err() {
                debug!("Worker {id}: free queue closed, shutting down");
                self.handle.close();
                return;
            }

            let timer = match self.life_time {
                Some(life_time) => channel::after(life_time),
                None => channel::never(),
            };

            select! {
                // The handle owns the inbox sender, so this never disconnects.
                recv(self.inbox) -> job => {
                    if let Ok(job) = job {
                        self.execute(job);
                    }
                },
                recv(self.stop) -> _ => {
                    self.handle.close();
                    let _ = self.ack.send(());
                    debug!("Worker {id} stopped");
                    return;
                },
                recv(self.released) -> _ => {
                    self.handle.close();
                    debug!("Worker {id}: dispatcher gone, shutting down");
                    return;
                },
                recv(timer) -> _ => {
                    if self.handle.expire(&self.inbox) {
                        debug!("Worker {id} idle for {:?}, exiting", self.life_time);
                        return;
                    }
                },
            }
        }
    }

    fn execute(&self, job: Job) {
        if panic::catch_unwind(AssertUnwindSafe(|| job.run())).is_err() {
            error!("Worker {} job panicked, continuing", self.handle.id);
        }
        self.handle.counters.done();
    }
}
