//! Bounded-growth worker pool.
//!
//! Workers are spawned lazily, one per `enqueue` that finds every existing
//! worker busy, up to `max`. Jobs run in FIFO order and are dropped right after
//! their callback returns. Dropping the pool stops and joins every worker;
//! jobs still queued at that point are discarded without running.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};

use crate::domain::{ProxyError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct State {
    queue: VecDeque<Job>,
    threads: usize,
    busy: usize,
    stop: bool,
}

impl State {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.busy == 0
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    work_available: Condvar,
    became_idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    max_threads: usize,
}

impl ThreadPool {
    /// Create a pool with `min` workers started up front and room to grow to `max`.
    pub fn new(min_threads: usize, max_threads: usize) -> Result<Self> {
        let max_threads = max_threads.max(1);
        let pool = Self {
            shared: Arc::new(Shared::default()),
            workers: Mutex::new(Vec::new()),
            max_threads,
        };

        for _ in 0..min_threads.min(max_threads) {
            let mut state = pool.shared.lock();
            pool.spawn_worker(&mut state)?;
        }
        Ok(pool)
    }

    fn spawn_worker(&self, state: &mut State) -> Result<()> {
        let shared = self.shared.clone();
        let id = state.threads;
        let handle = thread::Builder::new()
            .name(format!("autoproxy-worker-{}", id))
            .spawn(move || worker_loop(shared))
            .map_err(ProxyError::from)?;

        state.threads += 1;
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        debug!("spawned worker thread {}", id);
        Ok(())
    }

    /// Queue `job` for execution on a worker.
    ///
    /// Fails only when no worker exists and none could be started.
    pub fn enqueue<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock();
        if state.stop {
            return Err(ProxyError::Cancelled);
        }

        if state.busy == state.threads && state.threads < self.max_threads {
            if let Err(e) = self.spawn_worker(&mut state) {
                if state.threads == 0 {
                    return Err(e);
                }
                warn!("could not grow worker pool: {}", e);
            }
        }

        state.queue.push_back(Box::new(job));
        self.shared.work_available.notify_one();
        Ok(())
    }

    /// Block until the queue is empty and no worker is running a job.
    pub fn wait(&self) {
        let state = self.shared.lock();
        let _idle = self
            .shared
            .became_idle
            .wait_while(state, |state| !state.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub fn thread_count(&self) -> usize {
        self.shared.lock().threads
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let mut state = shared.lock();
    loop {
        state = shared
            .work_available
            .wait_while(state, |state| state.queue.is_empty() && !state.stop)
            .unwrap_or_else(PoisonError::into_inner);

        if state.stop {
            break;
        }
        let Some(job) = state.queue.pop_front() else {
            continue;
        };
        state.busy += 1;
        drop(state);

        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("worker job panicked");
        }

        state = shared.lock();
        state.busy -= 1;
        if state.is_idle() {
            shared.became_idle.notify_all();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.stop = true;
            self.shared.work_available.notify_all();
        }

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if handle.join().is_err() {
                warn!("worker thread exited abnormally");
            }
        }

        // Job destructors may complete requests, so drop them unlocked.
        let discarded = std::mem::take(&mut self.shared.lock().queue);
        if !discarded.is_empty() {
            debug!("discarded {} queued jobs on shutdown", discarded.len());
        }
        drop(discarded);
        self.shared.became_idle.notify_all();
    }
}
