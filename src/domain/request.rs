use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use url::Url;

use super::proxy_list::candidates;
use super::service::ProxyResolver;
use super::{ProxyError, Result};
use crate::ports::{CancelHook, Completion};

#[derive(Default)]
struct RequestState {
    url: Option<Url>,
    /// Bumped by every `start`; completions carrying an older value are stale.
    generation: u64,
    completed: bool,
    observed: bool,
    list: Option<String>,
    error: Option<ProxyError>,
    captured: Option<String>,
    cursor: Option<(Vec<String>, usize)>,
    cancel_hook: Option<CancelHook>,
}

struct RequestInner {
    state: Mutex<RequestState>,
    done: Condvar,
}

impl RequestInner {
    fn lock(&self) -> MutexGuard<'_, RequestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of resolution `generation` and signal waiters.
    fn complete(&self, generation: u64, result: Result<String>) {
        self.record(generation, result, false);
    }

    /// Like `complete`, but also replaces an outcome that is already recorded.
    fn overwrite(&self, generation: u64, result: Result<String>) {
        self.record(generation, result, true);
    }

    fn record(&self, generation: u64, result: Result<String>, replace: bool) {
        let mut state = self.lock();
        if state.generation != generation || (state.completed && !replace) {
            debug!("discarding stale resolution result");
            return;
        }
        match result {
            Ok(list) => {
                state.list = Some(list);
                state.error = None;
            }
            Err(e) => {
                debug!("resolution failed: {}", e);
                state.list = None;
                state.error = Some(e);
            }
        }
        state.completed = true;
        state.cancel_hook = None;
        self.done.notify_all();
    }
}

/// Delivers the outcome of one resolution.
///
/// Dropped without delivering (a panicking backend, a discarded job) it still
/// completes the request, so waiters always wake up.
struct CompletionGuard {
    inner: Arc<RequestInner>,
    generation: u64,
    delivered: bool,
}

impl CompletionGuard {
    fn deliver(mut self, result: Result<String>) {
        self.delivered = true;
        self.inner.complete(self.generation, result);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        let err = if thread::panicking() {
            ProxyError::ScriptFailed("resolution panicked".into())
        } else {
            ProxyError::Cancelled
        };
        self.inner.complete(self.generation, Err(err));
    }
}

/// Handle for resolving one URL at a time.
///
/// A request can be restarted any number of times; each `start` replaces the
/// previous list, error and cursor. Dropping the request cancels whatever is
/// still in flight.
pub struct ResolutionRequest {
    inner: Arc<RequestInner>,
    resolver: ProxyResolver,
}

impl ResolutionRequest {
    pub(crate) fn new(resolver: ProxyResolver) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                state: Mutex::new(RequestState::default()),
                done: Condvar::new(),
            }),
            resolver,
        }
    }

    /// Begin resolving `url`. Never blocks on the resolution itself.
    pub fn start(&self, url: &str) -> Result<()> {
        self.cancel();

        let parsed = Url::parse(url).map_err(ProxyError::from);
        let generation = {
            let mut state = self.inner.lock();
            let generation = state.generation.wrapping_add(1);
            *state = RequestState {
                url: parsed.as_ref().ok().cloned(),
                generation,
                ..Default::default()
            };
            generation
        };

        let url = match parsed {
            Ok(url) => url,
            Err(e) => {
                self.inner.complete(generation, Err(e.clone()));
                return Err(e);
            }
        };

        debug!("starting resolution of {}", url);
        let guard = CompletionGuard {
            inner: self.inner.clone(),
            generation,
            delivered: false,
        };
        let done: Completion = Box::new(move |result: Result<String>| guard.deliver(result));

        match self.resolver.dispatch(url, done) {
            Ok(Some(hook)) => {
                let mut state = self.inner.lock();
                if state.generation == generation && !state.completed {
                    state.cancel_hook = Some(hook);
                }
            }
            Ok(None) => {}
            // Dropping `done` inside dispatch may already have completed it as cancelled.
            Err(e) => self.inner.overwrite(generation, Err(e)),
        }
        Ok(())
    }

    /// Block until the current resolution completes.
    ///
    /// `None` waits forever. Returns false when the timeout expires first or
    /// when nothing was ever started; the resolution keeps running either way.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.lock();
        if state.generation == 0 {
            return false;
        }

        while !state.completed {
            state = match deadline {
                None => self
                    .inner
                    .done
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.inner
                        .done
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }

        if !state.observed {
            state.observed = true;
            state.captured = state.list.clone();
            state.cursor = None;
        }
        true
    }

    /// Abort the current resolution without waiting for it.
    ///
    /// Does nothing when it already finished.
    pub fn cancel(&self) {
        let hook = {
            let mut state = self.inner.lock();
            if state.generation == 0 || state.completed {
                return;
            }
            state.completed = true;
            state.list = None;
            state.error = Some(ProxyError::Cancelled);
            self.inner.done.notify_all();
            state.cancel_hook.take()
        };
        debug!("cancelled resolution");
        if let Some(hook) = hook {
            hook();
        }
    }

    /// The URL being resolved, if `start` accepted one.
    pub fn url(&self) -> Option<Url> {
        self.inner.lock().url.clone()
    }

    /// Comma-joined candidate list; `None` while pending or after an error.
    pub fn list(&self) -> Option<String> {
        let state = self.inner.lock();
        if state.completed {
            state.list.clone()
        } else {
            None
        }
    }

    /// Next candidate of the list captured by `wait`.
    ///
    /// Returns `None` once exhausted; the call after that starts over.
    pub fn next_candidate(&self) -> Option<String> {
        let mut state = self.inner.lock();
        if state.completed && !state.observed {
            state.observed = true;
            state.captured = state.list.clone();
        }

        if state.cursor.is_none() {
            let entries = candidates(state.captured.as_deref()?);
            state.cursor = Some((entries, 0));
        }

        let next = {
            let (entries, position) = state.cursor.as_mut()?;
            let next = entries.get(*position).cloned();
            if next.is_some() {
                *position += 1;
            }
            next
        };
        if next.is_none() {
            state.cursor = None;
        }
        next
    }

    /// Error code of the last completed resolution, 0 on success.
    pub fn error(&self) -> i32 {
        self.inner.lock().error.as_ref().map_or(0, ProxyError::code)
    }

    pub fn last_error(&self) -> Option<ProxyError> {
        self.inner.lock().error.clone()
    }
}

impl Drop for ResolutionRequest {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ResolutionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ResolutionRequest")
            .field("url", &state.url.as_ref().map(Url::as_str))
            .field("completed", &state.completed)
            .field("list", &state.list)
            .field("error", &state.error)
            .finish()
    }
}
