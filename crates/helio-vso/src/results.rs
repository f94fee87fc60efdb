//! Countdown completion for downloads that finish in any order.
//!
//! A [`Results`] starts with a pending count. Every [`Ticket`] handed out by
//! [`Results::require`] adds one unit; spending it (with a value or an error)
//! removes one. When the count reaches zero the contributions are passed
//! through the finalizer, the completion callback runs, and every waiter is
//! woken. Completion happens exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::warn;

use crate::error::Error;

type Finalizer<V> = Box<dyn FnOnce(HashMap<String, V>) -> HashMap<String, V> + Send>;
type Callback<V> = Box<dyn FnOnce(&HashMap<String, V>) + Send>;

struct State<V> {
    pending:   usize,
    map:       HashMap<String, V>,
    errors:    Vec<Error>,
    done:      Option<Arc<HashMap<String, V>>>,
    finalizer: Option<Finalizer<V>>,
    callback:  Option<Callback<V>>,
}

struct Shared<V> {
    state:  Mutex<State<V>>,
    cond:   Condvar,
    notify: Notify,
}

/// Shared handle to one download's outcome. Cloning is cheap; all clones
/// observe the same state.
pub struct Results<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for Results<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> Results<V> {
    /// A future expecting `pending` completions besides the tickets it will
    /// hand out. Seed with 1 and call [`release`](Self::release) once all
    /// tickets exist, so an empty job still completes.
    pub fn new(pending: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state:  Mutex::new(State {
                    pending,
                    map: HashMap::new(),
                    errors: Vec::new(),
                    done: None,
                    finalizer: None,
                    callback: None,
                }),
                cond:   Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Transform the contributions once, right before completion.
    #[must_use]
    pub fn finalize_with<F>(self, finalizer: F) -> Self
    where
        F: FnOnce(HashMap<String, V>) -> HashMap<String, V> + Send + 'static,
    {
        self.lock().finalizer = Some(Box::new(finalizer));
        self
    }

    /// Run `callback` on completion. It runs with the state locked and must
    /// not call back into this `Results`.
    #[must_use]
    pub fn on_complete<F>(self, callback: F) -> Self
    where
        F: FnOnce(&HashMap<String, V>) + Send + 'static,
    {
        self.lock().callback = Some(Box::new(callback));
        self
    }

    fn lock(&self) -> MutexGuard<'_, State<V>> { self.shared.state.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Add one pending unit, bound to `keys`.
    pub fn require<I, S>(&self, keys: I) -> Ticket<V>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().pending += 1;
        Ticket {
            results: self.clone(),
            keys:    keys.into_iter().map(Into::into).collect(),
            spent:   false,
        }
    }

    /// Record an error and count it as one completed unit.
    pub fn add_error(&self, error: Error) {
        let mut state = self.lock();
        state.errors.push(error);
        self.complete_one(state);
    }

    /// Record an error without touching the pending count.
    pub fn note_error(&self, error: Error) { self.lock().errors.push(error); }

    /// Give back one seeded unit.
    pub fn release(&self) {
        let state = self.lock();
        self.complete_one(state);
    }

    fn complete_one(&self, mut state: MutexGuard<'_, State<V>>) {
        if state.done.is_some() {
            warn!("results already complete, ignoring extra completion");
            return;
        }
        state.pending = state.pending.saturating_sub(1);
        if state.pending > 0 {
            return;
        }

        let map = std::mem::take(&mut state.map);
        let map = match state.finalizer.take() {
            Some(finalizer) => finalizer(map),
            None => map,
        };
        if let Some(callback) = state.callback.take() {
            callback(&map);
        }
        state.done = Some(Arc::new(map));
        drop(state);

        self.shared.cond.notify_all();
        self.shared.notify.notify_waiters();
    }

    /// Block the calling thread until completion. Do not call from inside an
    /// async runtime worker; use [`finished`](Self::finished) there.
    pub fn wait(&self) -> Arc<HashMap<String, V>> {
        let mut state = self.lock();
        loop {
            if let Some(done) = &state.done {
                return Arc::clone(done);
            }
            state = self
                .shared
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait asynchronously for completion.
    pub async fn finished(&self) -> Arc<HashMap<String, V>> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(done) = self.completed() {
                return done;
            }
            notified.await;
        }
    }

    /// The final map, if complete.
    pub fn completed(&self) -> Option<Arc<HashMap<String, V>>> { self.lock().done.clone() }

    pub fn is_complete(&self) -> bool { self.lock().done.is_some() }

    pub fn pending(&self) -> usize { self.lock().pending }

    pub fn error_count(&self) -> usize { self.lock().errors.len() }

    pub fn take_errors(&self) -> Vec<Error> { std::mem::take(&mut self.lock().errors) }
}

impl<V: Clone> Results<V> {
    fn submit(&self, keys: &[String], value: V) {
        let mut state = self.lock();
        if state.done.is_some() {
            warn!(?keys, "results already complete, dropping late contribution");
            return;
        }
        for key in keys {
            state.map.insert(key.clone(), value.clone());
        }
        self.complete_one(state);
    }
}

impl<V> fmt::Debug for Results<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Results")
            .field("pending", &state.pending)
            .field("contributions", &state.map.len())
            .field("errors", &state.errors.len())
            .field("complete", &state.done.is_some())
            .finish()
    }
}

/// Single-use completion token for one unit of work.
///
/// Dropping a ticket without spending it records [`Error::Abandoned`], so a
/// lost task can never keep its `Results` from completing.
#[must_use = "a ticket must be submitted or failed"]
pub struct Ticket<V> {
    results: Results<V>,
    keys:    Vec<String>,
    spent:   bool,
}

impl<V> Ticket<V> {
    pub fn keys(&self) -> &[String] { &self.keys }

    pub fn fail(mut self, error: Error) {
        self.spent = true;
        self.results.add_error(error);
    }
}

impl<V: Clone> Ticket<V> {
    /// Store `value` under every key of this ticket.
    pub fn submit(mut self, value: V) {
        self.spent = true;
        self.results.submit(&self.keys, value);
    }
}

impl<V> Drop for Ticket<V> {
    fn drop(&mut self) {
        if !self.spent {
            self.results.add_error(Error::Abandoned(std::mem::take(&mut self.keys)));
        }
    }
}

impl<V> fmt::Debug for Ticket<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("keys", &self.keys)
            .field("spent", &self.spent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn test_guard_release_completes_empty_job() {
        let results: Results<u32> = Results::new(1);
        assert!(!results.is_complete());
        results.release();
        assert!(results.wait().is_empty());
    }

    #[test]
    fn test_submit_and_errors_count_down() {
        let results: Results<&str> = Results::new(1);
        let a = results.require(["a", "a2"]);
        let b = results.require(["b"]);
        results.release();
        assert_eq!(results.pending(), 2);

        a.submit("first");
        assert!(!results.is_complete());
        b.fail(Error::Backend("boom".into()));

        let map = results.wait();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a2"], "first");
        assert_eq!(results.take_errors().len(), 1);
    }

    #[test]
    fn test_note_error_does_not_complete() {
        let results: Results<u32> = Results::new(1);
        results.note_error(Error::Backend("group failed".into()));
        assert!(!results.is_complete());
        results.release();
        assert!(results.is_complete());
        assert_eq!(results.error_count(), 1);
    }

    #[test]
    fn test_dropped_ticket_is_abandoned() {
        let results: Results<u32> = Results::new(0);
        drop(results.require(["lost"]));
        assert!(results.is_complete());
        let errors = results.take_errors();
        assert!(matches!(&errors[..], [Error::Abandoned(keys)] if keys == &["lost".to_string()]));
    }

    #[test]
    fn test_finalizer_and_callback_run_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let results: Results<u32> = Results::new(1)
            .finalize_with(|mut map| {
                map.retain(|k, _| k != "drop");
                map
            })
            .on_complete(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        results.require(["keep"]).submit(1);
        results.require(["drop"]).submit(2);
        results.release();
        results.release();

        let map = results.wait();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["keep"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_submitters() {
        let results: Results<usize> = Results::new(1);
        let tickets: Vec<_> = (0..16).map(|i| results.require([format!("k{i}")])).collect();
        results.release();

        let handles: Vec<_> = tickets
            .into_iter()
            .enumerate()
            .map(|(i, ticket)| thread::spawn(move || ticket.submit(i)))
            .collect();
        let map = results.wait();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 16);
        assert_eq!(map["k7"], 7);
    }

    #[tokio::test]
    async fn test_finished_wakes_async_waiters() {
        let results: Results<u32> = Results::new(1);
        let ticket = results.require(["x"]);
        results.release();

        let waiter = {
            let results = results.clone();
            tokio::spawn(async move { results.finished().await })
        };
        tokio::task::yield_now().await;
        ticket.submit(5);

        let map = waiter.await.unwrap();
        assert_eq!(map["x"], 5);
    }
}
