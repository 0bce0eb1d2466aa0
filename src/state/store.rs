//! The state store: serialized dispatch over immutable snapshots.

use super::actions::{reduce, Action, AppState, Origin};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Post-dispatch observer. Receives the fresh snapshot, the action that
/// produced it, and the action's origin.
type Observer = Box<dyn Fn(&Arc<AppState>, &Action, Origin) + Send + Sync>;

/// Single source of truth for entries, settings, and the
/// unsynced-changes queue.
///
/// All collaborators mutate state only through [`dispatch`] /
/// [`dispatch_remote`]; dispatches are serialized behind a write lock, so
/// the reducer behaves as a serialized mailbox. Side effects (the durable
/// write-through, sync triggering) are registered as observers rather
/// than living inside the reducer.
///
/// [`dispatch`]: StateStore::dispatch
/// [`dispatch_remote`]: StateStore::dispatch_remote
pub struct StateStore {
    /// Current snapshot. Readers clone the `Arc` and never block writers
    /// for long.
    state: RwLock<Arc<AppState>>,

    /// Serializes dispatch + observer notification.
    dispatch_lock: Mutex<()>,

    /// Post-dispatch hooks, called in registration order.
    observers: RwLock<Vec<Observer>>,
}

impl StateStore {
    pub fn new(initial: AppState) -> Self {
        Self {
            state: RwLock::new(Arc::new(initial)),
            dispatch_lock: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state.read())
    }

    /// Register a post-dispatch observer.
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&Arc<AppState>, &Action, Origin) + Send + Sync + 'static,
    {
        self.observers.write().push(Box::new(observer));
    }

    /// Dispatch a locally originated action.
    pub fn dispatch(&self, action: Action) -> Arc<AppState> {
        self.dispatch_with(action, Origin::Local)
    }

    /// Dispatch a remote-originated action (a merged change
    /// notification). Never enqueues into unsynced changes.
    pub fn dispatch_remote(&self, action: Action) -> Arc<AppState> {
        self.dispatch_with(action, Origin::Remote)
    }

    fn dispatch_with(&self, action: Action, origin: Origin) -> Arc<AppState> {
        // Hold the dispatch lock across reduce + swap + observers so
        // write-throughs happen in dispatch order.
        let _guard = self.dispatch_lock.lock();

        let next = Arc::new(reduce(&self.state.read(), &action, origin));
        *self.state.write() = Arc::clone(&next);

        for observer in self.observers.read().iter() {
            observer(&next, &action, origin);
        }

        next
    }
}
