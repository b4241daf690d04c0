//! Client-side state for Dinerito: session, categories, movements and
//! statistics, kept in sync with the REST backend through [`Api`].
//!
//! Stores are plain values built once at startup around a shared [`Api`]
//! and a [`Storage`] port. They are cheap to clone (every clone sees the
//! same state) and their actions take `&self`, so several calls to the same
//! store may be in flight at once. State is only touched between awaits,
//! through whole-value updates, so the last response to resolve wins.
use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

pub use api::Api;
pub use api_types::Money;
pub use categories::CategoryStore;
pub use error::{ApiError, StorageError, ValidationError};
pub use model::{
    Category, Movement, MovementKind, MovementPatch, NewMovement, Statistics, Totals, User,
    compute_totals, filter_by_category,
};
pub use movements::MovementStore;
pub use session::{MIN_PASSWORD_LEN, SessionStatus, SessionStore};
pub use statistics::{StatisticsQuery, StatisticsStore};
pub use storage::{FileStorage, MemoryStorage, Storage};

pub mod api;
pub mod storage;

mod categories;
mod error;
mod model;
mod movements;
mod session;
mod statistics;

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Number of unresolved calls of one store.
#[derive(Clone, Debug, Default)]
pub(crate) struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    pub(crate) fn start(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self.0.clone())
    }

    pub(crate) fn any(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

/// Decrements the counter when the call resolves or is dropped.
pub(crate) struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Orders whole-collection reads of one store.
///
/// Each read takes a ticket; a response whose ticket is older than the
/// newest issued one has been superseded and must not replace the
/// collection.
#[derive(Clone, Debug, Default)]
pub(crate) struct Sequencer(Arc<AtomicU64>);

impl Sequencer {
    pub(crate) fn issue(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_latest(&self, ticket: u64) -> bool {
        self.0.load(Ordering::SeqCst) == ticket
    }
}

/// Everything one application instance needs, wired together.
#[derive(Clone, Debug)]
pub struct Stores {
    pub api: Api,
    pub session: SessionStore,
    pub categories: CategoryStore,
    pub movements: MovementStore,
    pub statistics: StatisticsStore,
}

impl Stores {
    /// Builds the stores and rehydrates their persisted state.
    pub fn new(base_url: &str, storage: Arc<dyn Storage>) -> Result<Self, ApiError> {
        let api = Api::new(base_url, storage)?;
        Ok(Self::with_api(api))
    }

    pub fn with_api(api: Api) -> Self {
        Self {
            session: SessionStore::new(api.clone()),
            categories: CategoryStore::new(api.clone()),
            movements: MovementStore::new(api.clone()),
            statistics: StatisticsStore::new(api.clone()),
            api,
        }
    }
}
