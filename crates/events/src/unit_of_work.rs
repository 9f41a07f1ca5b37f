//! Unit-of-work lifecycle (mechanics only).
//!
//! A [`UnitOfWork`] is the explicit context object for one transaction
//! attempt. Components that need to defer work until the attempt is durable
//! bind a [`TransactionListener`] to it; the unit of work calls back exactly
//! once, either after commit or after rollback.
//!
//! ## State machine
//!
//! ```text
//! Active ──commit()──▶ CommitRequested ──▶ Committed   (after_commit)
//!    │                       │
//!    └──────rollback()───────┴──────────▶ RolledBack  (after_rollback)
//! ```
//!
//! Listener binding and any state guarded through [`UnitOfWork::with_active`]
//! is only possible while `Active`. The transition out of `Active` happens
//! under the same lock, so once commit has begun nothing more can be added.
//!
//! A unit of work dropped before reaching a terminal state rolls back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use rendition_core::UnitOfWorkId;

/// Lifecycle state of a unit of work.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    Active,
    CommitRequested,
    Committed,
    RolledBack,
}

impl UnitOfWorkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitOfWorkState::Committed | UnitOfWorkState::RolledBack)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitOfWorkError {
    #[error("unit of work {id} is {state:?}, expected Active")]
    NotActive {
        id: UnitOfWorkId,
        state: UnitOfWorkState,
    },
    #[error("unit of work {0} lock poisoned")]
    Poisoned(UnitOfWorkId),
}

/// Callbacks fired at the end of a unit of work.
///
/// Binding is keyed: a second listener with the same [`key`](Self::key) is
/// ignored, so components may bind themselves on every call.
pub trait TransactionListener: Send + Sync {
    /// Stable binding key.
    fn key(&self) -> &str;

    /// Called once the unit of work has committed.
    fn after_commit(&self, uow: &UnitOfWork);

    /// Called once the unit of work has rolled back.
    fn after_rollback(&self, _uow: &UnitOfWork) {}
}

struct Inner {
    state: UnitOfWorkState,
    listeners: Vec<Arc<dyn TransactionListener>>,
}

pub struct UnitOfWork {
    id: UnitOfWorkId,
    inner: Mutex<Inner>,
}

impl core::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl UnitOfWork {
    /// Start a new, active unit of work.
    pub fn begin() -> Self {
        let id = UnitOfWorkId::new();
        debug!(uow = %id, "unit of work started");
        Self {
            id,
            inner: Mutex::new(Inner {
                state: UnitOfWorkState::Active,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> UnitOfWorkId {
        self.id
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    pub fn is_active(&self) -> bool {
        self.state() == UnitOfWorkState::Active
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, UnitOfWorkError> {
        self.inner
            .lock()
            .map_err(|_| UnitOfWorkError::Poisoned(self.id))
    }

    fn ensure_active(&self, inner: &Inner) -> Result<(), UnitOfWorkError> {
        if inner.state == UnitOfWorkState::Active {
            Ok(())
        } else {
            Err(UnitOfWorkError::NotActive {
                id: self.id,
                state: inner.state,
            })
        }
    }

    /// Bind a listener. Returns `false` if a listener with the same key was
    /// already bound.
    pub fn bind_listener(
        &self,
        listener: Arc<dyn TransactionListener>,
    ) -> Result<bool, UnitOfWorkError> {
        let mut inner = self.lock()?;
        self.ensure_active(&inner)?;

        if inner.listeners.iter().any(|l| l.key() == listener.key()) {
            return Ok(false);
        }
        inner.listeners.push(listener);
        Ok(true)
    }

    /// Run `f` while the unit of work is guaranteed to stay `Active`.
    ///
    /// The state lock is held for the duration of `f`; `f` must not call back
    /// into this unit of work.
    pub fn with_active<T>(&self, f: impl FnOnce() -> T) -> Result<T, UnitOfWorkError> {
        let inner = self.lock()?;
        self.ensure_active(&inner)?;
        Ok(f())
    }

    /// Commit and fire `after_commit` on every bound listener.
    pub fn commit(&self) -> Result<(), UnitOfWorkError> {
        {
            let mut inner = self.lock()?;
            self.ensure_active(&inner)?;
            inner.state = UnitOfWorkState::CommitRequested;
        }

        // Writes are applied by the store as they happen, so the attempt is
        // durable as soon as the state leaves CommitRequested.
        let listeners = {
            let mut inner = self.lock()?;
            inner.state = UnitOfWorkState::Committed;
            std::mem::take(&mut inner.listeners)
        };

        debug!(uow = %self.id, listeners = listeners.len(), "unit of work committed");
        for listener in &listeners {
            listener.after_commit(self);
        }
        Ok(())
    }

    /// Roll back and fire `after_rollback` on every bound listener.
    ///
    /// Returns `false` if the unit of work is no longer active, including
    /// while a commit is in progress.
    pub fn rollback(&self) -> bool {
        let listeners = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.state != UnitOfWorkState::Active {
                return false;
            }
            inner.state = UnitOfWorkState::RolledBack;
            std::mem::take(&mut inner.listeners)
        };

        debug!(uow = %self.id, listeners = listeners.len(), "unit of work rolled back");
        for listener in &listeners {
            listener.after_rollback(self);
        }
        true
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.is_active() {
            warn!(uow = %self.id, "unit of work dropped while open; rolling back");
            self.rollback();
        }
    }
}
