//! Authoritative state holder.

use std::sync::Arc;

use jamoveo_core::SessionState;
use parking_lot::RwLock;

/// A state that was just committed, with its revision number.
#[derive(Clone, Debug)]
pub struct Commit {
    /// The new state.
    pub state: Arc<SessionState>,
    /// Revision assigned to this commit.
    pub revision: u64,
}

struct Slot {
    state: Arc<SessionState>,
    revision: u64,
}

/// Holds the single session state. Readers clone an `Arc` and never block
/// behind anything but the swap itself.
pub struct SessionStore {
    slot: RwLock<Slot>,
}

impl SessionStore {
    /// Store starting at [`SessionState::Idle`], revision 0.
    pub fn new() -> Self {
        Self::with_state(SessionState::Idle)
    }

    /// Store starting at `state`, revision 0.
    pub fn with_state(state: SessionState) -> Self {
        Self {
            slot: RwLock::new(Slot {
                state: Arc::new(state),
                revision: 0,
            }),
        }
    }

    /// Latest committed state.
    pub fn read(&self) -> Arc<SessionState> {
        Arc::clone(&self.slot.read().state)
    }

    /// Latest committed state together with its revision.
    pub fn snapshot(&self) -> Commit {
        let slot = self.slot.read();
        Commit {
            state: Arc::clone(&slot.state),
            revision: slot.revision,
        }
    }

    /// Number of changing commits so far.
    pub fn revision(&self) -> u64 {
        self.slot.read().revision
    }

    /// Replace the state unconditionally.
    pub fn commit(&self, next: SessionState) -> Commit {
        let mut slot = self.slot.write();
        slot.state = Arc::new(next);
        slot.revision += 1;
        Commit {
            state: Arc::clone(&slot.state),
            revision: slot.revision,
        }
    }

    /// Compute the next state from the current one under the write lock.
    ///
    /// `f` returns `Ok(None)` for "no change"; errors leave the state as is.
    pub fn transition<F, E>(&self, f: F) -> Result<Option<Commit>, E>
    where
        F: FnOnce(&SessionState) -> Result<Option<SessionState>, E>,
    {
        let mut slot = self.slot.write();
        let Some(next) = f(&slot.state)? else {
            return Ok(None);
        };
        slot.state = Arc::new(next);
        slot.revision += 1;
        Ok(Some(Commit {
            state: Arc::clone(&slot.state),
            revision: slot.revision,
        }))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
