//! The authoritative rehearsal state.
//!
//! A song can only be live while rehearsal is on. Modelling the state as an
//! enum makes `current_song != None && !active` unrepresentable.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::song::SongRef;

/// Coarse position in the rehearsal state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Rehearsal off.
    Idle,
    /// Rehearsal on, no song selected.
    Waiting,
    /// Rehearsal on, a song is being performed.
    Live,
}

impl Phase {
    /// Lowercase name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire value of the `rehearsal_state` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RehearsalState {
    /// Rehearsal mode on.
    Active,
    /// Rehearsal mode off.
    Inactive,
}

/// Single source of truth for the session.
///
/// Serializes to the snapshot shape observers consume:
/// `{"rehearsal_state": "active"|"inactive", "current_song": SongRef|null}`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(try_from = "SnapshotRepr")]
pub enum SessionState {
    /// Rehearsal off.
    #[default]
    Idle,
    /// Rehearsal on, waiting for the leader to pick a song.
    Waiting,
    /// Rehearsal on with a song in play.
    Live(SongRef),
}

impl SessionState {
    /// Which state-machine state this is.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Waiting => Phase::Waiting,
            Self::Live(_) => Phase::Live,
        }
    }

    /// Whether rehearsal mode is on.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// The song in play, if any.
    pub fn current_song(&self) -> Option<&SongRef> {
        match self {
            Self::Live(song) => Some(song),
            Self::Idle | Self::Waiting => None,
        }
    }

    /// Wire value of `rehearsal_state`.
    pub fn rehearsal_state(&self) -> RehearsalState {
        if self.is_active() {
            RehearsalState::Active
        } else {
            RehearsalState::Inactive
        }
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    rehearsal_state: RehearsalState,
    current_song: Option<&'a SongRef>,
}

#[derive(Deserialize)]
struct SnapshotRepr {
    rehearsal_state: RehearsalState,
    #[serde(default)]
    current_song: Option<SongRef>,
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SnapshotRef {
            rehearsal_state: self.rehearsal_state(),
            current_song: self.current_song(),
        }
        .serialize(serializer)
    }
}

impl TryFrom<SnapshotRepr> for SessionState {
    type Error = String;

    fn try_from(repr: SnapshotRepr) -> Result<Self, Self::Error> {
        match (repr.rehearsal_state, repr.current_song) {
            (RehearsalState::Inactive, None) => Ok(Self::Idle),
            (RehearsalState::Active, None) => Ok(Self::Waiting),
            (RehearsalState::Active, Some(song)) => Ok(Self::Live(song)),
            (RehearsalState::Inactive, Some(song)) => Err(format!(
                "song {} cannot be current while rehearsal is inactive",
                song.id
            )),
        }
    }
}
