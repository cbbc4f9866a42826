//! # jamoveo-core
//!
//! Shared types for the rehearsal coordination service.
//!
//! - [`SessionState`]: the authoritative rehearsal state (`Idle`, `Waiting`, `Live`)
//! - [`SongRef`] / [`SongSummary`]: references to catalog songs
//! - [`Identity`] / [`Role`]: who is connected and what they may do
//! - [`ActionMessage`]: inbound leader instructions
//! - [`SessionError`]: the error taxonomy reported back to a requester
//! - [`frame`]: outbound wire frames

#![deny(unsafe_code)]

pub mod action;
pub mod errors;
pub mod frame;
pub mod identity;
pub mod ids;
pub mod song;
pub mod state;

pub use action::{ActionKind, ActionMessage};
pub use errors::SessionError;
pub use identity::{DEFAULT_INSTRUMENT, Identity, Role};
pub use ids::{ConnectionId, SongId};
pub use song::{SongRef, SongSummary};
pub use state::{Phase, RehearsalState, SessionState};
