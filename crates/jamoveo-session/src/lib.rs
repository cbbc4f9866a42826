//! # jamoveo-session
//!
//! The rehearsal coordination core.
//!
//! - [`SessionStore`]: the one authoritative [`SessionState`](jamoveo_core::SessionState)
//! - [`machine`]: pure transition rules
//! - [`ActionRouter`]: authorizes leader actions and commits their results
//! - [`ConnectionRegistry`]: admitted observers and their outbound queues
//! - [`Broadcaster`]: snapshot fan-out
//! - [`SessionService`]: the task that serializes all of the above
//!
//! Transport code only talks to a [`SessionHandle`].

#![deny(unsafe_code)]

pub mod broadcast;
pub mod machine;
pub mod registry;
pub mod router;
pub mod service;
pub mod store;

pub use broadcast::Broadcaster;
pub use registry::{Connection, ConnectionRegistry, Frame, RegistryError};
pub use router::ActionRouter;
pub use service::{
    Admission, EvictReason, ServiceConfig, ServiceError, SessionHandle, SessionService,
};
pub use store::{Commit, SessionStore};
