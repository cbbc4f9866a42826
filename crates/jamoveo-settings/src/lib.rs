//! # jamoveo-settings
//!
//! Configuration for the rehearsal service.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`JamoveoSettings::default()`]
//! 2. **User file**: `~/.jamoveo/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `JAMOVEO_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, jamoveo_home, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
