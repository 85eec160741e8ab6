//! Runtime Module
//!
//! Collaborators around the deterministic core: the real-time driver that
//! feeds ticks and fans out events, sound cues, and sign-in. Nothing in
//! `game/` depends on this module.

pub mod driver;
pub mod audio;
pub mod auth;

pub use driver::{spawn_session, SessionHandle, SessionReport, DriverError, TICK_PERIOD};
pub use audio::{AudioOutput, AudioSink, SoundCue, LogSink, SilentSink};
pub use auth::{AuthConfig, AuthError, IdTokenVerifier, SignInFailure, UserIdentity};
