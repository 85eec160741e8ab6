//! # MathMind Session Engine
//!
//! Deterministic challenge-session core for MathMind memory math drills:
//! pick a category, memorize a challenge, solve it against the clock, and
//! collect score and coins.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MATHMIND ENGINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                 │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                 │
//! │  └── hash.rs     - State hashing for replay verification    │
//! │                                                             │
//! │  game/           - Session logic (deterministic)            │
//! │  ├── category.rs - Topics and picker catalog                │
//! │  ├── challenge.rs- Operators and challenge generation       │
//! │  ├── state.rs    - GameState, phases, records               │
//! │  ├── policy.rs   - Reward and difficulty rules              │
//! │  ├── machine.rs  - Session state machine                    │
//! │  ├── events.rs   - Transition events                        │
//! │  ├── summary.rs  - Session statistics                       │
//! │  └── transcript.rs - Recording and replay                   │
//! │                                                             │
//! │  runtime/        - Collaborators (non-deterministic)        │
//! │  ├── driver.rs   - Async tick loop and observers            │
//! │  ├── audio.rs    - Sound cues                               │
//! │  └── auth.rs     - ID token validation, sign-in errors      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules never read the wall clock and use
//! integers only. Time advances through explicit tick actions and all
//! randomness comes from a seeded PRNG, so a recorded action list replays
//! to an identical state hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod runtime;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::machine::{SessionMachine, SessionConfig, SessionAction, SessionError};
pub use game::state::{GameState, Phase, Feedback, PerformanceRecord, UserId};
pub use game::category::MathCategory;
pub use game::challenge::{Challenge, OperatorSymbol};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lowest difficulty level
pub const MIN_DIFFICULTY: u8 = 1;

/// Highest difficulty level
pub const MAX_DIFFICULTY: u8 = 10;

/// Default memorize countdown (seconds)
pub const DEFAULT_MEMORIZE_SECS: u32 = 5;

/// Default solve countdown (seconds)
pub const DEFAULT_SOLVE_SECS: u32 = 10;

/// Upper bound for either countdown (seconds)
pub const MAX_PHASE_SECS: u32 = 600;
