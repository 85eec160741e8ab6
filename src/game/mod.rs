//! Game Logic Module
//!
//! All session logic. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `category`: Playable topics and the picker catalog
//! - `challenge`: Operators, challenges, challenge generation
//! - `state`: Session state, phases, performance records
//! - `policy`: Reward and difficulty rules
//! - `machine`: The session state machine
//! - `events`: Transition events for observers
//! - `summary`: End-of-category statistics
//! - `transcript`: Action recording and replay verification

pub mod category;
pub mod challenge;
pub mod state;
pub mod policy;
pub mod machine;
pub mod events;
pub mod summary;
pub mod transcript;

// Re-export key types
pub use category::{MathCategory, CategoryError};
pub use challenge::{Challenge, ChallengeGenerator, ArithmeticGenerator, OperatorSymbol};
pub use state::{GameState, Phase, Feedback, PerformanceRecord, UserId};
pub use policy::{ScoringPolicy, StreakPolicy, Reward};
pub use machine::{SessionMachine, SessionConfig, SessionAction, SessionError, TransitionResult};
pub use events::{SessionEvent, SessionEventData};
pub use summary::SessionSummary;
pub use transcript::SessionTranscript;
