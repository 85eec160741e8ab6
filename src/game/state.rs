//! Session State Definitions
//!
//! `GameState` is the aggregate root of a challenge session. It is only ever
//! mutated by [`SessionMachine`](crate::game::machine::SessionMachine);
//! everyone else reads snapshots.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::game::category::MathCategory;
use crate::game::challenge::Challenge;

// =============================================================================
// USER ID
// =============================================================================

/// Signed-in user identifier (16 bytes, derived from the auth subject).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct UserId(pub [u8; 16]);

impl UserId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// =============================================================================
// PHASE / FEEDBACK
// =============================================================================

/// Session phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
#[derive(Default)]
pub enum Phase {
    /// Picking a category and difficulty
    #[default]
    Config = 0,
    /// Challenge visible, countdown running
    Memorize = 1,
    /// Operands hidden, waiting for an answer
    Solve = 2,
    /// Outcome shown
    Result = 3,
}

impl Phase {
    /// Whether the phase runs a countdown.
    pub fn is_timed(self) -> bool {
        matches!(self, Phase::Memorize | Phase::Solve)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Config => "config",
            Phase::Memorize => "memorize",
            Phase::Solve => "solve",
            Phase::Result => "result",
        };
        f.write_str(name)
    }
}

/// Outcome of the last challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
#[derive(Default)]
pub enum Feedback {
    /// No outcome yet for the current challenge
    #[default]
    None = 0,
    /// Answer matched
    Correct = 1,
    /// Answer did not match
    Incorrect = 2,
    /// Solve countdown expired
    #[serde(rename = "timeup")]
    TimeUp = 3,
}

// =============================================================================
// PERFORMANCE RECORD
// =============================================================================

/// One completed challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Whether the answer was correct
    pub correct: bool,
    /// Seconds spent in the solve phase
    pub time: u32,
    /// Difficulty the challenge was generated at
    pub difficulty: u8,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete state of a challenge session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Current phase
    pub phase: Phase,

    /// Selected topic
    pub category: MathCategory,

    /// Current difficulty level
    pub difficulty: u8,

    /// Accumulated score
    pub score: u32,

    /// Accumulated coins
    pub coins: u32,

    /// Active challenge (only in memorize and solve)
    pub current_challenge: Option<Challenge>,

    /// Session clock value when the current timed phase began
    pub start_time: u64,

    /// Completed challenges, oldest first
    pub history: Vec<PerformanceRecord>,

    /// Last outcome
    pub feedback: Feedback,

    /// Seconds left in the current timed phase
    pub remaining_time: u32,

    /// Memorize countdown length (seconds)
    pub memorize_duration: u32,

    /// Solve countdown length (seconds)
    pub solve_duration: u32,

    /// Session clock: ticks since the session was created
    pub clock: u64,

    /// Signed-in user, if any
    pub user: Option<UserId>,
}

impl GameState {
    /// Create a fresh session state in the config phase.
    pub fn new(memorize_duration: u32, solve_duration: u32, difficulty: u8) -> Self {
        Self {
            phase: Phase::Config,
            category: MathCategory::default(),
            difficulty,
            score: 0,
            coins: 0,
            current_challenge: None,
            start_time: 0,
            history: Vec::new(),
            feedback: Feedback::None,
            remaining_time: 0,
            memorize_duration,
            solve_duration,
            clock: 0,
            user: None,
        }
    }

    /// Check the phase/challenge/countdown invariant.
    ///
    /// A challenge is present exactly in memorize and solve, and the
    /// countdown never exceeds the active phase's duration.
    pub fn is_consistent(&self) -> bool {
        let challenge_ok = self.current_challenge.is_some() == self.phase.is_timed();
        let countdown_ok = match self.phase {
            Phase::Memorize => self.remaining_time <= self.memorize_duration,
            Phase::Solve => self.remaining_time <= self.solve_duration,
            Phase::Config | Phase::Result => true,
        };
        challenge_ok && countdown_ok
    }

    /// Seconds spent so far in the solve phase.
    pub fn solve_elapsed(&self) -> u32 {
        self.solve_duration.saturating_sub(self.remaining_time)
    }

    /// Most recent record.
    pub fn last_record(&self) -> Option<&PerformanceRecord> {
        self.history.last()
    }

    /// Feed every field into a state hasher, in a fixed order.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.phase as u8);
        hasher.update_u8(self.category as u8);
        hasher.update_u8(self.difficulty);
        hasher.update_u32(self.score);
        hasher.update_u32(self.coins);

        match &self.current_challenge {
            Some(challenge) => {
                hasher.update_bool(true);
                hasher.update_u8(challenge.operator() as u8);
                hasher.update_u32(challenge.numbers().len() as u32);
                for n in challenge.numbers() {
                    hasher.update_i64(*n);
                }
                hasher.update_str(challenge.question());
                hasher.update_i64(challenge.answer());
            }
            None => hasher.update_bool(false),
        }

        hasher.update_u64(self.start_time);
        hasher.update_u32(self.history.len() as u32);
        for record in &self.history {
            hasher.update_bool(record.correct);
            hasher.update_u32(record.time);
            hasher.update_u8(record.difficulty);
        }

        hasher.update_u8(self.feedback as u8);
        hasher.update_u32(self.remaining_time);
        hasher.update_u32(self.memorize_duration);
        hasher.update_u32(self.solve_duration);

        match &self.user {
            Some(user) => {
                hasher.update_bool(true);
                hasher.update_uuid(user.as_bytes());
            }
            None => hasher.update_bool(false),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
