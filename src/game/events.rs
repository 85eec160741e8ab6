//! Session Events
//!
//! Emitted by every applied transition. Observers (display, audio,
//! transcripts) consume these; the state machine never calls out directly.

use serde::{Serialize, Deserialize};

use crate::game::category::MathCategory;
use crate::game::challenge::OperatorSymbol;
use crate::game::policy::Reward;
use crate::game::state::Phase;

/// Session event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventData {
    /// A category and difficulty were picked
    CategorySelected {
        category: MathCategory,
        difficulty: u8,
    },

    /// A new challenge is on screen
    ChallengeIssued {
        question: String,
        operator: OperatorSymbol,
        difficulty: u8,
    },

    /// Phase changed
    PhaseChanged {
        from: Phase,
        to: Phase,
    },

    /// An answer was judged
    AnswerJudged {
        submitted: i64,
        correct: bool,
        time: u32,
    },

    /// The solve countdown expired
    TimedOut {
        time: u32,
    },

    /// Score and coins were credited
    RewardGranted {
        reward: Reward,
        score: u32,
        coins: u32,
    },

    /// Difficulty moved
    DifficultyChanged {
        old: u8,
        new: u8,
    },

    /// Left the category; counters cleared when `restarted`
    SessionEnded {
        restarted: bool,
    },
}

/// A session event stamped with the session clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Session clock when the event occurred
    pub clock: u64,

    /// Event data
    pub data: SessionEventData,
}

impl SessionEvent {
    /// Create a new event.
    pub fn new(clock: u64, data: SessionEventData) -> Self {
        Self { clock, data }
    }

    /// Create phase changed event.
    pub fn phase_changed(clock: u64, from: Phase, to: Phase) -> Self {
        Self::new(clock, SessionEventData::PhaseChanged { from, to })
    }

    /// Whether this event changed the phase to `phase`.
    pub fn enters(&self, phase: Phase) -> bool {
        matches!(self.data, SessionEventData::PhaseChanged { to, .. } if to == phase)
    }
}
