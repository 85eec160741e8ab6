//! Reward and Difficulty Policy
//!
//! Exact formulas are a parameter of the session. The state machine only
//! relies on the contract: rewards are non-negative and only granted for
//! correct answers, difficulty stays within `[MIN_DIFFICULTY, MAX_DIFFICULTY]`.

use serde::{Serialize, Deserialize};

use crate::game::state::PerformanceRecord;
use crate::{MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Points and coins earned by one answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Score delta
    pub score: u32,
    /// Coin delta
    pub coins: u32,
}

impl Reward {
    /// No reward.
    pub const NONE: Reward = Reward { score: 0, coins: 0 };

    /// Whether this grants anything.
    pub fn is_empty(&self) -> bool {
        self.score == 0 && self.coins == 0
    }
}

/// Facts about a judged answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the answer matched
    pub correct: bool,
    /// Difficulty the challenge was generated at
    pub difficulty: u8,
    /// Seconds spent solving
    pub elapsed: u32,
    /// Seconds left on the countdown
    pub remaining: u32,
}

/// Decides rewards and difficulty changes.
pub trait ScoringPolicy: Send + Sync {
    /// Reward for a judged answer. Only applied when `outcome.correct`.
    fn reward(&self, outcome: &Outcome) -> Reward;

    /// Next difficulty given the history including the latest record.
    fn adjust_difficulty(&self, current: u8, history: &[PerformanceRecord]) -> u8;
}

/// Streak-based default policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakPolicy {
    /// Points per difficulty level for a correct answer
    pub base_points: u32,
    /// Coins per difficulty level for a correct answer
    pub coins_per_level: u32,
    /// Consecutive correct answers needed to level up
    pub promote_after: usize,
    /// Consecutive misses needed to level down
    pub demote_after: usize,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        Self {
            base_points: 10,
            coins_per_level: 1,
            promote_after: 3,
            demote_after: 2,
        }
    }
}

/// Length of the run of identical outcomes at the end of `history`.
///
/// Returns `(correct, len)` for the trailing run, `(false, 0)` when empty.
pub fn trailing_streak(history: &[PerformanceRecord]) -> (bool, usize) {
    match history.last() {
        Some(last) => {
            let len = history.iter().rev().take_while(|r| r.correct == last.correct).count();
            (last.correct, len)
        }
        None => (false, 0),
    }
}

/// Longest run of correct answers anywhere in `history`.
pub fn best_streak(history: &[PerformanceRecord]) -> usize {
    history
        .iter()
        .fold((0usize, 0usize), |(best, run), record| {
            let run = if record.correct { run + 1 } else { 0 };
            (best.max(run), run)
        })
        .0
}

impl ScoringPolicy for StreakPolicy {
    fn reward(&self, outcome: &Outcome) -> Reward {
        if !outcome.correct {
            return Reward::NONE;
        }
        let level = outcome.difficulty as u32;
        Reward {
            score: self.base_points.saturating_mul(level).saturating_add(outcome.remaining),
            coins: self.coins_per_level.saturating_mul(level),
        }
    }

    fn adjust_difficulty(&self, current: u8, history: &[PerformanceRecord]) -> u8 {
        let (correct, len) = trailing_streak(history);

        // Steps on exact multiples of the threshold
        let next = if correct && self.promote_after > 0 && len > 0 && len % self.promote_after == 0 {
            current.saturating_add(1)
        } else if !correct && self.demote_after > 0 && len > 0 && len % self.demote_after == 0 {
            current.saturating_sub(1)
        } else {
            current
        };

        next.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }
}
