//! Session Summary
//!
//! Aggregate statistics shown when the player leaves a category.

use serde::{Serialize, Deserialize};

use crate::game::category::MathCategory;
use crate::game::policy::best_streak;
use crate::game::state::{GameState, PerformanceRecord};

/// Aggregated results of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Last selected category
    pub category: MathCategory,
    /// Completed challenges
    pub attempts: u32,
    /// Correct answers
    pub correct: u32,
    /// Wrong answers
    pub incorrect: u32,
    /// Expired countdowns
    pub timeups: u32,
    /// Correct share, whole percent (0 with no attempts)
    pub accuracy_percent: u32,
    /// Mean solve time of correct answers (seconds)
    pub average_correct_time: Option<u32>,
    /// Fastest correct answer (seconds)
    pub fastest_correct_time: Option<u32>,
    /// Longest run of correct answers
    pub best_streak: u32,
    /// Final score
    pub score: u32,
    /// Final coins
    pub coins: u32,
    /// Final difficulty
    pub difficulty: u8,
}

impl SessionSummary {
    /// Summarize a session state.
    pub fn from_state(state: &GameState) -> Self {
        let mut summary = Self::from_history(&state.history, state.solve_duration);
        summary.category = state.category;
        summary.score = state.score;
        summary.coins = state.coins;
        summary.difficulty = state.difficulty;
        summary
    }

    /// Summarize a history alone.
    ///
    /// Timeups are misses recorded with the full solve duration; a miss
    /// at exactly `solve_duration` is counted as a timeup.
    pub fn from_history(history: &[PerformanceRecord], solve_duration: u32) -> Self {
        let attempts = history.len() as u32;
        let correct_times: Vec<u32> = history.iter().filter(|r| r.correct).map(|r| r.time).collect();
        let correct = correct_times.len() as u32;
        let timeups = history
            .iter()
            .filter(|r| !r.correct && r.time >= solve_duration)
            .count() as u32;

        let accuracy_percent = if attempts == 0 { 0 } else { correct * 100 / attempts };
        let average_correct_time = if correct_times.is_empty() {
            None
        } else {
            let total: u64 = correct_times.iter().map(|t| *t as u64).sum();
            Some((total / correct_times.len() as u64) as u32)
        };

        Self {
            attempts,
            correct,
            incorrect: attempts - correct - timeups,
            timeups,
            accuracy_percent,
            average_correct_time,
            fastest_correct_time: correct_times.iter().copied().min(),
            best_streak: best_streak(history) as u32,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(correct: bool, time: u32) -> PerformanceRecord {
        PerformanceRecord { correct, time, difficulty: 1 }
    }

    #[test]
    fn test_empty_history() {
        let summary = SessionSummary::from_history(&[], 10);
        assert_eq!(summary.attempts, 0);
        assert_eq!(summary.accuracy_percent, 0);
        assert_eq!(summary.average_correct_time, None);
        assert_eq!(summary.fastest_correct_time, None);
    }

    #[test]
    fn test_mixed_history() {
        let history = [
            record(true, 4),
            record(true, 6),
            record(false, 3),
            record(false, 10),
            record(true, 2),
        ];
        let summary = SessionSummary::from_history(&history, 10);

        assert_eq!(summary.attempts, 5);
        assert_eq!(summary.correct, 3);
        assert_eq!(summary.incorrect, 1);
        assert_eq!(summary.timeups, 1);
        assert_eq!(summary.accuracy_percent, 60);
        assert_eq!(summary.average_correct_time, Some(4));
        assert_eq!(summary.fastest_correct_time, Some(2));
        assert_eq!(summary.best_streak, 2);
    }

    #[test]
    fn test_from_state_copies_counters() {
        let mut state = GameState::new(5, 10, 3);
        state.category = MathCategory::Division;
        state.score = 120;
        state.coins = 9;
        state.history.push(record(true, 5));

        let summary = SessionSummary::from_state(&state);
        assert_eq!(summary.category, MathCategory::Division);
        assert_eq!(summary.score, 120);
        assert_eq!(summary.coins, 9);
        assert_eq!(summary.difficulty, 3);
        assert_eq!(summary.correct, 1);
    }
}
