//! Session State Machine
//!
//! Owns the single [`GameState`] of a session and is its only writer.
//! Inputs are discrete actions (category selection, ticks, answers,
//! navigation); each returns a [`TransitionResult`] carrying the events the
//! transition produced.
//!
//! ```text
//!   config ──select──▶ memorize ──tick→0──▶ solve ──submit──▶ result
//!     ▲                   ▲                   └──tick→0──────▶   │
//!     │                   └───────────── next ───────────────────┤
//!     └──────────────────────────── change category ─────────────┘
//! ```
//!
//! Transitions that are not legal in the current phase are ignored: they
//! return `applied = false` and leave the state untouched. The one
//! exception is `tick`, which advances the session clock in every phase.

use std::str::FromStr;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::core::rng::{DeterministicRng, derive_session_seed};
use crate::game::category::{CategoryError, MathCategory};
use crate::game::challenge::{ArithmeticGenerator, Challenge, ChallengeError, ChallengeGenerator};
use crate::game::events::{SessionEvent, SessionEventData};
use crate::game::policy::{Outcome, ScoringPolicy, StreakPolicy};
use crate::game::state::{Feedback, GameState, PerformanceRecord, Phase, UserId};
use crate::game::summary::SessionSummary;
use crate::game::transcript::SessionTranscript;
use crate::{
    DEFAULT_MEMORIZE_SECS, DEFAULT_SOLVE_SECS, MAX_DIFFICULTY, MAX_PHASE_SECS, MIN_DIFFICULTY,
};

// =============================================================================
// CONFIG
// =============================================================================

/// Configuration for a challenge session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Memorize countdown (seconds)
    pub memorize_duration: u32,
    /// Solve countdown (seconds)
    pub solve_duration: u32,
    /// Difficulty a fresh session starts at
    pub initial_difficulty: u8,
    /// Reject category selection until a user is signed in
    pub require_sign_in: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memorize_duration: DEFAULT_MEMORIZE_SECS,
            solve_duration: DEFAULT_SOLVE_SECS,
            initial_difficulty: MIN_DIFFICULTY,
            require_sign_in: false,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    ///
    /// Reads `MATHMIND_MEMORIZE_SECS`, `MATHMIND_SOLVE_SECS`,
    /// `MATHMIND_START_DIFFICULTY` and `MATHMIND_REQUIRE_SIGN_IN`. Missing or
    /// unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memorize_duration: env_or("MATHMIND_MEMORIZE_SECS", defaults.memorize_duration),
            solve_duration: env_or("MATHMIND_SOLVE_SECS", defaults.solve_duration),
            initial_difficulty: env_or("MATHMIND_START_DIFFICULTY", defaults.initial_difficulty),
            require_sign_in: std::env::var("MATHMIND_REQUIRE_SIGN_IN")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.require_sign_in),
        }
        .sanitized()
    }

    /// Check that durations are positive and bounded and the difficulty is in range.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(1..=MAX_PHASE_SECS).contains(&self.memorize_duration) {
            return Err(SessionError::InvalidConfig(format!(
                "memorize_duration {} outside 1..={}",
                self.memorize_duration, MAX_PHASE_SECS
            )));
        }
        if !(1..=MAX_PHASE_SECS).contains(&self.solve_duration) {
            return Err(SessionError::InvalidConfig(format!(
                "solve_duration {} outside 1..={}",
                self.solve_duration, MAX_PHASE_SECS
            )));
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.initial_difficulty) {
            return Err(SessionError::DifficultyOutOfRange(self.initial_difficulty));
        }
        Ok(())
    }

    /// Clamp every field into its valid range.
    pub fn sanitized(self) -> Self {
        if let Err(e) = self.validate() {
            warn!("Session config adjusted: {}", e);
        }
        Self {
            memorize_duration: self.memorize_duration.clamp(1, MAX_PHASE_SECS),
            solve_duration: self.solve_duration.clamp(1, MAX_PHASE_SECS),
            initial_difficulty: self.initial_difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
            require_sign_in: self.require_sign_in,
        }
    }

    /// Hash of the rules, for transcripts.
    pub fn hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_config();
        hasher.update_u32(self.memorize_duration);
        hasher.update_u32(self.solve_duration);
        hasher.update_u8(self.initial_difficulty);
        hasher.update_bool(self.require_sign_in);
        hasher.finalize()
    }
}

/// Read and parse an environment variable, warning on garbage.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

// =============================================================================
// ACTIONS / RESULTS / ERRORS
// =============================================================================

/// An input to the state machine, as recorded in transcripts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionAction {
    /// Pick a category and difficulty
    Select { category: MathCategory, difficulty: u8 },
    /// One second elapsed
    Tick,
    /// Answer the current challenge
    Submit { answer: i64 },
    /// Move on to another challenge
    Next,
    /// Leave the category
    ChangeCategory { restart: bool },
    /// A user signed in
    SignIn { user: UserId },
    /// The user signed out
    SignOut,
}

/// Result of applying one action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionResult {
    /// Whether the action changed the session
    pub applied: bool,
    /// Events produced by the action
    pub events: Vec<SessionEvent>,
}

impl TransitionResult {
    /// The action was not legal in the current phase.
    pub fn ignored() -> Self {
        Self::default()
    }

    /// The action was applied.
    pub fn applied(events: Vec<SessionEvent>) -> Self {
        Self { applied: true, events }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Category could not be resolved.
    #[error(transparent)]
    Category(#[from] CategoryError),

    /// Difficulty outside the supported range.
    #[error("difficulty {0} out of range")]
    DifficultyOutOfRange(u8),

    /// The generator could not produce a challenge.
    #[error("challenge generation failed: {0}")]
    Generation(#[from] ChallengeError),

    /// Selection requires a signed-in user.
    #[error("sign in required")]
    SignInRequired,

    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// MACHINE
// =============================================================================

/// The session controller.
pub struct SessionMachine {
    state: GameState,
    config: SessionConfig,
    rng_seed: u64,
    rng: DeterministicRng,
    generator: Box<dyn ChallengeGenerator>,
    policy: Box<dyn ScoringPolicy>,
    pending_events: Vec<SessionEvent>,
    transcript: Option<SessionTranscript>,
}

impl SessionMachine {
    /// Create a machine with the built-in generator and policy.
    pub fn new(config: SessionConfig, rng_seed: u64) -> Self {
        Self::with_components(
            config,
            rng_seed,
            Box::new(ArithmeticGenerator),
            Box::new(StreakPolicy::default()),
        )
    }

    /// Create a machine seeded from a session id and optional user.
    pub fn for_session(config: SessionConfig, session_id: &[u8; 16], user: Option<UserId>) -> Self {
        let seed = derive_session_seed(session_id, user.as_ref().map(UserId::as_bytes));
        let mut machine = Self::new(config, seed);
        machine.state.user = user;
        machine
    }

    /// Create a machine with a custom generator and policy.
    pub fn with_components(
        config: SessionConfig,
        rng_seed: u64,
        generator: Box<dyn ChallengeGenerator>,
        policy: Box<dyn ScoringPolicy>,
    ) -> Self {
        let config = config.sanitized();
        let state = GameState::new(
            config.memorize_duration,
            config.solve_duration,
            config.initial_difficulty,
        );

        Self {
            state,
            config,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            generator,
            policy,
            pending_events: Vec::new(),
            transcript: None,
        }
    }

    /// Start recording every action into a transcript.
    pub fn start_recording(&mut self, session_id: [u8; 16]) {
        self.transcript = Some(SessionTranscript::new(
            session_id,
            self.rng_seed,
            self.config.clone(),
            self.state.user,
        ));
    }

    /// Stop recording and return the transcript stamped with the final hash.
    pub fn finish_recording(&mut self) -> Option<SessionTranscript> {
        let hash = self.compute_hash();
        self.transcript.take().map(|mut t| {
            t.final_hash = Some(hash);
            t
        })
    }

    /// Current state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Owned copy of the current state for observers.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Seed the PRNG started from.
    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    /// Summary of the session so far.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_state(&self.state)
    }

    /// Hash of the full session state, including the PRNG position.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.state.clock, self.rng_seed, |hasher| {
            self.state.hash_into(hasher);
            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);
        })
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Apply a recorded action.
    pub fn apply(&mut self, action: &SessionAction) -> Result<TransitionResult, SessionError> {
        match *action {
            SessionAction::Select { category, difficulty } => self.select_category(category, difficulty),
            SessionAction::Tick => Ok(self.tick()),
            SessionAction::Submit { answer } => Ok(self.submit_answer(answer)),
            SessionAction::Next => Ok(self.next_challenge()),
            SessionAction::ChangeCategory { restart } => Ok(self.change_category(restart)),
            SessionAction::SignIn { user } => Ok(self.sign_in(user)),
            SessionAction::SignOut => Ok(self.sign_out()),
        }
    }

    /// Pick a category by slug. Unknown or unplayable slugs leave the
    /// session untouched.
    pub fn select_category_slug(
        &mut self,
        slug: &str,
        difficulty: u8,
    ) -> Result<TransitionResult, SessionError> {
        let category = MathCategory::from_slug(slug).map_err(|e| {
            warn!("Rejected category selection {:?}: {}", slug, e);
            e
        })?;
        self.select_category(category, difficulty)
    }

    /// `config` → `memorize`.
    pub fn select_category(
        &mut self,
        category: MathCategory,
        difficulty: u8,
    ) -> Result<TransitionResult, SessionError> {
        self.record(SessionAction::Select { category, difficulty });

        if self.state.phase != Phase::Config {
            debug!("Ignoring category selection in {} phase", self.state.phase);
            return Ok(TransitionResult::ignored());
        }
        if self.config.require_sign_in && self.state.user.is_none() {
            return Err(SessionError::SignInRequired);
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            return Err(SessionError::DifficultyOutOfRange(difficulty));
        }

        // Generate before touching state so a failure leaves config intact
        let challenge = self.generator.generate(category, difficulty, &mut self.rng)?;

        self.state.category = category;
        self.state.difficulty = difficulty;
        self.push_event(SessionEventData::CategorySelected { category, difficulty });
        info!("Selected {} at difficulty {}", category, difficulty);

        self.issue_challenge(challenge);
        Ok(TransitionResult::applied(self.take_events()))
    }

    /// Advance the session clock by one second.
    ///
    /// Counts down in timed phases; reaching zero in `memorize` moves to
    /// `solve`, reaching zero in `solve` expires the challenge.
    pub fn tick(&mut self) -> TransitionResult {
        self.record(SessionAction::Tick);
        self.state.clock += 1;

        match self.state.phase {
            Phase::Config | Phase::Result => return TransitionResult::ignored(),
            Phase::Memorize => {
                self.state.remaining_time = self.state.remaining_time.saturating_sub(1);
                if self.state.remaining_time == 0 {
                    self.state.remaining_time = self.state.solve_duration;
                    self.state.start_time = self.state.clock;
                    self.enter_phase(Phase::Solve);
                }
            }
            Phase::Solve => {
                self.state.remaining_time = self.state.remaining_time.saturating_sub(1);
                if self.state.remaining_time == 0 {
                    self.expire();
                }
            }
        }

        TransitionResult::applied(self.take_events())
    }

    /// `solve` → `result` with a judged answer. Ignored in other phases.
    pub fn submit_answer(&mut self, answer: i64) -> TransitionResult {
        self.record(SessionAction::Submit { answer });

        if self.state.phase != Phase::Solve {
            debug!("Ignoring answer {} in {} phase", answer, self.state.phase);
            return TransitionResult::ignored();
        }
        let Some(challenge) = self.state.current_challenge.take() else {
            error!("Solve phase without a challenge, returning to config");
            self.degrade_to_config();
            return TransitionResult::applied(self.take_events());
        };

        let correct = challenge.is_correct(answer);
        let elapsed = self.state.solve_elapsed();
        let difficulty = self.state.difficulty;

        self.state.feedback = if correct { Feedback::Correct } else { Feedback::Incorrect };
        self.state.history.push(PerformanceRecord { correct, time: elapsed, difficulty });
        self.push_event(SessionEventData::AnswerJudged { submitted: answer, correct, time: elapsed });

        if correct {
            let outcome = Outcome {
                correct,
                difficulty,
                elapsed,
                remaining: self.state.remaining_time,
            };
            let reward = self.policy.reward(&outcome);
            if !reward.is_empty() {
                self.state.score = self.state.score.saturating_add(reward.score);
                self.state.coins = self.state.coins.saturating_add(reward.coins);
                self.push_event(SessionEventData::RewardGranted {
                    reward,
                    score: self.state.score,
                    coins: self.state.coins,
                });
            }
        }

        self.adjust_difficulty();
        self.state.remaining_time = 0;
        self.enter_phase(Phase::Result);
        TransitionResult::applied(self.take_events())
    }

    /// `result` → `memorize` with a fresh challenge.
    ///
    /// If the generator fails the session falls back to `config`.
    pub fn next_challenge(&mut self) -> TransitionResult {
        self.record(SessionAction::Next);

        if self.state.phase != Phase::Result {
            debug!("Ignoring next challenge in {} phase", self.state.phase);
            return TransitionResult::ignored();
        }

        match self.generator.generate(self.state.category, self.state.difficulty, &mut self.rng) {
            Ok(challenge) => self.issue_challenge(challenge),
            Err(e) => {
                error!("Could not generate next challenge: {}", e);
                self.degrade_to_config();
            }
        }
        TransitionResult::applied(self.take_events())
    }

    /// `result` → `config`. Counters survive unless `restart` is set.
    pub fn change_category(&mut self, restart: bool) -> TransitionResult {
        self.record(SessionAction::ChangeCategory { restart });

        if self.state.phase != Phase::Result {
            debug!("Ignoring category change in {} phase", self.state.phase);
            return TransitionResult::ignored();
        }

        if restart {
            self.state.score = 0;
            self.state.coins = 0;
            self.state.history.clear();
            self.state.difficulty = self.config.initial_difficulty;
        }
        self.state.feedback = Feedback::None;
        self.push_event(SessionEventData::SessionEnded { restarted: restart });
        self.degrade_to_config();
        TransitionResult::applied(self.take_events())
    }

    /// Attach a signed-in user.
    pub fn sign_in(&mut self, user: UserId) -> TransitionResult {
        self.record(SessionAction::SignIn { user });
        if self.state.user == Some(user) {
            return TransitionResult::ignored();
        }
        self.state.user = Some(user);
        TransitionResult::applied(Vec::new())
    }

    /// Detach the signed-in user. A running challenge continues.
    pub fn sign_out(&mut self) -> TransitionResult {
        self.record(SessionAction::SignOut);
        if self.state.user.take().is_none() {
            return TransitionResult::ignored();
        }
        TransitionResult::applied(Vec::new())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn issue_challenge(&mut self, challenge: Challenge) {
        self.push_event(SessionEventData::ChallengeIssued {
            question: challenge.question().to_string(),
            operator: challenge.operator(),
            difficulty: self.state.difficulty,
        });
        self.state.current_challenge = Some(challenge);
        self.state.feedback = Feedback::None;
        self.state.remaining_time = self.state.memorize_duration;
        self.state.start_time = self.state.clock;
        self.enter_phase(Phase::Memorize);
    }

    fn expire(&mut self) {
        self.state.current_challenge = None;
        self.state.feedback = Feedback::TimeUp;
        let time = self.state.solve_duration;
        self.state.history.push(PerformanceRecord {
            correct: false,
            time,
            difficulty: self.state.difficulty,
        });
        self.push_event(SessionEventData::TimedOut { time });
        self.adjust_difficulty();
        self.enter_phase(Phase::Result);
    }

    /// Let the policy react to the latest record, clamped to the valid range.
    fn adjust_difficulty(&mut self) {
        let current = self.state.difficulty;
        let next = self
            .policy
            .adjust_difficulty(current, &self.state.history)
            .clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        if next != current {
            self.state.difficulty = next;
            self.push_event(SessionEventData::DifficultyChanged { old: current, new: next });
            info!("Difficulty {} -> {}", current, next);
        }
    }

    fn degrade_to_config(&mut self) {
        self.state.current_challenge = None;
        self.state.remaining_time = 0;
        self.enter_phase(Phase::Config);
    }

    fn enter_phase(&mut self, to: Phase) {
        let from = self.state.phase;
        if from == to {
            return;
        }
        self.state.phase = to;
        self.pending_events.push(SessionEvent::phase_changed(self.state.clock, from, to));
        info!("Phase {} -> {} at t={}", from, to, self.state.clock);
    }

    fn push_event(&mut self, data: SessionEventData) {
        self.pending_events.push(SessionEvent::new(self.state.clock, data));
    }

    fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn record(&mut self, action: SessionAction) {
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.actions.push(action);
        }
    }
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("rng_seed", &self.rng_seed)
            .field("recording", &self.transcript.is_some())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
