//! Session Driver
//!
//! Runs a [`SessionMachine`] on a tokio task. Commands arrive over an mpsc
//! channel, a one-second interval supplies ticks while a countdown runs,
//! and every applied transition is published to observers:
//!
//! - a `watch` channel holding the latest [`GameState`] snapshot
//! - a `broadcast` channel of [`SessionEvent`]s
//! - the [`AudioOutput`]
//!
//! The select loop is biased toward commands, so an answer already queued
//! when a tick fires is judged before the tick is applied.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::category::MathCategory;
use crate::game::events::SessionEvent;
use crate::game::machine::{SessionAction, SessionError, SessionMachine, TransitionResult};
use crate::game::state::{GameState, Phase, UserId};
use crate::game::summary::SessionSummary;
use crate::game::transcript::SessionTranscript;
use crate::runtime::audio::AudioOutput;

/// Real-time length of one session tick.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

type Reply = oneshot::Sender<Result<TransitionResult, SessionError>>;

/// Messages accepted by the driver task.
#[derive(Debug)]
pub enum Command {
    /// Select a category by picker slug.
    SelectSlug {
        /// Picker slug
        slug: String,
        /// Requested difficulty
        difficulty: u8,
        /// Outcome
        reply: Reply,
    },
    /// Apply a machine action.
    Apply {
        /// The action
        action: SessionAction,
        /// Outcome
        reply: Reply,
    },
    /// Stop the session.
    Shutdown,
}

/// Driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver task has stopped.
    #[error("session driver closed")]
    Closed,
    /// The machine rejected the command.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The driver task panicked or was cancelled.
    #[error("session driver failed: {0}")]
    Join(String),
}

/// What a finished session leaves behind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionReport {
    /// Final statistics
    pub summary: SessionSummary,
    /// Transcript, if the machine was recording
    pub transcript: Option<SessionTranscript>,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub finished_at: DateTime<Utc>,
}

/// Client side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<GameState>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<SessionReport>,
    started_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Latest published state.
    pub fn state(&self) -> GameState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<GameState> {
        self.state.clone()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// When the driver started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Pick a category by slug.
    pub async fn select_slug(&self, slug: &str, difficulty: u8) -> Result<TransitionResult, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SelectSlug { slug: slug.to_string(), difficulty, reply }).await?;
        Ok(rx.await.map_err(|_| DriverError::Closed)??)
    }

    /// Pick a category.
    pub async fn select(&self, category: MathCategory, difficulty: u8) -> Result<TransitionResult, DriverError> {
        self.apply(SessionAction::Select { category, difficulty }).await
    }

    /// Answer the current challenge.
    pub async fn submit(&self, answer: i64) -> Result<TransitionResult, DriverError> {
        self.apply(SessionAction::Submit { answer }).await
    }

    /// Move on to the next challenge.
    pub async fn next(&self) -> Result<TransitionResult, DriverError> {
        self.apply(SessionAction::Next).await
    }

    /// Leave the category.
    pub async fn change_category(&self, restart: bool) -> Result<TransitionResult, DriverError> {
        self.apply(SessionAction::ChangeCategory { restart }).await
    }

    /// Attach a signed-in user.
    pub async fn sign_in(&self, user: UserId) -> Result<TransitionResult, DriverError> {
        self.apply(SessionAction::SignIn { user }).await
    }

    /// Detach the signed-in user.
    pub async fn sign_out(&self) -> Result<TransitionResult, DriverError> {
        self.apply(SessionAction::SignOut).await
    }

    /// Apply any machine action.
    pub async fn apply(&self, action: SessionAction) -> Result<TransitionResult, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Apply { action, reply }).await?;
        Ok(rx.await.map_err(|_| DriverError::Closed)??)
    }

    /// Stop the session and collect its report.
    pub async fn shutdown(self) -> Result<SessionReport, DriverError> {
        // An already stopped driver still yields its report
        let _ = self.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|e| DriverError::Join(e.to_string()))
    }

    async fn send(&self, command: Command) -> Result<(), DriverError> {
        self.commands.send(command).await.map_err(|_| DriverError::Closed)
    }
}

/// Start driving `machine` on the current tokio runtime.
pub fn spawn_session(machine: SessionMachine, audio: AudioOutput, tick_period: Duration) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(machine.snapshot());
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
    let started_at = Utc::now();

    let mut ticker = interval_at(Instant::now() + tick_period, tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let driver = SessionDriver {
        machine,
        audio,
        commands: command_rx,
        state_tx,
        event_tx: event_tx.clone(),
        ticker,
    };
    info!("Session driver started (tick every {:?})", tick_period);
    let task = tokio::spawn(driver.run(started_at));

    SessionHandle {
        commands: command_tx,
        state: state_rx,
        events: event_tx,
        task,
        started_at,
    }
}

struct SessionDriver {
    machine: SessionMachine,
    audio: AudioOutput,
    commands: mpsc::Receiver<Command>,
    state_tx: watch::Sender<GameState>,
    event_tx: broadcast::Sender<SessionEvent>,
    ticker: Interval,
}

impl SessionDriver {
    async fn run(mut self, started_at: DateTime<Utc>) -> SessionReport {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::SelectSlug { slug, difficulty, reply }) => {
                        let result = self.machine.select_category_slug(&slug, difficulty);
                        self.respond(result, reply);
                    }
                    Some(Command::Apply { action, reply }) => {
                        let result = self.machine.apply(&action);
                        self.respond(result, reply);
                    }
                    Some(Command::Shutdown) | None => break,
                },

                _ = self.ticker.tick() => {
                    // Idle phases have no countdown to advance
                    if self.machine.state().phase.is_timed() {
                        let result = self.machine.tick();
                        self.publish(&result);
                    }
                }
            }
        }

        let summary = self.machine.summary();
        info!(
            "Session finished: {} correct of {}, score {}",
            summary.correct, summary.attempts, summary.score
        );
        SessionReport {
            summary,
            transcript: self.machine.finish_recording(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn respond(&mut self, result: Result<TransitionResult, SessionError>, reply: Reply) {
        match &result {
            Ok(transition) => self.publish(transition),
            Err(e) => warn!("Command rejected: {}", e),
        }
        if reply.send(result).is_err() {
            debug!("Command issuer went away before the reply");
        }
    }

    fn publish(&mut self, result: &TransitionResult) {
        if !result.applied {
            return;
        }

        for event in &result.events {
            self.audio.handle_event(event);
            // No subscribers is fine
            let _ = self.event_tx.send(event.clone());
        }
        self.state_tx.send_replace(self.machine.snapshot());

        if result
            .events
            .iter()
            .any(|e| e.enters(Phase::Memorize) || e.enters(Phase::Solve))
        {
            self.ticker.reset();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::game::events::SessionEventData;
    use crate::game::machine::SessionConfig;
    use crate::game::state::Feedback;
    use crate::runtime::audio::{AudioError, AudioSink, SoundCue};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<SoundCue>>>);

    impl AudioSink for SharedSink {
        fn play(&mut self, cue: SoundCue) -> Result<(), AudioError> {
            self.0.lock().unwrap().push(cue);
            Ok(())
        }
    }

    fn spawn(config: SessionConfig) -> SessionHandle {
        let machine = SessionMachine::new(config, 77);
        spawn_session(machine, AudioOutput::silent(), TICK_PERIOD)
    }

    fn current_answer(handle: &SessionHandle) -> i64 {
        handle.state().current_challenge.as_ref().unwrap().answer()
    }

    async fn wait_secs(secs: f64) {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdowns_follow_the_timer() {
        let handle = spawn(SessionConfig::default());

        handle.select(MathCategory::Addition, 1).await.unwrap();
        assert_eq!(handle.state().phase, Phase::Memorize);

        wait_secs(2.5).await;
        assert_eq!(handle.state().remaining_time, 3);

        wait_secs(3.0).await;
        let state = handle.state();
        assert_eq!(state.phase, Phase::Solve);
        assert_eq!(state.remaining_time, state.solve_duration);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_before_expiry() {
        let sink = SharedSink::default();
        let played = sink.0.clone();
        let machine = SessionMachine::new(SessionConfig::default(), 5);
        let handle = spawn_session(machine, AudioOutput::new(Box::new(sink)), TICK_PERIOD);

        handle.select(MathCategory::Multiplication, 2).await.unwrap();
        wait_secs(7.5).await;

        let result = handle.submit(current_answer(&handle)).await.unwrap();
        assert!(result.applied);

        let state = handle.state();
        assert_eq!(state.phase, Phase::Result);
        assert_eq!(state.feedback, Feedback::Correct);
        assert_eq!(state.history[0].time, 2);

        let report = handle.shutdown().await.unwrap();
        assert_eq!(report.summary.correct, 1);
        assert!(report.summary.score > 0);
        assert_eq!(
            *played.lock().unwrap(),
            vec![SoundCue::Click, SoundCue::Flash, SoundCue::Correct]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_solve_expiry_publishes_timeout() {
        let handle = spawn(SessionConfig::default());
        let mut events = handle.subscribe();

        handle.select(MathCategory::Subtraction, 1).await.unwrap();
        wait_secs(15.5).await;

        let state = handle.state();
        assert_eq!(state.phase, Phase::Result);
        assert_eq!(state.feedback, Feedback::TimeUp);

        let mut timed_out = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEventData::TimedOut { time } = event.data {
                assert_eq!(time, 10);
                timed_out = true;
            }
        }
        assert!(timed_out);

        // Result phase is idle; the clock stops with the countdown
        let clock = handle.state().clock;
        wait_secs(5.0).await;
        assert_eq!(handle.state().clock, clock);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_restarts_full_memorize_window() {
        let handle = spawn(SessionConfig::default());

        handle.select(MathCategory::Addition, 1).await.unwrap();
        wait_secs(5.5).await;
        handle.submit(current_answer(&handle)).await.unwrap();

        // Next lands mid-interval; the reset keeps the first second whole
        wait_secs(0.25).await;
        handle.next().await.unwrap();
        wait_secs(0.9).await;
        assert_eq!(handle.state().remaining_time, 5);
        wait_secs(0.2).await;
        assert_eq!(handle.state().remaining_time, 4);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_surface_as_errors() {
        let config = SessionConfig { require_sign_in: true, ..Default::default() };
        let handle = spawn(config);

        assert!(matches!(
            handle.select_slug("volume-cube", 1).await,
            Err(DriverError::Session(SessionError::Category(_)))
        ));
        assert!(matches!(
            handle.select(MathCategory::Addition, 1).await,
            Err(DriverError::Session(SessionError::SignInRequired))
        ));

        handle.sign_in(UserId::new([1; 16])).await.unwrap();
        assert!(handle.select_slug("addition", 1).await.unwrap().applied);
        assert_eq!(handle.state().phase, Phase::Memorize);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_carries_transcript() {
        let mut machine = SessionMachine::for_session(SessionConfig::default(), &[6; 16], None);
        machine.start_recording([6; 16]);
        let handle = spawn_session(machine, AudioOutput::silent(), TICK_PERIOD);

        handle.select(MathCategory::Exponents, 3).await.unwrap();
        wait_secs(6.5).await;
        handle.submit(current_answer(&handle)).await.unwrap();
        handle.change_category(false).await.unwrap();

        let report = handle.shutdown().await.unwrap();
        let transcript = report.transcript.unwrap();
        assert!(transcript.verify().is_ok());
        assert_eq!(report.summary.attempts, 1);
        assert!(report.finished_at >= report.started_at);
    }
}
