//! Sound Cues
//!
//! Maps session events to short sound effects and plays them through a
//! pluggable sink. Playback failures are logged and swallowed; they never
//! reach the session.

use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::game::events::{SessionEvent, SessionEventData};

/// Fallback tone for cues without a dedicated asset.
pub const DEFAULT_TONE_URL: &str = "https://files.catbox.moe/p7zmwi.wav";

/// A named sound effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    /// UI selection
    Click,
    /// Correct answer
    Correct,
    /// Wrong answer
    Incorrect,
    /// Solve countdown expired
    Timeup,
    /// Session summary shown
    Summary,
    /// Challenge flashed on screen
    Flash,
}

impl SoundCue {
    /// Every cue.
    pub const ALL: [SoundCue; 6] = [
        SoundCue::Click,
        SoundCue::Correct,
        SoundCue::Incorrect,
        SoundCue::Timeup,
        SoundCue::Summary,
        SoundCue::Flash,
    ];

    /// Cue name.
    pub const fn name(self) -> &'static str {
        match self {
            SoundCue::Click => "click",
            SoundCue::Correct => "correct",
            SoundCue::Incorrect => "incorrect",
            SoundCue::Timeup => "timeup",
            SoundCue::Summary => "summary",
            SoundCue::Flash => "flash",
        }
    }

    /// Asset to load for this cue.
    pub const fn asset_url(self) -> &'static str {
        match self {
            SoundCue::Click => "https://files.catbox.moe/dw2po2.wav",
            SoundCue::Correct => "https://files.catbox.moe/3a4v3b.wav",
            SoundCue::Incorrect => DEFAULT_TONE_URL,
            SoundCue::Timeup => "https://files.catbox.moe/2k30ep.wav",
            SoundCue::Summary => "https://files.catbox.moe/2vjgnw.wav",
            SoundCue::Flash => "https://files.catbox.moe/41zoqv.wav",
        }
    }
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cue for a session event, if it has one.
pub fn cue_for_event(event: &SessionEvent) -> Option<SoundCue> {
    match &event.data {
        SessionEventData::CategorySelected { .. } => Some(SoundCue::Click),
        SessionEventData::ChallengeIssued { .. } => Some(SoundCue::Flash),
        SessionEventData::AnswerJudged { correct: true, .. } => Some(SoundCue::Correct),
        SessionEventData::AnswerJudged { correct: false, .. } => Some(SoundCue::Incorrect),
        SessionEventData::TimedOut { .. } => Some(SoundCue::Timeup),
        SessionEventData::SessionEnded { .. } => Some(SoundCue::Summary),
        SessionEventData::PhaseChanged { .. }
        | SessionEventData::RewardGranted { .. }
        | SessionEventData::DifficultyChanged { .. } => None,
    }
}

/// Playback errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// The platform refused playback (e.g. autoplay before user interaction).
    #[error("playback blocked")]
    Blocked,
    /// The asset could not be loaded.
    #[error("asset unavailable: {0}")]
    Unavailable(String),
    /// The output device failed.
    #[error("device error: {0}")]
    Device(String),
}

/// Something that can play a cue.
pub trait AudioSink: Send {
    /// Play `cue` from the start.
    fn play(&mut self, cue: SoundCue) -> Result<(), AudioError>;
}

/// Sink that logs cues instead of playing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl AudioSink for LogSink {
    fn play(&mut self, cue: SoundCue) -> Result<(), AudioError> {
        info!("♪ {} ({})", cue, cue.asset_url());
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn play(&mut self, _cue: SoundCue) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Error-swallowing front for an [`AudioSink`].
pub struct AudioOutput {
    sink: Box<dyn AudioSink>,
    muted: bool,
    played: u64,
    failed: u64,
}

impl AudioOutput {
    /// Wrap a sink.
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            muted: false,
            played: 0,
            failed: 0,
        }
    }

    /// Output that never plays anything.
    pub fn silent() -> Self {
        Self::new(Box::new(SilentSink))
    }

    /// Mute or unmute.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Play a cue. Never fails.
    pub fn play(&mut self, cue: SoundCue) {
        if self.muted {
            return;
        }
        match self.sink.play(cue) {
            Ok(()) => self.played += 1,
            Err(AudioError::Blocked) => {
                self.failed += 1;
                debug!("Sound '{}' blocked", cue);
            }
            Err(e) => {
                self.failed += 1;
                error!("Error playing sound '{}': {}", cue, e);
            }
        }
    }

    /// Play the cue for an event, if any.
    pub fn handle_event(&mut self, event: &SessionEvent) {
        if let Some(cue) = cue_for_event(event) {
            self.play(cue);
        }
    }

    /// Cues played successfully.
    pub fn played(&self) -> u64 {
        self.played
    }

    /// Cues that failed.
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl fmt::Debug for AudioOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioOutput")
            .field("muted", &self.muted)
            .field("played", &self.played)
            .field("failed", &self.failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::game::state::Phase;

    /// Records cues and fails on demand.
    #[derive(Clone, Default)]
    struct RecordingSink {
        played: Arc<Mutex<Vec<SoundCue>>>,
        fail_with: Option<AudioError>,
    }

    impl AudioSink for RecordingSink {
        fn play(&mut self, cue: SoundCue) -> Result<(), AudioError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.played.lock().unwrap().push(cue);
            Ok(())
        }
    }

    #[test]
    fn test_cue_mapping() {
        let judged = |correct| SessionEvent::new(1, SessionEventData::AnswerJudged {
            submitted: 4,
            correct,
            time: 2,
        });

        assert_eq!(cue_for_event(&judged(true)), Some(SoundCue::Correct));
        assert_eq!(cue_for_event(&judged(false)), Some(SoundCue::Incorrect));
        assert_eq!(
            cue_for_event(&SessionEvent::new(1, SessionEventData::TimedOut { time: 10 })),
            Some(SoundCue::Timeup)
        );
        assert_eq!(
            cue_for_event(&SessionEvent::phase_changed(1, Phase::Memorize, Phase::Solve)),
            None
        );
    }

    #[test]
    fn test_asset_table() {
        assert_eq!(SoundCue::Incorrect.asset_url(), DEFAULT_TONE_URL);
        for cue in SoundCue::ALL {
            assert!(cue.asset_url().ends_with(".wav"));
        }
    }

    #[test]
    fn test_output_plays_through_sink() {
        let sink = RecordingSink::default();
        let played = sink.played.clone();
        let mut output = AudioOutput::new(Box::new(sink));

        output.play(SoundCue::Click);
        output.handle_event(&SessionEvent::new(0, SessionEventData::SessionEnded { restarted: false }));

        assert_eq!(*played.lock().unwrap(), vec![SoundCue::Click, SoundCue::Summary]);
        assert_eq!(output.played(), 2);
    }

    #[test]
    fn test_failures_are_swallowed() {
        for err in [AudioError::Blocked, AudioError::Device("gone".into())] {
            let sink = RecordingSink { fail_with: Some(err), ..Default::default() };
            let mut output = AudioOutput::new(Box::new(sink));

            output.play(SoundCue::Flash);
            output.play(SoundCue::Correct);

            assert_eq!(output.played(), 0);
            assert_eq!(output.failed(), 2);
        }
    }

    #[test]
    fn test_muted_output_skips_sink() {
        let sink = RecordingSink::default();
        let played = sink.played.clone();
        let mut output = AudioOutput::new(Box::new(sink));
        output.set_muted(true);

        output.play(SoundCue::Click);

        assert!(played.lock().unwrap().is_empty());
        assert_eq!(output.played(), 0);
    }
}
