//! Session Transcript Recording
//!
//! Records everything needed to rebuild a session: seed, rules, the signed-in
//! user at creation, and the ordered actions. Replaying a transcript with the
//! built-in generator and policy must land on the recorded final hash.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::hash::StateHash;
use crate::game::machine::{SessionAction, SessionConfig, SessionMachine};
use crate::game::state::UserId;

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// Complete session transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTranscript {
    /// Version for forward compatibility.
    pub version: u8,

    /// Session identifier (UUID bytes).
    pub session_id: [u8; 16],

    /// PRNG seed the session started from.
    pub rng_seed: u64,

    /// Session rules.
    pub config: SessionConfig,

    /// User signed in when recording started.
    pub initial_user: Option<UserId>,

    /// Every action, in application order.
    pub actions: Vec<SessionAction>,

    /// Hash of the state when recording stopped.
    pub final_hash: Option<StateHash>,
}

/// Transcript errors.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Bytes could not be decoded.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Transcript was written by an incompatible version.
    #[error("unsupported transcript version {0}")]
    UnsupportedVersion(u8),

    /// No final hash to verify against.
    #[error("transcript is not finalized")]
    NotFinalized,

    /// Replay diverged from the recording.
    #[error("replay hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Recorded hash (hex)
        expected: String,
        /// Replayed hash (hex)
        actual: String,
    },
}

impl SessionTranscript {
    /// Create an empty transcript.
    pub fn new(
        session_id: [u8; 16],
        rng_seed: u64,
        config: SessionConfig,
        initial_user: Option<UserId>,
    ) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            session_id,
            rng_seed,
            config,
            initial_user,
            actions: Vec::new(),
            final_hash: None,
        }
    }

    /// Check if transcript is complete.
    pub fn is_complete(&self) -> bool {
        self.final_hash.is_some()
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TranscriptError> {
        let transcript: Self = bincode::deserialize(data)
            .map_err(|e| TranscriptError::DeserializationFailed(e.to_string()))?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(TranscriptError::UnsupportedVersion(transcript.version));
        }
        Ok(transcript)
    }

    /// Rebuild the session by re-applying every action.
    ///
    /// Rejected actions are replayed too; they were rejected identically
    /// the first time.
    pub fn replay(&self) -> SessionMachine {
        let mut machine = SessionMachine::new(self.config.clone(), self.rng_seed);
        if let Some(user) = self.initial_user {
            machine.sign_in(user);
        }

        for action in &self.actions {
            if let Err(e) = machine.apply(action) {
                debug!("Replayed rejection {:?}: {}", action, e);
            }
        }
        machine
    }

    /// Replay and compare against the recorded final hash.
    pub fn verify(&self) -> Result<StateHash, TranscriptError> {
        let expected = self.final_hash.ok_or(TranscriptError::NotFinalized)?;
        let actual = self.replay().compute_hash();

        if actual != expected {
            return Err(TranscriptError::HashMismatch {
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
        Ok(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::category::MathCategory;

    fn recorded_session(user: Option<UserId>) -> (SessionMachine, SessionTranscript) {
        let session_id = [4u8; 16];
        let mut machine = SessionMachine::for_session(SessionConfig::default(), &session_id, user);
        machine.start_recording(session_id);

        machine.select_category(MathCategory::Algebra, 3).unwrap();
        for _ in 0..5 {
            machine.tick();
        }
        let answer = machine.state().current_challenge.as_ref().unwrap().answer();
        for _ in 0..2 {
            machine.tick();
        }
        machine.submit_answer(answer);
        machine.submit_answer(answer);
        machine.next_challenge();
        for _ in 0..15 {
            machine.tick();
        }
        machine.change_category(false);
        let _ = machine.select_category(MathCategory::Exponents, 0);

        let transcript = machine.finish_recording().unwrap();
        (machine, transcript)
    }

    #[test]
    fn test_transcript_records_every_action() {
        let (_, transcript) = recorded_session(None);

        assert_eq!(transcript.version, TRANSCRIPT_VERSION);
        assert!(transcript.is_complete());
        assert_eq!(transcript.actions.first(), Some(&SessionAction::Select {
            category: MathCategory::Algebra,
            difficulty: 3,
        }));
        assert_eq!(transcript.actions.len(), 1 + 5 + 2 + 2 + 1 + 15 + 1 + 1);
    }

    #[test]
    fn test_replay_matches_original() {
        let (machine, transcript) = recorded_session(Some(UserId::new([8; 16])));

        let replayed = transcript.replay();
        assert_eq!(replayed.snapshot(), machine.snapshot());
        assert_eq!(transcript.verify().unwrap(), machine.compute_hash());
    }

    #[test]
    fn test_serialization_roundtrip_then_verify() {
        let (_, transcript) = recorded_session(None);

        let bytes = transcript.to_bytes().unwrap();
        let parsed = SessionTranscript::from_bytes(&bytes).unwrap();

        assert_eq!(parsed, transcript);
        assert!(parsed.verify().is_ok());
    }

    #[test]
    fn test_tampered_transcript_fails() {
        let (_, mut transcript) = recorded_session(None);
        transcript.actions.retain(|a| !matches!(a, SessionAction::Submit { .. }));

        assert!(matches!(transcript.verify(), Err(TranscriptError::HashMismatch { .. })));
    }

    #[test]
    fn test_unfinished_transcript() {
        let transcript = SessionTranscript::new([0; 16], 1, SessionConfig::default(), None);
        assert!(matches!(transcript.verify(), Err(TranscriptError::NotFinalized)));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut transcript = SessionTranscript::new([0; 16], 1, SessionConfig::default(), None);
        transcript.version = 99;
        let bytes = transcript.to_bytes().unwrap();

        assert!(matches!(
            SessionTranscript::from_bytes(&bytes),
            Err(TranscriptError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_garbage_bytes() {
        assert!(matches!(
            SessionTranscript::from_bytes(&[1, 2, 3]),
            Err(TranscriptError::DeserializationFailed(_))
        ));
    }
}
