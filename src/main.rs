//! MathMind Demo
//!
//! Plays a scripted session through the real-time driver: a few addition
//! challenges, a category change, one multiplication challenge left to time
//! out. Prints the summary as JSON and replays the transcript to check
//! determinism.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mathmind::{
    VERSION, GameState, Phase, SessionConfig, SessionMachine, UserId,
    runtime::{
        audio::{AudioOutput, LogSink},
        auth::{sign_in_with_token, AuthConfig},
        driver::{spawn_session, SessionHandle},
    },
};

/// Demo ticks run faster than real seconds.
const DEMO_TICK: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("MathMind v{}", VERSION);

    let config = SessionConfig::from_env();
    info!(
        "Memorize {}s, solve {}s, start difficulty {}",
        config.memorize_duration, config.solve_duration, config.initial_difficulty
    );

    let user = demo_user(&config)?;
    let session_id = Uuid::new_v4();
    info!("Session {}", session_id);

    let mut machine = SessionMachine::for_session(config, session_id.as_bytes(), user);
    machine.start_recording(*session_id.as_bytes());
    info!("RNG seed: {}", machine.rng_seed());

    let handle = spawn_session(machine, AudioOutput::new(Box::new(LogSink)), DEMO_TICK);
    let mut state = handle.watch_state();

    // Three addition rounds; the second one is answered wrong
    handle.select_slug("addition", 1).await?;
    for round in 0..3 {
        let solving = wait_for_phase(&mut state, Phase::Solve).await?;
        let challenge = solving
            .current_challenge
            .as_ref()
            .context("solve phase without a challenge")?;
        let answer = if round == 1 { challenge.answer() + 1 } else { challenge.answer() };
        info!("{} = {}?", challenge.question(), answer);

        handle.submit(answer).await?;
        let judged = wait_for_phase(&mut state, Phase::Result).await?;
        info!("{:?}: score {}, coins {}", judged.feedback, judged.score, judged.coins);

        if round < 2 {
            handle.next().await?;
        }
    }

    // Switch topic and let the clock run out
    handle.change_category(false).await?;
    handle.select_slug("multiplication", 2).await?;
    let expired = wait_for_phase(&mut state, Phase::Result).await?;
    info!("{:?} after {} ticks", expired.feedback, expired.clock);
    handle.change_category(false).await?;

    finish(handle).await
}

/// Sign in from `MATHMIND_ID_TOKEN` when auth is configured.
fn demo_user(config: &SessionConfig) -> Result<Option<UserId>> {
    let auth = AuthConfig::from_env();
    let token = std::env::var("MATHMIND_ID_TOKEN").ok();

    let user = match token {
        Some(token) if auth.is_configured() => Some(sign_in_with_token(&token, &auth)?.id),
        _ => None,
    };
    if config.require_sign_in && user.is_none() {
        bail!("sign-in required: set MATHMIND_ID_TOKEN and MATHMIND_AUTH_SECRET or MATHMIND_AUTH_PUBLIC_KEY_PEM");
    }
    Ok(user)
}

async fn wait_for_phase(state: &mut watch::Receiver<GameState>, phase: Phase) -> Result<GameState> {
    loop {
        {
            let current = state.borrow_and_update();
            if current.phase == phase {
                return Ok(current.clone());
            }
        }
        state.changed().await.context("session driver stopped")?;
    }
}

async fn finish(handle: SessionHandle) -> Result<()> {
    let report = handle.shutdown().await?;

    info!("=== Session Summary ===");
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    info!("=== Verifying Determinism ===");
    let transcript = report.transcript.context("session was not recorded")?;
    info!(
        "Transcript: {} actions, {} bytes",
        transcript.actions.len(),
        transcript.to_bytes()?.len()
    );
    let hash = transcript.verify()?;
    info!("DETERMINISM VERIFIED: {}", hex::encode(hash));

    Ok(())
}
