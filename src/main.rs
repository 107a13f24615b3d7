use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Local;
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::EnvFilter;

use parley::conversation::WordAccuracy;
use parley::{
    AudioOutput, CoachService, CoachSession, Config, ConversationTurn, GeminiCoach, LiveEvent,
    PlaybackOutcome, PromptTemplate, SpeakerOutput, Unavailable,
};

/// Parley - Spoken-language practice coach
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay recorded live events and print the annotated transcript
    Replay {
        /// JSON Lines file with one live event per line
        events: PathBuf,
        /// Read the turn at this index aloud afterward
        #[arg(long)]
        play: Option<usize>,
        /// Seconds to wait for pronunciation feedback
        #[arg(long, default_value = "60")]
        wait: u64,
    },
    /// Print the live session configuration
    LiveConfig,
    /// List practice templates and their topics
    Topics,
    /// Synthesize text with the agent voice and play it
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! Let's practice speaking together.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Topics => {
            list_topics();
            Ok(())
        }
        Command::LiveConfig => {
            let config = Config::load()?;
            tracing::debug!(?config, "loaded configuration");
            live_config(&config)
        }
        Command::Replay { events, play, wait } => {
            let config = Config::load()?;
            tracing::debug!(?config, "loaded configuration");
            replay(&config, &events, play, Duration::from_secs(wait)).await
        }
        Command::Say { text } => {
            let config = Config::load()?;
            say(&config, &text).await
        }
    }
}

/// Gemini when an API key is configured, otherwise a service that always fails
fn coach_service(config: &Config) -> anyhow::Result<Arc<dyn CoachService>> {
    let Some(key) = &config.api.api_key else {
        tracing::warn!("GEMINI_API_KEY not set, feedback and playback are unavailable");
        return Ok(Arc::new(Unavailable));
    };

    let coach = GeminiCoach::new(
        SecretString::from(key.expose_secret().to_string()),
        config.api.base_url.clone(),
        config.api.analysis_model.clone(),
        config.api.tts_model.clone(),
    )?;
    Ok(Arc::new(coach))
}

/// Output for replays that never read anything aloud
struct NoOutput;

#[async_trait]
impl AudioOutput for NoOutput {
    async fn play(&self, _audio: &[u8]) -> parley::Result<()> {
        Err(parley::Error::Audio("audio output not opened".to_string()))
    }
}

fn live_config(config: &Config) -> anyhow::Result<()> {
    let live = parley::LiveConnectConfig::new(config.voices.agent.clone(), config.system_instruction());
    println!("model: {}", config.api.live_model);
    println!("{}", serde_json::to_string_pretty(&live)?);
    Ok(())
}

fn list_topics() {
    for template in PromptTemplate::ALL {
        println!("{}", template.summary());
    }
}

async fn replay(
    config: &Config,
    path: &Path,
    play: Option<usize>,
    wait: Duration,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let events = raw
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<LiveEvent>(line)
                .with_context(|| format!("{}:{}: invalid event", path.display(), n + 1))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let output: Arc<dyn AudioOutput> = if play.is_some() {
        Arc::new(SpeakerOutput::new()?)
    } else {
        Arc::new(NoOutput)
    };
    let session = CoachSession::new(config.session_settings(), coach_service(config)?, output);

    for event in &events {
        session.handle_event(event);
    }
    tracing::info!(events = events.len(), turns = session.log().len(), "replay complete");

    if !session.wait_for_enrichment(wait).await {
        tracing::warn!(secs = wait.as_secs(), "pronunciation feedback still pending");
    }

    if let Some(index) = play {
        let turn = session
            .turns()
            .get(index)
            .map(|t| t.id)
            .with_context(|| format!("no turn at index {index}"))?;

        match session.play(turn).await {
            PlaybackOutcome::Played => {}
            outcome => tracing::warn!(?outcome, "turn was not played"),
        }
    }

    for (index, turn) in session.turns().iter().enumerate() {
        print_turn(index, turn);
    }

    Ok(())
}

fn print_turn(index: usize, turn: &ConversationTurn) {
    let time = turn.timestamp.with_timezone(&Local).format("%H:%M:%S%.3f");
    let open = if turn.is_final { "" } else { " …" };
    println!("#{index} [{time}] {}: {}{open}", turn.role.label(), turn.text);

    if let Some(ipa) = &turn.ipa {
        println!("    ipa: {ipa}");
    }

    match &turn.pronunciation_feedback {
        Some(feedback) if feedback.is_analyzing() => println!("    pronunciation: analyzing"),
        Some(feedback) => {
            if let Some(p) = feedback.ready() {
                println!("    pronunciation: {}", p.overall_assessment);
                for word in &p.words {
                    let mark = match word.accuracy {
                        WordAccuracy::Good => "ok",
                        WordAccuracy::NeedsImprovement => "~",
                        WordAccuracy::Incorrect => "x",
                    };
                    println!("      [{mark}] {}: {}", word.word, word.feedback);
                }
            }
        }
        None => {}
    }

    if let Some(grammar) = turn.grammar_feedback.as_ref().and_then(|f| f.ready()) {
        println!("    grammar: {}", grammar.overall_assessment);
        for c in &grammar.corrections {
            println!("      {} -> {} ({})", c.original, c.corrected, c.explanation);
        }
    }

    let sources: Vec<&str> = turn
        .grounding_chunks
        .iter()
        .filter_map(|c| c.display_text())
        .collect();
    if !sources.is_empty() {
        println!("    sources: {}", sources.join(", "));
    }
}

async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let service = coach_service(config)?;
    let output = SpeakerOutput::new()?;

    println!("Synthesizing with voice {}...", config.voices.agent);
    let audio = service
        .synthesize_speech(text, &config.voices.agent)
        .await?
        .context("speech service returned no audio")?;

    println!("Playing {} bytes of audio...", audio.len());
    output.play(&audio).await?;

    Ok(())
}
