//! Lively CLI - live interruption demo
//!
//! Streams a passage as one speaker's turn and lets an AI opponent decide,
//! boundary by boundary, whether to cut in.

use clap::Parser;
use colored::Colorize;
use lively_core::{
    CompletionClient, InMemoryInterruptionStore, InterruptionStore, LivelyConfig, LivelyEvent,
    LivelySession, OpenAICompletionClient, PacingMode, Participant, ParticipantRole, SystemClock,
    TurnOutcome,
};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const SAMPLE_PASSAGE: &str = "Let me be clear about what a carbon tax does. \
It puts a price on pollution, and that price ripples through the whole economy. \
My opponents just want to protect the oil companies at any cost. \
Studies show that 70 percent of the revenue could be returned as dividends. \
The real question is who pays, and the answer is that polluters pay. \
Nobody has ever shown that this hurts working families, not once.";

#[derive(Parser)]
#[command(
    name = "livelydebate",
    version,
    about = "Lively debate demo - watch an AI decide when to interrupt",
    long_about = "Streams one speaker's turn and evaluates, at every safe boundary, whether the opponent should jump in."
)]
struct Cli {
    /// The topic being debated
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// File holding the speaker's passage (a built-in sample is used otherwise)
    #[arg(short, long, value_name = "FILE")]
    text: Option<PathBuf>,

    /// Name of the speaker holding the floor
    #[arg(long, default_value = "Avery", value_name = "NAME")]
    speaker: String,

    /// Name of the opponent who may interrupt
    #[arg(long, default_value = "Blake", value_name = "NAME")]
    opponent: String,

    /// Pacing mode: slow, medium, fast or frantic
    #[arg(short, long, value_name = "MODE")]
    pacing: Option<PacingMode>,

    /// Interruption aggressiveness, 1 to 5
    #[arg(short, long, value_name = "LEVEL")]
    aggressiveness: Option<u8>,

    /// Seconds a participant must wait between interruptions
    #[arg(long, value_name = "SECONDS")]
    cooldown: Option<u64>,

    /// Model used for interruption decisions
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Delay between streamed chunks
    #[arg(long, default_value = "80", value_name = "MS")]
    chunk_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lively_core=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. Interrupt evaluations may fail.".yellow()
        );
        String::new()
    });

    let mut config = match &cli.config {
        Some(path) => LivelyConfig::load(path)?,
        None => LivelyConfig::default(),
    };
    if let Some(pacing) = cli.pacing {
        config.lively.pacing_mode = pacing;
    }
    if let Some(aggressiveness) = cli.aggressiveness {
        config.interruptions.aggressiveness = aggressiveness;
    }
    if let Some(cooldown) = cli.cooldown {
        config.interruptions.cooldown_seconds = cooldown;
    }
    if let Some(model) = &cli.model {
        config.completion.model = model.clone();
    }

    let passage = match &cli.text {
        Some(path) => std::fs::read_to_string(path)?,
        None => SAMPLE_PASSAGE.to_string(),
    };

    let speaker = Participant::new("speaker", &cli.speaker, ParticipantRole::For);
    let opponent = Participant::new("opponent", &cli.opponent, ParticipantRole::Against);

    let completion: Arc<dyn CompletionClient> = Arc::new(OpenAICompletionClient::new(
        api_base,
        api_key,
        &config.completion.model,
    )?);
    let store = Arc::new(InMemoryInterruptionStore::new());
    let chunk_size = config.lively.pacing().chunk_size;

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {} pacing", "Lively Debate".bold(), config.lively.pacing_mode)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), cli.topic.bright_white());
    println!(
        "{} {} vs {} (aggressiveness {}, model {})",
        "Participants:".bold(),
        speaker.display_name_with_role().bright_cyan(),
        opponent.display_name_with_role().bright_cyan(),
        config.interruptions.aggressiveness,
        config.completion.model.dimmed()
    );
    println!("{}", "─".repeat(70).dimmed());

    let mut session = LivelySession::new(
        format!("cli-{}", std::process::id()),
        config,
        Arc::new(SystemClock),
        Some(completion),
        Some(store.clone() as Arc<dyn InterruptionStore>),
    )?;
    session.events().on_event(create_console_callback());
    session.start();

    let (tx, rx) = mpsc::channel(16);
    let chunks = split_chunks(&passage, chunk_size);
    let delay = Duration::from_millis(cli.chunk_delay_ms);
    let producer = tokio::spawn(async move {
        for chunk in chunks {
            if tx.send(chunk).await.is_err() {
                break;
            }
            tokio::time::sleep(delay).await;
        }
    });

    let outcome = session
        .run_turn(&speaker, &[opponent.clone()], rx, &[], &cli.topic)
        .await;
    producer.abort();

    println!();
    println!("{}", "─".repeat(70).dimmed());
    match &outcome {
        TurnOutcome::Interrupted { content, candidate } => {
            println!(
                "{} {} cut in on {} ({}, urgency {:.2})",
                "⚡".bright_red(),
                opponent.name.bright_red().bold(),
                speaker.name.bright_cyan(),
                candidate.trigger_reason.to_string().yellow(),
                candidate.urgency
            );
            println!("  {} \"{}\"", "Trigger:".bold(), candidate.trigger_content);
            println!("  {} \"{}\"", "Opener:".bold(), candidate.suggested_opener);
            println!("  {} {}", "Kept:".bold(), content.trim().dimmed());
        }
        TurnOutcome::Completed { .. } => {
            println!("{}", "  Turn completed without interruption.".bright_green());
        }
    }

    session.stop().await;
    let stats = session.evaluator().lock().await.interrupt_stats().await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  Interruptions this session: {}", stats.total)
            .bright_green()
            .bold()
    );
    for (reason, count) in &stats.by_reason {
        println!("    {} {}", format!("{}:", reason).yellow(), count);
    }
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Create a callback that prints lively events to the console.
fn create_console_callback() -> Box<dyn Fn(&LivelyEvent) + Send + Sync> {
    Box::new(move |event| match event {
        LivelyEvent::SpeakerStarted { speaker_id, .. } => {
            println!("{} {}", "▶".bright_cyan(), speaker_id.bright_cyan().bold());
            print!("  ");
        }
        LivelyEvent::TokenChunk { chunk, .. } => {
            print!("{}", chunk);
            io::stdout().flush().ok();
        }
        LivelyEvent::BoundarySafe { .. } => {
            print!("{}", "¦".dimmed());
        }
        LivelyEvent::InterruptWindowOpened { .. } => {
            print!("{}", "⟨open⟩".yellow());
        }
        LivelyEvent::InterruptWindowClosed { reason, .. } => {
            print!("{}", format!("⟨closed: {}⟩", reason).dimmed());
        }
        LivelyEvent::InterruptionFired { candidate } => {
            println!();
            println!(
                "{} {}",
                format!("  ✋ {}:", candidate.interrupting_participant)
                    .bright_red()
                    .bold(),
                candidate.suggested_opener.bright_white()
            );
        }
        LivelyEvent::SpeakerEnded {
            duration_ms,
            interrupted,
            ..
        } => {
            println!();
            let status = if *interrupted { "interrupted" } else { "finished" };
            println!(
                "  {}",
                format!("[{} after {:.1}s]", status, *duration_ms as f64 / 1000.0).dimmed()
            );
        }
    })
}

/// Split text into chunks of at most `size` characters.
fn split_chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
