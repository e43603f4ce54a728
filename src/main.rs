use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use turnsplit::io::{read_raw_text_file, read_transcript_file};
use turnsplit::llm::text_preservation_rate;
use turnsplit::{
    run_pipeline, serve, AnthropicClient, AnthropicConfig, AppState, FormatReport,
    HumanTranscript, PipelineConfig, Speaker,
};

#[derive(Parser)]
#[command(name = "turnsplit")]
#[command(author, version, about = "Split raw tutoring-session text into speaker-labeled utterances", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a raw conversation text file
    Format {
        /// Input file containing the raw, unsplit conversation text
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the segmented transcript (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for human-readable transcript (text)
        #[arg(long)]
        human_readable: Option<PathBuf>,

        /// Name of the student, used as the non-tutor speaker label
        #[arg(long)]
        student_name: Option<String>,

        /// Per-call engine timeout in seconds (0 disables the timeout)
        #[arg(long, default_value = "90")]
        timeout_secs: u64,

        /// Stage 1 preservation rate below which a warning is logged
        #[arg(long, default_value = "0.8")]
        preservation_threshold: f64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Serve the segmentation pipeline over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:3000")]
        bind: SocketAddr,

        /// Per-call engine timeout in seconds (0 disables the timeout)
        #[arg(long, default_value = "90")]
        timeout_secs: u64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare a transcript against its raw text without calling the engine
    Check {
        /// Raw conversation text file
        #[arg(short, long)]
        raw: PathBuf,

        /// Transcript JSON file (utterance array or format output)
        #[arg(short, long)]
        transcript: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Format {
            input,
            output,
            human_readable,
            student_name,
            timeout_secs,
            preservation_threshold,
            verbose,
        } => {
            setup_logging(verbose);
            let config = PipelineConfig {
                preservation_threshold,
                engine_timeout: engine_timeout(timeout_secs),
            };
            format_transcript(input, output, human_readable, student_name, config).await
        }
        Commands::Serve {
            bind,
            timeout_secs,
            verbose,
        } => {
            setup_logging(verbose);
            let config = PipelineConfig {
                engine_timeout: engine_timeout(timeout_secs),
                ..Default::default()
            };
            let client = AnthropicClient::new(AnthropicConfig::from_env()?);
            info!("Using model {}", client.config().model);
            serve(bind, AppState::new(Arc::new(client), config)).await
        }
        Commands::Check {
            raw,
            transcript,
            verbose,
        } => {
            setup_logging(verbose);
            check_transcript(raw, transcript)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn engine_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

async fn format_transcript(
    input: PathBuf,
    output: PathBuf,
    human_readable: Option<PathBuf>,
    student_name: Option<String>,
    config: PipelineConfig,
) -> Result<()> {
    info!("Loading raw text from {:?}", input);
    let full_text = read_raw_text_file(&input)?;

    let client = AnthropicClient::new(AnthropicConfig::from_env()?);
    info!("Using model {}", client.config().model);

    let result = run_pipeline(&client, &full_text, student_name.as_deref(), &config)
        .await
        .context("Failed to segment transcript")?;

    for stage in &result.stages {
        info!("{}: {} utterances, {:?}", stage.stage, stage.utterances, stage.outcome);
    }

    if let Some(path) = &human_readable {
        HumanTranscript::new(&result.transcript, student_name.as_deref()).write_file(path)?;
        info!("Human-readable output written to {:?}", path);
    }

    let report = FormatReport::from(result);
    report.write_json(&output)?;
    info!("Output written to {:?}", output);

    Ok(())
}

fn check_transcript(raw: PathBuf, transcript: PathBuf) -> Result<()> {
    let full_text = read_raw_text_file(&raw)?;
    let sequence = read_transcript_file(&transcript)
        .with_context(|| format!("Failed to load transcript {:?}", transcript))?;

    let combined: Vec<&str> = sequence.iter().map(|u| u.text.as_str()).collect();
    let rate = text_preservation_rate(&full_text, &combined.join(" "));

    println!("Transcript Check");
    println!("================");
    println!("Raw text: {} chars, {} words", full_text.chars().count(), full_text.split_whitespace().count());
    println!("Utterances: {}", sequence.len());
    println!("Preservation rate: {:.3}", rate);
    println!();

    println!("Speaker Statistics");
    println!("------------------");
    for speaker in [Speaker::Tutor, Speaker::Student] {
        let utterances: Vec<_> = sequence.iter().filter(|u| u.speaker() == speaker).collect();
        let words: usize = utterances.iter().map(|u| u.word_count()).sum();
        println!(
            "{}: {} utterances, {} words",
            speaker.label(None),
            utterances.len(),
            words
        );
    }

    let switches = sequence
        .windows(2)
        .filter(|pair| pair[0].is_user != pair[1].is_user)
        .count();
    println!("Speaker switches: {}", switches);

    Ok(())
}
