//! narrate - Convert a plain-text file into a single narrated audio file

mod audio;
mod config;
mod error;
mod layout;
mod pipeline;
mod progress;
mod text;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use config::NarrateConfig;
use error::NarrateError;
use layout::RunLayout;
use pipeline::{Pipeline, PipelineOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tts_client::AudioFormat;

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Convert a plain-text file into a single narrated audio file", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the text file (one statement per line)
    input_file: Option<PathBuf>,

    /// Voice to use (overrides config)
    #[arg(long)]
    voice: Option<String>,

    /// Speech model to use (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Audio format: mp3, opus, aac, flac or wav (overrides config)
    #[arg(long)]
    format: Option<AudioFormat>,

    /// Token budget per chunk (overrides config)
    #[arg(long)]
    budget: Option<usize>,

    /// Character ceiling per chunk (overrides config)
    #[arg(long)]
    max_chars: Option<usize>,

    /// Token counter: tiktoken:<model>, huggingface:<path> or whitespace
    #[arg(long)]
    tokenizer: Option<String>,

    /// Output directory (default: ./<input-name>)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Keep chunk files and the concat manifest after success
    #[arg(long)]
    keep_segments: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Set default voice
    SetVoice {
        /// Voice name (e.g. onyx, nova, alloy)
        voice: String,
    },
    /// Set default speech model
    SetModel {
        /// Model name (e.g. tts-1, tts-1-hd)
        model: String,
    },
    /// Set default token budget per chunk
    SetBudget {
        /// Tokens per chunk
        budget: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    if let Some(Commands::Config { action }) = &args.command {
        return match handle_config_command(action) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(input) = args.input_file.clone() else {
        eprintln!("{}", Args::command().render_usage());
        return ExitCode::from(1);
    };

    match run(&args, input).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "warn,narrate=debug,tts_client=debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(config: &mut NarrateConfig, args: &Args) {
    if let Some(voice) = &args.voice {
        config.voice = voice.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    if let Some(budget) = args.budget {
        config.token_budget = budget;
    }
    if let Some(max_chars) = args.max_chars {
        config.max_chunk_chars = max_chars;
    }
    if let Some(tokenizer) = &args.tokenizer {
        config.tokenizer = tokenizer.clone();
    }
}

async fn run(args: &Args, input: PathBuf) -> error::Result<()> {
    if !input.is_file() {
        return Err(NarrateError::Usage(format!(
            "Input file not found: {}",
            input.display()
        )));
    }

    let mut config = NarrateConfig::load()?;
    apply_overrides(&mut config, args);
    config.validate()?;

    if args.debug {
        eprintln!("Input: {}", input.display());
        eprintln!("Voice: {} ({})", config.voice, config.model);
        eprintln!("Budget: {} tokens, {} chars", config.token_budget, config.max_chunk_chars);
        eprintln!("Tokenizer: {}", config.tokenizer);
    }

    // Resolve every collaborator before any API call is made
    let counter = text::counter_from_spec(&config.tokenizer)?;
    let ffmpeg = audio::Ffmpeg::locate(config.ffmpeg_path.as_deref())?;
    let provider = tts_client::get_provider(&config.provider).map_err(|source| {
        NarrateError::Config(source.to_string())
    })?;

    let layout = RunLayout::for_input(
        &input,
        args.output_dir.as_deref(),
        config.format,
        chrono::Local::now(),
    )?;
    eprintln!("Writing audio for {} into {}", layout.base_name(), layout.dir().display());

    let mut options = PipelineOptions::from_config(&config);
    options.keep_segments = args.keep_segments;

    let ffprobe = audio::probe::locate_ffprobe(ffmpeg.program());
    let pipeline = Pipeline::new(provider.as_ref(), counter.as_ref(), &ffmpeg, options)
        .with_ffprobe(ffprobe);
    let summary = pipeline.run(&input, &layout).await?;

    log::debug!("Removed {} intermediate files", summary.removed);
    if let Some(report) = &summary.durations {
        log::info!(
            "Duration check: segments {} ms, output {} ms",
            report.segments_ms,
            report.output_ms
        );
    }
    eprintln!(
        "\nDone: {} chunk(s) narrated into {}",
        summary.chunks,
        summary.output.display()
    );

    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarrateConfig::load()?;
            println!("Configuration file: {}", NarrateConfig::config_path()?.display());
            println!();
            println!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            );
        }
        ConfigAction::Path => {
            println!("{}", NarrateConfig::config_path()?.display());
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = NarrateConfig::load()?;
            config.voice = voice.clone();
            config.validate()?;
            config.save()?;
            println!("Default voice set to: {}", config.voice);
        }
        ConfigAction::SetModel { model } => {
            let mut config = NarrateConfig::load()?;
            config.model = model.clone();
            config.validate()?;
            config.save()?;
            println!("Default model set to: {}", config.model);
        }
        ConfigAction::SetBudget { budget } => {
            let mut config = NarrateConfig::load()?;
            config.token_budget = *budget;
            config.validate()?;
            config.save()?;
            println!("Default token budget set to: {}", config.token_budget);
        }
    }
    Ok(())
}
