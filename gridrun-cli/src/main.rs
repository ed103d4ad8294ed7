//! # Gridrun CLI
//!
//! Command-line interface for running the game agent.
//!
//! Usage:
//!   gridrun run --game ls20
//!   gridrun run --game ls20 --provider anthropic --max-turns 60
//!   gridrun resume --game ls20 --guid <guid> --seed-from <record_id>
//!   gridrun frames
//!   gridrun frames <record_id>
//!
//! Environment:
//!   GRIDRUN_API_KEY    key for the remote game API
//!   OPENAI_API_KEY     key for --provider openai (default)
//!   ANTHROPIC_API_KEY  key for --provider anthropic

use clap::{Parser, Subcommand, ValueEnum};
use gridrun_agent::{ContinuationRequest, Orchestrator, RunConfig};
use gridrun_core::{
    AnthropicProvider, ClientConfig, FileFrameStore, FrameStore, GameClient, HttpGameClient,
    LlmProvider, OpenAIProvider, ProviderConfig, StreamEvent,
};
use std::sync::Arc;

const DEFAULT_GAME_API: &str = "https://three.arcprize.org";
const DEFAULT_FRAMES_DIR: &str = ".gridrun_frames";

#[derive(Parser)]
#[command(name = "gridrun")]
#[command(author, version, about = "Gridrun - LLM agents for remote grid games")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only show the final summary
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProviderKind {
    Openai,
    Anthropic,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a fresh game run
    Run {
        /// Remote game identifier (e.g. "ls20")
        #[arg(short, long)]
        game: String,

        /// LLM provider
        #[arg(short, long, value_enum, default_value = "openai")]
        provider: ProviderKind,

        /// Model override
        #[arg(short, long)]
        model: Option<String>,

        /// Provider-call budget
        #[arg(long, default_value = "40")]
        max_turns: u32,

        /// System prompt override
        #[arg(long)]
        instructions: Option<String>,

        /// Opening user message
        #[arg(long)]
        message: Option<String>,

        /// Tags recorded on the scoring card (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Offer the reset tool to the model
        #[arg(long)]
        include_reset: bool,

        /// Remote game API base URL
        #[arg(long, default_value = DEFAULT_GAME_API)]
        base_url: String,

        /// Directory for the persisted frame log
        #[arg(long, default_value = DEFAULT_FRAMES_DIR)]
        frames_dir: String,
    },
    /// Resume a game from a persisted frame log
    Resume {
        /// Remote game identifier
        #[arg(short, long)]
        game: String,

        /// Guid of the running game to resume
        #[arg(long)]
        guid: String,

        /// Record id in the frame log to seed from (last frame is used)
        #[arg(long)]
        seed_from: String,

        /// Provider response id of the previous conversation
        #[arg(long)]
        previous_response: Option<String>,

        #[arg(short, long, value_enum, default_value = "openai")]
        provider: ProviderKind,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(long, default_value = "40")]
        max_turns: u32,

        /// Opening user message for the resumed run
        #[arg(long)]
        message: Option<String>,

        #[arg(long, default_value = DEFAULT_GAME_API)]
        base_url: String,

        #[arg(long, default_value = DEFAULT_FRAMES_DIR)]
        frames_dir: String,
    },
    /// Inspect the persisted frame log
    Frames {
        /// Record id to show; lists all records when absent
        record: Option<String>,

        #[arg(long, default_value = DEFAULT_FRAMES_DIR)]
        frames_dir: String,
    },
}

fn env_key(name: &str) -> String {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => key,
        _ => {
            eprintln!("Error: {} is not set", name);
            std::process::exit(1);
        }
    }
}

fn game_client(base_url: &str) -> HttpGameClient {
    let config = ClientConfig::new(base_url).with_api_key(env_key("GRIDRUN_API_KEY"));
    HttpGameClient::new(config)
}

fn frame_store(frames_dir: &str) -> Arc<FileFrameStore> {
    match FileFrameStore::new(frames_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error opening frame log at {}: {}", frames_dir, e);
            std::process::exit(1);
        }
    }
}

fn print_event(event: &StreamEvent, verbose: bool, quiet: bool) {
    match event {
        StreamEvent::Init { session_id } => {
            if !quiet {
                println!("Session: {}", session_id);
            }
        }
        StreamEvent::Status { message } => {
            if !quiet {
                println!("   {}", message);
            }
        }
        StreamEvent::AgentStarting => {}
        StreamEvent::AgentReady { model } => {
            if !quiet {
                println!("Agent ready (model: {})\n", model);
            }
        }
        StreamEvent::GameStarted { game_id, guid } => {
            if !quiet {
                println!("Game {} started (guid: {})", game_id, guid);
            }
        }
        StreamEvent::ToolCall { name, arguments } => {
            if !quiet {
                println!("   -> {}({})", name, arguments);
            }
        }
        StreamEvent::ToolResult { name, score, state } => {
            if !quiet {
                println!("   <- {} score={} state={}", name, score, state);
            }
        }
        StreamEvent::Reasoning { text } | StreamEvent::Message { text } => {
            if !quiet {
                println!("   {}", text);
            }
        }
        StreamEvent::FrameUpdate {
            frame_number,
            score,
            state,
            is_animation,
            animation_frame,
            animation_total_frames,
            ..
        } => {
            if verbose {
                if *is_animation {
                    println!(
                        "   frame #{} ({}/{}) score={} state={}",
                        frame_number, animation_frame, animation_total_frames, score, state
                    );
                } else {
                    println!("   frame #{} score={} state={}", frame_number, score, state);
                }
            }
        }
        StreamEvent::LoopHint { message, flat_turns } => {
            if !quiet {
                println!("   [hint after {} flat turns] {}", flat_turns, message);
            }
        }
        StreamEvent::Completed { summary } => {
            println!(
                "\n=== RUN COMPLETE ===\nstate: {}\nscore: {}\nsteps: {}\nframes: {}",
                summary.final_state, summary.score, summary.steps_taken, summary.frame_count
            );
        }
        StreamEvent::Error { code, message } => {
            eprintln!("\nError [{}]: {}", code, message);
        }
    }
}

async fn drive<P, C>(orchestrator: Orchestrator<P, C>, session: String, verbose: bool, quiet: bool)
where
    P: LlmProvider,
    C: GameClient,
{
    let mut rx = match orchestrator.attach(&session) {
        Ok(rx) => rx,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let printer = async {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            print_event(&event, verbose, quiet);
            if terminal {
                break;
            }
        }
    };

    let (result, ()) = tokio::join!(orchestrator.run_session(&session), printer);
    if result.is_err() {
        // the error event has already been printed from the stream
        std::process::exit(1);
    }
}

async fn run_with_provider<P: LlmProvider>(
    provider: P,
    config: RunConfig,
    resume: Option<ContinuationRequest>,
    base_url: &str,
    frames_dir: &str,
    verbose: bool,
    quiet: bool,
) {
    let client = game_client(base_url);
    let store = frame_store(frames_dir);
    let orchestrator = Orchestrator::new(provider, client, store);

    let session = match resume {
        Some(request) => orchestrator.prepare_resume(config, request),
        None => orchestrator.prepare_run(config),
    };
    drive(orchestrator, session, verbose, quiet).await;
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    kind: ProviderKind,
    model: Option<String>,
    config: RunConfig,
    resume: Option<ContinuationRequest>,
    base_url: &str,
    frames_dir: &str,
    verbose: bool,
    quiet: bool,
) {
    match kind {
        ProviderKind::Openai => {
            let mut provider_config = ProviderConfig::openai(env_key("OPENAI_API_KEY"));
            if let Some(model) = model {
                provider_config = provider_config.with_model(model);
            }
            run_with_provider(
                OpenAIProvider::new(provider_config),
                config,
                resume,
                base_url,
                frames_dir,
                verbose,
                quiet,
            )
            .await;
        }
        ProviderKind::Anthropic => {
            let mut provider_config = ProviderConfig::anthropic(env_key("ANTHROPIC_API_KEY"));
            if let Some(model) = model {
                provider_config = provider_config.with_model(model);
            }
            run_with_provider(
                AnthropicProvider::new(provider_config),
                config,
                resume,
                base_url,
                frames_dir,
                verbose,
                quiet,
            )
            .await;
        }
    }
}

fn show_frames(frames_dir: &str, record: Option<String>) {
    let store = frame_store(frames_dir);
    match record {
        None => {
            let records = match store.list_sessions() {
                Ok(records) => records,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            if records.is_empty() {
                println!("(no frame logs in {})", frames_dir);
                return;
            }
            println!("Frame logs in {}:", frames_dir);
            for record_id in records {
                match store.session(&record_id) {
                    Ok(session) => println!(
                        "  {} game={} guid={} win_score={}",
                        record_id, session.game_id, session.game_guid, session.win_score
                    ),
                    Err(_) => println!("  {} (unreadable header)", record_id),
                }
            }
        }
        Some(record_id) => {
            let frames = match store.frames(&record_id) {
                Ok(frames) => frames,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            println!("{} frames:", frames.len());
            for record in frames {
                let action = record
                    .action
                    .as_ref()
                    .map(|a| a.name.to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "  #{:3} action={} score={} state={} pixels_changed={}",
                    record.frame_number,
                    action,
                    record.frame.score,
                    record.frame.state,
                    record.pixels_changed
                );
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            game,
            provider,
            model,
            max_turns,
            instructions,
            message,
            tag,
            include_reset,
            base_url,
            frames_dir,
        } => {
            let mut config = RunConfig::new(game).with_max_turns(max_turns);
            config.instructions = instructions;
            config.user_message = message;
            config.tags = tag;
            config.include_reset_tool = include_reset;
            config.verbose = cli.verbose;
            if let Some(m) = &model {
                config.model = Some(m.clone());
            }

            dispatch(provider, model, config, None, &base_url, &frames_dir, cli.verbose, cli.quiet)
                .await;
        }
        Commands::Resume {
            game,
            guid,
            seed_from,
            previous_response,
            provider,
            model,
            max_turns,
            message,
            base_url,
            frames_dir,
        } => {
            let store = frame_store(&frames_dir);
            let seed_frame = match store.frames(&seed_from) {
                Ok(frames) => frames.into_iter().next_back().map(|r| r.frame),
                Err(e) => {
                    eprintln!("Error reading frame log {}: {}", seed_from, e);
                    std::process::exit(1);
                }
            };
            if seed_frame.is_none() {
                eprintln!("Error: frame log {} is empty", seed_from);
                std::process::exit(1);
            }

            let mut config = RunConfig::new(game).with_max_turns(max_turns);
            config.verbose = cli.verbose;
            if let Some(m) = &model {
                config.model = Some(m.clone());
            }

            let request = ContinuationRequest {
                game_guid: Some(guid),
                seed_frame,
                previous_response_id: previous_response,
                user_message: message,
            };

            dispatch(
                provider,
                model,
                config,
                Some(request),
                &base_url,
                &frames_dir,
                cli.verbose,
                cli.quiet,
            )
            .await;
        }
        Commands::Frames { record, frames_dir } => {
            show_frames(&frames_dir, record);
        }
    }
}
