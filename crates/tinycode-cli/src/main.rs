//! tinycode - conversational coding agent for the terminal

mod commands;
mod config;
mod input;
mod prompt;
mod render;
mod session;
mod tools;
mod utils;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tinycode_agent::{Agent, AgentSession, ChatProvider, CompactionConfig, EventHandler};
use tinycode_ai::clients::{self, DeviceAuthorization, DevicePrompt};
use tinycode_ai::models::{self, DEFAULT_BACKEND};
use tracing_subscriber::EnvFilter;

use crate::input::{ConsoleInput, Prompter};
use crate::session::FileSessionStore;
use crate::tools::{AutoApprove, Confirm, ProcessTracker};

/// tinycode - conversational coding agent
#[derive(Parser, Debug)]
#[command(name = "tinycode")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend (copilot, sap)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to use (default depends on the backend)
    #[arg(short, long)]
    model: Option<String>,

    /// Working directory; tools are confined to it
    #[arg(short, long)]
    working_dir: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Run shell commands without asking
    #[arg(short, long)]
    yes: bool,

    /// Start a new session instead of resuming the latest one
    #[arg(long)]
    new: bool,

    /// Resume a previous session by ID (full or first 8 characters)
    #[arg(long, conflicts_with = "new")]
    resume: Option<String>,

    /// List saved sessions
    #[arg(long)]
    sessions: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tinycode=debug,tinycode_agent=debug,tinycode_ai=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn device_prompt() -> DevicePrompt {
    Arc::new(|auth: &DeviceAuthorization| {
        println!("🔑 Go to: {}", auth.verification_uri);
        println!("🔢 Enter code: {}", auth.user_code);
    })
}

fn list_sessions(store: &FileSessionStore) {
    let sessions = store.list();
    if sessions.is_empty() {
        println!("No sessions found.");
        println!("Sessions are stored in: {}", store.dir().display());
        return;
    }

    println!("Saved sessions:\n");
    println!("{:<10} {:<12} {:<6} Title", "ID", "Updated", "Msgs");
    println!("{}", "-".repeat(60));
    for s in &sessions {
        println!(
            "{:<10} {:<12} {:<6} {}",
            utils::short_id(s.id()),
            s.updated_at.format("%Y-%m-%d"),
            s.record.messages.len(),
            s.title
        );
    }
    println!("\nResume with: tinycode --resume <session-id>");
}

fn select_session(args: &Args, store: &FileSessionStore) -> anyhow::Result<AgentSession> {
    if args.new {
        return Ok(AgentSession::new(uuid::Uuid::new_v4().to_string()));
    }
    let Some(id) = args.resume.as_deref() else {
        return Ok(store.ensure());
    };

    match store.read(&store.resolve_id(id))? {
        Some(stored) => Ok(AgentSession::from_record(stored.record)),
        None => anyhow::bail!("Session not found: {}", id),
    }
}

fn system_prompt(cfg: &config::Config, tool_names: &[&str], workspace_root: &Path) -> String {
    match cfg.custom_system_prompt() {
        Ok(Some(custom)) => custom,
        Ok(None) => prompt::build_system_prompt(tool_names, workspace_root),
        Err(e) => {
            eprintln!("Warning: Failed to read system prompt file: {}", e);
            prompt::build_system_prompt(tool_names, workspace_root)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    if let Some(ref dir) = args.working_dir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to enter working directory {}", dir))?;
    }
    let workspace_root = std::env::current_dir().context("Failed to read working directory")?;
    let store = Arc::new(FileSessionStore::for_workspace(&workspace_root));

    if args.sessions {
        list_sessions(&store);
        return Ok(());
    }

    // CLI > environment > config file > defaults
    let provider_name = config::choose(
        args.provider.as_deref(),
        "TINYCODE_PROVIDER",
        cfg.provider.as_deref(),
    )
    .unwrap_or_else(|| DEFAULT_BACKEND.name().to_string());
    let model = config::choose(args.model.as_deref(), "TINYCODE_MODEL", cfg.model.as_deref());
    let selection = models::resolve(&provider_name, model.as_deref())?;

    let transport = clients::connect(selection.backend, Some(device_prompt()))
        .with_context(|| format!("Failed to configure the {} backend", selection.backend))?;

    let prompter = Arc::new(Prompter::new());
    let confirm: Arc<dyn Confirm> = if args.yes || cfg.confirm_commands == Some(false) {
        Arc::new(AutoApprove)
    } else {
        prompter.clone()
    };
    let timeout = cfg
        .command_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(tools::DEFAULT_TIMEOUT);

    let tracker = ProcessTracker::new();
    let registry = Arc::new(tools::registry(tracker.clone(), confirm, timeout));
    let tool_names = registry.names();

    // Ctrl+C and SIGTERM stop running commands before exiting
    let shutdown = tools::shutdown_signal().context("Failed to install signal handlers")?;
    tokio::spawn(async move {
        let code = shutdown.await;
        println!();
        tracker.terminate_all().await;
        std::process::exit(code);
    });

    let session = select_session(&args, &store)?;

    let compaction = cfg
        .max_messages
        .map(CompactionConfig::new)
        .unwrap_or_default();
    let provider = ChatProvider::new(
        transport,
        selection.protocol,
        selection.model.clone(),
        system_prompt(&cfg, &tool_names, &workspace_root),
    )
    .with_compaction(compaction);

    render::info("Ready!");
    render::info(&format!("Provider: {}", selection.backend));
    render::info(&format!("Model: {}", selection.model));

    let handler: EventHandler = Arc::new(render::event);
    let names: Vec<String> = tool_names.iter().map(|name| name.to_string()).collect();
    let mut agent = Agent::new(provider, registry.clone(), store.clone(), session, &workspace_root)
        .on_event(handler);
    let mut input = ConsoleInput::new(prompter, store, names);

    agent.run(&mut input).await;
    Ok(())
}
