//! diagchat CLI
//!
//! Terminal client for the AI PC diagnostic assistant.

use clap::Parser;
use diagchat::config::load_telemetry;
use diagchat::plain;
use diagchat::tui::App;
use diagchat::{ConversationTurn, DiagChatConfig, HttpPredictionClient, PredictionBackend, TaskViewState, Transcript};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// diagchat - chat with the PC diagnostic assistant
#[derive(Parser, Debug)]
#[command(name = "diagchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Prediction endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Config file (defaults to <config_dir>/diagchat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// JSON telemetry snapshot to attach to every request
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Disable TUI and use plain text mode
    #[arg(long)]
    no_tui: bool,

    /// Render a saved model output and exit, without contacting the backend
    #[arg(long, value_name = "FILE")]
    render: Option<PathBuf>,

    /// Show diagnostic tasks expanded
    #[arg(long)]
    expand_tasks: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Write logs to this file (the TUI logs nowhere otherwise)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Issue description to send
    #[arg(trailing_var_arg = true)]
    prompt: Vec<String>,
}

impl Cli {
    fn prompt_text(&self) -> Option<String> {
        let text = self.prompt.join(" ");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tui = cli.render.is_none() && !cli.no_tui;
    init_logging(&cli, tui)?;

    if let Some(path) = &cli.render {
        return render_file(path, cli.expand_tasks);
    }

    let config = resolve_config(&cli)?;
    let client = HttpPredictionClient::new(&config)?;
    let endpoint = client.endpoint().to_string();
    info!("Using endpoint {}", endpoint);

    if tui {
        run_tui_mode(cli, Arc::new(client), endpoint).await
    } else {
        run_plain_mode(cli, Arc::new(client)).await
    }
}

fn init_logging(cli: &Cli, tui: bool) -> anyhow::Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else if !tui {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

/// Defaults, config file and environment, then command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<DiagChatConfig> {
    let mut config = DiagChatConfig::load(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint.clone());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(path) = &cli.telemetry {
        config = config.with_telemetry(load_telemetry(path)?);
    }
    Ok(config)
}

fn render_file(path: &Path, expand_tasks: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let mut transcript = Transcript::new();
    let index = transcript.append(ConversationTurn::assistant(raw, None));
    let text = rendered_text(&transcript, index, expand_tasks);
    writeln!(io::stdout(), "{text}")?;
    Ok(())
}

/// Plain-text rendering of one transcript entry
fn rendered_text(transcript: &Transcript, index: usize, expand_tasks: bool) -> String {
    let Some(entry) = transcript.get(index) else {
        return String::new();
    };
    let mut state = TaskViewState::new();
    if expand_tasks {
        if let Some(registry) = entry.rendered.tasks() {
            registry.expand_all(&mut state);
        }
    }
    plain::turn_text(&entry.turn, &entry.rendered, Some(&state))
}

async fn run_tui_mode(cli: Cli, backend: Arc<dyn PredictionBackend>, endpoint: String) -> anyhow::Result<()> {
    let mut app = App::new(backend, endpoint, cli.expand_tasks)?;
    if let Some(prompt) = cli.prompt_text() {
        app.submit(prompt);
    }
    app.run().await?;
    Ok(())
}

async fn run_plain_mode(cli: Cli, backend: Arc<dyn PredictionBackend>) -> anyhow::Result<()> {
    info!("Starting diagchat (plain mode)");

    let (prompt_tx, mut prompt_rx) = mpsc::channel::<String>(32);

    if let Some(prompt) = cli.prompt_text() {
        prompt_tx.send(prompt).await?;
        drop(prompt_tx);
    } else {
        // Spawn blocking thread to read from stdin
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => {
                        if prompt_tx.blocking_send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });
    }

    let mut transcript = Transcript::new();
    while let Some(prompt) = prompt_rx.recv().await {
        let user = transcript.append(ConversationTurn::user(prompt.clone()));
        print_entry(&transcript, user, cli.expand_tasks)?;

        let reply = transcript.append(ConversationTurn::from_reply(backend.predict(&prompt).await));
        print_entry(&transcript, reply, cli.expand_tasks)?;
    }
    Ok(())
}

fn print_entry(transcript: &Transcript, index: usize, expand_tasks: bool) -> io::Result<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{}\n", rendered_text(transcript, index, expand_tasks))?;
    stdout.flush()
}
