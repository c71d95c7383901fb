use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use cloudide::api::ApiClient;
use cloudide::config::Config;
use cloudide::content_sync::SaveStatus;
use cloudide::model::{NodeId, ProjectId};
use cloudide::path_resolver::ParentSelection;
use cloudide::session::IdeSession;
use cloudide::terminal::transport::spawn_transport;
use cloudide::terminal::{
    CommandHistory, ConnectionState, SessionTarget, TerminalSessionClient,
};
use cloudide::upload::{CandidateFile, UploadValidator};

#[derive(Parser)]
#[command(name = "cloudide", version, about = "Command-line driver for the IDE session core")]
struct Cli {
    /// File-storage API root (overrides config).
    #[arg(long, env = "CLOUDIDE_API_URL", global = true)]
    api_url: Option<String>,
    /// Terminal websocket endpoint (overrides config).
    #[arg(long, env = "CLOUDIDE_TERMINAL_URL", global = true)]
    terminal_url: Option<String>,
    /// User id sent when starting a terminal.
    #[arg(long, global = true)]
    user: Option<String>,
    /// Alternative config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal bound to the project's backend shell.
    Terminal {
        #[arg(long)]
        project: String,
    },
    /// List the project's files and folders.
    Files {
        #[arg(long)]
        project: String,
    },
    /// Create a file or folder.
    Create {
        #[arg(long)]
        project: String,
        /// Parent folder id; root when omitted.
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        folder: bool,
        name: String,
    },
    /// Upload local text files to the project root.
    Upload {
        #[arg(long)]
        project: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Replace a file's content with a local file and save it.
    Edit {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file: String,
        #[arg(long)]
        from: PathBuf,
    },
}

fn init_logging() -> Result<()> {
    // Log to file if CLOUDIDE_LOG_FILE is set, otherwise stderr
    let log_writer: Box<dyn io::Write + Send> = match std::env::var("CLOUDIDE_LOG_FILE") {
        Ok(path) => Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {path}"))?,
        ),
        Err(_) => Box::new(io::stderr()),
    };
    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(log_writer))
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().context("Failed to load config")?,
    };
    if let Some(url) = cli.api_url {
        config.server.api_url = url;
    }
    if let Some(url) = cli.terminal_url {
        config.server.terminal_url = url;
    }
    if let Some(user) = cli.user {
        config.user_id = Some(user);
    }
    info!(api_url = %config.server.api_url, "cloudide starting");

    match cli.command {
        Command::Terminal { project } => run_terminal(&config, ProjectId::new(project)).await,
        Command::Files { project } => {
            let session = load_session(&config, &project).await?;
            let mut nodes: Vec<_> = session.files().iter().collect();
            nodes.sort_by(|a, b| a.path.cmp(&b.path));
            println!("{} ({})", session.project().name, session.project().id);
            for node in nodes {
                let marker = if node.is_folder { "/" } else { "" };
                println!("  {}{}  [{}]", node.path, marker, node.id);
            }
            Ok(())
        }
        Command::Create {
            project,
            parent,
            folder,
            name,
        } => {
            let mut session = load_session(&config, &project).await?;
            let parent = ParentSelection::from(parent.map(NodeId::new));
            let node = session.create_entry(parent, &name, folder).await?;
            println!("created {} [{}]", node.path, node.id);
            Ok(())
        }
        Command::Upload { project, paths } => {
            let mut session = load_session(&config, &project).await?;
            let candidates: Vec<_> = paths.into_iter().map(CandidateFile::from_path).collect();
            let report = session.upload(&candidates).await?;
            for node in &report.created {
                println!("uploaded {} [{}]", node.path, node.id);
            }
            for rejected in &report.rejected {
                println!("skipped  {}: {}", rejected.name, rejected.reason);
            }
            for failed in &report.failed {
                println!("failed   {}: {}", failed.name, failed.error);
            }
            Ok(())
        }
        Command::Edit {
            project,
            file,
            from,
        } => {
            let mut session = load_session(&config, &project).await?;
            let file_id = NodeId::new(file);
            let content = tokio::fs::read_to_string(&from)
                .await
                .with_context(|| format!("Failed to read {}", from.display()))?;
            session.open(&file_id)?;
            session.edit_content(&file_id, content);
            let result = session.save().await;
            match session.save_status() {
                SaveStatus::Saved { at } => println!("saved {} at {}", file_id, at.format("%H:%M:%S")),
                SaveStatus::Failed(err) => println!("save failed: {err}"),
                SaveStatus::Idle | SaveStatus::Saving => {}
            }
            result.map(|_| ()).map_err(Into::into)
        }
    }
}

async fn load_session(config: &Config, project: &str) -> Result<IdeSession<ApiClient>> {
    let api = ApiClient::new(&config.server.api_url);
    let uploader = UploadValidator::new(config.upload.max_file_bytes);
    IdeSession::load(api, &ProjectId::new(project), uploader)
        .await
        .with_context(|| format!("Failed to load project {project}"))
}

/// Print log lines not yet shown. The log shrinks when cleared or restarted.
fn print_new_output(client: &TerminalSessionClient, printed: usize) -> usize {
    let log = client.output_log();
    let start = if log.len() < printed { 0 } else { printed };
    for line in &log[start..] {
        println!("{line}");
    }
    log.len()
}

async fn run_terminal(config: &Config, project_id: ProjectId) -> Result<()> {
    let url = config.terminal_url()?;
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
    let transport = spawn_transport(url, out_rx, ev_tx);

    let history = CommandHistory::with_limit(config.terminal.history_limit);
    let mut client = TerminalSessionClient::new(out_tx, history);
    let target = SessionTarget {
        project_id,
        user_id: config.resolved_user_id(),
    };
    client.start(target.clone())?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut quitting = false;
    let mut printed = 0usize;

    loop {
        tokio::select! {
            event = ev_rx.recv() => {
                let Some(event) = event else { break };
                let was_ready = client.is_ready();
                client.handle_event(event);
                printed = print_new_output(&client, printed);
                if client.is_ready() && !was_ready {
                    eprintln!("[ready]");
                }
                if client.state() == ConnectionState::Disconnected && !client.is_stopping() {
                    if quitting {
                        break;
                    }
                    eprintln!("[disconnected, :restart to reconnect]");
                }
            }
            line = stdin.next_line(), if stdin_open => {
                let line = line.context("Failed to read stdin")?;
                let Some(line) = line else {
                    stdin_open = false;
                    quitting = true;
                    if !client.stop() {
                        break;
                    }
                    continue;
                };
                match line.trim() {
                    ":quit" => {
                        quitting = true;
                        if !client.stop() {
                            break;
                        }
                    }
                    ":clear" => {
                        client.clear();
                        printed = 0;
                    }
                    ":restart" => {
                        if let Err(e) = client.restart(target.clone()) {
                            eprintln!("[{e}]");
                        }
                    }
                    ":history" => {
                        for (i, cmd) in client.history().entries().iter().enumerate() {
                            println!("{:>4}  {cmd}", i + 1);
                        }
                    }
                    ":up" => {
                        if let Some(cmd) = client.history_up() {
                            eprintln!("> {cmd}");
                        }
                    }
                    ":down" => {
                        if let Some(cmd) = client.history_down() {
                            eprintln!("> {cmd}");
                        }
                    }
                    _ => {
                        if let Err(e) = client.send_command(&line) {
                            warn!(error = %e, "Command not sent");
                            eprintln!("[{e}]");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                quitting = true;
                if !client.stop() {
                    break;
                }
            }
        }
    }

    drop(client);
    let _ = transport.await;
    Ok(())
}
