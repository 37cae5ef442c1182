//! agentlink
//!
//! Lets an external command-line agent observe and drive a running editor
//! session: per-project loopback WebSocket, lockfile discovery, token auth,
//! and debounced selection updates.

mod auth;
mod cmd_status;
mod config;
mod debounce;
mod debug_log;
mod dispatch;
mod editor;
mod error;
mod handlers;
mod host;
mod lockfile;
mod logging;
mod notify;
mod paths;
mod session;
mod state;
mod websocket;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{Config, DEFAULT_DEBOUNCE_MS, DEFAULT_IDE_NAME};
use crate::debug_log::DebugLog;
use crate::editor::HostEditorState;
use crate::host::Host;
use crate::state::SessionRegistry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "agentlink", version, about = "Editor session bridge for command-line agents")]
struct Cli {
    /// Directory for lockfiles and logs
    #[arg(long, env = "AGENTLINK_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge, reading host commands from stdin
    Serve(ServeArgs),
    /// List advertised sessions
    Status,
}

#[derive(Args)]
struct ServeArgs {
    /// Start a session for this project immediately
    #[arg(long)]
    project: Option<PathBuf>,

    /// Host identifier written to lockfiles
    #[arg(long, env = "AGENTLINK_IDE_NAME", default_value = DEFAULT_IDE_NAME)]
    ide_name: String,

    /// Selection notification quiescence window
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    debounce_ms: u64,

    /// Reject requests other than authenticate/ping until the peer authenticates
    #[arg(long)]
    require_auth: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = paths::resolve_data_dir(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Status => cmd_status::run(&data_dir),
        Command::Serve(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve(data_dir, args))
        }
    }
}

async fn serve(data_dir: PathBuf, args: ServeArgs) -> anyhow::Result<()> {
    let _logging = logging::init_logging(&data_dir, &logging::LogSettings::from_env())?;

    let mut config = Config::new(data_dir);
    config.ide_name = args.ide_name;
    config.debounce = Duration::from_millis(args.debounce_ms);
    config.require_auth = args.require_auth;

    info!(
        component = "main",
        event = "serve.starting",
        data_dir = %config.data_dir.display(),
        ide_name = %config.ide_name,
        require_auth = config.require_auth,
        "Starting agentlink"
    );

    let editor = Arc::new(HostEditorState::new());
    let registry = Arc::new(SessionRegistry::new(
        config,
        editor.clone(),
        Arc::new(DebugLog::new()),
    ));
    let host = Host::new(Arc::clone(&registry), editor);

    let mut stdout = tokio::io::stdout();
    if let Some(project) = args.project {
        let reply = host.start(&project.to_string_lossy()).await;
        host::write_reply(&mut stdout, &reply).await?;
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = tokio::select! {
        result = host::run(&host, stdin, stdout) => result,
        _ = tokio::signal::ctrl_c() => {
            info!(component = "main", event = "serve.interrupted", "Interrupted");
            Ok(())
        }
    };

    registry.stop_all().await;
    info!(component = "main", event = "serve.stopped", "agentlink stopped");
    result
}
