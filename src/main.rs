//! streamify - StreamHive in the terminal
//!
//! # Usage
//!
//! ```bash
//! streamify login me@example.com --password secret
//! streamify watch 42 -s 1 -e 3
//! streamify progress --json
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use streamify::cli::{Cli, Command, ExitCode, Output};
use streamify::commands::{self, Context};
use streamify::config::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging();

    let exit_code = run_cli(cli).await;
    exit_code.into()
}

/// Log to `<data dir>/streamify/streamify.log`; the player screen owns the terminal
fn init_logging() {
    let Some(path) = log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("streamify=info")),
        )
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
}

fn log_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("streamify").join("streamify.log"))
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match &cli.config {
        Some(path) => Config::load_from(path).with_env_overrides(),
        None => Config::load(),
    };
    let ctx = Context::new(config, cli.storage.clone());

    match cli.command {
        Command::Login(cmd) => commands::login_cmd(cmd, &ctx, &output).await,
        Command::Logout => commands::logout_cmd(&ctx, &output).await,
        Command::Search(cmd) => commands::search_cmd(cmd, &ctx, &output).await,
        Command::Info(cmd) => commands::info_cmd(cmd, &ctx, &output).await,
        Command::Resolve(args) => commands::resolve_cmd(args, &ctx, &output).await,
        Command::Watch(cmd) => commands::watch_cmd(cmd, &ctx, &output).await,
        Command::Progress(cmd) => commands::progress_cmd(cmd, &ctx, &output).await,
        Command::Continue => commands::continue_cmd(&ctx, &output).await,
        Command::Forget(cmd) => commands::forget_cmd(cmd, &ctx, &output).await,
        Command::Favorites(cmd) => commands::favorites_cmd(cmd, &ctx, &output).await,
    }
}
