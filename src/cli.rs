//! CLI - Command Line Interface for streamify
//!
//! `watch` opens the interactive player; every other command is scriptable
//! and prints JSON with `--json` (the default when stdout is not a TTY).
//!
//! # Examples
//!
//! ```bash
//! # Log in once, the token is kept in local storage
//! streamify login me@example.com --password hunter2
//!
//! # Watch a movie, or a specific episode of a series
//! streamify watch 42
//! streamify watch 42 -s 1 -e 3
//!
//! # Find something, keep it for later
//! streamify search "dark"
//! streamify favorites add 42
//!
//! # Where did I stop?
//! streamify progress --remote --json
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Content, season or episode not found
    NotFound = 4,
    /// No stored session token, or the server rejected it
    NotAuthenticated = 5,
    /// Player failed to start or the media failed to load
    PlaybackFailed = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// streamify - StreamHive in the terminal
#[derive(Parser, Debug)]
#[command(
    name = "streamify",
    version,
    about = "Terminal client for StreamHive with resumable playback",
    long_about = "Watch StreamHive movies and series through mpv. Playback \
                  resumes where you left off and progress is synced to your \
                  account every 30 seconds.",
    arg_required_else_help = true,
    after_help = "EXAMPLES:\n\
                  streamify login me@example.com -p secret   Log in\n\
                  streamify watch 42                         Watch a movie\n\
                  streamify watch 42 -s 1 -e 3               Watch an episode\n\
                  streamify progress --json                  List resume points"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Path to the local storage file (token, resume positions)
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session token
    Login(LoginCmd),

    /// Forget the stored session
    Logout,

    /// Search the catalog by title
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Show details for a movie or series
    #[command(visible_alias = "i")]
    Info(InfoCmd),

    /// Resolve the playable source without playing it
    Resolve(TargetArgs),

    /// Open the player
    #[command(visible_alias = "w")]
    Watch(WatchCmd),

    /// List saved resume positions
    #[command(visible_alias = "p")]
    Progress(ProgressCmd),

    /// Show the server's continue-watching list
    Continue,

    /// Drop the local resume position for a content id
    Forget(ForgetCmd),

    /// List, add or remove favorites
    #[command(visible_alias = "fav")]
    Favorites(FavoritesCmd),
}

/// Search the catalog
#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Search term (title)
    #[arg(required = true)]
    pub term: String,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Favorites, listed when no action is given
#[derive(Args, Debug)]
pub struct FavoritesCmd {
    #[command(subcommand)]
    pub action: Option<FavoritesAction>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum FavoritesAction {
    /// List favorites
    List,
    /// Add a content id to favorites
    Add { id: String },
    /// Remove a content id from favorites
    #[command(visible_alias = "rm")]
    Remove { id: String },
}

/// Log in with email and password
#[derive(Args, Debug)]
pub struct LoginCmd {
    /// Account email
    #[arg(required = true)]
    pub email: String,

    /// Account password
    #[arg(long, short = 'p')]
    pub password: String,
}

/// Get details for a movie or series
#[derive(Args, Debug)]
pub struct InfoCmd {
    /// StreamHive content id
    #[arg(required = true)]
    pub id: String,
}

/// Content id plus optional season/episode
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// StreamHive content id
    #[arg(required = true)]
    pub id: String,

    /// Season number (series only)
    #[arg(long, short = 's')]
    pub season: Option<u32>,

    /// Episode number (series only)
    #[arg(long, short = 'e')]
    pub episode: Option<u32>,
}

/// Watch a movie or episode
#[derive(Args, Debug)]
pub struct WatchCmd {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Hand the source straight to the player: no overlay, no progress sync
    #[arg(long)]
    pub direct: bool,
}

/// List resume positions
#[derive(Args, Debug)]
pub struct ProgressCmd {
    /// Also fetch progress stored on the server
    #[arg(long, short = 'r')]
    pub remote: bool,
}

/// Forget a resume position
#[derive(Args, Debug)]
pub struct ForgetCmd {
    /// StreamHive content id
    #[arg(required = true)]
    pub id: String,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Status OK response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOk {
    pub status: &'static str,
}

impl Default for StatusOk {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

/// Result of a finished watch session
#[derive(Debug, Serialize, Deserialize)]
pub struct WatchSummary {
    pub content_id: String,
    pub title: String,
    pub phase: String,
    pub position: u64,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
