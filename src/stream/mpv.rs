//! mpv media backend
//!
//! Runs mpv as a child process and drives it over its JSON IPC socket.
//! Property changes observed on the socket are translated into
//! [`MediaEvent`]s for the playback session.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::models::MediaErrorKind;
use crate::stream::media::{MediaElement, MediaError, MediaEvent, MediaEventSink};
use crate::stream::timer::ScheduledTask;

/// Properties observed on every connection
const OBSERVED: [&str; 4] = ["duration", "time-pos", "pause", "eof-reached"];

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_DELAY: Duration = Duration::from_millis(100);

/// Errors from launching an external player
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Player exited with status {0}")]
    Exited(i32),
}

/// Check whether `program` can be found on PATH
pub async fn is_available(program: &str) -> bool {
    if program.contains('/') {
        return Path::new(program).exists();
    }
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Open `url` straight in the player and wait for it to close.
///
/// No session, no progress tracking.
pub async fn open_direct(program: &str, url: &str) -> Result<(), PlayerError> {
    let mut child = Command::new(program)
        .arg(url)
        .arg("--force-window=immediate")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(PlayerError::Exited(status.code().unwrap_or(-1)))
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> PlayerError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PlayerError::NotFound(program.to_string())
    } else {
        PlayerError::StartFailed(e)
    }
}

// =============================================================================
// IPC message mapping
// =============================================================================

/// Per-connection bookkeeping for [`map_ipc_message`]
#[derive(Debug, Default)]
pub struct ReaderState {
    /// Set by the first `start-file`; earlier messages describe whatever
    /// the player had open before this connection's `loadfile`
    started: bool,
    metadata_sent: bool,
    paused: Option<bool>,
}

/// Translate one IPC message into a media event
pub fn map_ipc_message(msg: &Value, state: &mut ReaderState) -> Option<MediaEvent> {
    let event = msg["event"].as_str()?;
    if event == "start-file" {
        state.started = true;
        state.metadata_sent = false;
        return None;
    }
    if !state.started {
        return None;
    }

    match event {
        "end-file" if msg["reason"] == "error" => {
            let detail = msg["file_error"].as_str().unwrap_or("playback failed");
            Some(MediaEvent::Error(MediaError::new(error_kind(detail), detail)))
        }
        "property-change" => {
            let data = &msg["data"];
            match msg["name"].as_str()? {
                "duration" => {
                    let duration = data.as_f64().filter(|d| *d > 0.0)?;
                    if state.metadata_sent {
                        return None;
                    }
                    state.metadata_sent = true;
                    Some(MediaEvent::MetadataLoaded { duration })
                }
                "time-pos" => data
                    .as_f64()
                    .map(|position| MediaEvent::TimeUpdate { position }),
                "pause" => {
                    let paused = data.as_bool()?;
                    if state.paused == Some(paused) {
                        return None;
                    }
                    state.paused = Some(paused);
                    Some(if paused { MediaEvent::Pause } else { MediaEvent::Play })
                }
                "eof-reached" => data.as_bool().filter(|eof| *eof).map(|_| MediaEvent::Ended),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Classify an mpv `file_error` string
pub fn error_kind(detail: &str) -> MediaErrorKind {
    let detail = detail.to_lowercase();
    if detail.contains("unrecognized") || detail.contains("no video") || detail.contains("format") {
        MediaErrorKind::Unsupported
    } else if detail.contains("demux") || detail.contains("decod") {
        MediaErrorKind::Decode
    } else if detail.contains("abort") || detail.contains("quit") {
        MediaErrorKind::Aborted
    } else {
        MediaErrorKind::Network
    }
}

// =============================================================================
// Element
// =============================================================================

/// mpv process driven as a [`MediaElement`]
pub struct MpvElement {
    program: String,
    socket_path: PathBuf,
    child: Option<Child>,
    commands: Option<mpsc::UnboundedSender<Value>>,
    io_task: Option<ScheduledTask>,
    request_id: u64,
}

impl MpvElement {
    pub fn new(program: impl Into<String>) -> Self {
        let socket_path =
            std::env::temp_dir().join(format!("streamify-mpv-{}.sock", uuid::Uuid::new_v4()));
        Self {
            program: program.into(),
            socket_path,
            child: None,
            commands: None,
            io_task: None,
            request_id: 0,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn ensure_running(&mut self) -> Result<(), MediaError> {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(());
            }
            debug!("mpv exited; restarting");
        }
        // Stale socket from a previous process
        let _ = std::fs::remove_file(&self.socket_path);

        let child = Command::new(&self.program)
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg("--idle=yes")
            .arg("--keep-open=yes")
            .arg("--force-window=immediate")
            .arg("--no-terminal")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let message = spawn_error(&self.program, e).to_string();
                MediaError::new(MediaErrorKind::Unsupported, message)
            })?;

        info!("Started {} (ipc {})", self.program, self.socket_path.display());
        self.child = Some(child);
        Ok(())
    }

    fn send(&mut self, args: Value) -> Result<(), MediaError> {
        self.request_id += 1;
        let command = json!({ "command": args, "request_id": self.request_id });
        let sent = self
            .commands
            .as_ref()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false);

        if sent {
            Ok(())
        } else {
            Err(MediaError::new(MediaErrorKind::Aborted, "player is not running"))
        }
    }
}

impl MediaElement for MpvElement {
    fn load(&mut self, url: &str, events: MediaEventSink) -> Result<(), MediaError> {
        // Replaces any previous connection along with its sink
        self.io_task = None;
        self.commands = None;
        self.ensure_running()?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.commands = Some(tx);
        self.io_task = Some(ScheduledTask::run(drive_ipc(
            self.socket_path.clone(),
            rx,
            events,
        )));

        for (id, name) in OBSERVED.iter().enumerate() {
            self.send(json!(["observe_property", id + 1, name]))?;
        }
        self.send(json!(["loadfile", url, "replace"]))?;
        self.send(json!(["set_property", "pause", false]))
    }

    fn play(&mut self) -> Result<(), MediaError> {
        self.send(json!(["set_property", "pause", false]))
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        self.send(json!(["set_property", "pause", true]))
    }

    fn seek(&mut self, position: f64) -> Result<(), MediaError> {
        self.send(json!(["seek", position, "absolute"]))
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), MediaError> {
        self.send(json!(["set_property", "fullscreen", fullscreen]))
    }

    fn detach(&mut self) {
        self.io_task = None;
        self.commands = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("mpv already gone: {}", e);
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl Drop for MpvElement {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn connect(socket_path: &Path) -> std::io::Result<UnixStream> {
    let mut attempt = 0;
    loop {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(e) if attempt + 1 >= CONNECT_ATTEMPTS => return Err(e),
            Err(_) => {
                attempt += 1;
                time::sleep(CONNECT_DELAY).await;
            }
        }
    }
}

/// Pump commands out and events in until either side goes away
async fn drive_ipc(
    socket_path: PathBuf,
    mut commands: mpsc::UnboundedReceiver<Value>,
    events: MediaEventSink,
) {
    let stream = match connect(&socket_path).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Could not connect to mpv ipc: {}", e);
            events.emit(MediaEvent::Error(MediaError::new(
                MediaErrorKind::Aborted,
                format!("player did not start: {}", e),
            )));
            return;
        }
    };

    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut state = ReaderState::default();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Ok(msg) = serde_json::from_str::<Value>(&line) else {
                        debug!("Unparseable ipc line: {}", line);
                        continue;
                    };
                    if let Some(event) = map_ipc_message(&msg, &mut state) {
                        if !events.emit(event) {
                            break;
                        }
                    }
                }
                Ok(None) | Err(_) => {
                    info!("mpv closed the ipc connection");
                    events.emit(MediaEvent::Error(MediaError::new(
                        MediaErrorKind::Aborted,
                        "player closed",
                    )));
                    break;
                }
            },
            command = commands.recv() => {
                let Some(command) = command else { break };
                let line = format!("{}\n", command);
                if let Err(e) = write.write_all(line.as_bytes()).await {
                    warn!("mpv ipc write failed: {}", e);
                    events.emit(MediaEvent::Error(MediaError::new(
                        MediaErrorKind::Aborted,
                        e.to_string(),
                    )));
                    break;
                }
            }
        }
    }
}
