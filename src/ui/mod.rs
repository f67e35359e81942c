//! Terminal UI
//!
//! Built with ratatui. The player screen is a view over a running
//! [`PlaybackSession`]; terminal input is read on a blocking thread and fed
//! back to the session as user actions.

pub mod player;
pub mod theme;

pub use player::PlayerView;
pub use theme::Theme;

use std::io::{stdout, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, warn};

use crate::app::App;
use crate::stream::media::MediaElement;
use crate::stream::session::{PlaybackSession, SessionEvent};

/// Terminal type alias for convenience
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Repaint interval, for the clock and toast expiry
const REDRAW_RATE: Duration = Duration::from_millis(250);

const INPUT_POLL: Duration = Duration::from_millis(100);

/// Initialize the terminal for the player screen
pub fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state
pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draw one frame of the player screen
pub fn draw<M: MediaElement>(frame: &mut Frame, session: &PlaybackSession<M>, app: &mut App) {
    let notice = app.active_notice().map(|n| n.message.clone());
    let fallback_url = session.fallback_url();
    let view = PlayerView {
        title: session.title(),
        phase: session.phase(),
        state: session.state(),
        notice: notice.as_deref(),
        fallback_url: &fallback_url,
        show_help: app.show_help,
    };
    view.render(frame, frame.area());
}

/// Run the player screen until the session closes.
///
/// The session must already be started; the terminal is restored even when
/// drawing fails.
pub async fn run_player<M: MediaElement>(session: &mut PlaybackSession<M>) -> Result<()> {
    let mut terminal = init_terminal()?;
    let mut app = App::new();

    let result = run_event_loop(&mut terminal, session, &mut app).await;

    // Closing twice is a no-op; covers the error path
    session.close().await;
    restore_terminal(&mut terminal)?;
    result
}

async fn run_event_loop<M: MediaElement>(
    terminal: &mut Tui,
    session: &mut PlaybackSession<M>,
    app: &mut App,
) -> Result<()> {
    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let stop = Arc::new(AtomicBool::new(false));
    let reader = spawn_input_reader(input_tx, stop.clone());

    let mut redraw = time::interval(REDRAW_RATE);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result = loop {
        app.push_notices(session.take_notices());
        if let Err(e) = terminal.draw(|frame| draw(frame, session, app)) {
            break Err(e.into());
        }
        if session.is_closed() || !app.running {
            break Ok(());
        }

        tokio::select! {
            Some(event) = session.next_event() => session.dispatch(event).await,
            Some(input) = input_rx.recv() => {
                let duration = session.state().duration_seconds;
                let action = match input {
                    Event::Key(key) => app.handle_key(key, duration),
                    Event::Mouse(mouse) => app.handle_mouse(mouse),
                    _ => None,
                };
                if let Some(action) = action {
                    debug!("Input {:?}", action);
                    session.dispatch(SessionEvent::User(action)).await;
                }
            }
            _ = redraw.tick() => {}
        }
    };

    stop.store(true, Ordering::Relaxed);
    let _ = reader.await;
    result
}

/// Forward terminal events until `stop` is set or the receiver goes away
fn spawn_input_reader(
    tx: mpsc::UnboundedSender<Event>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Terminal read failed: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("Terminal poll failed: {}", e);
                    break;
                }
            }
        }
    })
}
