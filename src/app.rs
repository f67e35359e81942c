//! App state and input mapping
//!
//! Translates terminal input into session [`UserAction`]s and keeps the bits
//! of screen state the playback session does not own: the toast currently on
//! screen, the help overlay and whether the app should keep running.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

use crate::models::Notice;
use crate::stream::session::UserAction;

// =============================================================================
// Main Application State
// =============================================================================

/// Screen state around a playback session
#[derive(Debug)]
pub struct App {
    /// Whether the app is running
    pub running: bool,
    /// Key help overlay
    pub show_help: bool,
    /// Toast currently on screen
    pub notice: Option<Notice>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            running: true,
            show_help: false,
            notice: None,
        }
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Show the newest of `notices`, replacing the current toast
    pub fn push_notices(&mut self, notices: Vec<Notice>) {
        if let Some(latest) = notices.into_iter().last() {
            self.notice = Some(latest);
        }
    }

    /// Current toast, dropping it once expired
    pub fn active_notice(&mut self) -> Option<&Notice> {
        if self.notice.as_ref().is_some_and(Notice::is_expired) {
            self.notice = None;
        }
        self.notice.as_ref()
    }

    // -------------------------------------------------------------------------
    // Input Handling
    // -------------------------------------------------------------------------

    /// Map a key press to a session action.
    ///
    /// `duration` is the media duration, used by the number keys to jump to
    /// a tenth of the way through.
    pub fn handle_key(&mut self, key: KeyEvent, duration: f64) -> Option<UserAction> {
        if key.kind == KeyEventKind::Release {
            return None;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit();
            return Some(UserAction::Close);
        }

        let action = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                    UserAction::Activity
                } else {
                    self.quit();
                    UserAction::Close
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('k') => UserAction::TogglePlayPause,
            KeyCode::Right | KeyCode::Char('l') => UserAction::SkipForward,
            KeyCode::Left | KeyCode::Char('j') => UserAction::SkipBackward,
            KeyCode::Char('f') => UserAction::ToggleFullscreen,
            KeyCode::Char('r') => UserAction::Retry,
            KeyCode::Char('n') => UserAction::NextEpisode,
            KeyCode::Char('p') => UserAction::PreviousEpisode,
            KeyCode::Home => UserAction::SeekTo(0.0),
            KeyCode::End => UserAction::SeekTo(duration),
            KeyCode::Char(c @ '0'..='9') => {
                let tenth = c.to_digit(10).unwrap_or(0) as f64;
                UserAction::SeekTo(duration * tenth / 10.0)
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                UserAction::Activity
            }
            _ => UserAction::Activity,
        };
        Some(action)
    }

    /// Any pointer movement or click counts as activity
    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> Option<UserAction> {
        match mouse.kind {
            MouseEventKind::ScrollUp => Some(UserAction::SkipForward),
            MouseEventKind::ScrollDown => Some(UserAction::SkipBackward),
            _ => Some(UserAction::Activity),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use tokio::time::Duration;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::empty())
    }

    #[test]
    fn test_playback_keys() {
        let mut app = App::new();
        assert_eq!(
            app.handle_key(press(KeyCode::Char(' ')), 100.0),
            Some(UserAction::TogglePlayPause)
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Right), 100.0),
            Some(UserAction::SkipForward)
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Char('j')), 100.0),
            Some(UserAction::SkipBackward)
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Char('f')), 100.0),
            Some(UserAction::ToggleFullscreen)
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Char('r')), 100.0),
            Some(UserAction::Retry)
        );
        assert!(app.running);
    }

    #[test]
    fn test_episode_keys() {
        let mut app = App::new();
        assert_eq!(
            app.handle_key(press(KeyCode::Char('n')), 100.0),
            Some(UserAction::NextEpisode)
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Char('p')), 100.0),
            Some(UserAction::PreviousEpisode)
        );
    }

    #[test]
    fn test_number_keys_seek_by_tenths() {
        let mut app = App::new();
        assert_eq!(
            app.handle_key(press(KeyCode::Char('5')), 600.0),
            Some(UserAction::SeekTo(300.0))
        );
        assert_eq!(
            app.handle_key(press(KeyCode::Char('0')), 600.0),
            Some(UserAction::SeekTo(0.0))
        );
    }

    #[test]
    fn test_unmapped_key_is_activity() {
        let mut app = App::new();
        assert_eq!(
            app.handle_key(press(KeyCode::Char('x')), 100.0),
            Some(UserAction::Activity)
        );
    }

    #[test]
    fn test_key_release_ignored() {
        let mut app = App::new();
        let release = KeyEvent {
            code: KeyCode::Char(' '),
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(app.handle_key(release, 100.0), None);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = App::new();
        assert_eq!(app.handle_key(press(KeyCode::Char('q')), 0.0), Some(UserAction::Close));
        assert!(!app.running);

        let mut app = App::new();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(ctrl_c, 0.0), Some(UserAction::Close));
        assert!(!app.running);
    }

    #[test]
    fn test_escape_closes_help_first() {
        let mut app = App::new();
        app.handle_key(press(KeyCode::Char('?')), 0.0);
        assert!(app.show_help);

        assert_eq!(app.handle_key(press(KeyCode::Esc), 0.0), Some(UserAction::Activity));
        assert!(!app.show_help);
        assert!(app.running);
    }

    #[test]
    fn test_mouse_is_activity() {
        let mut app = App::new();
        let moved = MouseEvent {
            kind: MouseEventKind::Moved,
            column: 3,
            row: 4,
            modifiers: KeyModifiers::empty(),
        };
        assert_eq!(app.handle_mouse(moved), Some(UserAction::Activity));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notice_expires() {
        let mut app = App::new();
        app.push_notices(vec![Notice::new("Resuming", Duration::from_secs(3))]);
        assert!(app.active_notice().is_some());

        tokio::time::advance(Duration::from_millis(3001)).await;
        assert!(app.active_notice().is_none());
        assert!(app.notice.is_none());
    }
}
