//! Player screen
//!
//! Title, progress bar, elapsed/remaining time and key hints while media is
//! loaded; a loading screen before that and an error screen with retry and
//! direct-open options when the attempt fails.

use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Wrap},
};

use crate::models::{format_time, ErrorInfo, PlaybackPhase, PlaybackState};
use crate::ui::Theme;

/// Key hints shown in the controls bar
const HINTS: [(&str, &str); 6] = [
    ("space", "play/pause"),
    ("←/→", "-15s/+15s"),
    ("0-9", "jump"),
    ("f", "fullscreen"),
    ("?", "help"),
    ("q", "back"),
];

/// Snapshot of what to draw for one frame
#[derive(Debug)]
pub struct PlayerView<'a> {
    pub title: &'a str,
    pub phase: PlaybackPhase,
    pub state: &'a PlaybackState,
    /// Toast text, if one is showing
    pub notice: Option<&'a str>,
    /// Where to open the content outside the player
    pub fallback_url: &'a str,
    pub show_help: bool,
}

/// Elapsed and remaining labels, as `m:ss` and `-m:ss`
pub fn time_labels(state: &PlaybackState) -> (String, String) {
    (
        format_time(state.current_time_seconds),
        format!("-{}", format_time(state.remaining_seconds())),
    )
}

impl<'a> PlayerView<'a> {
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Block::default().style(Theme::text()), area);

        match self.phase {
            PlaybackPhase::Loading => self.render_loading(frame, area),
            PlaybackPhase::LoadError => self.render_error(frame, area),
            _ => self.render_playback(frame, area),
        }

        if let Some(notice) = self.notice {
            render_notice(frame, area, notice);
        }
        if self.show_help {
            render_help(frame, area);
        }
    }

    fn render_loading(&self, frame: &mut Frame, area: Rect) {
        let lines = vec![
            Line::styled(self.title, Theme::title()),
            Line::default(),
            Line::styled("Loading...", Theme::loading()),
        ];
        let rect = centered(area, 60, 5);
        frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), rect);
    }

    fn render_error(&self, frame: &mut Frame, area: Rect) {
        let (heading, detail) = match &self.state.load_error {
            Some(ErrorInfo::Resolution { message }) => {
                ("Content unavailable", message.clone())
            }
            Some(err @ ErrorInfo::Media { .. }) => ("Playback failed", err.to_string()),
            None => ("Playback failed", String::new()),
        };

        let lines = vec![
            Line::styled(heading, Theme::error()),
            Line::default(),
            Line::styled(detail, Theme::text()),
            Line::default(),
            Line::from(vec![
                Span::styled("[r]", Theme::keybind()),
                Span::styled(" Retry   ", Theme::keybind_desc()),
                Span::styled("[q]", Theme::keybind()),
                Span::styled(" Back", Theme::keybind_desc()),
            ]),
            Line::default(),
            Line::styled("Open directly:", Theme::muted()),
            Line::styled(self.fallback_url, Theme::link()),
        ];

        let rect = centered(area, 70, 12);
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Theme::error());
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(lines)
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            rect,
        );
    }

    fn render_playback(&self, frame: &mut Frame, area: Rect) {
        let [header, body, controls] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .areas(area);

        let status = Paragraph::new(Line::styled(self.phase.to_string(), Theme::muted()))
            .alignment(Alignment::Center);
        let [_, middle, _] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .areas(body);
        frame.render_widget(status, middle);

        if !self.state.controls_visible {
            return;
        }

        frame.render_widget(
            Paragraph::new(Line::styled(self.title, Theme::title())),
            header,
        );
        self.render_controls(frame, controls);
    }

    fn render_controls(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Block::default().style(Theme::panel()), area);

        let [bar, times, hints] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Gauge::default()
                .gauge_style(Theme::progress_bar())
                .ratio(self.state.progress())
                .label(""),
            bar,
        );

        let (elapsed, remaining) = time_labels(self.state);
        let [left, right] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).areas(times);
        frame.render_widget(Paragraph::new(elapsed).style(Theme::time()), left);
        frame.render_widget(
            Paragraph::new(remaining)
                .style(Theme::time())
                .alignment(Alignment::Right),
            right,
        );

        let mut spans = Vec::new();
        for (key, desc) in HINTS {
            spans.push(Span::styled(key, Theme::keybind()));
            spans.push(Span::styled(format!(" {}  ", desc), Theme::keybind_desc()));
        }
        if self.state.fullscreen {
            spans.push(Span::styled("[fullscreen]", Theme::muted()));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), hints);
    }
}

fn render_notice(frame: &mut Frame, area: Rect, notice: &str) {
    let width = (notice.chars().count() as u16 + 4).min(area.width);
    let rect = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + 1.min(area.height.saturating_sub(1)),
        width,
        height: 1,
    };
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(format!("  {}  ", notice)).style(Theme::notice()),
        rect,
    );
}

fn render_help(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from("space / k     play or pause"),
        Line::from("→ / l         forward 15s"),
        Line::from("← / j         back 15s"),
        Line::from("0-9           jump to 0%-90%"),
        Line::from("home / end    start / end"),
        Line::from("f             fullscreen"),
        Line::from("n / p         next / previous episode"),
        Line::from("r             retry after an error"),
        Line::from("q / esc       close"),
    ];
    let rect = centered(area, 44, lines.len() as u16 + 2);
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines).style(Theme::text()).block(
            Block::default()
                .title(" Keys ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Theme::keybind()),
        ),
        rect,
    );
}

/// Rect of at most `width` x `height` centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
