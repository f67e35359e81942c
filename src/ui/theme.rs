//! Player theme
//!
//! Dark palette with a warm accent for the playback screen, plus the
//! contrast helpers the palette is checked against.

use ratatui::style::{Color, Modifier, Style};

/// Color palette and style helpers
pub struct Theme;

impl Theme {
    // ═══════════════════════════════════════════════════════════════════════
    // CORE PALETTE
    // ═══════════════════════════════════════════════════════════════════════

    /// Background: #0b0d12
    pub const BACKGROUND: Color = Color::Rgb(0x0b, 0x0d, 0x12);

    /// Panel background for the controls bar: #161a23
    pub const PANEL: Color = Color::Rgb(0x16, 0x1a, 0x23);

    /// Accent: #ffb020 (amber)
    pub const ACCENT: Color = Color::Rgb(0xff, 0xb0, 0x20);

    /// Text: #e6e6e6
    pub const TEXT: Color = Color::Rgb(0xe6, 0xe6, 0xe6);

    /// Muted: #7a8090
    pub const MUTED: Color = Color::Rgb(0x7a, 0x80, 0x90);

    /// Track behind the progress bar: #2a2f3a
    pub const TRACK: Color = Color::Rgb(0x2a, 0x2f, 0x3a);

    /// Error: #ff4d5e
    pub const ERROR: Color = Color::Rgb(0xff, 0x4d, 0x5e);

    /// Notice: #4dd9ff
    pub const NOTICE: Color = Color::Rgb(0x4d, 0xd9, 0xff);

    // ═══════════════════════════════════════════════════════════════════════
    // STYLE HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn text() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::BACKGROUND)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Self::TEXT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn muted() -> Style {
        Style::default().fg(Self::MUTED)
    }

    /// Elapsed/remaining time labels
    pub fn time() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::PANEL)
    }

    pub fn panel() -> Style {
        Style::default().bg(Self::PANEL)
    }

    pub fn progress_bar() -> Style {
        Style::default().fg(Self::ACCENT).bg(Self::TRACK)
    }

    pub fn keybind() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn keybind_desc() -> Style {
        Style::default().fg(Self::MUTED)
    }

    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    pub fn notice() -> Style {
        Style::default()
            .fg(Self::BACKGROUND)
            .bg(Self::NOTICE)
            .add_modifier(Modifier::BOLD)
    }

    /// Loading spinner
    pub fn loading() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    /// Link shown on the error screen
    pub fn link() -> Style {
        Style::default()
            .fg(Self::NOTICE)
            .add_modifier(Modifier::UNDERLINED)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// COLOR UTILITIES
// ═══════════════════════════════════════════════════════════════════════════

/// Relative luminance of an sRGB color (WCAG 2.0)
pub fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    fn channel(c: u8) -> f64 {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    0.2126 * channel(r) + 0.7152 * channel(g) + 0.0722 * channel(b)
}

/// Contrast ratio between two colors, 1.0 to 21.0
pub fn contrast_ratio(fg: (u8, u8, u8), bg: (u8, u8, u8)) -> f64 {
    let l1 = relative_luminance(fg.0, fg.1, fg.2);
    let l2 = relative_luminance(bg.0, bg.1, bg.2);
    let (lighter, darker) = if l1 > l2 { (l1, l2) } else { (l2, l1) };
    (lighter + 0.05) / (darker + 0.05)
}

pub fn color_to_rgb(color: Color) -> Option<(u8, u8, u8)> {
    match color {
        Color::Rgb(r, g, b) => Some((r, g, b)),
        _ => None,
    }
}
