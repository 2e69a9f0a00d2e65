use std::fmt::Display;

use crossterm::style::{Color, Stylize};

use crate::model::{Priority, ThemeMode, UiConfig};
use crate::ops::reconcile::StepStatus;

/// Terminal palette for human output
#[derive(Debug, Clone)]
pub struct Theme {
    pub text: Color,
    pub text_bright: Color,
    pub highlight: Color,
    pub dim: Color,
    pub red: Color,
    pub yellow: Color,
    pub green: Color,
    pub cyan: Color,
    pub purple: Color,
    /// false when colors are disabled; `paint` then returns plain text
    pub enabled: bool,
}

impl Theme {
    pub fn dark() -> Self {
        Theme {
            text: Color::Rgb { r: 0xB0, g: 0xAA, b: 0xFF },
            text_bright: Color::Rgb { r: 0xFF, g: 0xFF, b: 0xFF },
            highlight: Color::Rgb { r: 0xFB, g: 0x41, b: 0x96 },
            dim: Color::Rgb { r: 0x7D, g: 0x78, b: 0xBF },
            red: Color::Rgb { r: 0xFF, g: 0x44, b: 0x44 },
            yellow: Color::Rgb { r: 0xFF, g: 0xD7, b: 0x00 },
            green: Color::Rgb { r: 0x44, g: 0xFF, b: 0x88 },
            cyan: Color::Rgb { r: 0x44, g: 0xDD, b: 0xFF },
            purple: Color::Rgb { r: 0xCC, g: 0x66, b: 0xFF },
            enabled: true,
        }
    }

    pub fn light() -> Self {
        Theme {
            text: Color::Rgb { r: 0x33, g: 0x30, b: 0x4D },
            text_bright: Color::Rgb { r: 0x00, g: 0x00, b: 0x00 },
            highlight: Color::Rgb { r: 0xC2, g: 0x18, b: 0x5B },
            dim: Color::Rgb { r: 0x80, g: 0x7C, b: 0x99 },
            red: Color::Rgb { r: 0xC6, g: 0x28, b: 0x28 },
            yellow: Color::Rgb { r: 0xB2, g: 0x6A, b: 0x00 },
            green: Color::Rgb { r: 0x2E, g: 0x7D, b: 0x32 },
            cyan: Color::Rgb { r: 0x00, g: 0x83, b: 0x8F },
            purple: Color::Rgb { r: 0x6A, g: 0x1B, b: 0x9A },
            enabled: true,
        }
    }

    pub fn plain() -> Self {
        Theme {
            enabled: false,
            ..Theme::dark()
        }
    }

    /// Palette for the configured mode. `NO_COLOR` and `ui.color = false`
    /// both turn styling off.
    pub fn from_config(ui: &UiConfig) -> Self {
        if !ui.color || std::env::var_os("NO_COLOR").is_some() {
            return Theme::plain();
        }
        match ui.theme {
            ThemeMode::Dark => Theme::dark(),
            ThemeMode::Light => Theme::light(),
        }
    }

    pub fn paint(&self, text: impl Display, color: Color) -> String {
        if self.enabled {
            text.to_string().with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: impl Display) -> String {
        if self.enabled {
            text.to_string().with(self.text_bright).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn priority_color(&self, priority: Priority) -> Color {
        match priority {
            Priority::Low => self.dim,
            Priority::Medium => self.yellow,
            Priority::High => self.red,
        }
    }

    pub fn status_color(&self, status: StepStatus) -> Color {
        match status {
            StepStatus::Pending => self.dim,
            StepStatus::Processing => self.cyan,
            StepStatus::Done => self.green,
            StepStatus::Error => self.red,
        }
    }

    pub fn tag_color(&self) -> Color {
        self.purple
    }
}
