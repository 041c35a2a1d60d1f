//! Terminal display styles.
//!
//! All styles use only named ANSI colors so that colors adapt to the user's
//! terminal theme. Use `Attribute::Dim` / `Attribute::Bold` for emphasis
//! rather than bright color variants.

use crossterm::style::{Attribute, Attributes, Color, ContentStyle};

pub fn dim() -> ContentStyle {
    ContentStyle {
        attributes: Attribute::Dim.into(),
        ..Default::default()
    }
}

/// Diverted server logs.
pub fn dim_italic() -> ContentStyle {
    ContentStyle {
        attributes: Attributes::from(Attribute::Dim) | Attribute::Italic,
        ..Default::default()
    }
}

pub fn file_changed() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Yellow),
        ..Default::default()
    }
}

pub fn file_deleted() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Red),
        attributes: Attribute::Dim.into(),
        ..Default::default()
    }
}

pub fn error() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Red),
        ..Default::default()
    }
}

pub fn result_line() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Green),
        attributes: Attribute::Bold.into(),
        ..Default::default()
    }
}

pub fn prompt_style() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Cyan),
        attributes: Attribute::Bold.into(),
        ..Default::default()
    }
}
