//! Text measurement without embedded fonts.
//!
//! Width estimation uses per-glyph advance factors tuned for common
//! sans-serif faces; the SVG itself falls back to the system font. Good
//! enough for margins and legend boxes, not for typography.

use crate::primitives::TextStyle;

#[derive(Debug, Clone, Copy)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
}

fn advance_factor(ch: char) -> f64 {
    match ch {
        'i' | 'j' | 'l' | '.' | ',' | '\'' | '|' | '!' => 0.28,
        'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' | ' ' => 0.35,
        'm' | 'M' | 'W' | 'w' => 0.85,
        '0'..='9' => 0.55,
        'A'..='Z' => 0.68,
        _ => 0.52,
    }
}

/// Estimate rendered text extent for a style.
pub fn measure_text(content: &str, style: &TextStyle) -> TextMetrics {
    let bold_factor = match style.weight {
        crate::primitives::FontWeight::Bold => 1.05,
        crate::primitives::FontWeight::Regular => 1.0,
    };
    let width: f64 = content.chars().map(advance_factor).sum::<f64>() * style.size * bold_factor;
    TextMetrics { width, height: style.size * 1.2 }
}
