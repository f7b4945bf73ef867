use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#rrggbb`; malformed or truncated components read as zero.
    pub fn hex(s: &str) -> Self {
        let s = s.strip_prefix('#').unwrap_or(s);
        let channel = |range: std::ops::Range<usize>| {
            s.get(range).and_then(|c| u8::from_str_radix(c, 16).ok()).unwrap_or(0)
        };
        Self { r: channel(0..2), g: channel(2..4), b: channel(4..6), a: 1.0 }
    }

    pub const fn with_alpha(mut self, a: f64) -> Self {
        self.a = a;
        self
    }

    pub fn to_svg_fill(&self) -> String {
        if (self.a - 1.0).abs() < 1e-6 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({},{},{},{:.3})", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_svg_fill())
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0, 0, 0)
    }
}

/// Fixed per-process palette.
pub fn sample_color(sample: &str) -> Color {
    match sample {
        "hqq" | "hbb" => Color::hex("#0000ff"),
        "hcc" => Color::hex("#8b0000"),
        "wqq" => Color::hex("#90ee90"),
        "wcq" => Color::hex("#008000"),
        "qcd" => Color::hex("#808080"),
        "tqq" => Color::hex("#dda0dd"),
        "zbb" => Color::hex("#1e90ff"),
        "zcc" => Color::hex("#ff0000"),
        "zqq" => Color::hex("#40e0d0"),
        _ => Color::rgb(0, 0, 0),
    }
}
