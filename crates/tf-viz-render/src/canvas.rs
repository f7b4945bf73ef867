//! Immediate-mode SVG canvas. Coordinates in points (1pt = 1/72").

use std::fmt::Write as FmtWrite;

use crate::primitives::*;
use crate::text::{measure_text, TextMetrics};

#[derive(Debug, Clone)]
enum SvgElement {
    Rect { x: f64, y: f64, w: f64, h: f64, style: Style },
    Line { x1: f64, y1: f64, x2: f64, y2: f64, style: LineStyle },
    Polyline { points: Vec<(f64, f64)>, style: LineStyle },
    Text { x: f64, y: f64, content: String, style: TextStyle, rotate: Option<f64> },
    Path { d: String, style: Style },
    Circle { cx: f64, cy: f64, r: f64, style: Style },
}

pub struct Canvas {
    pub width: f64,
    pub height: f64,
    elements: Vec<SvgElement>,
    defs: Vec<String>,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, elements: Vec::new(), defs: Vec::new() }
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: &Style) {
        self.elements.push(SvgElement::Rect { x, y, w, h, style: style.clone() });
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, style: &LineStyle) {
        self.elements.push(SvgElement::Line { x1, y1, x2, y2, style: style.clone() });
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], style: &LineStyle) {
        if points.len() < 2 {
            return;
        }
        self.elements.push(SvgElement::Polyline { points: points.to_vec(), style: style.clone() });
    }

    pub fn text(&mut self, x: f64, y: f64, content: &str, style: &TextStyle) {
        self.elements.push(SvgElement::Text {
            x,
            y,
            content: content.to_string(),
            style: style.clone(),
            rotate: None,
        });
    }

    pub fn text_rotated(&mut self, x: f64, y: f64, content: &str, style: &TextStyle, angle: f64) {
        self.elements.push(SvgElement::Text {
            x,
            y,
            content: content.to_string(),
            style: style.clone(),
            rotate: Some(angle),
        });
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, style: &Style) {
        self.elements.push(SvgElement::Circle { cx, cy, r, style: style.clone() });
    }

    /// Closed region between two outlines sampled at the same x values.
    pub fn fill_between(&mut self, x: &[f64], y_lo: &[f64], y_hi: &[f64], style: &Style) {
        if x.len() < 2 {
            return;
        }
        let mut d = String::new();
        write!(d, "M{:.2},{:.2}", x[0], y_hi[0]).unwrap();
        for i in 1..x.len() {
            write!(d, " L{:.2},{:.2}", x[i], y_hi[i]).unwrap();
        }
        for i in (0..x.len()).rev() {
            write!(d, " L{:.2},{:.2}", x[i], y_lo[i]).unwrap();
        }
        d.push('Z');
        self.elements.push(SvgElement::Path { d, style: style.clone() });
    }

    /// Vertical error bar with optional caps.
    pub fn error_bar(&mut self, x: f64, y_lo: f64, y_hi: f64, cap_width: f64, style: &LineStyle) {
        self.line(x, y_lo, x, y_hi, style);
        if cap_width > 0.0 {
            let half = cap_width / 2.0;
            self.line(x - half, y_lo, x + half, y_lo, style);
            self.line(x - half, y_hi, x + half, y_hi, style);
        }
    }

    pub fn measure_text(&self, content: &str, style: &TextStyle) -> TextMetrics {
        measure_text(content, style)
    }

    pub fn finish_svg(&self) -> String {
        let mut out = String::with_capacity(32 * 1024);
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height,
        )
        .unwrap();
        if !self.defs.is_empty() {
            out.push_str("<defs>\n");
            for d in &self.defs {
                out.push_str(d);
                out.push('\n');
            }
            out.push_str("</defs>\n");
        }
        writeln!(out, r#"<rect width="{}" height="{}" fill="white" />"#, self.width, self.height)
            .unwrap();
        for elem in &self.elements {
            render_element(&mut out, elem);
        }
        out.push_str("</svg>\n");
        out
    }
}

fn render_element(out: &mut String, elem: &SvgElement) {
    match elem {
        SvgElement::Rect { x, y, w, h, style } => {
            write!(out, r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}""#).unwrap();
            write_style_attrs(out, style);
            out.push_str(" />\n");
        }
        SvgElement::Line { x1, y1, x2, y2, style } => {
            write!(out, r#"<line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}""#).unwrap();
            write_line_attrs(out, style);
            out.push_str(" />\n");
        }
        SvgElement::Polyline { points, style } => {
            out.push_str(r#"<polyline points=""#);
            for (i, (x, y)) in points.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write!(out, "{x:.2},{y:.2}").unwrap();
            }
            out.push('"');
            write!(out, r#" fill="none""#).unwrap();
            write_line_attrs(out, style);
            out.push_str(" />\n");
        }
        SvgElement::Text { x, y, content, style, rotate } => {
            write!(out, r#"<text x="{x:.2}" y="{y:.2}""#).unwrap();
            write!(out, r#" font-family="Helvetica, Arial, sans-serif" font-size="{:.1}""#, style.size)
                .unwrap();
            write!(out, r#" fill="{}""#, style.color.to_svg_fill()).unwrap();
            write!(out, r#" text-anchor="{}""#, style.anchor.as_str()).unwrap();
            write!(out, r#" dominant-baseline="{}""#, style.baseline.as_str()).unwrap();
            if style.weight == FontWeight::Bold {
                write!(out, r#" font-weight="bold""#).unwrap();
            }
            if style.style == FontStyle::Italic {
                write!(out, r#" font-style="italic""#).unwrap();
            }
            if let Some(angle) = rotate {
                write!(out, r#" transform="rotate({angle:.1},{x:.2},{y:.2})""#).unwrap();
            }
            out.push('>');
            for ch in content.chars() {
                match ch {
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '&' => out.push_str("&amp;"),
                    '"' => out.push_str("&quot;"),
                    _ => out.push(ch),
                }
            }
            out.push_str("</text>\n");
        }
        SvgElement::Path { d, style } => {
            write!(out, r#"<path d="{d}""#).unwrap();
            write_style_attrs(out, style);
            out.push_str(" />\n");
        }
        SvgElement::Circle { cx, cy, r, style } => {
            write!(out, r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}""#).unwrap();
            write_style_attrs(out, style);
            out.push_str(" />\n");
        }
    }
}

fn write_style_attrs(out: &mut String, style: &Style) {
    if let Some(fill) = &style.fill {
        write!(out, r#" fill="{}""#, fill.to_svg_fill()).unwrap();
    } else {
        write!(out, r#" fill="none""#).unwrap();
    }
    if let Some(stroke) = &style.stroke {
        write!(out, r#" stroke="{}""#, stroke.to_svg_fill()).unwrap();
        write!(out, r#" stroke-width="{:.2}""#, style.stroke_width).unwrap();
    }
    if (style.opacity - 1.0).abs() > 1e-4 {
        write!(out, r#" opacity="{:.3}""#, style.opacity).unwrap();
    }
}

fn write_line_attrs(out: &mut String, style: &LineStyle) {
    write!(out, r#" stroke="{}""#, style.color.to_svg_fill()).unwrap();
    write!(out, r#" stroke-width="{:.2}""#, style.width).unwrap();
    if let Some(dash) = &style.dash {
        write!(out, r#" stroke-dasharray="{dash}""#).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn empty_canvas() {
        let c = Canvas::new(100.0, 50.0);
        let svg = c.finish_svg();
        assert!(svg.contains("width=\"100\""));
        assert!(svg.contains("</svg>"));
    }

    #[test]
    fn rect_rendering() {
        let mut c = Canvas::new(200.0, 100.0);
        c.rect(10.0, 20.0, 50.0, 30.0, &Style::filled(Color::hex("#ff0000")));
        let svg = c.finish_svg();
        assert!(svg.contains(r##"fill="#ff0000""##));
        assert!(svg.contains("width=\"50.00\""));
    }

    #[test]
    fn dashed_polyline() {
        let mut c = Canvas::new(200.0, 100.0);
        c.polyline(
            &[(0.0, 0.0), (10.0, 10.0), (20.0, 5.0)],
            &LineStyle::dashed(Color::rgb(0, 0, 0), 1.0),
        );
        let svg = c.finish_svg();
        assert!(svg.contains("stroke-dasharray"));
    }

    #[test]
    fn text_is_escaped() {
        let mut c = Canvas::new(200.0, 100.0);
        c.text(10.0, 20.0, "a < b", &TextStyle::default());
        let svg = c.finish_svg();
        assert!(svg.contains("a &lt; b"));
    }
}
