use super::{Layer, Point, Rect, Rgba, Surface};
use std::fmt::Write as _;

/// Serializes one frame to a standalone SVG document, one `<g>` per layer.
#[derive(Debug, Clone, Default)]
pub struct SvgSurface {
    width:      f32,
    height:     f32,
    body:       String,
    open_group: bool,
}

impl SvgSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished document.
    pub fn finish(mut self) -> String {
        self.close_group();
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = fmt_num(self.width),
            h = fmt_num(self.height),
            body = self.body,
        )
    }

    fn close_group(&mut self) {
        if self.open_group {
            self.body.push_str("</g>\n");
            self.open_group = false;
        }
    }

    fn paint(attr: &str, color: Rgba) -> String {
        if color.a >= 1.0 {
            format!("{attr}=\"{}\"", color.hex())
        } else {
            format!("{attr}=\"{}\" {attr}-opacity=\"{:.3}\"", color.hex(), color.a)
        }
    }
}

fn fmt_num(v: f32) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl Surface for SvgSurface {
    fn set_layer(&mut self, layer: Layer) {
        self.close_group();
        let _ = writeln!(self.body, "<g id=\"{}\">", format!("{layer:?}").to_lowercase());
        self.open_group = true;
    }

    fn begin(&mut self, width: f32, height: f32, background: Rgba) {
        self.width = width;
        self.height = height;
        let _ = writeln!(
            self.body,
            "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" {}/>",
            fmt_num(width),
            fmt_num(height),
            Self::paint("fill", background)
        );
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let _ = writeln!(
            self.body,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" {}/>",
            fmt_num(rect.x),
            fmt_num(rect.y),
            fmt_num(rect.width),
            fmt_num(rect.height),
            Self::paint("fill", color)
        );
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgba, line_width: f32) {
        let _ = writeln!(
            self.body,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" {} stroke-width=\"{}\"/>",
            fmt_num(rect.x),
            fmt_num(rect.y),
            fmt_num(rect.width),
            fmt_num(rect.height),
            Self::paint("stroke", color),
            fmt_num(line_width)
        );
    }

    fn line(&mut self, from: Point, to: Point, color: Rgba, line_width: f32) {
        let _ = writeln!(
            self.body,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" {} stroke-width=\"{}\"/>",
            fmt_num(from.x),
            fmt_num(from.y),
            fmt_num(to.x),
            fmt_num(to.y),
            Self::paint("stroke", color),
            fmt_num(line_width)
        );
    }

    fn polyline(&mut self, points: &[Point], color: Rgba, line_width: f32) {
        if points.len() < 2 {
            return;
        }
        let coords: Vec<String> = points
            .iter()
            .map(|p| format!("{},{}", fmt_num(p.x), fmt_num(p.y)))
            .collect();
        let _ = writeln!(
            self.body,
            "<polyline points=\"{}\" fill=\"none\" {} stroke-width=\"{}\"/>",
            coords.join(" "),
            Self::paint("stroke", color),
            fmt_num(line_width)
        );
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba) {
        let _ = writeln!(
            self.body,
            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" {}/>",
            fmt_num(center.x),
            fmt_num(center.y),
            fmt_num(radius),
            Self::paint("fill", color)
        );
    }

    fn text(&mut self, at: Point, text: &str, color: Rgba, size: f32) {
        let _ = writeln!(
            self.body,
            "<text x=\"{}\" y=\"{}\" font-size=\"{}\" text-anchor=\"middle\" dominant-baseline=\"middle\" {}>{}</text>",
            fmt_num(at.x),
            fmt_num(at.y),
            fmt_num(size),
            Self::paint("fill", color),
            escape(text)
        );
    }
}
