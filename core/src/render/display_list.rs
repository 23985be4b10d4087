use super::{Layer, Point, Rect, Rgba, Surface};

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Begin { width: f32, height: f32, background: Rgba },
    FillRect { rect: Rect, color: Rgba },
    StrokeRect { rect: Rect, color: Rgba, line_width: f32 },
    Line { from: Point, to: Point, color: Rgba, line_width: f32 },
    Polyline { points: Vec<Point>, color: Rgba, line_width: f32 },
    FillCircle { center: Point, radius: f32, color: Rgba },
    Text { at: Point, text: String, color: Rgba, size: f32 },
}

/// Records every draw call with the layer it was issued on. Callers that
/// paint on their own canvas replay `ops()`.
#[derive(Debug, Clone)]
pub struct DisplayList {
    layer: Layer,
    ops:   Vec<(Layer, DrawOp)>,
}

impl Default for DisplayList {
    fn default() -> Self {
        Self {
            layer: Layer::Background,
            ops:   Vec::new(),
        }
    }
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[(Layer, DrawOp)] {
        &self.ops
    }

    pub fn on_layer(&self, layer: Layer) -> impl Iterator<Item = &DrawOp> {
        self.ops
            .iter()
            .filter(move |(l, _)| *l == layer)
            .map(|(_, op)| op)
    }

    /// Distinct layers in the order they were first drawn on.
    pub fn layers(&self) -> Vec<Layer> {
        let mut seen: Vec<Layer> = Vec::new();
        for (layer, _) in &self.ops {
            if seen.last() != Some(layer) {
                seen.push(*layer);
            }
        }
        seen
    }

    fn push(&mut self, op: DrawOp) {
        self.ops.push((self.layer, op));
    }
}

impl Surface for DisplayList {
    fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }

    fn begin(&mut self, width: f32, height: f32, background: Rgba) {
        self.ops.clear();
        self.push(DrawOp::Begin { width, height, background });
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.push(DrawOp::FillRect { rect, color });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgba, line_width: f32) {
        self.push(DrawOp::StrokeRect { rect, color, line_width });
    }

    fn line(&mut self, from: Point, to: Point, color: Rgba, line_width: f32) {
        self.push(DrawOp::Line { from, to, color, line_width });
    }

    fn polyline(&mut self, points: &[Point], color: Rgba, line_width: f32) {
        self.push(DrawOp::Polyline {
            points: points.to_vec(),
            color,
            line_width,
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba) {
        self.push(DrawOp::FillCircle { center, radius, color });
    }

    fn text(&mut self, at: Point, text: &str, color: Rgba, size: f32) {
        self.push(DrawOp::Text {
            at,
            text: text.to_string(),
            color,
            size,
        });
    }
}
