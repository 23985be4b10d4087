//! Spatial renderer: one frame, fully redrawn, onto any `Surface`.
//!
//! RULES:
//!   - Stateless per call. Nothing is diffed against the previous frame.
//!   - Layers are drawn strictly back to front, in `Layer` order.
//!   - Output depends only on the frame and the options: same input, same
//!     draw calls, in the same order.

mod display_list;
mod svg;

pub use display_list::{DisplayList, DrawOp};
pub use svg::SvgSurface;

use crate::{
    frame::Frame,
    model::{Heatmap, PackageStatus},
    types::GridPosition,
};

// ── Geometry and color ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x:      f32,
    pub y:      f32,
    pub width:  f32,
    pub height: f32,
}

impl Rect {
    /// Shrink by `pad` on every side.
    pub fn inset(self, pad: f32) -> Self {
        Self {
            x:      self.x + pad,
            y:      self.y + pad,
            width:  (self.width - 2.0 * pad).max(0.0),
            height: (self.height - 2.0 * pad).max(0.0),
        }
    }

    pub fn center(self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 0.0 (transparent) to 1.0 (opaque).
    pub a: f32,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// `#rrggbb`, alpha not included.
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ── Palette ────────────────────────────────────────────────────────

pub mod palette {
    use super::Rgba;

    pub const BACKGROUND: Rgba = Rgba::rgb(0xec, 0xf0, 0xf1);
    pub const GRID:       Rgba = Rgba::rgb(0xcc, 0xcc, 0xcc);
    pub const OBSTACLE:   Rgba = Rgba::rgb(0x7f, 0x8c, 0x8d);
    pub const PICKUP:     Rgba = Rgba::rgb(0xe6, 0x7e, 0x22);
    pub const DROPOFF:    Rgba = Rgba::rgb(0x8e, 0x44, 0xad);
    pub const CHARGING:   Rgba = Rgba::rgb(0x16, 0xa0, 0x85);
    pub const RESERVED:   Rgba = Rgba::rgb(0x34, 0x98, 0xdb);
    pub const IN_TRANSIT: Rgba = Rgba::rgb(0xe6, 0x7e, 0x22);
    pub const DELIVERED:  Rgba = Rgba::rgb(0x27, 0xae, 0x60);
    pub const LABEL:      Rgba = Rgba::rgb(0x34, 0x49, 0x5e);

    /// Heat ramp stops: cool, neutral, hot.
    pub const HEAT_COOL:    Rgba = Rgba::rgb(0x34, 0x98, 0xdb);
    pub const HEAT_NEUTRAL: Rgba = Rgba::rgb(0xf1, 0xc4, 0x0f);
    pub const HEAT_HOT:     Rgba = Rgba::rgb(0xe7, 0x4c, 0x3c);

    pub const ROBOTS: [Rgba; 8] = [
        Rgba::rgb(0x29, 0x80, 0xb9),
        Rgba::rgb(0xc0, 0x39, 0x2b),
        Rgba::rgb(0x27, 0xae, 0x60),
        Rgba::rgb(0xf3, 0x9c, 0x12),
        Rgba::rgb(0x8e, 0x44, 0xad),
        Rgba::rgb(0x16, 0xa0, 0x85),
        Rgba::rgb(0xd3, 0x54, 0x00),
        Rgba::rgb(0x2c, 0x3e, 0x50),
    ];
}

/// Stable color for a robot id. Pure function of the id.
pub fn robot_color(robot_id: &str) -> Rgba {
    let hash = robot_id
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
    palette::ROBOTS[hash as usize % palette::ROBOTS.len()]
}

/// Point on the cool → neutral → hot ramp for `t` in 0..=1.
pub fn heat_color(t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let (from, to, local) = if t < 0.5 {
        (palette::HEAT_COOL, palette::HEAT_NEUTRAL, t * 2.0)
    } else {
        (palette::HEAT_NEUTRAL, palette::HEAT_HOT, (t - 0.5) * 2.0)
    };
    let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * local).round() as u8;
    Rgba::rgb(mix(from.r, to.r), mix(from.g, to.g), mix(from.b, to.b))
}

/// Occupied cells with their intensity relative to the hottest cell.
/// Unparseable keys and zero counts are left out. All-zero input yields
/// nothing.
pub fn heat_intensities(heatmap: &Heatmap) -> Vec<(GridPosition, f32)> {
    let cells: Vec<(GridPosition, u64)> = heatmap
        .iter()
        .filter_map(|(key, count)| match GridPosition::parse_cell_key(key) {
            Some(cell) => Some((cell, *count)),
            None => {
                log::debug!("skipping heatmap key {key:?}");
                None
            }
        })
        .collect();

    let max = cells.iter().map(|(_, count)| *count).max().unwrap_or(0);
    if max == 0 {
        return Vec::new();
    }
    cells
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(cell, count)| (cell, count as f32 / max as f32))
        .collect()
}

/// Short on-canvas label: the tail of the id's last segment.
pub fn short_label(id: &str) -> &str {
    let segment = id.rsplit(['-', '_']).next().unwrap_or(id);
    let segment = if segment.is_empty() { id } else { segment };
    match segment.char_indices().rev().nth(3) {
        Some((start, _)) => &segment[start..],
        None => segment,
    }
}

// ── Surface ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Background,
    Obstacles,
    Zones,
    Charging,
    Heatmap,
    Reservations,
    Packages,
    Robots,
}

/// A 2-D drawing target. Coordinates are pixels, origin top-left.
pub trait Surface {
    /// Called before each layer's draw calls.
    fn set_layer(&mut self, _layer: Layer) {}

    /// Start a fresh frame of the given size, cleared to `background`.
    fn begin(&mut self, width: f32, height: f32, background: Rgba);

    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    fn stroke_rect(&mut self, rect: Rect, color: Rgba, line_width: f32);

    fn line(&mut self, from: Point, to: Point, color: Rgba, line_width: f32);

    fn polyline(&mut self, points: &[Point], color: Rgba, line_width: f32);

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba);

    fn text(&mut self, at: Point, text: &str, color: Rgba, size: f32);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub show_heatmap: bool,
    /// Overrides the layout's own cell size.
    pub cell_px:      Option<u32>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_heatmap: true,
            cell_px:      None,
        }
    }
}

struct Grid {
    cell: f32,
}

impl Grid {
    fn cell_rect(&self, pos: GridPosition) -> Rect {
        Rect {
            x:      pos.x as f32 * self.cell,
            y:      pos.y as f32 * self.cell,
            width:  self.cell,
            height: self.cell,
        }
    }

    fn cell_center(&self, pos: GridPosition) -> Point {
        self.cell_rect(pos).center()
    }
}

/// Draw `frame` onto `surface`, back to front.
pub fn render_frame<S: Surface + ?Sized>(frame: &Frame<'_>, options: &RenderOptions, surface: &mut S) {
    let layout = frame.layout;
    let grid = Grid {
        cell: options.cell_px.unwrap_or(layout.cell_size).max(1) as f32,
    };
    let width = layout.width as f32 * grid.cell;
    let height = layout.height as f32 * grid.cell;

    // 1. Background and grid lines.
    surface.set_layer(Layer::Background);
    surface.begin(width, height, palette::BACKGROUND);
    for col in 0..=layout.width {
        let x = col as f32 * grid.cell;
        surface.line(Point { x, y: 0.0 }, Point { x, y: height }, palette::GRID, 1.0);
    }
    for row in 0..=layout.height {
        let y = row as f32 * grid.cell;
        surface.line(Point { x: 0.0, y }, Point { x: width, y }, palette::GRID, 1.0);
    }

    // 2. Obstacles.
    surface.set_layer(Layer::Obstacles);
    for cell in &layout.obstacles {
        surface.fill_rect(grid.cell_rect(*cell), palette::OBSTACLE);
    }

    // 3. Pickup and drop-off zones.
    surface.set_layer(Layer::Zones);
    for cell in &layout.pickup_zones {
        surface.fill_rect(grid.cell_rect(*cell), palette::PICKUP.with_alpha(0.25));
    }
    for cell in &layout.dropoff_zones {
        surface.fill_rect(grid.cell_rect(*cell), palette::DROPOFF.with_alpha(0.25));
    }

    // 4. Charging stations.
    surface.set_layer(Layer::Charging);
    for cell in &layout.charging_zones {
        surface.stroke_rect(grid.cell_rect(*cell).inset(2.0), palette::CHARGING, 2.0);
    }

    // 5. Heatmap.
    if options.show_heatmap {
        if let Some(heatmap) = frame.heatmap.filter(|h| !h.is_empty()) {
            surface.set_layer(Layer::Heatmap);
            for (cell, intensity) in heat_intensities(heatmap) {
                surface.fill_rect(grid.cell_rect(cell), heat_color(intensity).with_alpha(intensity));
            }
        }
    }

    // 6. Reservations.
    surface.set_layer(Layer::Reservations);
    for reservation in frame.reservations {
        surface.fill_rect(
            grid.cell_rect(reservation.position).inset(1.0),
            palette::RESERVED.with_alpha(0.3),
        );
    }

    // 7. Packages.
    surface.set_layer(Layer::Packages);
    let label_size = (grid.cell * 0.3).max(6.0);
    for package in frame.packages {
        let color = match package.status {
            PackageStatus::Delivered => palette::DELIVERED,
            _ => palette::IN_TRANSIT,
        };
        let rect = grid.cell_rect(package.position).inset(grid.cell * 0.2);
        surface.fill_rect(rect, color);
        surface.text(rect.center(), short_label(&package.id), palette::LABEL, label_size);
    }

    // 8. Robots: path trace first, then the body.
    surface.set_layer(Layer::Robots);
    for robot in frame.robots {
        let color = robot_color(&robot.robot_id);
        if !robot.path.is_empty() {
            let mut points = Vec::with_capacity(robot.path.len() + 1);
            points.push(grid.cell_center(robot.position));
            points.extend(robot.path.iter().map(|p| grid.cell_center(*p)));
            surface.polyline(&points, color.with_alpha(0.35), 2.0);
        }
        let center = grid.cell_center(robot.position);
        surface.fill_circle(center, grid.cell * 0.4, color);
        surface.text(
            Point {
                x: center.x,
                y: center.y - grid.cell * 0.55,
            },
            short_label(&robot.robot_id),
            palette::LABEL,
            label_size,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_label_takes_tail_of_last_segment() {
        assert_eq!(short_label("robot-7"), "7");
        assert_eq!(short_label("pkg_000123"), "0123");
        assert_eq!(short_label("R2"), "R2");
        assert_eq!(short_label("trailing-"), "ing-");
    }

    #[test]
    fn heat_ramp_endpoints() {
        assert_eq!(heat_color(0.0), palette::HEAT_COOL);
        assert_eq!(heat_color(0.5), palette::HEAT_NEUTRAL);
        assert_eq!(heat_color(1.0), palette::HEAT_HOT);
    }
}
