//! Derived display state.
//!
//! Nothing here is cached. The frame is recomputed from the owned stores
//! (buffer, run record, scenario) every time someone asks, so it can never
//! go stale relative to them.

use crate::{
    model::{Heatmap, Layout, Package, Reservation, Robot, Run, RunMetrics, RunStage, Scenario, SimulationState},
    replay::ReplayController,
    tick_buffer::TickBuffer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// A buffered tick; `index` of `total`.
    Tick { index: usize, total: usize },
    /// Last snapshot stored on the run record (no ticks received yet).
    RunSnapshot,
    /// Static scenario layout with no live entities.
    ScenarioLayout,
}

/// Everything the renderer and the metric readouts need for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub source:          FrameSource,
    pub stage:           Option<RunStage>,
    pub elapsed_seconds: Option<f64>,
    pub layout:          &'a Layout,
    pub packages:        &'a [Package],
    pub robots:          &'a [Robot],
    pub reservations:    &'a [Reservation],
    pub heatmap:         Option<&'a Heatmap>,
    pub metrics:         Option<&'a RunMetrics>,
}

/// Borrowed view of the stores a frame is derived from.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub buffer:   Option<&'a TickBuffer>,
    pub replay:   Option<&'a ReplayController>,
    pub run:      Option<&'a Run>,
    pub snapshot: Option<&'a SimulationState>,
    pub scenario: Option<&'a Scenario>,
}

/// Active tick first, then the run's stored snapshot, then the scenario
/// layout. `None` only when there is no layout to draw at all.
pub fn active_frame(inputs: FrameInputs<'_>) -> Option<Frame<'_>> {
    if let (Some(buffer), Some(replay)) = (inputs.buffer, inputs.replay) {
        if let Some(index) = replay.cursor(buffer.len()) {
            if let Some(tick) = buffer.get(index) {
                return Some(Frame {
                    source:          FrameSource::Tick { index, total: buffer.len() },
                    stage:           Some(tick.stage),
                    elapsed_seconds: Some(tick.elapsed_seconds),
                    layout:          &tick.state.layout,
                    packages:        &tick.state.packages,
                    robots:          &tick.state.robots,
                    reservations:    &tick.state.reservations,
                    heatmap:         Some(&tick.heatmap),
                    metrics:         Some(&tick.metrics),
                });
            }
        }
    }

    let stage = inputs.run.map(|r| r.stage);
    let heatmap = inputs.run.map(|r| &r.heatmap);
    let metrics = inputs.run.map(|r| &r.metrics);

    if let Some(state) = inputs.snapshot {
        return Some(Frame {
            source: FrameSource::RunSnapshot,
            stage,
            elapsed_seconds: None,
            layout: &state.layout,
            packages: &state.packages,
            robots: &state.robots,
            reservations: &state.reservations,
            heatmap,
            metrics,
        });
    }

    inputs.scenario.map(|scenario| Frame {
        source: FrameSource::ScenarioLayout,
        stage,
        elapsed_seconds: None,
        layout: &scenario.config.layout,
        packages: &[],
        robots: &[],
        reservations: &[],
        heatmap,
        metrics,
    })
}

/// `mm:ss` readout for elapsed simulation time.
pub fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_readout() {
        assert_eq!(format_elapsed(0.0), "00:00");
        assert_eq!(format_elapsed(61.9), "01:01");
        assert_eq!(format_elapsed(-3.0), "00:00");
    }
}
