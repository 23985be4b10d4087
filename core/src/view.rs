//! The view engine, sole owner of everything the current view shows.
//!
//! RULES:
//!   - `handle()` is the only way state changes. Inputs are handled one at
//!     a time; there is no concurrency inside the view.
//!   - The view performs no I/O. It returns `Effect`s; the driver executes
//!     them and reports back with more inputs.
//!   - Every activation bumps the epoch. Every run-scoped input carries the
//!     epoch it was issued under, and is compared with the current epoch
//!     when it is handled. Mismatch means stale: dropped, never queued.
//!   - Ticks are applied in arrival order, at most once.

use crate::{
    catalog::{RunCatalog, SelectionChange},
    config::ViewConfig,
    connection::{
        ConnectionManager, ConnectionState, EndCause, FailureDecision, ReconnectDecision,
    },
    error::ReplayError,
    frame::{active_frame, Frame, FrameInputs},
    model::{Run, RunDetail, RunStage, Scenario, ScenarioConfig, SimulationState, Tick, TimelineEvent},
    notice::{NoticeBoard, NoticeKind},
    replay::{ReplayController, ReplayMode},
    tick_buffer::TickBuffer,
    timeline::Timeline,
    types::{Epoch, RunId, ScenarioId},
};
use std::time::Duration;

/// Everything that can happen to the view.
#[derive(Debug)]
pub enum ViewInput {
    // ── Catalog ────────────────────────────────
    CatalogLoaded {
        scenarios: Result<Vec<Scenario>, ReplayError>,
        runs:      Result<Vec<Run>, ReplayError>,
    },
    CatalogRefreshDue,
    Refresh,
    InspectScenario(ScenarioId),
    SelectRun(RunId),

    // ── Stream and timers ──────────────────────
    StreamOpened { run_id: RunId, epoch: Epoch },
    StreamMessage { run_id: RunId, epoch: Epoch, text: String },
    StreamEnded { run_id: RunId, epoch: Epoch, cause: EndCause },
    ReconnectDue { run_id: RunId, epoch: Epoch },
    PollDue { run_id: RunId, epoch: Epoch },
    RunLoaded {
        run_id: RunId,
        epoch:  Epoch,
        result: Result<RunDetail, ReplayError>,
    },
    /// Load the active run's stored timeline on its own.
    RefreshTimeline,
    TimelineLoaded {
        run_id: RunId,
        epoch:  Epoch,
        result: Result<Vec<TimelineEvent>, ReplayError>,
    },

    // ── Display ────────────────────────────────
    SetMode(ReplayMode),
    Seek(usize),
    Step(i64),
    ToggleHeatmap,
    DismissNotice(u64),

    // ── Operator actions ───────────────────────
    CreateScenario(ScenarioConfig),
    ScenarioCreated(Result<Scenario, ReplayError>),
    LaunchRun(ScenarioId),
    RunLaunched(Result<Run, ReplayError>),
    CancelRun,
    CancelRequested {
        run_id: RunId,
        result: Result<(), ReplayError>,
    },
    Leave,
}

/// Work the driver must perform on the view's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchCatalog,
    FetchRun { run_id: RunId, epoch: Epoch },
    FetchTimeline { run_id: RunId, epoch: Epoch },
    OpenStream { run_id: RunId, epoch: Epoch, attempt: u32 },
    CloseStream { run_id: RunId },
    ScheduleReconnect { run_id: RunId, epoch: Epoch, delay: Duration },
    CancelReconnect { run_id: RunId },
    SchedulePoll { run_id: RunId, epoch: Epoch, delay: Duration },
    CancelPoll { run_id: RunId },
    CreateScenario(ScenarioConfig),
    LaunchRun { scenario_id: ScenarioId },
    CancelRun { run_id: RunId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogStatus {
    Loading,
    Ready,
    /// The initial load failed; the view has nothing to show.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    CreateScenario,
    LaunchRun,
    CancelRun,
}

/// Inline error for an operator action. The action stays retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub action:  UserAction,
    pub message: String,
}

/// Stores for the one run the view is attached to.
#[derive(Debug)]
pub struct ActiveRun {
    run_id:     RunId,
    epoch:      Epoch,
    stage:      Option<RunStage>,
    record:     Option<Run>,
    snapshot:   Option<SimulationState>,
    buffer:     TickBuffer,
    timeline:   Timeline,
    replay:     ReplayController,
    connection: ConnectionManager,
    /// The stream is gone for good; poll metadata until terminal.
    polling:    bool,
    rejected:   u64,
}

impl ActiveRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn stage(&self) -> Option<RunStage> {
        self.stage
    }

    pub fn record(&self) -> Option<&Run> {
        self.record.as_ref()
    }

    pub fn buffer(&self) -> &TickBuffer {
        &self.buffer
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn replay(&self) -> &ReplayController {
        &self.replay
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Ticks dropped as out-of-order or already applied.
    pub fn rejected_ticks(&self) -> u64 {
        self.rejected
    }

    pub fn cursor(&self) -> Option<usize> {
        self.replay.cursor(self.buffer.len())
    }

    /// Position of the displayed tick counted from the run's first tick.
    /// Unlike `cursor`, it survives head eviction.
    pub fn cursor_sequence(&self) -> Option<u64> {
        self.cursor().map(|index| self.buffer.total_evicted() + index as u64)
    }

    fn observe_stage(&mut self, observed: RunStage) -> RunStage {
        let merged = match self.stage {
            Some(known) => RunStage::advance(known, observed),
            None => observed,
        };
        self.stage = Some(merged);
        if let Some(record) = self.record.as_mut() {
            record.stage = merged;
        }
        merged
    }

    fn is_terminal(&self) -> bool {
        self.stage.is_some_and(RunStage::is_terminal)
    }
}

pub struct RunView {
    config:         ViewConfig,
    catalog:        RunCatalog,
    catalog_status: CatalogStatus,
    active:         Option<ActiveRun>,
    last_epoch:     Epoch,
    notices:        NoticeBoard,
    show_heatmap:   bool,
    action_error:   Option<ActionFailure>,
}

impl RunView {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            config,
            catalog: RunCatalog::new(),
            catalog_status: CatalogStatus::Loading,
            active: None,
            last_epoch: 0,
            notices: NoticeBoard::new(),
            show_heatmap: config.show_heatmap,
            action_error: None,
        }
    }

    /// Effects to perform when the view is first shown.
    pub fn start(&mut self) -> Vec<Effect> {
        self.catalog_status = CatalogStatus::Loading;
        vec![Effect::FetchCatalog]
    }

    // ── Read side ──────────────────────────────────────────────────

    pub fn catalog(&self) -> &RunCatalog {
        &self.catalog
    }

    pub fn catalog_status(&self) -> &CatalogStatus {
        &self.catalog_status
    }

    pub fn active(&self) -> Option<&ActiveRun> {
        self.active.as_ref()
    }

    pub fn active_run_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.run_id.as_str())
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn show_heatmap(&self) -> bool {
        self.show_heatmap
    }

    pub fn action_error(&self) -> Option<&ActionFailure> {
        self.action_error.as_ref()
    }

    pub fn mode(&self) -> ReplayMode {
        self.active
            .as_ref()
            .map(|a| a.replay.mode())
            .unwrap_or_default()
    }

    /// The frame to draw right now, derived on demand.
    pub fn frame(&self) -> Option<Frame<'_>> {
        let scenario_id = self
            .active
            .as_ref()
            .and_then(|a| a.record.as_ref().map(|r| r.scenario_id.as_str()))
            .or_else(|| self.catalog.inspected_scenario());
        let scenario = scenario_id.and_then(|id| self.catalog.scenario(id));

        active_frame(FrameInputs {
            buffer:   self.active.as_ref().map(|a| &a.buffer),
            replay:   self.active.as_ref().map(|a| &a.replay),
            run:      self.active.as_ref().and_then(|a| a.record.as_ref()),
            snapshot: self.active.as_ref().and_then(|a| a.snapshot.as_ref()),
            scenario,
        })
    }

    // ── Write side ─────────────────────────────────────────────────

    pub fn handle(&mut self, input: ViewInput) -> Vec<Effect> {
        let mut fx = Vec::new();
        match input {
            ViewInput::CatalogLoaded { scenarios, runs } => {
                self.on_catalog_loaded(scenarios, runs, &mut fx)
            }
            ViewInput::CatalogRefreshDue => {
                if self.catalog_status == CatalogStatus::Ready {
                    fx.push(Effect::FetchCatalog);
                }
            }
            ViewInput::Refresh => {
                fx.push(Effect::FetchCatalog);
                if let Some(active) = &self.active {
                    fx.push(Effect::FetchRun {
                        run_id: active.run_id.clone(),
                        epoch:  active.epoch,
                    });
                }
            }
            ViewInput::InspectScenario(scenario_id) => {
                if self.catalog.inspect_scenario(scenario_id) {
                    self.catalog.reconcile();
                    self.follow_selection(&mut fx);
                }
            }
            ViewInput::SelectRun(run_id) => {
                self.catalog.select_manually(run_id.clone());
                if self.active_run_id() != Some(run_id.as_str()) {
                    self.activate(run_id, &mut fx);
                }
            }

            ViewInput::StreamOpened { run_id, epoch } => {
                if let Some(active) = self.current_mut(&run_id, epoch, "stream open") {
                    active.connection.opened();
                    log::info!("run={run_id} stream open");
                }
            }
            ViewInput::StreamMessage { run_id, epoch, text } => {
                self.on_stream_message(&run_id, epoch, &text, &mut fx)
            }
            ViewInput::StreamEnded { run_id, epoch, cause } => {
                self.on_stream_ended(&run_id, epoch, cause, &mut fx)
            }
            ViewInput::ReconnectDue { run_id, epoch } => {
                self.on_reconnect_due(&run_id, epoch, &mut fx)
            }
            ViewInput::PollDue { run_id, epoch } => {
                if let Some(active) = self.current_mut(&run_id, epoch, "poll") {
                    if active.polling {
                        fx.push(Effect::FetchRun { run_id, epoch });
                    }
                }
            }
            ViewInput::RunLoaded { run_id, epoch, result } => {
                self.on_run_loaded(&run_id, epoch, result, &mut fx)
            }
            ViewInput::RefreshTimeline => {
                if let Some(active) = &self.active {
                    fx.push(Effect::FetchTimeline {
                        run_id: active.run_id.clone(),
                        epoch:  active.epoch,
                    });
                }
            }
            ViewInput::TimelineLoaded { run_id, epoch, result } => {
                let Some(active) = self.current_mut(&run_id, epoch, "timeline") else {
                    return fx;
                };
                match result {
                    Ok(events) => {
                        if active.timeline.seed(&events) {
                            log::debug!("run={run_id} timeline seeded with {} stored events", events.len());
                        } else {
                            log::debug!("run={run_id} stored timeline not applied");
                        }
                    }
                    Err(err) => {
                        self.notices.raise(
                            NoticeKind::RequestFailed,
                            format!("Failed to load timeline for run {run_id}: {err}"),
                        );
                    }
                }
            }

            ViewInput::SetMode(mode) => {
                if let Some(active) = self.active.as_mut() {
                    active.replay.set_mode(mode, active.buffer.len());
                }
            }
            ViewInput::Seek(index) => {
                if let Some(active) = self.active.as_mut() {
                    if !active.replay.seek(index, active.buffer.len()) {
                        log::debug!("seek to {index} refused in {:?} mode", active.replay.mode());
                    }
                }
            }
            ViewInput::Step(delta) => {
                if let Some(active) = self.active.as_mut() {
                    active.replay.step(delta, active.buffer.len());
                }
            }
            ViewInput::ToggleHeatmap => self.show_heatmap = !self.show_heatmap,
            ViewInput::DismissNotice(id) => {
                self.notices.dismiss(id);
            }

            ViewInput::CreateScenario(config) => {
                self.action_error = None;
                fx.push(Effect::CreateScenario(config));
            }
            ViewInput::ScenarioCreated(result) => match result {
                Ok(scenario) => {
                    log::info!("scenario {} created ({})", scenario.id, scenario.config.name);
                    self.catalog.add_scenario(scenario);
                }
                Err(err) => self.fail_action(UserAction::CreateScenario, &err),
            },
            ViewInput::LaunchRun(scenario_id) => {
                self.action_error = None;
                if self.catalog.scenario(&scenario_id).is_none() {
                    let err = ReplayError::ScenarioNotFound { id: scenario_id };
                    self.fail_action(UserAction::LaunchRun, &err);
                } else {
                    fx.push(Effect::LaunchRun { scenario_id });
                }
            }
            ViewInput::RunLaunched(result) => match result {
                Ok(run) => {
                    log::info!("run {} launched for scenario {}", run.id, run.scenario_id);
                    let run_id = run.id.clone();
                    self.catalog.upsert_run(run);
                    self.catalog.select_manually(run_id.clone());
                    self.activate(run_id, &mut fx);
                }
                Err(err) => self.fail_action(UserAction::LaunchRun, &err),
            },
            ViewInput::CancelRun => {
                self.action_error = None;
                match &self.active {
                    Some(active) => fx.push(Effect::CancelRun {
                        run_id: active.run_id.clone(),
                    }),
                    None => self.fail_action(UserAction::CancelRun, &ReplayError::NoActiveRun),
                }
            }
            ViewInput::CancelRequested { run_id, result } => match result {
                Ok(()) => log::info!("run={run_id} cancellation requested"),
                Err(err) => self.fail_action(UserAction::CancelRun, &err),
            },
            ViewInput::Leave => self.deactivate(&mut fx),
        }
        fx
    }

    // ── Catalog ────────────────────────────────────────────────────

    fn on_catalog_loaded(
        &mut self,
        scenarios: Result<Vec<Scenario>, ReplayError>,
        runs: Result<Vec<Run>, ReplayError>,
        fx: &mut Vec<Effect>,
    ) {
        let initial = self.catalog_status != CatalogStatus::Ready;
        let mut failures = Vec::new();

        match scenarios {
            Ok(scenarios) => self.catalog.replace_scenarios(scenarios),
            Err(err) => failures.push(format!("Failed to load scenarios: {err}")),
        }
        match runs {
            Ok(runs) => {
                self.catalog.replace_runs(runs);
                self.sync_active_from_catalog(fx);
            }
            Err(err) => failures.push(format!("Failed to load runs: {err}")),
        }

        if failures.is_empty() {
            self.catalog_status = CatalogStatus::Ready;
        } else if initial {
            self.catalog_status = CatalogStatus::Failed(failures.join("; "));
            for failure in &failures {
                log::warn!("{failure}");
            }
            return;
        } else {
            for failure in failures {
                self.notices.raise(NoticeKind::RequestFailed, failure);
            }
        }

        let change = self.catalog.reconcile();
        if change != SelectionChange::Unchanged {
            log::debug!("selection changed: {change:?}");
        }
        self.follow_selection(fx);
    }

    /// Fold the listed record of the active run into the view: the stage
    /// only moves forward, and a live stage may start the stream.
    fn sync_active_from_catalog(&mut self, fx: &mut Vec<Effect>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(listed) = self.catalog.run(&active.run_id).cloned() else {
            return;
        };
        let stage = active.observe_stage(listed.stage);
        if active.buffer.is_empty() {
            let mut record = listed;
            record.stage = stage;
            active.record = Some(record);
        }

        match active.connection.state() {
            ConnectionState::Idle => {
                if active.connection.start(Some(stage)) {
                    fx.push(Effect::OpenStream {
                        run_id:  active.run_id.clone(),
                        epoch:   active.epoch,
                        attempt: 0,
                    });
                }
            }
            ConnectionState::WaitingToReconnect | ConnectionState::Connecting | ConnectionState::Open
                if stage.is_terminal() =>
            {
                log::info!("run={} listed as {}; closing stream", active.run_id, stage.label());
                let closed = active.connection.close();
                if closed.cancel_timer {
                    fx.push(Effect::CancelReconnect {
                        run_id: active.run_id.clone(),
                    });
                }
                if closed.close_socket {
                    fx.push(Effect::CloseStream {
                        run_id: active.run_id.clone(),
                    });
                }
                fx.push(Effect::FetchRun {
                    run_id: active.run_id.clone(),
                    epoch:  active.epoch,
                });
            }
            _ => {}
        }
    }

    /// Make the active run match the catalog's selection.
    fn follow_selection(&mut self, fx: &mut Vec<Effect>) {
        match self.catalog.selected_run_id().map(str::to_string) {
            Some(run_id) if self.active_run_id() != Some(run_id.as_str()) => self.activate(run_id, fx),
            Some(_) => {}
            None => self.deactivate(fx),
        }
    }

    // ── Activation ─────────────────────────────────────────────────

    /// Replace the active run. The old run's stores are dropped whole,
    /// never merged into the new one.
    fn activate(&mut self, run_id: RunId, fx: &mut Vec<Effect>) {
        self.deactivate(fx);

        self.last_epoch += 1;
        let epoch = self.last_epoch;
        let record = self.catalog.run(&run_id).cloned();
        let stage = record.as_ref().map(|r| r.stage);

        let mut active = ActiveRun {
            run_id:     run_id.clone(),
            epoch,
            stage,
            record,
            snapshot:   None,
            buffer:     TickBuffer::new(self.config.tick_capacity),
            timeline:   Timeline::new(self.config.timeline_capacity),
            replay:     ReplayController::new(),
            connection: ConnectionManager::new(run_id.clone(), self.config.reconnect),
            polling:    false,
            rejected:   0,
        };

        log::info!("activating run={run_id} epoch={epoch} stage={stage:?}");
        fx.push(Effect::FetchRun {
            run_id: run_id.clone(),
            epoch,
        });
        if active.connection.start(stage) {
            fx.push(Effect::OpenStream {
                run_id,
                epoch,
                attempt: 0,
            });
        }
        self.active = Some(active);
    }

    /// Release the active run: timer first, then socket, then poll.
    fn deactivate(&mut self, fx: &mut Vec<Effect>) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        let closed = active.connection.close();
        if closed.cancel_timer {
            fx.push(Effect::CancelReconnect {
                run_id: active.run_id.clone(),
            });
        }
        if closed.close_socket {
            fx.push(Effect::CloseStream {
                run_id: active.run_id.clone(),
            });
        }
        if active.polling {
            fx.push(Effect::CancelPoll {
                run_id: active.run_id.clone(),
            });
        }
        self.notices.clear_connection_notices();
        log::info!("left run={} epoch={}", active.run_id, active.epoch);
    }

    /// The active run, if `run_id`/`epoch` still identify it.
    fn current_mut(&mut self, run_id: &str, epoch: Epoch, what: &str) -> Option<&mut ActiveRun> {
        match self.active.as_mut() {
            Some(active) if active.epoch == epoch && active.run_id == run_id => Some(active),
            _ => {
                log::debug!("discarding stale {what} for run={run_id} epoch={epoch}");
                None
            }
        }
    }

    // ── Stream ─────────────────────────────────────────────────────

    fn on_stream_message(&mut self, run_id: &str, epoch: Epoch, text: &str, fx: &mut Vec<Effect>) {
        let Some(active) = self.current_mut(run_id, epoch, "tick") else {
            return;
        };
        if !matches!(
            active.connection.state(),
            ConnectionState::Open | ConnectionState::Connecting
        ) {
            log::debug!("run={run_id} ignoring message on a closed stream");
            return;
        }

        let tick = match Tick::decode(text) {
            Ok(tick) => tick,
            Err(err) => {
                log::warn!("run={run_id} discarding malformed tick: {err}");
                return;
            }
        };

        if let Some(last) = active.buffer.last() {
            let replayed = tick.elapsed_seconds < last.elapsed_seconds
                || (tick.elapsed_seconds == last.elapsed_seconds && tick.stage == last.stage);
            if replayed {
                active.rejected += 1;
                log::warn!(
                    "run={run_id} discarding out-of-order tick t={:.3} (last t={:.3})",
                    tick.elapsed_seconds,
                    last.elapsed_seconds
                );
                return;
            }
        }

        let stage = active.observe_stage(tick.stage);
        if let Some(record) = active.record.as_mut() {
            record.metrics = tick.metrics.clone();
            record.heatmap = tick.heatmap.clone();
        }
        active.timeline.merge(tick.recent_events.iter().cloned());
        if active.buffer.append(tick).is_some() {
            active.replay.on_head_evicted();
        }

        if stage.is_terminal() {
            log::info!("run={run_id} reached {}; closing stream", stage.label());
            let closed = active.connection.close();
            if closed.cancel_timer {
                fx.push(Effect::CancelReconnect {
                    run_id: run_id.to_string(),
                });
            }
            if closed.close_socket {
                fx.push(Effect::CloseStream {
                    run_id: run_id.to_string(),
                });
            }
            fx.push(Effect::FetchRun {
                run_id: run_id.to_string(),
                epoch,
            });
        }
    }

    fn on_stream_ended(&mut self, run_id: &str, epoch: Epoch, cause: EndCause, fx: &mut Vec<Effect>) {
        let Some(active) = self.current_mut(run_id, epoch, "stream end") else {
            return;
        };
        let stage = active.stage;
        match active.connection.ended(&cause, true, stage) {
            FailureDecision::Ignore => {}
            FailureDecision::Retry { attempt, delay, notify } => {
                log::warn!(
                    "run={run_id} stream lost ({cause:?}); retry {} in {}s",
                    attempt + 1,
                    delay.as_secs()
                );
                fx.push(Effect::ScheduleReconnect {
                    run_id: run_id.to_string(),
                    epoch,
                    delay,
                });
                if notify {
                    self.notices
                        .raise(NoticeKind::Reconnecting, "Live stream interrupted. Reconnecting...");
                }
            }
            FailureDecision::Abandon => {
                log::info!("run={run_id} stream ended ({cause:?}); not reconnecting");
                fx.push(Effect::FetchRun {
                    run_id: run_id.to_string(),
                    epoch,
                });
            }
            FailureDecision::ServerClosed => {
                log::info!("run={run_id} stream closed by server");
                active.polling = !active.is_terminal();
                fx.push(Effect::FetchRun {
                    run_id: run_id.to_string(),
                    epoch,
                });
            }
            FailureDecision::Exhausted => {
                active.polling = true;
                fx.push(Effect::FetchRun {
                    run_id: run_id.to_string(),
                    epoch,
                });
                self.notices.raise(
                    NoticeKind::ConnectionLost,
                    "Lost connection to the live stream. Showing the last known run data.",
                );
            }
        }
    }

    fn on_reconnect_due(&mut self, run_id: &str, epoch: Epoch, fx: &mut Vec<Effect>) {
        let Some(active) = self.current_mut(run_id, epoch, "reconnect") else {
            return;
        };
        let stage = active.stage;
        match active.connection.reconnect_due(true, stage) {
            ReconnectDecision::Open { attempt } => fx.push(Effect::OpenStream {
                run_id: run_id.to_string(),
                epoch,
                attempt,
            }),
            ReconnectDecision::Abandon => fx.push(Effect::FetchRun {
                run_id: run_id.to_string(),
                epoch,
            }),
            ReconnectDecision::Ignore => {}
        }
    }

    // ── Run metadata ───────────────────────────────────────────────

    fn on_run_loaded(
        &mut self,
        run_id: &str,
        epoch: Epoch,
        result: Result<RunDetail, ReplayError>,
        fx: &mut Vec<Effect>,
    ) {
        let poll_interval = self.config.run_poll_interval;
        let Some(active) = self.current_mut(run_id, epoch, "run detail") else {
            return;
        };

        let detail = match result {
            Ok(detail) => detail,
            Err(err) => {
                let polling = active.polling;
                if polling {
                    fx.push(Effect::SchedulePoll {
                        run_id: run_id.to_string(),
                        epoch,
                        delay: poll_interval,
                    });
                }
                self.notices
                    .raise(NoticeKind::RequestFailed, format!("Failed to load run {run_id}: {err}"));
                return;
            }
        };

        let RunDetail { run, state, timeline } = detail;
        let stage = active.observe_stage(run.stage);
        let mut record = run;
        record.stage = stage;
        if active.buffer.is_empty() || stage.is_terminal() {
            active.record = Some(record.clone());
        } else if let Some(existing) = active.record.as_mut() {
            existing.started_at = record.started_at;
            existing.completed_at = record.completed_at;
            existing.error = record.error.clone();
        } else {
            active.record = Some(record.clone());
        }
        if state.is_some() {
            active.snapshot = state;
        }
        if active.timeline.seed(&timeline) {
            log::debug!("run={run_id} timeline seeded with {} stored events", timeline.len());
        }

        match active.connection.state() {
            ConnectionState::Idle => {
                if active.connection.start(Some(stage)) {
                    fx.push(Effect::OpenStream {
                        run_id: run_id.to_string(),
                        epoch,
                        attempt: 0,
                    });
                }
            }
            ConnectionState::WaitingToReconnect | ConnectionState::Connecting | ConnectionState::Open
                if stage.is_terminal() =>
            {
                log::info!("run={run_id} loaded as {}; closing stream", stage.label());
                let closed = active.connection.close();
                if closed.cancel_timer {
                    fx.push(Effect::CancelReconnect {
                        run_id: run_id.to_string(),
                    });
                }
                if closed.close_socket {
                    fx.push(Effect::CloseStream {
                        run_id: run_id.to_string(),
                    });
                }
            }
            _ => {}
        }

        if active.polling {
            if stage.is_terminal() {
                active.polling = false;
            } else {
                fx.push(Effect::SchedulePoll {
                    run_id: run_id.to_string(),
                    epoch,
                    delay: poll_interval,
                });
            }
        }

        self.catalog.upsert_run(record);
    }

    fn fail_action(&mut self, action: UserAction, err: &ReplayError) {
        log::warn!("{action:?} failed: {err}");
        self.action_error = Some(ActionFailure {
            action,
            message: err.to_string(),
        });
    }
}
