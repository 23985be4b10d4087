//! View engine tests: the reducer end to end, without any I/O.
//!
//! Tests cover: activation effects, tick application and rejection, the
//! terminal-stage close, run switching with stale results, reconnect
//! exhaustion and polling, catalog failures, operator actions, and the
//! frame fallbacks.

use chrono::{TimeZone, Utc};
use std::time::Duration;
use warehouse_replay_core::{
    config::ViewConfig,
    connection::{ConnectionState, EndCause},
    error::ReplayError,
    frame::FrameSource,
    model::{
        Heatmap, Layout, Run, RunDetail, RunMetrics, RunStage, Scenario, SimulationState, Tick, TimelineEvent,
    },
    notice::NoticeKind,
    replay::ReplayMode,
    view::{CatalogStatus, Effect, RunView, UserAction, ViewInput},
};

// ── Builders ───────────────────────────────────────────────────────

fn scenario(id: &str) -> Scenario {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "created_at": "2024-05-01T09:00:00",
        "config": {
            "name": format!("Scenario {id}"),
            "description": "test floor",
            "layout": { "width": 10, "height": 6, "cell_size": 32, "obstacles": [{ "x": 3, "y": 3 }] },
            "fleet": { "total_robots": 2 },
            "demand": { "packages_per_hour": 60.0 },
            "operations": { "shift_minutes": 60, "cadence_ms": 200, "warmup_minutes": 1, "time_scale": 1.0 },
            "failures": { "fault_probability_per_hour": 0.0, "mean_recovery_minutes": 1.0 },
            "optimization": { "planner": "astar", "assignment_policy": "nearest", "reservation_horizon": 3 },
            "horizon": { "duration_minutes": 10 }
        }
    }))
    .expect("valid scenario json")
}

fn run(id: &str, stage: RunStage, minute: u32) -> Run {
    Run {
        id:           id.to_string(),
        scenario_id:  "s1".to_string(),
        stage,
        created_at:   Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
        started_at:   None,
        completed_at: None,
        metrics:      RunMetrics::default(),
        heatmap:      Heatmap::new(),
        error:        None,
    }
}

fn detail(id: &str, stage: RunStage, with_state: bool) -> RunDetail {
    RunDetail {
        run:      run(id, stage, 0),
        state:    with_state.then(state),
        timeline: vec![],
    }
}

fn state() -> SimulationState {
    SimulationState {
        packages:     vec![],
        reservations: vec![],
        robots:       vec![],
        layout:       Layout {
            width:          10,
            height:         6,
            cell_size:      32,
            obstacles:      vec![],
            pickup_zones:   vec![],
            dropoff_zones:  vec![],
            charging_zones: vec![],
        },
    }
}

fn tick_json(stage: RunStage, elapsed: f64, events: usize) -> String {
    let tick = Tick {
        stage,
        elapsed_seconds: elapsed,
        state: state(),
        metrics: RunMetrics {
            delivered: elapsed as u64,
            ..RunMetrics::default()
        },
        heatmap: Heatmap::new(),
        recent_events: (0..events)
            .map(|i| TimelineEvent {
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
                kind:      "package_spawned".to_string(),
                message:   format!("t={elapsed} #{i}"),
                payload:   serde_json::Map::new(),
            })
            .collect(),
    };
    serde_json::to_string(&tick).expect("tick serializes")
}

fn http_error() -> ReplayError {
    ReplayError::Status {
        url:    "http://sim/api/v1/scenarios/runs".to_string(),
        status: 503,
        body:   "unavailable".to_string(),
    }
}

/// A view whose catalog has loaded `runs` under scenario `s1`.
fn loaded(runs: Vec<Run>) -> (RunView, Vec<Effect>) {
    let mut view = RunView::new(ViewConfig::default());
    assert_eq!(view.start(), vec![Effect::FetchCatalog]);
    let fx = view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Ok(runs),
    });
    (view, fx)
}

fn message(view: &mut RunView, run_id: &str, epoch: u64, text: String) -> Vec<Effect> {
    view.handle(ViewInput::StreamMessage {
        run_id: run_id.to_string(),
        epoch,
        text,
    })
}

fn fail(view: &mut RunView, run_id: &str, epoch: u64) -> Vec<Effect> {
    view.handle(ViewInput::StreamEnded {
        run_id: run_id.to_string(),
        epoch,
        cause: EndCause::Error("reset".to_string()),
    })
}

/// A view following live run `r1` with an open stream.
fn streaming() -> RunView {
    let (mut view, _) = loaded(vec![run("r1", RunStage::Running, 1)]);
    view.handle(ViewInput::StreamOpened {
        run_id: "r1".to_string(),
        epoch:  1,
    });
    view
}

fn buffered(view: &RunView) -> usize {
    view.active().map_or(0, |a| a.buffer().len())
}

// ── Activation ─────────────────────────────────────────────────────

#[test]
fn live_run_is_activated_and_streamed() {
    let (view, fx) = loaded(vec![
        run("done", RunStage::Completed, 30),
        run("r1", RunStage::Running, 1),
    ]);
    assert_eq!(view.catalog_status(), &CatalogStatus::Ready);
    assert_eq!(view.active_run_id(), Some("r1"));
    assert_eq!(
        fx,
        vec![
            Effect::FetchRun {
                run_id: "r1".to_string(),
                epoch:  1,
            },
            Effect::OpenStream {
                run_id:  "r1".to_string(),
                epoch:   1,
                attempt: 0,
            },
        ]
    );
}

#[test]
fn finished_run_is_loaded_without_a_stream() {
    let (view, fx) = loaded(vec![run("done", RunStage::Completed, 1)]);
    assert_eq!(
        fx,
        vec![Effect::FetchRun {
            run_id: "done".to_string(),
            epoch:  1,
        }]
    );
    assert_eq!(view.active().map(|a| a.connection().state()), Some(ConnectionState::Idle));
}

fn stored_event(minute: u32) -> TimelineEvent {
    TimelineEvent {
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
        kind:      "run_completed".to_string(),
        message:   format!("stored #{minute}"),
        payload:   serde_json::Map::new(),
    }
}

/// The stored timeline can be fetched on its own and fills an empty
/// aggregator; answers for an older activation are dropped.
#[test]
fn stored_timeline_loads_on_request() {
    let (mut view, _) = loaded(vec![run("done", RunStage::Completed, 1)]);

    let fx = view.handle(ViewInput::RefreshTimeline);
    assert_eq!(
        fx,
        vec![Effect::FetchTimeline {
            run_id: "done".to_string(),
            epoch:  1,
        }]
    );

    let fx = view.handle(ViewInput::TimelineLoaded {
        run_id: "done".to_string(),
        epoch:  0,
        result: Ok(vec![stored_event(1)]),
    });
    assert!(fx.is_empty());
    assert_eq!(view.active().map(|a| a.timeline().len()), Some(0), "stale epoch ignored");

    view.handle(ViewInput::TimelineLoaded {
        run_id: "done".to_string(),
        epoch:  1,
        result: Ok(vec![stored_event(1), stored_event(2)]),
    });
    assert_eq!(view.active().map(|a| a.timeline().len()), Some(2));
}

#[test]
fn stored_timeline_failure_is_a_notice() {
    let (mut view, _) = loaded(vec![run("done", RunStage::Completed, 1)]);
    view.handle(ViewInput::TimelineLoaded {
        run_id: "done".to_string(),
        epoch:  1,
        result: Err(http_error()),
    });
    assert_eq!(view.notices().count_of(NoticeKind::RequestFailed), 1);
    assert_eq!(view.active().map(|a| a.timeline().len()), Some(0));
}

/// A queued run gets its stream once a refresh reports it live.
#[test]
fn queued_run_streams_after_it_starts() {
    let (mut view, fx) = loaded(vec![run("r1", RunStage::Queued, 1)]);
    assert!(!fx.iter().any(|e| matches!(e, Effect::OpenStream { .. })));

    assert_eq!(view.handle(ViewInput::CatalogRefreshDue), vec![Effect::FetchCatalog]);
    let fx = view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Ok(vec![run("r1", RunStage::WarmingUp, 1)]),
    });
    assert_eq!(
        fx,
        vec![Effect::OpenStream {
            run_id:  "r1".to_string(),
            epoch:   1,
            attempt: 0,
        }]
    );
}

// ── Ticks ──────────────────────────────────────────────────────────

#[test]
fn ticks_fill_buffer_and_timeline() {
    let mut view = streaming();
    for i in 1..=3 {
        let fx = message(&mut view, "r1", 1, tick_json(RunStage::Running, i as f64, 2));
        assert!(fx.is_empty(), "a running tick needs no effects");
    }
    let active = view.active().expect("active run");
    assert_eq!(active.buffer().len(), 3);
    assert_eq!(active.timeline().len(), 6);
    assert_eq!(active.cursor(), Some(2));

    let frame = view.frame().expect("frame");
    assert_eq!(frame.source, FrameSource::Tick { index: 2, total: 3 });
    assert_eq!(frame.metrics.map(|m| m.delivered), Some(3));
}

#[test]
fn malformed_message_is_discarded() {
    let mut view = streaming();
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 1.0, 0));
    let fx = message(&mut view, "r1", 1, "{\"stage\": \"RUNNING\", \"elapsed".to_string());
    assert!(fx.is_empty());
    assert_eq!(buffered(&view), 1, "buffer untouched by a bad message");
    assert_eq!(view.active().map(|a| a.connection().state()), Some(ConnectionState::Open));
}

#[test]
fn replayed_ticks_are_dropped() {
    let mut view = streaming();
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 5.0, 0));
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 3.0, 0));
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 5.0, 0));
    assert_eq!(buffered(&view), 1);
    assert_eq!(view.active().map(|a| a.rejected_ticks()), Some(2));
}

/// COMPLETED closes the stream and refreshes metadata exactly once.
#[test]
fn terminal_tick_closes_stream_and_refreshes_once() {
    let mut view = streaming();
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 1.0, 0));

    let fx = message(&mut view, "r1", 1, tick_json(RunStage::Completed, 2.0, 1));
    assert_eq!(
        fx,
        vec![
            Effect::CloseStream {
                run_id: "r1".to_string(),
            },
            Effect::FetchRun {
                run_id: "r1".to_string(),
                epoch:  1,
            },
        ]
    );
    assert_eq!(buffered(&view), 2, "the terminal tick itself is kept");

    // The server's own close arriving afterwards changes nothing.
    let fx = view.handle(ViewInput::StreamEnded {
        run_id: "r1".to_string(),
        epoch:  1,
        cause:  EndCause::CleanClose,
    });
    assert!(fx.is_empty(), "no second refresh, no reconnect: {fx:?}");

    let fx = view.handle(ViewInput::RunLoaded {
        run_id: "r1".to_string(),
        epoch:  1,
        result: Ok(detail("r1", RunStage::Completed, true)),
    });
    assert!(fx.is_empty());
    assert_eq!(view.active().and_then(|a| a.stage()), Some(RunStage::Completed));
}

/// A run listed as finished closes its stream even though no terminal
/// tick arrived on it.
#[test]
fn terminal_listing_closes_open_stream() {
    let mut view = streaming();
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 1.0, 0));

    let fx = view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Ok(vec![run("r1", RunStage::Completed, 1)]),
    });
    assert_eq!(
        fx,
        vec![
            Effect::CloseStream {
                run_id: "r1".to_string(),
            },
            Effect::FetchRun {
                run_id: "r1".to_string(),
                epoch:  1,
            },
        ]
    );
    assert_eq!(view.active().and_then(|a| a.stage()), Some(RunStage::Completed));
    assert_eq!(view.active().map(|a| a.connection().state()), Some(ConnectionState::Closed));

    // The next refresh finds nothing left to close.
    let fx = view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Ok(vec![run("r1", RunStage::Completed, 1)]),
    });
    assert!(fx.is_empty(), "stream already closed: {fx:?}");
}

/// A run detail reporting a terminal stage closes the stream without
/// fetching the detail again.
#[test]
fn terminal_detail_closes_open_stream() {
    let mut view = streaming();

    let fx = view.handle(ViewInput::RunLoaded {
        run_id: "r1".to_string(),
        epoch:  1,
        result: Ok(detail("r1", RunStage::Cancelled, true)),
    });
    assert_eq!(
        fx,
        vec![Effect::CloseStream {
            run_id: "r1".to_string(),
        }]
    );
    assert_eq!(view.active().and_then(|a| a.stage()), Some(RunStage::Cancelled));
    assert_eq!(view.active().map(|a| a.connection().state()), Some(ConnectionState::Closed));

    // A tick still in flight on the closed socket is ignored.
    let fx = message(&mut view, "r1", 1, tick_json(RunStage::Running, 5.0, 0));
    assert!(fx.is_empty());
    assert_eq!(buffered(&view), 0);
}

/// A stale list entry cannot move a stage backwards.
#[test]
fn stage_never_regresses_from_list() {
    let mut view = streaming();
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 1.0, 0));
    view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Ok(vec![run("r1", RunStage::WarmingUp, 1)]),
    });
    assert_eq!(view.active().and_then(|a| a.stage()), Some(RunStage::Running));
}

#[test]
fn replay_freezes_while_ticks_arrive() {
    let mut view = streaming();
    for i in 0..3 {
        message(&mut view, "r1", 1, tick_json(RunStage::Running, i as f64, 0));
    }
    view.handle(ViewInput::SetMode(ReplayMode::Replay));
    view.handle(ViewInput::Seek(1));
    for i in 3..8 {
        message(&mut view, "r1", 1, tick_json(RunStage::Running, i as f64, 0));
    }
    assert_eq!(view.mode(), ReplayMode::Replay);
    assert_eq!(view.active().and_then(|a| a.cursor()), Some(1));

    view.handle(ViewInput::Step(2));
    assert_eq!(view.active().and_then(|a| a.cursor()), Some(3));

    view.handle(ViewInput::SetMode(ReplayMode::Live));
    assert_eq!(view.active().and_then(|a| a.cursor()), Some(7));
}

#[test]
fn small_buffer_evicts_and_keeps_replay_frame() {
    let config = ViewConfig {
        tick_capacity: 5,
        ..ViewConfig::default()
    };
    let mut view = RunView::new(config);
    view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Ok(vec![run("r1", RunStage::Running, 1)]),
    });
    view.handle(ViewInput::StreamOpened {
        run_id: "r1".to_string(),
        epoch:  1,
    });
    for i in 0..5 {
        message(&mut view, "r1", 1, tick_json(RunStage::Running, i as f64, 0));
    }
    view.handle(ViewInput::SetMode(ReplayMode::Replay));
    view.handle(ViewInput::Seek(3));
    assert_eq!(view.active().and_then(|a| a.cursor_sequence()), Some(3));
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 5.0, 0));

    assert_eq!(buffered(&view), 5);
    let frame = view.frame().expect("frame");
    assert_eq!(frame.elapsed_seconds, Some(3.0), "still showing the same tick");
    assert_eq!(view.active().and_then(|a| a.cursor()), Some(2), "index shifted by the eviction");
    assert_eq!(
        view.active().and_then(|a| a.cursor_sequence()),
        Some(3),
        "sequence names the same tick after eviction"
    );
}

/// The frozen frame keeps its identity while live ticks keep arriving;
/// going live moves it to the newest tick.
#[test]
fn frozen_frame_identity_ignores_new_ticks() {
    let mut view = streaming();
    for i in 0..3 {
        message(&mut view, "r1", 1, tick_json(RunStage::Running, i as f64, 0));
    }
    view.handle(ViewInput::SetMode(ReplayMode::Replay));
    view.handle(ViewInput::Seek(1));
    let frozen = view.active().and_then(|a| a.cursor_sequence());
    assert_eq!(frozen, Some(1));

    for i in 3..6 {
        message(&mut view, "r1", 1, tick_json(RunStage::Running, i as f64, 0));
        assert_eq!(view.active().and_then(|a| a.cursor_sequence()), frozen, "tick {i} moved the frame");
    }

    view.handle(ViewInput::SetMode(ReplayMode::Live));
    assert_eq!(view.active().and_then(|a| a.cursor_sequence()), Some(5));
}

// ── Switching and staleness ────────────────────────────────────────

/// A reconnect timer from the previous run must not reopen anything.
#[test]
fn no_reconnect_after_switching_runs() {
    let (mut view, _) = loaded(vec![
        run("r1", RunStage::Running, 2),
        run("r2", RunStage::Completed, 1),
    ]);
    let fx = fail(&mut view, "r1", 1);
    assert_eq!(
        fx,
        vec![Effect::ScheduleReconnect {
            run_id: "r1".to_string(),
            epoch:  1,
            delay:  Duration::from_secs(1),
        }]
    );
    assert_eq!(view.notices().count_of(NoticeKind::Reconnecting), 1);

    let fx = view.handle(ViewInput::SelectRun("r2".to_string()));
    assert_eq!(
        fx,
        vec![
            Effect::CancelReconnect {
                run_id: "r1".to_string(),
            },
            Effect::FetchRun {
                run_id: "r2".to_string(),
                epoch:  2,
            },
        ]
    );
    assert_eq!(view.notices().count_of(NoticeKind::Reconnecting), 0);

    let fx = view.handle(ViewInput::ReconnectDue {
        run_id: "r1".to_string(),
        epoch:  1,
    });
    assert!(fx.is_empty(), "stale timer opened something: {fx:?}");

    message(&mut view, "r1", 1, tick_json(RunStage::Running, 9.0, 0));
    assert_eq!(buffered(&view), 0, "old run's tick leaked into the new run");
}

#[test]
fn stale_run_detail_is_ignored() {
    let (mut view, _) = loaded(vec![
        run("r1", RunStage::Running, 2),
        run("r2", RunStage::Completed, 1),
    ]);
    view.handle(ViewInput::SelectRun("r2".to_string()));

    let fx = view.handle(ViewInput::RunLoaded {
        run_id: "r1".to_string(),
        epoch:  1,
        result: Ok(detail("r1", RunStage::Running, true)),
    });
    assert!(fx.is_empty());
    assert_eq!(view.active_run_id(), Some("r2"));
    assert_eq!(
        view.frame().map(|f| f.source),
        Some(FrameSource::ScenarioLayout),
        "no snapshot was taken from the stale result"
    );
}

/// Re-selecting the same run keeps its stores.
#[test]
fn reselecting_active_run_is_a_no_op() {
    let mut view = streaming();
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 1.0, 0));
    let fx = view.handle(ViewInput::SelectRun("r1".to_string()));
    assert!(fx.is_empty());
    assert_eq!(buffered(&view), 1);
    assert_eq!(view.active().map(|a| a.epoch()), Some(1));
}

// ── Failure handling ───────────────────────────────────────────────

#[test]
fn exhaustion_switches_to_polling_until_terminal() {
    let (mut view, _) = loaded(vec![run("r1", RunStage::Running, 1)]);

    for attempt in 0..5u32 {
        let fx = fail(&mut view, "r1", 1);
        assert!(
            matches!(fx.as_slice(), [Effect::ScheduleReconnect { .. }]),
            "failure {attempt}: {fx:?}"
        );
        let fx = view.handle(ViewInput::ReconnectDue {
            run_id: "r1".to_string(),
            epoch:  1,
        });
        assert_eq!(
            fx,
            vec![Effect::OpenStream {
                run_id:  "r1".to_string(),
                epoch:   1,
                attempt: attempt + 1,
            }]
        );
    }
    assert_eq!(view.notices().count_of(NoticeKind::Reconnecting), 1);

    let fx = fail(&mut view, "r1", 1);
    assert_eq!(
        fx,
        vec![Effect::FetchRun {
            run_id: "r1".to_string(),
            epoch:  1,
        }]
    );
    assert_eq!(view.notices().count_of(NoticeKind::ConnectionLost), 1);
    assert!(view.active().is_some_and(|a| a.is_polling()));

    let lost = view
        .notices()
        .iter()
        .find(|n| n.kind == NoticeKind::ConnectionLost)
        .map(|n| n.id)
        .expect("connection lost notice");
    view.handle(ViewInput::DismissNotice(lost));
    assert_eq!(view.notices().count_of(NoticeKind::ConnectionLost), 1, "persistent");

    let fx = view.handle(ViewInput::RunLoaded {
        run_id: "r1".to_string(),
        epoch:  1,
        result: Ok(detail("r1", RunStage::Running, true)),
    });
    assert_eq!(
        fx,
        vec![Effect::SchedulePoll {
            run_id: "r1".to_string(),
            epoch:  1,
            delay:  Duration::from_secs(5),
        }]
    );
    assert_eq!(view.frame().map(|f| f.source), Some(FrameSource::RunSnapshot));

    let fx = view.handle(ViewInput::PollDue {
        run_id: "r1".to_string(),
        epoch:  1,
    });
    assert_eq!(
        fx,
        vec![Effect::FetchRun {
            run_id: "r1".to_string(),
            epoch:  1,
        }]
    );

    let fx = view.handle(ViewInput::RunLoaded {
        run_id: "r1".to_string(),
        epoch:  1,
        result: Ok(detail("r1", RunStage::Completed, true)),
    });
    assert!(fx.is_empty(), "polling stops at a terminal stage: {fx:?}");
    assert!(view.active().is_some_and(|a| !a.is_polling()));
}

#[test]
fn clean_close_on_live_run_polls() {
    let mut view = streaming();
    let fx = view.handle(ViewInput::StreamEnded {
        run_id: "r1".to_string(),
        epoch:  1,
        cause:  EndCause::CleanClose,
    });
    assert_eq!(
        fx,
        vec![Effect::FetchRun {
            run_id: "r1".to_string(),
            epoch:  1,
        }]
    );
    assert!(view.active().is_some_and(|a| a.is_polling()));
    assert!(view.notices().is_empty(), "a clean close is not an error");
}

#[test]
fn failed_initial_catalog_degrades_view() {
    let mut view = RunView::new(ViewConfig::default());
    view.start();
    let fx = view.handle(ViewInput::CatalogLoaded {
        scenarios: Err(http_error()),
        runs:      Ok(vec![]),
    });
    assert!(fx.is_empty());
    assert!(matches!(view.catalog_status(), CatalogStatus::Failed(reason) if reason.contains("503")));
    assert!(view.handle(ViewInput::CatalogRefreshDue).is_empty(), "no automatic retry");

    assert_eq!(view.handle(ViewInput::Refresh), vec![Effect::FetchCatalog]);
    view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Ok(vec![]),
    });
    assert_eq!(view.catalog_status(), &CatalogStatus::Ready);
    assert_eq!(
        view.frame().map(|f| f.source),
        Some(FrameSource::ScenarioLayout),
        "scenario layout shown with no run"
    );
}

#[test]
fn later_refresh_failure_is_a_notice() {
    let mut view = streaming();
    view.handle(ViewInput::CatalogLoaded {
        scenarios: Ok(vec![scenario("s1")]),
        runs:      Err(http_error()),
    });
    assert_eq!(view.catalog_status(), &CatalogStatus::Ready);
    assert_eq!(view.notices().count_of(NoticeKind::RequestFailed), 1);
    assert_eq!(view.active_run_id(), Some("r1"), "existing run kept");

    let id = view.notices().iter().next().map(|n| n.id).expect("notice");
    view.handle(ViewInput::DismissNotice(id));
    assert!(view.notices().is_empty());
}

// ── Operator actions ───────────────────────────────────────────────

#[test]
fn launch_validates_scenario_and_reports_failure() {
    let (mut view, _) = loaded(vec![]);

    assert!(view.handle(ViewInput::LaunchRun("nope".to_string())).is_empty());
    assert_eq!(view.action_error().map(|e| e.action), Some(UserAction::LaunchRun));

    let fx = view.handle(ViewInput::LaunchRun("s1".to_string()));
    assert_eq!(
        fx,
        vec![Effect::LaunchRun {
            scenario_id: "s1".to_string(),
        }]
    );
    assert!(view.action_error().is_none(), "retry clears the inline error");

    view.handle(ViewInput::RunLaunched(Err(http_error())));
    assert!(view
        .action_error()
        .is_some_and(|e| e.action == UserAction::LaunchRun && e.message.contains("unavailable")));
}

#[test]
fn launched_run_becomes_active() {
    let (mut view, _) = loaded(vec![run("old", RunStage::Completed, 1)]);
    let fx = view.handle(ViewInput::RunLaunched(Ok(run("new", RunStage::WarmingUp, 5))));

    assert_eq!(view.active_run_id(), Some("new"));
    assert!(view.catalog().selection().is_some_and(|s| s.manual));
    assert!(fx.contains(&Effect::OpenStream {
        run_id:  "new".to_string(),
        epoch:   2,
        attempt: 0,
    }));
}

#[test]
fn cancel_needs_an_active_run() {
    let mut view = RunView::new(ViewConfig::default());
    assert!(view.handle(ViewInput::CancelRun).is_empty());
    assert_eq!(view.action_error().map(|e| e.action), Some(UserAction::CancelRun));

    let mut view = streaming();
    assert_eq!(
        view.handle(ViewInput::CancelRun),
        vec![Effect::CancelRun {
            run_id: "r1".to_string(),
        }]
    );
    view.handle(ViewInput::CancelRequested {
        run_id: "r1".to_string(),
        result: Err(http_error()),
    });
    assert_eq!(view.action_error().map(|e| e.action), Some(UserAction::CancelRun));
}

#[test]
fn created_scenario_joins_catalog() {
    let (mut view, _) = loaded(vec![]);
    let config = scenario("s2").config;
    assert_eq!(
        view.handle(ViewInput::CreateScenario(config.clone())),
        vec![Effect::CreateScenario(config)]
    );
    view.handle(ViewInput::ScenarioCreated(Ok(scenario("s2"))));
    assert!(view.catalog().scenario("s2").is_some());
}

#[test]
fn leaving_closes_everything() {
    let mut view = streaming();
    message(&mut view, "r1", 1, tick_json(RunStage::Running, 1.0, 0));
    let fx = view.handle(ViewInput::Leave);
    assert_eq!(
        fx,
        vec![Effect::CloseStream {
            run_id: "r1".to_string(),
        }]
    );
    assert!(view.active().is_none());
}

#[test]
fn heatmap_toggle_flips() {
    let mut view = RunView::new(ViewConfig::default());
    assert!(view.show_heatmap());
    view.handle(ViewInput::ToggleHeatmap);
    assert!(!view.show_heatmap());
}
