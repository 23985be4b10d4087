//! replay-viewer: headless viewer for warehouse simulation runs.
//!
//! Usage:
//!   replay-viewer --api http://localhost:8000/api/v1 --scenario <id>
//!   replay-viewer --run <run_id> --frames ./frames
//!   replay-viewer --ipc-mode
//!   replay-viewer --render tick.json --out frame.svg

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use warehouse_replay_core::{
    config::ClientConfig,
    driver::{Driver, DriverHandle, UpdateCause},
    frame::{active_frame, format_elapsed, FrameInputs, FrameSource},
    model::{RunMetrics, RunStage, ScenarioConfig, Tick, TimelineEvent},
    notice::Notice,
    render::{render_frame, RenderOptions, SvgSurface},
    replay::{ReplayController, ReplayMode},
    tick_buffer::TickBuffer,
    view::{CatalogStatus, RunView, ViewInput},
};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    SelectScenario { scenario_id: String },
    SelectRun { run_id: String },
    Live,
    Replay,
    Seek { index: usize },
    Step { delta: i64 },
    ToggleHeatmap,
    CreateScenario { config: Box<ScenarioConfig> },
    Launch { scenario_id: String },
    Cancel,
    Refresh,
    Timeline,
    Dismiss { notice_id: u64 },
    Quit,
}

#[derive(Serialize)]
struct ScenarioSummary<'a> {
    id:   &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    id:          &'a str,
    scenario_id: &'a str,
    stage:       RunStage,
}

#[derive(Serialize)]
struct UiState<'a> {
    catalog:            String,
    inspected_scenario: Option<&'a str>,
    scenarios:          Vec<ScenarioSummary<'a>>,
    runs:               Vec<RunSummary<'a>>,
    active_run:         Option<&'a str>,
    stage:              Option<RunStage>,
    connection:         Option<String>,
    mode:               ReplayMode,
    cursor:             Option<usize>,
    buffered:           usize,
    elapsed:            Option<String>,
    metrics:            Option<&'a RunMetrics>,
    show_heatmap:       bool,
    timeline:           Vec<&'a TimelineEvent>,
    notices:            Vec<&'a Notice>,
    action_error:       Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let cell_px = parse_arg(&args, "--cell-px", 0u32);
    let no_heatmap = args.iter().any(|a| a == "--no-heatmap");

    let mut config = ClientConfig::load(flag_value(&args, "--config"))?;
    if let Some(api) = flag_value(&args, "--api") {
        config.api_base_url = api.to_string();
    }
    if no_heatmap {
        config.show_heatmap = false;
    }
    if cell_px > 0 {
        config.cell_px = Some(cell_px);
    }

    if let Some(tick_path) = flag_value(&args, "--render") {
        return render_offline(&config, tick_path, flag_value(&args, "--out"));
    }

    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let frames_dir = flag_value(&args, "--frames").map(PathBuf::from);
    if let Some(dir) = &frames_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    }

    if !ipc_mode {
        println!("Warehouse replay viewer");
        println!("  api:       {}", config.api_base_url);
        println!("  buffer:    {} ticks", config.tick_buffer_capacity);
        println!("  heatmap:   {}", if config.show_heatmap { "on" } else { "off" });
        if let Some(dir) = &frames_dir {
            println!("  frames:    {}", dir.display());
        }
        println!();
    }

    let (driver, handle) = Driver::new(&config)?;
    if let Some(scenario_id) = flag_value(&args, "--scenario") {
        handle.send(ViewInput::InspectScenario(scenario_id.to_string()));
    }
    if let Some(run_id) = flag_value(&args, "--run") {
        handle.send(ViewInput::SelectRun(run_id.to_string()));
    }

    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupted; leaving view");
        }
        ctrl_c.shutdown();
    });

    if ipc_mode {
        let input = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = run_ipc_loop(&input).await {
                log::warn!("ipc loop ended: {err}");
            }
            input.shutdown();
        });
    }

    let options = RenderOptions {
        show_heatmap: config.show_heatmap,
        cell_px:      config.cell_px,
    };
    let mut follower = Follower::new(frames_dir, options, ipc_mode);
    driver
        .run(|view, cause| follower.observe(view, cause))
        .await;
    drop(handle);
    Ok(())
}

async fn run_ipc_loop(handle: &DriverHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let cmd: IpcCommand = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                println!("{err_json}");
                continue;
            }
        };

        let input = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => None,
            IpcCommand::SelectScenario { scenario_id } => Some(ViewInput::InspectScenario(scenario_id)),
            IpcCommand::SelectRun { run_id } => Some(ViewInput::SelectRun(run_id)),
            IpcCommand::Live => Some(ViewInput::SetMode(ReplayMode::Live)),
            IpcCommand::Replay => Some(ViewInput::SetMode(ReplayMode::Replay)),
            IpcCommand::Seek { index } => Some(ViewInput::Seek(index)),
            IpcCommand::Step { delta } => Some(ViewInput::Step(delta)),
            IpcCommand::ToggleHeatmap => Some(ViewInput::ToggleHeatmap),
            IpcCommand::CreateScenario { config } => Some(ViewInput::CreateScenario(*config)),
            IpcCommand::Launch { scenario_id } => Some(ViewInput::LaunchRun(scenario_id)),
            IpcCommand::Cancel => Some(ViewInput::CancelRun),
            IpcCommand::Refresh => Some(ViewInput::Refresh),
            IpcCommand::Timeline => Some(ViewInput::RefreshTimeline),
            IpcCommand::Dismiss { notice_id } => Some(ViewInput::DismissNotice(notice_id)),
        };
        if let Some(input) = input {
            if !handle.send(input) {
                break;
            }
        }
        if !handle.request_snapshot() {
            break;
        }
    }
    Ok(())
}

/// Watches the view after every update: prints a status line when the
/// displayed frame changes and writes it as SVG when asked to.
struct Follower {
    frames_dir: Option<PathBuf>,
    options:    RenderOptions,
    ipc_mode:   bool,
    last_key:   Option<FrameKey>,
    written:    u64,
}

#[derive(Debug, Clone, PartialEq)]
struct FrameKey {
    run_id:       Option<String>,
    /// Sequence of the displayed tick, `None` for the non-tick fallbacks.
    tick:         Option<u64>,
    fallback:     Option<FrameSource>,
    stage:        Option<RunStage>,
    show_heatmap: bool,
}

impl Follower {
    fn new(frames_dir: Option<PathBuf>, options: RenderOptions, ipc_mode: bool) -> Self {
        Self {
            frames_dir,
            options,
            ipc_mode,
            last_key: None,
            written: 0,
        }
    }

    fn observe(&mut self, view: &RunView, cause: UpdateCause) {
        if cause == UpdateCause::Snapshot {
            match serde_json::to_string(&build_ui_state(view)) {
                Ok(json) => println!("{json}"),
                Err(err) => log::warn!("cannot serialize state: {err}"),
            }
            return;
        }

        let Some(frame) = view.frame() else {
            return;
        };
        let key = FrameKey {
            run_id:       view.active_run_id().map(str::to_string),
            tick:         view.active().and_then(|a| a.cursor_sequence()),
            fallback:     match frame.source {
                FrameSource::Tick { .. } => None,
                other => Some(other),
            },
            stage:        frame.stage,
            show_heatmap: view.show_heatmap(),
        };
        if self.last_key.as_ref() == Some(&key) {
            return;
        }

        if !self.ipc_mode {
            print_status(view, &key, frame.source, frame.elapsed_seconds);
        }

        if let Some(dir) = &self.frames_dir {
            let options = RenderOptions {
                show_heatmap: view.show_heatmap(),
                ..self.options
            };
            let mut svg = SvgSurface::new();
            render_frame(&frame, &options, &mut svg);
            let run = key.run_id.as_deref().unwrap_or("layout");
            let path = dir.join(format!("{run}-{:06}.svg", self.written));
            match std::fs::write(&path, svg.finish()) {
                Ok(()) => self.written += 1,
                Err(err) => log::warn!("cannot write {}: {err}", path.display()),
            }
        }
        self.last_key = Some(key);
    }
}

fn print_status(view: &RunView, key: &FrameKey, source: FrameSource, elapsed: Option<f64>) {
    let run = key.run_id.as_deref().unwrap_or("-");
    let stage = key.stage.map_or("-", RunStage::label);
    let position = match source {
        FrameSource::Tick { index, total } => format!("tick {}/{}", index + 1, total),
        FrameSource::RunSnapshot => "run snapshot".to_string(),
        FrameSource::ScenarioLayout => "scenario layout".to_string(),
    };
    let clock = elapsed.map(format_elapsed).unwrap_or_else(|| "--:--".to_string());
    let metrics = view.frame().and_then(|f| f.metrics.cloned()).unwrap_or_default();
    println!(
        "{run} | {stage:<10} | {clock} | {position} | delivered {} | queue {} | util {:.0}%",
        metrics.delivered,
        metrics.queue_depth,
        metrics.utilization * 100.0
    );
}

fn build_ui_state(view: &RunView) -> UiState<'_> {
    let catalog = view.catalog();
    let active = view.active();
    let frame = view.frame();

    UiState {
        catalog: match view.catalog_status() {
            CatalogStatus::Loading => "loading".to_string(),
            CatalogStatus::Ready => "ready".to_string(),
            CatalogStatus::Failed(reason) => format!("failed: {reason}"),
        },
        inspected_scenario: catalog.inspected_scenario(),
        scenarios: catalog
            .scenarios()
            .iter()
            .map(|s| ScenarioSummary {
                id:   &s.id,
                name: &s.config.name,
            })
            .collect(),
        runs: catalog
            .runs_for_inspected()
            .into_iter()
            .map(|r| RunSummary {
                id:          &r.id,
                scenario_id: &r.scenario_id,
                stage:       r.stage,
            })
            .collect(),
        active_run: view.active_run_id(),
        stage: active.and_then(|a| a.stage()),
        connection: active.map(|a| format!("{:?}", a.connection().state())),
        mode: view.mode(),
        cursor: active.and_then(|a| a.cursor()),
        buffered: active.map_or(0, |a| a.buffer().len()),
        elapsed: frame.and_then(|f| f.elapsed_seconds).map(format_elapsed),
        metrics: frame.and_then(|f| f.metrics),
        show_heatmap: view.show_heatmap(),
        timeline: active
            .map(|a| a.timeline().recent_first().take(20).collect())
            .unwrap_or_default(),
        notices: view.notices().iter().collect(),
        action_error: view
            .action_error()
            .map(|e| format!("{:?}: {}", e.action, e.message)),
    }
}

/// Render one tick file to SVG without touching the network.
fn render_offline(config: &ClientConfig, tick_path: &str, out: Option<&str>) -> Result<()> {
    let raw = std::fs::read_to_string(tick_path).with_context(|| format!("Cannot read {tick_path}"))?;
    let tick = Tick::decode(&raw).with_context(|| format!("Cannot parse tick {tick_path}"))?;

    let mut buffer = TickBuffer::new(1);
    buffer.append(tick);
    let replay = ReplayController::new();
    let frame = active_frame(FrameInputs {
        buffer:   Some(&buffer),
        replay:   Some(&replay),
        run:      None,
        snapshot: None,
        scenario: None,
    })
    .context("tick has nothing to draw")?;

    let options = RenderOptions {
        show_heatmap: config.show_heatmap,
        cell_px:      config.cell_px,
    };
    let mut svg = SvgSurface::new();
    render_frame(&frame, &options, &mut svg);
    let doc = svg.finish();

    match out {
        Some(path) => {
            write_file(Path::new(path), &doc)?;
            println!("wrote {path}");
        }
        None => print!("{doc}"),
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Cannot write {}", path.display()))
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
