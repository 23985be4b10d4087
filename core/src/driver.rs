//! Async driver. Executes the view's effects and feeds results back.
//!
//! RULES:
//!   - One consumer. The driver owns the `RunView` and is the only caller of
//!     `handle()`. Sockets, timers and requests are tasks that only send
//!     inputs into the driver's inbox.
//!   - Every task handle lives in a `TaskGuard`. Dropping the guard aborts
//!     the task, so nothing outlives the slot that owns it.
//!   - The stream slot drops its reconnect timer before its socket.

use crate::{
    api::ApiClient,
    config::ClientConfig,
    error::ReplayResult,
    stream::run_stream,
    types::{Epoch, RunId},
    view::{Effect, RunView, ViewInput},
};
use std::{future::Future, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

/// Aborts its task on drop unless detached.
#[derive(Debug)]
pub struct TaskGuard(Option<JoinHandle<()>>);

impl TaskGuard {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(Some(tokio::spawn(future)))
    }

    pub fn is_finished(&self) -> bool {
        self.0.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Let the task run to completion on its own.
    pub fn detach(mut self) {
        self.0.take();
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

struct SocketTask {
    stop:  oneshot::Sender<()>,
    guard: TaskGuard,
}

impl SocketTask {
    /// Ask the worker to send a close frame, then leave it to finish.
    fn close(self) {
        let _ = self.stop.send(());
        self.guard.detach();
    }
}

/// Every handle belonging to the one run the driver is attached to.
/// Field order is drop order: timers go before the socket.
struct StreamSlot {
    run_id:    RunId,
    reconnect: Option<TaskGuard>,
    poll:      Option<TaskGuard>,
    socket:    Option<SocketTask>,
}

impl StreamSlot {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            reconnect: None,
            poll: None,
            socket: None,
        }
    }
}

/// Why the observer is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCause {
    /// The view handled an input and may have changed.
    Input,
    /// Someone asked for the current state.
    Snapshot,
}

#[derive(Debug)]
enum DriverEvent {
    Input(ViewInput),
    Snapshot,
    Shutdown,
}

/// Cheap handle for feeding the driver from anywhere.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl DriverHandle {
    /// Returns false once the driver has stopped.
    pub fn send(&self, input: ViewInput) -> bool {
        self.tx.send(DriverEvent::Input(input)).is_ok()
    }

    pub fn request_snapshot(&self) -> bool {
        self.tx.send(DriverEvent::Snapshot).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(DriverEvent::Shutdown);
    }
}

pub struct Driver {
    view:             RunView,
    api:              ApiClient,
    catalog_interval: Duration,
    events:           mpsc::UnboundedReceiver<DriverEvent>,
    /// Inputs produced by spawned tasks.
    inputs_tx:        mpsc::UnboundedSender<ViewInput>,
    inputs_rx:        mpsc::UnboundedReceiver<ViewInput>,
    slot:             Option<StreamSlot>,
    requests:         Vec<TaskGuard>,
}

impl Driver {
    pub fn new(config: &ClientConfig) -> ReplayResult<(Self, DriverHandle)> {
        let api = ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )?;
        let (tx, events) = mpsc::unbounded_channel();
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let driver = Self {
            view: RunView::new(config.view_config()),
            api,
            catalog_interval: Duration::from_secs(config.catalog_refresh_secs.max(1)),
            events,
            inputs_tx,
            inputs_rx,
            slot: None,
            requests: Vec::new(),
        };
        Ok((driver, DriverHandle { tx }))
    }

    pub fn view(&self) -> &RunView {
        &self.view
    }

    /// Run until `shutdown()`. `observe` sees the view after every handled
    /// input and on every snapshot request.
    pub async fn run<F>(mut self, mut observe: F)
    where
        F: FnMut(&RunView, UpdateCause),
    {
        let mut refresh = interval_at(Instant::now() + self.catalog_interval, self.catalog_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let effects = self.view.start();
        self.execute(effects);

        loop {
            let input = tokio::select! {
                event = self.events.recv() => match event {
                    Some(DriverEvent::Input(input)) => input,
                    Some(DriverEvent::Snapshot) => {
                        observe(&self.view, UpdateCause::Snapshot);
                        continue;
                    }
                    Some(DriverEvent::Shutdown) | None => break,
                },
                Some(input) = self.inputs_rx.recv() => input,
                _ = refresh.tick() => ViewInput::CatalogRefreshDue,
            };

            let effects = self.view.handle(input);
            self.execute(effects);
            observe(&self.view, UpdateCause::Input);
        }

        log::info!("driver shutting down");
        let effects = self.view.handle(ViewInput::Leave);
        self.execute(effects);
        observe(&self.view, UpdateCause::Input);
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        self.requests.retain(|guard| !guard.is_finished());
        for effect in effects {
            log::debug!("effect: {effect:?}");
            match effect {
                Effect::FetchCatalog => {
                    let api = self.api.clone();
                    self.spawn_request(async move {
                        let (scenarios, runs) = tokio::join!(api.list_scenarios(), api.list_runs());
                        ViewInput::CatalogLoaded { scenarios, runs }
                    });
                }
                Effect::FetchRun { run_id, epoch } => {
                    let api = self.api.clone();
                    self.spawn_request(async move {
                        let result = api.get_run(&run_id).await;
                        ViewInput::RunLoaded { run_id, epoch, result }
                    });
                }
                Effect::FetchTimeline { run_id, epoch } => {
                    let api = self.api.clone();
                    self.spawn_request(async move {
                        let result = api.get_timeline(&run_id).await;
                        ViewInput::TimelineLoaded { run_id, epoch, result }
                    });
                }
                Effect::OpenStream { run_id, epoch, attempt } => self.open_stream(run_id, epoch, attempt),
                Effect::CloseStream { run_id } => {
                    if let Some(socket) = self.slot_for(&run_id).and_then(|slot| slot.socket.take()) {
                        socket.close();
                    }
                }
                Effect::ScheduleReconnect { run_id, epoch, delay } => {
                    let timer = self.timer(delay, ViewInput::ReconnectDue {
                        run_id: run_id.clone(),
                        epoch,
                    });
                    self.slot_mut(&run_id).reconnect = Some(timer);
                }
                Effect::CancelReconnect { run_id } => {
                    if let Some(slot) = self.slot_for(&run_id) {
                        slot.reconnect = None;
                    }
                }
                Effect::SchedulePoll { run_id, epoch, delay } => {
                    let timer = self.timer(delay, ViewInput::PollDue {
                        run_id: run_id.clone(),
                        epoch,
                    });
                    self.slot_mut(&run_id).poll = Some(timer);
                }
                Effect::CancelPoll { run_id } => {
                    if let Some(slot) = self.slot_for(&run_id) {
                        slot.poll = None;
                    }
                }
                Effect::CreateScenario(config) => {
                    let api = self.api.clone();
                    self.spawn_request(async move {
                        ViewInput::ScenarioCreated(api.create_scenario(&config).await)
                    });
                }
                Effect::LaunchRun { scenario_id } => {
                    let api = self.api.clone();
                    self.spawn_request(async move { ViewInput::RunLaunched(api.launch_run(&scenario_id).await) });
                }
                Effect::CancelRun { run_id } => {
                    let api = self.api.clone();
                    self.spawn_request(async move {
                        let result = api.cancel_run(&run_id).await;
                        ViewInput::CancelRequested { run_id, result }
                    });
                }
            }
        }
    }

    fn open_stream(&mut self, run_id: RunId, epoch: Epoch, attempt: u32) {
        let url = match self.api.stream_url(&run_id) {
            Ok(url) => url,
            Err(err) => {
                let _ = self.inputs_tx.send(ViewInput::StreamEnded {
                    run_id,
                    epoch,
                    cause: crate::connection::EndCause::Error(err.to_string()),
                });
                return;
            }
        };
        log::info!("run={run_id} opening stream (attempt {attempt})");
        let (stop, stop_rx) = oneshot::channel();
        let guard = TaskGuard::spawn(run_stream(url, run_id.clone(), epoch, self.inputs_tx.clone(), stop_rx));
        if let Some(previous) = self.slot_mut(&run_id).socket.replace(SocketTask { stop, guard }) {
            previous.close();
        }
    }

    fn spawn_request<F>(&mut self, request: F)
    where
        F: Future<Output = ViewInput> + Send + 'static,
    {
        let tx = self.inputs_tx.clone();
        self.requests.push(TaskGuard::spawn(async move {
            let _ = tx.send(request.await);
        }));
    }

    fn timer(&self, delay: Duration, input: ViewInput) -> TaskGuard {
        let tx = self.inputs_tx.clone();
        TaskGuard::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(input);
        })
    }

    fn slot_for(&mut self, run_id: &str) -> Option<&mut StreamSlot> {
        self.slot.as_mut().filter(|slot| slot.run_id == run_id)
    }

    /// The slot for `run_id`, replacing (and so releasing) any other run's.
    fn slot_mut(&mut self, run_id: &str) -> &mut StreamSlot {
        if self.slot.as_ref().map_or(true, |slot| slot.run_id != run_id) {
            self.slot = Some(StreamSlot::new(run_id.to_string()));
        }
        self.slot.get_or_insert_with(|| StreamSlot::new(run_id.to_string()))
    }
}
