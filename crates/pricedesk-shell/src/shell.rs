use crate::bridge::{ChannelRegistry, UiChannel, UiCommand};
use crate::picker::FilePicker;
use crate::supervisor::{SupervisorEvent, WorkerSupervisor};
use crate::updater::UpdaterHandle;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

/// One event on a UI notification channel.
#[derive(Debug, Clone)]
pub struct ShellEvent {
    pub channel: UiChannel,
    pub payload: Value,
}

/// A live subscription to one channel. Dropping it unsubscribes.
pub struct Subscription {
    channel: UiChannel,
    rx: broadcast::Receiver<ShellEvent>,
}

impl Subscription {
    /// Next event on this channel, or `None` once the host shuts down.
    pub async fn next(&mut self) -> Option<ShellEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.channel == self.channel => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "subscription to {} lagged, {skipped} events dropped",
                        self.channel.name()
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Forwards supervisor output onto UI channels. Worker frames are resolved
/// through the channel registry; crash signals land on `worker-crashed`.
pub fn spawn_event_router(
    mut rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    events: broadcast::Sender<ShellEvent>,
) -> JoinHandle<()> {
    let registry = ChannelRegistry;
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let out = match event {
                SupervisorEvent::Frame(frame) => ShellEvent {
                    channel: registry.resolve(&frame.kind),
                    payload: frame.data,
                },
                SupervisorEvent::Crashed => ShellEvent {
                    channel: UiChannel::WorkerCrashed,
                    payload: Value::Null,
                },
            };
            // no receivers is fine; the render layer may not be up yet
            let _ = events.send(out);
        }
    })
}

/// The only API the render layer sees: an enumerated set of command
/// functions and per-channel subscriptions. The render context never holds
/// the worker handle or any OS primitive directly.
pub struct ShellCapabilities {
    supervisor: Arc<WorkerSupervisor>,
    events: broadcast::Sender<ShellEvent>,
    picker: Arc<dyn FilePicker>,
    updater: UpdaterHandle,
}

impl ShellCapabilities {
    pub fn new(
        supervisor: Arc<WorkerSupervisor>,
        events: broadcast::Sender<ShellEvent>,
        picker: Arc<dyn FilePicker>,
        updater: UpdaterHandle,
    ) -> Self {
        Self {
            supervisor,
            events,
            picker,
            updater,
        }
    }

    pub fn subscribe(&self, channel: UiChannel) -> Subscription {
        Subscription {
            channel,
            rx: self.events.subscribe(),
        }
    }

    fn dispatch(&self, command: UiCommand) {
        let (action, data) = command.route();
        self.supervisor.send(action, data);
    }

    pub fn perform_search(&self, term: impl Into<String>) {
        self.dispatch(UiCommand::PerformSearch { term: term.into() });
    }

    pub fn cancel_search(&self) {
        self.dispatch(UiCommand::CancelSearch);
    }

    pub fn export_to_excel(&self, options: Value) {
        self.dispatch(UiCommand::ExportToExcel { options });
    }

    pub fn load_settings(&self) {
        self.dispatch(UiCommand::LoadSettings);
    }

    pub fn save_settings(&self, settings: Value) {
        self.dispatch(UiCommand::SaveSettings { settings });
    }

    pub fn start_batch_search(&self, terms: Value) {
        self.dispatch(UiCommand::StartBatchSearch { terms });
    }

    pub fn cancel_batch_search(&self) {
        self.dispatch(UiCommand::CancelBatchSearch);
    }

    pub fn cancel_current_term_search(&self) {
        self.dispatch(UiCommand::CancelCurrentTermSearch);
    }

    pub fn get_parities(&self) {
        self.dispatch(UiCommand::GetParities);
    }

    pub fn load_calendar_notes(&self) {
        self.dispatch(UiCommand::LoadCalendarNotes);
    }

    pub fn save_calendar_notes(&self, notes: Value) {
        self.dispatch(UiCommand::SaveCalendarNotes { notes });
    }

    pub fn export_meetings(&self, options: Value) {
        self.dispatch(UiCommand::ExportMeetings { options });
    }

    pub fn check_notifications_now(&self) {
        self.dispatch(UiCommand::CheckNotificationsNow);
    }

    pub fn renderer_ready(&self) {
        self.dispatch(UiCommand::RendererReady);
    }

    /// Opens the native file dialog off the async runtime. A cancelled
    /// dialog resolves to `None`, never an error.
    pub async fn select_file(&self) -> Option<PathBuf> {
        let picker = self.picker.clone();
        match tokio::task::spawn_blocking(move || picker.pick_file()).await {
            Ok(path) => path,
            Err(err) => {
                warn!("file dialog task failed: {err}");
                None
            }
        }
    }

    /// Finalizes an already-downloaded update and restarts. Returns false
    /// (and does nothing) when no update has been downloaded yet.
    pub fn restart_and_update(&self) -> bool {
        self.updater.restart_and_update()
    }
}
