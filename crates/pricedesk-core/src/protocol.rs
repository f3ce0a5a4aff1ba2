use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Outbound command tags, written to the worker's stdin. This set is closed:
/// the host never invents actions the worker does not understand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkerAction {
    Search,
    CancelSearch,
    Export,
    LoadSettings,
    SaveSettings,
    StartBatchSearch,
    CancelBatchSearch,
    CancelCurrentTermSearch,
    GetParities,
    LoadCalendarNotes,
    SaveCalendarNotes,
    ExportMeetings,
    CheckNotificationsNow,
    RendererReady,
    Shutdown,
}

impl WorkerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerAction::Search => "search",
            WorkerAction::CancelSearch => "cancel_search",
            WorkerAction::Export => "export",
            WorkerAction::LoadSettings => "load_settings",
            WorkerAction::SaveSettings => "save_settings",
            WorkerAction::StartBatchSearch => "start_batch_search",
            WorkerAction::CancelBatchSearch => "cancel_batch_search",
            WorkerAction::CancelCurrentTermSearch => "cancel_current_term_search",
            WorkerAction::GetParities => "get_parities",
            WorkerAction::LoadCalendarNotes => "load_calendar_notes",
            WorkerAction::SaveCalendarNotes => "save_calendar_notes",
            WorkerAction::ExportMeetings => "export_meetings",
            WorkerAction::CheckNotificationsNow => "check_notifications_now",
            WorkerAction::RendererReady => "renderer_ready",
            WorkerAction::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for WorkerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerAction {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "search" => Ok(WorkerAction::Search),
            "cancel_search" => Ok(WorkerAction::CancelSearch),
            "export" => Ok(WorkerAction::Export),
            "load_settings" => Ok(WorkerAction::LoadSettings),
            "save_settings" => Ok(WorkerAction::SaveSettings),
            "start_batch_search" => Ok(WorkerAction::StartBatchSearch),
            "cancel_batch_search" => Ok(WorkerAction::CancelBatchSearch),
            "cancel_current_term_search" => Ok(WorkerAction::CancelCurrentTermSearch),
            "get_parities" => Ok(WorkerAction::GetParities),
            "load_calendar_notes" => Ok(WorkerAction::LoadCalendarNotes),
            "save_calendar_notes" => Ok(WorkerAction::SaveCalendarNotes),
            "export_meetings" => Ok(WorkerAction::ExportMeetings),
            "check_notifications_now" => Ok(WorkerAction::CheckNotificationsNow),
            "renderer_ready" => Ok(WorkerAction::RendererReady),
            "shutdown" => Ok(WorkerAction::Shutdown),
            other => Err(format!("Unknown action: {other}")),
        }
    }
}

/// One host-to-worker message: `{"action": ..., "data": ...}` plus a newline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandFrame {
    pub action: WorkerAction,
    pub data: Value,
}

impl CommandFrame {
    pub fn new(action: WorkerAction, data: Value) -> Self {
        Self { action, data }
    }

    /// A command that carries no payload; `data` is serialized as JSON null.
    pub fn bare(action: WorkerAction) -> Self {
        Self {
            action,
            data: Value::Null,
        }
    }
}

/// One worker-to-host message: `{"type": ..., "data": ...}`. The tag is an
/// open string; the worker may introduce new types without a host change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}
