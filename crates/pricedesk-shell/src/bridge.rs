use pricedesk_core::WorkerAction;
use serde_json::Value;

/// UI-originated commands. The bridge is a pure router: `route` maps each
/// command to its worker action and passes the payload through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    PerformSearch { term: String },
    CancelSearch,
    ExportToExcel { options: Value },
    LoadSettings,
    SaveSettings { settings: Value },
    StartBatchSearch { terms: Value },
    CancelBatchSearch,
    CancelCurrentTermSearch,
    GetParities,
    LoadCalendarNotes,
    SaveCalendarNotes { notes: Value },
    ExportMeetings { options: Value },
    CheckNotificationsNow,
    RendererReady,
}

impl UiCommand {
    pub fn route(self) -> (WorkerAction, Value) {
        match self {
            UiCommand::PerformSearch { term } => (WorkerAction::Search, Value::String(term)),
            UiCommand::CancelSearch => (WorkerAction::CancelSearch, Value::Null),
            UiCommand::ExportToExcel { options } => (WorkerAction::Export, options),
            UiCommand::LoadSettings => (WorkerAction::LoadSettings, Value::Null),
            UiCommand::SaveSettings { settings } => (WorkerAction::SaveSettings, settings),
            UiCommand::StartBatchSearch { terms } => (WorkerAction::StartBatchSearch, terms),
            UiCommand::CancelBatchSearch => (WorkerAction::CancelBatchSearch, Value::Null),
            UiCommand::CancelCurrentTermSearch => {
                (WorkerAction::CancelCurrentTermSearch, Value::Null)
            }
            UiCommand::GetParities => (WorkerAction::GetParities, Value::Null),
            UiCommand::LoadCalendarNotes => (WorkerAction::LoadCalendarNotes, Value::Null),
            UiCommand::SaveCalendarNotes { notes } => (WorkerAction::SaveCalendarNotes, notes),
            UiCommand::ExportMeetings { options } => (WorkerAction::ExportMeetings, options),
            UiCommand::CheckNotificationsNow => (WorkerAction::CheckNotificationsNow, Value::Null),
            UiCommand::RendererReady => (WorkerAction::RendererReady, Value::Null),
        }
    }
}

/// UI notification channels. Worker tags resolve to the enumerated variants
/// when known; anything else is forwarded generically as `Other`, so the
/// worker may introduce new types without a host change while the dispatch
/// surface for the host's own events stays bounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UiChannel {
    WorkerReady,
    SearchComplete,
    SearchProgress,
    SearchError,
    BatchSearchProgress,
    BatchSearchComplete,
    ExportComplete,
    SettingsLoaded,
    SettingsSaved,
    Parities,
    CalendarNotesLoaded,
    MeetingsExported,
    Notification,
    WorkerCrashed,
    UpdateChecking,
    UpdateAvailable,
    UpdateNotAvailable,
    UpdateError,
    UpdateDownloadProgress,
    UpdateDownloaded,
    Other(String),
}

impl UiChannel {
    pub fn name(&self) -> &str {
        match self {
            UiChannel::WorkerReady => "ready",
            UiChannel::SearchComplete => "search-complete",
            UiChannel::SearchProgress => "search-progress",
            UiChannel::SearchError => "search-error",
            UiChannel::BatchSearchProgress => "batch-search-progress",
            UiChannel::BatchSearchComplete => "batch-search-complete",
            UiChannel::ExportComplete => "export-complete",
            UiChannel::SettingsLoaded => "settings-loaded",
            UiChannel::SettingsSaved => "settings-saved",
            UiChannel::Parities => "parities",
            UiChannel::CalendarNotesLoaded => "calendar-notes-loaded",
            UiChannel::MeetingsExported => "meetings-exported",
            UiChannel::Notification => "notification",
            UiChannel::WorkerCrashed => "worker-crashed",
            UiChannel::UpdateChecking => "checking",
            UiChannel::UpdateAvailable => "update-available",
            UiChannel::UpdateNotAvailable => "update-not-available",
            UiChannel::UpdateError => "error",
            UiChannel::UpdateDownloadProgress => "download-progress",
            UiChannel::UpdateDownloaded => "update-downloaded",
            UiChannel::Other(name) => name,
        }
    }
}

/// Maps worker message tags to UI channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelRegistry;

impl ChannelRegistry {
    pub fn resolve(&self, tag: &str) -> UiChannel {
        match tag {
            "ready" => UiChannel::WorkerReady,
            "search-complete" => UiChannel::SearchComplete,
            "search-progress" => UiChannel::SearchProgress,
            "search-error" => UiChannel::SearchError,
            "batch-search-progress" => UiChannel::BatchSearchProgress,
            "batch-search-complete" => UiChannel::BatchSearchComplete,
            "export-complete" => UiChannel::ExportComplete,
            "settings-loaded" => UiChannel::SettingsLoaded,
            "settings-saved" => UiChannel::SettingsSaved,
            "parities" => UiChannel::Parities,
            "calendar-notes-loaded" => UiChannel::CalendarNotesLoaded,
            "meetings-exported" => UiChannel::MeetingsExported,
            "notification" => UiChannel::Notification,
            other => UiChannel::Other(other.to_string()),
        }
    }
}
