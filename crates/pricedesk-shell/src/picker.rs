use std::path::PathBuf;

/// Seam for the native file dialog so the capability surface can be tested
/// without a desktop session. Cancelling the dialog is a normal outcome.
pub trait FilePicker: Send + Sync {
    fn pick_file(&self) -> Option<PathBuf>;
}

pub struct NativeFilePicker;

impl FilePicker for NativeFilePicker {
    fn pick_file(&self) -> Option<PathBuf> {
        rfd::FileDialog::new().pick_file()
    }
}
