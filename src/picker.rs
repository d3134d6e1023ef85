use crate::{encoding::WidePath, error::DialogError, params::DialogParams};

/// Access to a folder picker service.
///
/// Initialization and teardown of the underlying UI subsystem are tied to the lifetime of the
/// returned session: dropping the session uninitializes the subsystem.
pub trait FolderPicker {
    type Session: PickerSession;

    /// Initializes the UI subsystem for the calling thread.
    ///
    /// # Errors
    /// Fails if the subsystem is not available. No resources are held on failure.
    fn initialize(&self) -> Result<Self::Session, DialogError>;
}

/// An initialized UI subsystem that can show the folder picker.
pub trait PickerSession {
    /// Shows a modal folder picker and blocks until the user accepts or cancels.
    ///
    /// Returns `Ok(None)` if the user cancelled. Every resource acquired for the dialog is
    /// released before this returns, on success and on failure.
    fn show_folder_picker(&mut self, params: &DialogParams) -> Result<Option<WidePath>, DialogError>;
}
