use log::debug;

use crate::{
    encoding::WidePath,
    error::DialogError,
    params::DialogParams,
    picker::{FolderPicker, PickerSession},
};

/// Stands in for the native folder picker on platforms without one. Initialization always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFolderPicker;

impl FolderPicker for NativeFolderPicker {
    type Session = UnsupportedSession;

    fn initialize(&self) -> Result<UnsupportedSession, DialogError> {
        debug!("No native folder picker on this platform");
        Err(DialogError::UnsupportedPlatform)
    }
}

/// Never constructed: initialization fails before a session exists.
#[derive(Debug)]
pub enum UnsupportedSession {}

impl PickerSession for UnsupportedSession {
    fn show_folder_picker(&mut self, _params: &DialogParams) -> Result<Option<WidePath>, DialogError> {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_fails() {
        match NativeFolderPicker.initialize() {
            Err(DialogError::UnsupportedPlatform) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
