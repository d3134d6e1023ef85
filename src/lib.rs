//! This crate shows the native folder picker and writes the selected path to a byte sink,
//! normally stdout, so that a calling process can capture it through a pipe.
//!
//! The platform dialog sits behind the [`FolderPicker`] trait, which makes every step of
//! [`run`] testable with a substitute picker.
use std::io::{self, Write};
use std::process::ExitCode;

use log::{debug, error, info, warn};
use thiserror::Error;

mod encoding;
mod error;
mod params;
mod picker;

#[cfg(windows)]
mod windows;
#[cfg(not(windows))]
mod unsupported;

pub use crate::encoding::{narrow, ActiveCodePage, CodePage, Utf8, WidePath};
pub use crate::error::{DialogError, EncodingError};
pub use crate::params::DialogParams;
pub use crate::picker::{FolderPicker, PickerSession};

#[cfg(windows)]
pub use crate::windows::{AnsiCodePage, ComSession, NativeFolderPicker, StdoutHandle};
#[cfg(windows)]
pub use winapi::um::shobjidl::{
    FOS_DONTADDTORECENT, FOS_FORCEFILESYSTEM, FOS_FORCESHOWHIDDEN, FOS_HIDEMRUPLACES,
    FOS_HIDEPINNEDPLACES, FOS_NOCHANGEDIR, FOS_PATHMUSTEXIST, FOS_PICKFOLDERS,
};

#[cfg(not(windows))]
pub use crate::unsupported::{NativeFolderPicker, UnsupportedSession};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Dialog(#[from] DialogError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How a run ended, as seen by the calling process.
///
/// Cancelling the dialog is not distinguished from a selection: both complete normally and
/// differ only in whether anything was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The UI subsystem was initialized. A path may or may not have been written.
    Completed,
    /// The UI subsystem could not be initialized. Nothing was written.
    InitializationFailed,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Completed => 0,
            Status::InitializationFailed => 1,
        }
    }
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status.code())
    }
}

/// Shows the folder picker and writes the selected path to `out`, converted with `code_page`.
///
/// The path is written exactly once, without quoting or a trailing newline. Nothing is written
/// if the user cancels or if any step after initialization fails; those failures are logged.
///
/// # Examples
///
/// ```no_run
/// use pick_folder::{ActiveCodePage, DialogParams, NativeFolderPicker};
///
/// let status = pick_folder::run(
///     &NativeFolderPicker,
///     &ActiveCodePage,
///     &DialogParams::default(),
///     &mut std::io::stdout(),
/// );
/// std::process::exit(status.code().into());
/// ```
pub fn run<P, C, W>(picker: &P, code_page: &C, params: &DialogParams, out: &mut W) -> Status
where
    P: FolderPicker + ?Sized,
    C: CodePage + ?Sized,
    W: Write + ?Sized,
{
    let mut session = match picker.initialize() {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to initialize the UI subsystem: {}", err);
            return Status::InitializationFailed;
        }
    };

    match pick_and_write(&mut session, code_page, params, out) {
        Ok(Some(len)) => info!("Wrote selected folder ({} bytes)", len),
        Ok(None) => info!("No folder selected"),
        Err(err) => warn!("No folder written: {}", err),
    }

    // Uninitialize only after all dialog resources are gone
    drop(session);
    Status::Completed
}

fn pick_and_write<S, C, W>(
    session: &mut S,
    code_page: &C,
    params: &DialogParams,
    out: &mut W,
) -> Result<Option<usize>>
where
    S: PickerSession,
    C: CodePage + ?Sized,
    W: Write + ?Sized,
{
    let path = match session.show_folder_picker(params)? {
        Some(path) => path,
        None => return Ok(None),
    };
    debug!("Selected folder: {}", path);

    let bytes = narrow(&path, code_page)?;
    out.write_all(&bytes)?;
    out.flush()?;
    Ok(Some(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Status::Completed.code(), 0);
        assert_eq!(Status::InitializationFailed.code(), 1);
    }

    #[test]
    fn errors_keep_their_source_message() {
        let err = Error::from(DialogError::HResultFailed {
            error_method: "IModalWindow::Show".to_string(),
            hresult: 0x8000_4005_u32 as i32,
        });
        assert_eq!(err.to_string(), "IModalWindow::Show failed with HRESULT 0x80004005");
    }
}
