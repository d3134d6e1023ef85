use thiserror::Error;

/// Error returned when showing the folder picker fails
#[derive(Debug, Error)]
pub enum DialogError {
    /// The selected item does not have a regular filesystem path. Selecting virtual shell
    /// folders such as "This PC" or a folder on a WPD device like a phone causes this error.
    #[error("the selected item has no filesystem path")]
    UnsupportedFilepath,
    /// No native folder picker is available on this platform
    #[error("no native folder picker is available on this platform")]
    UnsupportedPlatform,
    /// A COM call failed, the HRESULT that caused the error is included
    #[error("{error_method} failed with HRESULT {hresult:#010X}")]
    HResultFailed {
        /// The COM method that failed
        error_method: String,
        /// The HRESULT error code
        hresult: i32,
    },
}

/// Error returned when converting a wide path into narrow text fails
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("path of {len} UTF-16 units exceeds the converter's limit")]
    TooLong { len: usize },
    #[error("measured {measured} bytes but {written} were written")]
    LengthMismatch { measured: usize, written: usize },
    #[error("{function} failed with error code {code}")]
    Win32 { function: &'static str, code: u32 },
}
