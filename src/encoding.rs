//! Conversion of wide (UTF-16) paths into the narrow text written to stdout.
use std::fmt;

use crate::error::EncodingError;

/// A path as returned by the platform dialog: UTF-16 code units without a terminator.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct WidePath(Vec<u16>);

impl WidePath {
    pub fn from_units(units: Vec<u16>) -> Self {
        // Stop at the first terminator, as the platform would.
        let mut units = units;
        if let Some(nul) = units.iter().position(|&unit| unit == 0) {
            units.truncate(nul);
        }
        WidePath(units)
    }

    pub fn as_units(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for WidePath {
    fn from(path: &str) -> Self {
        WidePath(path.encode_utf16().collect())
    }
}

impl fmt::Display for WidePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf16_lossy(&self.0))
    }
}

impl fmt::Debug for WidePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WidePath({:?})", String::from_utf16_lossy(&self.0))
    }
}

/// A narrow target encoding with a two-pass conversion interface.
///
/// The first pass reports how many bytes the converted text needs, the second pass writes into
/// a buffer of exactly that size and reports how many bytes it wrote.
pub trait CodePage {
    fn measure(&self, wide: &[u16]) -> Result<usize, EncodingError>;

    fn encode_into(&self, wide: &[u16], buf: &mut [u8]) -> Result<usize, EncodingError>;
}

/// Converts `wide` into narrow text using `code_page`.
///
/// ```
/// use pick_folder::{narrow, Utf8, WidePath};
///
/// let path = WidePath::from(r"C:\Users\Test\Documents");
/// let bytes = narrow(&path, &Utf8).unwrap();
/// assert_eq!(bytes, br"C:\Users\Test\Documents");
/// ```
///
/// # Errors
/// Fails if either pass fails or if the second pass does not write the measured length.
pub fn narrow<C>(wide: &WidePath, code_page: &C) -> Result<Vec<u8>, EncodingError>
where
    C: CodePage + ?Sized,
{
    if wide.is_empty() {
        return Ok(Vec::new());
    }
    let units = wide.as_units();

    let measured = code_page.measure(units)?;
    let mut buf = vec![0u8; measured];
    let written = code_page.encode_into(units, &mut buf)?;
    if written != measured {
        return Err(EncodingError::LengthMismatch { measured, written });
    }
    Ok(buf)
}

/// UTF-8 output. Unpaired surrogates are replaced by U+FFFD.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl CodePage for Utf8 {
    fn measure(&self, wide: &[u16]) -> Result<usize, EncodingError> {
        Ok(decode_lossy(wide).map(|c| c.len_utf8()).sum())
    }

    fn encode_into(&self, wide: &[u16], buf: &mut [u8]) -> Result<usize, EncodingError> {
        let mut written = 0;
        for c in decode_lossy(wide) {
            let len = c.len_utf8();
            if written + len > buf.len() {
                return Err(EncodingError::LengthMismatch {
                    measured: buf.len(),
                    written: written + len,
                });
            }
            c.encode_utf8(&mut buf[written..written + len]);
            written += len;
        }
        Ok(written)
    }
}

/// The host's active narrow encoding.
///
/// On Windows this is the ANSI code page (`CP_ACP`). Other hosts have no separate legacy code
/// page and use UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveCodePage;

#[cfg(windows)]
impl CodePage for ActiveCodePage {
    fn measure(&self, wide: &[u16]) -> Result<usize, EncodingError> {
        crate::windows::AnsiCodePage.measure(wide)
    }

    fn encode_into(&self, wide: &[u16], buf: &mut [u8]) -> Result<usize, EncodingError> {
        crate::windows::AnsiCodePage.encode_into(wide, buf)
    }
}

#[cfg(not(windows))]
impl CodePage for ActiveCodePage {
    fn measure(&self, wide: &[u16]) -> Result<usize, EncodingError> {
        Utf8.measure(wide)
    }

    fn encode_into(&self, wide: &[u16], buf: &mut [u8]) -> Result<usize, EncodingError> {
        Utf8.encode_into(wide, buf)
    }
}

fn decode_lossy(wide: &[u16]) -> impl Iterator<Item = char> + '_ {
    char::decode_utf16(wide.iter().copied()).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
}
