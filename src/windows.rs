//! Folder picker backed by the Windows `IFileOpenDialog` COM component.
use std::{
    io::{self, Write},
    marker::PhantomData,
    ops::Deref,
    os::raw::c_int,
    ptr::{self, NonNull},
    slice,
};

use libc::wcslen;
use log::{debug, warn};
use winapi::{
    ctypes::c_void,
    shared::{
        minwindef::{DWORD, LPCVOID, LPVOID},
        ntdef::{LPSTR, LPWSTR},
        winerror::{E_POINTER, ERROR_CANCELLED, HRESULT, HRESULT_FROM_WIN32, SUCCEEDED},
    },
    um::{
        combaseapi::{CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL},
        errhandlingapi::GetLastError,
        fileapi::WriteFile,
        handleapi::INVALID_HANDLE_VALUE,
        objbase::{COINIT_APARTMENTTHREADED, COINIT_DISABLE_OLE1DDE},
        processenv::GetStdHandle,
        shobjidl::{IFileDialog, IFileOpenDialog, FOS_PICKFOLDERS},
        shobjidl_core::{CLSID_FileOpenDialog, IShellItem, SHCreateItemFromParsingName, SFGAOF, SIGDN_FILESYSPATH},
        stringapiset::WideCharToMultiByte,
        unknwnbase::IUnknown,
        winbase::STD_OUTPUT_HANDLE,
        winnt::HANDLE,
        winnls::CP_ACP,
    },
    Interface,
};

use crate::{
    encoding::{CodePage, WidePath},
    error::{DialogError, EncodingError},
    params::DialogParams,
    picker::{FolderPicker, PickerSession},
};

macro_rules! com {
    ($com_expr:expr, $method_name:expr ) => { com(|| unsafe { $com_expr }, $method_name) };
}

trait NullTermUTF16 {
    fn as_null_term_utf16(&self) -> Vec<u16>;
}

impl NullTermUTF16 for str {
    fn as_null_term_utf16(&self) -> Vec<u16> {
        self.encode_utf16().chain(Some(0)).collect()
    }
}

const SFGAO_FILESYSTEM: u32 = 0x4000_0000;

/// The native Windows folder picker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFolderPicker;

impl FolderPicker for NativeFolderPicker {
    type Session = ComSession;

    fn initialize(&self) -> Result<ComSession, DialogError> {
        com!(CoInitializeEx(
                ptr::null_mut(),
                COINIT_APARTMENTTHREADED | COINIT_DISABLE_OLE1DDE,
            ), "CoInitializeEx")?;
        debug!("Initialized COM");
        Ok(ComSession { _not_send: PhantomData })
    }
}

/// An initialized COM apartment. Dropping it calls `CoUninitialize`.
#[derive(Debug)]
pub struct ComSession {
    // COM must be uninitialized on the thread that initialized it
    _not_send: PhantomData<*const ()>,
}

impl Drop for ComSession {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
        debug!("Uninitialized COM");
    }
}

impl PickerSession for ComSession {
    fn show_folder_picker(&mut self, params: &DialogParams) -> Result<Option<WidePath>, DialogError> {
        // Create IFileOpenDialog instance
        let mut file_open_dialog: *mut IFileOpenDialog = ptr::null_mut();
        com!(CoCreateInstance(
                &CLSID_FileOpenDialog,
                ptr::null_mut(),
                CLSCTX_ALL,
                &IFileOpenDialog::uuidof(),
                &mut file_open_dialog as *mut *mut IFileOpenDialog as *mut *mut c_void,
            ), "CoCreateInstance - IFileOpenDialog")?;
        let file_open_dialog = ComPtr::from_raw(file_open_dialog, "CoCreateInstance - IFileOpenDialog")?;

        configure_folder_dialog(&file_open_dialog, params)?;

        if !show_dialog(&file_open_dialog)? {
            return Ok(None);
        }

        // IFileDialog::GetResult
        let mut shell_item: *mut IShellItem = ptr::null_mut();
        com!(file_open_dialog.GetResult(&mut shell_item), "IFileDialog::GetResult")?;
        let shell_item = ComPtr::from_raw(shell_item, "IFileDialog::GetResult")?;

        // Reject items such as "This PC" that have no regular filesystem path
        let mut attribs: SFGAOF = 0;
        com!(shell_item.GetAttributes(SFGAO_FILESYSTEM, &mut attribs), "IShellItem::GetAttributes")?;
        if attribs & SFGAO_FILESYSTEM == 0 {
            return Err(DialogError::UnsupportedFilepath);
        }

        get_shell_item_display_name(&shell_item).map(Some)
    }
}

/// Owns one reference to a COM interface and releases it on drop.
struct ComPtr<T: Interface>(NonNull<T>);

impl<T: Interface> ComPtr<T> {
    fn from_raw(raw: *mut T, method: &str) -> Result<Self, DialogError> {
        NonNull::new(raw).map(ComPtr).ok_or_else(|| DialogError::HResultFailed {
            error_method: method.to_string(),
            hresult: E_POINTER,
        })
    }

    fn as_raw(&self) -> *mut T {
        self.0.as_ptr()
    }
}

impl<T: Interface> Deref for ComPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.0.as_ref() }
    }
}

impl<T: Interface> Drop for ComPtr<T> {
    fn drop(&mut self) {
        // Every COM interface starts with the IUnknown vtable
        unsafe { (*(self.0.as_ptr() as *mut IUnknown)).Release() };
    }
}

/// A string allocated by COM, freed with `CoTaskMemFree` on drop.
struct CoTaskMemString(NonNull<u16>);

impl CoTaskMemString {
    fn to_wide_path(&self) -> WidePath {
        let units = unsafe {
            let ptr = self.0.as_ptr();
            slice::from_raw_parts(ptr, wcslen(ptr))
        };
        WidePath::from_units(units.to_vec())
    }
}

impl Drop for CoTaskMemString {
    fn drop(&mut self) {
        unsafe { CoTaskMemFree(self.0.as_ptr() as LPVOID) };
    }
}

/// Returns false if the user cancelled the dialog.
fn show_dialog(file_dialog: &IFileDialog) -> Result<bool, DialogError> {
    // IModalWindow::Show
    match com!(file_dialog.Show(ptr::null_mut()), "IModalWindow::Show") {
        Ok(()) => Ok(true),
        Err(DialogError::HResultFailed { hresult, .. }) if hresult == HRESULT_FROM_WIN32(ERROR_CANCELLED) => {
            debug!("Folder picker was cancelled");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn configure_folder_dialog(file_dialog: &IFileDialog, params: &DialogParams) -> Result<(), DialogError> {
    if !params.is_default() {
        debug!("Applying {:?}", params);
    }

    // IFileDialog::SetDefaultFolder
    if !params.default_folder.is_empty() {
        let default_folder = create_shell_item(params.default_folder)?;
        com!(file_dialog.SetDefaultFolder(default_folder.as_raw()), "IFileDialog::SetDefaultFolder")?;
    }

    // IFileDialog::SetFolder
    if !params.folder.is_empty() {
        let folder = create_shell_item(params.folder)?;
        com!(file_dialog.SetFolder(folder.as_raw()), "IFileDialog::SetFolder")?;
    }

    // IFileDialog::SetOkButtonLabel
    if !params.ok_button_label.is_empty() {
        let ok_button_label = params.ok_button_label.as_null_term_utf16();
        com!(file_dialog.SetOkButtonLabel(ok_button_label.as_ptr()), "IFileDialog::SetOkButtonLabel")?;
    }

    // IFileDialog::SetTitle
    if !params.title.is_empty() {
        let title = params.title.as_null_term_utf16();
        com!(file_dialog.SetTitle(title.as_ptr()), "IFileDialog::SetTitle")?;
    }

    apply_folder_options(
        || {
            // IFileDialog::GetOptions
            let mut existing_options: u32 = 0;
            com!(file_dialog.GetOptions(&mut existing_options), "IFileDialog::GetOptions")?;
            Ok(existing_options)
        },
        // IFileDialog::SetOptions
        |options| com!(file_dialog.SetOptions(options), "IFileDialog::SetOptions"),
        params.options,
    );

    Ok(())
}

/// Adds folder-picking mode to the dialog's options. Failures leave the dialog in its current
/// mode and are only logged. Returns the options that were set.
fn apply_folder_options<G, S>(get_options: G, set_options: S, extra_options: u32) -> Option<u32>
where
    G: FnOnce() -> Result<u32, DialogError>,
    S: FnOnce(u32) -> Result<(), DialogError>,
{
    let options = match get_options() {
        Ok(existing_options) => existing_options | FOS_PICKFOLDERS | extra_options,
        Err(e) => {
            warn!("Showing dialog with its default options: {}", e);
            return None;
        }
    };
    match set_options(options) {
        Ok(()) => Some(options),
        Err(e) => {
            warn!("Showing dialog without folder options: {}", e);
            None
        }
    }
}

fn create_shell_item(path: &str) -> Result<ComPtr<IShellItem>, DialogError> {
    let mut item: *mut IShellItem = ptr::null_mut();
    let path = path.as_null_term_utf16();
    com!(SHCreateItemFromParsingName(path.as_ptr(), ptr::null_mut(), &IShellItem::uuidof(), &mut item as *mut *mut IShellItem as *mut *mut c_void), "SHCreateItemFromParsingName")?;
    ComPtr::from_raw(item, "SHCreateItemFromParsingName")
}

fn get_shell_item_display_name(shell_item: &IShellItem) -> Result<WidePath, DialogError> {
    let mut display_name: LPWSTR = ptr::null_mut();
    // IShellItem::GetDisplayName
    com!(shell_item.GetDisplayName(SIGDN_FILESYSPATH, &mut display_name), "IShellItem::GetDisplayName")?;
    let display_name = NonNull::new(display_name)
        .map(CoTaskMemString)
        .ok_or(DialogError::UnsupportedFilepath)?;
    Ok(display_name.to_wide_path())
}

// This wrapper method makes working with COM methods much simpler by
// returning Err if the HRESULT for a call does not return success.
fn com<F>(mut f: F, method: &str) -> Result<(), DialogError>
where
    F: FnMut() -> HRESULT,
{
    let hresult = f();
    debug!("{} returned {:#010X}", method, hresult);
    if !SUCCEEDED(hresult) {
        Err(DialogError::HResultFailed {
            hresult,
            error_method: method.to_string() })
    } else {
        Ok(())
    }
}

/// The system's active ANSI code page, converted with `WideCharToMultiByte`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiCodePage;

impl AnsiCodePage {
    fn convert(wide: &[u16], buf: &mut [u8]) -> Result<usize, EncodingError> {
        let wide_len = c_int_len(wide.len())?;
        let buf_len = c_int_len(buf.len())?;
        let out = if buf.is_empty() { ptr::null_mut() } else { buf.as_mut_ptr() as LPSTR };
        // No flags: unmappable characters become the code page's default character
        let converted = unsafe {
            WideCharToMultiByte(CP_ACP, 0, wide.as_ptr(), wide_len, out, buf_len, ptr::null(), ptr::null_mut())
        };
        if converted == 0 {
            return Err(EncodingError::Win32 {
                function: "WideCharToMultiByte",
                code: unsafe { GetLastError() },
            });
        }
        Ok(converted as usize)
    }
}

impl CodePage for AnsiCodePage {
    fn measure(&self, wide: &[u16]) -> Result<usize, EncodingError> {
        // A zero-sized output buffer asks for the required length
        AnsiCodePage::convert(wide, &mut [])
    }

    fn encode_into(&self, wide: &[u16], buf: &mut [u8]) -> Result<usize, EncodingError> {
        AnsiCodePage::convert(wide, buf)
    }
}

/// Writes bytes unchanged to the process's standard output handle.
///
/// `std::io::Stdout` rejects bytes that are not UTF-8 when attached to a console, which would
/// cut off paths in the ANSI code page. `WriteFile` passes them through and the console renders
/// them in its output code page.
#[derive(Debug)]
pub struct StdoutHandle {
    handle: HANDLE,
}

impl StdoutHandle {
    pub fn new() -> io::Result<Self> {
        let handle = unsafe { GetStdHandle(STD_OUTPUT_HANDLE) };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        if handle.is_null() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "the process has no standard output"));
        }
        Ok(StdoutHandle::from_handle(handle))
    }

    // The handle is borrowed, it is not closed on drop
    fn from_handle(handle: HANDLE) -> Self {
        StdoutHandle { handle }
    }
}

impl Write for StdoutHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(DWORD::max_value() as usize) as DWORD;
        let mut written: DWORD = 0;
        let ok = unsafe { WriteFile(self.handle, buf.as_ptr() as LPCVOID, len, &mut written, ptr::null_mut()) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(written as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        // WriteFile is unbuffered
        Ok(())
    }
}

fn c_int_len(len: usize) -> Result<c_int, EncodingError> {
    if len > c_int::max_value() as usize {
        return Err(EncodingError::TooLong { len });
    }
    Ok(len as c_int)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::narrow;

    #[test]
    fn ansi_code_page_keeps_ascii_paths() {
        let path = WidePath::from(r"C:\Users\Test\Documents");
        assert_eq!(narrow(&path, &AnsiCodePage).unwrap(), br"C:\Users\Test\Documents");
    }

    #[test]
    fn ansi_code_page_converts_long_paths() {
        let long = format!(r"C:\{}", "segment\\".repeat(40));
        let path = WidePath::from(long.as_str());
        assert_eq!(narrow(&path, &AnsiCodePage).unwrap(), long.as_bytes());
    }

    #[test]
    fn stdout_handle_passes_non_utf8_bytes_through() {
        use winapi::um::{fileapi::ReadFile, handleapi::CloseHandle, namedpipeapi::CreatePipe};

        let mut read: HANDLE = ptr::null_mut();
        let mut write: HANDLE = ptr::null_mut();
        assert_ne!(unsafe { CreatePipe(&mut read, &mut write, ptr::null_mut(), 0) }, 0);

        let bytes: &[u8] = b"C:\\Users\\Zo\xEB\\Caf\xE9";
        let mut out = StdoutHandle::from_handle(write);
        out.write_all(bytes).unwrap();
        out.flush().unwrap();
        unsafe { CloseHandle(write) };

        let mut buf = [0u8; 64];
        let mut read_len: DWORD = 0;
        let ok = unsafe {
            ReadFile(read, buf.as_mut_ptr() as LPVOID, buf.len() as DWORD, &mut read_len, ptr::null_mut())
        };
        unsafe { CloseHandle(read) };
        assert_ne!(ok, 0);
        assert_eq!(&buf[..read_len as usize], bytes);
    }

    fn failed(method: &str) -> DialogError {
        DialogError::HResultFailed {
            error_method: method.to_string(),
            hresult: 0x8000_4005_u32 as i32,
        }
    }

    #[test]
    fn folder_options_are_added_to_existing_ones() {
        let mut applied = None;
        let result = apply_folder_options(
            || Ok(0x40),
            |options| {
                applied = Some(options);
                Ok(())
            },
            0,
        );
        assert_eq!(result, Some(0x40 | FOS_PICKFOLDERS));
        assert_eq!(applied, result);
    }

    #[test]
    fn failing_set_options_still_shows_the_dialog() {
        let result = apply_folder_options(|| Ok(0), |_| Err(failed("IFileDialog::SetOptions")), 0);
        assert_eq!(result, None);
    }

    #[test]
    fn failing_get_options_skips_set_options() {
        let result = apply_folder_options(
            || Err(failed("IFileDialog::GetOptions")),
            |_| panic!("options must not be set"),
            0,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn null_term_utf16_appends_terminator() {
        assert_eq!("ab".as_null_term_utf16(), vec![0x61, 0x62, 0]);
    }
}
