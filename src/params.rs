/// The parameters used when displaying the folder picker. All fields are optional and have
/// appropriate default values.
///
/// Folder-picking mode is always applied on top of `options`, so only directories can be
/// selected no matter which flags are set here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogParams<'a> {
    /// The text displayed in the title bar of the dialog box
    pub title: &'a str,
    /// The text label to replace the default "Select Folder" text on the "OK" button
    pub ok_button_label: &'a str,
    /// The path to the folder that the dialog will navigate to on first usage. Subsequent
    /// usages of the dialog will remember the last selected folder.
    pub default_folder: &'a str,
    /// The path to the folder that is always selected when the dialog is opened, regardless of
    /// previous user action. Prefer `default_folder` for general use.
    pub folder: &'a str,
    /// Additional `FOS_*` flags OR-ed onto the dialog's existing options. Invalid combinations
    /// make the dialog fail to open.
    pub options: u32,
}

impl<'a> DialogParams<'a> {
    /// Returns true when nothing beyond the platform defaults has been requested.
    pub fn is_default(&self) -> bool {
        *self == DialogParams::default()
    }
}
