use std::{
    env,
    io::{self, Write},
    process::ExitCode,
};

use env_logger::{Builder as LoggerBuilder, Target};
use log::LevelFilter;

use pick_folder::{ActiveCodePage, DialogParams, NativeFolderPicker};

// Stdout carries only the selected path, diagnostics go to stderr and only on request.
fn init_env_logger() {
    let mut logger_builder = LoggerBuilder::new();
    logger_builder.target(Target::Stderr);
    logger_builder.filter(None, LevelFilter::Off);
    if let Ok(rust_log) = env::var("RUST_LOG") {
        logger_builder.parse_filters(&rust_log);
    }
    logger_builder.init();
}

// The path is in the ANSI code page, which the console-aware std stdout would truncate.
#[cfg(windows)]
fn stdout() -> Box<dyn Write> {
    match pick_folder::StdoutHandle::new() {
        Ok(handle) => Box::new(handle),
        Err(err) => {
            log::warn!("Falling back to std stdout: {}", err);
            Box::new(io::stdout())
        }
    }
}

#[cfg(not(windows))]
fn stdout() -> Box<dyn Write> {
    Box::new(io::stdout())
}

fn main() -> ExitCode {
    init_env_logger();

    let mut out = stdout();
    pick_folder::run(&NativeFolderPicker, &ActiveCodePage, &DialogParams::default(), &mut *out).into()
}
