//! Exit-on-error policy for tools whose inputs are mandatory system facts.
//!
//! The library returns errors; a tool that cannot continue without, say,
//! `/proc/cpuinfo` calls [`OrExit::or_exit`] to print an `err(3)`-style
//! message and terminate.

use std::process;

use crate::common::types::PathError;
use crate::logging::LOG_TARGET;

/// Formats `program: message[: os reason]`.
pub fn fatal_message(program: &str, err: &PathError) -> String {
    match err.os_source() {
        Some(source) => format!("{program}: {err}: {source}"),
        None => format!("{program}: {err}"),
    }
}

fn program_name() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg0| {
            std::path::Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Prints the error and exits with status 1.
pub fn exit_with(err: &PathError) -> ! {
    log::error!(target: LOG_TARGET, "{err}");
    eprintln!("{}", fatal_message(&program_name(), err));
    process::exit(1)
}

pub trait OrExit<T> {
    fn or_exit(self) -> T;
}

impl<T> OrExit<T> for Result<T, PathError> {
    fn or_exit(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => exit_with(&err),
        }
    }
}
