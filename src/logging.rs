use crate::common::types::{SysrootLogLevel, SysrootLogRecord, SysrootStatus, SysrootStringView};

use core::ffi::{c_char, c_void};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

/// Target of every record this crate emits.
pub const LOG_TARGET: &str = "sysroot_path";

pub type SysrootLogCallback = Option<extern "C" fn(record: *const SysrootLogRecord, user_data: *mut c_void)>;

const MODE_DISABLED: u8 = 0;
const MODE_STDERR: u8 = 1;
const MODE_CALLBACK: u8 = 2;

#[derive(Default)]
struct CallbackState {
    callback: SysrootLogCallback,
    user_data: usize,
}

pub struct SysrootLogger {
    mode: AtomicU8,
    level: AtomicU8,
    callback: Mutex<CallbackState>,
}

impl SysrootLogger {
    const fn new() -> Self {
        Self {
            mode: AtomicU8::new(MODE_DISABLED),
            level: AtomicU8::new(SysrootLogLevel::Off as u8),
            callback: Mutex::new(CallbackState {
                callback: None,
                user_data: 0,
            }),
        }
    }

    fn level(&self) -> Option<Level> {
        level_filter_from_u8(self.level.load(Ordering::Relaxed)).to_level()
    }

    fn set_level(&self, level: SysrootLogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
        log::set_max_level(level_filter_from_u8(level as u8));
    }

    fn set_mode(&self, mode: u8) {
        self.mode.store(mode, Ordering::Relaxed);
    }

    fn set_callback(&self, callback: SysrootLogCallback, user_data: *mut c_void) {
        if let Ok(mut state) = self.callback.lock() {
            state.callback = callback;
            state.user_data = user_data as usize;
        }
    }
}

impl Log for SysrootLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.level().is_some_and(|level| metadata.level() <= level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match self.mode.load(Ordering::Relaxed) {
            MODE_STDERR => {
                eprintln!("[sysroot][{}] {}", record.level(), record.args());
            }
            MODE_CALLBACK => {
                let Ok(state) = self.callback.lock() else {
                    return;
                };
                let Some(callback) = state.callback else {
                    return;
                };
                let message = record.args().to_string();
                let ffi_record = SysrootLogRecord {
                    level: sysroot_level_from_log(record.level()),
                    target: string_view_from_str(record.target()),
                    message: string_view_from_str(&message),
                    file: string_view_from_str(record.file().unwrap_or("")),
                    line: record.line().unwrap_or(0),
                };
                callback(&ffi_record as *const SysrootLogRecord, state.user_data as *mut c_void);
            }
            _ => {}
        }
    }

    fn flush(&self) {}
}

static LOGGER: SysrootLogger = SysrootLogger::new();
static LOGGER_STATE: OnceLock<LoggerInstall> = OnceLock::new();

#[derive(Copy, Clone)]
enum LoggerInstall {
    Installed,
    External,
}

fn init_logger() -> LoggerInstall {
    *LOGGER_STATE.get_or_init(|| match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(LevelFilter::Off);
            LoggerInstall::Installed
        }
        Err(_) => LoggerInstall::External,
    })
}

fn level_filter_from_u8(level: u8) -> LevelFilter {
    match level {
        x if x == SysrootLogLevel::Error as u8 => LevelFilter::Error,
        x if x == SysrootLogLevel::Warn as u8 => LevelFilter::Warn,
        x if x == SysrootLogLevel::Info as u8 => LevelFilter::Info,
        x if x == SysrootLogLevel::Debug as u8 => LevelFilter::Debug,
        x if x == SysrootLogLevel::Trace as u8 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

fn sysroot_level_from_log(level: Level) -> SysrootLogLevel {
    match level {
        Level::Error => SysrootLogLevel::Error,
        Level::Warn => SysrootLogLevel::Warn,
        Level::Info => SysrootLogLevel::Info,
        Level::Debug => SysrootLogLevel::Debug,
        Level::Trace => SysrootLogLevel::Trace,
    }
}

fn string_view_from_str(value: &str) -> SysrootStringView {
    SysrootStringView {
        ptr: value.as_ptr() as *const c_char,
        len: value.len(),
    }
}

/// Sends records at or above `level` to stderr.
pub fn log_set_stderr(level: SysrootLogLevel) -> SysrootStatus {
    if matches!(init_logger(), LoggerInstall::External) {
        return SysrootStatus::IoError;
    }
    LOGGER.set_mode(MODE_STDERR);
    LOGGER.set_level(level);
    SysrootStatus::Ok
}

/// Hands records to `callback`; the views in a record are only valid for the
/// duration of the call.
pub fn log_set_callback(callback: SysrootLogCallback, user_data: *mut c_void, level: SysrootLogLevel) -> SysrootStatus {
    if callback.is_none() {
        return log_disable();
    }
    if matches!(init_logger(), LoggerInstall::External) {
        return SysrootStatus::IoError;
    }
    LOGGER.set_callback(callback, user_data);
    LOGGER.set_mode(MODE_CALLBACK);
    LOGGER.set_level(level);
    SysrootStatus::Ok
}

pub fn log_set_level(level: SysrootLogLevel) -> SysrootStatus {
    match init_logger() {
        LoggerInstall::Installed => LOGGER.set_level(level),
        LoggerInstall::External => log::set_max_level(level_filter_from_u8(level as u8)),
    }
    SysrootStatus::Ok
}

pub fn log_disable() -> SysrootStatus {
    match init_logger() {
        LoggerInstall::Installed => {
            LOGGER.set_mode(MODE_DISABLED);
            LOGGER.set_level(SysrootLogLevel::Off);
        }
        LoggerInstall::External => log::set_max_level(LevelFilter::Off),
    }
    SysrootStatus::Ok
}
