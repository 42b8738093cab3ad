use core::ffi::c_char;
use std::io;

/// Placeholder shown in diagnostics when no path could be formatted.
pub const PLACEHOLDER_PATH: &str = "path";

/// Errors produced by sysroot-resolved file access.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// The formatted path does not fit into `PATH_MAX`.
    #[error("path too long")]
    TooLong,

    /// A `Display` implementation inside the template reported an error.
    #[error("cannot format path")]
    Format,

    #[error("cannot open {path}")]
    Open {
        /// Diagnostic form of the path.
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The file content did not match the expected numeric grammar.
    #[error("parse error: {path}")]
    Parse { path: String },

    #[error("failed to parse CPU mask {line}")]
    CpuMask { line: String },

    #[error("failed to parse CPU list {line}")]
    CpuList { line: String },

    #[error("failed to allocate cpu set")]
    Alloc,

    /// `set_prefix` was called on a context that already has a root.
    #[error("sysroot prefix is already set")]
    PrefixAlreadySet,
}

impl PathError {
    /// OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            PathError::TooLong => Some(libc::ENAMETOOLONG),
            PathError::Format => Some(libc::EINVAL),
            PathError::PrefixAlreadySet => Some(libc::EBUSY),
            PathError::Alloc => Some(libc::ENOMEM),
            PathError::Open { source, .. }
            | PathError::Read { source, .. }
            | PathError::Write { source, .. } => source.raw_os_error(),
            PathError::Parse { .. } | PathError::CpuMask { .. } | PathError::CpuList { .. } => None,
        }
    }

    /// The underlying OS error, for messages in the `err(3)` style.
    pub fn os_source(&self) -> Option<&io::Error> {
        match self {
            PathError::Open { source, .. }
            | PathError::Read { source, .. }
            | PathError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<PathError> for io::Error {
    fn from(err: PathError) -> Self {
        match err.raw_os_error() {
            Some(code) => io::Error::from_raw_os_error(code),
            None => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SysrootStatus {
    Ok = 0,
    NotFound = 1,
    PermissionDenied = 2,
    PathTooLong = 3,
    InvalidPath = 4,
    ParseError = 5,
    AlreadyConfigured = 6,
    NotADirectory = 7,
    IoError = 8,
}

pub(crate) fn status_from_io(err: &io::Error) -> SysrootStatus {
    use io::ErrorKind;
    if err.raw_os_error() == Some(libc::ENAMETOOLONG) {
        return SysrootStatus::PathTooLong;
    }
    if err.raw_os_error() == Some(libc::ENOTDIR) {
        return SysrootStatus::NotADirectory;
    }
    match err.kind() {
        ErrorKind::NotFound => SysrootStatus::NotFound,
        ErrorKind::PermissionDenied => SysrootStatus::PermissionDenied,
        ErrorKind::InvalidInput => SysrootStatus::InvalidPath,
        _ => SysrootStatus::IoError,
    }
}

impl From<&PathError> for SysrootStatus {
    fn from(err: &PathError) -> Self {
        match err {
            PathError::TooLong => SysrootStatus::PathTooLong,
            PathError::Format => SysrootStatus::InvalidPath,
            PathError::Open { source, .. }
            | PathError::Read { source, .. }
            | PathError::Write { source, .. } => status_from_io(source),
            PathError::Parse { .. } | PathError::CpuMask { .. } | PathError::CpuList { .. } => {
                SysrootStatus::ParseError
            }
            PathError::Alloc => SysrootStatus::IoError,
            PathError::PrefixAlreadySet => SysrootStatus::AlreadyConfigured,
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SysrootLogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct SysrootStringView {
    pub ptr: *const c_char,
    pub len: usize,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct SysrootLogRecord {
    pub level: SysrootLogLevel,
    pub target: SysrootStringView,
    pub message: SysrootStringView,
    pub file: SysrootStringView,
    pub line: u32,
}

/// Creation parameters for `sysroot_create`. An empty `prefix` view means the
/// real filesystem root.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct SysrootConfig {
    pub size: u32,
    pub flags: u32,
    pub prefix: SysrootStringView,
    pub reserved: [u64; 4],
}
