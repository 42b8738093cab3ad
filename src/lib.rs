//! Redirectable access to kernel pseudo-files.
//!
//! Tools that read `/proc` and `/sys` go through a [`Sysroot`]. Without a
//! prefix it reads the live system; with one, every absolute path resolves
//! below a captured directory tree instead, so the same call sites can run
//! against a dump in tests.
//!
//! ```no_run
//! use sysroot_path::{OrExit, Sysroot};
//!
//! let root = Sysroot::with_prefix("/tmp/dump").or_exit();
//! let cpu = 2;
//! let online = root.read_s32(format_args!("/sys/devices/system/cpu/cpu{cpu}/online")).or_exit();
//! # let _ = online;
//! ```

mod common;
mod dir;
mod ffi;
mod format;
mod sysroot;

pub mod fatal;
pub mod logging;

#[cfg(not(target_os = "linux"))]
compile_error!("sysroot-path only supports Linux targets.");

#[cfg(feature = "cpuset")]
pub use crate::common::cpuset::{CpuSet, ParseCpuSetError};
pub use crate::common::types::*;
pub use crate::dir::{by_name, DirEntry, DirStream, EntryKind};
pub use crate::fatal::OrExit;
pub use crate::ffi::*;
pub use crate::format::{format_into, FormattedPath, PATH_MAX, SYSROOT_TAG};
pub use crate::sysroot::Sysroot;
