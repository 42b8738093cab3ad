//! Bounded expansion of path templates.
//!
//! Templates are `format_args!` values, so placeholders are checked at compile
//! time. Every expansion is capped at [`PATH_MAX`] including the terminating
//! NUL the kernel needs, and no byte is written past the destination.

use std::ffi::CString;
use std::fmt::{self, Write};
use std::io;

use crate::common::types::PathError;

/// Capacity of a path buffer, terminator included.
pub const PATH_MAX: usize = libc::PATH_MAX as usize;

/// Marker that replaces the real prefix in diagnostics.
pub const SYSROOT_TAG: &str = "[sysroot]";

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    overflow: bool,
}

impl Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            self.overflow = true;
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Expands `args` into `buf` and returns the number of bytes written.
///
/// Fails with [`PathError::TooLong`] when the expansion does not fit; `buf`
/// is never written beyond its length.
pub fn format_into(buf: &mut [u8], args: fmt::Arguments<'_>) -> Result<usize, PathError> {
    let mut writer = SliceWriter {
        buf,
        len: 0,
        overflow: false,
    };
    match writer.write_fmt(args) {
        Ok(()) => Ok(writer.len),
        Err(_) if writer.overflow => Err(PathError::TooLong),
        Err(_) => Err(PathError::Format),
    }
}

/// Expands `prefix` followed by `args` into an owned string no longer than
/// `PATH_MAX - 1` bytes.
pub fn format_with_prefix(prefix: &str, args: fmt::Arguments<'_>) -> Result<String, PathError> {
    let limit = PATH_MAX - 1;
    if prefix.len() > limit {
        return Err(PathError::TooLong);
    }
    let mut buf = vec![0u8; limit];
    buf[..prefix.len()].copy_from_slice(prefix.as_bytes());
    let written = format_into(&mut buf[prefix.len()..], args)?;
    buf.truncate(prefix.len() + written);
    String::from_utf8(buf).map_err(|_| PathError::Format)
}

/// An expanded absolute path, remembered together with whether it resolves
/// below a sysroot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPath {
    path: String,
    rooted: bool,
}

impl FormattedPath {
    /// Expands `args`; the result must be absolute.
    pub fn new(args: fmt::Arguments<'_>, rooted: bool) -> Result<Self, PathError> {
        let path = format_with_prefix("", args)?;
        Ok(Self::from_absolute(path, rooted))
    }

    pub(crate) fn from_absolute(path: String, rooted: bool) -> Self {
        assert!(path.starts_with('/'), "absolute path required, got {path:?}");
        Self { path, rooted }
    }

    /// The expansion exactly as the template produced it.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The string handed to the `*at` call: relative when rooted.
    pub fn resolve_str(&self) -> &str {
        relative_if_rooted(&self.path, self.rooted)
    }

    /// Path for error messages. The real prefix is never shown.
    pub fn display_path(&self) -> String {
        if self.rooted {
            format!("{SYSROOT_TAG}{}", self.path)
        } else {
            self.path.clone()
        }
    }

    pub(crate) fn to_cstring(&self) -> io::Result<CString> {
        to_cstring(self.resolve_str())
    }
}

/// Strips leading slashes so that `*at` calls honour the directory fd. An
/// empty remainder addresses the sysroot itself.
pub(crate) fn relative_if_rooted(path: &str, rooted: bool) -> &str {
    if !rooted {
        return path;
    }
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        "."
    } else {
        trimmed
    }
}

pub(crate) fn to_cstring(path: &str) -> io::Result<CString> {
    CString::new(path).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}
