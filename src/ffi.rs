use crate::common::types::*;
use crate::logging::{self, SysrootLogCallback};
use crate::Sysroot;

use core::ffi::{c_char, c_void};
use std::os::fd::IntoRawFd;

#[repr(C)]
pub struct SysrootHandle {
    inner: Sysroot,
}

fn status_invalid_handle() -> SysrootStatus {
    SysrootStatus::InvalidPath
}

fn view_to_str<'a>(view: *const SysrootStringView) -> Result<&'a str, SysrootStatus> {
    let view = unsafe { view.as_ref() }.ok_or(SysrootStatus::InvalidPath)?;
    if view.ptr.is_null() {
        return if view.len == 0 { Ok("") } else { Err(SysrootStatus::InvalidPath) };
    }
    let bytes = unsafe { std::slice::from_raw_parts(view.ptr as *const u8, view.len) };
    std::str::from_utf8(bytes).map_err(|_| SysrootStatus::InvalidPath)
}

/// Paths crossing the ABI are already formatted and must be absolute; a
/// relative one is rejected here rather than asserting inside the library.
fn view_to_path<'a>(view: *const SysrootStringView) -> Result<&'a str, SysrootStatus> {
    let path = view_to_str(view)?;
    if !path.starts_with('/') {
        return Err(SysrootStatus::InvalidPath);
    }
    Ok(path)
}

fn write_string_view(value: &str, out: *mut SysrootStringView) -> SysrootStatus {
    let Some(out) = (unsafe { out.as_mut() }) else {
        return SysrootStatus::InvalidPath;
    };
    let bytes = value.as_bytes();
    let ptr = unsafe { libc::malloc(bytes.len().max(1)) } as *mut u8;
    if ptr.is_null() {
        return SysrootStatus::IoError;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
    }
    out.ptr = ptr as *const c_char;
    out.len = bytes.len();
    SysrootStatus::Ok
}

fn with_handle<F>(handle: *mut SysrootHandle, f: F) -> SysrootStatus
where
    F: FnOnce(&Sysroot) -> SysrootStatus,
{
    match unsafe { handle.as_ref() } {
        Some(h) => f(&h.inner),
        None => status_invalid_handle(),
    }
}

macro_rules! try_status {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(status) => return status,
        }
    };
}

#[no_mangle]
pub extern "C" fn sysroot_create(config: *const SysrootConfig, out_handle: *mut *mut SysrootHandle) -> SysrootStatus {
    if out_handle.is_null() {
        return SysrootStatus::InvalidPath;
    }
    let prefix = match unsafe { config.as_ref() } {
        Some(cfg) if cfg.size as usize >= std::mem::size_of::<SysrootConfig>() => {
            try_status!(view_to_str(&cfg.prefix as *const SysrootStringView))
        }
        Some(_) => return SysrootStatus::InvalidPath,
        None => "",
    };
    let inner = match Sysroot::with_prefix(prefix) {
        Ok(value) => value,
        Err(err) => return SysrootStatus::from(&err),
    };
    let handle = Box::new(SysrootHandle { inner });
    unsafe {
        *out_handle = Box::into_raw(handle);
    }
    SysrootStatus::Ok
}

#[no_mangle]
pub extern "C" fn sysroot_destroy(handle: *mut SysrootHandle) {
    if handle.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(handle));
    }
}

#[no_mangle]
pub extern "C" fn sysroot_exist(handle: *mut SysrootHandle, path: *const SysrootStringView) -> bool {
    let Some(h) = (unsafe { handle.as_ref() }) else {
        return false;
    };
    match view_to_path(path) {
        Ok(path) => h.inner.exist(format_args!("{path}")),
        Err(_) => false,
    }
}

#[no_mangle]
pub extern "C" fn sysroot_read_s32(
    handle: *mut SysrootHandle,
    path: *const SysrootStringView,
    out_value: *mut i32,
) -> SysrootStatus {
    with_handle(handle, |sysroot| {
        let path = try_status!(view_to_path(path));
        let Some(out) = (unsafe { out_value.as_mut() }) else {
            return SysrootStatus::InvalidPath;
        };
        match sysroot.read_s32(format_args!("{path}")) {
            Ok(value) => {
                *out = value;
                SysrootStatus::Ok
            }
            Err(err) => SysrootStatus::from(&err),
        }
    })
}

#[no_mangle]
pub extern "C" fn sysroot_read_u64(
    handle: *mut SysrootHandle,
    path: *const SysrootStringView,
    out_value: *mut u64,
) -> SysrootStatus {
    with_handle(handle, |sysroot| {
        let path = try_status!(view_to_path(path));
        let Some(out) = (unsafe { out_value.as_mut() }) else {
            return SysrootStatus::InvalidPath;
        };
        match sysroot.read_u64(format_args!("{path}")) {
            Ok(value) => {
                *out = value;
                SysrootStatus::Ok
            }
            Err(err) => SysrootStatus::from(&err),
        }
    })
}

/// On success `out_line` owns a `malloc` buffer; release it with
/// `sysroot_free_string`.
#[no_mangle]
pub extern "C" fn sysroot_read_str(
    handle: *mut SysrootHandle,
    path: *const SysrootStringView,
    max_len: usize,
    out_line: *mut SysrootStringView,
) -> SysrootStatus {
    with_handle(handle, |sysroot| {
        let path = try_status!(view_to_path(path));
        match sysroot.read_str(max_len, format_args!("{path}")) {
            Ok(line) => write_string_view(&line, out_line),
            Err(err) => SysrootStatus::from(&err),
        }
    })
}

#[no_mangle]
pub extern "C" fn sysroot_write_str(
    handle: *mut SysrootHandle,
    value: *const SysrootStringView,
    path: *const SysrootStringView,
) -> SysrootStatus {
    with_handle(handle, |sysroot| {
        let value = try_status!(view_to_str(value));
        let path = try_status!(view_to_path(path));
        match sysroot.write_str(value, format_args!("{path}")) {
            Ok(_) => SysrootStatus::Ok,
            Err(err) => SysrootStatus::from(&err),
        }
    })
}

/// Returns the prefix-qualified path in a fresh `malloc` buffer.
#[no_mangle]
pub extern "C" fn sysroot_get_path(
    handle: *mut SysrootHandle,
    path: *const SysrootStringView,
    out_path: *mut SysrootStringView,
) -> SysrootStatus {
    with_handle(handle, |sysroot| {
        let path = try_status!(view_to_str(path));
        match sysroot.get(format_args!("{path}")) {
            Ok(full) => write_string_view(&full, out_path),
            Err(err) => SysrootStatus::from(&err),
        }
    })
}

#[no_mangle]
pub extern "C" fn sysroot_open(
    handle: *mut SysrootHandle,
    path: *const SysrootStringView,
    flags: i32,
    out_fd: *mut i32,
) -> SysrootStatus {
    with_handle(handle, |sysroot| {
        let path = try_status!(view_to_path(path));
        let Some(out) = (unsafe { out_fd.as_mut() }) else {
            return SysrootStatus::InvalidPath;
        };
        match sysroot.open(path, flags) {
            Ok(fd) => {
                *out = fd.into_raw_fd();
                SysrootStatus::Ok
            }
            Err(err) => status_from_io(&err),
        }
    })
}

#[no_mangle]
pub extern "C" fn sysroot_free_string(value: SysrootStringView) {
    if value.ptr.is_null() {
        return;
    }
    unsafe {
        libc::free(value.ptr as *mut c_void);
    }
}

#[no_mangle]
pub extern "C" fn sysroot_log_set_stderr(level: SysrootLogLevel) -> SysrootStatus {
    logging::log_set_stderr(level)
}

#[no_mangle]
pub extern "C" fn sysroot_log_set_callback(
    callback: SysrootLogCallback,
    user_data: *mut c_void,
    level: SysrootLogLevel,
) -> SysrootStatus {
    logging::log_set_callback(callback, user_data, level)
}

#[no_mangle]
pub extern "C" fn sysroot_log_set_level(level: SysrootLogLevel) -> SysrootStatus {
    logging::log_set_level(level)
}

#[no_mangle]
pub extern "C" fn sysroot_log_disable() -> SysrootStatus {
    logging::log_disable()
}
