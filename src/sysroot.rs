//! The root context and every resolved file operation.
//!
//! A [`Sysroot`] either resolves absolute paths against the real filesystem
//! root or, once a prefix is configured, against a directory fd opened on that
//! prefix. All lookups go through the `*at` family so the two modes share one
//! code path: with no root the fd is `AT_FDCWD` and the path stays absolute;
//! with a root the leading slashes are stripped and the kernel resolves the
//! remainder below the prefix directory.
//!
//! Operations return `Result`s. Which failures end the process is left to the
//! caller, see [`crate::fatal::OrExit`].

use std::ffi::CString;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use log::{debug, trace};

#[cfg(feature = "cpuset")]
use crate::common::cpuset::CpuSet;
use crate::common::types::{PathError, PLACEHOLDER_PATH};
use crate::dir::{self, DirEntry, DirStream};
use crate::format::{self, FormattedPath, PATH_MAX};
use crate::logging::LOG_TARGET;

/// Bytes reserved per CPU when reading a mask or list line.
#[cfg(feature = "cpuset")]
const CPU_LINE_BYTES_PER_CPU: usize = 7;

const READ_FLAGS: i32 = libc::O_RDONLY | libc::O_CLOEXEC;
const WRITE_FLAGS: i32 = libc::O_WRONLY | libc::O_TRUNC | libc::O_CLOEXEC;
const DIR_FLAGS: i32 = libc::O_RDONLY | libc::O_CLOEXEC | libc::O_DIRECTORY;

struct Root {
    fd: OwnedFd,
    prefix: String,
}

/// Resolution context for absolute paths, optionally redirected below a
/// prefix directory.
#[derive(Default)]
pub struct Sysroot {
    root: Option<Root>,
}

impl fmt::Debug for Sysroot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sysroot")
            .field("prefix", &self.prefix())
            .finish()
    }
}

impl Sysroot {
    /// Context resolving against the real root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context resolving below `prefix`. An empty prefix means the real root.
    pub fn with_prefix(prefix: &str) -> Result<Self, PathError> {
        let mut sysroot = Self::new();
        sysroot.set_prefix(prefix)?;
        Ok(sysroot)
    }

    /// Redirects every later operation below `prefix`.
    ///
    /// An empty prefix is accepted and changes nothing. A context can be
    /// configured once; later attempts fail with
    /// [`PathError::PrefixAlreadySet`].
    pub fn set_prefix(&mut self, prefix: &str) -> Result<(), PathError> {
        if prefix.is_empty() {
            return Ok(());
        }
        if self.root.is_some() {
            return Err(PathError::PrefixAlreadySet);
        }
        if prefix.len() >= PATH_MAX - 1 {
            return Err(PathError::TooLong);
        }
        let open_err = |source| PathError::Open {
            path: prefix.to_string(),
            source,
        };
        let c_prefix = format::to_cstring(prefix).map_err(open_err)?;
        let fd = open_raw(libc::AT_FDCWD, &c_prefix, DIR_FLAGS).map_err(open_err)?;
        debug!(target: LOG_TARGET, "sysroot set to {prefix}");
        self.root = Some(Root {
            fd,
            prefix: prefix.to_string(),
        });
        Ok(())
    }

    /// The configured prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.root.as_ref().map(|root| root.prefix.as_str())
    }

    pub fn is_rooted(&self) -> bool {
        self.root.is_some()
    }

    fn dirfd(&self) -> RawFd {
        match &self.root {
            Some(root) => root.fd.as_raw_fd(),
            None => libc::AT_FDCWD,
        }
    }

    /// Expands an absolute path template relative to this context.
    pub fn format(&self, args: fmt::Arguments<'_>) -> Result<FormattedPath, PathError> {
        FormattedPath::new(args, self.is_rooted())
    }

    /// Returns the real, navigable path for a template: the prefix text
    /// followed by the expansion. Meant for handing to tools that cannot use
    /// a directory fd.
    pub fn get(&self, args: fmt::Arguments<'_>) -> Result<String, PathError> {
        format::format_with_prefix(self.prefix().unwrap_or(""), args)
    }

    fn checked_path(&self, path: &str) -> io::Result<CString> {
        assert!(path.starts_with('/'), "absolute path required, got {path:?}");
        format::to_cstring(format::relative_if_rooted(path, self.is_rooted()))
    }

    fn open_formatted(&self, flags: i32, args: fmt::Arguments<'_>) -> Result<(OwnedFd, FormattedPath), PathError> {
        let path = self.format(args).map_err(|err| PathError::Open {
            path: PLACEHOLDER_PATH.to_string(),
            source: err.into(),
        })?;
        trace!(target: LOG_TARGET, "open {} flags={flags:#x}", path.display_path());
        let fd = path
            .to_cstring()
            .and_then(|c_path| open_raw(self.dirfd(), &c_path, flags))
            .map_err(|source| PathError::Open {
                path: path.display_path(),
                source,
            })?;
        Ok((fd, path))
    }

    /// Opens a formatted path read-only as a buffered stream.
    pub fn open_read(&self, args: fmt::Arguments<'_>) -> Result<BufReader<File>, PathError> {
        self.open_reader(args).map(|(reader, _)| reader)
    }

    fn open_reader(&self, args: fmt::Arguments<'_>) -> Result<(BufReader<File>, FormattedPath), PathError> {
        let (fd, path) = self.open_formatted(READ_FLAGS, args)?;
        Ok((BufReader::new(File::from(fd)), path))
    }

    /// Opens an absolute path read-only, yielding `None` on any failure.
    pub fn open_read_path(&self, path: &str) -> Option<BufReader<File>> {
        self.open_read(format_args!("{path}")).ok()
    }

    /// Opens a formatted path with caller-chosen `open(2)` flags.
    pub fn open_fmt(&self, flags: i32, args: fmt::Arguments<'_>) -> Result<OwnedFd, PathError> {
        self.open_formatted(flags, args).map(|(fd, _)| fd)
    }

    /// Reads the first line, at most `max_len` bytes, without its newline.
    pub fn read_str(&self, max_len: usize, args: fmt::Arguments<'_>) -> Result<String, PathError> {
        let (mut reader, path) = self.open_reader(args)?;
        read_line_bounded(&mut reader, max_len).map_err(|source| PathError::Read {
            path: path.display_path(),
            source,
        })
    }

    /// Scans one decimal `i32`, skipping leading whitespace.
    pub fn read_s32(&self, args: fmt::Arguments<'_>) -> Result<i32, PathError> {
        let (mut reader, path) = self.open_reader(args)?;
        scan_number(&mut reader, true, &path)
    }

    /// Scans one decimal `u64`, skipping leading whitespace.
    pub fn read_u64(&self, args: fmt::Arguments<'_>) -> Result<u64, PathError> {
        let (mut reader, path) = self.open_reader(args)?;
        scan_number(&mut reader, false, &path)
    }

    /// Writes `value` to an existing formatted path, truncating it. No
    /// newline is appended; a missing file is an open error.
    pub fn write_str(&self, value: &str, args: fmt::Arguments<'_>) -> Result<usize, PathError> {
        let (fd, path) = self.open_formatted(WRITE_FLAGS, args)?;
        let mut file = File::from(fd);
        file.write_all(value.as_bytes())
            .map_err(|source| PathError::Write {
                path: path.display_path(),
                source,
            })?;
        Ok(value.len())
    }

    /// Whether a formatted path exists. A template that cannot be expanded
    /// does not exist.
    pub fn exist(&self, args: fmt::Arguments<'_>) -> bool {
        let Ok(path) = self.format(args) else {
            return false;
        };
        let Ok(c_path) = path.to_cstring() else {
            return false;
        };
        // SAFETY: c_path is NUL terminated and dirfd is valid or AT_FDCWD.
        unsafe { libc::faccessat(self.dirfd(), c_path.as_ptr(), libc::F_OK, 0) == 0 }
    }

    /// `fstatat(2)` on an absolute path.
    pub fn stat(&self, path: &str) -> io::Result<libc::stat> {
        let c_path = self.checked_path(path)?;
        let mut buf = MaybeUninit::<libc::stat>::uninit();
        // SAFETY: buf is large enough for a stat record and only read after
        // the call reports success.
        let rc = unsafe { libc::fstatat(self.dirfd(), c_path.as_ptr(), buf.as_mut_ptr(), 0) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fstatat returned 0, so it filled the whole record.
        Ok(unsafe { buf.assume_init() })
    }

    /// `openat(2)` on an absolute path.
    pub fn open(&self, path: &str, flags: i32) -> io::Result<OwnedFd> {
        let c_path = self.checked_path(path)?;
        open_raw(self.dirfd(), &c_path, flags)
    }

    /// `readlinkat(2)` on an absolute path.
    pub fn readlink(&self, path: &str) -> io::Result<PathBuf> {
        let c_path = self.checked_path(path)?;
        let mut buf = vec![0u8; PATH_MAX];
        // SAFETY: buf has buf.len() writable bytes.
        let n = unsafe {
            libc::readlinkat(
                self.dirfd(),
                c_path.as_ptr(),
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        buf.truncate(n as usize);
        Ok(PathBuf::from(std::ffi::OsString::from_vec(buf)))
    }

    /// Opens an absolute directory path as a stream.
    pub fn open_dir(&self, path: &str) -> io::Result<DirStream> {
        let fd = self.open(path, DIR_FLAGS)?;
        DirStream::from_fd(fd)
    }

    /// Lists an absolute directory, keeping entries accepted by `select` and
    /// ordering them with `compare` when given.
    pub fn scan_dir<S, C>(&self, path: &str, select: S, compare: Option<C>) -> io::Result<Vec<DirEntry>>
    where
        S: FnMut(&DirEntry) -> bool,
        C: FnMut(&DirEntry, &DirEntry) -> std::cmp::Ordering,
    {
        let stream = self.open_dir(path)?;
        dir::collect_entries(stream, select, compare)
    }

    /// Reads a hex CPU mask line such as `/sys/devices/system/cpu/online`
    /// would hold in mask form.
    #[cfg(feature = "cpuset")]
    pub fn read_cpu_mask(&self, max_cpus: usize, args: fmt::Arguments<'_>) -> Result<CpuSet, PathError> {
        let line = self.read_cpu_line(max_cpus, args)?;
        let mut set = CpuSet::try_new(max_cpus).ok_or(PathError::Alloc)?;
        set.parse_mask(&line)
            .map_err(|_| PathError::CpuMask { line })?;
        Ok(set)
    }

    /// Reads a CPU range list line such as `0-3,8`.
    #[cfg(feature = "cpuset")]
    pub fn read_cpu_list(&self, max_cpus: usize, args: fmt::Arguments<'_>) -> Result<CpuSet, PathError> {
        let line = self.read_cpu_line(max_cpus, args)?;
        let mut set = CpuSet::try_new(max_cpus).ok_or(PathError::Alloc)?;
        set.parse_list(&line)
            .map_err(|_| PathError::CpuList { line })?;
        Ok(set)
    }

    #[cfg(feature = "cpuset")]
    fn read_cpu_line(&self, max_cpus: usize, args: fmt::Arguments<'_>) -> Result<String, PathError> {
        let capacity = max_cpus.saturating_mul(CPU_LINE_BYTES_PER_CPU);
        self.read_str(capacity.saturating_sub(1), args)
    }
}

fn open_raw(dirfd: RawFd, path: &CString, flags: i32) -> io::Result<OwnedFd> {
    // SAFETY: path is NUL terminated; the mode is only read when the caller
    // passes O_CREAT.
    let fd = unsafe { libc::openat(dirfd, path.as_ptr(), flags, 0o666 as libc::c_uint) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd was just returned by openat and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Reads up to `max_len` bytes of the first line. Reading nothing at all is
/// an error; one trailing newline is removed.
fn read_line_bounded<R: BufRead>(reader: &mut R, max_len: usize) -> io::Result<String> {
    let mut buf = Vec::new();
    let n = reader.take(max_len as u64).read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `fscanf("%d")`-style scan: whitespace, optional sign, digits. Text after
/// the number is ignored.
fn scan_number<R, T>(reader: &mut R, signed: bool, path: &FormattedPath) -> Result<T, PathError>
where
    R: Read,
    T: std::str::FromStr,
{
    let read_err = |source| PathError::Read {
        path: path.display_path(),
        source,
    };
    let parse_err = || PathError::Parse {
        path: path.display_path(),
    };

    let mut token = String::new();
    for byte in reader.bytes() {
        let byte = byte.map_err(read_err)?;
        if token.is_empty() && byte.is_ascii_whitespace() {
            continue;
        }
        let accept = byte.is_ascii_digit()
            || (token.is_empty() && (byte == b'+' || (signed && byte == b'-')));
        if !accept {
            break;
        }
        token.push(byte as char);
    }
    if !token.bytes().any(|b| b.is_ascii_digit()) {
        return Err(parse_err());
    }
    token.parse().map_err(|_| parse_err())
}
