use std::cmp::Ordering;
use std::ffi::{CStr, OsStr, OsString};
use std::io;
use std::os::fd::{IntoRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::ptr::NonNull;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
    Unknown,
}

impl EntryKind {
    fn from_d_type(d_type: u8) -> Self {
        match d_type {
            libc::DT_REG => EntryKind::File,
            libc::DT_DIR => EntryKind::Dir,
            libc::DT_LNK => EntryKind::Symlink,
            libc::DT_BLK => EntryKind::BlockDevice,
            libc::DT_CHR => EntryKind::CharDevice,
            libc::DT_FIFO => EntryKind::Fifo,
            libc::DT_SOCK => EntryKind::Socket,
            _ => EntryKind::Unknown,
        }
    }
}

/// One record read from a directory stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: OsString,
    ino: u64,
    kind: EntryKind,
}

impl DirEntry {
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_dot_or_dotdot(&self) -> bool {
        matches!(self.name.as_bytes(), b"." | b"..")
    }
}

/// An open directory stream, closed on drop.
pub struct DirStream {
    dir: NonNull<libc::DIR>,
}

impl DirStream {
    /// Takes ownership of a directory fd.
    pub fn from_fd(fd: OwnedFd) -> io::Result<Self> {
        let raw = fd.into_raw_fd();
        // SAFETY: raw is an open descriptor we own; on success the stream
        // owns it, on failure we close it ourselves.
        let dir = unsafe { libc::fdopendir(raw) };
        match NonNull::new(dir) {
            Some(dir) => Ok(Self { dir }),
            None => {
                let err = io::Error::last_os_error();
                // SAFETY: fdopendir failed, so raw is still ours to close.
                unsafe { libc::close(raw) };
                Err(err)
            }
        }
    }
}

impl Iterator for DirStream {
    type Item = io::Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        // readdir signals errors only through errno, so clear it first.
        // SAFETY: __errno_location returns this thread's errno slot.
        unsafe { *libc::__errno_location() = 0 };
        // SAFETY: self.dir is a live stream owned by self.
        let ent = unsafe { libc::readdir(self.dir.as_ptr()) };
        if ent.is_null() {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(0) | None => None,
                Some(_) => Some(Err(err)),
            };
        }
        // SAFETY: readdir returned a valid entry that stays alive until the
        // next readdir call on this stream; we copy out of it immediately.
        let ent = unsafe { &*ent };
        let name = unsafe { CStr::from_ptr(ent.d_name.as_ptr()) };
        Some(Ok(DirEntry {
            name: OsStr::from_bytes(name.to_bytes()).to_os_string(),
            ino: ent.d_ino as u64,
            kind: EntryKind::from_d_type(ent.d_type),
        }))
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        // SAFETY: the stream is closed exactly once.
        unsafe {
            libc::closedir(self.dir.as_ptr());
        }
    }
}

/// Reads every entry of `stream`, keeps those accepted by `select`, and sorts
/// them with `compare` when one is given.
pub fn collect_entries<S, C>(
    stream: DirStream,
    mut select: S,
    compare: Option<C>,
) -> io::Result<Vec<DirEntry>>
where
    S: FnMut(&DirEntry) -> bool,
    C: FnMut(&DirEntry, &DirEntry) -> Ordering,
{
    let mut entries = Vec::new();
    for entry in stream {
        let entry = entry?;
        if select(&entry) {
            entries.push(entry);
        }
    }
    if let Some(compare) = compare {
        entries.sort_by(compare);
    }
    Ok(entries)
}

/// Comparator matching `alphasort(3)` for byte names.
pub fn by_name(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.name.as_bytes().cmp(b.name.as_bytes())
}
