use std::cmp::Ordering;
use std::fs;
use std::io::Read;
use std::os::unix::fs::symlink;
use std::path::Path;

use sysroot_path::{by_name, DirEntry, EntryKind, PathError, Sysroot};
use tempfile::TempDir;

fn dump_with(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    for (rel, contents) in files {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write dump file");
    }
    dir
}

fn rooted(dir: &TempDir) -> Sysroot {
    Sysroot::with_prefix(dir.path().to_str().expect("utf-8 temp path")).expect("set prefix")
}

#[test]
fn read_s32_below_prefix() {
    let dump = dump_with(&[("proc/cpuinfo", "7\n")]);
    let root = rooted(&dump);
    assert_eq!(root.read_s32(format_args!("/proc/cpuinfo")).unwrap(), 7);
}

#[test]
fn formatted_templates_resolve_below_prefix() {
    let dump = dump_with(&[("sys/devices/system/cpu/cpu3/online", "1\n")]);
    let root = rooted(&dump);
    let cpu = 3;
    let online = root
        .read_u64(format_args!("/sys/devices/system/cpu/cpu{cpu}/online"))
        .unwrap();
    assert_eq!(online, 1);
}

#[test]
fn redirection_matches_direct_access() {
    let dump = dump_with(&[("a/b", "payload line\nsecond\n")]);
    let root = rooted(&dump);

    let mut via_root = String::new();
    root.open_read(format_args!("/a/b"))
        .unwrap()
        .read_to_string(&mut via_root)
        .unwrap();
    let direct = fs::read_to_string(dump.path().join("a/b")).unwrap();
    assert_eq!(via_root, direct);

    let via_stat = root.stat("/a/b").unwrap();
    let direct_meta = fs::metadata(dump.path().join("a/b")).unwrap();
    assert_eq!(via_stat.st_size as u64, direct_meta.len());
}

#[test]
fn exist_is_confined_to_root() {
    let outside = dump_with(&[("only-outside", "x")]);
    let outside_file = outside.path().join("only-outside");
    let outside_str = outside_file.to_str().unwrap();

    let dump = dump_with(&[("proc/present", "1")]);
    let root = rooted(&dump);

    assert!(Sysroot::new().exist(format_args!("{outside_str}")));
    assert!(!root.exist(format_args!("{outside_str}")));
    assert!(root.exist(format_args!("/proc/present")));
    assert!(!root.exist(format_args!("/proc/absent")));
}

#[test]
fn empty_prefix_leaves_root_disabled() {
    let mut root = Sysroot::new();
    root.set_prefix("").unwrap();
    assert!(!root.is_rooted());
    assert_eq!(root.prefix(), None);

    let root = Sysroot::with_prefix("").unwrap();
    assert!(!root.is_rooted());
}

#[test]
fn prefix_is_configured_once() {
    let dump = dump_with(&[]);
    let mut root = rooted(&dump);
    let err = root.set_prefix("/").unwrap_err();
    assert!(matches!(err, PathError::PrefixAlreadySet));
    assert_eq!(root.prefix(), dump.path().to_str());
}

#[test]
fn prefix_must_be_an_existing_directory() {
    let dump = dump_with(&[("file", "x")]);

    let missing = dump.path().join("missing");
    let err = Sysroot::with_prefix(missing.to_str().unwrap()).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));

    let file = dump.path().join("file");
    let err = Sysroot::with_prefix(file.to_str().unwrap()).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));
}

#[test]
fn failed_set_prefix_leaves_context_unrooted() {
    let dump = dump_with(&[("file", "x"), ("proc/value", "3\n")]);
    let mut root = Sysroot::new();

    let missing = dump.path().join("missing");
    assert!(root.set_prefix(missing.to_str().unwrap()).is_err());
    assert!(!root.is_rooted());
    assert_eq!(root.prefix(), None);

    let file = dump.path().join("file");
    assert!(root.set_prefix(file.to_str().unwrap()).is_err());
    assert!(!root.is_rooted());
    assert_eq!(root.prefix(), None);

    let prefix = dump.path().to_str().unwrap();
    root.set_prefix(prefix).unwrap();
    assert!(root.is_rooted());
    assert_eq!(root.prefix(), Some(prefix));
    assert_eq!(root.read_s32(format_args!("/proc/value")).unwrap(), 3);
}

#[test]
fn overlong_prefix_is_rejected() {
    let prefix = format!("/{}", "p".repeat(sysroot_path::PATH_MAX));
    let err = Sysroot::with_prefix(&prefix).unwrap_err();
    assert!(matches!(err, PathError::TooLong));
}

#[test]
fn write_then_read_round_trip() {
    let dump = dump_with(&[("x", "stale contents"), ("real", "")]);
    let root = rooted(&dump);
    assert_eq!(root.write_str("hello", format_args!("/x")).unwrap(), 5);
    assert_eq!(fs::read(dump.path().join("x")).unwrap(), b"hello");
    assert_eq!(root.read_str(64, format_args!("/x")).unwrap(), "hello");

    let real = dump.path().join("real");
    let real = real.to_str().unwrap();
    let plain = Sysroot::new();
    plain.write_str("hello\n", format_args!("{real}")).unwrap();
    assert_eq!(plain.read_str(64, format_args!("{real}")).unwrap(), "hello");
}

#[test]
fn write_does_not_create_missing_files() {
    let dump = dump_with(&[("sys/kernel/other", "0\n")]);
    let root = rooted(&dump);
    let err = root
        .write_str("1", format_args!("/sys/kernel/knob"))
        .unwrap_err();
    assert!(matches!(err, PathError::Open { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    assert!(!root.exist(format_args!("/sys/kernel/knob")));
    assert!(!dump.path().join("sys/kernel/knob").exists());
}

#[test]
fn write_failure_is_returned() {
    let dump = dump_with(&[]);
    let root = rooted(&dump);
    let err = root
        .write_str("1", format_args!("/no/such/dir/file"))
        .unwrap_err();
    assert!(matches!(err, PathError::Open { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
}

#[test]
fn read_errors_carry_redacted_paths() {
    let dump = dump_with(&[("empty", ""), ("garbage", "abc\n")]);
    let root = rooted(&dump);

    let err = root.open_read(format_args!("/missing")).unwrap_err();
    assert_eq!(err.to_string(), "cannot open [sysroot]/missing");
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));

    let err = root.read_str(16, format_args!("/empty")).unwrap_err();
    assert_eq!(err.to_string(), "cannot read [sysroot]/empty");

    let err = root.read_u64(format_args!("/garbage")).unwrap_err();
    assert_eq!(err.to_string(), "parse error: [sysroot]/garbage");

    assert!(root.open_read_path("/missing").is_none());
    assert!(root.open_read_path("/garbage").is_some());
}

#[test]
fn scalar_io_failure_differs_from_parse_failure() {
    let dump = dump_with(&[("proc/dir/entry", "1\n")]);
    let root = rooted(&dump);

    let err = root.read_s32(format_args!("/proc/dir")).unwrap_err();
    assert!(matches!(err, PathError::Read { .. }));
    assert_eq!(err.to_string(), "cannot read [sysroot]/proc/dir");
    assert_eq!(err.raw_os_error(), Some(libc::EISDIR));

    let err = root.read_u64(format_args!("/proc/dir")).unwrap_err();
    assert_eq!(err.to_string(), "cannot read [sysroot]/proc/dir");
    assert_eq!(err.raw_os_error(), Some(libc::EISDIR));
}

#[test]
fn unrooted_errors_show_the_real_path() {
    let dump = dump_with(&[]);
    let missing = dump.path().join("missing");
    let missing = missing.to_str().unwrap();
    let err = Sysroot::new().open_read(format_args!("{missing}")).unwrap_err();
    assert_eq!(err.to_string(), format!("cannot open {missing}"));
}

#[test]
fn overlong_template_uses_placeholder() {
    let root = Sysroot::new();
    let long = "d".repeat(sysroot_path::PATH_MAX);
    assert!(!root.exist(format_args!("/{long}")));

    let err = root.open_read(format_args!("/{long}")).unwrap_err();
    assert_eq!(err.to_string(), "cannot open path");
    assert_eq!(err.raw_os_error(), Some(libc::ENAMETOOLONG));
}

#[test]
fn get_returns_independent_prefixed_paths() {
    let dump = dump_with(&[]);
    let root = rooted(&dump);
    let prefix = dump.path().to_str().unwrap();

    let mut first = root.get(format_args!("/proc/{}", 1)).unwrap();
    let second = root.get(format_args!("/proc/{}", 2)).unwrap();
    assert_eq!(first, format!("{prefix}/proc/1"));
    first.push_str("/mutated");
    assert_eq!(second, format!("{prefix}/proc/2"));

    let plain = Sysroot::new().get(format_args!("/proc/{}", 1)).unwrap();
    assert_eq!(plain, "/proc/1");
}

#[test]
fn readlink_resolves_within_root() {
    let dump = dump_with(&[("sys/target", "")]);
    symlink("../sys/target", dump.path().join("sys/link")).unwrap();
    let root = rooted(&dump);
    assert_eq!(root.readlink("/sys/link").unwrap(), Path::new("../sys/target"));
    let err = root.readlink("/sys/target").unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
}

#[test]
fn raw_open_uses_caller_flags() {
    let dump = dump_with(&[("proc/stat", "cpu 1 2 3\n")]);
    let root = rooted(&dump);
    assert!(root.open("/proc/stat", libc::O_RDONLY | libc::O_CLOEXEC).is_ok());
    let err = root
        .open("/proc/stat", libc::O_RDONLY | libc::O_DIRECTORY)
        .unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));

    let fd = root
        .open_fmt(libc::O_RDONLY | libc::O_CLOEXEC, format_args!("/proc/{}", "stat"))
        .unwrap();
    let mut contents = String::new();
    fs::File::from(fd).read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "cpu 1 2 3\n");
}

#[test]
fn scan_dir_filters_and_sorts() {
    let dump = dump_with(&[
        ("sys/bus/cpu/cpu2", ""),
        ("sys/bus/cpu/cpu0", ""),
        ("sys/bus/cpu/cpu1", ""),
        ("sys/bus/cpu/uevent", ""),
    ]);
    fs::create_dir(dump.path().join("sys/bus/cpu/power")).unwrap();
    let root = rooted(&dump);

    let entries = root
        .scan_dir(
            "/sys/bus/cpu",
            |e| e.name().to_string_lossy().starts_with("cpu"),
            Some(by_name),
        )
        .unwrap();
    let names: Vec<_> = entries
        .iter()
        .map(|e| e.name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["cpu0", "cpu1", "cpu2"]);

    let all = root
        .scan_dir("/sys/bus/cpu", |_| true, None::<fn(&DirEntry, &DirEntry) -> Ordering>)
        .unwrap();
    assert_eq!(all.iter().filter(|e| e.is_dot_or_dotdot()).count(), 2);
    let power = all
        .iter()
        .find(|e| e.name() == "power")
        .expect("power entry");
    assert!(matches!(power.kind(), EntryKind::Dir | EntryKind::Unknown));

    let err = root
        .scan_dir("/sys/bus/cpu/uevent", |_| true, Some(by_name))
        .unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));
}

#[test]
fn root_slash_lists_the_dump() {
    let dump = dump_with(&[("proc/version", "Linux\n")]);
    let root = rooted(&dump);
    let names: Vec<_> = root
        .open_dir("/")
        .unwrap()
        .map(|e| e.unwrap().name().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&"proc".to_string()));
}

#[test]
#[should_panic(expected = "absolute path required")]
fn relative_paths_are_programming_errors() {
    let _ = Sysroot::new().stat("proc/cpuinfo");
}

#[test]
fn independent_roots_coexist() {
    let a = dump_with(&[("proc/value", "1\n")]);
    let b = dump_with(&[("proc/value", "2\n")]);
    let root_a = rooted(&a);
    let root_b = rooted(&b);
    assert_eq!(root_a.read_s32(format_args!("/proc/value")).unwrap(), 1);
    assert_eq!(root_b.read_s32(format_args!("/proc/value")).unwrap(), 2);
}
