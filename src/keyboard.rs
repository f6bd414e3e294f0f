mod device;
pub(crate) mod event_codes;
mod registry;

use crate::error::KeyloggerError;
use crate::key_code::KeyCode;
use crate::source::EventSource;
use crate::KeyloggerResult;
use chrono::{DateTime, Utc};
use futures::{ready, Stream};
use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::unix::AsyncFd;

use device::Record;
use event_codes::{has_keyboard_flags, EV_KEY, EV_KEY_RELEASE};

/// Identifies the device an event came from: the position it was registered at in the
/// [`KeyboardSet`]. Ids stay the same when other devices leave the set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A key event (EV_KEY).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// The device that produced the event.
    pub source: SourceId,
    /// The timestamp of the event.
    pub ts: DateTime<Utc>,
    /// The action that triggered the event.
    pub cause: KeyEventCause,
    /// The key code of the key that triggered the event.
    pub code: KeyCode,
}

/// The reason a `KeyEvent` fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventCause {
    /// The key was pressed (or is being held down and autorepeats).
    Press,
    /// The key was released.
    Release,
}

impl KeyEvent {
    /// Whether the key is down.
    pub fn is_active(&self) -> bool {
        self.cause == KeyEventCause::Press
    }

    /// Convert a raw `input_event` read from device `source`.
    ///
    /// Fails with [`KeyloggerError::UnsupportedEventType`] for anything but EV_KEY.
    pub(crate) fn from_input_event(
        source: SourceId,
        ev: &libc::input_event,
    ) -> KeyloggerResult<Self> {
        // Only EV_KEY is interpreted
        if ev.type_ != EV_KEY {
            return Err(KeyloggerError::UnsupportedEventType(ev.type_));
        }

        let cause = match ev.value {
            EV_KEY_RELEASE => KeyEventCause::Release,
            _ => KeyEventCause::Press,
        };

        let sec = i64::from(ev.time.tv_sec);
        let usec = i64::from(ev.time.tv_usec);
        let ts = u32::try_from(usec)
            .ok()
            .and_then(|us| us.checked_mul(1000))
            .and_then(|nsec| DateTime::from_timestamp(sec, nsec))
            .ok_or(KeyloggerError::InvalidTimestamp(sec, usec))?;

        Ok(Self {
            source,
            ts,
            cause,
            code: KeyCode(ev.code),
        })
    }
}

/// An open keyboard device.
#[derive(Debug)]
pub struct InputDevice {
    /// The name of the device.
    name: String,
    /// The path of the input device (e.g. `/dev/input/event0`).
    path: PathBuf,
    /// The file descriptor of the open input device file.
    async_fd: AsyncFd<File>,
}

impl TryFrom<&Path> for InputDevice {
    type Error = KeyloggerError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let file = File::open(path)?;
        let flags = device::read_event_flags(&file)?;

        if !has_keyboard_flags(flags) {
            return Err(KeyloggerError::NotAKeyboard(path.to_path_buf()));
        }

        let name = device::read_name(&file)?;

        Self::from_file(path, name, file)
    }
}

impl InputDevice {
    /// Open the keyboard at `path`.
    pub fn open(path: impl AsRef<Path>) -> KeyloggerResult<Self> {
        Self::try_from(path.as_ref())
    }

    /// Register an already opened file with the reactor. The file is switched to
    /// non-blocking mode.
    pub(crate) fn from_file(path: &Path, name: String, file: File) -> KeyloggerResult<Self> {
        device::set_nonblocking(&file)?;

        Ok(Self {
            name,
            path: path.to_path_buf(),
            async_fd: AsyncFd::new(file)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until the device is readable, then read one record from it.
    fn poll_record(&self, cx: &mut Context<'_>) -> Poll<DeviceRead> {
        loop {
            let mut guard = match ready!(self.async_fd.poll_read_ready(cx)) {
                Ok(guard) => guard,
                // The reactor is gone.
                Err(e) => return Poll::Ready(DeviceRead::HungUp(Some(e))),
            };

            // Read-closed readiness is never cleared by the reactor.
            let closed = guard.ready().is_read_closed();

            match guard.try_io(|inner| device::read_record(inner.as_raw_fd())) {
                Ok(Ok(Record::Short(0))) => return Poll::Ready(DeviceRead::HungUp(None)),
                Ok(Ok(record)) => return Poll::Ready(DeviceRead::Record(record)),
                Ok(Err(e)) if closed || e.raw_os_error() == Some(libc::ENODEV) => {
                    return Poll::Ready(DeviceRead::HungUp(Some(e)))
                }
                Ok(Err(e)) => {
                    guard.clear_ready();
                    return Poll::Ready(DeviceRead::Failed(e));
                }
                Err(_would_block) if closed => return Poll::Ready(DeviceRead::HungUp(None)),
                Err(_would_block) => continue,
            }
        }
    }
}

/// The outcome of one read from an [`InputDevice`].
enum DeviceRead {
    Record(Record),
    /// The read failed, but the device may recover.
    Failed(io::Error),
    /// The device was unplugged (or its writer went away) and will never be readable again.
    HungUp(Option<io::Error>),
}

/// Find all available keyboard devices.
///
/// Keyboards are looked up in the kernel's device registry; if the registry can't be read
/// or lists no keyboards, every character device in `/dev/input` is probed instead.
pub fn find_keyboards() -> KeyloggerResult<Vec<InputDevice>> {
    let mut paths = match fs::read_to_string(registry::REGISTRY_PATH) {
        Ok(text) => registry::keyboard_paths(&text),
        Err(e) => {
            tracing::debug!("cannot read {}: {e}", registry::REGISTRY_PATH);
            Vec::new()
        }
    };

    if paths.is_empty() {
        tracing::debug!("probing every device in {}", device::INPUT_DIR);
        paths = device::find_char_devices()?;
    }

    Ok(paths
        .into_iter()
        .filter_map(|path| match InputDevice::open(&path) {
            Ok(kb) => {
                tracing::debug!("keyboard found: {} ({})", kb.name, path.display());
                Some(kb)
            }
            Err(e) => {
                tracing::trace!("skipping {}: {e}", path.display());
                None
            }
        })
        .collect())
}

/// Multiplexes a set of keyboards into a single stream of key events.
///
/// Each time the set is woken, one record is read from every readable device, in the order
/// the devices were registered. The key events from that pass are yielded before the set
/// waits again, so events from different devices that arrive together come out in
/// registration order.
///
/// Short reads and read errors are yielded as errors; the failing device stays in the set.
/// A device that hangs up is removed from the set (and closed), and the stream ends once no
/// devices are left.
#[derive(Debug)]
pub struct KeyboardSet {
    devices: Vec<(SourceId, InputDevice)>,
    pending: VecDeque<KeyloggerResult<KeyEvent>>,
}

impl KeyboardSet {
    /// Create a set from already opened devices. The set must not be empty.
    pub fn new(devices: Vec<InputDevice>) -> KeyloggerResult<Self> {
        if devices.is_empty() {
            return Err(KeyloggerError::NoDevicesFound);
        }

        Ok(Self {
            devices: devices
                .into_iter()
                .enumerate()
                .map(|(idx, kb)| (SourceId(idx), kb))
                .collect(),
            pending: VecDeque::new(),
        })
    }

    /// Open every path in `paths`. Devices that fail to open are logged and skipped.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> KeyloggerResult<Self> {
        let devices = paths
            .iter()
            .filter_map(|path| match InputDevice::open(path) {
                Ok(kb) => Some(kb),
                Err(e) => {
                    tracing::warn!("cannot open {}: {e}", path.as_ref().display());
                    None
                }
            })
            .collect();

        Self::new(devices)
    }

    /// Auto-detect the keyboards to watch.
    pub fn detect() -> KeyloggerResult<Self> {
        Self::new(find_keyboards()?)
    }

    /// The devices still in the set, in registration order.
    pub fn devices(&self) -> impl ExactSizeIterator<Item = &InputDevice> + '_ {
        self.devices.iter().map(|(_, kb)| kb)
    }

    /// Read one record from every ready device, dropping the devices that hung up. Returns
    /// `false` if no device was ready.
    fn poll_wake(&mut self, cx: &mut Context<'_>) -> bool {
        let mut progressed = false;
        let mut hung_up = Vec::new();

        for (pos, (id, kb)) in self.devices.iter().enumerate() {
            let read = match kb.poll_record(cx) {
                Poll::Ready(read) => read,
                Poll::Pending => continue,
            };

            progressed = true;

            let item = match read {
                DeviceRead::Record(Record::Full(ev)) => {
                    match KeyEvent::from_input_event(*id, &ev) {
                        Err(KeyloggerError::UnsupportedEventType(_)) => continue,
                        item => item,
                    }
                }
                DeviceRead::Record(Record::Short(read)) => Err(KeyloggerError::ShortRead {
                    device: kb.path.clone(),
                    read,
                    expected: device::RECORD_SIZE,
                }),
                DeviceRead::Failed(source) => Err(KeyloggerError::SourceRead {
                    device: kb.path.clone(),
                    source,
                }),
                DeviceRead::HungUp(err) => {
                    let reason = err.map_or_else(|| "end of file".to_string(), |e| e.to_string());
                    tracing::warn!("dropping {} ({}): {reason}", kb.name, kb.path.display());
                    hung_up.push(pos);
                    continue;
                }
            };

            self.pending.push_back(item);
        }

        for pos in hung_up.into_iter().rev() {
            self.devices.remove(pos);
        }

        progressed
    }
}

impl Stream for KeyboardSet {
    type Item = KeyloggerResult<KeyEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(item));
            }

            if this.devices.is_empty() {
                return Poll::Ready(None);
            }

            if !this.poll_wake(cx) {
                return Poll::Pending;
            }
        }
    }
}

impl EventSource for KeyboardSet {
    fn close(self) {
        for (_, kb) in self.devices {
            tracing::debug!("closing {} ({})", kb.name, kb.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::ffi::CString;
    use std::io::Write;
    use std::os::fd::FromRawFd;
    use std::os::unix::ffi::OsStrExt;
    use std::time::Duration;

    fn pipe() -> (File, File) {
        let mut fds = [0; 2];
        let res = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        assert_eq!(res, 0);

        unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
    }

    fn input_event(type_: u16, code: u16, value: i32) -> libc::input_event {
        libc::input_event {
            time: libc::timeval {
                tv_sec: 1_700_000_000,
                tv_usec: 250_000,
            },
            type_,
            code,
            value,
        }
    }

    fn write_event(w: &mut File, ev: &libc::input_event) {
        let bytes = unsafe {
            std::slice::from_raw_parts(ev as *const _ as *const u8, device::RECORD_SIZE)
        };
        w.write_all(bytes).unwrap();
    }

    fn pipe_device(name: &str) -> (InputDevice, File) {
        let (r, w) = pipe();
        let kb = InputDevice::from_file(Path::new(name), name.to_string(), r).unwrap();
        (kb, w)
    }

    #[test]
    fn converts_key_events() {
        let ev = KeyEvent::from_input_event(SourceId(3), &input_event(EV_KEY, 30, 1)).unwrap();

        assert_eq!(ev.source, SourceId(3));
        assert_eq!(ev.code, KeyCode::KEY_A);
        assert_eq!(ev.cause, KeyEventCause::Press);
        assert_eq!(ev.ts.timestamp(), 1_700_000_000);
        assert_eq!(ev.ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn autorepeat_counts_as_press() {
        let repeat = KeyEvent::from_input_event(SourceId(0), &input_event(EV_KEY, 30, 2)).unwrap();
        let release =
            KeyEvent::from_input_event(SourceId(0), &input_event(EV_KEY, 30, 0)).unwrap();

        assert!(repeat.is_active());
        assert_eq!(release.cause, KeyEventCause::Release);
    }

    #[test]
    fn rejects_other_event_types() {
        assert!(matches!(
            KeyEvent::from_input_event(SourceId(0), &input_event(0x04, 4, 30)),
            Err(KeyloggerError::UnsupportedEventType(0x04))
        ));
    }

    #[test]
    fn rejects_bad_timestamps() {
        let mut ev = input_event(EV_KEY, 30, 1);
        ev.time.tv_usec = -1;

        assert!(matches!(
            KeyEvent::from_input_event(SourceId(0), &ev),
            Err(KeyloggerError::InvalidTimestamp(_, -1))
        ));
    }

    #[test]
    fn keyboard_flags() {
        assert!(has_keyboard_flags(0x120013));
        assert!(!has_keyboard_flags(0x17));
    }

    #[test]
    fn empty_set_is_an_error() {
        assert!(matches!(
            KeyboardSet::new(Vec::new()),
            Err(KeyloggerError::NoDevicesFound)
        ));
    }

    #[tokio::test]
    async fn ready_devices_are_read_in_registration_order() {
        let (a, mut wa) = pipe_device("a");
        let (b, mut wb) = pipe_device("b");
        let mut set = KeyboardSet::new(vec![a, b]).unwrap();

        // B is written first, but both are ready by the time the set wakes.
        write_event(&mut wb, &input_event(EV_KEY, 48, 1));
        write_event(&mut wa, &input_event(EV_KEY, 30, 1));

        let first = set.next().await.unwrap().unwrap();
        let second = set.next().await.unwrap().unwrap();

        assert_eq!((first.source, first.code), (SourceId(0), KeyCode::KEY_A));
        assert_eq!((second.source, second.code), (SourceId(1), KeyCode::KEY_B));
    }

    #[tokio::test]
    async fn non_key_records_are_skipped() {
        let (a, mut wa) = pipe_device("a");
        let mut set = KeyboardSet::new(vec![a]).unwrap();

        write_event(&mut wa, &input_event(0x04, 4, 30));
        write_event(&mut wa, &input_event(0x00, 0, 0));
        write_event(&mut wa, &input_event(EV_KEY, 30, 0));

        let ev = set.next().await.unwrap().unwrap();
        assert_eq!(ev.code, KeyCode::KEY_A);
        assert_eq!(ev.cause, KeyEventCause::Release);
    }

    #[tokio::test]
    async fn short_read_keeps_device_open() {
        let (a, mut wa) = pipe_device("a");
        let mut set = KeyboardSet::new(vec![a]).unwrap();

        wa.write_all(&[0u8; 5]).unwrap();

        match set.next().await {
            Some(Err(KeyloggerError::ShortRead { read, expected, .. })) => {
                assert_eq!(read, 5);
                assert_eq!(expected, device::RECORD_SIZE);
            }
            other => panic!("expected a short read, got {other:?}"),
        }

        write_event(&mut wa, &input_event(EV_KEY, 30, 1));

        let ev = set.next().await.unwrap().unwrap();
        assert_eq!(ev.code, KeyCode::KEY_A);
        assert_eq!(set.devices().len(), 1);
    }

    #[tokio::test]
    async fn eof_after_short_read_ends_the_set() {
        let (a, mut wa) = pipe_device("a");
        let mut set = KeyboardSet::new(vec![a]).unwrap();

        wa.write_all(&[0u8; 5]).unwrap();
        drop(wa);

        assert!(matches!(
            set.next().await,
            Some(Err(KeyloggerError::ShortRead { read: 5, .. }))
        ));
        assert!(set.next().await.is_none());
        assert_eq!(set.devices().len(), 0);
    }

    #[tokio::test]
    async fn hung_up_device_leaves_the_set() {
        let (a, wa) = pipe_device("a");
        let (b, mut wb) = pipe_device("b");
        let mut set = KeyboardSet::new(vec![a, b]).unwrap();

        drop(wa);
        write_event(&mut wb, &input_event(EV_KEY, 48, 1));

        let ev = set.next().await.unwrap().unwrap();
        assert_eq!((ev.source, ev.code), (SourceId(1), KeyCode::KEY_B));
        assert_eq!(set.devices().map(InputDevice::name).collect::<Vec<_>>(), ["b"]);

        // Nothing is yielded for the dropped device.
        assert!(tokio::time::timeout(Duration::from_millis(20), set.next())
            .await
            .is_err());

        write_event(&mut wb, &input_event(EV_KEY, 48, 0));
        let ev = set.next().await.unwrap().unwrap();
        assert_eq!((ev.source, ev.cause), (SourceId(1), KeyEventCause::Release));

        drop(wb);
        assert!(set.next().await.is_none());
    }

    #[tokio::test]
    async fn read_error_keeps_device_open() {
        let dir = tempfile::tempdir().unwrap();

        let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        assert!(fd >= 0);
        let file = unsafe { File::from_raw_fd(fd) };

        let watched = CString::new(dir.path().as_os_str().as_bytes()).unwrap();
        let wd = unsafe { libc::inotify_add_watch(fd, watched.as_ptr(), libc::IN_CREATE) };
        assert!(wd >= 0);

        let kb = InputDevice::from_file(Path::new("inotify"), "inotify".to_string(), file).unwrap();
        let mut set = KeyboardSet::new(vec![kb]).unwrap();

        // An inotify event carrying a file name is larger than one record: the read fails
        // with EINVAL.
        File::create(dir.path().join("created")).unwrap();

        match set.next().await {
            Some(Err(KeyloggerError::SourceRead { device, source })) => {
                assert_eq!(device, Path::new("inotify"));
                assert_eq!(source.raw_os_error(), Some(libc::EINVAL));
            }
            other => panic!("expected a read error, got {other:?}"),
        }

        assert_eq!(set.devices().len(), 1);
        assert!(tokio::time::timeout(Duration::from_millis(20), set.next())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn capture_ends_when_every_device_hangs_up() {
        use crate::interpreter::Session;
        use crate::keylogger::Keylogger;
        use crate::shutdown::ShutdownSignal;
        use crate::sink::MemorySink;

        let (a, mut wa) = pipe_device("a");
        let (b, mut wb) = pipe_device("b");
        let set = KeyboardSet::new(vec![a, b]).unwrap();

        write_event(&mut wa, &input_event(EV_KEY, 35, 1));
        write_event(&mut wa, &input_event(EV_KEY, 35, 0));
        write_event(&mut wb, &input_event(EV_KEY, 23, 1));
        write_event(&mut wb, &input_event(EV_KEY, 23, 0));
        drop(wb);
        write_event(&mut wa, &input_event(EV_KEY, 28, 1));
        drop(wa);

        let sink = MemorySink::new();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            Keylogger::new(set, sink.clone(), Session::default(), ShutdownSignal::never())
                .capture(),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(KeyloggerError::SourcesExhausted)));
        assert_eq!(sink.lines(), ["hi"]);
    }
}
