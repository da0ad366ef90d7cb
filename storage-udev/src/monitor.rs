// SPDX-License-Identifier: GPL-3.0-only

//! Kernel uevent monitoring over `NETLINK_KOBJECT_UEVENT`.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::error::{Result, UdevError};
use crate::uevent::{DeviceEvent, parse_kernel_message};

// Multicast group the kernel itself broadcasts on; udevd re-broadcasts on 2.
const KERNEL_GROUP: u32 = 1;
const MESSAGE_BUFFER_BYTES: usize = 8192;
const RECEIVE_BUFFER_BYTES: libc::c_int = 4 * 1024 * 1024;
const EVENT_QUEUE_DEPTH: usize = 256;

/// Bound kernel uevent socket.
///
/// The socket starts queueing messages as soon as it is bound, so opening it
/// before enumerating devices means nothing is lost in between.
#[derive(Debug)]
pub(crate) struct UeventSocket {
    fd: OwnedFd,
}

impl UeventSocket {
    pub(crate) fn open() -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_DGRAM | libc::SOCK_CLOEXEC,
                libc::NETLINK_KOBJECT_UEVENT,
            )
        };
        if fd < 0 {
            return Err(UdevError::Transport(io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        addr.nl_groups = KERNEL_GROUP;

        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(UdevError::Transport(io::Error::last_os_error()));
        }

        let ret = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVBUF,
                &RECEIVE_BUFFER_BYTES as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            warn!(
                "Could not enlarge uevent receive buffer: {}",
                io::Error::last_os_error()
            );
        }

        Ok(Self { fd })
    }

    /// Blocks until one datagram arrives. Returns its length and the
    /// sender's netlink port id (0 for the kernel).
    fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, u32)> {
        loop {
            let mut sender: libc::sockaddr_nl = unsafe { mem::zeroed() };
            let mut sender_len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;

            let len = unsafe {
                libc::recvfrom(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    0,
                    &mut sender as *mut libc::sockaddr_nl as *mut libc::sockaddr,
                    &mut sender_len,
                )
            };

            if len < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            return Ok((len as usize, sender.nl_pid));
        }
    }
}

/// Stream of hotplug events.
///
/// Backed by a bounded channel; the producer is either the uevent reader
/// thread or, in tests, whoever holds the sender from [`DeviceEventStream::channel`].
pub struct DeviceEventStream {
    receiver: mpsc::Receiver<DeviceEvent>,
}

impl DeviceEventStream {
    pub fn new(receiver: mpsc::Receiver<DeviceEvent>) -> Self {
        Self { receiver }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<DeviceEvent>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(receiver))
    }
}

impl Stream for DeviceEventStream {
    type Item = DeviceEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Moves `socket` onto a dedicated reader thread and returns the stream it
/// feeds. Events outside `subsystems` are filtered out before they are queued.
pub(crate) fn spawn_reader(
    socket: UeventSocket,
    sysfs_root: PathBuf,
    subsystems: Vec<String>,
) -> Result<DeviceEventStream> {
    let (sender, stream) = DeviceEventStream::channel(EVENT_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("uevent-monitor".to_string())
        .spawn(move || read_loop(socket, sysfs_root, subsystems, sender))
        .map_err(UdevError::Transport)?;

    Ok(stream)
}

fn read_loop(
    socket: UeventSocket,
    sysfs_root: PathBuf,
    subsystems: Vec<String>,
    sender: mpsc::Sender<DeviceEvent>,
) {
    let mut buf = vec![0u8; MESSAGE_BUFFER_BYTES];

    loop {
        let (len, sender_pid) = match socket.recv(&mut buf) {
            Ok(received) => received,
            Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                warn!("Kernel uevent queue overflowed, some device events were lost");
                continue;
            }
            Err(e) => {
                error!("Uevent socket failed, stopping monitor: {}", e);
                break;
            }
        };

        let Some(event) = accept(&sysfs_root, sender_pid, &buf[..len], &subsystems) else {
            continue;
        };

        trace!(
            "uevent {} {}",
            event.action,
            event.device.sysfs_path().unwrap_or("<none>")
        );

        if sender.blocking_send(event).is_err() {
            debug!("Device event receiver dropped, stopping monitor");
            break;
        }
    }
}

/// Decides whether one datagram becomes a [`DeviceEvent`]: it must come from
/// the kernel, parse, and belong to one of `subsystems`.
fn accept(
    sysfs_root: &Path,
    sender_pid: u32,
    buf: &[u8],
    subsystems: &[String],
) -> Option<DeviceEvent> {
    if sender_pid != 0 {
        debug!("Ignoring uevent from non-kernel sender {}", sender_pid);
        return None;
    }

    let event = match parse_kernel_message(sysfs_root, buf) {
        Ok(event) => event,
        Err(e) => {
            warn!("Dropping uevent: {}", e);
            return None;
        }
    };

    let wanted = event
        .device
        .subsystem()
        .is_some_and(|s| subsystems.iter().any(|wanted| wanted == s));
    wanted.then_some(event)
}
