// SPDX-License-Identifier: MIT

//! Named signals on Linux.
//!
//! A named signal is a FIFO called `<name>` inside the signal directory.  The
//! injector signals by opening it for writing and writing a byte (or just
//! closing it again).  A regular file with that name counts as a signal that
//! is already set.

use std::{
    fs::{File, OpenOptions},
    io::Read,
    os::{
        fd::AsFd,
        unix::fs::{FileTypeExt, OpenOptionsExt},
    },
    path::PathBuf,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    libc,
    poll::{PollFd, PollFlags, PollTimeout, poll},
};

use super::signal::{ReadySignal, SignalSource};
use crate::{classify::ErrorCode, error::SandboxError};

pub struct FifoSignalSource {
    dir: PathBuf,
}

impl FifoSignalSource {
    pub fn new(dir: PathBuf) -> Self {
        FifoSignalSource { dir }
    }
}

impl SignalSource for FifoSignalSource {
    fn open(&self, name: &str) -> Result<Box<dyn ReadySignal>, SandboxError> {
        if name.contains('/') {
            return Err(SandboxError::Classified(ErrorCode::NotFound));
        }
        let path = self.dir.join(name);
        let meta = std::fs::metadata(&path)?;
        if meta.file_type().is_fifo() {
            // Non-blocking, so that the open itself does not wait for a writer.
            let file = OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(&path)?;
            log::debug!("opened signal fifo {}", path.display());
            Ok(Box::new(FifoSignal { file, path }))
        } else if meta.is_file() {
            log::debug!("signal {} is a plain file; treating it as set", path.display());
            Ok(Box::new(SetSignal))
        } else {
            Err(SandboxError::Classified(ErrorCode::InvalidHandle))
        }
    }
}

struct FifoSignal {
    file: File,
    path: PathBuf,
}

// Longer waits are done in slices that fit a u16 poll timeout.
const MAX_POLL_SLICE: Duration = Duration::from_millis(u16::MAX as u64);

impl ReadySignal for FifoSignal {
    fn wait(&self, timeout: Option<Duration>) -> Result<(), SandboxError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let slice = match deadline {
                None => PollTimeout::NONE,
                Some(d) => {
                    let left = d.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(SandboxError::Timeout(format!(
                            "signal {}",
                            self.path.display()
                        )));
                    }
                    // Round up, so a sub-millisecond remainder still waits.
                    let ms = left.min(MAX_POLL_SLICE).as_millis().max(1) as u16;
                    PollTimeout::from(ms)
                }
            };

            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, slice) {
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(poll_failed(e)),
                Ok(0) => continue,
                Ok(_) => (),
            }
            let revents = fds[0].revents().unwrap_or(PollFlags::empty());
            if revents.contains(PollFlags::POLLIN) {
                let mut buf = [0u8; 1];
                // A failed or empty read still means the writer showed up.
                let _ = (&self.file).read(&mut buf);
                log::debug!("signal {} is set", self.path.display());
                return Ok(());
            }
            if revents.contains(PollFlags::POLLHUP) {
                log::debug!("signal {} writer closed; treating as set", self.path.display());
                return Ok(());
            }
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
                return Err(SandboxError::Classified(ErrorCode::InvalidHandle));
            }
        }
    }
}

fn poll_failed(e: Errno) -> SandboxError {
    SandboxError::from(std::io::Error::from(e))
}

struct SetSignal;

impl ReadySignal for SetSignal {
    fn wait(&self, _timeout: Option<Duration>) -> Result<(), SandboxError> {
        Ok(())
    }
}
