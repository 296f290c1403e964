use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{LinkError, Result};

/// Default baud rate for MBot-class control boards.
pub const DEFAULT_BAUD: u32 = 921_600;

/// Serial link endpoint opener.
///
/// Resolves a filesystem path to a concrete endpoint: a tty character
/// device (configured raw at the requested baud) or a Unix domain socket
/// (development targets, loopback firmware simulators).
pub struct SerialLink;

impl SerialLink {
    /// Open the endpoint at `path` and return a connected stream.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<LinkStream> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|source| LinkError::Open {
            path: path.clone(),
            source,
        })?;
        let file_type = metadata.file_type();

        if file_type.is_socket() {
            let stream = UnixStream::connect(&path).map_err(|source| LinkError::Connect {
                path: path.clone(),
                source,
            })?;
            info!(?path, "connected to socket link endpoint");
            return Ok(LinkStream {
                inner: LinkStreamInner::Socket(stream),
                path,
            });
        }

        if file_type.is_char_device() {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NOCTTY)
                .open(&path)
                .map_err(|source| LinkError::Open {
                    path: path.clone(),
                    source,
                })?;
            termios::configure_raw(&file, baud, &path)?;
            info!(?path, baud, "opened serial device");
            return Ok(LinkStream {
                inner: LinkStreamInner::Tty {
                    file,
                    timed: Arc::new(AtomicBool::new(false)),
                },
                path,
            });
        }

        Err(LinkError::UnsupportedEndpoint {
            path,
            kind: describe_file_type(&file_type),
        })
    }
}

fn describe_file_type(file_type: &std::fs::FileType) -> &'static str {
    if file_type.is_dir() {
        "directory"
    } else if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_file() {
        "regular file"
    } else {
        "unknown file type"
    }
}

/// A connected serial link — implements Read + Write.
///
/// Wraps either a raw-mode tty or a Unix socket stream. Read timeouts are
/// applied through termios `VTIME` on the tty path and through the socket
/// option on the socket path, so callers see one timeout surface.
pub struct LinkStream {
    inner: LinkStreamInner,
    path: PathBuf,
}

enum LinkStreamInner {
    Tty {
        file: File,
        /// Whether a VTIME read timeout is currently installed; shared
        /// across clones because termios state is per-device.
        timed: Arc<AtomicBool>,
    },
    Socket(UnixStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tty { file, timed } => {
                let read = file.read(buf)?;
                // With VMIN=0/VTIME set, an expired timer reads zero bytes.
                // Report it like the socket path does, so frame readers can
                // tell a quiet link from a closed one.
                if read == 0 && timed.load(Ordering::Relaxed) {
                    return Err(std::io::Error::from(std::io::ErrorKind::TimedOut));
                }
                Ok(read)
            }
            LinkStreamInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tty { file, .. } => file.write(buf),
            LinkStreamInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkStreamInner::Tty { file, .. } => file.flush(),
            LinkStreamInner::Socket(stream) => stream.flush(),
        }
    }
}

impl LinkStream {
    /// Set the read timeout for subsequent reads.
    ///
    /// tty endpoints use `VTIME` (decisecond granularity, clamped to the
    /// 0.1s–25.5s range it can express); `None` restores fully blocking
    /// reads.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tty { file, timed } => {
                termios::set_read_timeout(file, timeout, &self.path)?;
                timed.store(timeout.is_some(), Ordering::Relaxed);
                Ok(())
            }
            LinkStreamInner::Socket(stream) => {
                stream.set_read_timeout(timeout).map_err(LinkError::Io)
            }
        }
    }

    /// Clone this stream (new file descriptor over the same endpoint).
    ///
    /// The bridge splits one link into an exclusively-reading and an
    /// exclusively-writing half this way.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            LinkStreamInner::Tty { file, timed } => LinkStreamInner::Tty {
                file: file.try_clone()?,
                timed: Arc::clone(timed),
            },
            LinkStreamInner::Socket(stream) => LinkStreamInner::Socket(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            path: self.path.clone(),
        })
    }

    /// The filesystem path this stream was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Endpoint kind for diagnostics.
    pub fn endpoint_kind(&self) -> &'static str {
        match &self.inner {
            LinkStreamInner::Tty { .. } => "tty",
            LinkStreamInner::Socket(_) => "unix-socket",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("endpoint", &self.endpoint_kind())
            .field("path", &self.path)
            .finish()
    }
}

mod termios {
    use std::fs::File;
    use std::os::fd::AsRawFd;
    use std::path::Path;
    use std::time::Duration;

    use tracing::warn;

    use crate::error::{LinkError, Result};

    pub(super) fn configure_raw(file: &File, baud: u32, path: &Path) -> Result<()> {
        let speed = baud_constant(baud)?;
        let fd = file.as_raw_fd();

        // SAFETY: `tio` is a zeroed termios filled in by tcgetattr before
        // use, and `fd` is an open tty descriptor owned by `file`.
        unsafe {
            let mut tio: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut tio) != 0 {
                return Err(termios_error(path));
            }

            libc::cfmakeraw(&mut tio);
            tio.c_cflag |= libc::CLOCAL | libc::CREAD;
            // Block until at least one byte until a read timeout is set.
            tio.c_cc[libc::VMIN] = 1;
            tio.c_cc[libc::VTIME] = 0;

            if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
                return Err(termios_error(path));
            }
            if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
                return Err(termios_error(path));
            }
            // Discard whatever accumulated before raw mode took effect.
            if libc::tcflush(fd, libc::TCIOFLUSH) != 0 {
                warn!(?path, "tcflush failed after raw-mode setup");
            }
        }

        Ok(())
    }

    pub(super) fn set_read_timeout(
        file: &File,
        timeout: Option<Duration>,
        path: &Path,
    ) -> Result<()> {
        let fd = file.as_raw_fd();

        // SAFETY: same contract as configure_raw.
        unsafe {
            let mut tio: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut tio) != 0 {
                return Err(termios_error(path));
            }

            match timeout {
                Some(timeout) => {
                    let deciseconds = timeout.as_millis().div_ceil(100).clamp(1, 255);
                    tio.c_cc[libc::VMIN] = 0;
                    tio.c_cc[libc::VTIME] = deciseconds as libc::cc_t;
                }
                None => {
                    tio.c_cc[libc::VMIN] = 1;
                    tio.c_cc[libc::VTIME] = 0;
                }
            }

            if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
                return Err(termios_error(path));
            }
        }

        Ok(())
    }

    fn termios_error(path: &Path) -> LinkError {
        LinkError::Termios {
            path: path.to_path_buf(),
            source: std::io::Error::last_os_error(),
        }
    }

    fn baud_constant(baud: u32) -> Result<libc::speed_t> {
        let speed = match baud {
            9_600 => libc::B9600,
            19_200 => libc::B19200,
            38_400 => libc::B38400,
            57_600 => libc::B57600,
            115_200 => libc::B115200,
            230_400 => libc::B230400,
            #[cfg(target_os = "linux")]
            460_800 => libc::B460800,
            #[cfg(target_os = "linux")]
            921_600 => libc::B921600,
            other => return Err(LinkError::UnsupportedBaud(other)),
        };
        Ok(speed)
    }
}
