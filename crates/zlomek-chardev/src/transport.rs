//! Abstracts "a byte sink/source with blocking read/write" — what the
//! channel's character device exposes to D. [`CharDevice`] is the real
//! thing; [`LoopbackChannel`] is the in-process stand-in the test suite uses
//! to exercise the full reader/writer/caller thread interplay without a
//! device node.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::mpsc;
use std::sync::Mutex;

/// A blocking byte-oriented duplex endpoint. `recv` returning `Ok(0)`
/// signals the peer is gone, mirroring a device read returning EOF.
pub trait DuplexChannel: Send + Sync {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn send(&self, buf: &[u8]) -> io::Result<()>;
}

/// Default path of the channel device node. Device-node creation itself is
/// a deployment concern, out of scope here.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/zfs";

/// Fixed major number reserved for the device, kept for reference; this
/// library does not enforce or register it.
pub const ZFS_CHARDEV_MAJOR: u32 = 251;

/// A real character-special file opened for blocking reads and writes, via
/// raw `libc::open`/`read`/`write`/`close`, matching the fd-flag handling
/// style of the FUSE channel crates this design is grounded on.
pub struct CharDevice {
    fd: RawFd,
}

impl CharDevice {
    pub fn open(path: &str) -> io::Result<Self> {
        let cpath = CString::new(path).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }
}

impl DuplexChannel for CharDevice {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn send(&self, buf: &[u8]) -> io::Result<()> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for CharDevice {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

// Safety: the fd is only touched through `read`/`write`/`close`, each of
// which is safe to call from any thread.
unsafe impl Send for CharDevice {}
unsafe impl Sync for CharDevice {}

/// One end of an in-process duplex pair, backed by a pair of `mpsc`
/// channels. Used by tests in place of a real device node. The peer
/// dropping its sender surfaces as `recv` returning `Ok(0)`.
pub struct LoopbackChannel {
    tx: Mutex<mpsc::Sender<Vec<u8>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl LoopbackChannel {
    /// Builds a connected pair: writes on one side arrive as reads on the
    /// other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (
            LoopbackChannel {
                tx: Mutex::new(tx_a),
                rx: Mutex::new(rx_a),
            },
            LoopbackChannel {
                tx: Mutex::new(tx_b),
                rx: Mutex::new(rx_b),
            },
        )
    }
}

impl DuplexChannel for LoopbackChannel {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let rx = self.rx.lock().expect("loopback mutex poisoned");
        match rx.recv() {
            Ok(msg) => {
                let n = msg.len().min(buf.len());
                buf[..n].copy_from_slice(&msg[..n]);
                Ok(n)
            }
            Err(_) => Ok(0),
        }
    }

    fn send(&self, buf: &[u8]) -> io::Result<()> {
        self.tx
            .lock()
            .expect("loopback mutex poisoned")
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "loopback peer dropped"))
    }
}
