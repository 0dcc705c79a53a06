//! Operator input.
//!
//! [`InputSource`] is the "read next keystrokes, non-blocking" primitive the
//! controller polls once per iteration.  [`StdinInput`] implements it for the
//! process's standard input with a zero-timeout `poll(2)` followed by a single
//! unbuffered `read(2)`.
//!
//! [`RawTerminal`] switches the terminal to non-canonical, no-echo mode for as
//! long as it is alive and restores the saved settings when dropped.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, OwnedFd};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use objctl_types::ObjctlError;
use tracing::{debug, warn};

/// Upper bound on bytes taken from the input stream in one poll.
pub const READ_BUFFER_LEN: usize = 1024;

/// A non-blocking byte source.
pub trait InputSource {
    /// Read whatever is immediately available into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is available (or the stream has ended).
    ///
    /// # Errors
    ///
    /// Returns [`ObjctlError::Input`] when the stream is broken.
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, ObjctlError>;
}

impl<I: InputSource + ?Sized> InputSource for Box<I> {
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, ObjctlError> {
        (**self).poll_read(buf)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StdinInput
// ────────────────────────────────────────────────────────────────────────────

/// [`InputSource`] over a duplicate of the standard-input descriptor, or any
/// other readable descriptor handed to [`StdinInput::from_fd`].
///
/// Reads bypass `std::io::Stdin`'s buffer so that `poll(2)` readiness and the
/// bytes actually consumed stay in step.
pub struct StdinInput {
    file: File,
}

impl StdinInput {
    /// Duplicate fd 0.
    pub fn new() -> Result<Self, ObjctlError> {
        let fd = std::io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| ObjctlError::Input(format!("dup stdin: {e}")))?;
        Ok(Self::from_fd(fd))
    }

    /// Read from `fd` instead of stdin.
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self { file: File::from(fd) }
    }
}

impl InputSource for StdinInput {
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, ObjctlError> {
        let ready = {
            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::ZERO) {
                Ok(n) => n > 0,
                Err(Errno::EINTR) => false,
                Err(e) => return Err(ObjctlError::Input(format!("poll(): {e}"))),
            }
        };
        if !ready {
            return Ok(0);
        }
        match self.file.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(ObjctlError::Input(format!("read(): {e}"))),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RawTerminal
// ────────────────────────────────────────────────────────────────────────────

/// Scoped non-canonical, no-echo terminal mode on standard input.
///
/// The saved settings are restored on drop, which covers normal returns,
/// `?` propagation, and the Ctrl-C shutdown path alike.  `ISIG` is left on so
/// Ctrl-C still raises `SIGINT`.
pub struct RawTerminal {
    saved: Option<Termios>,
}

impl RawTerminal {
    /// Save the current settings of stdin and switch to raw mode.
    ///
    /// # Errors
    ///
    /// Returns [`ObjctlError::Input`] when stdin is not a terminal or the
    /// settings cannot be changed.
    pub fn acquire() -> Result<Self, ObjctlError> {
        let stdin = std::io::stdin();
        let saved = termios::tcgetattr(&stdin)
            .map_err(|e| ObjctlError::Input(format!("tcgetattr: {e}")))?;

        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)
            .map_err(|e| ObjctlError::Input(format!("tcsetattr: {e}")))?;

        debug!("terminal switched to raw mode");
        Ok(Self { saved: Some(saved) })
    }

    /// A guard that changed nothing and restores nothing.
    pub fn inert() -> Self {
        Self { saved: None }
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            match termios::tcsetattr(std::io::stdin(), SetArg::TCSANOW, &saved) {
                Ok(()) => debug!("terminal restored"),
                Err(e) => warn!(error = %e, "failed to restore terminal settings"),
            }
        }
    }
}
