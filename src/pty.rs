//! PTY (pseudo-terminal) management layer.
//!
//! This module wraps `portable-pty` for spawning the program under test and
//! exchanging bytes with it. Output is pumped by a background reader thread
//! into a channel, so reads never block longer than the caller asks.

use std::{
    io::{ErrorKind, Read, Write},
    sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError},
    thread,
    time::Duration,
};

use portable_pty::{Child, CommandBuilder, PtyPair, PtySize};
use tracing::debug;

use crate::error::{SessionError, SessionResult};

/// Default buffer size for reading PTY output.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// A terminal backed by a pseudo-terminal (PTY).
pub struct TestTerminal {
    pty_pair: PtyPair,
    child: Option<Box<dyn Child + Send + Sync>>,
    writer: Option<Box<dyn Write + Send>>,
    output: Option<Receiver<Vec<u8>>>,
    buffer_size: usize,
}

impl std::fmt::Debug for TestTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestTerminal")
            .field("has_child", &self.child.is_some())
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

impl TestTerminal {
    /// Creates a new terminal with the specified dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or PTY creation fails.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tui_stepcheck::TestTerminal;
    ///
    /// let terminal = TestTerminal::new(80, 24)?;
    /// # Ok::<(), tui_stepcheck::SessionError>(())
    /// ```
    pub fn new(width: u16, height: u16) -> SessionResult<Self> {
        if width == 0 || height == 0 {
            return Err(SessionError::InvalidDimensions { width, height });
        }

        let pty_system = portable_pty::native_pty_system();
        let pty_pair = pty_system.openpty(PtySize {
            rows: height,
            cols: width,
            pixel_width: 0,
            pixel_height: 0,
        })?;

        Ok(Self {
            pty_pair,
            child: None,
            writer: None,
            output: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        })
    }

    /// Sets the chunk size used by the reader thread.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Spawns a process in the PTY and starts pumping its output.
    ///
    /// # Errors
    ///
    /// Returns an error if a process is already running or the spawn fails.
    pub fn spawn(&mut self, cmd: CommandBuilder) -> SessionResult<()> {
        if self.child.is_some() {
            return Err(SessionError::ProcessAlreadyRunning);
        }

        let child = self.pty_pair.slave.spawn_command(cmd).map_err(|e| {
            SessionError::SpawnFailed(format!("Failed to spawn process in PTY: {}", e))
        })?;

        let mut reader = self.pty_pair.master.try_clone_reader()?;
        let (tx, rx) = mpsc::channel();
        let buffer_size = self.buffer_size;

        thread::spawn(move || {
            let mut buf = vec![0u8; buffer_size];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });

        debug!(pid = ?child.process_id(), "spawned process in PTY");
        self.child = Some(child);
        self.output = Some(rx);
        Ok(())
    }

    /// Collects output produced so far, waiting up to `wait` for the first chunk.
    ///
    /// Returns an empty vector when nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ProcessExited`] once the output stream has ended
    /// and no data is left, and [`SessionError::Closed`] if nothing was spawned.
    pub fn read_available(&mut self, wait: Duration) -> SessionResult<Vec<u8>> {
        let output = self.output.as_ref().ok_or(SessionError::Closed)?;
        let mut data = Vec::new();

        match output.recv_timeout(wait) {
            Ok(chunk) => data.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => return Ok(data),
            Err(RecvTimeoutError::Disconnected) => return Err(SessionError::ProcessExited),
        }

        loop {
            match output.try_recv() {
                Ok(chunk) => data.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        Ok(data)
    }

    /// Writes all of `data` to the PTY (sends input to the process).
    ///
    /// Handles EINTR (interrupted system calls) by retrying.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_all(&mut self, data: &[u8]) -> SessionResult<()> {
        // take_writer can only be called once
        if self.writer.is_none() {
            self.writer = Some(self.pty_pair.master.take_writer()?);
        }
        let writer = self.writer.as_mut().ok_or(SessionError::Closed)?;

        loop {
            match writer.write_all(data).and_then(|()| writer.flush()) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SessionError::Io(e)),
            }
        }
    }

    /// Checks if the child process is still running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kills the child process, if any. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be delivered to a process
    /// that is still running.
    pub fn kill(&mut self) -> SessionResult<()> {
        self.output = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if matches!(child.try_wait(), Ok(Some(_))) {
            return Ok(());
        }

        let result = child.kill();
        // Reap if it is already gone; otherwise the OS cleans up after us
        let _ = child.try_wait();

        result.map_err(|e| {
            SessionError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to kill child process: {}", e),
            ))
        })
    }
}

impl Drop for TestTerminal {
    fn drop(&mut self) {
        // Kill the child process if it's still running
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
        }
    }
}
