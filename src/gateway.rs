//! The session interaction boundary.
//!
//! A [`Gateway`] owns a virtual terminal with the program under test running in
//! it. The engine only ever sends input and reads back screen lines through
//! this trait, so tests can substitute a scripted fake for a real PTY.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::error::SessionResult;

/// A live terminal session the engine can drive.
pub trait Gateway {
    /// Types `input`, presses Enter, and waits until `stop_marker` is visible.
    ///
    /// Returns the screen content at that moment, one entry per line. May block
    /// for as long as the implementation's own timeout allows.
    fn interact(&mut self, input: &str, stop_marker: &str) -> SessionResult<Vec<String>>;

    /// The command prompt shown by the session, stable for its lifetime.
    fn prompt_marker(&self) -> &str;

    /// Tears the session down. Calling it more than once is harmless.
    fn close(&mut self) -> SessionResult<()>;
}

impl<G: Gateway + ?Sized> Gateway for Box<G> {
    fn interact(&mut self, input: &str, stop_marker: &str) -> SessionResult<Vec<String>> {
        (**self).interact(input, stop_marker)
    }

    fn prompt_marker(&self) -> &str {
        (**self).prompt_marker()
    }

    fn close(&mut self) -> SessionResult<()> {
        (**self).close()
    }
}

/// RAII guard that closes a Gateway when dropped.
///
/// The session is torn down on every exit path, including a panicking
/// assertion in the test body.
///
/// # Example
///
/// ```rust,no_run
/// use tui_stepcheck::{PtySession, SessionConfig, SessionGuard};
///
/// # fn test() -> tui_stepcheck::Result<()> {
/// {
///     let session = SessionGuard::new(PtySession::start(SessionConfig::new("demo"))?);
///     // Use the session via deref
///     // Closed automatically when the guard goes out of scope
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionGuard<G: Gateway> {
    gateway: Option<G>,
}

impl<G: Gateway> SessionGuard<G> {
    /// Wraps `gateway`.
    pub fn new(gateway: G) -> Self {
        Self { gateway: Some(gateway) }
    }

    /// Closes the session now, reporting any teardown error.
    ///
    /// This is optional; the session is closed automatically on drop.
    pub fn release(mut self) -> SessionResult<()> {
        match self.gateway.take() {
            Some(mut gateway) => gateway.close(),
            None => Ok(()),
        }
    }
}

impl<G: Gateway> Deref for SessionGuard<G> {
    type Target = G;

    fn deref(&self) -> &G {
        // Only `release` and `drop` take the gateway, and both consume the guard
        self.gateway.as_ref().expect("session guard used after release")
    }
}

impl<G: Gateway> DerefMut for SessionGuard<G> {
    fn deref_mut(&mut self) -> &mut G {
        self.gateway.as_mut().expect("session guard used after release")
    }
}

impl<G: Gateway> Drop for SessionGuard<G> {
    fn drop(&mut self) {
        if let Some(mut gateway) = self.gateway.take() {
            if let Err(e) = gateway.close() {
                warn!(error = %e, "failed to close session during drop");
            }
        }
    }
}
