//! A [`Gateway`] backed by a real pseudo-terminal.
//!
//! [`PtySession`] starts a shell inside a PTY with a known prompt, runs any
//! setup commands, and then serves Steps: each interaction types the input,
//! waits until the termination marker is rendered, and returns the screen.
//!
//! # Example
//!
//! ```rust,no_run
//! use tui_stepcheck::{Gateway, PtySession, SessionConfig, SessionGuard};
//!
//! # fn test() -> tui_stepcheck::Result<()> {
//! let config = SessionConfig::new("welcome")
//!     .with_setup_command("export ANSIBLE_CACHE_PLUGIN_TIMEOUT=42")
//!     .with_size(200, 60);
//! let mut session = SessionGuard::new(PtySession::start(config)?);
//!
//! let prompt = session.prompt_marker().to_string();
//! let lines = session.interact("echo ready", &prompt)?;
//! assert!(lines.iter().any(|line| line == "ready"));
//! # Ok(())
//! # }
//! ```

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use portable_pty::CommandBuilder;
use tracing::{debug, warn};

use crate::{
    error::{SessionError, SessionResult},
    gateway::Gateway,
    pty::TestTerminal,
    screen::ScreenState,
};

/// Default timeout for one interaction.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default polling interval while waiting for the marker.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound, in poll intervals, on waiting for output to go quiet once
/// the marker is visible.
const SETTLE_POLLS: u32 = 10;

/// Clears the terminal without depending on an external `clear` binary.
const DEFAULT_CLEAR_COMMAND: &str = r"printf '\033[H\033[2J'";

/// Default pane size, large enough that full-screen programs do not scroll.
const DEFAULT_WIDTH: u16 = 300;
const DEFAULT_HEIGHT: u16 = 300;

/// Settings for a [`PtySession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identifies the test that owns the session; used to derive the prompt.
    pub unique_test_id: String,
    /// Shell program to run.
    pub shell: String,
    /// Arguments passed to the shell.
    pub shell_args: Vec<String>,
    /// Commands run, in order, before the first Step.
    pub setup_commands: Vec<String>,
    /// Extra environment for the shell.
    pub env: Vec<(String, String)>,
    /// Working directory of the shell.
    pub cwd: Option<PathBuf>,
    /// Terminal width in columns.
    pub width: u16,
    /// Terminal height in rows.
    pub height: u16,
    /// Prompt the shell displays; the `Prompt` termination marker.
    pub prompt: String,
    /// Maximum wait for a marker.
    pub timeout: Duration,
    /// Polling interval while waiting.
    pub poll_interval: Duration,
    /// Command typed before each input while the shell sits at its prompt.
    /// `None` leaves earlier output on screen.
    pub clear_command: Option<String>,
}

impl SessionConfig {
    /// Creates a configuration for the test `unique_test_id` with defaults:
    /// `bash --norc --noprofile`, a 300x300 pane, `PAGER=cat`, and a prompt
    /// derived from the test id.
    pub fn new(unique_test_id: impl Into<String>) -> Self {
        let unique_test_id = unique_test_id.into();
        let prompt = format!("({})$ ", prompt_tag(&unique_test_id));
        Self {
            unique_test_id,
            shell: "bash".to_string(),
            shell_args: vec!["--norc".to_string(), "--noprofile".to_string()],
            setup_commands: vec!["export PAGER=cat".to_string()],
            env: Vec::new(),
            cwd: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            prompt,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clear_command: Some(DEFAULT_CLEAR_COMMAND.to_string()),
        }
    }

    /// Sets the shell and its arguments.
    pub fn with_shell<I, S>(mut self, shell: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell = shell.into();
        self.shell_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a setup command.
    pub fn with_setup_command(mut self, command: impl Into<String>) -> Self {
        self.setup_commands.push(command.into());
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the terminal size.
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Sets the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Sets the interaction timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the command that clears an idle shell before each input.
    pub fn with_clear_command(mut self, command: Option<String>) -> Self {
        self.clear_command = command;
        self
    }
}

// Short, shell-safe tag so the prompt never needs quoting
fn prompt_tag(test_id: &str) -> String {
    let tag: String = test_id
        .chars()
        .rev()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(24)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if tag.is_empty() {
        "stepcheck".to_string()
    } else {
        tag
    }
}

/// A shell running in a PTY, driven one interaction at a time.
///
/// One [`ScreenState`] lives as long as the session and receives every byte
/// the shell writes, so a capture shows the terminal as it really looks,
/// including regions a full-screen program did not redraw.
#[derive(Debug)]
pub struct PtySession {
    terminal: TestTerminal,
    screen: ScreenState,
    config: SessionConfig,
    closed: bool,
}

impl PtySession {
    /// Spawns the shell, waits for its prompt, and runs the setup commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the PTY cannot be created, the shell cannot be
    /// spawned, or the prompt does not appear within the timeout.
    pub fn start(config: SessionConfig) -> SessionResult<Self> {
        let mut terminal = TestTerminal::new(config.width, config.height)?;

        let mut cmd = CommandBuilder::new(&config.shell);
        cmd.args(&config.shell_args);
        cmd.env("PS1", &config.prompt);
        cmd.env("TERM", "xterm-256color");
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        terminal.spawn(cmd)?;

        let mut session = Self {
            screen: ScreenState::new(config.width, config.height),
            terminal,
            config,
            closed: false,
        };

        let prompt = session.config.prompt.clone();
        session.wait_for_marker(&prompt, &[])?;
        debug!(test_id = %session.config.unique_test_id, prompt = %prompt, "session ready");

        for command in session.config.setup_commands.clone() {
            session.interact(&command, &prompt)?;
        }
        Ok(session)
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The terminal screen as of the last read.
    pub fn screen(&self) -> &ScreenState {
        &self.screen
    }

    // Feeds output still in flight into the screen until the terminal is quiet
    fn catch_up(&mut self) -> SessionResult<()> {
        loop {
            let chunk = self.terminal.read_available(self.config.poll_interval)?;
            if chunk.is_empty() {
                return Ok(());
            }
            self.screen.feed(&chunk);
        }
    }

    // The shell shows nothing but its prompt on the cursor row
    fn shell_is_idle(&self) -> bool {
        let (row, col) = self.screen.cursor_position();
        let prompt = &self.config.prompt;
        self.screen
            .rows()
            .get(row as usize)
            .is_some_and(|text| text.trim_end() == prompt.trim_end())
            && col as usize == prompt.chars().count()
    }

    // Clears the terminal from an idle shell so the next capture starts at the top
    fn clear_screen(&mut self) -> SessionResult<()> {
        let prompt = self.config.prompt.trim_end().to_string();
        let cleared = |screen: &ScreenState| screen.lines() == [prompt.as_str()];
        if cleared(&self.screen) {
            return Ok(());
        }
        let Some(clear) = self.config.clear_command.clone() else {
            return Ok(());
        };

        let mut keys = clear.into_bytes();
        keys.push(b'\r');
        self.terminal.write_all(&keys)?;
        self.wait_until("cleared screen", cleared)
    }

    fn wait_for_marker(&mut self, marker: &str, before: &[String]) -> SessionResult<()> {
        self.wait_until(marker, |screen| shows_new_marker(&screen.rows(), before, marker))?;
        self.settle()
    }

    fn wait_until<F>(&mut self, description: &str, condition: F) -> SessionResult<()>
    where
        F: Fn(&ScreenState) -> bool,
    {
        let start = Instant::now();
        let mut iterations = 0u32;

        loop {
            match self.terminal.read_available(self.config.poll_interval) {
                Ok(chunk) => self.screen.feed(&chunk),
                Err(SessionError::ProcessExited) => {
                    if condition(&self.screen) {
                        return Ok(());
                    }
                    warn!(
                        waiting_for = description,
                        waited = ?start.elapsed(),
                        iterations,
                        screen = %self.screen.contents().trim_end(),
                        "process exited while waiting"
                    );
                    return Err(SessionError::ProcessExited);
                }
                Err(e) => return Err(e),
            }

            if condition(&self.screen) {
                return Ok(());
            }

            if start.elapsed() >= self.config.timeout {
                warn!(
                    waiting_for = description,
                    waited = ?start.elapsed(),
                    iterations,
                    screen = %self.screen.contents().trim_end(),
                    "timeout waiting for screen"
                );
                return Err(SessionError::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                });
            }
            iterations += 1;
        }
    }

    // Reads until output goes quiet so the capture holds the whole frame
    fn settle(&mut self) -> SessionResult<()> {
        let deadline = Instant::now() + self.config.poll_interval * SETTLE_POLLS;
        while Instant::now() < deadline {
            match self.terminal.read_available(self.config.poll_interval) {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => self.screen.feed(&chunk),
                Err(SessionError::ProcessExited) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

// True when `marker` shows in a row where it was not already visible before
// the input was typed. A row that only grew (the echoed input after a
// prompt) does not count.
fn shows_new_marker(rows: &[String], before: &[String], marker: &str) -> bool {
    rows.iter().enumerate().any(|(idx, row)| {
        if !row.contains(marker) {
            return false;
        }
        match before.get(idx) {
            Some(old) if old.contains(marker) => !row.starts_with(old.trim_end()),
            _ => true,
        }
    })
}

impl Gateway for PtySession {
    fn interact(&mut self, input: &str, stop_marker: &str) -> SessionResult<Vec<String>> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        self.catch_up()?;
        if self.shell_is_idle() {
            self.clear_screen()?;
        }
        let before = self.screen.rows();

        let mut keys = input.as_bytes().to_vec();
        keys.push(b'\r');
        self.terminal.write_all(&keys)?;

        self.wait_for_marker(stop_marker, &before)?;
        let lines = self.screen.lines();
        debug!(input, stop_marker, lines = lines.len(), "interaction captured");
        Ok(lines)
    }

    fn prompt_marker(&self) -> &str {
        &self.config.prompt
    }

    fn close(&mut self) -> SessionResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(test_id = %self.config.unique_test_id, "closing session");
        self.terminal.kill()
    }
}
