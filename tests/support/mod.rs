//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;

use tui_stepcheck::{Gateway, SessionError, SessionResult};

/// Prompt reported by [`ScriptedGateway`].
pub const PROMPT: &str = "(test)$ ";

/// A Gateway that replays canned screens and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    responses: VecDeque<SessionResult<Vec<String>>>,
    pub calls: Vec<(String, String)>,
    pub closed: bool,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful capture.
    pub fn respond(mut self, screen: &[&str]) -> Self {
        self.responses
            .push_back(Ok(screen.iter().map(|line| line.to_string()).collect()));
        self
    }

    /// Queues a failed capture.
    pub fn fail_with(mut self, err: SessionError) -> Self {
        self.responses.push_back(Err(err));
        self
    }
}

impl Gateway for ScriptedGateway {
    fn interact(&mut self, input: &str, stop_marker: &str) -> SessionResult<Vec<String>> {
        self.calls.push((input.to_string(), stop_marker.to_string()));
        self.responses
            .pop_front()
            .unwrap_or(Err(SessionError::Timeout { timeout_ms: 0 }))
    }

    fn prompt_marker(&self) -> &str {
        PROMPT
    }

    fn close(&mut self) -> SessionResult<()> {
        self.closed = true;
        Ok(())
    }
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
