//! # tui_stepcheck
//!
//! Step-driven verification of interactive terminal programs.
//!
//! ## Overview
//!
//! A test module is a sequence of [`Step`]s run against one long-lived terminal
//! session. Each Step types some input, waits for a termination marker (the
//! help screen or the shell prompt), captures the screen, and verifies it with
//! exactly one strategy:
//!
//! - **Substring**: every `look_fors` entry present and no `look_nots` entry
//!   present in the captured lines joined by spaces.
//! - **Exact fixture**: captured lines equal a stored golden fixture, otherwise
//!   the failure shows a unified diff.
//!
//! Setting `UPDATE_TEST_FIXTURES=true` regenerates fixtures from the observed
//! output before verifying.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tui_stepcheck::{
//!     HarnessConfig, JsonFixtureStore, PtySession, Result, SearchFor, SessionConfig,
//!     SessionGuard, Step, Steps, VerificationEngine,
//! };
//!
//! #[test]
//! fn test_builder_help() -> Result<()> {
//!     let steps = Steps::new(vec![
//!         Step::new("ansible-navigator builder --help-builder --mode stdout")
//!             .search_within(SearchFor::Prompt)
//!             .look_for("Example Playbook"),
//!         Step::new("echo done").search_within(SearchFor::Prompt).comment("exact match"),
//!     ]);
//!
//!     let config = HarnessConfig::from_env();
//!     let store = JsonFixtureStore::new(&config.fixtures_dir);
//!     let mut session = SessionGuard::new(PtySession::start(SessionConfig::new(module_path!()))?);
//!
//!     let mut engine = VerificationEngine::new(&mut *session, store, config, module_path!());
//!     engine.run_steps(&steps)
//! }
//! ```
//!
//! ## Architecture
//!
//! 1. **Steps** (`step`, `marker`): what to type and which marker ends the capture
//! 2. **Engine** (`engine`, `diff`): strategy selection, verdicts, reports
//! 3. **Fixtures** (`fixture`, `config`): golden records on disk, regeneration switch
//! 4. **Gateway** (`gateway`, `session`, `pty`, `screen`): the terminal session

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]

pub mod config;
pub mod diff;
mod engine;
mod error;
pub mod fixture;
mod gateway;
mod marker;
mod pty;
mod screen;
mod session;
mod step;

pub use config::HarnessConfig;
pub use engine::{compare_lines, flatten, Strategy, SubstringCheck, Verdict, VerificationEngine};
pub use error::{FixtureLoadError, Result, SessionError, SessionResult, StepError};
pub use fixture::{
    FixtureIdentity, FixtureMetadata, FixtureRecord, FixtureStore, JsonFixtureStore,
    MemoryFixtureStore,
};
pub use gateway::{Gateway, SessionGuard};
pub use marker::{resolve_marker, HELP_MARKER};
pub use pty::TestTerminal;
pub use screen::ScreenState;
pub use session::{PtySession, SessionConfig};
pub use step::{SearchFor, Step, Steps};
