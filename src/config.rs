//! Run-wide harness configuration.
//!
//! The regeneration switch and the fixture root are read from the environment
//! once, at the start of a run, and then passed explicitly to every
//! [`VerificationEngine`](crate::VerificationEngine).

use std::path::PathBuf;

/// Environment variable that turns on fixture regeneration.
pub const UPDATE_FIXTURES_ENV: &str = "UPDATE_TEST_FIXTURES";

/// Environment variable overriding the fixture root directory.
pub const FIXTURES_DIR_ENV: &str = "TEST_FIXTURES_DIR";

/// Default directory for fixtures.
pub const DEFAULT_FIXTURES_DIR: &str = "tests/fixtures";

/// Configuration shared by all Steps of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// When set, captured output is written back as the new fixture.
    pub update_fixtures: bool,
    /// Root directory of the on-disk fixture store.
    pub fixtures_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            update_fixtures: false,
            fixtures_dir: PathBuf::from(DEFAULT_FIXTURES_DIR),
        }
    }
}

impl HarnessConfig {
    /// Reads the configuration from the process environment.
    ///
    /// `UPDATE_TEST_FIXTURES` set to `true` or `1` enables regeneration.
    /// `TEST_FIXTURES_DIR` overrides the fixture root.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let update_fixtures = lookup(UPDATE_FIXTURES_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        let fixtures_dir = lookup(FIXTURES_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FIXTURES_DIR));

        Self { update_fixtures, fixtures_dir }
    }

    /// Forces regeneration on for this configuration.
    ///
    /// Passing `false` keeps whatever the environment asked for.
    pub fn with_update_fixtures(mut self, update: bool) -> Self {
        self.update_fixtures |= update;
        self
    }

    /// Sets the fixture root directory.
    pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}
