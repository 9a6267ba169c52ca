//! The verification engine.
//!
//! [`VerificationEngine`] runs one [`Step`] at a time against a borrowed
//! [`Gateway`]:
//!
//! 1. resolve the termination marker from the Step's mode,
//! 2. send the input and capture the screen lines,
//! 3. regenerate the fixture if the run asked for it,
//! 4. verify with exactly one [`Strategy`].
//!
//! # Example
//!
//! ```rust,no_run
//! use tui_stepcheck::{
//!     HarnessConfig, JsonFixtureStore, PtySession, SearchFor, SessionConfig, SessionGuard,
//!     Step, VerificationEngine,
//! };
//!
//! # fn test() -> tui_stepcheck::Result<()> {
//! let config = HarnessConfig::from_env();
//! let store = JsonFixtureStore::new(&config.fixtures_dir);
//! let mut session = SessionGuard::new(PtySession::start(SessionConfig::new("welcome"))?);
//!
//! let mut engine = VerificationEngine::new(&mut *session, store, config, module_path!());
//! engine.assert_step(&Step::new("echo hello").search_within(SearchFor::Prompt).look_for("hello"))?;
//! # Ok(())
//! # }
//! ```

use tracing::{debug, warn};

use crate::{
    config::HarnessConfig,
    diff::{substring_report, unified_diff},
    error::{Result, StepError},
    fixture::{FixtureIdentity, FixtureRecord, FixtureStore},
    gateway::Gateway,
    marker::resolve_marker,
    step::Step,
};

/// How a Step's captured output is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy<'s> {
    /// Search the space-joined page for substrings.
    Substring(SubstringCheck<'s>),
    /// Captured lines must equal the stored fixture exactly. Only the engine
    /// can judge this, since it owns the fixture store.
    ExactFixture,
}

impl<'s> Strategy<'s> {
    /// Selects the strategy for `step`.
    ///
    /// Substring checks win whenever either look list is non-empty.
    pub fn for_step(step: &'s Step) -> Self {
        if step.compares_fixture() {
            Strategy::ExactFixture
        } else {
            Strategy::Substring(SubstringCheck {
                look_fors: &step.look_fors,
                look_nots: &step.look_nots,
            })
        }
    }
}

/// Substring criteria of one Step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstringCheck<'s> {
    /// Substrings that must all appear.
    pub look_fors: &'s [String],
    /// Substrings that must all be absent.
    pub look_nots: &'s [String],
}

impl SubstringCheck<'_> {
    /// Checks `page` against both lists.
    pub fn check(&self, page: &str) -> Verdict {
        let missing: Vec<&str> = self
            .look_fors
            .iter()
            .map(String::as_str)
            .filter(|text| !page.contains(text))
            .collect();
        let unexpected: Vec<&str> = self
            .look_nots
            .iter()
            .map(String::as_str)
            .filter(|text| page.contains(text))
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            Verdict::pass()
        } else {
            Verdict::fail(substring_report(&missing, &unexpected))
        }
    }
}

/// Compares a fixture's lines with captured lines.
pub fn compare_lines(expected: &[String], received: &[String]) -> Verdict {
    if expected == received {
        Verdict::pass()
    } else {
        Verdict::fail(unified_diff(expected, received))
    }
}

/// Joins captured lines with single spaces so substrings can span wrapped lines.
pub fn flatten(lines: &[String]) -> String {
    lines.join(" ")
}

/// The outcome of verifying one Step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the Step's assertions held.
    pub passed: bool,
    /// Human-readable explanation of a failure.
    pub diagnostic: Option<String>,
}

impl Verdict {
    /// A passing verdict.
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostic: None,
        }
    }

    /// A failing verdict with `diagnostic` as its explanation.
    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// Converts the verdict into a test assertion.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::AssertionMismatch`] carrying the diagnostic when the
    /// verdict failed.
    pub fn into_result(self) -> Result<()> {
        if self.passed {
            Ok(())
        } else {
            Err(StepError::AssertionMismatch(self.diagnostic.unwrap_or_default()))
        }
    }
}

/// Runs Steps of one module against one Gateway session.
///
/// The engine borrows the Gateway for its whole life, so Steps on a session
/// run strictly one after another.
#[derive(Debug)]
pub struct VerificationEngine<'g, G: Gateway + ?Sized, S: FixtureStore> {
    gateway: &'g mut G,
    store: S,
    config: HarnessConfig,
    module: String,
}

impl<'g, G: Gateway + ?Sized, S: FixtureStore> VerificationEngine<'g, G, S> {
    /// Creates an engine.
    ///
    /// # Arguments
    ///
    /// * `gateway` - Session the Steps are sent to
    /// * `store` - Where fixtures are loaded from and regenerated into
    /// * `config` - Run configuration, read once by the caller
    /// * `module` - Module path used to locate fixtures (e.g. `module_path!()`)
    pub fn new(gateway: &'g mut G, store: S, config: HarnessConfig, module: impl Into<String>) -> Self {
        Self {
            gateway,
            store,
            config,
            module: module.into(),
        }
    }

    /// The module path fixtures are located under.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The run configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The fixture store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fixture identity of `step` in this engine's module.
    pub fn identity(&self, step: &Step) -> FixtureIdentity {
        FixtureIdentity::for_step(self.module.clone(), step)
    }

    /// Executes `step` and returns its verdict.
    ///
    /// # Errors
    ///
    /// - [`StepError::Configuration`] when the Step has no verification mode
    /// - [`StepError::Gateway`] when capture fails or times out
    /// - [`StepError::FixtureSave`] when regeneration cannot write the fixture
    /// - [`StepError::FixtureLoad`] when exact comparison cannot load the fixture
    ///
    /// An assertion failure is not an error here; it is a failing [`Verdict`].
    pub fn verify(&mut self, step: &Step) -> Result<Verdict> {
        let marker = resolve_marker(step.search_within_response, self.gateway.prompt_marker())?
            .to_owned();

        let received = self.gateway.interact(&step.user_input, &marker)?;
        debug!(step = %step, lines = received.len(), "captured output");

        let identity = self.identity(step);
        if self.config.update_fixtures {
            let record = FixtureRecord::regenerated(&identity, step, received.clone());
            self.store.save(&identity, &record)?;
        }

        let verdict = match Strategy::for_step(step) {
            Strategy::Substring(check) => check.check(&flatten(&received)),
            Strategy::ExactFixture => {
                let expected = self.store.load(&identity)?;
                compare_lines(&expected.output, &received)
            }
        };

        if !verdict.passed {
            warn!(step = %step, module = %self.module, "step verification failed");
        }
        Ok(verdict)
    }

    /// Executes `step` as an assertion.
    ///
    /// # Errors
    ///
    /// Everything [`verify`](Self::verify) returns, plus
    /// [`StepError::AssertionMismatch`] when the verdict fails.
    pub fn assert_step(&mut self, step: &Step) -> Result<()> {
        self.verify(step)?.into_result()
    }

    /// Asserts `steps` in order, stopping at the first failure.
    pub fn run_steps<'a, I>(&mut self, steps: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Step>,
    {
        for step in steps {
            self.assert_step(step)?;
        }
        Ok(())
    }
}
