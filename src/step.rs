//! Scripted interactions.
//!
//! A [`Step`] describes one thing to type into the program under test and how
//! to judge what comes back. Steps are plain data; running them is the job of
//! the [`VerificationEngine`](crate::VerificationEngine).
//!
//! # Example
//!
//! ```rust
//! use tui_stepcheck::{SearchFor, Step, Steps};
//!
//! let steps = Steps::new(vec![
//!     Step::new("ansible-navigator builder --help-builder")
//!         .search_within(SearchFor::Prompt)
//!         .look_for("Example Playbook"),
//!     Step::new(":help").search_within(SearchFor::Help).comment("help screen"),
//! ]);
//!
//! assert_eq!(steps[1].step_index, 1);
//! ```

use std::{fmt, ops::Deref, str::FromStr};

use crate::error::StepError;

/// Which termination marker to wait for after sending input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchFor {
    /// Wait for the program's help screen.
    Help,
    /// Wait for the command prompt to come back.
    Prompt,
}

impl SearchFor {
    /// Returns the lowercase name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFor::Help => "help",
            SearchFor::Prompt => "prompt",
        }
    }
}

impl fmt::Display for SearchFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchFor {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "help" => Ok(SearchFor::Help),
            "prompt" => Ok(SearchFor::Prompt),
            other => Err(StepError::Configuration(format!(
                "unknown verification mode '{}'",
                other
            ))),
        }
    }
}

/// One scripted user interaction plus its success criterion.
///
/// Exactly one verification strategy applies to a Step: if either
/// `look_fors` or `look_nots` is non-empty the captured output is searched for
/// substrings, otherwise it is compared line by line against a fixture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Text sent to the interactive program. Enter is pressed after it.
    pub user_input: String,
    /// Termination marker to wait for. `None` is a configuration error.
    pub search_within_response: Option<SearchFor>,
    /// Substrings that must all appear in the captured output.
    pub look_fors: Vec<String>,
    /// Substrings that must all be absent from the captured output.
    pub look_nots: Vec<String>,
    /// Ordinal position within the module, used to locate the fixture.
    pub step_index: usize,
    /// Provenance note written into regenerated fixtures.
    pub comment: String,
}

impl Step {
    /// Creates a Step that types `user_input`, with no mode set yet.
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Default::default()
        }
    }

    /// Sets the termination marker mode.
    pub fn search_within(mut self, search: SearchFor) -> Self {
        self.search_within_response = Some(search);
        self
    }

    /// Adds a substring that must be present.
    pub fn look_for(mut self, text: impl Into<String>) -> Self {
        self.look_fors.push(text.into());
        self
    }

    /// Adds several substrings that must be present.
    pub fn look_fors<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.look_fors.extend(texts.into_iter().map(Into::into));
        self
    }

    /// Adds a substring that must be absent.
    pub fn look_not(mut self, text: impl Into<String>) -> Self {
        self.look_nots.push(text.into());
        self
    }

    /// Adds several substrings that must be absent.
    pub fn look_nots<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.look_nots.extend(texts.into_iter().map(Into::into));
        self
    }

    /// Sets the step index explicitly.
    pub fn index(mut self, step_index: usize) -> Self {
        self.step_index = step_index;
        self
    }

    /// Sets the provenance comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// True when neither look list is used, i.e. the fixture is compared.
    pub fn compares_fixture(&self) -> bool {
        self.look_fors.is_empty() && self.look_nots.is_empty()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comment.is_empty() {
            write!(f, "[{}] {}", self.step_index, self.user_input)
        } else {
            write!(f, "[{}] {} ({})", self.step_index, self.user_input, self.comment)
        }
    }
}

/// An ordered list of Steps whose indices match their positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Steps(Vec<Step>);

impl Steps {
    /// Wraps `steps`, overwriting each `step_index` with its position.
    pub fn new(steps: Vec<Step>) -> Self {
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(idx, step)| step.index(idx))
            .collect();
        Self(steps)
    }

    /// Unwraps into the underlying vector.
    pub fn into_inner(self) -> Vec<Step> {
        self.0
    }
}

impl Deref for Steps {
    type Target = [Step];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Step> for Steps {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Steps {
    type Item = Step;
    type IntoIter = std::vec::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Steps {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
