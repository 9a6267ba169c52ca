//! Termination-marker resolution.
//!
//! The Gateway stops waiting and captures the screen once a marker string is
//! visible. Which marker to use depends on the Step's [`SearchFor`] mode.

use tracing::debug;

use crate::{
    error::{Result, StepError},
    step::SearchFor,
};

/// Marker shown by the target program's help screen.
pub const HELP_MARKER: &str = ":help help";

/// Resolves the termination marker for a Step.
///
/// `prompt` is the session's command prompt, obtained once from the Gateway.
/// The result depends only on the arguments.
///
/// # Errors
///
/// Returns [`StepError::Configuration`] when no mode is set. There is no
/// default marker.
///
/// # Example
///
/// ```rust
/// use tui_stepcheck::{resolve_marker, SearchFor};
///
/// assert_eq!(resolve_marker(Some(SearchFor::Help), "$ ")?, ":help help");
/// assert_eq!(resolve_marker(Some(SearchFor::Prompt), "$ ")?, "$ ");
/// assert!(resolve_marker(None, "$ ").is_err());
/// # Ok::<(), tui_stepcheck::StepError>(())
/// ```
pub fn resolve_marker<'a>(search: Option<SearchFor>, prompt: &'a str) -> Result<&'a str> {
    let marker = match search {
        Some(SearchFor::Help) => HELP_MARKER,
        Some(SearchFor::Prompt) => prompt,
        None => {
            return Err(StepError::Configuration("verification mode not set".to_string()));
        }
    };
    debug!(mode = ?search, marker, "resolved termination marker");
    Ok(marker)
}
