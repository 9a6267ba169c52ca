//! Session lifecycle integration tests against a real shell.

use std::time::Duration;

use tui_stepcheck::{
    Gateway, HarnessConfig, MemoryFixtureStore, PtySession, Result, SearchFor, SessionConfig,
    SessionError, SessionGuard, Step, Steps, VerificationEngine,
};

fn config(test_id: &str) -> SessionConfig {
    SessionConfig::new(test_id)
        .with_size(120, 40)
        .with_timeout(Duration::from_secs(10))
        .with_poll_interval(Duration::from_millis(50))
}

#[test]
fn test_start_uses_derived_prompt() -> Result<()> {
    let session = SessionGuard::new(PtySession::start(config("pty::test_prompt"))?);

    assert_eq!(session.prompt_marker(), "(ptytest_prompt)$ ");
    Ok(())
}

#[test]
fn test_interact_captures_until_prompt() -> Result<()> {
    let mut session = SessionGuard::new(PtySession::start(config("pty::test_echo"))?);
    let prompt = session.prompt_marker().to_string();

    let lines = session.interact("echo hello", &prompt)?;

    assert!(lines.iter().any(|line| line == "hello"), "lines: {lines:?}");
    assert!(lines
        .last()
        .is_some_and(|line| line.starts_with(prompt.trim_end())));
    Ok(())
}

#[test]
fn test_each_interaction_starts_from_fresh_screen() -> Result<()> {
    let mut session = SessionGuard::new(PtySession::start(config("pty::test_fresh"))?);
    let prompt = session.prompt_marker().to_string();

    session.interact("echo first-output", &prompt)?;
    let lines = session.interact("echo second-output", &prompt)?;

    assert!(!lines.iter().any(|line| line.contains("first-output")), "lines: {lines:?}");
    assert!(lines.iter().any(|line| line == "second-output"));
    Ok(())
}

#[test]
fn test_setup_commands_run_before_first_step() -> Result<()> {
    let cfg = config("pty::test_setup").with_setup_command("export STEPCHECK_GREETING=configured");
    let mut session = SessionGuard::new(PtySession::start(cfg)?);
    let prompt = session.prompt_marker().to_string();

    let lines = session.interact("echo $STEPCHECK_GREETING", &prompt)?;
    assert!(lines.iter().any(|line| line == "configured"), "lines: {lines:?}");

    let lines = session.interact("echo $PAGER", &prompt)?;
    assert!(lines.iter().any(|line| line == "cat"), "lines: {lines:?}");
    Ok(())
}

#[test]
fn test_env_is_passed_to_shell() -> Result<()> {
    let cfg = config("pty::test_env").with_env("STEPCHECK_MODE", "stdout");
    let mut session = SessionGuard::new(PtySession::start(cfg)?);
    let prompt = session.prompt_marker().to_string();

    let lines = session.interact("echo mode=$STEPCHECK_MODE", &prompt)?;
    assert!(lines.iter().any(|line| line == "mode=stdout"), "lines: {lines:?}");
    Ok(())
}

#[test]
fn test_missing_marker_times_out() -> Result<()> {
    let cfg = config("pty::test_timeout").with_timeout(Duration::from_millis(500));
    let mut session = SessionGuard::new(PtySession::start(cfg)?);

    let result = session.interact("sleep 3", "marker-that-never-renders");
    assert!(matches!(result, Err(SessionError::Timeout { timeout_ms: 500 })));
    Ok(())
}

#[test]
fn test_marker_near_timeout_still_settles() -> Result<()> {
    let cfg = config("pty::test_late_marker").with_timeout(Duration::from_secs(2));
    let mut session = SessionGuard::new(PtySession::start(cfg)?);

    let lines = session.interact(
        "sleep 1.85; printf 'marker-%s\\n' reached; for i in 1 2 3 4 5; do sleep 0.02; echo \"more $i\"; done",
        "marker-reached",
    )?;
    assert!(lines.iter().any(|line| line == "more 5"), "lines: {lines:?}");
    Ok(())
}

#[test]
fn test_close_is_idempotent_and_final() -> Result<()> {
    let mut session = PtySession::start(config("pty::test_close"))?;
    let prompt = session.prompt_marker().to_string();

    session.close()?;
    session.close()?;

    let result = session.interact("echo late", &prompt);
    assert!(matches!(result, Err(SessionError::Closed)));
    Ok(())
}

#[test]
fn test_guard_release_closes_session() -> Result<()> {
    let guard = SessionGuard::new(PtySession::start(config("pty::test_release"))?);
    guard.release()?;
    Ok(())
}

#[test]
fn test_invalid_size_is_rejected() {
    let result = PtySession::start(config("pty::test_size").with_size(0, 40));
    assert!(matches!(result, Err(SessionError::InvalidDimensions { width: 0, height: 40 })));
}

#[test]
fn test_capture_keeps_regions_not_redrawn() -> Result<()> {
    let mut session = SessionGuard::new(PtySession::start(config("pty::test_redraw"))?);

    let lines = session.interact(
        r"printf '\033[10;1HPERSISTENT %s\033[1;1H' HEADER; read -r x; printf '\033[2;1H%s\n' updated",
        "PERSISTENT HEADER",
    )?;
    assert_eq!(lines.get(9).map(String::as_str), Some("PERSISTENT HEADER"), "lines: {lines:?}");

    // Only row 2 is redrawn; the header from the previous step stays put
    let lines = session.interact("", "updated")?;
    assert_eq!(lines.get(1).map(String::as_str), Some("updated"), "lines: {lines:?}");
    assert_eq!(lines.get(9).map(String::as_str), Some("PERSISTENT HEADER"), "lines: {lines:?}");
    assert!(session.screen().contains("PERSISTENT HEADER"));
    Ok(())
}

#[test]
fn test_substring_needs_program_output() -> Result<()> {
    let mut session = SessionGuard::new(PtySession::start(config("pty::test_output_only"))?);
    let store = MemoryFixtureStore::new();
    let mut engine =
        VerificationEngine::new(&mut *session, &store, HarnessConfig::default(), "pty::test_output_only");

    let typed_only = Step::new("printf 'Example %s\\n' Nothing")
        .search_within(SearchFor::Prompt)
        .look_for("Example Playbook");
    assert!(!engine.verify(&typed_only)?.passed);

    let printed = Step::new("printf 'Example %s\\n' Playbook")
        .search_within(SearchFor::Prompt)
        .look_for("Example Playbook")
        .look_not("command not found");
    assert!(engine.verify(&printed)?.passed);
    Ok(())
}

#[test]
fn test_engine_over_real_session() -> Result<()> {
    let mut session = SessionGuard::new(PtySession::start(config("pty::test_engine"))?);
    let store = MemoryFixtureStore::new();
    let steps = Steps::new(vec![
        Step::new("printf 'Example %s\\n' Playbook")
            .search_within(SearchFor::Prompt)
            .look_for("Example Playbook")
            .look_not("command not found"),
        Step::new("echo stable output").search_within(SearchFor::Prompt),
    ]);

    let regenerate = HarnessConfig::default().with_update_fixtures(true);
    VerificationEngine::new(&mut *session, &store, regenerate, "pty::test_engine").run_steps(&steps)?;
    assert_eq!(store.len(), 2);

    VerificationEngine::new(&mut *session, &store, HarnessConfig::default(), "pty::test_engine")
        .run_steps(&steps)?;
    Ok(())
}
