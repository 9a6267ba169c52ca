//! Integration tests for the verification engine.

mod support;

use pretty_assertions::assert_eq;
use support::{lines, ScriptedGateway, PROMPT};
use tempfile::TempDir;
use tui_stepcheck::{
    FixtureIdentity, FixtureLoadError, FixtureStore, HarnessConfig, JsonFixtureStore,
    MemoryFixtureStore, SearchFor, SessionError, Step, StepError, Steps, VerificationEngine,
    HELP_MARKER,
};

const MODULE: &str = "integration::builder::test_stdout";

fn verify_config() -> HarnessConfig {
    HarnessConfig::default()
}

fn regenerate_config() -> HarnessConfig {
    HarnessConfig::default().with_update_fixtures(true)
}

#[test]
fn test_look_for_found_passes() {
    let mut gateway = ScriptedGateway::new().respond(&["$ builder --help", "... Example Playbook ...", PROMPT]);
    let store = MemoryFixtureStore::new();
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let step = Step::new("builder --help").search_within(SearchFor::Prompt).look_for("Example Playbook");
    let verdict = engine.verify(&step).unwrap();

    assert!(verdict.passed);
    assert_eq!(verdict.diagnostic, None);
    assert!(store.is_empty(), "substring mode must not touch fixtures");
}

#[test]
fn test_look_for_missing_fails_with_phrase() {
    let mut gateway = ScriptedGateway::new().respond(&["usage: builder", PROMPT]);
    let store = MemoryFixtureStore::new();
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let step = Step::new("builder --help").search_within(SearchFor::Prompt).look_for("Example Playbook");
    let verdict = engine.verify(&step).unwrap();

    assert!(!verdict.passed);
    assert!(verdict.diagnostic.unwrap().contains("\"Example Playbook\""));
}

#[test]
fn test_look_for_spans_line_wrap() {
    let mut gateway = ScriptedGateway::new().respond(&["see the Example", "Playbook below"]);
    let store = MemoryFixtureStore::new();
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let step = Step::new("x").search_within(SearchFor::Prompt).look_for("Example Playbook");
    assert!(engine.verify(&step).unwrap().passed);
}

#[test]
fn test_look_not_present_fails_even_with_look_fors() {
    let mut gateway = ScriptedGateway::new().respond(&["Example Playbook", "Traceback (most recent call last)"]);
    let store = MemoryFixtureStore::new();
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let step = Step::new("x")
        .search_within(SearchFor::Prompt)
        .look_for("Example Playbook")
        .look_not("Traceback");
    let verdict = engine.verify(&step).unwrap();

    assert!(!verdict.passed);
    let diagnostic = verdict.diagnostic.unwrap();
    assert!(diagnostic.contains("unexpected look_nots"));
    assert!(diagnostic.contains("\"Traceback\""));
}

#[test]
fn test_help_mode_waits_for_help_marker() {
    let mut gateway = ScriptedGateway::new().respond(&[":help help"]);
    let store = MemoryFixtureStore::new();
    {
        let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);
        let step = Step::new(":help").search_within(SearchFor::Help).look_for("help");
        engine.assert_step(&step).unwrap();
    }
    assert_eq!(gateway.calls, vec![(":help".to_string(), HELP_MARKER.to_string())]);
}

#[test]
fn test_prompt_mode_waits_for_gateway_prompt() {
    let mut gateway = ScriptedGateway::new().respond(&["ok"]);
    let store = MemoryFixtureStore::new();
    {
        let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);
        let step = Step::new("echo ok").search_within(SearchFor::Prompt).look_for("ok");
        engine.assert_step(&step).unwrap();
    }
    assert_eq!(gateway.calls[0].1, PROMPT);
}

#[test]
fn test_unset_mode_is_configuration_error_before_interaction() {
    let mut gateway = ScriptedGateway::new().respond(&["never used"]);
    let store = MemoryFixtureStore::new();
    {
        let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);
        let err = engine.verify(&Step::new("x").look_for("y")).unwrap_err();
        assert!(matches!(err, StepError::Configuration(ref msg) if msg == "verification mode not set"));
    }
    assert!(gateway.calls.is_empty(), "no input may be sent without a marker");
}

#[test]
fn test_gateway_error_propagates_unchanged() {
    let mut gateway = ScriptedGateway::new().fail_with(SessionError::Timeout { timeout_ms: 1500 });
    let store = MemoryFixtureStore::new();
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let err = engine
        .verify(&Step::new("x").search_within(SearchFor::Prompt))
        .unwrap_err();
    assert!(matches!(err, StepError::Gateway(SessionError::Timeout { timeout_ms: 1500 })));
}

#[test]
fn test_exact_fixture_match_passes() {
    let id = FixtureIdentity::new(MODULE, 0);
    let store = MemoryFixtureStore::new().with_output(id, ["a", "b"]);
    let mut gateway = ScriptedGateway::new().respond(&["a", "b"]);
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    engine
        .assert_step(&Step::new("x").search_within(SearchFor::Prompt))
        .unwrap();
}

#[test]
fn test_exact_fixture_mismatch_shows_diff() {
    let id = FixtureIdentity::new(MODULE, 0);
    let store = MemoryFixtureStore::new().with_output(id, ["a", "b"]);
    let mut gateway = ScriptedGateway::new().respond(&["a", "c"]);
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let verdict = engine.verify(&Step::new("x").search_within(SearchFor::Prompt)).unwrap();
    assert!(!verdict.passed);
    assert_eq!(
        verdict.diagnostic.as_deref(),
        Some("--- expected\n+++ received\n@@ -1,2 +1,2 @@\n a\n-b\n+c\n")
    );
}

#[test]
fn test_exact_fixture_requires_same_length() {
    let id = FixtureIdentity::new(MODULE, 0);
    let store = MemoryFixtureStore::new().with_output(id, ["a", "b"]);
    let mut gateway = ScriptedGateway::new().respond(&["a", "b", "extra"]);
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let err = engine
        .assert_step(&Step::new("x").search_within(SearchFor::Prompt))
        .unwrap_err();
    match err {
        StepError::AssertionMismatch(diff) => assert!(diff.contains("+extra")),
        other => panic!("expected mismatch, got {other}"),
    }
}

#[test]
fn test_missing_fixture_is_load_error_not_pass() {
    let store = MemoryFixtureStore::new();
    let mut gateway = ScriptedGateway::new().respond(&["anything"]);
    let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);

    let err = engine
        .verify(&Step::new("x").search_within(SearchFor::Prompt).index(4))
        .unwrap_err();
    match err {
        StepError::FixtureLoad { path, source: FixtureLoadError::NotFound } => {
            assert!(path.ends_with("integration/builder/test_stdout/4.json"));
        }
        other => panic!("expected FixtureLoad, got {other}"),
    }
}

#[test]
fn test_malformed_fixture_is_load_error() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let id = FixtureIdentity::new(MODULE, 0);
    let path = id.path(temp.path()).unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{\"output\": \"not a list\"}").unwrap();

    let mut gateway = ScriptedGateway::new().respond(&["a"]);
    let mut engine = VerificationEngine::new(
        &mut gateway,
        JsonFixtureStore::new(temp.path()),
        verify_config(),
        MODULE,
    );

    let err = engine.verify(&Step::new("x").search_within(SearchFor::Prompt)).unwrap_err();
    assert!(matches!(err, StepError::FixtureLoad { source: FixtureLoadError::Malformed(_), .. }));
}

#[test]
fn test_regeneration_records_output_and_metadata() {
    let store = MemoryFixtureStore::new();
    let mut gateway = ScriptedGateway::new().respond(&["x", "y"]);
    let mut engine = VerificationEngine::new(&mut gateway, &store, regenerate_config(), MODULE);

    let step = Step::new("x").search_within(SearchFor::Prompt).index(2).comment("welcome screen");
    let verdict = engine.verify(&step).unwrap();
    assert!(verdict.passed, "fresh fixture must match what was captured");

    let record = store.get(&FixtureIdentity::new(MODULE, 2)).expect("fixture written");
    assert_eq!(record.output, lines(&["x", "y"]));
    assert_eq!(record.comment, "welcome screen");
    assert_eq!(record.name, MODULE);
    assert_eq!(record.index, 2);
    assert!(record.additional_information.compared_fixture);
    assert!(record.additional_information.look_fors.is_empty());
    assert!(record.additional_information.look_nots.is_empty());
}

#[test]
fn test_regeneration_still_checks_substrings() {
    let store = MemoryFixtureStore::new();
    let mut gateway = ScriptedGateway::new().respond(&["no phrase here"]);
    let mut engine = VerificationEngine::new(&mut gateway, &store, regenerate_config(), MODULE);

    let step = Step::new("x").search_within(SearchFor::Prompt).look_for("Example Playbook");
    let verdict = engine.verify(&step).unwrap();
    assert!(!verdict.passed);

    let record = store.get(&FixtureIdentity::new(MODULE, 0)).expect("fixture written");
    assert_eq!(record.output, lines(&["no phrase here"]));
    assert!(!record.additional_information.compared_fixture);
    assert_eq!(record.additional_information.look_fors, lines(&["Example Playbook"]));
}

#[test]
fn test_regeneration_is_idempotent_on_disk() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let screen = ["header", "", "body line"];
    let step = Step::new("show").search_within(SearchFor::Prompt);

    for _ in 0..2 {
        let mut gateway = ScriptedGateway::new().respond(&screen);
        let mut engine = VerificationEngine::new(
            &mut gateway,
            JsonFixtureStore::new(temp.path()),
            regenerate_config(),
            MODULE,
        );
        engine.assert_step(&step).unwrap();
    }

    let mut gateway = ScriptedGateway::new().respond(&screen);
    let mut engine = VerificationEngine::new(
        &mut gateway,
        JsonFixtureStore::new(temp.path()),
        verify_config(),
        MODULE,
    );
    engine.assert_step(&step).unwrap();
}

#[test]
fn test_run_steps_uses_step_indices_and_stops_at_first_failure() {
    let store = MemoryFixtureStore::new()
        .with_output(FixtureIdentity::new(MODULE, 1), ["second"]);
    let mut gateway = ScriptedGateway::new()
        .respond(&["first ok"])
        .respond(&["second"])
        .respond(&["third is wrong"])
        .respond(&["never reached"]);

    let steps = Steps::new(vec![
        Step::new("one").search_within(SearchFor::Prompt).look_for("ok"),
        Step::new("two").search_within(SearchFor::Prompt),
        Step::new("three").search_within(SearchFor::Prompt).look_not("wrong"),
        Step::new("four").search_within(SearchFor::Prompt).look_for("never"),
    ]);

    {
        let mut engine = VerificationEngine::new(&mut gateway, &store, verify_config(), MODULE);
        let err = engine.run_steps(&steps).unwrap_err();
        assert!(matches!(err, StepError::AssertionMismatch(_)));
    }

    let inputs: Vec<&str> = gateway.calls.iter().map(|(input, _)| input.as_str()).collect();
    assert_eq!(inputs, vec!["one", "two", "three"]);
}

#[test]
fn test_json_store_save_then_verify() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let store = JsonFixtureStore::new(temp.path());
    let id = FixtureIdentity::new(MODULE, 0);

    let mut gateway = ScriptedGateway::new().respond(&["a", "b"]);
    {
        let mut engine = VerificationEngine::new(&mut gateway, &store, regenerate_config(), MODULE);
        engine.assert_step(&Step::new("x").search_within(SearchFor::Prompt)).unwrap();
    }

    let record = store.load(&id).unwrap();
    assert_eq!(record.output, lines(&["a", "b"]));
}
