use std::env;
use std::sync::{Mutex, OnceLock};

use intake_cli::commands::{config, doctor, migrate};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("INTAKE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"]
            .as_str()
            .unwrap_or_default()
            .starts_with("session store up to date"));
    });
}

#[test]
fn migrate_returns_config_failure_for_bad_database_url() {
    with_env(&[("INTAKE_DATABASE_URL", "postgres://localhost/intake")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_offline_defaults() {
    with_env(&[("INTAKE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "offline defaults should be ready");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[1]["name"], "model_readiness");
        assert_eq!(checks[1]["status"], "skipped");
        assert_eq!(checks[2]["name"], "session_store");
        assert_eq!(checks[2]["status"], "pass");
    });
}

#[test]
fn doctor_fails_when_model_extraction_has_no_key() {
    with_env(
        &[
            ("INTAKE_DATABASE_URL", "sqlite::memory:"),
            ("INTAKE_LLM_PROVIDER", "openai"),
            ("INTAKE_ASSISTANT_EXTRACTOR", "llm"),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 1);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "fail");
            assert_eq!(payload["checks"][0]["status"], "fail");
            assert!(payload["checks"][0]["details"]
                .as_str()
                .unwrap_or_default()
                .contains("llm.api_key"));
            assert_eq!(payload["checks"][1]["status"], "skipped");
        },
    );
}

#[test]
fn doctor_human_output_marks_each_check() {
    with_env(&[("INTAKE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(false);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [skip] model_readiness"));
        assert!(result.output.contains("- [ok] session_store"));
    });
}

#[test]
fn config_redacts_secrets_and_reports_sources() {
    with_env(
        &[
            ("INTAKE_DATABASE_URL", "sqlite::memory:"),
            ("INTAKE_LLM_PROVIDER", "openai"),
            ("INTAKE_LLM_API_KEY", "sk-test-0123456789"),
            ("INTAKE_ASSISTANT_STREAM_CHUNK_WORDS", "6"),
        ],
        || {
            let output = config::run();

            assert!(!output.contains("0123456789"));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (INTAKE_LLM_API_KEY))"));
            assert!(output.contains("- llm.provider = openai (source: env (INTAKE_LLM_PROVIDER))"));
            assert!(output.contains(
                "- assistant.stream_chunk_words = 6 (source: env (INTAKE_ASSISTANT_STREAM_CHUNK_WORDS))"
            ));
            assert!(output.contains("- assistant.extractor = rules (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failures() {
    with_env(&[("INTAKE_ASSISTANT_STREAM_CHUNK_WORDS", "many")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed:"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "INTAKE_DATABASE_URL",
        "INTAKE_DATABASE_MAX_CONNECTIONS",
        "INTAKE_DATABASE_TIMEOUT_SECS",
        "INTAKE_LLM_PROVIDER",
        "INTAKE_LLM_API_KEY",
        "INTAKE_LLM_BASE_URL",
        "INTAKE_LLM_MODEL",
        "INTAKE_LLM_TIMEOUT_SECS",
        "INTAKE_LLM_MAX_RETRIES",
        "INTAKE_ASSISTANT_EXTRACTOR",
        "INTAKE_ASSISTANT_REPLY_STYLE",
        "INTAKE_ASSISTANT_EXTRACTION_TIMEOUT_SECS",
        "INTAKE_ASSISTANT_STREAM_CHUNK_WORDS",
        "INTAKE_LOGGING_LEVEL",
        "INTAKE_LOGGING_FORMAT",
        "INTAKE_LOG_LEVEL",
        "INTAKE_LOG_FORMAT",
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
