use std::env;
use std::fs;
use std::path::Path;

use intake_core::config::{resolve_config_path, AppConfig, LlmProvider, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let api_key_env: &'static [&'static str] = match config.llm.provider {
        LlmProvider::OpenAi => &["INTAKE_LLM_API_KEY", "OPENAI_API_KEY"],
        LlmProvider::Anthropic => &["INTAKE_LLM_API_KEY", "ANTHROPIC_API_KEY"],
        LlmProvider::Ollama => &["INTAKE_LLM_API_KEY"],
    };

    vec![
        Entry {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["INTAKE_DATABASE_URL"],
        },
        Entry {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["INTAKE_DATABASE_MAX_CONNECTIONS"],
        },
        Entry {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["INTAKE_DATABASE_TIMEOUT_SECS"],
        },
        Entry {
            key: "llm.provider",
            value: config.llm.provider.as_str().to_string(),
            env_keys: &["INTAKE_LLM_PROVIDER"],
        },
        Entry {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["INTAKE_LLM_MODEL"],
        },
        Entry {
            key: "llm.base_url",
            value: config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["INTAKE_LLM_BASE_URL"],
        },
        Entry { key: "llm.api_key", value: api_key, env_keys: api_key_env },
        Entry {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["INTAKE_LLM_TIMEOUT_SECS"],
        },
        Entry {
            key: "llm.max_retries",
            value: config.llm.max_retries.to_string(),
            env_keys: &["INTAKE_LLM_MAX_RETRIES"],
        },
        Entry {
            key: "assistant.extractor",
            value: format!("{:?}", config.assistant.extractor).to_lowercase(),
            env_keys: &["INTAKE_ASSISTANT_EXTRACTOR"],
        },
        Entry {
            key: "assistant.reply_style",
            value: format!("{:?}", config.assistant.reply_style).to_lowercase(),
            env_keys: &["INTAKE_ASSISTANT_REPLY_STYLE"],
        },
        Entry {
            key: "assistant.extraction_timeout_secs",
            value: config.assistant.extraction_timeout_secs.to_string(),
            env_keys: &["INTAKE_ASSISTANT_EXTRACTION_TIMEOUT_SECS"],
        },
        Entry {
            key: "assistant.stream_chunk_words",
            value: config.assistant.stream_chunk_words.to_string(),
            env_keys: &["INTAKE_ASSISTANT_STREAM_CHUNK_WORDS"],
        },
        Entry {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["INTAKE_LOGGING_LEVEL", "INTAKE_LOG_LEVEL"],
        },
        Entry {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_keys: &["INTAKE_LOGGING_FORMAT", "INTAKE_LOG_FORMAT"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
