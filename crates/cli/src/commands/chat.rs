use std::sync::Arc;

use anyhow::{Context, Result};
use intake_agent::AgentRuntime;
use intake_core::config::{AppConfig, LoadOptions};
use intake_core::domain::session::SessionId;
use intake_core::errors::{ApplicationError, InterfaceError};
use intake_db::{
    connect_with_settings, migrations, InMemorySessionRepository, SessionRepository,
    SqlSessionRepository,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::commands::CommandResult;
use crate::logging;

const HELP: &str = "Commands: /summary shows the form, /transcript shows the conversation, \
/end discards this session, /quit leaves it for later.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatOptions {
    pub session: Option<String>,
    pub ephemeral: bool,
}

/// How an interactive session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatReport {
    pub session_id: SessionId,
    pub turns: usize,
    pub ended: bool,
}

pub fn run(options: ChatOptions) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    logging::init(&config.logging);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(async {
        let agent = match open_runtime(&config, options.ephemeral).await {
            Ok(agent) => agent,
            Err(error) => {
                return CommandResult::failure("chat", "bootstrap", format!("{error:#}"), 4);
            }
        };

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let session = options.session.map(SessionId);
        match chat_loop(&agent, session, stdin, &mut stdout).await {
            Ok(report) => CommandResult::success("chat", describe(&report, options.ephemeral)),
            Err(error) => chat_failure(error),
        }
    })
}

/// Builds the runtime over SQLite, or over memory for `--ephemeral`.
pub async fn open_runtime(config: &AppConfig, ephemeral: bool) -> Result<AgentRuntime> {
    let sessions: Arc<dyn SessionRepository> = if ephemeral {
        Arc::new(InMemorySessionRepository::default())
    } else {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .with_context(|| format!("failed to open session store `{}`", config.database.url))?;
        migrations::run_pending(&pool).await.context("failed to apply migrations")?;
        Arc::new(SqlSessionRepository::new(pool))
    };

    AgentRuntime::from_config(config, sessions)
}

/// Reads user lines from `input` until EOF, `/quit` or `/end`, streaming
/// each reply to `output`.
pub async fn chat_loop<R, W>(
    agent: &AgentRuntime,
    session: Option<SessionId>,
    input: R,
    output: &mut W,
) -> Result<ChatReport, ChatError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session_id = match session {
        Some(id) => {
            let existing = agent.session(&id).await?;
            write_line(output, &format!("Resuming {id}.")).await?;
            write_line(output, &agent.form_status(&id).await?).await?;
            existing.id
        }
        None => {
            let started = agent.start_session().await?;
            write_line(output, &started.greeting).await?;
            started.id
        }
    };
    write_line(output, HELP).await?;

    let mut lines = input.lines();
    let mut turns = 0;
    let mut ended = false;

    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();

        match message {
            "" => continue,
            "/quit" | "/exit" => break,
            "/end" => {
                agent.end_session(&session_id).await?;
                ended = true;
                break;
            }
            "/help" => write_line(output, HELP).await?,
            "/summary" => write_line(output, &agent.form_status(&session_id).await?).await?,
            "/transcript" => {
                for entry in agent.transcript(&session_id).await? {
                    write_line(output, &format!("{}: {}", entry.role.as_str(), entry.text)).await?;
                }
            }
            _ => {
                let mut stream = agent.stream_message(&session_id, message).await?;
                while let Some(chunk) = stream.chunks.recv().await {
                    if chunk.done {
                        output.write_all(b"\n").await?;
                    } else {
                        output.write_all(chunk.text.as_bytes()).await?;
                    }
                    output.flush().await?;
                }
                turns += 1;
            }
        }
    }

    info!(event_name = "chat.closed", session_id = %session_id, turns, ended, "chat closed");
    Ok(ChatReport { session_id, turns, ended })
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn chat_failure(error: ChatError) -> CommandResult {
    match error {
        ChatError::Application(error) => {
            let interface: InterfaceError = error.into_interface("chat");
            let error_class = match interface {
                InterfaceError::NotFound { .. } => "session_not_found",
                InterfaceError::BadRequest { .. } => "bad_request",
                InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
                InterfaceError::Internal { .. } => "internal",
            };
            CommandResult::failure(
                "chat",
                error_class,
                format!("{} ({interface})", interface.user_message()),
                5,
            )
        }
        ChatError::Io(error) => CommandResult::failure("chat", "io", error.to_string(), 6),
    }
}

fn describe(report: &ChatReport, ephemeral: bool) -> String {
    if report.ended || ephemeral {
        format!("chat ended after {} turn(s)", report.turns)
    } else {
        format!(
            "chat saved after {} turn(s); resume with `intake chat --session {}`",
            report.turns, report.session_id
        )
    }
}

async fn write_line<W>(output: &mut W, text: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use intake_core::config::AppConfig;
    use intake_core::domain::session::SessionId;
    use intake_core::errors::ApplicationError;

    use super::{chat_loop, open_runtime, ChatError};

    #[tokio::test]
    async fn scripted_chat_collects_the_form() {
        let agent = open_runtime(&AppConfig::default(), true).await.expect("runtime");
        let input: &[u8] =
            b"budget is 500k, looking in Chicago\n\na 300 square meters office\n/summary\n/quit\n";
        let mut output = Vec::new();

        let report = chat_loop(&agent, None, input, &mut output).await.expect("chat");

        let text = String::from_utf8(output).expect("utf8");
        assert_eq!(report.turns, 2);
        assert!(!report.ended);
        assert!(text.contains("How much space do you need?"));
        assert!(text.contains("Great, I have everything I need:"));
        assert!(text.contains("All required fields are complete!"));

        let session = agent.session(&report.session_id).await.expect("kept for resume");
        assert_eq!(session.transcript.len(), 4);
    }

    #[tokio::test]
    async fn end_discards_the_session() {
        let agent = open_runtime(&AppConfig::default(), true).await.expect("runtime");
        let input: &[u8] = b"budget is 500k\n/transcript\n/end\n";
        let mut output = Vec::new();

        let report = chat_loop(&agent, None, input, &mut output).await.expect("chat");

        let text = String::from_utf8(output).expect("utf8");
        assert!(report.ended);
        assert!(text.contains("user: budget is 500k"));
        assert!(matches!(
            agent.session(&report.session_id).await,
            Err(ApplicationError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn resuming_an_unknown_session_fails() {
        let agent = open_runtime(&AppConfig::default(), true).await.expect("runtime");
        let input: &[u8] = b"hello\n";
        let mut output = Vec::new();

        let error = chat_loop(
            &agent,
            Some(SessionId("session_00c0ffee".to_string())),
            input,
            &mut output,
        )
        .await
        .expect_err("unknown session");

        assert!(matches!(error, ChatError::Application(ApplicationError::SessionNotFound(_))));
        assert_eq!(error.to_string(), "session not found: session_00c0ffee");
    }
}
