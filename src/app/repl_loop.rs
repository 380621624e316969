//! Interactive query loop.
//!
//! Primes the model with the tool list, then reads one query per line until
//! `quit` or end of input. A failed query is reported and the loop goes on.

use crate::app::AppContext;
use butler::build_info::startup_metadata_line;
use butler::render::RenderSink;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

const QUIT_COMMAND: &str = "quit";

/// One line of interactive input, classified.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplInput<'a> {
    Quit,
    Empty,
    Query(&'a str),
}

pub(crate) fn classify_input(line: &str) -> ReplInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        ReplInput::Empty
    } else if trimmed.eq_ignore_ascii_case(QUIT_COMMAND) {
        ReplInput::Quit
    } else {
        ReplInput::Query(trimmed)
    }
}

/// Run the interactive session over `input` (stdin in production).
pub(crate) async fn run_interactive<R>(ctx: &mut AppContext, input: R)
where
    R: AsyncBufRead + Unpin,
{
    let renderer = ctx.renderer.clone();
    renderer.header(&ctx.agent.settings().model);
    renderer.activity(&startup_metadata_line());
    renderer.activity("Type your queries or 'quit' to exit.");

    renderer.section("System prompt");
    match ctx.agent.settings().system_prompt.as_deref() {
        Some(prompt) => renderer.activity(&first_line(prompt)),
        None => renderer.activity("(none)"),
    }

    let tools = ctx.agent.tools().await;
    renderer.section("Available tools");
    for tool in &tools {
        renderer.field(&tool.name, &tool.description);
    }

    renderer.activity("Sending tool information to the model...");
    match ctx.agent.prime_with_tools().await {
        Ok(_) => renderer.activity("Ready to use the tools."),
        Err(err) => renderer.error(&format!("priming failed: {err}")),
    }

    let mut lines = input.lines();
    loop {
        renderer.prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                renderer.error(&format!("failed to read input: {err}"));
                break;
            }
        };
        match classify_input(&line) {
            ReplInput::Quit => break,
            ReplInput::Empty => continue,
            ReplInput::Query(query) => {
                debug!(chars = query.len(), "interactive query");
                match ctx.agent.process_query(query).await {
                    Ok(transcript) => renderer.assistant_message(&transcript),
                    Err(err) => renderer.error(&err.to_string()),
                }
            }
        }
    }
}

fn first_line(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().to_string();
    if lines.next().is_some() {
        format!("{first} ...")
    } else {
        first
    }
}
