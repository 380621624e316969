//! Core tool-use loop.
//!
//! The [`Agent`] drives one query at a time: it sends the turn history and
//! tool catalog to the model, executes the first tool invocation of each
//! reply through the catalog, folds the result back into the conversation,
//! and loops until a reply carries no invocation (or the iteration cap is
//! reached).

use crate::api::ModelClient;
use crate::config::Config;
use crate::error::AgentError;
use crate::prompt::{priming_message, render_task_prompt};
use crate::render::RenderSink;
use crate::tools::catalog::ToolCatalog;
use crate::tools::ToolOutput;
use crate::types::{ContentBlock, Message, MessagesRequest, ToolDescriptor, ToolResultContent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod conversation;

pub use conversation::Conversation;

/// Model request settings for the loop.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Rendered system prompt; `None` sends no system prompt.
    pub system_prompt: Option<String>,
    /// Safety cap on model round-trips per query.
    pub max_iterations: usize,
}

impl AgentSettings {
    pub fn from_config(config: &Config, system_prompt: Option<String>) -> Self {
        Self {
            model: config.api.model.clone(),
            max_tokens: config.api.max_tokens,
            temperature: config.api.temperature,
            system_prompt,
            max_iterations: config.agent.max_iterations.max(1),
        }
    }
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
struct Invocation {
    id: String,
    name: String,
    input: Value,
}

/// A model reply split into the parts the loop acts on.
#[derive(Debug, Default)]
struct ReplyPlan {
    texts: Vec<String>,
    invocation: Option<Invocation>,
    /// Invocations after the first, which are not executed.
    dropped: Vec<Invocation>,
}

impl ReplyPlan {
    fn from_blocks(blocks: Vec<ContentBlock>) -> Self {
        let mut plan = Self::default();
        for block in blocks {
            match block {
                ContentBlock::Text { text } => plan.texts.push(text),
                ContentBlock::ToolUse { id, name, input } => {
                    let invocation = Invocation { id, name, input };
                    if plan.invocation.is_none() {
                        plan.invocation = Some(invocation);
                    } else {
                        plan.dropped.push(invocation);
                    }
                }
                _ => {}
            }
        }
        plan
    }

    /// Assistant turn as recorded in history: text blocks plus the executed
    /// invocation only.
    fn assistant_turn(&self) -> Message {
        let mut content: Vec<ContentBlock> = self
            .texts
            .iter()
            .map(|text| ContentBlock::text(text.clone()))
            .collect();
        if let Some(invocation) = &self.invocation {
            content.push(ContentBlock::ToolUse {
                id: invocation.id.clone(),
                name: invocation.name.clone(),
                input: invocation.input.clone(),
            });
        }
        Message::assistant(content)
    }
}

/// The conversation loop over a model client and a tool catalog.
pub struct Agent {
    /// Model client implementation (HTTP client in prod, mocks in tests).
    client: Box<dyn ModelClient>,
    catalog: ToolCatalog,
    settings: AgentSettings,
    /// Live tool-call echo; `None` keeps the loop silent.
    renderer: Option<Arc<dyn RenderSink>>,
}

impl Agent {
    pub fn new(client: Box<dyn ModelClient>, catalog: ToolCatalog, settings: AgentSettings) -> Self {
        Self {
            client,
            catalog,
            settings,
            renderer: None,
        }
    }

    /// Echo tool calls and results through `renderer` while queries run.
    pub fn with_renderer(mut self, renderer: Arc<dyn RenderSink>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn catalog_mut(&mut self) -> &mut ToolCatalog {
        &mut self.catalog
    }

    /// The current prefixed tool list, rebuilt if providers changed.
    pub async fn tools(&mut self) -> Vec<ToolDescriptor> {
        self.catalog.tools().await.to_vec()
    }

    /// Run one query to completion and return the transcript.
    ///
    /// Transcript lines are the model's text blocks in order, interleaved
    /// with `[Calling ...]`, `[Tool result: ...]` and `[Error: ...]` lines
    /// for each executed invocation.
    pub async fn process_query(&mut self, query: &str) -> Result<String, AgentError> {
        let mut conversation = Conversation::new(query);
        let mut transcript: Vec<String> = Vec::new();

        for iteration in 1..=self.settings.max_iterations {
            let tools = self.catalog.tools().await.to_vec();
            let request = MessagesRequest {
                model: self.settings.model.clone(),
                max_tokens: self.settings.max_tokens,
                system: self.settings.system_prompt.clone(),
                messages: conversation.messages().to_vec(),
                tools,
                temperature: self.settings.temperature,
            };
            debug!(iteration, turns = conversation.len(), "calling model");
            let response = self.client.send(&request).await?;

            let plan = ReplyPlan::from_blocks(response.content);
            transcript.extend(plan.texts.iter().cloned());

            let Some(invocation) = plan.invocation.clone() else {
                if !plan.texts.is_empty() {
                    conversation.push(plan.assistant_turn());
                }
                return Ok(transcript.join("\n"));
            };

            let mut output = self.execute(&invocation, &mut transcript).await;
            if !plan.dropped.is_empty() {
                let names: Vec<&str> = plan.dropped.iter().map(|i| i.name.as_str()).collect();
                warn!(
                    executed = %invocation.name,
                    dropped = ?names,
                    "reply requested several tool calls; only the first was run"
                );
                output
                    .content
                    .push(ToolResultContent::text(dropped_invocations_note(&names)));
            }

            conversation.push(plan.assistant_turn());
            conversation.push(Message::tool_result(
                invocation.id,
                output.content,
                output.is_error,
            ));
        }

        Err(AgentError::MaxIterationsReached)
    }

    /// Wrap `task` in the task prompt (with the tool listing) and run it.
    pub async fn execute_task(&mut self, task: &str) -> Result<String, AgentError> {
        let tools = self.tools().await;
        let prompt = render_task_prompt(&tools, task);
        self.process_query(&prompt).await
    }

    /// Introduce the tool list to the model ahead of interactive queries.
    pub async fn prime_with_tools(&mut self) -> Result<String, AgentError> {
        let tools = self.tools().await;
        self.process_query(&priming_message(&tools)).await
    }

    /// Release provider resources (live sessions, child processes).
    pub async fn shutdown(&self) {
        self.catalog.shutdown().await;
    }

    async fn execute(&mut self, invocation: &Invocation, transcript: &mut Vec<String>) -> ToolOutput {
        let route = match self.catalog.lookup(&invocation.name).await {
            Ok(route) => route,
            Err(err) => {
                let message = err.to_string();
                self.render_error(&message);
                transcript.push(format!("[Error: {message}]"));
                return ToolOutput::failure(message);
            }
        };

        info!(
            provider = %route.provider,
            tool = %route.native_name,
            "calling tool"
        );
        transcript.push(format!(
            "[Calling {} tool {} with args {}]",
            route.provider, route.native_name, invocation.input
        ));
        if let Some(renderer) = &self.renderer {
            renderer.tool_call(&invocation.name, &invocation.input.to_string());
        }

        match self
            .catalog
            .call_route(&route, invocation.input.clone())
            .await
        {
            Ok(output) => {
                let rendered = output.render_text();
                if let Some(renderer) = &self.renderer {
                    renderer.tool_result(&rendered);
                }
                transcript.push(format!("[Tool result: {rendered}]"));
                output
            }
            Err(err) => {
                let message = format!("Error calling tool {}: {err}", invocation.name);
                warn!(tool = %invocation.name, error = %err, "tool call failed");
                self.render_error(&message);
                transcript.push(format!("[Error: {message}]"));
                ToolOutput::failure(message)
            }
        }
    }

    fn render_error(&self, message: &str) {
        if let Some(renderer) = &self.renderer {
            renderer.warn(message);
        }
    }
}

fn dropped_invocations_note(names: &[&str]) -> String {
    format!(
        "Note: only the first tool call in a reply is executed. Not executed: {}. Request them again one at a time if they are still needed.",
        names.join(", ")
    )
}
