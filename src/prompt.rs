//! Prompt templating helpers.
//!
//! The built-in prompt texts live in template files and are rendered from
//! one code path with runtime parameters (tool listing, task, and optional
//! operator instructions).

use crate::types::ToolDescriptor;
use std::collections::BTreeMap;

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("templates/system_prompt.template");
const TASK_PROMPT_TEMPLATE: &str = include_str!("templates/task_prompt.template");

/// Where the system prompt for a run comes from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum SystemPrompt {
    /// The built-in prompt, optionally followed by operator instructions.
    #[default]
    BuiltIn,
    BuiltInWith(String),
    /// Operator text replacing the built-in prompt entirely.
    Custom(String),
    /// Send no system prompt.
    Disabled,
}

impl SystemPrompt {
    /// Render the text sent with every model request, if any.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::BuiltIn => Some(render_system_prompt(None)),
            Self::BuiltInWith(extra) => Some(render_system_prompt(Some(extra))),
            Self::Custom(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Disabled => None,
        }
    }
}

/// Render the built-in system prompt.
pub fn render_system_prompt(custom_instructions: Option<&str>) -> String {
    let mut vars = BTreeMap::<&str, String>::new();
    vars.insert(
        "CUSTOM_INSTRUCTIONS_BLOCK",
        render_custom_instructions(custom_instructions),
    );
    normalize_blank_lines(&render_template(SYSTEM_PROMPT_TEMPLATE, &vars))
}

/// Render the task prompt wrapping `task` with the catalog listing.
pub fn render_task_prompt(tools: &[ToolDescriptor], task: &str) -> String {
    let mut vars = BTreeMap::<&str, String>::new();
    vars.insert("AVAILABLE_TOOLS", tool_listing(tools));
    vars.insert("USER_TASK", task.trim().to_string());
    normalize_blank_lines(&render_template(TASK_PROMPT_TEMPLATE, &vars))
}

/// One `- name: description` line per tool.
pub fn tool_listing(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "- none".to_string();
    }
    tools
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First message of an interactive session, introducing the tools.
pub fn priming_message(tools: &[ToolDescriptor]) -> String {
    format!(
        "Here are the available tools you can use:\n{}",
        tool_listing(tools)
    )
}

fn render_template(template: &str, vars: &BTreeMap<&str, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{key}}}}}");
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}

fn render_custom_instructions(custom: Option<&str>) -> String {
    let Some(custom) = custom.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    format!("Additional operator instructions:\n{custom}")
}

fn normalize_blank_lines(text: &str) -> String {
    let mut out = String::new();
    let mut previous_blank = false;

    for line in text.lines() {
        let is_blank = line.trim().is_empty();
        if is_blank && previous_blank {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line.trim_end());
        previous_blank = is_blank;
    }

    out.trim().to_string()
}
