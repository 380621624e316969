//! Terminal output for status and trace messages.
//!
//! Status chrome goes to stderr; assistant transcripts go to stdout so they
//! can be piped. `RenderSink` is the contract consumed by the agent and app
//! layers; tests substitute a recording sink.

use crossterm::style::{Color, Stylize};
use std::io::{self, Write};

const INDENT: &str = "  ";
const LABEL_AGENT: &str = "butler";
const LABEL_WARNING: &str = "warning:";
const LABEL_ERROR: &str = "error:";
const PROMPT_SYMBOL: &str = ">";
const PROMPT_PLAIN: &str = "Query: ";
const GLYPH_TOOL_CALL: &str = "▶";
const GLYPH_TOOL_CALL_PLAIN: &str = ">";
const GLYPH_TOOL_RESULT: &str = "\u{2190}";
const GLYPH_TOOL_RESULT_PLAIN: &str = "<-";
const TOOL_PREVIEW_CHARS: usize = 120;

/// Injectable rendering interface used by orchestration code.
pub trait RenderSink: Send + Sync {
    /// Render the interactive prompt indicator.
    fn prompt(&self);
    /// Render one assistant transcript destined for stdout.
    fn assistant_message(&self, content: &str);
    /// Render a session/model header line.
    fn header(&self, model: &str);
    /// Render a tool invocation summary.
    fn tool_call(&self, name: &str, args: &str);
    /// Render a tool result summary.
    fn tool_result(&self, result: &str);
    /// Render a titled section divider.
    fn section(&self, title: &str);
    /// Render one key/value field row.
    fn field(&self, key: &str, value: &str);
    /// Render activity/lifecycle text.
    fn activity(&self, text: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Handles all terminal output formatting.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    /// Whether ANSI color/style output is enabled.
    color: bool,
}

impl Renderer {
    /// Create a renderer with optional color output.
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl RenderSink for Renderer {
    fn prompt(&self) {
        if self.color {
            eprint!("{} ", PROMPT_SYMBOL.with(Color::Cyan).bold());
        } else {
            eprint!("{PROMPT_PLAIN}");
        }
        let _ = io::stderr().flush();
    }

    fn assistant_message(&self, content: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "\n{}", content.trim_end());
        let _ = out.flush();
    }

    fn header(&self, model: &str) {
        if self.color {
            eprintln!(
                "{} {}",
                LABEL_AGENT.with(Color::Cyan).bold(),
                model.with(Color::DarkGrey),
            );
        } else {
            eprintln!("{LABEL_AGENT} ({model})");
        }
    }

    fn tool_call(&self, name: &str, args: &str) {
        let preview = truncate_single_line(args, TOOL_PREVIEW_CHARS);
        if self.color {
            eprintln!(
                "{INDENT}{} {}({})",
                GLYPH_TOOL_CALL.with(Color::Yellow),
                name.with(Color::Yellow).bold(),
                preview.with(Color::DarkGrey),
            );
        } else {
            eprintln!("{INDENT}{GLYPH_TOOL_CALL_PLAIN} {name}({preview})");
        }
    }

    fn tool_result(&self, result: &str) {
        let preview = truncate_single_line(result, TOOL_PREVIEW_CHARS);
        if self.color {
            eprintln!(
                "{INDENT}{} {}",
                GLYPH_TOOL_RESULT.with(Color::Green),
                preview.with(Color::DarkGrey),
            );
        } else {
            eprintln!("{INDENT}{GLYPH_TOOL_RESULT_PLAIN} {preview}");
        }
    }

    fn section(&self, title: &str) {
        if self.color {
            eprintln!("\n{}", title.with(Color::Cyan).bold());
        } else {
            eprintln!("\n{title}");
        }
    }

    fn field(&self, key: &str, value: &str) {
        if self.color {
            eprintln!(
                "{INDENT}{} {}",
                format!("{key}:").with(Color::DarkGrey),
                value.with(Color::White),
            );
        } else {
            eprintln!("{INDENT}{key}: {value}");
        }
    }

    fn activity(&self, text: &str) {
        if self.color {
            eprintln!("{INDENT}{}", text.with(Color::DarkGrey));
        } else {
            eprintln!("{INDENT}{text}");
        }
    }

    fn warn(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", LABEL_WARNING.with(Color::Yellow).bold());
        } else {
            eprintln!("{LABEL_WARNING} {msg}");
        }
    }

    fn error(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", LABEL_ERROR.with(Color::Red).bold());
        } else {
            eprintln!("{LABEL_ERROR} {msg}");
        }
    }
}

/// Collapse whitespace runs and clip to `max_chars`, marking the cut.
pub fn truncate_single_line(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &collapsed[..idx]),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_collapses_newlines() {
        assert_eq!(truncate_single_line("a\n  b\tc", 20), "a b c");
    }

    #[test]
    fn truncate_clips_on_char_boundary() {
        assert_eq!(truncate_single_line("ééééé", 3), "ééé…");
        assert_eq!(truncate_single_line("short", 5), "short");
    }
}
