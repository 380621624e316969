//! CLI argument parsing via clap.

use clap::Parser;

/// An agent that operates remote desktops over VNC with Claude.
#[derive(Debug, Parser)]
#[command(name = "butler", version, after_help = butler::build_info::HELP_BUILD_METADATA)]
pub struct Args {
    /// Task to accomplish. Required unless --interactive is given.
    pub task: Option<String>,

    /// Tool providers to load: `vnc`, `memory`, a `.py`/`.js` MCP server
    /// script, an http(s) tool-server URL, or a `[[servers]]` name.
    #[arg(
        short = 's',
        long = "server",
        num_args = 1..,
        default_value = "vnc"
    )]
    pub servers: Vec<String>,

    /// System prompt text, replacing the built-in one.
    #[arg(long = "system-prompt")]
    pub system_prompt: Option<String>,

    /// Read the system prompt from a file (wins over --system-prompt).
    #[arg(short = 'f', long = "system-prompt-file")]
    pub system_prompt_file: Option<String>,

    /// Send no system prompt (wins over both of the above).
    #[arg(short = 'n', long = "no-system-prompt")]
    pub no_system_prompt: bool,

    /// Read queries from the terminal until `quit`.
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Path to config file (default: ./butler.toml or ~/.config/butler/butler.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Override model name.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// The task for task mode, if one was given and is not blank.
    pub fn task(&self) -> Option<&str> {
        self.task.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}
