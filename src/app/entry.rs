//! Application entry orchestration for the butler CLI.

use crate::app::exec_mode::run_task;
use crate::app::repl_loop::run_interactive;
use crate::app::AppContext;
use crate::cli::Args;
use butler::config::{load_config, Config};
use butler::render::{RenderSink, Renderer};
use std::future::Future;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

/// Exit statuses as a shell would report SIGINT and SIGTERM.
const EXIT_INTERRUPTED: i32 = 130;
const EXIT_TERMINATED: i32 = 143;

/// Signal that cut a run short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopSignal {
    Interrupt,
    Terminate,
}

impl StopSignal {
    fn exit_code(self) -> i32 {
        match self {
            Self::Interrupt => EXIT_INTERRUPTED,
            Self::Terminate => EXIT_TERMINATED,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Interrupt => "interrupted",
            Self::Terminate => "terminated",
        }
    }
}

/// Load config, build the context, run the selected mode, and tear down.
pub(crate) async fn run(args: Args) -> i32 {
    // 1) config + CLI overrides, 2) mode check, 3) providers and agent,
    // 4) run raced against SIGINT/SIGTERM, 5) shutdown on every path.
    let bootstrap_renderer = Renderer::new(!args.no_color);
    let config = match load_effective_config(&args) {
        Ok(config) => config,
        Err(msg) => {
            bootstrap_renderer.error(&msg);
            return 1;
        }
    };
    let renderer = Arc::new(Renderer::new(config.display.color));

    let task = args.task().map(str::to_string);
    if !args.interactive && task.is_none() {
        renderer.error("a task is required unless --interactive is given");
        return 2;
    }

    let mut ctx = match AppContext::build(&config, &args, renderer.clone()).await {
        Ok(ctx) => ctx,
        Err(msg) => {
            renderer.error(&msg);
            return 1;
        }
    };

    let code = tokio::select! {
        code = run_mode(&mut ctx, args.interactive, task.as_deref()) => code,
        signal = stop_signal() => {
            renderer.warn(signal.label());
            signal.exit_code()
        }
    };

    ctx.shutdown().await;
    info!(code, "butler exiting");
    code
}

async fn run_mode(ctx: &mut AppContext, interactive: bool, task: Option<&str>) -> i32 {
    if interactive {
        run_interactive(ctx, BufReader::new(tokio::io::stdin())).await;
        return 0;
    }
    let Some(task) = task else {
        return 2;
    };
    match run_task(ctx, task).await {
        Ok(()) => 0,
        Err(err) => {
            ctx.renderer.error(&err.to_string());
            1
        }
    }
}

async fn stop_signal() -> StopSignal {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    first_signal(interrupt, terminate()).await
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            warn!(error = %err, "cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

async fn first_signal<I, T>(interrupt: I, terminate: T) -> StopSignal
where
    I: Future<Output = ()>,
    T: Future<Output = ()>,
{
    tokio::select! {
        _ = interrupt => StopSignal::Interrupt,
        _ = terminate => StopSignal::Terminate,
    }
}

fn load_effective_config(args: &Args) -> Result<Config, String> {
    let loaded = load_config(args.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(source) = &loaded.source {
        info!(path = %source.display(), "loaded config");
    }
    let mut config = loaded.config;
    apply_cli_overrides(&mut config, args);
    Ok(config)
}

/// Flags win over config files and environment.
fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(model) = args.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        config.api.model = model.to_string();
    }
    if args.no_color {
        config.display.color = false;
    }
}
