//! One-shot task mode.

use crate::app::AppContext;
use butler::error::AgentError;
use butler::render::RenderSink;

/// Run `task` through the task prompt and print the transcript.
pub(crate) async fn run_task(ctx: &mut AppContext, task: &str) -> Result<(), AgentError> {
    ctx.renderer.header(&ctx.agent.settings().model);
    ctx.renderer.activity(&format!("Executing task: {task}"));
    let transcript = ctx.agent.execute_task(task).await?;
    ctx.renderer.assistant_message(&transcript);
    Ok(())
}
