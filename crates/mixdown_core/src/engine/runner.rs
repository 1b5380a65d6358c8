//! Bounded execution of external tools.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::error::{EngineError, EngineResult};

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Short tool name for messages (`/usr/bin/ffmpeg` -> `ffmpeg`).
pub fn tool_name(program: &str) -> String {
    Path::new(program)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string())
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// The child is killed when `budget` elapses or when the returned future is
/// dropped (job task aborted). A non-zero exit is returned as
/// `EngineError::Failed` carrying the captured stderr.
pub async fn run_tool(
    program: &str,
    args: &[String],
    budget: Duration,
) -> EngineResult<ToolOutput> {
    let tool = tool_name(program);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EngineError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| EngineError::io(format!("waiting for {}", tool), e))?,
        Err(_) => {
            tracing::warn!("{} exceeded {:?}, killed", tool, budget);
            return Err(EngineError::timeout(tool, budget.as_secs().max(1)));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        return Err(EngineError::failed(tool, exit_code, stderr));
    }

    Ok(ToolOutput { stdout, stderr })
}
