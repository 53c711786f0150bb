//! Thin wrapper over `tokio::process::Command` shared by the CLI-backed
//! adapters (git, tmux, gh, hook scripts).

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` to completion, capturing its output.
///
/// The child is killed if the returned future is dropped, so callers can
/// bound it with `tokio::time::timeout`.
pub async fn run<I, S>(program: &str, args: I, cwd: Option<&Path>) -> std::io::Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command.output().await?;
    let result = CommandOutput {
        success: output.status.success(),
        status: output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string()),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };
    debug!(program, success = result.success, status = %result.status, "Command finished");
    Ok(result)
}

/// Whether `program` can be spawned and exits successfully with `args`.
pub async fn tool_available(program: &str, args: &[&str]) -> bool {
    matches!(run(program, args, None).await, Ok(out) if out.success)
}
