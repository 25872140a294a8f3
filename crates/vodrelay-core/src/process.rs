//! External process helpers.
//!
//! Every tool this system drives (rclone, ffmpeg, the uploader) is an
//! external executable. Long-running invocations stream their output
//! line-by-line so the operator sees progress as it happens; the transcript
//! is also collected for result parsing. All invocations are synchronous
//! from the pipeline's point of view: the caller awaits process exit.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::RelayResult;

/// Spawn the command, echo stdout and stderr lines as they arrive, and
/// return the exit status together with the collected transcript.
pub async fn run_streaming(mut cmd: Command, tool: &str) -> RelayResult<(ExitStatus, String)> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out_lines = async {
        let mut collected = Vec::new();
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    tracing::info!(tool, "{line}");
                }
                collected.push(line);
            }
        }
        collected
    };
    let err_lines = async {
        let mut collected = Vec::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    tracing::info!(tool, "{line}");
                }
                collected.push(line);
            }
        }
        collected
    };

    let (mut transcript, err_transcript) = tokio::join!(out_lines, err_lines);
    let status = child.wait().await?;

    transcript.extend(err_transcript);
    Ok((status, transcript.join("\n")))
}

/// Run to completion without echoing; returns status, stdout and stderr.
pub async fn run_quiet(mut cmd: Command) -> RelayResult<(ExitStatus, String, String)> {
    let output = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    Ok((
        output.status,
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}
