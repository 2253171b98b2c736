//! A [`super::ShellClient`] that runs commands via the host's `sh -c`.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{PipelineError, Result};

use super::{ShellClient, ShellOutput};

#[derive(Debug, Clone, Default)]
pub struct LocalShellClient;

impl LocalShellClient {
    pub fn new() -> Self {
        LocalShellClient
    }
}

#[async_trait]
impl ShellClient for LocalShellClient {
    async fn run(
        &self,
        command: &str,
        cwd: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<ShellOutput> {
        debug!(command, cwd, "running shell command");
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in env {
            cmd.env(k, v);
        }
        let output = cmd
            .output()
            .await
            .map_err(|e| PipelineError::ClientError(format!("failed to spawn shell: {e}")))?;
        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout_and_status() {
        let client = LocalShellClient::new();
        let out = client.run("echo hi", None, &HashMap::new()).await.unwrap();
        assert_eq!(out.stdout.trim(), "hi");
        assert!(out.success());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_errored() {
        let client = LocalShellClient::new();
        let out = client.run("exit 3", None, &HashMap::new()).await.unwrap();
        assert_eq!(out.status, 3);
        assert!(!out.success());
    }
}
