// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry kernel run as an external process.
//!
//! The executable receives the raw file on stdin and prints kernel output
//! JSON on stdout:
//!
//! ```text
//! {"success": true, "meshes": [{"name": "Body", "positions": [...],
//!   "normals": [...], "indices": [...], "color": [255, 0, 0]}]}
//! ```

use async_trait::async_trait;
use cadlite_core::{Error, GeometryKernel, KernelOutput, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandKernel {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandKernel {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Parse a whitespace-separated command line such as `occt-tess --json`
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts.map(str::to_string)))
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl GeometryKernel for CommandKernel {
    async fn tessellate(&self, bytes: &[u8]) -> Result<KernelOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Kernel(format!("failed to start {}: {}", self.program.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Kernel("kernel stdin unavailable".to_string()))?;

        // Feed stdin while stdout drains so large outputs cannot fill the pipe
        let input = bytes.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Kernel(format!("timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| Error::Kernel(e.to_string()))?;

        if let Ok(Err(e)) = writer.await {
            tracing::debug!(error = %e, "Kernel closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Kernel(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Kernel(format!("invalid kernel output: {}", e)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandKernel {
        CommandKernel::new("sh").with_args(["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_decodes_stdout() {
        let kernel = shell(
            r#"cat > /dev/null; echo '{"success":true,"meshes":[{"positions":[[0,0,0],[1,0,0],[0,1,0]],"indices":[0,1,2]}]}'"#,
        );
        let output = kernel.tessellate(b"ISO-10303-21;").await.unwrap();
        assert!(output.success);
        assert_eq!(output.meshes.len(), 1);
        assert_eq!(output.meshes[0].positions.clone().into_flat().len(), 9);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_kernel_error() {
        let kernel = shell("cat > /dev/null; echo bad >&2; exit 3");
        let err = kernel.tessellate(b"x").await.unwrap_err();
        assert!(matches!(err, Error::Kernel(ref m) if m.contains("bad")));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let kernel = CommandKernel::new("/nonexistent/kernel");
        assert!(matches!(kernel.tessellate(b"x").await, Err(Error::Kernel(_))));
    }

    #[test]
    fn test_from_command_line() {
        let kernel = CommandKernel::from_command_line("tess --json -q").unwrap();
        assert_eq!(kernel.program, PathBuf::from("tess"));
        assert_eq!(kernel.args, vec!["--json", "-q"]);
        assert!(CommandKernel::from_command_line("   ").is_none());
    }
}
