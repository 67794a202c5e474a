//! Merge tool implementations: ffmpeg and plain byte concatenation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::MergeError;

/// External concatenation/muxing collaborator.
#[async_trait]
pub trait MergeTool: Send + Sync {
    /// Concatenate `inputs` in order into `output` (overwriting it).
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MergeError>;

    /// Combine separate streams (video, audio) into one container.
    async fn mux(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MergeError>;

    /// Turn the fully merged stream into the final output. Defaults to a rename.
    async fn finalize(&self, merged: &Path, output: &Path) -> Result<(), MergeError> {
        tokio::fs::rename(merged, output).await.map_err(MergeError::Io)
    }

    fn name(&self) -> &'static str;
}

/// ffmpeg via the `concat:` protocol with stream copy.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    program: String,
}

impl FfmpegTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<(), MergeError> {
        tracing::debug!(program = %self.program, ?args, "running merge tool");
        let out = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MergeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
            return Err(MergeError::ToolFailed {
                status: out.status.code(),
                stderr: tail,
            });
        }
        Ok(())
    }
}

fn lossy(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

#[async_trait]
impl MergeTool for FfmpegTool {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MergeError> {
        if inputs.is_empty() {
            return Err(MergeError::NoInputs);
        }
        let joined = inputs.iter().map(|p| lossy(p)).collect::<Vec<_>>().join("|");
        let args = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            format!("concat:{}", joined),
            "-c".into(),
            "copy".into(),
            lossy(output),
        ];
        self.run(args).await
    }

    async fn mux(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MergeError> {
        if inputs.is_empty() {
            return Err(MergeError::NoInputs);
        }
        let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
        for input in inputs {
            args.push("-i".into());
            args.push(lossy(input));
        }
        args.extend(["-c:v", "copy", "-c:a", "copy"].map(String::from));
        args.push(lossy(output));
        self.run(args).await
    }

    /// Remux the merged transport stream into the output container.
    async fn finalize(&self, merged: &Path, output: &Path) -> Result<(), MergeError> {
        self.concat(&[merged.to_path_buf()], output).await?;
        tokio::fs::remove_file(merged).await.map_err(MergeError::Io)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Byte-for-byte concatenation. Valid for MPEG-TS segments and init+fragment pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConcat;

#[async_trait]
impl MergeTool for NativeConcat {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MergeError> {
        if inputs.is_empty() {
            return Err(MergeError::NoInputs);
        }
        let mut out = tokio::fs::File::create(output).await.map_err(MergeError::Io)?;
        for input in inputs {
            let mut src = tokio::fs::File::open(input).await.map_err(MergeError::Io)?;
            tokio::io::copy(&mut src, &mut out).await.map_err(MergeError::Io)?;
        }
        out.flush().await.map_err(MergeError::Io)?;
        Ok(())
    }

    async fn mux(&self, _inputs: &[PathBuf], _output: &Path) -> Result<(), MergeError> {
        Err(MergeError::Unsupported("native merge cannot mux separate streams"))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
