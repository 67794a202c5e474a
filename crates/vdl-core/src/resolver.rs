//! Resolver interface for turning source references (page URLs) into direct
//! media links.
//!
//! The engines only see the links; how they are obtained (pass-through, an
//! external extractor process) is up to the `Resolver` implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;

use crate::retry::{Classify, ErrorKind};
use crate::task::link;

/// Output substrings that mark a resolver failure as a transient network issue.
const NETWORK_MARKERS: [&str; 2] = ["network", "timed out"];

/// Direct links plus the headers needed to fetch them.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMedia {
    /// More than one link means separate streams (e.g. video and audio).
    pub links: Vec<String>,
    pub headers: HashMap<String, String>,
}

impl ResolvedMedia {
    pub fn new(links: Vec<String>) -> Self {
        Self {
            links,
            headers: HashMap::new(),
        }
    }

    /// All links packed into one task link.
    pub fn joined(&self) -> String {
        link::join_links(&self.links)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Transient; worth retrying.
    #[error("network issue while resolving: {0}")]
    Network(String),
    #[error("resolve failed: {0}")]
    Other(String),
}

impl ResolveError {
    /// Classify free-form resolver output.
    pub fn from_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let lower = msg.to_ascii_lowercase();
        if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
            ResolveError::Network(msg)
        } else {
            ResolveError::Other(msg)
        }
    }
}

impl Classify for ResolveError {
    fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::Network(_) => ErrorKind::Connection,
            ResolveError::Other(_) => ErrorKind::Fatal,
        }
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, source: &str) -> Result<ResolvedMedia, ResolveError>;
}

/// Treats the source as the media link (one link, or several packed with the separator).
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectResolver;

#[async_trait]
impl Resolver for DirectResolver {
    async fn resolve(&self, source: &str) -> Result<ResolvedMedia, ResolveError> {
        let links: Vec<String> = link::split_links(source)
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if links.is_empty() {
            return Err(ResolveError::Other("empty source".to_string()));
        }
        Ok(ResolvedMedia::new(links))
    }
}

/// Runs an external extractor with the source URL appended; one link per stdout line.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: String,
    args: Vec<String>,
}

impl CommandResolver {
    /// `argv[0]` is the program. Returns None for an empty command.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl Resolver for CommandResolver {
    async fn resolve(&self, source: &str) -> Result<ResolvedMedia, ResolveError> {
        tracing::debug!(program = %self.program, source, "running resolver");
        let out = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolveError::Other(format!("spawn {}: {}", self.program, e)))?;
        let stdout = String::from_utf8_lossy(&out.stdout);
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(ResolveError::from_message(format!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                stderr.trim()
            )));
        }
        let links: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if links.is_empty() {
            return Err(ResolveError::Other(format!("{} printed no links", self.program)));
        }
        Ok(ResolvedMedia::new(links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn direct_passes_links_through() {
        let packed = link::join_links(&["https://a/v.mp4", "https://a/a.mp4"]);
        let r = DirectResolver.resolve(&packed).await.unwrap();
        assert_eq!(r.links, vec!["https://a/v.mp4", "https://a/a.mp4"]);
        assert_eq!(r.joined(), packed);
        assert!(DirectResolver.resolve("  ").await.is_err());
    }

    #[test]
    fn network_messages_are_retryable() {
        assert!(matches!(
            ResolveError::from_message("ERROR: Network is unreachable"),
            ResolveError::Network(_)
        ));
        assert!(ResolveError::from_message("read timed out").kind().is_retryable());
        assert_eq!(ResolveError::from_message("unsupported site").kind(), ErrorKind::Fatal);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_reads_one_link_per_line() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "echo \"$0\"; echo https://cdn/audio.m4a".to_string()];
        let r = CommandResolver::new(&argv).unwrap();
        let got = r.resolve("https://cdn/video.mp4").await.unwrap();
        assert_eq!(got.links, vec!["https://cdn/video.mp4", "https://cdn/audio.m4a"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_failure_is_classified() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "echo 'connection timed out' >&2; exit 1".to_string()];
        let r = CommandResolver::new(&argv).unwrap();
        assert!(matches!(r.resolve("x").await, Err(ResolveError::Network(_))));
        assert!(CommandResolver::new(&[]).is_none());
    }
}
