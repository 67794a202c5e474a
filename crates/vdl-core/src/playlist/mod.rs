//! HLS media playlists: validation, loading (remote or local), and parsing.

mod parse;

pub use parse::{parse_playlist, SegmentMeta};

use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::{flatten_retry, is_hls_content_type, FetchError, RequestTemplate};
use crate::retry::{run_with_retry, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    /// The URL answered with something other than a playlist; it has likely expired.
    #[error("not a valid playlist (content type {0:?})")]
    InvalidContentType(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("playlist parse error: {0}")]
    Parse(String),
    #[error("read local playlist {path}: {source}")]
    Local {
        path: String,
        source: std::io::Error,
    },
    #[error("playlist has no segments")]
    Empty,
}

/// Where a playlist reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Remote(Url),
    Local(std::path::PathBuf),
}

fn locate(link: &str) -> Result<Location, PlaylistError> {
    if let Ok(url) = Url::parse(link) {
        return match url.scheme() {
            "http" | "https" => Ok(Location::Remote(url)),
            "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| PlaylistError::Parse(format!("bad file url {}", link))),
            other => Err(PlaylistError::Parse(format!("unsupported scheme {}", other))),
        };
    }
    Ok(Location::Local(Path::new(link).to_path_buf()))
}

/// Fetch and parse the playlist behind `tmpl`.
///
/// Remote playlists must carry an HLS content type, otherwise
/// `InvalidContentType` is returned without retrying. Transport errors and
/// non-2xx statuses are retried per `policy`. Local files (`file://` or a
/// plain path) skip validation.
pub async fn load_playlist(
    client: &reqwest::Client,
    tmpl: &RequestTemplate,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<SegmentMeta>, PlaylistError> {
    let segments = match locate(&tmpl.url)? {
        Location::Local(path) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| PlaylistError::Local {
                    path: path.display().to_string(),
                    source,
                })?;
            let abs = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(&path))
                    .unwrap_or_else(|_| path.clone())
            };
            let base = Url::from_file_path(&abs)
                .map_err(|_| PlaylistError::Parse(format!("bad path {}", abs.display())))?;
            parse_playlist(&text, &base)?
        }
        Location::Remote(url) => {
            let (content_type, text) = flatten_retry(
                run_with_retry(policy, cancel, "playlist", |_| async move {
                    let resp = tmpl.get(client)?.send().await?;
                    let status = resp.status();
                    if !status.is_success() {
                        return Err(FetchError::Http(status.as_u16()));
                    }
                    let content_type = resp
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    if !is_hls_content_type(&content_type) {
                        return Ok((content_type, String::new()));
                    }
                    Ok((content_type, resp.text().await?))
                })
                .await,
            )?;
            if !is_hls_content_type(&content_type) {
                return Err(PlaylistError::InvalidContentType(content_type));
            }
            parse_playlist(&text, &url)?
        }
    };
    if segments.is_empty() {
        return Err(PlaylistError::Empty);
    }
    Ok(segments)
}
