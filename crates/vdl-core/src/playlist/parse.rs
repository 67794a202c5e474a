//! Line-oriented media playlist parsing.

use url::Url;

use super::PlaylistError;

const EXT_X_MAP: &str = "#EXT-X-MAP:";

/// One playlist entry in merge order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMeta {
    pub url: String,
    /// Init segment to prepend (set by the nearest preceding `#EXT-X-MAP`).
    pub head_url: Option<String>,
    /// 1-based position in the playlist; defines merge order.
    pub index: usize,
}

/// `URI` attribute of an `#EXT-X-MAP:` line.
fn map_uri(line: &str) -> Option<&str> {
    let attrs = line.strip_prefix(EXT_X_MAP)?;
    let start = attrs.find("URI=")? + "URI=".len();
    let rest = &attrs[start..];
    match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next(),
        None => rest.split(',').next(),
    }
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

fn resolve(base: &Url, reference: &str) -> Result<String, PlaylistError> {
    base.join(reference)
        .map(String::from)
        .map_err(|e| PlaylistError::Parse(format!("bad segment uri {:?}: {}", reference, e)))
}

/// Parse playlist `text`, resolving relative URIs against `base` (the playlist URL).
pub fn parse_playlist(text: &str, base: &Url) -> Result<Vec<SegmentMeta>, PlaylistError> {
    let mut out = Vec::new();
    let mut head_url: Option<String> = None;
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(EXT_X_MAP) {
            match map_uri(line) {
                Some(uri) => head_url = Some(resolve(base, uri)?),
                None => tracing::warn!(line, "EXT-X-MAP without URI ignored"),
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        out.push(SegmentMeta {
            url: resolve(base, line)?,
            head_url: head_url.clone(),
            index: out.len() + 1,
        });
    }
    Ok(out)
}
