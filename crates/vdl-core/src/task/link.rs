//! Multi-stream links: several sub-links packed into one string.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::OnceLock;

const SEPARATOR_LEN: usize = 16;

/// Random separator chosen once per process so it never collides with real URLs.
pub fn separator() -> &'static str {
    static SEP: OnceLock<String> = OnceLock::new();
    SEP.get_or_init(|| {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SEPARATOR_LEN)
            .map(char::from)
            .collect();
        format!("|{}|", token)
    })
}

pub fn join_links<S: AsRef<str>>(links: &[S]) -> String {
    links
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(separator())
}

pub fn split_links(link: &str) -> Vec<&str> {
    link.split(separator()).filter(|s| !s.is_empty()).collect()
}
