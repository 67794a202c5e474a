//! Minimal HTTP/1.1 server with routes and Range support for integration tests.
//!
//! Each route serves a static body with a fixed content type. GET with
//! `Range` answers 206 (or 416 past the end); GET without it answers 200.
//! An optional per-request jitter delays responses so concurrent chunks
//! complete out of order. Routes can also pretend the upstream shrank after
//! the size probe, or answer ranges from an earlier start than asked. Every
//! response closes the connection.

#![allow(dead_code)]

use rand::Rng;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub body: Arc<Vec<u8>>,
    pub content_type: String,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Ranged requests see an empty resource (416) while plain GETs still get the body.
    pub truncated: bool,
    /// Ranged responses start this many bytes before the requested start.
    pub rewind: u64,
}

impl Route {
    pub fn new(body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        Self {
            body: Arc::new(body.into()),
            content_type: content_type.to_string(),
            support_ranges: true,
            truncated: false,
            rewind: 0,
        }
    }

    pub fn without_ranges(mut self) -> Self {
        self.support_ranges = false;
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    pub fn rewind_ranges(mut self, by: u64) -> Self {
        self.rewind = by;
        self
    }
}

#[derive(Default)]
struct State {
    routes: HashMap<String, Route>,
    hits: HashMap<String, usize>,
}

/// Handle to a running server. The server lives until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    base: String,
    state: Arc<Mutex<State>>,
    jitter_ms: Arc<AtomicUsize>,
}

impl RangeServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let server = Self {
            base: format!("http://127.0.0.1:{}", port),
            state: Arc::new(Mutex::new(State::default())),
            jitter_ms: Arc::new(AtomicUsize::new(0)),
        };
        let handle = server.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let handle = handle.clone();
                thread::spawn(move || handle.handle(stream));
            }
        });
        server
    }

    /// Serve `route` at `path` (leading slash), returning its full URL.
    pub fn route(&self, path: &str, route: Route) -> String {
        self.state.lock().unwrap().routes.insert(path.to_string(), route);
        self.url(path)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Delay every response by a random 0..`max_ms` milliseconds.
    pub fn set_jitter(&self, max_ms: usize) {
        self.jitter_ms.store(max_ms, Ordering::SeqCst);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.lock().unwrap().hits.get(path).copied().unwrap_or(0)
    }

    fn handle(&self, mut stream: std::net::TcpStream) {
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        let _ = stream.set_write_timeout(Some(Duration::from_secs(30)));
        let mut buf = [0u8; 8192];
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let Ok(request) = std::str::from_utf8(&buf[..n]) else {
            return;
        };
        let (method, path, range) = parse_request(request);
        let route = {
            let mut state = self.state.lock().unwrap();
            *state.hits.entry(path.to_string()).or_default() += 1;
            state.routes.get(path).cloned()
        };

        let jitter = self.jitter_ms.load(Ordering::SeqCst);
        if jitter > 0 {
            let ms = rand::thread_rng().gen_range(0..jitter as u64);
            thread::sleep(Duration::from_millis(ms));
        }

        let Some(route) = route else {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            return;
        };
        if !method.eq_ignore_ascii_case("GET") {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            return;
        }

        let ranged = range.filter(|_| route.support_ranges);
        let body = if ranged.is_some() && route.truncated {
            &route.body[0..0]
        } else {
            route.body.as_slice()
        };
        let total = body.len() as u64;
        let (status, content_range, slice) = match ranged {
            Some((start, end_incl)) => {
                let start = start.saturating_sub(route.rewind);
                let end_incl = end_incl.min(total.saturating_sub(1));
                if start >= total || start > end_incl {
                    ("416 Range Not Satisfiable", Some(format!("bytes */{}", total)), &body[0..0])
                } else {
                    let slice = &body[start as usize..=end_incl as usize];
                    (
                        "206 Partial Content",
                        Some(format!("bytes {}-{}/{}", start, end_incl, total)),
                        slice,
                    )
                }
            }
            None => ("200 OK", None, body),
        };
        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: {}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n",
            status,
            slice.len(),
            route.content_type
        );
        if let Some(cr) = content_range {
            head.push_str(&format!("Content-Range: {}\r\n", cr));
        }
        head.push_str("\r\n");
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(slice);
    }
}

/// Returns (method, path, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let target = first.next().unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let value = value.trim();
        if let Some(bounds) = value.strip_prefix("bytes=") {
            if let Some((a, b)) = bounds.split_once('-') {
                let start = a.trim().parse::<u64>().unwrap_or(0);
                let end = b.trim();
                let end_incl = if end.is_empty() {
                    u64::MAX
                } else {
                    end.parse::<u64>().unwrap_or(0)
                };
                range = Some((start, end_incl));
            }
        }
    }
    (method, path, range)
}
