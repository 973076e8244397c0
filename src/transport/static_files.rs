//! Static file serving
//!
//! Requests for anything other than the connect path are answered from the
//! configured static directory, which is how the browser chat client is
//! delivered. The request head is only peeked at, so a WebSocket upgrade is
//! left untouched for the handshake that follows.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const MAX_HEAD_LEN: usize = 8 * 1024;
const PEEK_ATTEMPTS: usize = 100;
const PEEK_INTERVAL: Duration = Duration::from_millis(10);

/// Method and path of an incoming HTTP request, plus the length of its
/// head in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub len: usize,
}

pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Parse a complete request head. `None` if it is malformed.
pub fn parse_request_head(bytes: &[u8]) -> Option<RequestHead> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut req = httparse::Request::new(&mut headers);
    match req.parse(bytes) {
        Ok(status) if status.is_complete() => {}
        _ => return None,
    }

    let target = req.path?;
    let path = target.split(['?', '#']).next().unwrap_or(target);
    Some(RequestHead {
        method: req.method?.to_string(),
        path: path.to_string(),
        len: bytes.len(),
    })
}

/// Look at the request head without consuming it. `None` when the peer
/// closed, sent something unparseable, or took too long.
pub async fn peek_request_head(stream: &TcpStream) -> io::Result<Option<RequestHead>> {
    let mut buf = vec![0u8; MAX_HEAD_LEN];
    for _ in 0..PEEK_ATTEMPTS {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(end) = find_header_end(&buf[..n]) {
            return Ok(parse_request_head(&buf[..end]));
        }
        if n == buf.len() {
            return Ok(None);
        }
        tokio::time::sleep(PEEK_INTERVAL).await;
    }
    Ok(None)
}

/// Map a request path onto a file under `root`. Paths that try to climb
/// out of `root` are refused.
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => resolved.push(s),
        }
    }
    Some(resolved)
}

pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Answer one plain HTTP request from `root`, then close the connection.
/// Directories are served through their `index.html`.
pub async fn respond(stream: &mut TcpStream, root: &Path, head: &RequestHead) -> io::Result<()> {
    // Only peeked so far.
    let mut consumed = vec![0u8; head.len];
    stream.read_exact(&mut consumed).await?;

    let head_only = match head.method.as_str() {
        "GET" => false,
        "HEAD" => true,
        _ => {
            debug!("Rejecting {} {}", head.method, head.path);
            write_response(
                stream,
                "405 Method Not Allowed",
                "text/plain; charset=utf-8",
                b"Method Not Allowed",
                &[("Allow", "GET, HEAD")],
                false,
            )
            .await?;
            return stream.shutdown().await;
        }
    };

    match load_file(root, &head.path).await {
        Some((path, body)) => {
            debug!("Serving {} for {}", path.display(), head.path);
            write_response(stream, "200 OK", content_type(&path), &body, &[], head_only).await?;
        }
        None => {
            debug!("No static file for {}", head.path);
            write_response(
                stream,
                "404 Not Found",
                "text/plain; charset=utf-8",
                b"Not Found",
                &[],
                head_only,
            )
            .await?;
        }
    }
    stream.shutdown().await
}

async fn load_file(root: &Path, request_path: &str) -> Option<(PathBuf, Vec<u8>)> {
    let mut path = resolve_path(root, request_path)?;
    if tokio::fs::metadata(&path).await.ok()?.is_dir() {
        path.push("index.html");
    }
    let body = tokio::fs::read(&path).await.ok()?;
    Some((path, body))
}

async fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
    extra_headers: &[(&str, &str)],
    head_only: bool,
) -> io::Result<()> {
    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in extra_headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");

    stream.write_all(response.as_bytes()).await?;
    if !head_only {
        stream.write_all(body).await?;
    }
    stream.flush().await
}
