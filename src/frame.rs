//! HTTP/1.1 request encoding and response parsing.
//!
//! The controller runs a minimal embedded HTTP server, so only what it
//! speaks is handled:
//! ```text
//! METHOD /path HTTP/1.1\r\nHost: ...\r\nContent-Length: N\r\n\r\nBODY
//! HTTP/1.1 200 OK\r\n...headers...\r\n\r\nBODY
//! ```
//! Response bodies are framed by `Content-Length`, chunked transfer
//! encoding, or connection close.

use std::fmt;

use crate::error::{Result, WireError};

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Largest response body accepted. Controller bodies are a few bytes; debug
/// messages are short text.
pub const MAX_BODY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Host, port and path split out of an `http://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Target {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = |reason| WireError::InvalidUrl { url: url.to_string(), reason };

        let rest = url.strip_prefix("http://").ok_or_else(|| invalid("only http:// is supported"))?;
        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }

        let (host, port) = if authority.starts_with('[') {
            // IPv6 literal: the brackets stay part of the host.
            let close = authority.find(']').ok_or_else(|| invalid("unclosed IPv6 literal"))?;
            let (host, tail) = authority.split_at(close + 1);
            if host.len() == 2 {
                return Err(invalid("missing host"));
            }
            match tail.strip_prefix(':') {
                Some(port) => (host, port.parse::<u16>().map_err(|_| invalid("bad port"))?),
                None if tail.is_empty() => (host, 80),
                None => return Err(invalid("bad port")),
            }
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
                    (host, port)
                }
                None => (authority, 80),
            }
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// `host:port` form for socket address resolution.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `Host` header value (port omitted when it is the default).
    fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            self.authority()
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), body: Vec::new() }
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self { method: Method::Post, url: url.into(), body }
    }

    pub fn target(&self) -> Result<Target> {
        Target::parse(&self.url)
    }

    /// Encode into wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let target = self.target()?;
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
            self.method,
            target.path,
            target.host_header(),
        );
        if self.method == Method::Post {
            head.push_str("Content-Type: application/octet-stream\r\n");
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("\r\n");

        let mut wire = Vec::with_capacity(head.len() + self.body.len());
        wire.extend_from_slice(head.as_bytes());
        wire.extend_from_slice(&self.body);
        Ok(wire)
    }
}

/// A parsed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    /// The controller signals success with 200 only.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Parse a complete response read up to connection close.
    pub fn parse(wire: &[u8]) -> Result<Self> {
        Self::parse_inner(wire).map_err(|e| e.with_raw(&wire[..wire.len().min(64)]))
    }

    fn parse_inner(wire: &[u8]) -> Result<Self> {
        let head_end =
            find(wire, HEADER_END).ok_or_else(|| WireError::malformed("missing header terminator"))?;
        let head = std::str::from_utf8(&wire[..head_end])
            .map_err(|_| WireError::malformed("non-UTF-8 header"))?;
        let rest = &wire[head_end + HEADER_END.len()..];

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or("");
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/1.") {
            return Err(WireError::malformed("bad status line"));
        }
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| WireError::malformed("bad status code"))?;

        let mut content_length = None;
        let mut chunked = false;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| WireError::malformed("bad content-length"))?,
                );
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                chunked = value.eq_ignore_ascii_case("chunked");
            }
        }

        let body = if chunked {
            dechunk(rest)?
        } else if let Some(len) = content_length {
            if len > MAX_BODY {
                return Err(WireError::malformed("body too large"));
            }
            if rest.len() < len {
                return Err(WireError::malformed("body shorter than content-length"));
            }
            rest[..len].to_vec()
        } else if rest.len() > MAX_BODY {
            return Err(WireError::malformed("body too large"));
        } else {
            rest.to_vec()
        };

        Ok(Self { status, body })
    }
}

/// Decode a chunked transfer-encoded body.
fn dechunk(mut data: &[u8]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = find(data, CRLF).ok_or_else(|| WireError::malformed("truncated chunk size"))?;
        let size_line = std::str::from_utf8(&data[..line_end])
            .map_err(|_| WireError::malformed("bad chunk size"))?;
        // Chunk extensions (";name=value") are ignored.
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| WireError::malformed("bad chunk size"))?;
        data = &data[line_end + CRLF.len()..];

        if size == 0 {
            return Ok(body);
        }
        if size > MAX_BODY - body.len() {
            return Err(WireError::malformed("chunk too large"));
        }
        let framed = size + CRLF.len();
        if data.len() < framed {
            return Err(WireError::malformed("truncated chunk"));
        }
        body.extend_from_slice(&data[..size]);
        data = &data[framed..];
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
