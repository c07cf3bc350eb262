//! HTTP transport to the course controller.
//!
//! Handles socket I/O and request/response framing only. No application
//! logic: callers decide what to send and how to react to status codes.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::addr::Resource;
use crate::error::WireError;
use crate::frame::{HttpRequest, HttpResponse, MAX_BODY};
use crate::protocol::CommandKind;

/// Default per-request timeout, covering connect through the last byte read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest response read off the wire: a full body plus room for headers.
const MAX_RESPONSE: usize = MAX_BODY + 8 * 1024;

/// Errors from transport and session operations.
#[derive(Debug)]
pub enum ConnError {
    /// Socket I/O error.
    Io(io::Error),
    /// Encoding, decoding, or HTTP framing error.
    Wire(WireError),
    /// Request did not complete within the timeout.
    Timeout { timeout: Duration },
    /// Controller answered with something other than 200.
    Status { resource: Resource, code: u16 },
    /// Rejected controller address.
    InvalidAddress { address: String, reason: &'static str },
    /// A command of the same kind is still outstanding.
    Busy { command: CommandKind },
}

impl std::fmt::Display for ConnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnError::Io(e) => write!(f, "I/O error: {e}"),
            ConnError::Wire(e) => write!(f, "wire error: {e}"),
            ConnError::Timeout { timeout } => write!(f, "request timed out after {timeout:?}"),
            ConnError::Status { resource, code } => {
                write!(f, "controller returned HTTP {code} for {resource}")
            }
            ConnError::InvalidAddress { address, reason } => {
                write!(f, "invalid controller address {address:?}: {reason}")
            }
            ConnError::Busy { command } => {
                write!(f, "{command} request already in flight")
            }
        }
    }
}

impl std::error::Error for ConnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnError::Io(e) => Some(e),
            ConnError::Wire(e) => Some(e),
            ConnError::Timeout { .. }
            | ConnError::Status { .. }
            | ConnError::InvalidAddress { .. }
            | ConnError::Busy { .. } => None,
        }
    }
}

impl From<io::Error> for ConnError {
    fn from(e: io::Error) -> Self {
        ConnError::Io(e)
    }
}

impl From<WireError> for ConnError {
    fn from(e: WireError) -> Self {
        ConnError::Wire(e)
    }
}

/// The HTTP client capability the engine runs on.
///
/// Implementations must bound every call with a timeout; a slow controller
/// must surface as an error, not a hang.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnError>;
}

/// Blocking HTTP/1.1 over a fresh TCP connection per request.
///
/// The controller's server closes after each response, so connections are
/// not reused.
///
/// # Example
///
/// ```no_run
/// use puttpilot::conn::{HttpTransport, Transport};
/// use puttpilot::frame::HttpRequest;
///
/// let transport = HttpTransport::default();
/// let resp = transport.execute(&HttpRequest::get("http://192.168.4.1/ping"))?;
/// println!("ping -> {}", resp.status);
/// # Ok::<(), puttpilot::ConnError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn connect(&self, authority: &str) -> Result<TcpStream, ConnError> {
        let mut last_err = None;
        for addr in authority.to_socket_addrs()? {
            match self.connect_addr(&addr) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            ConnError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{authority} did not resolve"),
            ))
        }))
    }

    fn connect_addr(&self, addr: &SocketAddr) -> Result<TcpStream, ConnError> {
        let stream = TcpStream::connect_timeout(addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        // Tiny request bodies; don't wait on Nagle.
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    fn execute_inner(&self, request: &HttpRequest) -> Result<HttpResponse, ConnError> {
        let deadline = Instant::now() + self.timeout;
        let target = request.target()?;
        let wire = request.encode()?;

        let mut stream = self.connect(&target.authority())?;
        stream.set_write_timeout(Some(self.remaining(deadline)?))?;
        stream.write_all(&wire)?;

        let buf = self.read_response(&stream, deadline)?;
        Ok(HttpResponse::parse(&buf)?)
    }

    /// Time left before `deadline`, or `Timeout` once it has passed.
    fn remaining(&self, deadline: Instant) -> Result<Duration, ConnError> {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(ConnError::Timeout { timeout: self.timeout });
        }
        Ok(left)
    }

    /// Read until the server closes. Each read waits at most for the time
    /// left on the request, and the total size is capped.
    fn read_response(&self, stream: &TcpStream, deadline: Instant) -> Result<Vec<u8>, ConnError> {
        let mut reader = Read::take(stream, MAX_RESPONSE as u64 + 1);
        let mut buf = Vec::with_capacity(256);
        let mut chunk = [0u8; 512];
        loop {
            stream.set_read_timeout(Some(self.remaining(deadline)?))?;
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if buf.len() > MAX_RESPONSE {
            return Err(WireError::malformed("response too large").into());
        }
        Ok(buf)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnError> {
        match self.execute_inner(request) {
            Err(ConnError::Io(ref e))
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Err(ConnError::Timeout { timeout: self.timeout })
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
