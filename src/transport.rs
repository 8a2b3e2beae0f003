use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket},
    time::Duration,
};
use thiserror::Error;
use ureq::Agent;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Content type the collector's HTTP listener expects for line protocol.
pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Transport level failure of a single send.
///
/// HTTP status codes are never reported here, only failures to complete the
/// request at all.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("collector host could not be resolved")]
    HostNotFound,
    #[error("request to collector timed out: {0}")]
    Timeout(#[source] BoxError),
    #[error("could not connect to collector: {0}")]
    Connection(#[source] BoxError),
    #[error("request to collector failed: {0}")]
    Other(ureq::Error),
}

impl From<ureq::Error> for SendError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::HostNotFound => SendError::HostNotFound,
            ureq::Error::Timeout(_) => SendError::Timeout(Box::new(err)),
            ureq::Error::ConnectionFailed | ureq::Error::Io(_) => {
                SendError::Connection(Box::new(err))
            }
            err => SendError::Other(err),
        }
    }
}

impl From<io::Error> for SendError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SendError::Timeout(Box::new(err)),
            _ => SendError::Connection(Box::new(err)),
        }
    }
}

/// Delivers one line protocol body to the collector.
pub trait Transport {
    fn send(&mut self, body: &str) -> Result<(), SendError>;
}

/// HTTP POST transport reusing one pooled agent for every request.
pub struct HttpTransport {
    agent: Agent,
    url: String,
}

impl HttpTransport {
    /// Create the transport. `timeout` bounds each whole request; `None`
    /// waits as long as the network stack does.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let config = Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build();

        Self {
            agent: Agent::new_with_config(config),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, body: &str) -> Result<(), SendError> {
        let mut response = self
            .agent
            .post(self.url.as_str())
            .content_type(CONTENT_TYPE)
            .send(body.as_bytes())?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Collector answered with status {}", status);
        }

        // drain the body so the connection goes back to the pool
        if let Err(err) = response.body_mut().read_to_vec() {
            tracing::debug!("Could not read collector response: {:?}", err);
        }

        Ok(())
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        tracing::debug!("Releasing connection pool for {}", self.url);
    }
}

/// Datagram transport for the collector's socket listener, one sample per
/// datagram.
pub struct UdpTransport {
    socket: UdpSocket,
    addr: String,
}

impl UdpTransport {
    /// Resolve `addr` once and connect a local socket to it. `timeout`
    /// bounds how long a send may block.
    pub fn new(addr: impl Into<String>, timeout: Option<Duration>) -> io::Result<Self> {
        let addr = addr.into();
        let target = addr.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{addr} resolved to nothing"))
        })?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(target)?;
        socket.set_write_timeout(timeout)?;

        Ok(Self { socket, addr })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, body: &str) -> Result<(), SendError> {
        self.socket.send(body.as_bytes())?;
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        tracing::debug!("Closing socket to {}", self.addr);
    }
}
