//! Stub forwarding: hand the client's bytes to each configured
//! upstream in turn and return the first answer.

use crate::error::IbexError;
use crate::{HEADER_BYTES, UDP_BUFFER_SIZE};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

/// How long each upstream gets before we move to the next one.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);

/// Try each upstream in order with the query bytes, untouched. Returns
/// the first response datagram. Timeouts, socket errors and short reads
/// all just advance to the next upstream; an exhausted list is
/// [IbexError::UpstreamUnavailable].
pub async fn forward(upstreams: &[(String, u16)], query: &[u8]) -> Result<Vec<u8>, IbexError> {
    forward_with_timeout(upstreams, query, UPSTREAM_TIMEOUT).await
}

pub(crate) async fn forward_with_timeout(
    upstreams: &[(String, u16)],
    query: &[u8],
    per_upstream: Duration,
) -> Result<Vec<u8>, IbexError> {
    for (host, port) in upstreams {
        match timeout(per_upstream, query_upstream(host, *port, query)).await {
            Ok(Some(response)) => return Ok(response),
            Ok(None) => debug!("upstream {host}:{port} failed, trying next"),
            Err(_) => debug!("upstream {host}:{port} timed out, trying next"),
        }
    }
    Err(IbexError::UpstreamUnavailable)
}

async fn query_upstream(host: &str, port: u16, query: &[u8]) -> Option<Vec<u8>> {
    let sock = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    sock.connect((host, port)).await.ok()?;
    sock.send(query).await.ok()?;
    let mut buf = vec![0u8; UDP_BUFFER_SIZE];
    let len = sock.recv(&mut buf).await.ok()?;
    if len < HEADER_BYTES {
        return None;
    }
    buf.truncate(len);
    Some(buf)
}
