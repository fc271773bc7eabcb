//! The classic DNS listeners: UDP datagrams and length-prefixed TCP.
//! Both hand their bytes to the same [Resolver].

use crate::querylog::Transport;
use crate::resolver::Resolver;
use crate::UDP_BUFFER_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Serve datagram queries. Each datagram is resolved on its own task so
/// one slow upstream forward doesn't head-of-line block the socket; the
/// semaphore keeps the task count bounded. Malformed datagrams are
/// dropped without a reply.
pub async fn udp_server(
    addr: SocketAddr,
    resolver: Resolver,
    max_in_flight: usize,
) -> io::Result<()> {
    let udp_sock = Arc::new(UdpSocket::bind(addr).await.inspect_err(|err| {
        error!("Failed to start UDP listener on {addr}: {err:?}");
    })?);
    info!("Started UDP listener on {addr}");

    let limiter = Arc::new(Semaphore::new(max_in_flight));
    let mut udp_buffer = [0; UDP_BUFFER_SIZE];

    loop {
        let (len, peer) = match udp_sock.recv_from(&mut udp_buffer).await {
            Ok(value) => value,
            Err(error) => {
                error!("Error receiving datagram: {error:?}");
                continue;
            }
        };
        debug!("{len} bytes received from {peer:?}");

        let Ok(permit) = limiter.clone().acquire_owned().await else {
            // the semaphore never closes while the server runs
            continue;
        };
        let data = udp_buffer[0..len].to_vec();
        let sock = udp_sock.clone();
        let resolver = resolver.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match resolver.resolve(&data, Some(peer.ip()), Transport::Udp).await {
                Ok(reply_bytes) => {
                    if let Err(err) = sock.send_to(&reply_bytes, peer).await {
                        error!("Failed to send reply to {peer:?}: {err:?}");
                    }
                }
                Err(error) => {
                    debug!("Dropping datagram from {peer:?}: {error}");
                }
            }
        });
    }
}

/// Serve one TCP query: a two-octet big-endian length, that many octets
/// of message, then the reply framed the same way. One query per
/// connection.
///
/// Ref <https://www.rfc-editor.org/rfc/rfc7766>
#[instrument(level = "debug", skip_all, fields(peer = %peer))]
async fn tcp_conn_handler(
    stream: &mut TcpStream,
    peer: SocketAddr,
    resolver: Resolver,
) -> io::Result<()> {
    let msg_length: usize = stream.read_u16().await?.into();
    debug!("msg_length={msg_length}");
    let mut buf = vec![0u8; msg_length];
    stream.read_exact(&mut buf).await?;

    match resolver.resolve(&buf, Some(peer.ip()), Transport::Tcp).await {
        Ok(reply_bytes) => {
            stream
                .write_all(&(reply_bytes.len() as u16).to_be_bytes())
                .await?;
            stream.write_all(&reply_bytes).await?;
        }
        Err(error) => {
            // nothing sensible to frame back, close the connection
            debug!("Closing connection from {peer:?}: {error}");
        }
    }
    Ok(())
}

/// The TCP listener loop: accept, then resolve on a per-connection task
/// under the client timeout.
pub async fn tcp_server(
    addr: SocketAddr,
    resolver: Resolver,
    tcp_client_timeout: u64,
) -> io::Result<()> {
    let tcpserver = TcpListener::bind(addr).await.inspect_err(|err| {
        error!("Failed to start TCP listener on {addr}: {err:?}");
    })?;
    info!("Started TCP listener on {addr}");

    loop {
        let (mut stream, peer) = match tcpserver.accept().await {
            Ok(value) => value,
            Err(err) => {
                error!("Couldn't accept TCP connection: {err:?}");
                continue;
            }
        };
        debug!("TCP connection from {peer:?}");
        let conn_resolver = resolver.clone();
        tokio::spawn(async move {
            if timeout(
                Duration::from_secs(tcp_client_timeout),
                tcp_conn_handler(&mut stream, peer, conn_resolver),
            )
            .await
            .is_err()
            {
                warn!("TCP connection from {peer:?} terminated after {tcp_client_timeout} seconds.");
            }
        });
    }
}
