use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tracing::{debug, info, trace, warn};

use super::{Endpoint, Transport, TransportError};
use crate::config::{TransportConfig, TransportMode};

enum Channel {
    Stream(TcpStream),
    Datagram(UdpSocket),
}

/// TCP or UDP transport to a line-oriented aggregator input.
pub struct SocketTransport {
    host: String,
    port: u16,
    mode: TransportMode,
    timeout: Duration,
    channel: Option<Channel>,
}

impl SocketTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            mode: config.mode,
            timeout: config.connect_timeout,
            channel: None,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connect_error(&self, reason: impl ToString) -> TransportError {
        TransportError::Connect {
            address: self.address(),
            reason: reason.to_string(),
        }
    }

    async fn resolve(&self) -> Result<SocketAddr, TransportError> {
        let mut addrs = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| self.connect_error(e))?;

        addrs
            .next()
            .ok_or_else(|| self.connect_error("host resolved to no addresses"))
    }

    async fn connect(&self) -> Result<Channel, TransportError> {
        let target = tokio::time::timeout(self.timeout, self.resolve())
            .await
            .map_err(|_| self.connect_error("timed out resolving host"))??;

        match self.mode {
            TransportMode::Reliable => {
                let stream = tokio::time::timeout(self.timeout, TcpStream::connect(target))
                    .await
                    .map_err(|_| {
                        self.connect_error(format!("timed out after {:?}", self.timeout))
                    })?
                    .map_err(|e| self.connect_error(e))?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(
                        host = %self.host,
                        port = self.port,
                        error = %e,
                        "Could not disable Nagle on aggregator stream"
                    );
                }
                Ok(Channel::Stream(stream))
            }
            TransportMode::BestEffort => {
                let local: SocketAddr = if target.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(local)
                    .await
                    .map_err(|e| self.connect_error(e))?;
                socket
                    .connect(target)
                    .await
                    .map_err(|e| self.connect_error(e))?;
                Ok(Channel::Datagram(socket))
            }
        }
    }
}

/// Detect a stream the aggregator has already closed.
///
/// A write to a peer-closed socket is still accepted by the kernel, so the
/// frame would vanish without an error. Reading first surfaces the FIN (or a
/// reset). The aggregator never sends data, so anything readable is discarded.
fn peer_hangup(stream: &TcpStream) -> Option<String> {
    let mut buf = [0u8; 256];
    loop {
        match stream.try_read(&mut buf) {
            Ok(0) => return Some("connection closed by aggregator".to_string()),
            Ok(n) => trace!(bytes = n, "Discarding unsolicited bytes from aggregator"),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Some(e.to_string()),
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.channel.is_some() {
            return Ok(());
        }

        let channel = self.connect().await?;
        info!(
            host = %self.host,
            port = self.port,
            mode = %self.mode,
            "Opened aggregator channel"
        );
        self.channel = Some(channel);
        Ok(())
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let timeout = self.timeout;
        let result = match self.channel.as_mut() {
            None => {
                return Err(TransportError::BrokenChannel(
                    "channel is not open".to_string(),
                ))
            }
            Some(Channel::Stream(stream)) => match peer_hangup(stream) {
                Some(reason) => Err(reason),
                None => match tokio::time::timeout(timeout, stream.write_all(frame)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("write timed out after {:?}", timeout)),
                },
            },
            Some(Channel::Datagram(socket)) => match socket.send(frame).await {
                Ok(_) => Ok(()),
                // ICMP port unreachable from an earlier datagram; that datagram was lost
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    trace!(error = %e, "Datagram peer unreachable, treating as loss");
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            },
        };

        result.map_err(|reason| {
            warn!(host = %self.host, port = self.port, error = %reason, "Aggregator channel failed");
            self.close();
            TransportError::BrokenChannel(reason)
        })
    }

    fn close(&mut self) {
        if self.channel.take().is_some() {
            debug!(host = %self.host, port = self.port, "Closed aggregator channel");
        }
    }

    fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            mode: self.mode,
        }
    }
}
