//! UDP adapter for one appliance session
//!
//! The appliance speaks plain UDP datagrams: the discovery probe goes to
//! port 7000, everything after that to whatever address and port the
//! appliance replied from. The local socket binds a deterministic port
//! derived from the appliance address so that several sessions in one
//! process (one per appliance) never collide.

use std::net::{IpAddr, SocketAddr};

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use greelink_core::constants::{LOCAL_PORT_BASE, MAX_DATAGRAM};

use crate::error::{Error, Result};

/// The UDP socket owned by one session
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
}

impl UdpLink {
    /// Local port for a session talking to `device`: base 8000 plus the
    /// last octet of the appliance address
    pub fn local_port_for(device: IpAddr) -> u16 {
        let last = match device {
            IpAddr::V4(v4) => v4.octets()[3],
            IpAddr::V6(v6) => v6.octets()[15],
        };
        LOCAL_PORT_BASE + last as u16
    }

    /// Bind the session socket on all interfaces.
    ///
    /// Failure here is the one condition the protocol treats as
    /// "disconnected"; the driver retries it indefinitely.
    pub async fn bind(device: IpAddr) -> Result<Self> {
        let port = Self::local_port_for(device);
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(Error::Bind)?;

        debug!(%device, port, "control socket bound");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send one datagram; fire-and-forget at the protocol level
    pub async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        trace!(
            %target,
            len = data.len(),
            head = %String::from_utf8_lossy(&data[..data.len().min(48)]),
            "sending datagram"
        );
        self.socket.send_to(data, target).await?;
        Ok(())
    }

    /// Wait for one inbound datagram, returning its bytes and sender
    pub async fn recv_from(&self) -> Result<(BytesMut, SocketAddr)> {
        let mut buf = BytesMut::with_capacity(MAX_DATAGRAM);
        buf.resize(MAX_DATAGRAM, 0);

        let (n, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);

        trace!(%from, len = n, "received datagram");
        Ok((buf, from))
    }
}
