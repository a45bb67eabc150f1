use std::net::{Ipv4Addr, SocketAddr};

use futures::future::select_all;
use futures::{FutureExt, SinkExt, StreamExt};
use log::{trace, warn};
use tokio::net::UdpSocket;
use tokio_util::udp::UdpFramed;

use super::codec::{MessageCodec, MessageProtocol};
use super::SessionError;
use crate::config::NeighborSpec;
use crate::message::Envelope;

/// One bound socket facing a single neighbor.
pub struct Endpoint {
    addr: Ipv4Addr,
    target: SocketAddr,
    protocol: MessageProtocol,
    alive: bool,
}

impl Endpoint {
    pub async fn bind(spec: &NeighborSpec) -> Result<Self, SessionError> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        Ok(Self {
            addr: spec.addr,
            target: SocketAddr::from((Ipv4Addr::LOCALHOST, spec.port)),
            protocol: UdpFramed::new(socket, MessageCodec::new()),
            alive: true,
        })
    }

    async fn send(&mut self, message: Envelope) -> Result<(), SessionError> {
        self.protocol.send((message, self.target)).await
    }
}

/// All neighbor endpoints, polled as one. A neighbor whose socket fails is
/// retired for the rest of the run; the others keep their service.
pub struct Endpoints {
    endpoints: Vec<Endpoint>,
}

impl Endpoints {
    pub async fn bind(specs: &[NeighborSpec]) -> Result<Self, SessionError> {
        let mut endpoints = Vec::with_capacity(specs.len());
        for spec in specs {
            endpoints.push(Endpoint::bind(spec).await?);
        }
        Ok(Self { endpoints })
    }

    /// Send toward a neighbor. Failures retire that endpoint instead of
    /// propagating; the caller has nothing useful to do about one bad link.
    pub async fn send(&mut self, to: Ipv4Addr, message: Envelope) {
        let endpoint = match self.endpoints.iter_mut().find(|e| e.addr == to) {
            Some(endpoint) => endpoint,
            None => {
                warn!("No endpoint for {}, dropping outbound message", to);
                return;
            }
        };
        if !endpoint.alive {
            trace!("[{}] Unreachable, dropping {}", to, message.payload.kind());
            return;
        }
        trace!("[{}] Outgoing: {}", to, message.payload.kind());
        if let Err(err) = endpoint.send(message).await {
            warn!("[{}] Marking unreachable: {}", to, err);
            endpoint.alive = false;
        }
    }

    /// Wait for the next decodable message on any live endpoint. Undecodable
    /// datagrams are dropped where they arrive; transport errors retire the
    /// endpoint. Returns None once no endpoint is left alive.
    pub async fn recv(&mut self) -> Option<(Ipv4Addr, Envelope)> {
        loop {
            let (addr, result) = {
                let polls: Vec<_> = self
                    .endpoints
                    .iter_mut()
                    .filter(|endpoint| endpoint.alive)
                    .map(|endpoint| {
                        let addr = endpoint.addr;
                        async move { (addr, endpoint.protocol.next().await) }.boxed()
                    })
                    .collect();
                if polls.is_empty() {
                    return None;
                }
                let ((addr, result), _index, remaining) = select_all(polls).await;
                // Unfinished polls have to go before endpoints can be
                // borrowed again below
                drop(remaining);
                (addr, result)
            };
            match result {
                Some(Ok((envelope, _sender))) => return Some((addr, envelope)),
                Some(Err(SessionError::Decode(reason))) => {
                    warn!("[{}] Dropping malformed datagram: {}", addr, reason);
                }
                Some(Err(err)) => {
                    warn!("[{}] Marking unreachable: {}", addr, err);
                    self.mark_unreachable(addr);
                }
                None => {
                    warn!("[{}] Stream ended, marking unreachable", addr);
                    self.mark_unreachable(addr);
                }
            }
        }
    }

    fn mark_unreachable(&mut self, addr: Ipv4Addr) {
        if let Some(endpoint) = self.endpoints.iter_mut().find(|e| e.addr == addr) {
            endpoint.alive = false;
        }
    }
}
