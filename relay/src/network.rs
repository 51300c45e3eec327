//! Relay network layer: UDP I/O, session routing and peer timeouts

use crate::directory::SessionDirectory;
use crate::peer_manager::PeerManager;
use log::{debug, error, info, warn};
use shared::relay::{RelayPacket, EVENT_GAME, EVENT_JOINED, EVENT_LEFT, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to the main relay loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: RelayPacket,
        addr: SocketAddr,
    },
    PeerTimeout {
        peer_id: String,
        session_id: Option<String>,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main relay loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: RelayPacket,
        addr: SocketAddr,
    },
    Multicast {
        packet: RelayPacket,
        addrs: Vec<SocketAddr>,
    },
}

/// Session relay routing game payloads between the members of a session
pub struct Server {
    socket: Arc<UdpSocket>,
    peers: Arc<RwLock<PeerManager>>,
    directory: SessionDirectory,
    peer_timeout: Duration,
    next_message_id: i64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_peers: usize,
        peer_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            peers: Arc::new(RwLock::new(PeerManager::new(max_peers))),
            directory: SessionDirectory::new(),
            peer_timeout,
            next_message_id: 1,
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match RelayPacket::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that drains the outgoing queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &[addr]).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::Multicast { packet, addrs } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &addrs).await {
                            error!("Failed to multicast packet: {}", e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors peer liveness
    fn spawn_timeout_checker(&self) {
        let peers = Arc::clone(&self.peers);
        let server_tx = self.server_tx.clone();
        let timeout = self.peer_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut peers_guard = peers.write().await;
                    peers_guard.check_timeouts(timeout)
                };

                for (peer_id, session_id) in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::PeerTimeout {
                        peer_id,
                        session_id,
                    }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &RelayPacket,
        addrs: &[SocketAddr],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = packet.encode()?;
        for addr in addrs {
            socket.send_to(&data, addr).await?;
        }
        Ok(())
    }

    fn send_packet(&self, packet: RelayPacket, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Sends an event to the given peers, skipping any no longer known
    async fn send_event(
        &mut self,
        recipients: &[String],
        event: &str,
        peer_id: &str,
        payload: Option<String>,
    ) {
        if recipients.is_empty() {
            return;
        }

        let addrs: Vec<SocketAddr> = {
            let peers = self.peers.read().await;
            recipients.iter().filter_map(|id| peers.addr_of(id)).collect()
        };

        let packet = RelayPacket::Event {
            event: event.to_string(),
            message_id: self.next_message_id,
            peer_id: Some(peer_id.to_string()),
            payload,
        };
        self.next_message_id += 1;

        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::Multicast { packet, addrs })
        {
            error!("Failed to queue event: {}", e);
        }
    }

    /// Removes `peer_id` from its session and tells the remaining members
    async fn leave_session(&mut self, peer_id: &str, session_id: Option<String>) {
        let Some(session_id) = session_id else {
            return;
        };

        let departure = self.directory.leave(&session_id, peer_id);
        {
            let mut peers = self.peers.write().await;
            peers.set_session(peer_id, None);
            if departure.closed {
                for member in &departure.remaining {
                    peers.set_session(member, None);
                }
            }
        }

        self.send_event(&departure.remaining, EVENT_LEFT, peer_id, None)
            .await;
    }

    /// Routes one request
    async fn handle_packet(&mut self, packet: RelayPacket, addr: SocketAddr) {
        let peer_id = {
            let mut peers = self.peers.write().await;
            peers.register(addr)
        };

        let Some(peer_id) = peer_id else {
            warn!("Relay full, rejecting {}", addr);
            self.send_packet(
                RelayPacket::Rejected {
                    reason: "relay full".to_string(),
                },
                addr,
            );
            return;
        };

        let current_session = {
            let peers = self.peers.read().await;
            peers.session_of(&peer_id)
        };

        match packet {
            RelayPacket::Host => {
                self.leave_session(&peer_id, current_session).await;

                let session_id = self.directory.create(&peer_id);
                {
                    let mut peers = self.peers.write().await;
                    peers.set_session(&peer_id, Some(session_id.clone()));
                }
                self.send_packet(
                    RelayPacket::Hosted {
                        session_id,
                        peer_id,
                    },
                    addr,
                );
            }

            RelayPacket::List => {
                self.send_packet(
                    RelayPacket::Sessions {
                        session_ids: self.directory.list(),
                    },
                    addr,
                );
            }

            RelayPacket::Join {
                session_id,
                payload,
            } => {
                if current_session.as_deref() != Some(session_id.as_str()) {
                    self.leave_session(&peer_id, current_session).await;
                }

                match self.directory.join(&session_id, &peer_id) {
                    Ok(()) => {
                        {
                            let mut peers = self.peers.write().await;
                            peers.set_session(&peer_id, Some(session_id.clone()));
                        }
                        let others = self.directory.others(&session_id, &peer_id);
                        let host_id = self
                            .directory
                            .get(&session_id)
                            .map(|session| session.host.clone())
                            .unwrap_or_default();
                        self.send_packet(
                            RelayPacket::Joined {
                                session_id,
                                peer_id: peer_id.clone(),
                                host_id,
                            },
                            addr,
                        );
                        self.send_event(&others, EVENT_JOINED, &peer_id, Some(payload))
                            .await;
                    }
                    Err(rejection) => {
                        info!(
                            "Rejecting {} joining {}: {}",
                            peer_id,
                            session_id,
                            rejection.reason()
                        );
                        self.send_packet(
                            RelayPacket::Rejected {
                                reason: rejection.reason().to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            RelayPacket::Game { payload } => match current_session {
                Some(session_id) => {
                    let others = self.directory.others(&session_id, &peer_id);
                    self.send_event(&others, EVENT_GAME, &peer_id, Some(payload))
                        .await;
                }
                None => debug!("Dropping game payload from {} outside a session", peer_id),
            },

            RelayPacket::Heartbeat => {}

            RelayPacket::Leave => {
                self.leave_session(&peer_id, current_session).await;
                let mut peers = self.peers.write().await;
                peers.remove(&peer_id);
            }

            _ => {
                warn!("Unexpected packet type from {}", addr);
            }
        }
    }

    /// Main relay loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Relay started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::PeerTimeout {
                    peer_id,
                    session_id,
                }) => {
                    self.leave_session(&peer_id, session_id).await;
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn recv_packet(socket: &UdpSocket) -> RelayPacket {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("relay did not answer")
            .unwrap();
        RelayPacket::decode(&buf[..len]).unwrap()
    }

    async fn send(socket: &UdpSocket, to: SocketAddr, packet: RelayPacket) {
        socket.send_to(&packet.encode().unwrap(), to).await.unwrap();
    }

    async fn start_relay() -> SocketAddr {
        let mut server =
            tokio_test::assert_ok!(Server::new("127.0.0.1:0", 16, Duration::from_secs(10)).await);
        let addr = tokio_test::assert_ok!(server.local_addr());
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    #[test]
    fn test_server_message_creation() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let msg = ServerMessage::PacketReceived {
            packet: RelayPacket::List,
            addr,
        };

        match msg {
            ServerMessage::PacketReceived { packet, addr: a } => {
                assert_eq!(a, addr);
                assert_eq!(packet, RelayPacket::List);
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[tokio::test]
    async fn test_host_list_join_and_route() {
        let relay = start_relay().await;
        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let guest = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(&host, relay, RelayPacket::Host).await;
        let (session_id, host_id) = match recv_packet(&host).await {
            RelayPacket::Hosted {
                session_id,
                peer_id,
            } => (session_id, peer_id),
            other => panic!("Unexpected reply {:?}", other),
        };

        send(&guest, relay, RelayPacket::List).await;
        match recv_packet(&guest).await {
            RelayPacket::Sessions { session_ids } => assert_eq!(session_ids, vec![session_id.clone()]),
            other => panic!("Unexpected reply {:?}", other),
        }

        send(
            &guest,
            relay,
            RelayPacket::Join {
                session_id: session_id.clone(),
                payload: "{}".to_string(),
            },
        )
        .await;
        let guest_id = match recv_packet(&guest).await {
            RelayPacket::Joined {
                peer_id,
                host_id: reported_host,
                ..
            } => {
                assert_eq!(reported_host, host_id);
                peer_id
            }
            other => panic!("Unexpected reply {:?}", other),
        };

        match recv_packet(&host).await {
            RelayPacket::Event { event, peer_id, .. } => {
                assert_eq!(event, EVENT_JOINED);
                assert_eq!(peer_id, Some(guest_id.clone()));
            }
            other => panic!("Unexpected event {:?}", other),
        }

        send(
            &host,
            relay,
            RelayPacket::Game {
                payload: "hello".to_string(),
            },
        )
        .await;
        match recv_packet(&guest).await {
            RelayPacket::Event {
                event,
                peer_id,
                payload,
                ..
            } => {
                assert_eq!(event, EVENT_GAME);
                assert_eq!(peer_id, Some(host_id.clone()));
                assert_eq!(payload.as_deref(), Some("hello"));
            }
            other => panic!("Unexpected event {:?}", other),
        }

        send(&host, relay, RelayPacket::Leave).await;
        match recv_packet(&guest).await {
            RelayPacket::Event { event, peer_id, .. } => {
                assert_eq!(event, EVENT_LEFT);
                assert_eq!(peer_id, Some(host_id));
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_unknown_session_rejected() {
        let relay = start_relay().await;
        let guest = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(
            &guest,
            relay,
            RelayPacket::Join {
                session_id: "NOPE".to_string(),
                payload: "{}".to_string(),
            },
        )
        .await;

        match recv_packet(&guest).await {
            RelayPacket::Rejected { reason } => assert_eq!(reason, "unknown session"),
            other => panic!("Unexpected reply {:?}", other),
        }
    }
}
