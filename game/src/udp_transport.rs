//! [`Transport`] over UDP against the `relay` binary.
//!
//! The transport owns a small tokio runtime so the game tick can stay
//! synchronous. A receiver task routes relay events to the registered
//! callback and everything else to the request/reply channel; a heartbeat
//! task keeps the peer alive at the relay while the game is idle.

use crate::transport::{
    Connector, EventCallback, SessionInfo, Transport, TransportError, TransportEvent,
};
use log::{debug, error, info, warn};
use shared::relay::{RelayPacket, MAX_DATAGRAM_SIZE};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

type SharedCallback = Arc<Mutex<Option<EventCallback>>>;

pub struct UdpTransport {
    runtime: Runtime,
    socket: Arc<UdpSocket>,
    relay_addr: SocketAddr,
    callback: SharedCallback,
    replies: mpsc::UnboundedReceiver<RelayPacket>,
    tasks: Vec<JoinHandle<()>>,
    request_timeout: Duration,
    closed: bool,
}

impl UdpTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let relay_addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("could not resolve {}:{}", host, port),
            ))
        })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let bind_addr = if relay_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = Arc::new(runtime.block_on(UdpSocket::bind(bind_addr))?);
        info!(
            "Relay transport bound to {} for relay {}",
            socket.local_addr()?,
            relay_addr
        );

        let (reply_tx, replies) = mpsc::unbounded_channel();
        let callback: SharedCallback = Arc::new(Mutex::new(None));

        let mut transport = UdpTransport {
            runtime,
            socket,
            relay_addr,
            callback,
            replies,
            tasks: Vec::new(),
            request_timeout: REQUEST_TIMEOUT,
            closed: false,
        };
        transport.spawn_receiver(reply_tx);
        transport.spawn_heartbeat();
        Ok(transport)
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    fn spawn_receiver(&mut self, reply_tx: mpsc::UnboundedSender<RelayPacket>) {
        let socket = Arc::clone(&self.socket);
        let callback = Arc::clone(&self.callback);
        let relay_addr = self.relay_addr;

        let handle = self.runtime.spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                let (len, from) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving from relay: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };

                if from != relay_addr {
                    debug!("Ignoring datagram from {}", from);
                    continue;
                }

                match RelayPacket::decode(&buffer[..len]) {
                    Ok(RelayPacket::Event {
                        event,
                        message_id,
                        peer_id,
                        payload,
                    }) => {
                        let guard = callback.lock().unwrap_or_else(|e| e.into_inner());
                        if let Some(callback) = guard.as_ref() {
                            callback(TransportEvent {
                                event,
                                message_id,
                                peer_id,
                                payload,
                            });
                        }
                    }
                    Ok(reply) => {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to decode relay packet: {}", e),
                }
            }
        });
        self.tasks.push(handle);
    }

    fn spawn_heartbeat(&mut self) {
        let socket = Arc::clone(&self.socket);
        let relay_addr = self.relay_addr;

        let handle = self.runtime.spawn(async move {
            let mut ticker = interval(HEARTBEAT_INTERVAL);
            let Ok(data) = RelayPacket::Heartbeat.encode() else {
                return;
            };

            loop {
                ticker.tick().await;
                if let Err(e) = socket.send_to(&data, relay_addr).await {
                    warn!("Failed to send heartbeat: {}", e);
                }
            }
        });
        self.tasks.push(handle);
    }

    fn send_packet(&self, packet: &RelayPacket) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let data = packet.encode()?;
        self.runtime
            .block_on(self.socket.send_to(&data, self.relay_addr))?;
        Ok(())
    }

    /// Sends `packet` and blocks for the next non-event reply
    fn request(
        &mut self,
        packet: RelayPacket,
        what: &'static str,
    ) -> Result<RelayPacket, TransportError> {
        while let Ok(stale) = self.replies.try_recv() {
            debug!("Discarding stale relay reply {:?}", stale);
        }

        self.send_packet(&packet)?;

        let request_timeout = self.request_timeout;
        let replies = &mut self.replies;
        let runtime = &self.runtime;
        let reply = runtime
            .block_on(async { timeout(request_timeout, replies.recv()).await })
            .map_err(|_| TransportError::Timeout(what))?
            .ok_or(TransportError::Closed)?;

        match reply {
            RelayPacket::Rejected { reason } => Err(TransportError::Rejected(reason)),
            reply => Ok(reply),
        }
    }
}

impl Transport for UdpTransport {
    fn host(&mut self) -> Result<SessionInfo, TransportError> {
        match self.request(RelayPacket::Host, "host")? {
            RelayPacket::Hosted {
                session_id,
                peer_id,
            } => Ok(SessionInfo {
                session_id,
                host_peer_id: peer_id.clone(),
                peer_id,
            }),
            _ => Err(TransportError::UnexpectedReply("host")),
        }
    }

    fn list(&mut self) -> Result<Vec<String>, TransportError> {
        match self.request(RelayPacket::List, "list")? {
            RelayPacket::Sessions { session_ids } => Ok(session_ids),
            _ => Err(TransportError::UnexpectedReply("list")),
        }
    }

    fn join(&mut self, session_id: &str, payload: &str) -> Result<SessionInfo, TransportError> {
        let packet = RelayPacket::Join {
            session_id: session_id.to_string(),
            payload: payload.to_string(),
        };
        match self.request(packet, "join")? {
            RelayPacket::Joined {
                session_id,
                peer_id,
                host_id,
            } => Ok(SessionInfo {
                session_id,
                peer_id,
                host_peer_id: host_id,
            }),
            _ => Err(TransportError::UnexpectedReply("join")),
        }
    }

    fn send_game_message(&mut self, payload: &str) -> Result<(), TransportError> {
        self.send_packet(&RelayPacket::Game {
            payload: payload.to_string(),
        })
    }

    fn listen(&mut self, callback: EventCallback) {
        let mut guard = self.callback.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(callback);
    }

    fn destroy(&mut self) {
        if self.closed {
            return;
        }

        if let Err(e) = self.send_packet(&RelayPacket::Leave) {
            warn!("Failed to notify relay on shutdown: {}", e);
        }
        self.closed = true;

        for task in self.tasks.drain(..) {
            task.abort();
        }
        let mut guard = self.callback.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
        info!("Relay transport closed");
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Opens [`UdpTransport`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(UdpTransport::connect(host, port)?))
    }
}
