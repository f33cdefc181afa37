//! UDP connection to the server, run on a background thread
//!
//! The render loop owns the window and cannot block on the socket, so a dedicated thread runs
//! a small tokio runtime that shuttles packets through unbounded channels.

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Request, RoomId, CLIENT_VERSION};
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

const RECEIVE_BUFFER_SIZE: usize = 65536;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct NetworkHandle {
    outgoing: mpsc::UnboundedSender<Packet>,
    incoming: mpsc::UnboundedReceiver<Packet>,
    next_sequence: u32,
}

impl NetworkHandle {
    /// Starts the network thread and sends the initial `Connect`.
    pub fn spawn(
        server_addr: &str,
        room_id: Option<RoomId>,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    if let Err(e) =
                        run_network(server_addr, fake_ping_ms, outgoing_rx, incoming_tx).await
                    {
                        error!("Network error: {}", e);
                    }
                });
            })?;

        let handle = Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            next_sequence: 1,
        };

        info!("Connecting to server...");
        handle.send(Packet::Connect {
            client_version: CLIENT_VERSION,
            room_id,
        });

        Ok(handle)
    }

    pub fn send(&self, packet: Packet) {
        if self.outgoing.send(packet).is_err() {
            warn!("Network thread has stopped, dropping packet");
        }
    }

    /// Sends a request under the next sequence number and returns that number.
    pub fn send_request(&mut self, request: Request) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.send(Packet::Request { sequence, request });
        sequence
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.incoming.try_recv().ok()
    }
}

async fn run_network(
    server_addr: SocketAddr,
    fake_ping_ms: u64,
    mut outgoing: mpsc::UnboundedReceiver<Packet>,
    incoming: mpsc::UnboundedSender<Packet>,
) -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, addr)) => {
                        if addr != server_addr {
                            continue;
                        }

                        if fake_ping_ms > 0 {
                            sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                        }

                        match deserialize::<Packet>(&buffer[..len]) {
                            Ok(packet) => {
                                if incoming.send(packet).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed packet: {}", e),
                        }
                    }
                    Err(e) => error!("Error receiving packet: {}", e),
                }
            }

            packet = outgoing.recv() => {
                let Some(packet) = packet else {
                    break;
                };
                let closing = matches!(packet, Packet::Disconnect);

                if fake_ping_ms > 0 {
                    sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                }

                let data = serialize(&packet)?;
                if let Err(e) = socket.send_to(&data, server_addr).await {
                    error!("Error sending packet: {}", e);
                }

                if closing {
                    break;
                }
            }

            _ = heartbeat.tick() => {
                let data = serialize(&Packet::Heartbeat)?;
                if let Err(e) = socket.send_to(&data, server_addr).await {
                    error!("Error sending heartbeat: {}", e);
                }
            }
        }
    }

    debug!("Network thread stopped");
    Ok(())
}
