//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::{Client, ClientManager};
use crate::room::RoomManager;
use bincode::{deserialize, serialize, serialized_size};
use log::{debug, error, info, warn};
use shared::{unix_millis, Packet, RoomId, UserId, CLIENT_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Largest simulation step handed to the rooms, in seconds.
pub const MAX_TIME_DELTA: f32 = 0.05;

const RECEIVE_BUFFER_SIZE: usize = 2048;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: u64 = 65_507;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: UserId,
        room_id: Option<RoomId>,
    },
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Tunables for the game loop.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    /// Ticks between two snapshots sent to the same client.
    pub snapshot_interval: u32,
    pub max_clients: usize,
    /// Base seed for room random sources; random when unset.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / 30.0),
            snapshot_interval: 1,
            max_clients: 32,
            seed: None,
        }
    }
}

/// Main server coordinating networking and room simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    rooms: RoomManager,
    config: ServerConfig,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            rooms: RoomManager::new(config.seed),
            config,
            tick: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(GameMessage::SendPacket { packet, addr }) = game_rx.recv().await {
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for Client { id, room_id, .. } in timed_out {
                    info!("Client {} timed out", id);
                    let message = ServerMessage::ClientTimeout {
                        client_id: id,
                        room_id,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// True when the encoded packet fits in a single datagram.
    fn fits_in_datagram(packet: &Packet) -> bool {
        match serialized_size(packet) {
            Ok(size) if size <= MAX_DATAGRAM_SIZE => true,
            Ok(size) => {
                warn!("Packet of {} bytes exceeds datagram limit, dropping", size);
                false
            }
            Err(e) => {
                error!("Failed to size packet: {}", e);
                false
            }
        }
    }

    /// Drops a client's seat in its room.
    fn release_seat(&mut self, client_id: UserId, room_id: Option<RoomId>) {
        if let Some(room_id) = room_id {
            self.rooms.leave(room_id, client_id);
        }
    }

    async fn handle_connect(
        &mut self,
        client_version: u32,
        room_id: Option<RoomId>,
        addr: SocketAddr,
    ) {
        info!(
            "Client connecting from {} (version: {}, room: {:?})",
            addr, client_version, room_id
        );

        if client_version != CLIENT_VERSION {
            let reason = "Protocol version mismatch".to_string();
            self.send_packet(Packet::Disconnected { reason }, addr);
            return;
        }

        // Remove existing connection if present
        let existing = {
            let mut clients = self.clients.write().await;
            clients
                .find_client_by_addr(addr)
                .and_then(|id| clients.remove_client(&id))
        };
        if let Some(client) = existing {
            info!("Replacing existing client {} from {}", client.id, addr);
            self.release_seat(client.id, client.room_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };
        let Some(client_id) = client_id else {
            let reason = "Server full".to_string();
            self.send_packet(Packet::Disconnected { reason }, addr);
            return;
        };

        match self.rooms.join(room_id, client_id) {
            Ok(room_id) => {
                self.clients.write().await.assign_room(client_id, room_id);
                self.send_packet(Packet::Connected { client_id, room_id }, addr);
            }
            Err(e) => {
                warn!("Client {} could not enter room: {}", client_id, e);
                self.clients.write().await.remove_client(&client_id);
                let reason = e.to_string();
                self.send_packet(Packet::Disconnected { reason }, addr);
            }
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                room_id,
            } => {
                self.handle_connect(client_version, room_id, addr).await;
            }

            Packet::Request { sequence, request } => {
                let mut clients = self.clients.write().await;
                match clients.find_client_by_addr(addr) {
                    Some(client_id) => {
                        clients.add_request(client_id, sequence, request);
                    }
                    None => warn!("Request from unknown address {}", addr),
                }
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.touch(client_id);
                }
            }

            Packet::Disconnect => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|id| clients.remove_client(&id))
                };
                if let Some(client) = removed {
                    self.release_seat(client.id, client.room_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Applies every buffered request in arrival order and answers each one
    async fn process_requests(&mut self, time: u64) {
        let requests = {
            let clients = self.clients.read().await;
            clients.get_chronological_requests()
        };
        if requests.is_empty() {
            return;
        }

        let mut clients = self.clients.write().await;
        for queued in requests {
            clients.mark_request_processed(queued.client_id, queued.sequence);

            let Some(room) = self.rooms.get_mut(queued.room_id) else {
                continue;
            };
            let result = room.handle_request(queued.client_id, queued.request, time);
            if let Err(e) = &result {
                debug!(
                    "Request {} from client {} rejected: {}",
                    queued.sequence, queued.client_id, e
                );
            }

            let response = Packet::Response {
                sequence: queued.sequence,
                result: result.map_err(|e| e.to_string()),
            };
            self.send_packet(response, queued.addr);
        }
        clients.cleanup_processed_requests();
    }

    /// Sends each seated client its room's projection and pending events
    async fn send_snapshots(&mut self) {
        let routes = {
            let clients = self.clients.read().await;
            clients.get_client_routes()
        };

        // Take timestamp as close to transmission as possible
        let timestamp = unix_millis();

        for (client_id, addr, room_id) in routes {
            let Some(room) = self.rooms.get_mut(room_id) else {
                continue;
            };
            let (state, events) = room.snapshot_for(client_id);
            let packet = Packet::Snapshot {
                timestamp,
                state,
                events: events.iter().map(|e| e.to_string()).collect(),
            };
            if Self::fits_in_datagram(&packet) {
                self.send_packet(packet, addr);
            }
        }
    }

    /// Runs one server tick: requests, simulation, then snapshots
    async fn tick(&mut self, time_delta: f32) {
        let time = unix_millis();
        self.process_requests(time).await;
        self.rooms.tick_all(time, time_delta);
        self.tick += 1;

        if self.tick % self.config.snapshot_interval.max(1) as u64 == 0 {
            self.send_snapshots().await;
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.config.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, room_id }) => {
                            self.release_seat(client_id, room_id);
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > MAX_TIME_DELTA {
                        debug!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, MAX_TIME_DELTA);
                    }
                    self.tick(dt.min(MAX_TIME_DELTA)).await;

                    // Periodic performance monitoring
                    if self.tick % 60 == 0 && !self.rooms.is_empty() {
                        let client_count = self.clients.read().await.len();
                        debug!("Tick {}: {} clients in {} rooms, {:.1}Hz",
                               self.tick, client_count, self.rooms.len(), 1.0 / dt.max(f32::EPSILON));
                    }
                },
            }
        }

        Ok(())
    }
}
