//! Client connection management and request queuing for the game server
//!
//! This module tracks every connected client, the room each one plays in, and the
//! requests they have sent since the last tick. Requests are applied at the next tick
//! boundary in the order they arrived at the server, which keeps every room's
//! simulation deterministic for a given arrival order.

use log::{debug, info};
use shared::{Request, RoomId, UserId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Inactivity period after which a client is dropped.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub sequence: u32,
    /// Server-wide arrival counter, used to interleave clients fairly.
    pub arrival: u64,
    pub request: Request,
}

/// A request ready to be applied, with everything needed to route its response.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub client_id: UserId,
    pub addr: SocketAddr,
    pub room_id: RoomId,
    pub sequence: u32,
    pub request: Request,
}

#[derive(Debug)]
pub struct Client {
    pub id: UserId,
    pub addr: SocketAddr,
    pub last_seen: Instant,
    pub room_id: Option<RoomId>,
    /// Highest request sequence already applied
    pub last_processed_request: u32,
    pub pending_requests: Vec<PendingRequest>,
}

impl Client {
    pub fn new(id: UserId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            room_id: None,
            last_processed_request: 0,
            pending_requests: Vec::new(),
        }
    }

    /// Buffers a request in sequence order.
    ///
    /// Returns false for requests that were already applied or are already buffered, which
    /// happens when a datagram is duplicated or arrives after a newer one was processed.
    pub fn add_request(&mut self, pending: PendingRequest) -> bool {
        self.last_seen = Instant::now();

        if pending.sequence <= self.last_processed_request
            || self
                .pending_requests
                .iter()
                .any(|p| p.sequence == pending.sequence)
        {
            return false;
        }

        self.pending_requests.push(pending);
        // Sort by sequence to handle out-of-order packet delivery
        self.pending_requests.sort_by_key(|p| p.sequence);
        true
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and their request queues
pub struct ClientManager {
    clients: HashMap<UserId, Client>,
    next_client_id: UserId,
    max_clients: usize,
    next_arrival: u64,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            next_arrival: 0,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<UserId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    pub fn assign_room(&mut self, client_id: UserId, room_id: RoomId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.room_id = Some(room_id);
                true
            }
            None => false,
        }
    }

    pub fn room_of(&self, client_id: UserId) -> Option<RoomId> {
        self.clients.get(&client_id).and_then(|c| c.room_id)
    }

    /// Removes a client, handing back its record so the caller can release its room seat.
    pub fn remove_client(&mut self, client_id: &UserId) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<UserId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Buffers a request for a specific client. Returns false if the client is unknown or
    /// the request is stale.
    pub fn add_request(&mut self, client_id: UserId, sequence: u32, request: Request) -> bool {
        let arrival = self.next_arrival;
        let Some(client) = self.clients.get_mut(&client_id) else {
            return false;
        };

        let accepted = client.add_request(PendingRequest {
            sequence,
            arrival,
            request,
        });
        if accepted {
            self.next_arrival += 1;
        } else {
            debug!(
                "Dropped stale request {} from client {}",
                sequence, client_id
            );
        }
        accepted
    }

    pub fn touch(&mut self, client_id: UserId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Gets all unprocessed requests of clients seated in a room, in arrival order
    pub fn get_chronological_requests(&self) -> Vec<QueuedRequest> {
        let mut all_requests: Vec<(u64, QueuedRequest)> = Vec::new();

        for (client_id, client) in &self.clients {
            let Some(room_id) = client.room_id else {
                continue;
            };
            for pending in &client.pending_requests {
                if pending.sequence > client.last_processed_request {
                    all_requests.push((
                        pending.arrival,
                        QueuedRequest {
                            client_id: *client_id,
                            addr: client.addr,
                            room_id,
                            sequence: pending.sequence,
                            request: pending.request.clone(),
                        },
                    ));
                }
            }
        }

        all_requests.sort_by_key(|(arrival, _)| *arrival);
        all_requests.into_iter().map(|(_, queued)| queued).collect()
    }

    pub fn mark_request_processed(&mut self, client_id: UserId, sequence: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_processed_request = client.last_processed_request.max(sequence);
        }
    }

    pub fn cleanup_processed_requests(&mut self) {
        for client in self.clients.values_mut() {
            let last = client.last_processed_request;
            client.pending_requests.retain(|p| p.sequence > last);
        }
    }

    /// Removes clients that have been silent for longer than [`CLIENT_TIMEOUT`]
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timed_out: Vec<UserId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .collect()
    }

    /// Snapshot destinations: every seated client with its address and room.
    pub fn get_client_routes(&self) -> Vec<(UserId, SocketAddr, RoomId)> {
        let mut routes: Vec<_> = self
            .clients
            .values()
            .filter_map(|client| client.room_id.map(|room| (client.id, client.addr, room)))
            .collect();
        routes.sort_by_key(|(id, _, _)| *id);
        routes
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Inputs, XDirection, YDirection};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn seated_manager() -> (ClientManager, UserId, UserId) {
        let mut manager = ClientManager::new(4);
        let a = manager.add_client(test_addr()).unwrap();
        let b = manager.add_client(test_addr2()).unwrap();
        manager.assign_room(a, 1);
        manager.assign_room(b, 1);
        (manager, a, b)
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(1, test_addr());

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.room_id, None);
        assert_eq!(client.last_processed_request, 0);
        assert!(client.pending_requests.is_empty());
    }

    #[test]
    fn test_client_orders_requests_by_sequence() {
        let mut client = Client::new(1, test_addr());

        client.add_request(PendingRequest {
            sequence: 2,
            arrival: 0,
            request: Request::Freeze,
        });
        client.add_request(PendingRequest {
            sequence: 1,
            arrival: 1,
            request: Request::JoinGame,
        });

        assert_eq!(client.pending_requests[0].sequence, 1);
        assert_eq!(client.pending_requests[1].sequence, 2);
    }

    #[test]
    fn test_client_rejects_duplicate_and_stale_requests() {
        let mut client = Client::new(1, test_addr());
        client.last_processed_request = 3;

        let stale = PendingRequest {
            sequence: 3,
            arrival: 0,
            request: Request::JoinGame,
        };
        assert!(!client.add_request(stale));

        let fresh = PendingRequest {
            sequence: 4,
            arrival: 1,
            request: Request::StartGame,
        };
        assert!(client.add_request(fresh.clone()));
        assert!(!client.add_request(fresh));
        assert_eq!(client.pending_requests.len(), 1);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert_eq!(manager.add_client(test_addr()), Some(1));
        assert_eq!(manager.add_client(test_addr2()), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client_returns_record() {
        let (mut manager, a, _) = seated_manager();

        let removed = manager.remove_client(&a).unwrap();
        assert_eq!(removed.room_id, Some(1));
        assert!(manager.remove_client(&a).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_find_client_by_addr() {
        let (manager, a, _) = seated_manager();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(a));
        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown), None);
    }

    #[test]
    fn test_requests_interleave_by_arrival() {
        let (mut manager, a, b) = seated_manager();

        manager.add_request(a, 1, Request::JoinGame);
        manager.add_request(b, 1, Request::JoinGame);
        manager.add_request(a, 2, Request::StartGame);
        let inputs = Inputs {
            horizontal: XDirection::Right,
            vertical: YDirection::None,
        };
        manager.add_request(b, 2, Request::SetInputs { inputs });

        let order: Vec<(UserId, u32)> = manager
            .get_chronological_requests()
            .iter()
            .map(|q| (q.client_id, q.sequence))
            .collect();
        assert_eq!(order, vec![(a, 1), (b, 1), (a, 2), (b, 2)]);
    }

    #[test]
    fn test_unseated_clients_are_not_scheduled() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).unwrap();
        manager.add_request(id, 1, Request::JoinGame);

        assert!(manager.get_chronological_requests().is_empty());
        manager.assign_room(id, 3);
        let queued = manager.get_chronological_requests();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].room_id, 3);
        assert_eq!(manager.room_of(id), Some(3));
    }

    #[test]
    fn test_processed_requests_are_cleaned_up() {
        let (mut manager, a, _) = seated_manager();
        manager.add_request(a, 1, Request::JoinGame);
        manager.add_request(a, 2, Request::Freeze);

        manager.mark_request_processed(a, 1);
        manager.cleanup_processed_requests();

        let queued = manager.get_chronological_requests();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].sequence, 2);
        assert!(!manager.add_request(a, 1, Request::JoinGame));
    }

    #[test]
    fn test_unknown_client_request_rejected() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.add_request(42, 1, Request::JoinGame));
        assert!(!manager.touch(42));
    }

    #[test]
    fn test_check_timeouts_returns_removed_clients() {
        let (mut manager, a, b) = seated_manager();
        if let Some(client) = manager.clients.get_mut(&a) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let removed = manager.check_timeouts();

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, a);
        assert_eq!(manager.get_client_routes(), vec![(b, test_addr2(), 1)]);
    }
}
