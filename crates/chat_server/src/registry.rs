//! Shared per-client state. Pure data plus accessors: nothing here performs
//! I/O, and every mutation happens inside the state actor.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::mpsc::Sender;

pub type ClientId = usize;

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

pub fn next_client_id() -> ClientId {
    NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Everything the server tracks about one live connection. Destroyed on
/// disconnect; dropping it closes `tx_outbound`, which lets the connection's
/// writer task drain and exit.
#[derive(Debug)]
pub struct ClientInfo {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub nickname: Option<String>,
    pub channels: HashSet<String>,
    pub last_activity: Instant,
    pub tx_outbound: Sender<String>,
}

impl ClientInfo {
    pub fn new(id: ClientId, addr: SocketAddr, tx_outbound: Sender<String>) -> Self {
        ClientInfo {
            id,
            addr,
            nickname: None,
            channels: HashSet::new(),
            last_activity: Instant::now(),
            tx_outbound,
        }
    }

    /// Nickname for event payloads; clients without one show as "Unknown".
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or("Unknown")
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Connection identity -> client state, for every currently-open connection.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientInfo>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry::default()
    }

    pub fn insert(&mut self, info: ClientInfo) {
        self.clients.insert(info.id, info);
    }

    pub fn remove(&mut self, id: ClientId) -> Option<ClientInfo> {
        self.clients.remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientInfo> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut ClientInfo> {
        self.clients.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientInfo> {
        self.clients.values()
    }

    /// True when another live connection already holds exactly `nickname`.
    pub fn nickname_in_use(&self, nickname: &str, exclude: ClientId) -> bool {
        self.clients
            .values()
            .any(|c| c.id != exclude && c.nickname.as_deref() == Some(nickname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_client(id: ClientId) -> ClientInfo {
        let (tx, _rx) = mpsc::channel(8);
        ClientInfo::new(id, "127.0.0.1:40000".parse().unwrap(), tx)
    }

    #[test]
    fn nickname_uniqueness_probe_excludes_self() {
        let mut registry = ClientRegistry::new();
        let mut alice = test_client(1);
        alice.nickname = Some("alice".to_owned());
        registry.insert(alice);
        registry.insert(test_client(2));

        assert!(registry.nickname_in_use("alice", 2));
        assert!(!registry.nickname_in_use("alice", 1), "own nickname is not a conflict");
        assert!(!registry.nickname_in_use("bob", 2));
    }

    #[test]
    fn unnamed_clients_never_conflict() {
        let mut registry = ClientRegistry::new();
        registry.insert(test_client(1));
        registry.insert(test_client(2));
        // Two clients with no nickname must not collide on the empty string.
        assert!(!registry.nickname_in_use("", 1));
        assert_eq!(registry.get(1).unwrap().display_name(), "Unknown");
    }

    #[test]
    fn remove_destroys_client_state() {
        let mut registry = ClientRegistry::new();
        registry.insert(test_client(7));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(7).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove(7).is_none());
    }
}
