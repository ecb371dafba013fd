use super::ServerInfo;
use crate::id::IdGenerator;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Something that happened to a peer on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Found {
        name: String,
    },
    Resolved {
        name: String,
        host: String,
        port: u16,
    },
    NotResolved {
        name: String,
        reason: String,
    },
    Removed {
        name: String,
    },
    Probed {
        name: String,
        host: String,
        port: u16,
        reachable: bool,
    },
    Stopped,
}

/// Work the browser must start or cancel after an event.
#[derive(Debug, PartialEq, Eq)]
pub enum Reaction {
    Resolve(String),
    CancelResolution(String),
    Probe {
        name: String,
        host: String,
        port: u16,
    },
    CancelAll,
}

/// Sole writer of the peer list.
pub struct PeerRegistry {
    peers: Arc<watch::Sender<Vec<ServerInfo>>>,
    pending: HashSet<String>,
    id_generator: Box<dyn IdGenerator + Send>,
}

impl PeerRegistry {
    pub fn new(
        peers: Arc<watch::Sender<Vec<ServerInfo>>>,
        id_generator: Box<dyn IdGenerator + Send>,
    ) -> Self {
        Self {
            peers,
            pending: HashSet::default(),
            id_generator,
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains(name)
    }

    pub fn apply(&mut self, event: DiscoveryEvent) -> Vec<Reaction> {
        match event {
            DiscoveryEvent::Found { name } => {
                if self.pending.insert(name.clone()) {
                    log::debug!("Found {}, resolving", name);
                    vec![Reaction::Resolve(name)]
                } else {
                    log::debug!("Found {} again while resolving it", name);
                    vec![]
                }
            }
            DiscoveryEvent::Resolved { name, host, port } => {
                self.pending.remove(&name);
                self.upsert(&name, &host, port);
                vec![
                    Reaction::CancelResolution(name.clone()),
                    Reaction::Probe { name, host, port },
                ]
            }
            DiscoveryEvent::NotResolved { name, reason } => {
                if self.pending.remove(&name) {
                    log::warn!("Failed to resolve {}: {}", name, reason);
                }
                vec![]
            }
            DiscoveryEvent::Removed { name } => {
                self.pending.remove(&name);
                self.peers.send_if_modified(|peers| {
                    let count = peers.len();
                    peers.retain(|p| p.name != name);
                    count != peers.len()
                });
                log::info!("Peer {} removed", name);
                vec![Reaction::CancelResolution(name)]
            }
            DiscoveryEvent::Probed {
                name,
                host,
                port,
                reachable,
            } => {
                self.peers.send_if_modified(|peers| {
                    match peers
                        .iter_mut()
                        .find(|p| p.name == name && p.host == host && p.port == port)
                    {
                        Some(peer) if peer.is_reachable != reachable => {
                            log::debug!("Peer {} reachable: {}", name, reachable);
                            peer.is_reachable = reachable;
                            true
                        }
                        _ => false,
                    }
                });
                vec![]
            }
            DiscoveryEvent::Stopped => {
                self.pending.clear();
                self.peers.send_modify(Vec::clear);
                vec![Reaction::CancelAll]
            }
        }
    }

    fn upsert(&self, name: &str, host: &str, port: u16) {
        let id_generator = &self.id_generator;
        self.peers.send_modify(|peers| {
            match peers.iter_mut().find(|p| p.name == name) {
                Some(peer) => {
                    if peer.host != host || peer.port != port {
                        peer.host = host.to_string();
                        peer.port = port;
                        peer.is_reachable = false;
                    }
                    log::info!("Peer {} updated at {}", name, peer.url());
                }
                None => {
                    let peer = ServerInfo {
                        id: id_generator.generate(),
                        name: name.to_string(),
                        host: host.to_string(),
                        port,
                        is_reachable: false,
                    };
                    log::info!("Peer {} resolved at {}", name, peer.url());
                    peers.push(peer);
                }
            }
        });
    }
}
